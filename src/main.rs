use std::{fs, io, path::PathBuf};

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use protolink::{
    file::{ChainProvider, DescriptorSetProvider, DirectoryProvider, LocalProvider},
    print_file, Error, Resolver,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
pub struct Args {
    /// The source file(s) to print
    #[clap(value_name = "PROTO_FILES", required = true, value_parser)]
    files: Vec<PathBuf>,
    /// The root of the local source tree. Each directory containing source files is a package.
    #[clap(
        short = 'r',
        long = "root",
        value_name = "PATH",
        default_value = ".",
        value_parser
    )]
    root: PathBuf,
    /// An encoded file descriptor set containing pre-linked dependencies.
    #[clap(
        short = 'd',
        long = "descriptor-set",
        value_name = "PATH",
        value_parser
    )]
    descriptor_sets: Vec<PathBuf>,
    /// The directory to write canonical files to. If unset, they are written to stdout.
    #[clap(short = 'o', long = "output", value_name = "PATH", value_parser)]
    output: Option<PathBuf>,
    /// If set, fails if any of the files is not already in canonical form instead of printing.
    #[clap(long)]
    check: bool,
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let local = DirectoryProvider::new(&args.root);

    let mut dependencies = ChainProvider::new();
    for path in &args.descriptor_sets {
        let bytes = fs::read(path).map_err(|err| Error::io(&path.display().to_string(), err))?;
        let set = DescriptorSetProvider::decode(bytes.as_slice()).map_err(|err| {
            miette!("failed to decode descriptor set '{}': {}", path.display(), err)
        })?;
        dependencies.add(set);
    }

    let mut names = Vec::with_capacity(args.files.len());
    for file in &args.files {
        match local.resolve_path(&args.root.join(file)) {
            Some(name) => names.push(name),
            None => {
                return Err(miette!(
                    "file '{}' is not within the root '{}'",
                    file.display(),
                    args.root.display()
                ))
            }
        }
    }

    let resolver = Resolver::new(local.clone(), dependencies);

    let mut mismatched = Vec::new();
    for name in &names {
        let files = resolver.compile(name)?;
        let canonical = match files.first() {
            Some(file) => print_file(file)?,
            None => return Err(miette!("no output for file '{}'", name)),
        };

        if args.check {
            if local.get_local_file(name)? != canonical.as_bytes() {
                mismatched.push(name.as_str());
            }
        } else if let Some(output) = &args.output {
            let path = output.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).into_diagnostic()?;
            }
            fs::write(&path, canonical).map_err(|err| Error::io(name, err))?;
        } else {
            print!("{}", canonical);
        }
    }

    if !mismatched.is_empty() {
        return Err(miette!(
            "files are not in canonical form: {}",
            mismatched.join(", ")
        ));
    }

    Ok(())
}
