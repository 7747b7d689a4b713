//! Resolution of a file and its package into linked [`CompiledFile`]s.

mod link;
mod names;
#[cfg(test)]
mod tests;

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use prost_types::FileDescriptorProto;

use self::names::SymbolTable;
use crate::{
    error::ErrorKind,
    file::{
        is_generated_file, DeclarationCompiler, DependencyProvider, GoogleProvider, LocalProvider,
        ProtoCompiler,
    },
    ir::CompiledFile,
    Error,
};

/// Compiles and links protobuf files, one local package at a time.
///
/// Compiling a file compiles every source file in the same local package, so that declarations
/// may refer to each other across files without imports. Imports outside of the package are
/// loaded from the [`LocalProvider`] if they belong to another local package, and from the
/// [`DependencyProvider`] otherwise. Well-known types such as `google/protobuf/any.proto` are
/// always available.
///
/// Each call to [`compile`](Resolver::compile) is independent, so a single resolver may be
/// shared between threads.
///
/// # Examples
///
/// ```
/// # use protolink::{Resolver, file::{DirectoryProvider, ChainProvider}};
/// # let tempdir = tempfile::tempdir().unwrap();
/// std::fs::create_dir(tempdir.path().join("foo")).unwrap();
/// std::fs::write(
///     tempdir.path().join("foo/bar.proto"),
///     "syntax = \"proto3\"; package foo; message Bar { Baz baz = 1; }",
/// ).unwrap();
/// std::fs::write(
///     tempdir.path().join("foo/baz.proto"),
///     "syntax = \"proto3\"; package foo; message Baz {}",
/// ).unwrap();
///
/// let resolver = Resolver::new(DirectoryProvider::new(tempdir.path()), ChainProvider::new());
/// let files = resolver.compile("foo/bar.proto").unwrap();
/// assert_eq!(files[0].path(), "foo/bar.proto");
/// assert_eq!(files[1].path(), "foo/baz.proto");
/// ```
pub struct Resolver {
    local: Box<dyn LocalProvider + Send + Sync>,
    dependencies: Box<dyn DependencyProvider + Send + Sync>,
    compiler: Box<dyn DeclarationCompiler + Send + Sync>,
}

impl Resolver {
    /// Creates a new resolver, using [`ProtoCompiler`] to compile local sources.
    pub fn new<L, D>(local: L, dependencies: D) -> Self
    where
        L: LocalProvider + Send + Sync + 'static,
        D: DependencyProvider + Send + Sync + 'static,
    {
        Resolver {
            local: Box::new(local),
            dependencies: Box::new(dependencies),
            compiler: Box::new(ProtoCompiler::new()),
        }
    }

    /// Sets the compiler used to turn local source files into descriptors.
    pub fn declaration_compiler<C>(&mut self, compiler: C) -> &mut Self
    where
        C: DeclarationCompiler + Send + Sync + 'static,
    {
        self.compiler = Box::new(compiler);
        self
    }

    /// Compiles the file at `path`, along with the rest of its package.
    ///
    /// The first file returned is the one requested, followed by the other source files of its
    /// package sorted by path. If `path` does not belong to a local package, it is loaded from
    /// the [`DependencyProvider`] and returned alone.
    ///
    /// # Errors
    ///
    /// Fails if any file cannot be found, read or compiled, or if any reference in the package
    /// or its local imports cannot be linked. No files are returned in that case.
    pub fn compile(&self, path: &str) -> Result<Vec<CompiledFile>, Error> {
        let _span = tracing::debug_span!("compile", path).entered();

        let mut session = Session::new(self)?;
        let unit = session.unit_for(path)?;
        session.load(path)?;

        tracing::debug!(symbols = session.symbols.len(), "loaded all imports");

        // Other local packages are linked to check them, but only the requested one is returned.
        for other in &session.loaded {
            if let Unit::Package(_) = other {
                if *other != unit {
                    session.link_unit(other)?;
                }
            }
        }

        let mut files = session.link_unit(&unit)?;
        if let Some(index) = files.iter().position(|file| file.path() == path) {
            let requested = files.remove(index);
            files.sort_by(|l, r| l.path().cmp(r.path()));
            files.insert(0, requested);
        }

        tracing::debug!(files = files.len(), "compiled package");
        Ok(files)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// A set of files which are loaded and linked together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Unit {
    /// Every source file of a local package.
    Package(String),
    /// A single file from the dependency provider.
    Dependency(String),
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Package(package) if package.is_empty() => f.write_str("<root>"),
            Unit::Package(package) => f.write_str(package),
            Unit::Dependency(path) => f.write_str(path),
        }
    }
}

/// The state of a single call to [`Resolver::compile`].
struct Session<'a> {
    resolver: &'a Resolver,
    packages: Vec<String>,
    package_files: HashMap<String, Vec<String>>,
    /// Compiled descriptors for every loaded file, keyed by path.
    files: HashMap<String, FileDescriptorProto>,
    /// The files of each loaded unit.
    unit_files: HashMap<Unit, Vec<String>>,
    /// Registered units, in the order they were first reached.
    loaded: Vec<Unit>,
    /// Files whose imports are currently being loaded, for detecting import cycles.
    stack: Vec<String>,
    /// Files whose imports have all been loaded.
    done: HashSet<String>,
    /// Registered files still waiting to have their imports loaded.
    queued: Vec<String>,
    symbols: SymbolTable,
}

impl<'a> Session<'a> {
    fn new(resolver: &'a Resolver) -> Result<Self, Error> {
        Ok(Session {
            resolver,
            packages: resolver.local.list_packages()?,
            package_files: HashMap::new(),
            files: HashMap::new(),
            unit_files: HashMap::new(),
            loaded: Vec::new(),
            stack: Vec::new(),
            done: HashSet::new(),
            queued: Vec::new(),
            symbols: SymbolTable::new(),
        })
    }

    /// Finds the local package with the longest prefix of `path`.
    fn owning_package(&self, path: &str) -> Option<&str> {
        let dir = match path.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };

        self.packages
            .iter()
            .filter(|package| is_path_prefix(package, dir))
            .max_by_key(|package| component_count(package))
            .map(String::as_str)
    }

    fn list_package(&mut self, package: &str) -> Result<&[String], Error> {
        if !self.package_files.contains_key(package) {
            let mut files: Vec<String> = self
                .resolver
                .local
                .list_source_files(package)?
                .into_iter()
                .filter(|file| !is_generated_file(file))
                .collect();
            files.sort();
            files.dedup();
            self.package_files.insert(package.to_owned(), files);
        }

        Ok(&self.package_files[package])
    }

    fn unit_for(&mut self, path: &str) -> Result<Unit, Error> {
        if let Some(package) = self.owning_package(path).map(ToOwned::to_owned) {
            if self.list_package(&package)?.iter().any(|file| file == path) {
                return Ok(Unit::Package(package));
            }
        }

        Ok(Unit::Dependency(path.to_owned()))
    }

    /// Loads the file at `path`, and everything it imports, into the symbol table.
    ///
    /// The first time a file of a unit is reached, every file of that unit is registered and
    /// queued to be loaded once the current import chain is finished. Import cycles are
    /// detected between files, so two packages may import each other as long as no file
    /// transitively imports itself.
    fn load(&mut self, path: &str) -> Result<(), Error> {
        self.load_file(path)?;
        while let Some(queued) = self.queued.pop() {
            self.load_file(&queued)?;
        }
        Ok(())
    }

    fn load_file(&mut self, path: &str) -> Result<(), Error> {
        if let Some(start) = self.stack.iter().position(|loading| loading == path) {
            let cycle = self.stack[start..]
                .iter()
                .map(String::as_str)
                .chain(Some(path))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::from_kind(ErrorKind::CircularImport {
                name: self.stack.last().cloned().unwrap_or_default(),
                cycle,
            }));
        }
        if self.done.contains(path) {
            return Ok(());
        }

        let unit = self.unit_for(path)?;
        if self.register(&unit)? {
            self.queued.extend(self.unit_files[&unit].iter().cloned());
        }

        self.stack.push(path.to_owned());
        let imports = self.files[path].dependency.clone();
        for import in &imports {
            self.load_file(import)?;
        }
        self.stack.pop();
        self.done.insert(path.to_owned());

        Ok(())
    }

    /// Compiles every file of `unit` and adds their declarations to the symbol table.
    ///
    /// Returns false if the unit was already registered.
    fn register(&mut self, unit: &Unit) -> Result<bool, Error> {
        if self.unit_files.contains_key(unit) {
            return Ok(false);
        }

        let paths = match unit {
            Unit::Package(package) => {
                let paths = self.list_package(package)?.to_vec();
                tracing::debug!(package = %unit, files = paths.len(), "compiling package");
                for path in &paths {
                    let source = self
                        .resolver
                        .local
                        .get_local_file(path)
                        .map_err(|err| err.with_path(path))?;
                    let file = self.resolver.compiler.compile(path, &source)?;
                    self.add_file(path, file)?;
                }
                paths
            }
            Unit::Dependency(path) => {
                let file = self.get_dependency(path)?;
                tracing::trace!(path = path.as_str(), "loaded dependency");
                self.add_file(path, file)?;
                vec![path.clone()]
            }
        };

        self.unit_files.insert(unit.clone(), paths);
        self.loaded.push(unit.clone());
        Ok(true)
    }

    fn get_dependency(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        let result = match self.resolver.dependencies.get_dependency_file(path) {
            Err(err) if err.is_file_not_found() => GoogleProvider::new().get_dependency_file(path),
            result => result,
        };

        result.map_err(|err| err.with_path(path))
    }

    fn add_file(&mut self, path: &str, mut file: FileDescriptorProto) -> Result<(), Error> {
        if self.files.contains_key(path) {
            return Ok(());
        }
        if file.name.is_none() {
            file.name = Some(path.to_owned());
        }

        self.symbols.add_file(&file)?;
        self.files.insert(path.to_owned(), file);
        Ok(())
    }

    /// The files whose declarations are visible from `path`: itself, the rest of its package,
    /// its imports and anything they publicly import.
    fn visible_files(&self, unit: &Unit, path: &str) -> HashSet<String> {
        let mut visible: HashSet<String> = HashSet::new();
        visible.insert(path.to_owned());
        if let Unit::Package(_) = unit {
            if let Some(paths) = self.unit_files.get(unit) {
                visible.extend(paths.iter().cloned());
            }
        }

        let mut pending: Vec<&str> = match self.files.get(path) {
            Some(file) => file.dependency.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };

        let mut seen = HashSet::new();
        while let Some(import) = pending.pop() {
            if !seen.insert(import) {
                continue;
            }

            if let Some(file) = self.files.get(import) {
                for &index in &file.public_dependency {
                    if let Some(public) = file.dependency.get(index as usize) {
                        pending.push(public);
                    }
                }
            }
        }

        visible.extend(seen.into_iter().map(ToOwned::to_owned));
        visible
    }

    fn link_unit(&self, unit: &Unit) -> Result<Vec<CompiledFile>, Error> {
        let paths = match self.unit_files.get(unit) {
            Some(paths) => paths,
            None => return Ok(Vec::new()),
        };

        paths
            .iter()
            .map(|path| {
                let visible = self.visible_files(unit, path);
                link::link_file(&self.files[path], &self.symbols, &visible)
            })
            .collect()
    }
}

fn is_path_prefix(package: &str, dir: &str) -> bool {
    package.is_empty()
        || dir == package
        || (dir.starts_with(package) && dir.as_bytes().get(package.len()) == Some(&b'/'))
}

fn component_count(package: &str) -> usize {
    if package.is_empty() {
        0
    } else {
        package.split('/').count()
    }
}
