use std::{
    fs, io,
    path::{Path, PathBuf},
};

use bytes::Bytes;

use super::{path_to_file_name, LocalProvider, GENERATED_SUFFIX};
use crate::Error;

/// An implementation of [`LocalProvider`] over a directory tree on the file system.
///
/// Every directory that directly contains at least one source file is a package, named by its
/// path relative to the root. Hidden files and directories are ignored.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    generated_suffix: String,
    source_extension: String,
}

impl DirectoryProvider {
    /// Constructs a `DirectoryProvider` for the tree rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryProvider {
            root: root.into(),
            generated_suffix: GENERATED_SUFFIX.to_owned(),
            source_extension: "proto".to_owned(),
        }
    }

    /// Sets the suffix of generated mirror files, which are left out of package listings.
    ///
    /// The default is `.gen.proto`.
    pub fn generated_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.generated_suffix = suffix.into();
        self
    }

    /// Sets the extension of source files, without the leading dot.
    ///
    /// The default is `proto`.
    pub fn source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// The root of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Converts a file system path to the path of a file in this tree.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::Path;
    /// # use protolink::file::DirectoryProvider;
    /// let provider = DirectoryProvider::new("/path/to/root");
    /// assert_eq!(provider.resolve_path(Path::new("/path/to/root/dir/foo.proto")), Some("dir/foo.proto".to_owned()));
    /// assert_eq!(provider.resolve_path(Path::new("/elsewhere/foo.proto")), None);
    /// ```
    pub fn resolve_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        path_to_file_name(relative)
    }

    fn is_source_file(&self, name: &str) -> bool {
        !name.starts_with('.')
            && !name.ends_with(&self.generated_suffix)
            && Path::new(name).extension().and_then(|ext| ext.to_str())
                == Some(self.source_extension.as_str())
    }

    fn read_dir(&self, relative: &str) -> Result<Vec<(String, fs::FileType)>, Error> {
        let dir = self.root.join(relative);
        let map_io_err = |err: io::Error| {
            if err.kind() == io::ErrorKind::NotFound {
                Error::file_not_found(relative)
            } else {
                Error::io(relative, err)
            }
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(map_io_err)? {
            let entry = entry.map_err(map_io_err)?;
            let file_type = entry.file_type().map_err(map_io_err)?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    entries.push((name.to_owned(), file_type));
                }
            }
        }
        entries.sort_by(|l, r| l.0.cmp(&r.0));

        Ok(entries)
    }

    fn visit(&self, relative: &str, packages: &mut Vec<String>) -> Result<(), Error> {
        let entries = self.read_dir(relative)?;

        if entries
            .iter()
            .any(|(name, file_type)| file_type.is_file() && self.is_source_file(name))
        {
            packages.push(relative.to_owned());
        }

        for (name, file_type) in entries {
            if file_type.is_dir() {
                self.visit(&join(relative, &name), packages)?;
            }
        }

        Ok(())
    }
}

impl LocalProvider for DirectoryProvider {
    fn list_packages(&self) -> Result<Vec<String>, Error> {
        let mut packages = Vec::new();
        self.visit("", &mut packages)?;
        tracing::trace!(root = %self.root.display(), count = packages.len(), "listed packages");
        Ok(packages)
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .read_dir(package)?
            .into_iter()
            .filter(|(name, file_type)| file_type.is_file() && self.is_source_file(name))
            .map(|(name, _)| join(package, &name))
            .collect())
    }

    fn get_local_file(&self, path: &str) -> Result<Bytes, Error> {
        match fs::read(self.root.join(path)) {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::file_not_found(path)),
            Err(err) => Err(Error::io(path, err)),
        }
    }
}

fn join(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", package, name)
    }
}
