//! Sources of protobuf files.
//!
//! A [`Resolver`](crate::Resolver) draws on two kinds of provider: a [`LocalProvider`] for the
//! source tree being worked on, and a [`DependencyProvider`] for pre-linked descriptors of
//! everything else. Source bytes are turned into descriptors by a [`DeclarationCompiler`].

mod chain;
mod descriptor_set;
mod directory;
mod google;

pub use chain::ChainProvider;
pub use descriptor_set::DescriptorSetProvider;
pub use directory::DirectoryProvider;
pub use google::GoogleProvider;

use std::path::Path;

use bytes::Bytes;
use prost_types::FileDescriptorProto;

use crate::{error::ErrorKind, Error};

/// The suffix of generated mirror files, which are never compiled as sources.
pub const GENERATED_SUFFIX: &str = ".gen.proto";

/// A tree of protobuf source files, grouped into packages.
///
/// Package names and file paths use `/` as a separator. A file belongs to the package whose
/// name is the longest prefix of its path.
pub trait LocalProvider {
    /// Lists the packages of the tree, for example `foo/bar`.
    fn list_packages(&self) -> Result<Vec<String>, Error>;

    /// Lists the paths of the files in a package, relative to the root of the tree.
    ///
    /// The listing may include generated mirror files; they are skipped by the resolver.
    fn list_source_files(&self, package: &str) -> Result<Vec<String>, Error>;

    /// Reads the contents of a file by its path.
    ///
    /// # Errors
    ///
    /// If the file does not exist, the implementation should return [`Error::file_not_found`].
    fn get_local_file(&self, path: &str) -> Result<Bytes, Error>;
}

/// A source of already-linked descriptors for files outside of the local tree.
pub trait DependencyProvider {
    /// Gets the descriptor of a file by its path.
    ///
    /// # Errors
    ///
    /// If the file is not known, the implementation should return [`Error::file_not_found`].
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error>;
}

/// Compiles the contents of a source file into an unlinked descriptor.
///
/// Type names in the result may be relative. The descriptor should include
/// `source_code_info` so that comments can be preserved.
pub trait DeclarationCompiler {
    /// Compiles `source`, the contents of the file at `path`.
    fn compile(&self, path: &str, source: &[u8]) -> Result<FileDescriptorProto, Error>;
}

/// A [`DeclarationCompiler`] for `.proto` source files, using [`protox_parse`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtoCompiler {
    _priv: (),
}

impl ProtoCompiler {
    /// Creates a new instance of [`ProtoCompiler`].
    pub fn new() -> Self {
        Default::default()
    }
}

impl DeclarationCompiler for ProtoCompiler {
    fn compile(&self, path: &str, source: &[u8]) -> Result<FileDescriptorProto, Error> {
        let source = std::str::from_utf8(source).map_err(|_| {
            Error::from_kind(ErrorKind::FileInvalidUtf8 {
                name: path.to_owned(),
            })
        })?;

        let mut file = protox_parse::parse(path, source)?;
        file.name = Some(path.to_owned());
        Ok(file)
    }
}

impl<T> LocalProvider for Box<T>
where
    T: LocalProvider + ?Sized,
{
    fn list_packages(&self) -> Result<Vec<String>, Error> {
        (**self).list_packages()
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>, Error> {
        (**self).list_source_files(package)
    }

    fn get_local_file(&self, path: &str) -> Result<Bytes, Error> {
        (**self).get_local_file(path)
    }
}

impl<T> DependencyProvider for Box<T>
where
    T: DependencyProvider + ?Sized,
{
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        (**self).get_dependency_file(path)
    }
}

impl<T> DeclarationCompiler for Box<T>
where
    T: DeclarationCompiler + ?Sized,
{
    fn compile(&self, path: &str, source: &[u8]) -> Result<FileDescriptorProto, Error> {
        (**self).compile(path, source)
    }
}

impl<'a, T> DependencyProvider for &'a T
where
    T: DependencyProvider + ?Sized,
{
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        (**self).get_dependency_file(path)
    }
}

/// Returns true if `path` names a generated mirror of another source file.
pub fn is_generated_file(path: &str) -> bool {
    path.ends_with(GENERATED_SUFFIX)
}

/// Joins the normal components of a relative path with `/`.
///
/// Returns `None` if the path contains any other kind of component, or is not valid UTF-8.
pub(crate) fn path_to_file_name(path: &Path) -> Option<String> {
    let mut name = String::new();
    for component in path.components() {
        match component {
            std::path::Component::Normal(component) => {
                if let Some(component) = component.to_str() {
                    if !name.is_empty() {
                        name.push('/');
                    }
                    name.push_str(component);
                } else {
                    return None;
                }
            }
            std::path::Component::CurDir => continue,
            _ => return None,
        }
    }

    Some(name)
}
