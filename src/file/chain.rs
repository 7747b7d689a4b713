use std::fmt;

use prost_types::FileDescriptorProto;

use super::DependencyProvider;
use crate::Error;

/// An implementation of [`DependencyProvider`] which chains together several other providers.
///
/// When looking up files, each provider is searched in turn until the file is found.
#[derive(Default)]
pub struct ChainProvider {
    providers: Vec<Box<dyn DependencyProvider + Send + Sync>>,
}

impl ChainProvider {
    /// Create a new, empty [`ChainProvider`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a new provider.
    ///
    /// The new provider will be searched after all previously-added providers.
    pub fn add<P>(&mut self, provider: P)
    where
        P: DependencyProvider + Send + Sync + 'static,
    {
        self.providers.push(Box::new(provider))
    }
}

impl DependencyProvider for ChainProvider {
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        for provider in &self.providers {
            match provider.get_dependency_file(path) {
                Ok(file) => return Ok(file),
                Err(err) if err.is_file_not_found() => continue,
                Err(err) => return Err(err),
            }
        }

        Err(Error::file_not_found(path))
    }
}

impl fmt::Debug for ChainProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainProvider")
            .field("providers", &self.providers.len())
            .finish_non_exhaustive()
    }
}
