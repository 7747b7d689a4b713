use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorProto;

use super::DependencyProvider;
use crate::Error;

/// An implementation of [`DependencyProvider`] which resolves well-known imports such as
/// `google/protobuf/timestamp.proto`.
///
/// Descriptors are taken from the global [`DescriptorPool`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleProvider {
    _priv: (),
}

impl GoogleProvider {
    /// Creates a new instance of [`GoogleProvider`].
    pub fn new() -> Self {
        Default::default()
    }
}

impl DependencyProvider for GoogleProvider {
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        if !path.starts_with("google/protobuf/") {
            return Err(Error::file_not_found(path));
        }

        match DescriptorPool::global().get_file_by_name(path) {
            Some(file) => Ok(file.file_descriptor_proto().clone()),
            None => Err(Error::file_not_found(path)),
        }
    }
}
