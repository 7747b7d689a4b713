use bytes::Buf;
use prost::{DecodeError, Message};
use prost_types::{FileDescriptorProto, FileDescriptorSet};

use super::DependencyProvider;
use crate::Error;

/// An implementation of [`DependencyProvider`] which resolves files from a compiled
/// [`FileDescriptorSet`].
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetProvider {
    set: Vec<FileDescriptorProto>,
}

impl DescriptorSetProvider {
    /// Creates an instance of [`DescriptorSetProvider`] from the file descriptor set.
    pub fn new(set: FileDescriptorSet) -> Self {
        DescriptorSetProvider { set: set.file }
    }

    /// Creates an instance of [`DescriptorSetProvider`] by deserializing a
    /// [`FileDescriptorSet`] from the given bytes.
    pub fn decode<B>(buf: B) -> Result<Self, DecodeError>
    where
        B: Buf,
    {
        Ok(DescriptorSetProvider::new(FileDescriptorSet::decode(buf)?))
    }

    /// Adds the files of another descriptor set. Files already present take precedence.
    pub fn extend(&mut self, set: FileDescriptorSet) {
        self.set.extend(set.file)
    }
}

impl DependencyProvider for DescriptorSetProvider {
    fn get_dependency_file(&self, path: &str) -> Result<FileDescriptorProto, Error> {
        self.set
            .iter()
            .find(|file| file.name() == path)
            .cloned()
            .ok_or_else(|| Error::file_not_found(path))
    }
}
