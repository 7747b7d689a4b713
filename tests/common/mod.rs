#![allow(dead_code)]

use std::{collections::BTreeMap, env, fs, io, path::PathBuf};

use bytes::Bytes;
use protolink::{file::LocalProvider, Error};

pub fn test_data_dir() -> PathBuf {
    PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap()).join("tests/data")
}

pub fn read_fixture(path: &str) -> String {
    fs::read_to_string(test_data_dir().join(path)).unwrap()
}

/// A local source tree held in memory. Packages are the directories of the files it holds, and
/// are listed in the order files were added.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    files: Vec<(String, Result<String, io::ErrorKind>)>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(mut self, path: &str, source: &str) -> Self {
        self.files.push((path.to_owned(), Ok(source.to_owned())));
        self
    }

    pub fn add_unreadable(mut self, path: &str, kind: io::ErrorKind) -> Self {
        self.files.push((path.to_owned(), Err(kind)));
        self
    }

    pub fn from_fixtures(paths: &[&str]) -> Self {
        paths
            .iter()
            .fold(MemoryProvider::new(), |provider, path| {
                provider.add(path, &read_fixture(path))
            })
    }

    pub fn sources(&self) -> BTreeMap<&str, &str> {
        self.files
            .iter()
            .filter_map(|(path, source)| Some((path.as_str(), source.as_deref().ok()?)))
            .collect()
    }
}

fn dir_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

impl LocalProvider for MemoryProvider {
    fn list_packages(&self) -> Result<Vec<String>, Error> {
        let mut packages: Vec<String> = Vec::new();
        for (path, _) in &self.files {
            let dir = dir_of(path);
            if !packages.iter().any(|package| package == dir) {
                packages.push(dir.to_owned());
            }
        }
        Ok(packages)
    }

    fn list_source_files(&self, package: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .files
            .iter()
            .map(|(path, _)| path)
            .filter(|path| dir_of(path) == package)
            .cloned()
            .collect())
    }

    fn get_local_file(&self, path: &str) -> Result<Bytes, Error> {
        match self.files.iter().find(|(name, _)| name == path) {
            Some((_, Ok(source))) => Ok(Bytes::from(source.clone())),
            Some((_, Err(kind))) => Err(Error::new(io::Error::new(*kind, "permission denied"))),
            None => Err(Error::file_not_found(path)),
        }
    }
}
