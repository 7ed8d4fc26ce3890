use crate::{RepoError, models::version::satisfies, ports::FileSystemOperations};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Pins from package name to an exact, previously resolved version.
///
/// A pin only replaces a requested pattern when it is compatible with it;
/// otherwise the request resolves as if unpinned.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, String>,
}

impl PackageLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocking read, for callers outside an async runtime.
    pub fn load(path: &Path) -> Result<Self, RepoError> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Blocking write, for callers outside an async runtime.
    pub fn save(&self, path: &Path) -> Result<(), RepoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RepoError::SerializationError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reads the lock through `file_system`. A missing file is an empty lock.
    pub async fn read<FS>(file_system: &FS, path: &Path) -> Result<Self, RepoError>
    where
        FS: FileSystemOperations,
    {
        if !file_system.exists(path).await {
            return Ok(Self::new());
        }
        file_system.read_json(path).await
    }

    pub async fn write<FS>(&self, file_system: &FS, path: &Path) -> Result<(), RepoError>
    where
        FS: FileSystemOperations,
    {
        file_system.write_json(path, self).await
    }

    pub fn pin<N: Into<String>, V: Into<String>>(&mut self, name: N, version: V) {
        self.packages.insert(name.into(), version.into());
    }

    pub fn unpin(&mut self, name: &str) -> Option<String> {
        self.packages.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.packages.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the pattern to resolve `name` with: the pin when it equals or
    /// satisfies `pattern`, else `pattern` untouched.
    pub fn resolve_pattern<'a>(&'a self, name: &str, pattern: &'a str) -> &'a str {
        match self.get(name) {
            Some(pinned) if satisfies(pinned, pattern) => pinned,
            _ => pattern,
        }
    }
}

impl FromIterator<(String, String)> for PackageLock {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            packages: iter.into_iter().collect(),
        }
    }
}
