use crate::RepoError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait FileSystemOperations: Send + Sync + Clone {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, RepoError>;

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), RepoError>;

    async fn create_dir_all(&self, path: &Path) -> Result<(), RepoError>;

    async fn remove(&self, path: &Path) -> Result<(), RepoError>;

    async fn remove_dir_all(&self, path: &Path) -> Result<(), RepoError>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), RepoError>;

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), RepoError>;

    /// Copies a directory tree, returning the number of files copied.
    async fn copy_dir(&self, from: &Path, to: &Path) -> Result<usize, RepoError>;

    async fn exists(&self, path: &Path) -> bool;

    async fn is_dir(&self, path: &Path) -> bool;

    async fn is_file(&self, path: &Path) -> bool;

    async fn file_size(&self, path: &Path) -> Result<u64, RepoError>;

    /// Direct children of `path`, sorted by path.
    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, RepoError>;

    /// Files below `path` as relative paths, sorted.
    async fn scan_files(&self, path: &Path) -> Result<Vec<PathBuf>, RepoError>;

    /// Lowercase hex SHA-256 of the file content.
    async fn hash_file(&self, path: &Path) -> Result<String, RepoError>;

    async fn read_json<T>(&self, path: &Path) -> Result<T, RepoError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let data = self.read_file(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_json<T>(&self, path: &Path, value: &T) -> Result<(), RepoError>
    where
        T: serde::Serialize + Sync,
    {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| RepoError::SerializationError(e.to_string()))?;
        self.write_file(path, &json).await
    }
}
