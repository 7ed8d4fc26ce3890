use crate::{RepoError, ports::FileSystemOperations};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// [`FileSystemOperations`] over the host filesystem.
///
/// Tree walks, copies and hashing run on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

/// Files below `root` as relative paths, sorted.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        files.push(relative.to_path_buf());
    }

    Ok(files)
}

/// Lowercase hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<usize> {
    fs::create_dir_all(to)?;
    let files = walk_files(from)?;

    for relative in &files {
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from.join(relative), &target)?;
    }

    Ok(files.len())
}

#[async_trait]
impl FileSystemOperations for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, RepoError> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), RepoError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), RepoError> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn remove(&self, path: &Path) -> Result<(), RepoError> {
        Ok(tokio::fs::remove_file(path).await?)
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), RepoError> {
        Ok(tokio::fs::remove_dir_all(path).await?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), RepoError> {
        Ok(tokio::fs::rename(from, to).await?)
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), RepoError> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(from, to).await?;
        Ok(())
    }

    async fn copy_dir(&self, from: &Path, to: &Path) -> Result<usize, RepoError> {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        Ok(tokio::task::spawn_blocking(move || copy_tree(&from, &to)).await??)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn is_file(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn file_size(&self, path: &Path) -> Result<u64, RepoError> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>, RepoError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    async fn scan_files(&self, path: &Path) -> Result<Vec<PathBuf>, RepoError> {
        let root = path.to_path_buf();
        Ok(tokio::task::spawn_blocking(move || walk_files(&root)).await??)
    }

    async fn hash_file(&self, path: &Path) -> Result<String, RepoError> {
        let path = path.to_path_buf();
        Ok(tokio::task::spawn_blocking(move || sha256_file(&path)).await??)
    }
}
