use crate::{RepoError, ports::FileSystemOperations, repositories::archive::is_doc_file};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Size and content hash of a package version's file set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub size: u64,
    pub sha256: String,
    #[serde(skip)]
    pub files: Vec<PathBuf>,
}

/// Computes the digest of the files under `dir`, documentation excluded.
///
/// `size` sums file sizes. `sha256` hashes the concatenated hex SHA-256 of
/// every file in sorted relative-path order. Per-file hashes are computed
/// concurrently; the fold is sequential.
pub async fn content_digest<FS>(file_system: &FS, dir: &Path) -> Result<ContentDigest, RepoError>
where
    FS: FileSystemOperations,
{
    let files: Vec<PathBuf> = file_system
        .scan_files(dir)
        .await?
        .into_iter()
        .filter(|f| !is_doc_file(f))
        .collect();

    let per_file = try_join_all(files.iter().map(|relative| async move {
        let path = dir.join(relative);
        let size = file_system.file_size(&path).await?;
        let hash = file_system.hash_file(&path).await?;
        Ok::<_, RepoError>((size, hash))
    }))
    .await?;

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    for (file_size, file_hash) in &per_file {
        size += file_size;
        hasher.update(file_hash.as_bytes());
    }

    Ok(ContentDigest {
        size,
        sha256: format!("{:x}", hasher.finalize()),
        files,
    })
}
