use crate::{
    RepoError, SourceConfig, VersionInfo, VersionListing,
    paths::RepoPaths,
    ports::{ExternalRepository, FileSystemOperations},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Source reading a published repository tree from a local or mounted
/// directory, e.g. the destination of another repository's `index_all`.
pub struct DirectoryRepository<FS>
where
    FS: FileSystemOperations,
{
    file_system: FS,
    paths: RepoPaths,
    id: String,
}

impl<FS> DirectoryRepository<FS>
where
    FS: FileSystemOperations,
{
    pub fn new(file_system: FS, root: PathBuf) -> Self {
        let id = format!("file://{}", root.display());
        Self {
            file_system,
            paths: RepoPaths::new(root),
            id,
        }
    }

    pub fn from_config(file_system: FS, config: &SourceConfig) -> Result<Self, RepoError> {
        let root = config.local_path().ok_or_else(|| {
            RepoError::ValidationError(format!(
                "DirectoryRepository requires a local path, got '{}'",
                config.url
            ))
        })?;
        Ok(Self::new(file_system, root))
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }
}

#[async_trait]
impl<FS> ExternalRepository for DirectoryRepository<FS>
where
    FS: FileSystemOperations + Send + Sync,
{
    fn identify(&self) -> &str {
        &self.id
    }

    async fn list_versions(&self, package_name: &str) -> Result<VersionListing, RepoError> {
        let index_path = self.paths.version_index_path(package_name);

        if !self.file_system.exists(&index_path).await {
            return Ok(VersionListing::new());
        }

        self.file_system
            .read_json(&index_path)
            .await
            .map_err(|e| RepoError::external(&self.id, e))
    }

    async fn version_info(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Option<VersionInfo>, RepoError> {
        let meta_path = self.paths.version_meta_path(package_name, version);

        if !self.file_system.exists(&meta_path).await {
            return Ok(None);
        }

        self.file_system
            .read_json(&meta_path)
            .await
            .map(Some)
            .map_err(|e| RepoError::external(&self.id, e))
    }

    async fn download(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<(), RepoError> {
        let archive = self.paths.archive_path(package_name, version);

        if !self.file_system.is_file(&archive).await {
            return Err(RepoError::download(
                package_name,
                version,
                format!("{} does not exist", archive.display()),
            ));
        }

        self.file_system.copy_file(&archive, dest).await
    }
}
