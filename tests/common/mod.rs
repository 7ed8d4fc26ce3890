#![allow(dead_code)]

use async_trait::async_trait;
use modrepo_core::{
    DirectoryRepository, ExternalRepository, LocalFileSystem, RepoError, Repository,
    RepositoryConfig, VersionInfo, VersionListing,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Writes a package directory with a manifest and the given files.
pub fn write_package(dir: &Path, name: &str, version: &str, files: &[(&str, &str)]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("package.toml"),
        format!("name = \"{}\"\nversion = \"{}\"\n", name, version),
    )
    .unwrap();
    for (relative, content) in files {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir.to_path_buf()
}

pub async fn open_repository(root: &Path, ttl: Duration) -> Repository {
    let config = RepositoryConfig::new(root).with_cache_ttl(ttl);
    Repository::with_file_system(LocalFileSystem, &config)
        .await
        .unwrap()
}

/// Upstream repository that installs packages and publishes them into
/// `published`, the tree consumed by downstream sources.
pub struct Upstream {
    pub repository: Repository,
    pub published: PathBuf,
    scratch: PathBuf,
}

impl Upstream {
    pub async fn new(base: &Path) -> Self {
        let repository = open_repository(&base.join("upstream"), Duration::from_secs(600)).await;
        Self {
            repository,
            published: base.join("published"),
            scratch: base.join("scratch"),
        }
    }

    pub async fn publish(&self, name: &str, version: &str, files: &[(&str, &str)]) {
        let dir = self.scratch.join(format!("{}-{}", name, version));
        if dir.exists() {
            fs::remove_dir_all(&dir).unwrap();
        }
        write_package(&dir, name, version, files);
        self.repository.install_from_directory(&dir).await.unwrap();
        self.repository.index_all(&self.published, None).await.unwrap();
    }

    pub fn source(&self) -> Arc<CountingSource> {
        Arc::new(CountingSource::new(DirectoryRepository::new(
            LocalFileSystem,
            self.published.clone(),
        )))
    }
}

/// Wraps a source, counting listings and downloads. Downloads can be made
/// to fail or to stall after writing a partial file.
pub struct CountingSource {
    inner: DirectoryRepository<LocalFileSystem>,
    pub lists: AtomicUsize,
    pub downloads: AtomicUsize,
    pub fail_downloads: AtomicBool,
    pub download_delay_ms: AtomicU64,
}

impl CountingSource {
    pub fn new(inner: DirectoryRepository<LocalFileSystem>) -> Self {
        Self {
            inner,
            lists: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            fail_downloads: AtomicBool::new(false),
            download_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn fail_downloads(&self) {
        self.fail_downloads.store(true, Ordering::SeqCst);
    }

    pub fn stall_downloads(&self, delay: Duration) {
        self.download_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExternalRepository for CountingSource {
    fn identify(&self) -> &str {
        self.inner.identify()
    }

    async fn list_versions(&self, package_name: &str) -> Result<VersionListing, RepoError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_versions(package_name).await
    }

    async fn version_info(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Option<VersionInfo>, RepoError> {
        self.inner.version_info(package_name, version).await
    }

    async fn download(&self, package_name: &str, version: &str, dest: &Path) -> Result<(), RepoError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            fs::write(dest, b"partial").unwrap();
            return Err(RepoError::network("connection reset"));
        }
        let delay = self.download_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            fs::write(dest, b"partial").unwrap();
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.download(package_name, version, dest).await
    }
}

/// Names of hidden entries directly under `dir`.
pub fn hidden_entries(dir: &Path) -> Vec<String> {
    if !dir.is_dir() {
        return Vec::new();
    }
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with('.'))
        .collect()
}
