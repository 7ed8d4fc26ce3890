use crate::{
    MANIFEST_FILE, Origin, Package, PackageLock, RepoError, RepositoryConfig, SourceKind,
    VersionInfo, compare_versions,
    paths::{RepoPaths, StaleEntry, is_hidden, stale_entry},
    ports::{CacheStore, ExternalRepository, FileSystemOperations, NetworkOperations},
    repositories::{
        DirectoryRepository, HttpRepository, JsonCacheStore, LocalFileSystem, ReqwestClient,
        VersionCache,
    },
    services::{KeyedLocks, RemoteListing, VersionOrigins, merge_origins, select_best},
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Local package repository.
///
/// Owns the installed tree under its root, the registered external sources
/// and the version cache. Resolves name + pattern to an installed manifest,
/// downloading from a source when the best match lives remotely, and
/// publishes its own tree for other repositories to consume.
pub struct Repository<FS = LocalFileSystem>
where
    FS: FileSystemOperations,
{
    pub(crate) file_system: FS,
    pub(crate) paths: RepoPaths,
    pub(crate) sources: Vec<Arc<dyn ExternalRepository>>,
    pub(crate) cache: VersionCache,
    pub(crate) install_locks: KeyedLocks,
    pub(crate) download_timeout: Duration,
    pub(crate) compression_level: u32,
}

impl Repository<LocalFileSystem> {
    /// Opens the repository described by `config`, registering every enabled
    /// source it lists.
    pub async fn open(config: &RepositoryConfig) -> Result<Self, RepoError> {
        let mut repository = Self::with_file_system(LocalFileSystem, config).await?;
        let network = ReqwestClient::new()?;

        for source in sources_from_config(config, &LocalFileSystem, &network)? {
            repository.add_source(source);
        }

        Ok(repository)
    }
}

impl<FS> Repository<FS>
where
    FS: FileSystemOperations + 'static,
{
    /// Opens the repository without registering any source.
    pub async fn with_file_system(file_system: FS, config: &RepositoryConfig) -> Result<Self, RepoError> {
        config.validate()?;

        let paths = RepoPaths::new(config.root.clone());
        paths.create_directories(&file_system).await?;

        let store: Arc<dyn CacheStore> =
            Arc::new(JsonCacheStore::new(file_system.clone(), paths.cache_path()));
        let cache = VersionCache::load(store, config.cache_ttl()).await;

        let repository = Self {
            file_system,
            paths,
            sources: Vec::new(),
            cache,
            install_locks: KeyedLocks::new(),
            download_timeout: config.download_timeout(),
            compression_level: config.compression_level,
        };
        repository.sweep_stale_entries().await?;

        Ok(repository)
    }
}

impl<FS> Repository<FS>
where
    FS: FileSystemOperations,
{
    /// Registers a source. A source whose identifier is already registered
    /// is ignored.
    pub fn add_source(&mut self, source: Arc<dyn ExternalRepository>) {
        if self.source_by_id(source.identify()).is_some() {
            warn!(source = source.identify(), "Source already registered");
            return;
        }
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: Arc<dyn ExternalRepository>) -> Self {
        self.add_source(source);
        self
    }

    /// Overrides the configured download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    pub fn sources(&self) -> &[Arc<dyn ExternalRepository>] {
        &self.sources
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    pub(crate) fn source_by_id(&self, source_id: &str) -> Option<&Arc<dyn ExternalRepository>> {
        self.sources.iter().find(|s| s.identify() == source_id)
    }

    /// Removes what an interrupted install or archive build left under the
    /// module directories. A replaced directory whose successor never
    /// landed is put back.
    async fn sweep_stale_entries(&self) -> Result<(), RepoError> {
        for module in self.modules().await? {
            let module_dir = self.paths.module_dir(&module);

            for entry in self.file_system.read_dir(&module_dir).await? {
                let Some(stale) = stale_entry(&entry) else {
                    continue;
                };

                let result = match &stale {
                    StaleEntry::Partial => self.file_system.remove(&entry).await,
                    StaleEntry::Staging => self.file_system.remove_dir_all(&entry).await,
                    StaleEntry::Backup(label) => {
                        let original = module_dir.join(label);
                        if self.file_system.exists(&original).await {
                            self.file_system.remove_dir_all(&entry).await
                        } else {
                            info!(path = %original.display(), "Restoring interrupted install");
                            self.file_system.rename(&entry, &original).await
                        }
                    }
                };

                match result {
                    Ok(()) => debug!(path = %entry.display(), kind = ?stale, "Swept stale entry"),
                    Err(e) => warn!(path = %entry.display(), error = %e, "Failed to sweep stale entry"),
                }
            }
        }

        Ok(())
    }

    /// Installed module names, sorted.
    pub async fn modules(&self) -> Result<Vec<String>, RepoError> {
        self.child_dirs(self.paths.root()).await
    }

    /// Installed versions of `name`, lowest first.
    pub async fn local_versions(&self, name: &str) -> Result<Vec<String>, RepoError> {
        let mut versions = self.child_dirs(&self.paths.module_dir(name)).await?;
        versions.sort_by(|a, b| compare_versions(a, b));
        Ok(versions)
    }

    async fn child_dirs(&self, dir: &Path) -> Result<Vec<String>, RepoError> {
        if !self.file_system.is_dir(dir).await {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in self.file_system.read_dir(dir).await? {
            if is_hidden(&entry) || !self.file_system.is_dir(&entry).await {
                continue;
            }
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    /// Manifest of an installed version, `None` when not installed.
    pub async fn get_package(&self, name: &str, version: &str) -> Result<Option<Package>, RepoError> {
        let dir = self.paths.version_dir(name, version);
        if !self.file_system.is_dir(&dir).await {
            return Ok(None);
        }

        let manifest = dir.join(MANIFEST_FILE);
        if !self.file_system.is_file(&manifest).await {
            return Err(RepoError::ManifestMissing(dir));
        }

        let data = self.file_system.read_file(&manifest).await?;
        let content =
            std::str::from_utf8(&data).map_err(|e| RepoError::InvalidManifest(e.to_string()))?;
        Package::parse(content).map(Some)
    }

    /// Published metadata stored next to an installed version.
    pub async fn version_meta(&self, name: &str, version: &str) -> Option<VersionInfo> {
        let path = self.paths.version_meta_path(name, version);
        if !self.file_system.is_file(&path).await {
            return None;
        }

        match self.file_system.read_json(&path).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable version metadata");
                None
            }
        }
    }

    /// Candidate versions of `name` with their origin.
    ///
    /// With `only_local` unset every source is queried concurrently through
    /// the version cache; a source that fails contributes nothing.
    pub async fn get_package_versions(
        &self,
        name: &str,
        only_local: bool,
    ) -> Result<VersionOrigins, RepoError> {
        let mut local: BTreeMap<String, Option<VersionInfo>> = BTreeMap::new();
        for version in self.local_versions(name).await? {
            let meta = self.version_meta(name, &version).await;
            local.insert(version, meta);
        }

        if only_local || self.sources.is_empty() {
            return Ok(merge_origins(&local, &[]));
        }

        let listings = join_all(
            self.sources
                .iter()
                .map(|source| self.remote_listing(source.as_ref(), name, &local)),
        )
        .await;

        let origins = merge_origins(&local, &listings);
        for (version, origin) in &origins {
            if local.contains_key(version) && !origin.is_local() {
                info!(package = name, version = %version, source = %origin, "Remote content differs from local install");
            }
        }

        Ok(origins)
    }

    /// Cached listing of one source, with per-version metadata filled in for
    /// installed versions whose listing entry lacks size or hash.
    async fn remote_listing(
        &self,
        source: &dyn ExternalRepository,
        name: &str,
        local: &BTreeMap<String, Option<VersionInfo>>,
    ) -> RemoteListing {
        let mut versions = self.cache.get_versions(source, name).await;

        for (version, info) in versions.iter_mut() {
            let installed_with_meta = matches!(local.get(version), Some(Some(_)));
            if !installed_with_meta || info.is_verifiable() {
                continue;
            }

            match source.version_info(name, version).await {
                Ok(Some(detail)) => *info = detail,
                Ok(None) => {}
                Err(e) => {
                    debug!(source = source.identify(), package = name, version = %version, error = %e, "Version metadata lookup failed");
                }
            }
        }

        RemoteListing::new(source.identify(), versions)
    }

    /// Resolves `name` against `version_pattern` and returns the installed
    /// manifest of the winning version.
    ///
    /// A lock pin replaces the pattern when it equals or satisfies it. When
    /// the winner comes from a source it is downloaded and installed first;
    /// a failed download is an error, never a fallback to local content.
    /// `Ok(None)` means no version matches.
    pub async fn find_package(
        &self,
        name: &str,
        version_pattern: &str,
        lock: Option<&PackageLock>,
    ) -> Result<Option<Package>, RepoError> {
        let pattern = match lock {
            Some(lock) => lock.resolve_pattern(name, version_pattern),
            None => version_pattern,
        };
        if pattern != version_pattern {
            debug!(package = name, requested = version_pattern, pinned = pattern, "Using locked version");
        }

        let origins = self.get_package_versions(name, false).await?;
        let Some((version, origin)) = select_best(&origins, pattern) else {
            debug!(package = name, pattern, "No matching version");
            return Ok(None);
        };

        if let Origin::Remote(source_id) = origin {
            let source = self
                .source_by_id(source_id)
                .cloned()
                .ok_or_else(|| RepoError::download(name, version, format!("unknown source {}", source_id)))?;
            self.fetch_and_install(source.as_ref(), name, version).await?;
        }

        self.get_package(name, version).await
    }

    /// Deletes an installed version and its published metadata.
    pub async fn remove_package(&self, name: &str, version: &str) -> Result<bool, RepoError> {
        let dir = self.paths.version_dir(name, version);
        if !self.file_system.is_dir(&dir).await {
            return Ok(false);
        }

        self.file_system.remove_dir_all(&dir).await?;

        let meta = self.paths.version_meta_path(name, version);
        if self.file_system.exists(&meta).await {
            self.file_system.remove(&meta).await?;
        }

        info!(package = name, version, "Removed package version");
        Ok(true)
    }
}

/// Builds sources for every enabled entry of `config`, in priority order.
pub fn sources_from_config<FS, NET>(
    config: &RepositoryConfig,
    file_system: &FS,
    network: &NET,
) -> Result<Vec<Arc<dyn ExternalRepository>>, RepoError>
where
    FS: FileSystemOperations + 'static,
    NET: NetworkOperations + Clone + 'static,
{
    config
        .enabled_sources()
        .into_iter()
        .map(|source| -> Result<Arc<dyn ExternalRepository>, RepoError> {
            match source.kind() {
                SourceKind::Http => Ok(Arc::new(HttpRepository::from_config(network.clone(), source)?)),
                SourceKind::Directory => Ok(Arc::new(DirectoryRepository::from_config(
                    file_system.clone(),
                    source,
                )?)),
            }
        })
        .collect()
}
