//! Installation, archiving and vendoring of package versions.
//!
//! Every write of a version directory goes through a hidden staging sibling
//! that is renamed into place only once fully populated, so an interrupted
//! or rejected install leaves the previous tree untouched.

use crate::{
    MANIFEST_FILE, Package, RepoError, VersionInfo,
    application::Repository,
    paths::{backup_path, partial_path, staging_path},
    ports::{ExternalRepository, FileSystemOperations},
    repositories::archive::{ArchiveReader, pack_directory, unpack_into},
    services::content_digest,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What a downloaded archive must contain.
struct ExpectedContent<'a> {
    name: &'a str,
    version: &'a str,
    sha256: Option<&'a str>,
}

impl<FS> Repository<FS>
where
    FS: FileSystemOperations,
{
    /// Installs the package rooted at `path`, replacing any existing install
    /// of the same name and version.
    pub async fn install_from_directory(&self, path: &Path) -> Result<Package, RepoError> {
        let manifest_path = path.join(MANIFEST_FILE);
        if !self.file_system.is_file(&manifest_path).await {
            return Err(RepoError::ManifestMissing(path.to_path_buf()));
        }

        let data = self.file_system.read_file(&manifest_path).await?;
        let content =
            std::str::from_utf8(&data).map_err(|e| RepoError::InvalidManifest(e.to_string()))?;
        let package = Package::parse(content)?;

        let version = package.version().to_string();
        let _guard = self.install_locks.lock(package.name(), &version).await;
        let target = self.paths.version_dir(package.name(), &version);
        let staging = self
            .create_staging(&self.paths.module_dir(package.name()), &version)
            .await?;

        if let Err(e) = self.file_system.copy_dir(path, &staging).await {
            self.discard(&staging).await;
            return Err(e);
        }

        self.commit_staged(&staging, &target).await?;
        info!(package = %package, from = %path.display(), "Installed package from directory");

        Ok(package)
    }

    /// Installs a gzip tar archive.
    ///
    /// The manifest is located first; an archive without one is rejected
    /// before anything is written. The archive is then read again from the
    /// start and extracted into staging.
    pub async fn install_from_archive(&self, path: &Path) -> Result<Package, RepoError> {
        let package = self.read_archive_manifest(path).await?;
        let _guard = self
            .install_locks
            .lock(package.name(), &package.version().to_string())
            .await;
        self.extract_archive(path, package, None).await
    }

    /// First pass: the manifest entry alone, nothing written.
    async fn read_archive_manifest(&self, path: &Path) -> Result<Package, RepoError> {
        let archive_path = path.to_path_buf();
        let manifest = tokio::task::spawn_blocking(move || {
            let reader = ArchiveReader::open(&archive_path)?;
            reader.read_entry(MANIFEST_FILE, |_, content| Package::from_reader(content))
        })
        .await??;

        manifest.ok_or_else(|| {
            warn!(archive = %path.display(), "Archive has no manifest");
            RepoError::ManifestMissing(path.to_path_buf())
        })
    }

    /// Second pass: extracts into staging, verifies, and swaps into place.
    /// Callers hold the install lock for the package version.
    async fn extract_archive(
        &self,
        path: &Path,
        package: Package,
        expected: Option<ExpectedContent<'_>>,
    ) -> Result<Package, RepoError> {
        if let Some(expected) = &expected {
            if package.name() != expected.name || package.version().to_string() != expected.version {
                return Err(RepoError::InvalidManifest(format!(
                    "archive contains {} instead of {}@{}",
                    package, expected.name, expected.version
                )));
            }
        }

        let version = package.version().to_string();
        let target = self.paths.version_dir(package.name(), &version);
        let staging = self
            .create_staging(&self.paths.module_dir(package.name()), &version)
            .await?;

        if let Err(e) = self.populate_staging(path, &staging, expected.as_ref()).await {
            self.discard(&staging).await;
            return Err(e);
        }

        self.commit_staged(&staging, &target).await?;
        info!(package = %package, archive = %path.display(), "Installed package from archive");

        Ok(package)
    }

    async fn populate_staging(
        &self,
        archive: &Path,
        staging: &Path,
        expected: Option<&ExpectedContent<'_>>,
    ) -> Result<(), RepoError> {
        let (archive_path, staging_dir) = (archive.to_path_buf(), staging.to_path_buf());
        let files = tokio::task::spawn_blocking(move || {
            let reader = ArchiveReader::open(&archive_path)?;
            unpack_into(&reader, &staging_dir)
        })
        .await??;
        debug!(archive = %archive.display(), files, "Extracted archive");

        if let Some(expected_hash) = expected.and_then(|e| e.sha256) {
            let digest = content_digest(&self.file_system, staging).await?;
            if !digest.sha256.eq_ignore_ascii_case(expected_hash) {
                return Err(RepoError::ChecksumMismatch(format!(
                    "{}@{}: expected {}, got {}",
                    expected.map(|e| e.name).unwrap_or_default(),
                    expected.map(|e| e.version).unwrap_or_default(),
                    expected_hash,
                    digest.sha256
                )));
            }
        }

        Ok(())
    }

    /// Downloads `name@version` from `source`, installs it and records the
    /// source's metadata as `<version>.json`.
    ///
    /// Serialized per package version. A caller that waited on the lock
    /// while another one installed the same content returns that install.
    pub(crate) async fn fetch_and_install(
        &self,
        source: &dyn ExternalRepository,
        name: &str,
        version: &str,
    ) -> Result<Package, RepoError> {
        let _guard = self.install_locks.lock(name, version).await;
        let remote_info = self.remote_info(source, name, version).await;

        if self.installed_with(name, version, &remote_info).await {
            debug!(package = name, version, "Already installed from source");
            return self
                .get_package(name, version)
                .await?
                .ok_or_else(|| RepoError::PackageNotFound(format!("{}@{}", name, version)));
        }

        let archive = self.paths.archive_path(name, version);
        self.file_system
            .create_dir_all(&self.paths.module_dir(name))
            .await?;

        info!(source = source.identify(), package = name, version, "Downloading package");
        let outcome = match tokio::time::timeout(
            self.download_timeout,
            source.download(name, version, &archive),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ RepoError::DownloadFailed { .. })) => Err(e),
            Ok(Err(e)) => Err(RepoError::download(name, version, e)),
            Err(_) => Err(RepoError::download(
                name,
                version,
                format!("timed out after {:?}", self.download_timeout),
            )),
        };

        if let Err(e) = outcome {
            warn!(source = source.identify(), package = name, version, error = %e, "Download failed");
            self.remove_file_if_exists(&archive).await;
            return Err(e);
        }

        let installed = match self.read_archive_manifest(&archive).await {
            Ok(package) => {
                let expected = ExpectedContent {
                    name,
                    version,
                    sha256: remote_info.sha256.as_deref(),
                };
                self.extract_archive(&archive, package, Some(expected)).await
            }
            Err(e) => Err(e),
        };
        self.remove_file_if_exists(&archive).await;
        let package = installed?;

        let meta = remote_info.with_repo(source.identify());
        self.file_system
            .write_json(&self.paths.version_meta_path(name, version), &meta)
            .await?;

        Ok(package)
    }

    async fn installed_with(&self, name: &str, version: &str, remote_info: &VersionInfo) -> bool {
        if !self.file_system.is_dir(&self.paths.version_dir(name, version)).await {
            return false;
        }
        self.version_meta(name, version)
            .await
            .is_some_and(|meta| meta.same_content(remote_info))
    }

    /// Metadata the source declares for one version: the cached listing
    /// entry, or a per-version lookup when that entry is incomplete.
    async fn remote_info(
        &self,
        source: &dyn ExternalRepository,
        name: &str,
        version: &str,
    ) -> VersionInfo {
        let listed = self
            .cache
            .cached(source.identify(), name)
            .and_then(|entry| entry.versions.get(version).cloned());

        match listed {
            Some(info) if info.is_verifiable() => info,
            listed => match source.version_info(name, version).await {
                Ok(Some(info)) => info,
                _ => listed.unwrap_or_default(),
            },
        }
    }

    /// Archive of an installed version at `<root>/<name>/<version>.tar.gz`.
    ///
    /// An existing archive is returned as is. `None` when the version is not
    /// installed.
    pub async fn archive_package(&self, package: &Package) -> Result<Option<PathBuf>, RepoError> {
        let version = package.version().to_string();
        let archive = self.paths.archive_path(package.name(), &version);
        let _guard = self.install_locks.lock(package.name(), &version).await;

        if self.file_system.is_file(&archive).await {
            debug!(archive = %archive.display(), "Archive already present");
            return Ok(Some(archive));
        }

        let dir = self.paths.version_dir(package.name(), &version);
        if !self.file_system.is_dir(&dir).await {
            return Ok(None);
        }

        self.build_archive(&dir, &archive).await?;
        Ok(Some(archive))
    }

    /// Packs `dir` into `dest` through a temporary file renamed into place.
    pub(crate) async fn build_archive(&self, dir: &Path, dest: &Path) -> Result<usize, RepoError> {
        let partial = partial_path(dest)
            .ok_or_else(|| RepoError::archive(format!("Invalid archive path {}", dest.display())))?;

        let (source, target, level) = (dir.to_path_buf(), partial.clone(), self.compression_level);
        let packed = tokio::task::spawn_blocking(move || pack_directory(&source, &target, level))
            .await
            .map_err(RepoError::from)
            .and_then(|result| result);

        let files = match packed {
            Ok(files) => files,
            Err(e) => {
                self.remove_file_if_exists(&partial).await;
                return Err(e);
            }
        };

        self.file_system.rename(&partial, dest).await?;
        debug!(archive = %dest.display(), files, "Built archive");
        Ok(files)
    }

    /// Replaces `vendor_dir/<name>` with a copy of the installed version.
    pub async fn copy_to(&self, package: &Package, vendor_dir: &Path) -> Result<PathBuf, RepoError> {
        let source = self
            .paths
            .version_dir(package.name(), &package.version().to_string());
        if !self.file_system.is_dir(&source).await {
            return Err(RepoError::PackageNotFound(package.id()));
        }

        let target = vendor_dir.join(package.name());
        let _guard = self
            .install_locks
            .lock(&vendor_dir.to_string_lossy(), package.name())
            .await;
        let staging = self.create_staging(vendor_dir, package.name()).await?;

        if let Err(e) = self.file_system.copy_dir(&source, &staging).await {
            self.discard(&staging).await;
            return Err(e);
        }

        self.commit_staged(&staging, &target).await?;
        info!(package = %package, vendor = %target.display(), "Vendored package");

        Ok(target)
    }

    async fn create_staging(&self, parent: &Path, label: &str) -> Result<PathBuf, RepoError> {
        self.file_system.create_dir_all(parent).await?;
        let staging = staging_path(parent, label);
        self.file_system.create_dir_all(&staging).await?;
        Ok(staging)
    }

    /// Swaps a populated staging directory into `target`. The previous
    /// directory is deleted only after the swap succeeded, and restored if
    /// it did not.
    async fn commit_staged(&self, staging: &Path, target: &Path) -> Result<(), RepoError> {
        if !self.file_system.exists(target).await {
            if let Err(e) = self.file_system.rename(staging, target).await {
                self.discard(staging).await;
                return Err(e);
            }
            return Ok(());
        }

        let parent = target.parent().unwrap_or(Path::new("."));
        let label = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("previous");
        let backup = backup_path(parent, label);

        if let Err(e) = self.file_system.rename(target, &backup).await {
            self.discard(staging).await;
            return Err(e);
        }

        if let Err(e) = self.file_system.rename(staging, target).await {
            if let Err(restore) = self.file_system.rename(&backup, target).await {
                warn!(target = %target.display(), error = %restore, "Failed to restore previous install");
            }
            self.discard(staging).await;
            return Err(e);
        }

        if let Err(e) = self.file_system.remove_dir_all(&backup).await {
            warn!(path = %backup.display(), error = %e, "Failed to remove replaced install");
        }

        Ok(())
    }

    async fn discard(&self, staging: &Path) {
        if let Err(e) = self.file_system.remove_dir_all(staging).await {
            warn!(path = %staging.display(), error = %e, "Failed to remove staging directory");
        }
    }

    pub(crate) async fn remove_file_if_exists(&self, path: &Path) {
        if self.file_system.exists(path).await {
            if let Err(e) = self.file_system.remove(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove file");
            }
        }
    }
}
