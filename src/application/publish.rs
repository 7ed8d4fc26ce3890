use crate::{
    DOC_FILE, IndexEntry, RepoError, VersionIndex, VersionInfo,
    application::Repository,
    paths::RepoPaths,
    ports::FileSystemOperations,
    services::content_digest,
};
use std::path::Path;
use tracing::{debug, info, warn};

const IGNORE_RULES: &[u8] = b"*.tar.gz\n";

/// Outcome of [`Repository::index_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// `name@version` of every version whose archive was rebuilt.
    pub rebuilt: Vec<String>,
    /// Versions whose published entry already matched their content.
    pub unchanged: usize,
}

impl IndexReport {
    pub fn is_noop(&self) -> bool {
        self.rebuilt.is_empty()
    }
}

impl<FS> Repository<FS>
where
    FS: FileSystemOperations,
{
    /// Publishes the installed tree into `dest` using the repository layout.
    ///
    /// Versions whose size and content hash match the previously published
    /// `versions.json` entry keep their archive untouched; any other version
    /// gets a fresh archive and `<version>.json`. `modules.json` always lists
    /// every installed module, even when `only_modules` restricts which ones
    /// are indexed.
    pub async fn index_all(
        &self,
        dest: &Path,
        only_modules: Option<&[&str]>,
    ) -> Result<IndexReport, RepoError> {
        self.ensure_dir(dest).await?;
        let published = RepoPaths::new(dest);
        let modules = self.modules().await?;

        let mut report = IndexReport::default();
        for module in &modules {
            if let Some(only) = only_modules {
                if !only.contains(&module.as_str()) {
                    continue;
                }
            }
            self.index_module(&published, module, &mut report).await?;
        }

        self.file_system
            .write_json(&published.modules_path(), &modules)
            .await?;
        self.file_system
            .write_file(&published.ignore_path(), IGNORE_RULES)
            .await?;

        info!(
            dest = %dest.display(),
            modules = modules.len(),
            rebuilt = report.rebuilt.len(),
            unchanged = report.unchanged,
            "Indexed repository"
        );

        Ok(report)
    }

    async fn index_module(
        &self,
        published: &RepoPaths,
        module: &str,
        report: &mut IndexReport,
    ) -> Result<(), RepoError> {
        let index_path = published.version_index_path(module);
        let previous = self.load_index(&index_path).await;
        let mut index = VersionIndex::new();

        self.ensure_dir(&published.module_dir(module)).await?;

        for version in self.local_versions(module).await? {
            let dir = self.paths.version_dir(module, &version);
            let digest = content_digest(&self.file_system, &dir).await?;
            let entry = IndexEntry {
                size: digest.size,
                sha256: digest.sha256,
            };

            let archive = published.archive_path(module, &version);
            let meta_path = published.version_meta_path(module, &version);
            let up_to_date = previous.get(&version) == Some(&entry)
                && self.file_system.is_file(&archive).await;

            if up_to_date {
                debug!(package = module, version = %version, "Archive up to date");
                report.unchanged += 1;
                if !self.file_system.is_file(&meta_path).await {
                    self.file_system
                        .write_json(&meta_path, &VersionInfo::from(&entry))
                        .await?;
                }
            } else {
                self.remove_file_if_exists(&archive).await;
                if let Some(parent) = archive.parent() {
                    self.ensure_dir(parent).await?;
                }
                let files = self.build_archive(&dir, &archive).await?;
                self.file_system
                    .write_json(&meta_path, &VersionInfo::from(&entry))
                    .await?;

                info!(package = module, version = %version, files, "Rebuilt archive");
                report.rebuilt.push(format!("{}@{}", module, version));
            }

            let doc = dir.join(DOC_FILE);
            if self.file_system.is_file(&doc).await {
                self.file_system
                    .copy_file(&doc, &published.changelog_path(module, &version))
                    .await?;
            }

            index.insert(version, entry);
        }

        self.file_system.write_json(&index_path, &index).await
    }

    /// Previously published index; absent or unreadable reads as empty.
    async fn load_index(&self, path: &Path) -> VersionIndex {
        if !self.file_system.is_file(path).await {
            return VersionIndex::new();
        }

        match self.file_system.read_json(path).await {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable version index");
                VersionIndex::new()
            }
        }
    }

    async fn ensure_dir(&self, path: &Path) -> Result<(), RepoError> {
        self.file_system
            .create_dir_all(path)
            .await
            .map_err(|e| RepoError::DirectoryCreateFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}
