use crate::{RepoError, ports::FileSystemOperations};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const CACHE_FILE: &str = "cache.json";
pub const VERSION_INDEX_FILE: &str = "versions.json";
pub const MODULES_FILE: &str = "modules.json";
pub const IGNORE_FILE: &str = ".gitignore";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

const STAGING_KIND: &str = "staging";
const BACKUP_KIND: &str = "old";
const PARTIAL_SUFFIX: &str = ".part";

/// Layout of a repository tree. The same layout serves the local install
/// root and a published destination:
///
/// ```text
/// <root>/modules.json
/// <root>/cache.json
/// <root>/<name>/versions.json
/// <root>/<name>/<version>/          installed files
/// <root>/<name>/<version>.json      published metadata
/// <root>/<name>/<version>.tar.gz    archive
/// <root>/<name>/<version>.md        changelog
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    root: PathBuf,
}

impl RepoPaths {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.module_dir(name).join(version)
    }

    pub fn version_meta_path(&self, name: &str, version: &str) -> PathBuf {
        self.module_dir(name).join(format!("{}.json", version))
    }

    pub fn archive_path(&self, name: &str, version: &str) -> PathBuf {
        self.module_dir(name)
            .join(format!("{}.{}", version, ARCHIVE_EXTENSION))
    }

    pub fn changelog_path(&self, name: &str, version: &str) -> PathBuf {
        self.module_dir(name).join(format!("{}.md", version))
    }

    pub fn version_index_path(&self, name: &str) -> PathBuf {
        self.module_dir(name).join(VERSION_INDEX_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root.join(CACHE_FILE)
    }

    pub fn modules_path(&self) -> PathBuf {
        self.root.join(MODULES_FILE)
    }

    pub fn ignore_path(&self) -> PathBuf {
        self.root.join(IGNORE_FILE)
    }

    pub async fn create_directories<FS: FileSystemOperations>(
        &self,
        fs: &FS,
    ) -> Result<(), RepoError> {
        fs.create_dir_all(&self.root).await
    }
}

/// Hidden entries hold staging data and never count as modules or versions.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true)
}

/// Hidden `.<label>.staging-<uuid>` directory next to `parent`'s children.
pub fn staging_path(parent: &Path, label: &str) -> PathBuf {
    hidden_sibling(parent, label, STAGING_KIND)
}

/// Hidden `.<label>.old-<uuid>` name holding a replaced directory.
pub fn backup_path(parent: &Path, label: &str) -> PathBuf {
    hidden_sibling(parent, label, BACKUP_KIND)
}

/// Hidden `.<file>.part` name an archive is written to before the rename.
pub fn partial_path(dest: &Path) -> Option<PathBuf> {
    let file_name = dest.file_name()?.to_str()?;
    Some(dest.with_file_name(format!(".{}{}", file_name, PARTIAL_SUFFIX)))
}

fn hidden_sibling(parent: &Path, label: &str, kind: &str) -> PathBuf {
    parent.join(format!(".{}.{}-{}", label, kind, Uuid::new_v4().simple()))
}

/// Leftover of an interrupted install or archive build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleEntry {
    Staging,
    /// Replaced directory; the label names the directory it came from.
    Backup(String),
    Partial,
}

pub fn stale_entry(path: &Path) -> Option<StaleEntry> {
    let name = path.file_name()?.to_str()?.strip_prefix('.')?;

    if name.ends_with(PARTIAL_SUFFIX) {
        return Some(StaleEntry::Partial);
    }
    if let Some((_, nonce)) = name.rsplit_once(&format!(".{}-", STAGING_KIND)) {
        return (!nonce.is_empty()).then_some(StaleEntry::Staging);
    }
    match name.rsplit_once(&format!(".{}-", BACKUP_KIND)) {
        Some((label, nonce)) if !label.is_empty() && !nonce.is_empty() => {
            Some(StaleEntry::Backup(label.to_string()))
        }
        _ => None,
    }
}
