use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata published for one package version.
///
/// Stored next to an installed version as `<version>.json` and returned by
/// external sources when listing versions. `size` and `sha256` describe the
/// published file set, not the working tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Identifier of the source this version was fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VersionInfo {
    pub fn new(size: u64, sha256: impl Into<String>) -> Self {
        Self {
            size: Some(size),
            sha256: Some(sha256.into()),
            repo: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Both size and hash are declared.
    pub fn is_verifiable(&self) -> bool {
        self.size.is_some() && self.sha256.is_some()
    }

    /// Compares declared size and hash. Unverifiable metadata never matches.
    pub fn same_content(&self, other: &VersionInfo) -> bool {
        self.is_verifiable()
            && other.is_verifiable()
            && self.size == other.size
            && self.sha256 == other.sha256
    }
}

impl From<&IndexEntry> for VersionInfo {
    fn from(entry: &IndexEntry) -> Self {
        Self::new(entry.size, entry.sha256.clone())
    }
}

/// Versions offered by one source for one package.
pub type VersionListing = BTreeMap<String, VersionInfo>;

/// One row of a published `versions.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub size: u64,
    pub sha256: String,
}

/// Published catalog of one module: version -> {size, sha256}.
pub type VersionIndex = BTreeMap<String, IndexEntry>;
