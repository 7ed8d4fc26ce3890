use crate::{RepoError, factories::PackageFactory};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// File name of the manifest at the root of every package version.
pub const MANIFEST_FILE: &str = "package.toml";

/// Documentation file kept out of archives and content hashes.
pub const DOC_FILE: &str = "README.md";

/// Manifest of one package version.
///
/// Immutable once parsed. Two manifests are equal when name and version
/// match; `size` and `sha256` describe the published archive content and
/// may be absent for packages that were never published.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    version: Version,
    author: Option<String>,
    description: Option<String>,
    size: Option<u64>,
    sha256: Option<String>,
    dependencies: BTreeMap<String, String>,
    extra: BTreeMap<String, toml::Value>,
}

/// On-disk shape of `package.toml`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct ManifestDocument {
    pub name: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    // Flattened extras precede the dependency table so plain keys are
    // written before any table.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl Package {
    pub(crate) fn from_parts(
        name: String,
        version: Version,
        author: Option<String>,
        description: Option<String>,
        size: Option<u64>,
        sha256: Option<String>,
        dependencies: BTreeMap<String, String>,
        extra: BTreeMap<String, toml::Value>,
    ) -> Self {
        Self {
            name,
            version,
            author,
            description,
            size,
            sha256,
            dependencies,
            extra,
        }
    }

    /// Parses manifest text.
    pub fn parse(content: &str) -> Result<Self, RepoError> {
        let document: ManifestDocument =
            toml::from_str(content).map_err(|e| RepoError::InvalidManifest(e.to_string()))?;
        PackageFactory::from_document(document)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, RepoError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    pub fn from_path(path: &Path) -> Result<Self, RepoError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Loads the manifest at the root of a package directory.
    pub fn from_dir(dir: &Path) -> Result<Self, RepoError> {
        let manifest = dir.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(RepoError::ManifestMissing(dir.to_path_buf()));
        }
        Self::from_path(&manifest)
    }

    pub fn to_toml_string(&self) -> Result<String, RepoError> {
        let document = ManifestDocument {
            name: self.name.clone(),
            version: self.version.to_string(),
            author: self.author.clone(),
            description: self.description.clone(),
            size: self.size,
            sha256: self.sha256.clone(),
            dependencies: self.dependencies.clone(),
            extra: self.extra.clone(),
        };
        toml::to_string(&document).map_err(|e| RepoError::SerializationError(e.to_string()))
    }

    /// Writes `package.toml` into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), RepoError> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(MANIFEST_FILE), self.to_toml_string()?)?;
        Ok(())
    }

    /// Returns `name@version`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared size of the published file set.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Declared content hash of the published file set.
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    /// Declared dependencies as name -> version pattern. Not resolved here.
    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    pub fn extra(&self) -> &BTreeMap<String, toml::Value> {
        &self.extra
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Package {}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
