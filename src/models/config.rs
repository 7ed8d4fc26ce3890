use crate::RepoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Settings for a local package repository and the sources it pulls from.
///
/// Usually read from a `repository.toml`:
///
/// ```toml
/// root = "/var/lib/modules"
/// cache_ttl_secs = 600
///
/// [[sources]]
/// name = "central"
/// url = "https://modules.example.org/index"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub root: PathBuf,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_download_timeout() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}

impl RepositoryConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout_secs = timeout.as_secs();
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RepoError> {
        let config: Self =
            toml::from_str(content).map_err(|e| RepoError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Blocking read of a TOML file. Meant for startup, before the runtime
    /// serves any request.
    pub fn load(path: &Path) -> Result<Self, RepoError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), RepoError> {
        if self.root.as_os_str().is_empty() {
            return Err(RepoError::ConfigError(
                "Repository root cannot be empty".into(),
            ));
        }

        if self.compression_level > 9 {
            return Err(RepoError::ConfigError(format!(
                "Invalid compression level {}. Must be between 0 and 9",
                self.compression_level
            )));
        }

        if self.download_timeout_secs == 0 {
            return Err(RepoError::ConfigError(
                "Download timeout must be greater than zero".into(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() || source.url.trim().is_empty() {
                return Err(RepoError::ConfigError(
                    "Source name and url cannot be empty".into(),
                ));
            }
            if !names.insert(source.name.as_str()) {
                return Err(RepoError::ConfigError(format!(
                    "Duplicate source name: {}",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Enabled sources, lowest priority value first. Ties keep file order.
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        let mut sources: Vec<&SourceConfig> = self.sources.iter().filter(|s| s.enabled).collect();
        sources.sort_by_key(|s| s.priority);
        sources
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}

impl SourceConfig {
    pub fn new<S: Into<String>>(name: S, url: S) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            priority: 100,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn kind(&self) -> SourceKind {
        if self.is_remote() {
            SourceKind::Http
        } else {
            SourceKind::Directory
        }
    }

    pub fn is_local(&self) -> bool {
        self.url.starts_with("file://") || !self.url.contains("://")
    }

    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.url.strip_prefix("file://") {
            Some(PathBuf::from(path))
        } else if !self.url.contains("://") {
            Some(PathBuf::from(&self.url))
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "directory")]
    Directory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Directory => write!(f, "directory"),
        }
    }
}
