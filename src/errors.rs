use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Malformed version `{0}`")]
    MalformedVersion(String),

    #[error("Malformed version pattern `{0}`")]
    MalformedPattern(String),

    #[error("Version cache corrupted: {0}")]
    CacheCorrupt(String),

    #[error("External repository `{source_id}` failed: {reason}")]
    ExternalFetchFailed { source_id: String, reason: String },

    #[error("Download of `{package}@{version}` failed: {reason}")]
    DownloadFailed {
        package: String,
        version: String,
        reason: String,
    },

    #[error("No package manifest found in `{0}`")]
    ManifestMissing(PathBuf),

    #[error("Invalid package manifest: {0}")]
    InvalidManifest(String),

    #[error("Failed to create directory `{path}`: {reason}")]
    DirectoryCreateFailed { path: PathBuf, reason: String },

    #[error("Checksum verification failed for package: {0}")]
    ChecksumMismatch(String),

    #[error("Package `{0}` not found")]
    PackageNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RepoError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::ArchiveError(msg.into())
    }

    pub fn external<S: Into<String>, R: ToString>(source_id: S, reason: R) -> Self {
        Self::ExternalFetchFailed {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download<R: ToString>(package: &str, version: &str, reason: R) -> Self {
        Self::DownloadFailed {
            package: package.to_string(),
            version: version.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Self::IoError(e.into())
        } else {
            Self::DeserializationError(e.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for RepoError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::IoError(std::io::Error::other(e))
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
