use crate::{RepoError, VersionInfo, VersionListing};
use async_trait::async_trait;
use std::path::Path;

/// A registry this repository can pull package versions from.
///
/// Two sources reporting the same identifier are treated as one source for
/// caching and origin attribution.
#[async_trait]
pub trait ExternalRepository: Send + Sync {
    /// Stable identifier, usually the source URL.
    fn identify(&self) -> &str;

    async fn list_versions(&self, package_name: &str) -> Result<VersionListing, RepoError>;

    /// Per-version metadata for sources whose listing omits size or hash.
    async fn version_info(
        &self,
        _package_name: &str,
        _version: &str,
    ) -> Result<Option<VersionInfo>, RepoError> {
        Ok(None)
    }

    /// Fetches the archive of `package_name@version` to `dest`.
    async fn download(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<(), RepoError>;
}
