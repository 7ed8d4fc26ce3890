use crate::{
    RepoError, SourceConfig, VersionInfo, VersionListing,
    paths::{ARCHIVE_EXTENSION, VERSION_INDEX_FILE},
    ports::{ExternalRepository, NetworkOperations},
};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Remote source serving a published repository tree over HTTP:
///
/// * `<base>/<name>/versions.json`
/// * `<base>/<name>/<version>.json`
/// * `<base>/<name>/<version>.tar.gz`
pub struct HttpRepository<NET>
where
    NET: NetworkOperations,
{
    network: NET,
    base_url: String,
}

impl<NET> HttpRepository<NET>
where
    NET: NetworkOperations,
{
    pub fn new(network: NET, base_url: &str) -> Result<Self, RepoError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = network.parse_url(&base_url)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RepoError::ValidationError(format!(
                "HttpRepository requires an http(s) URL, got '{}'",
                base_url
            )));
        }

        Ok(Self { network, base_url })
    }

    pub fn from_config(network: NET, config: &SourceConfig) -> Result<Self, RepoError> {
        Self::new(network, &config.url)
    }

    fn get_index_url(&self, package_name: &str) -> String {
        format!("{}/{}/{}", self.base_url, package_name, VERSION_INDEX_FILE)
    }

    fn get_version_meta_url(&self, package_name: &str, version: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, package_name, version)
    }

    fn get_download_url(&self, package_name: &str, version: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            self.base_url, package_name, version, ARCHIVE_EXTENSION
        )
    }
}

#[async_trait]
impl<NET> ExternalRepository for HttpRepository<NET>
where
    NET: NetworkOperations + Send + Sync,
{
    fn identify(&self) -> &str {
        &self.base_url
    }

    async fn list_versions(&self, package_name: &str) -> Result<VersionListing, RepoError> {
        let data = self
            .network
            .get(&self.get_index_url(package_name))
            .await
            .map_err(|e| RepoError::external(&self.base_url, e))?;

        serde_json::from_slice(&data).map_err(|e| RepoError::external(&self.base_url, e))
    }

    async fn version_info(
        &self,
        package_name: &str,
        version: &str,
    ) -> Result<Option<VersionInfo>, RepoError> {
        let url = self.get_version_meta_url(package_name, version);
        match self.network.get(&url).await {
            Ok(data) => Ok(Some(
                serde_json::from_slice(&data).map_err(|e| RepoError::external(&self.base_url, e))?,
            )),
            Err(e) => {
                debug!(url = %url, error = %e, "No per-version metadata");
                Ok(None)
            }
        }
    }

    async fn download(
        &self,
        package_name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<(), RepoError> {
        let url = self.get_download_url(package_name, version);
        let bytes = self.network.download_to_file(&url, dest).await?;
        debug!(url = %url, bytes, "Downloaded archive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockNetwork {
        responses: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NetworkOperations for MockNetwork {
        async fn get(&self, url: &str) -> Result<Vec<u8>, RepoError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| RepoError::network(format!("GET {} returned 404 Not Found", url)))
        }

        async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, RepoError> {
            let data = self.get(url).await?;
            std::fs::write(dest, &data)?;
            Ok(data.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_list_versions_reads_published_index() {
        let mut network = MockNetwork::default();
        network.responses.insert(
            "https://modules.example.org/http/versions.json".into(),
            br#"{"1.0.0":{"size":10,"sha256":"aa"},"1.1.0":{"size":12,"sha256":"bb"}}"#.to_vec(),
        );

        let repo = HttpRepository::new(network, "https://modules.example.org/").unwrap();
        let versions = repo.list_versions("http").await.unwrap();

        assert_eq!(repo.identify(), "https://modules.example.org");
        assert_eq!(versions.len(), 2);
        assert_eq!(versions["1.1.0"].size, Some(12));
    }

    #[tokio::test]
    async fn test_missing_index_is_external_failure() {
        let repo = HttpRepository::new(MockNetwork::default(), "https://modules.example.org").unwrap();
        assert!(matches!(
            repo.list_versions("nope").await,
            Err(RepoError::ExternalFetchFailed { .. })
        ));
        assert!(repo.version_info("nope", "1.0.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_writes_archive() {
        let mut network = MockNetwork::default();
        network.responses.insert(
            "https://modules.example.org/http/1.0.0.tar.gz".into(),
            b"archive-bytes".to_vec(),
        );
        let repo = HttpRepository::new(network, "https://modules.example.org").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.0.0.tar.gz");
        repo.download("http", "1.0.0", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HttpRepository::new(MockNetwork::default(), "ftp://example.org").is_err());
    }
}
