use crate::RepoError;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait NetworkOperations: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, RepoError>;

    /// Streams the body of `url` into `dest`, returning the byte count.
    async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, RepoError>;

    fn parse_url(&self, url: &str) -> Result<url::Url, RepoError> {
        url::Url::parse(url).map_err(|e| RepoError::network(format!("Invalid URL '{}': {}", url, e)))
    }
}
