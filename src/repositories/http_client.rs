use crate::{RepoError, ports::NetworkOperations};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("modrepo-core/", env!("CARGO_PKG_VERSION"));

/// [`NetworkOperations`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, RepoError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RepoError::network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, RepoError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RepoError::network(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::network(format!("GET {} returned {}", url, status)));
        }

        Ok(response)
    }
}

#[async_trait]
impl NetworkOperations for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, RepoError> {
        let response = self.send(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RepoError::network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, RepoError> {
        let mut response = self.send(url).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RepoError::network(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(written)
    }
}
