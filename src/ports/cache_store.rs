use crate::{CacheDocument, RepoError};
use async_trait::async_trait;

/// Persistence behind the version cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> Result<CacheDocument, RepoError>;

    async fn save(&self, document: &CacheDocument) -> Result<(), RepoError>;
}
