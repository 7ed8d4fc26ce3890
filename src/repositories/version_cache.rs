//! TTL-bounded cache of remote version listings.
//!
//! Keyed by (source identifier, package name). A listing is served from
//! the cache while younger than the TTL. A failed refresh keeps the previous
//! listing (or an empty one) and still bumps its timestamp, so a broken
//! source is retried at most once per TTL window.

use crate::{
    CacheDocument, CacheEntry, RepoError, VersionListing,
    ports::{CacheStore, ExternalRepository, FileSystemOperations},
    services::KeyedLocks,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Default cache TTL (10 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

pub struct VersionCache {
    store: Arc<dyn CacheStore>,
    document: Mutex<CacheDocument>,
    key_locks: KeyedLocks,
    save_lock: tokio::sync::Mutex<()>,
    ttl: Duration,
}

impl VersionCache {
    /// Loads the persisted cache. An unreadable or corrupt document starts
    /// the cache empty.
    pub async fn load(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        let document = match store.load().await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable version cache");
                CacheDocument::default()
            }
        };

        Self::with_document(store, document, ttl)
    }

    pub fn with_document(store: Arc<dyn CacheStore>, document: CacheDocument, ttl: Duration) -> Self {
        Self {
            store,
            document: Mutex::new(document),
            key_locks: KeyedLocks::new(),
            save_lock: tokio::sync::Mutex::new(()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Versions of `package_name` known to `source`.
    ///
    /// Never fails: a source error degrades to the last known listing.
    pub async fn get_versions(
        &self,
        source: &dyn ExternalRepository,
        package_name: &str,
    ) -> VersionListing {
        let source_id = source.identify();
        let _guard = self.key_locks.lock(source_id, package_name).await;

        let now = now_ms();
        let previous = self.cached(source_id, package_name);

        if let Some(entry) = &previous {
            if entry.is_fresh(now, self.ttl_ms()) {
                debug!(source = source_id, package = package_name, "Version cache hit");
                return entry.versions.clone();
            }
        }

        let versions = match source.list_versions(package_name).await {
            Ok(versions) => {
                debug!(
                    source = source_id,
                    package = package_name,
                    count = versions.len(),
                    "Refreshed remote versions"
                );
                versions
            }
            Err(e) => {
                warn!(
                    source = source_id,
                    package = package_name,
                    error = %e,
                    "Listing versions failed, keeping cached listing"
                );
                previous.map(|entry| entry.versions).unwrap_or_default()
            }
        };

        self.lock_document()
            .insert(source_id, package_name, CacheEntry::new(versions.clone(), now));
        self.persist().await;

        versions
    }

    /// Current entry, fresh or not.
    pub fn cached(&self, source_id: &str, package_name: &str) -> Option<CacheEntry> {
        self.lock_document().get(source_id, package_name).cloned()
    }

    pub async fn invalidate(&self, source_id: &str, package_name: &str) {
        let removed = self.lock_document().remove(source_id, package_name);
        if removed.is_some() {
            self.persist().await;
        }
    }

    pub async fn clear(&self) {
        *self.lock_document() = CacheDocument::default();
        self.persist().await;
    }

    pub fn len(&self) -> usize {
        self.lock_document().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn lock_document(&self) -> std::sync::MutexGuard<'_, CacheDocument> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Best effort; persistence failures are logged and dropped.
    async fn persist(&self) {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.lock_document().clone();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Failed to persist version cache");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stores the cache document as JSON at a fixed path.
pub struct JsonCacheStore<FS>
where
    FS: FileSystemOperations,
{
    file_system: FS,
    path: PathBuf,
}

impl<FS> JsonCacheStore<FS>
where
    FS: FileSystemOperations,
{
    pub fn new(file_system: FS, path: PathBuf) -> Self {
        Self { file_system, path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl<FS> CacheStore for JsonCacheStore<FS>
where
    FS: FileSystemOperations + Send + Sync,
{
    async fn load(&self) -> Result<CacheDocument, RepoError> {
        if !self.file_system.exists(&self.path).await {
            return Ok(CacheDocument::default());
        }

        self.file_system
            .read_json(&self.path)
            .await
            .map_err(|e| RepoError::CacheCorrupt(e.to_string()))
    }

    async fn save(&self, document: &CacheDocument) -> Result<(), RepoError> {
        self.file_system.write_json(&self.path, document).await
    }
}
