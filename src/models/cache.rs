use crate::VersionListing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted form of the version cache (`cache.json`):
/// `{ "external": { <source>: { <package>: { "versions": {..}, "time": <epoch-ms> } } } }`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDocument {
    #[serde(default)]
    pub external: BTreeMap<String, BTreeMap<String, CacheEntry>>,
}

impl CacheDocument {
    pub fn get(&self, source: &str, package: &str) -> Option<&CacheEntry> {
        self.external.get(source)?.get(package)
    }

    pub fn insert(&mut self, source: &str, package: &str, entry: CacheEntry) {
        self.external
            .entry(source.to_string())
            .or_default()
            .insert(package.to_string(), entry);
    }

    pub fn remove(&mut self, source: &str, package: &str) -> Option<CacheEntry> {
        let packages = self.external.get_mut(source)?;
        let removed = packages.remove(package);
        if packages.is_empty() {
            self.external.remove(source);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.external.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    #[serde(default)]
    pub versions: VersionListing,

    /// Fetch time in epoch milliseconds.
    #[serde(default)]
    pub time: i64,
}

impl CacheEntry {
    pub fn new(versions: VersionListing, time: i64) -> Self {
        Self { versions, time }
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.time < ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VersionInfo;

    #[test]
    fn test_document_shape() {
        let mut document = CacheDocument::default();
        let mut versions = VersionListing::new();
        versions.insert("1.0.0".into(), VersionInfo::new(3, "aa"));
        document.insert("https://a.example.org", "http", CacheEntry::new(versions, 1000));

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(
            json["external"]["https://a.example.org"]["http"]["time"],
            serde_json::json!(1000)
        );
        assert_eq!(
            json["external"]["https://a.example.org"]["http"]["versions"]["1.0.0"]["size"],
            serde_json::json!(3)
        );
    }

    #[test]
    fn test_freshness_window() {
        let entry = CacheEntry::new(VersionListing::new(), 1_000);
        assert!(entry.is_fresh(1_000 + 599_999, 600_000));
        assert!(!entry.is_fresh(1_000 + 600_000, 600_000));
    }

    #[test]
    fn test_remove_drops_empty_source() {
        let mut document = CacheDocument::default();
        document.insert("src", "pkg", CacheEntry::default());
        assert_eq!(document.len(), 1);

        document.remove("src", "pkg");
        assert!(document.external.is_empty());
    }
}
