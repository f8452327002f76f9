//! In-memory cache backend using a concurrent map with per-entry expiry.
//!
//! This implementation is suitable for:
//! - Single server deployments
//! - Development and testing
//!
//! Entries are only visible within a single process. If you have multiple
//! server replicas, use a shared backend (e.g. Redis) implementing the
//! same [`CacheBackend`] contract instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use warden_cache::{CacheBackend, CacheError};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`CacheBackend`]. Expired entries are dropped lazily on
/// read and scan rather than by a background sweeper.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entry, drop it on the way out.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().expires_at > now && matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_roundtrip() {
        let cache = MemoryCache::new();
        cache.set("perm:ws:u1:projects:view", "1", 300).await.unwrap();

        let value = cache.get("perm:ws:u1:projects:view").await.unwrap();
        assert_eq!(value.as_deref(), Some("1"));
        assert_eq!(cache.get("perm:ws:u1:projects:edit").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.set("k", "v", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn scan_matches_prefix_only() {
        let cache = MemoryCache::new();
        cache.set("perm:ws-a:u1:projects:view", "1", 300).await.unwrap();
        cache.set("perm:ws-a:u2:projects:view", "0", 300).await.unwrap();
        cache.set("perm:ws-b:u1:projects:view", "1", 300).await.unwrap();

        let mut keys = cache.scan_keys("perm:ws-a:*").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "perm:ws-a:u1:projects:view".to_string(),
                "perm:ws-a:u2:projects:view".to_string(),
            ]
        );

        // No wildcard means exact match.
        let keys = cache.scan_keys("perm:ws-b:u1:projects:view").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(cache.scan_keys("perm:ws-c:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn del_reports_removed_count() {
        let cache = MemoryCache::new();
        cache.set("a", "1", 300).await.unwrap();
        cache.set("b", "1", 300).await.unwrap();

        let removed = cache
            .del(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_to_scan() {
        let cache = MemoryCache::new();
        cache.set("dead", "1", 0).await.unwrap();
        cache.set("live", "1", 300).await.unwrap();

        let keys = cache.scan_keys("*").await.unwrap();
        assert_eq!(keys, vec!["live".to_string()]);
    }
}
