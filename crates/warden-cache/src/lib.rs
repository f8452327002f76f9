//! Cache backend abstraction for warden permission checks.
//!
//! This crate defines the [`CacheBackend`] trait that allows different
//! implementations behind the permission cache:
//! - Memory (single server, in-process map)
//! - Redis or another shared store (multi-server) — implemented outside
//!   this workspace against the same contract.
//!
//! The permission cache treats every backend failure as soft: reads
//! degrade to a miss and writes are fire-and-forget, so correctness never
//! depends on cache availability.

use async_trait::async_trait;
use thiserror::Error;

/// Error type for cache backend operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Key/value cache with TTL expiry and pattern-scoped scans.
///
/// `scan_keys` accepts a glob-style pattern with a single trailing `*`
/// (prefix scan). Callers are responsible for sanitizing key components
/// so user input can never widen a scan.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with a TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    /// List keys matching a prefix pattern (trailing `*`).
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete keys. Returns the number actually removed.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;
}
