//! Read-through permission cache and scoped invalidation.
//!
//! The cache sits in front of the matrix engine's point check. Reads are
//! synchronous on the decision path but degrade to a miss on backend
//! failure; writes and most invalidations are fire-and-forget.
//! Correctness never depends on cache availability — only latency does.
//! Consistency is bounded staleness up to [`CACHE_TTL_SECONDS`].

use std::sync::Arc;

use metrics::counter;
use warden_cache::CacheBackend;
use warden_storage::{ResourceType, UserId, WorkspaceId};

use crate::error::Error;
use crate::matrix::MatrixEngine;

/// Fixed TTL for cached check results.
pub const CACHE_TTL_SECONDS: u64 = 300;

/// Keys are deleted in chunks of this size so a workspace-wide purge
/// never turns into one large blocking delete.
const INVALIDATION_BATCH: usize = 128;

const KEY_PREFIX: &str = "perm";
const GRANTED_FLAG: &str = "1";
const DENIED_FLAG: &str = "0";

/// Strip characters meaningful to the backend's glob/scan syntax so a
/// hostile component can neither widen a scan nor forge a foreign key.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .filter(|c| !matches!(c, '*' | '?' | '[' | ']' | ':'))
        .collect()
}

fn cache_key(
    workspace_id: &WorkspaceId,
    user_id: &UserId,
    resource: ResourceType,
    permission: &str,
) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        KEY_PREFIX,
        sanitize(&workspace_id.to_string()),
        sanitize(&user_id.to_string()),
        sanitize(resource.as_str()),
        sanitize(permission),
    )
}

/// Scoped cache invalidation. Every method swallows backend failures:
/// a stale entry expires with its TTL, so invalidation is best-effort.
#[derive(Clone)]
pub struct Invalidator {
    backend: Arc<dyn CacheBackend>,
}

impl Invalidator {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Drop cached answers for one member (role or membership change).
    pub async fn invalidate_user(&self, workspace_id: &WorkspaceId, user_id: &UserId) {
        self.purge(format!(
            "{}:{}:{}:*",
            KEY_PREFIX,
            sanitize(&workspace_id.to_string()),
            sanitize(&user_id.to_string()),
        ))
        .await;
    }

    /// Drop every cached answer in a workspace. Coarse on purpose: the
    /// cache does not track which users hold which role.
    pub async fn invalidate_workspace(&self, workspace_id: &WorkspaceId) {
        self.purge(format!(
            "{}:{}:*",
            KEY_PREFIX,
            sanitize(&workspace_id.to_string()),
        ))
        .await;
    }

    /// Drop all cached permission answers.
    pub async fn invalidate_all(&self) {
        self.purge(format!("{KEY_PREFIX}:*")).await;
    }

    /// Workspace invalidation off the critical path.
    pub fn invalidate_workspace_detached(&self, workspace_id: &WorkspaceId) {
        let this = self.clone();
        let workspace_id = workspace_id.clone();
        tokio::spawn(async move {
            this.invalidate_workspace(&workspace_id).await;
        });
    }

    async fn purge(&self, pattern: String) {
        let keys = match self.backend.scan_keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                counter!("warden_cache_errors_total", "op" => "scan").increment(1);
                tracing::warn!(error = %e, pattern = %pattern, "cache scan failed");
                return;
            }
        };
        for chunk in keys.chunks(INVALIDATION_BATCH) {
            match self.backend.del(chunk).await {
                Ok(removed) => {
                    counter!("warden_cache_invalidated_keys_total").increment(removed);
                }
                Err(e) => {
                    counter!("warden_cache_errors_total", "op" => "del").increment(1);
                    tracing::warn!(error = %e, "cache delete failed");
                }
            }
        }
    }
}

/// Read-through cache over the engine's point check.
pub struct PermissionCache {
    backend: Arc<dyn CacheBackend>,
    engine: Arc<MatrixEngine>,
    ttl_seconds: u64,
}

impl PermissionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, engine: Arc<MatrixEngine>) -> Self {
        Self {
            backend,
            engine,
            ttl_seconds: CACHE_TTL_SECONDS,
        }
    }

    /// `check(user, workspace, resource, action)` — the hot
    /// authorization path. A hit decodes the stored one-character flag
    /// without invoking the engine; a miss (or a failing read) falls
    /// through to the engine and writes back asynchronously.
    pub async fn check(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
        resource: ResourceType,
        permission: &str,
    ) -> Result<bool, Error> {
        let key = cache_key(workspace_id, user_id, resource, permission);

        match self.backend.get(&key).await {
            Ok(Some(flag)) => {
                counter!("warden_permission_cache_hits_total").increment(1);
                tracing::debug!(key = %key, "permission cache hit");
                return Ok(flag == GRANTED_FLAG);
            }
            Ok(None) => {}
            Err(e) => {
                counter!("warden_cache_errors_total", "op" => "get").increment(1);
                tracing::warn!(error = %e, "cache read failed, falling through to engine");
            }
        }
        counter!("warden_permission_cache_misses_total").increment(1);

        let granted = self
            .engine
            .check(workspace_id, user_id, resource, permission)
            .await?;

        let backend = Arc::clone(&self.backend);
        let ttl_seconds = self.ttl_seconds;
        let flag = if granted { GRANTED_FLAG } else { DENIED_FLAG };
        tokio::spawn(async move {
            if let Err(e) = backend.set(&key, flag, ttl_seconds).await {
                tracing::warn!(error = %e, "permission cache write failed");
            }
        });

        Ok(granted)
    }
}
