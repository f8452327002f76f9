//! Explicit permission overrides, authoritative over inheritance.

use chrono::{DateTime, Utc};

use super::{ResourceType, RoleId};

/// Persisted override row. Composite key (role_id, resource, permission);
/// presence always wins over the base-role default.
#[derive(Clone, Debug)]
pub struct PermissionOverride {
    pub role_id: RoleId,
    pub resource: ResourceType,
    pub permission: String,
    pub granted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input row for override upserts. Validation against the permission
/// catalog happens in warden-core before rows reach the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverrideRow {
    pub resource: ResourceType,
    pub permission: String,
    pub granted: bool,
}

impl OverrideRow {
    pub fn new(resource: ResourceType, permission: impl Into<String>, granted: bool) -> Self {
        Self {
            resource,
            permission: permission.into(),
            granted,
        }
    }
}
