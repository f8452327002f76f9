//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// The storage trait `warden-core` depends on.
///
/// All role and override methods are **scoped by workspace** through the
/// role rows themselves. Backends must make the count-gated inserts
/// (`create_role`, `clone_role`) and every multi-row mutation
/// (`upsert_overrides`, `replace_overrides`, `reorder_roles`) atomic: a
/// failure rolls back all writes, and two concurrent count-gated inserts
/// can never both pass the limit.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Roles ──────────────────────────────────────────

    /// Create a custom role. Inside one transaction: re-check the role
    /// count against `max_roles` (LimitExceeded past the cap), assign
    /// `priority = max(existing) + 1` (0 if none), insert. A duplicate
    /// name within the workspace surfaces as AlreadyExists.
    async fn create_role(
        &self,
        params: &CreateRoleParams,
        max_roles: u32,
    ) -> Result<Role, StoreError>;

    /// Create a copy of `source` with new display/base fields, carrying
    /// over every override row, under the same atomic count gate as
    /// `create_role`.
    async fn clone_role(
        &self,
        source: &RoleId,
        params: &CreateRoleParams,
        max_roles: u32,
    ) -> Result<Role, StoreError>;

    /// Get a role by ID.
    async fn get_role(&self, role_id: &RoleId) -> Result<Role, StoreError>;

    /// List all custom roles in a workspace, ordered by priority.
    async fn list_roles(&self, workspace_id: &WorkspaceId) -> Result<Vec<Role>, StoreError>;

    /// List the role name slugs taken in a workspace (one query; used for
    /// uniqueness checks and template-name deduplication).
    async fn list_role_names(&self, workspace_id: &WorkspaceId)
        -> Result<Vec<String>, StoreError>;

    /// Patch role fields. Returns the updated row.
    async fn update_role(
        &self,
        role_id: &RoleId,
        fields: &UpdateRoleFields,
    ) -> Result<Role, StoreError>;

    /// Delete a role and all of its override rows.
    async fn delete_role(&self, role_id: &RoleId) -> Result<(), StoreError>;

    /// Set `priority` = positional index for each listed role, atomically.
    async fn reorder_roles(
        &self,
        workspace_id: &WorkspaceId,
        ordered: &[RoleId],
    ) -> Result<(), StoreError>;

    /// Number of custom roles in a workspace.
    async fn count_roles(&self, workspace_id: &WorkspaceId) -> Result<u32, StoreError>;

    // ─────────────────────────────────── Overrides ────────────────────────────────────────

    /// Fetch one override row, if present.
    async fn get_override(
        &self,
        role_id: &RoleId,
        resource: ResourceType,
        permission: &str,
    ) -> Result<Option<PermissionOverride>, StoreError>;

    /// List every override row for a role.
    async fn list_overrides(&self, role_id: &RoleId)
        -> Result<Vec<PermissionOverride>, StoreError>;

    /// List the override rows for one resource type under a role (the
    /// batch load used by bulk resource actions).
    async fn list_resource_overrides(
        &self,
        role_id: &RoleId,
        resource: ResourceType,
    ) -> Result<Vec<PermissionOverride>, StoreError>;

    /// Upsert a single override row.
    async fn upsert_override(&self, role_id: &RoleId, row: &OverrideRow)
        -> Result<(), StoreError>;

    /// Upsert N override rows in one transaction, all-or-nothing.
    async fn upsert_overrides(
        &self,
        role_id: &RoleId,
        rows: &[OverrideRow],
    ) -> Result<(), StoreError>;

    /// Delete explicit overrides, optionally scoped to one resource type.
    /// Returns the number of deleted rows.
    async fn delete_overrides(
        &self,
        role_id: &RoleId,
        resource: Option<ResourceType>,
    ) -> Result<u64, StoreError>;

    /// Delete all overrides for a role and insert `rows` in the same
    /// transaction (template reset).
    async fn replace_overrides(
        &self,
        role_id: &RoleId,
        rows: &[OverrideRow],
    ) -> Result<(), StoreError>;

    // ─────────────────────────────────── Membership ───────────────────────────────────────

    /// Get a workspace member. Membership is written by an external
    /// collaborator; this core treats it as read-only.
    async fn get_member(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<WorkspaceMember, StoreError>;

    /// Add a workspace member (bootstrap/test seeding; mirrors the
    /// membership service's write path).
    async fn add_member(&self, params: &AddMemberParams) -> Result<(), StoreError>;

    /// Number of members holding a custom role.
    async fn count_role_members(&self, role_id: &RoleId) -> Result<u32, StoreError>;

    /// Members holding a custom role.
    async fn list_role_members(
        &self,
        role_id: &RoleId,
    ) -> Result<Vec<WorkspaceMember>, StoreError>;

    /// Number of members whose top-level membership is the given system
    /// role (and who hold no custom role).
    async fn count_system_role_members(
        &self,
        workspace_id: &WorkspaceId,
        base: BaseRole,
    ) -> Result<u32, StoreError>;
}
