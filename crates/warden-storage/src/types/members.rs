//! Workspace membership types. Membership is managed by an external
//! collaborator; this core only reads it (plus a seeding write for tests
//! and bootstrap).

use chrono::{DateTime, Utc};

use super::{BaseRole, RoleId, UserId, WorkspaceId};

/// Workspace member record
#[derive(Clone, Debug)]
pub struct WorkspaceMember {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    /// Top-level membership role; also the inheritance source when the
    /// member holds no custom role.
    pub system_role: BaseRole,
    /// Custom role assignment, if any. Takes precedence over the system
    /// role's defaults during resolution.
    pub custom_role_id: Option<RoleId>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for adding a workspace member
#[derive(Clone, Debug)]
pub struct AddMemberParams {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub system_role: BaseRole,
    pub custom_role_id: Option<RoleId>,
}
