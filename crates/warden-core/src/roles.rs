//! Role store service: system role projection plus custom role CRUD,
//! clone, and ordering, with naming rules and count gating.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use warden_audit::{AuditAction, AuditEntry, AuditSink};
use warden_storage::{
    BaseRole, CreateRoleParams, Role, RoleId, Store, StoreError, UpdateRoleFields, UserId,
    WorkspaceId, WorkspaceMember,
};

use crate::cache::Invalidator;
use crate::error::Error;

/// Hard cap on custom roles per workspace. The check-then-insert runs in
/// one storage transaction so concurrent creations cannot both pass.
pub const MAX_CUSTOM_ROLES: u32 = 20;

/// Names that can never be taken by a custom role.
pub const RESERVED_ROLE_NAMES: [&str; 8] = [
    "owner",
    "admin",
    "developer",
    "viewer",
    "member",
    "guest",
    "system",
    "everyone",
];

const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = 50;

/// Reference to either a synthetic system role or a stored custom role.
///
/// System roles have no rows and no RoleId; parsing keeps them from ever
/// reaching a mutation path with a forged identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleRef {
    System(BaseRole),
    Custom(RoleId),
}

/// Error type for parsing RoleRef from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleRefError(pub String);

impl std::fmt::Display for ParseRoleRefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role reference: {}", self.0)
    }
}

impl std::error::Error for ParseRoleRefError {}

impl FromStr for RoleRef {
    type Err = ParseRoleRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(base) = s.parse::<BaseRole>() {
            return Ok(RoleRef::System(base));
        }
        Uuid::try_parse(s)
            .map(|id| RoleRef::Custom(RoleId(id)))
            .map_err(|_| ParseRoleRefError(s.to_string()))
    }
}

/// Synthetic system role, rendered with its live member count.
#[derive(Clone, Debug)]
pub struct SystemRoleInfo {
    pub base: BaseRole,
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub member_count: u32,
}

/// Stored role with its live member count.
#[derive(Clone, Debug)]
pub struct RoleWithMembers {
    pub role: Role,
    pub member_count: u32,
}

/// Workspace role listing: the four system roles followed by custom
/// roles in priority order.
#[derive(Clone, Debug)]
pub struct RoleList {
    pub system: Vec<SystemRoleInfo>,
    pub custom: Vec<RoleWithMembers>,
}

/// A single role looked up by reference.
#[derive(Clone, Debug)]
pub enum RoleInfo {
    System(SystemRoleInfo),
    Custom(RoleWithMembers),
}

fn system_role_definition(base: BaseRole) -> (&'static str, &'static str, &'static str) {
    match base {
        BaseRole::Owner => (
            "owner",
            "Owner",
            "Full workspace control, including billing and role management",
        ),
        BaseRole::Admin => (
            "admin",
            "Admin",
            "Manages members, roles, and all resources except billing",
        ),
        BaseRole::Developer => (
            "developer",
            "Developer",
            "Builds and runs projects, agents, stories, and deployments",
        ),
        BaseRole::Viewer => ("viewer", "Viewer", "Read-only access across the workspace"),
    }
}

fn is_valid_slug(name: &str) -> bool {
    let mut prev_sep = true; // rejects a leading separator
    for c in name.chars() {
        match c {
            'a'..='z' | '0'..='9' => prev_sep = false,
            '-' | '_' => {
                if prev_sep {
                    return false;
                }
                prev_sep = true;
            }
            _ => return false,
        }
    }
    !prev_sep // rejects a trailing separator and the empty string
}

/// Naming rules shared by create, rename, clone, and template
/// instantiation: slug shape, length bounds, reserved set.
pub(crate) fn validate_role_name(name: &str) -> Result<(), Error> {
    if name.len() < NAME_MIN_LEN || name.len() > NAME_MAX_LEN {
        return Err(Error::BadRequest(format!(
            "role name must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )));
    }
    if !is_valid_slug(name) {
        return Err(Error::BadRequest(format!(
            "role name '{name}' must be a lowercase slug"
        )));
    }
    if RESERVED_ROLE_NAMES.contains(&name) {
        return Err(Error::BadRequest(format!("role name '{name}' is reserved")));
    }
    Ok(())
}

pub struct RoleService {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    invalidator: Invalidator,
}

impl RoleService {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditSink>,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            store,
            audit,
            invalidator,
        }
    }

    /// System roles (with live member counts) plus custom roles in
    /// priority order.
    pub async fn list(&self, workspace_id: &WorkspaceId) -> Result<RoleList, Error> {
        let mut system = Vec::with_capacity(BaseRole::ALL.len());
        for base in BaseRole::ALL {
            system.push(self.system_role_info(workspace_id, base).await?);
        }

        let mut custom = Vec::new();
        for role in self.store.list_roles(workspace_id).await? {
            let member_count = self.store.count_role_members(&role.id).await?;
            custom.push(RoleWithMembers { role, member_count });
        }

        Ok(RoleList { system, custom })
    }

    pub async fn get(
        &self,
        workspace_id: &WorkspaceId,
        role_ref: &RoleRef,
    ) -> Result<RoleInfo, Error> {
        match role_ref {
            RoleRef::System(base) => Ok(RoleInfo::System(
                self.system_role_info(workspace_id, *base).await?,
            )),
            RoleRef::Custom(role_id) => {
                let role = self.get_custom(role_id).await?;
                if role.workspace_id != *workspace_id {
                    return Err(Error::NotFound("role not found".to_string()));
                }
                let member_count = self.store.count_role_members(&role.id).await?;
                Ok(RoleInfo::Custom(RoleWithMembers { role, member_count }))
            }
        }
    }

    /// Create a custom role. Name rules are checked synchronously; the
    /// count gate and priority assignment happen inside the backend
    /// transaction.
    pub async fn create(&self, params: &CreateRoleParams) -> Result<Role, Error> {
        validate_role_name(&params.name)?;
        self.ensure_name_free(&params.workspace_id, &params.name).await?;

        let role = self
            .store
            .create_role(params, MAX_CUSTOM_ROLES)
            .await
            .map_err(map_create_err)?;

        self.dispatch_entry(
            AuditEntry::builder(&role.workspace_id, &params.created_by, AuditAction::RoleCreate)
                .entity("role", role.id.to_string())
                .details(json!({
                    "name": role.name,
                    "base_role": role.base_role.map(|b| b.as_str()),
                    "template_id": role.template_id,
                }))
                .build(),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(role)
    }

    /// Patch a custom role. A base-role change invalidates the whole
    /// workspace's cached answers before returning, since every
    /// override-free permission's inherited value changes with it.
    pub async fn update(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
        fields: &UpdateRoleFields,
    ) -> Result<Role, Error> {
        let before = self.require_custom(role_ref).await?;

        if let Some(name) = &fields.name {
            if *name != before.name {
                validate_role_name(name)?;
                self.ensure_name_free(&before.workspace_id, name).await?;
            }
        }

        let after = self
            .store
            .update_role(&before.id, fields)
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => {
                    Error::Conflict("role name already in use".to_string())
                }
                other => other.into(),
            })?;

        let base_role_changed = before.base_role != after.base_role;

        self.dispatch_entry(
            AuditEntry::builder(&after.workspace_id, actor, AuditAction::RoleUpdate)
                .entity("role", after.id.to_string())
                .details(role_diff(&before, &after))
                .build(),
        );

        if base_role_changed {
            // Stale answers here would persist until TTL expiry, so the
            // purge runs before the response rather than detached.
            self.invalidator.invalidate_workspace(&after.workspace_id).await;
        } else {
            self.invalidator.invalidate_workspace_detached(&after.workspace_id);
        }

        Ok(after)
    }

    /// Delete a custom role that no member references.
    pub async fn delete(&self, actor: &UserId, role_ref: &RoleRef) -> Result<(), Error> {
        let role = self.require_custom(role_ref).await?;

        let member_count = self.store.count_role_members(&role.id).await?;
        if member_count > 0 {
            return Err(Error::BadRequest(format!(
                "role is assigned to {member_count} member(s)"
            )));
        }

        self.store.delete_role(&role.id).await?;

        self.dispatch_entry(
            AuditEntry::builder(&role.workspace_id, actor, AuditAction::RoleDelete)
                .entity("role", role.id.to_string())
                .details(json!({ "name": role.name }))
                .build(),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(())
    }

    /// Copy a custom role's display fields, base role, and every
    /// override row under a new name, inside the same count gate as
    /// create.
    pub async fn clone_role(
        &self,
        actor: &UserId,
        source_ref: &RoleRef,
        new_name: &str,
    ) -> Result<Role, Error> {
        let source = match source_ref {
            RoleRef::System(base) => {
                return Err(Error::BadRequest(format!(
                    "system role '{base}' cannot be cloned; create a role with that base role"
                )))
            }
            RoleRef::Custom(role_id) => self.get_custom(role_id).await?,
        };

        validate_role_name(new_name)?;
        self.ensure_name_free(&source.workspace_id, new_name).await?;

        let params = CreateRoleParams {
            workspace_id: source.workspace_id.clone(),
            name: new_name.to_string(),
            display_name: source.display_name.clone(),
            description: source.description.clone(),
            color: source.color.clone(),
            base_role: source.base_role,
            template_id: None,
            created_by: actor.clone(),
        };
        let role = self
            .store
            .clone_role(&source.id, &params, MAX_CUSTOM_ROLES)
            .await
            .map_err(map_create_err)?;

        self.dispatch_entry(
            AuditEntry::builder(&role.workspace_id, actor, AuditAction::RoleClone)
                .entity("role", role.id.to_string())
                .details(json!({ "source": source.id.to_string(), "name": role.name }))
                .build(),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(role)
    }

    /// Set priorities to positional indexes. The id set must be
    /// duplicate-free and entirely within the workspace.
    pub async fn reorder(
        &self,
        actor: &UserId,
        workspace_id: &WorkspaceId,
        ordered: &[RoleId],
    ) -> Result<(), Error> {
        if ordered.is_empty() {
            return Err(Error::BadRequest("empty reorder input".to_string()));
        }
        let unique: HashSet<&RoleId> = ordered.iter().collect();
        if unique.len() != ordered.len() {
            return Err(Error::BadRequest(
                "duplicate role ids in reorder input".to_string(),
            ));
        }

        self.store
            .reorder_roles(workspace_id, ordered)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => Error::BadRequest(
                    "reorder input references a role outside this workspace".to_string(),
                ),
                other => other.into(),
            })?;

        self.dispatch_entry(
            AuditEntry::builder(workspace_id, actor, AuditAction::RoleReorder)
                .entity("workspace", workspace_id.to_string())
                .details(json!({
                    "order": ordered.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
                }))
                .build(),
        );

        Ok(())
    }

    /// Members holding a custom role. System role membership is served
    /// by the membership service, not this store.
    pub async fn list_members(&self, role_ref: &RoleRef) -> Result<Vec<WorkspaceMember>, Error> {
        let role = match role_ref {
            RoleRef::System(base) => {
                return Err(Error::BadRequest(format!(
                    "member listing for system role '{base}' is served by the membership service"
                )))
            }
            RoleRef::Custom(role_id) => self.get_custom(role_id).await?,
        };
        Ok(self.store.list_role_members(&role.id).await?)
    }

    // ────────────────────────────────── Internals ─────────────────────────────────────

    async fn system_role_info(
        &self,
        workspace_id: &WorkspaceId,
        base: BaseRole,
    ) -> Result<SystemRoleInfo, Error> {
        let (name, display_name, description) = system_role_definition(base);
        let member_count = self
            .store
            .count_system_role_members(workspace_id, base)
            .await?;
        Ok(SystemRoleInfo {
            base,
            name,
            display_name,
            description,
            member_count,
        })
    }

    async fn get_custom(&self, role_id: &RoleId) -> Result<Role, Error> {
        self.store.get_role(role_id).await.map_err(|e| match e {
            StoreError::NotFound => Error::NotFound("role not found".to_string()),
            other => other.into(),
        })
    }

    async fn require_custom(&self, role_ref: &RoleRef) -> Result<Role, Error> {
        match role_ref {
            RoleRef::System(base) => Err(Error::Forbidden(format!(
                "system role '{base}' cannot be modified"
            ))),
            RoleRef::Custom(role_id) => self.get_custom(role_id).await,
        }
    }

    async fn ensure_name_free(
        &self,
        workspace_id: &WorkspaceId,
        name: &str,
    ) -> Result<(), Error> {
        let names = self.store.list_role_names(workspace_id).await?;
        if names.iter().any(|n| n == name) {
            return Err(Error::Conflict(format!("role name '{name}' already in use")));
        }
        Ok(())
    }

    fn dispatch_entry(&self, entry: AuditEntry) {
        let sink = Arc::clone(&self.audit);
        tokio::spawn(async move {
            if let Err(e) = sink.log(entry).await {
                tracing::warn!(error = %e, "audit write failed");
            }
        });
    }
}

pub(crate) fn map_create_err(e: StoreError) -> Error {
    match e {
        StoreError::AlreadyExists => Error::Conflict("role name already in use".to_string()),
        StoreError::LimitExceeded => Error::BadRequest(format!(
            "workspace already has the maximum of {MAX_CUSTOM_ROLES} custom roles"
        )),
        other => other.into(),
    }
}

/// Field-level before/after diff for the audit trail.
fn role_diff(before: &Role, after: &Role) -> serde_json::Value {
    let mut diff = serde_json::Map::new();
    if before.name != after.name {
        diff.insert("name".into(), json!({ "before": before.name, "after": after.name }));
    }
    if before.display_name != after.display_name {
        diff.insert(
            "display_name".into(),
            json!({ "before": before.display_name, "after": after.display_name }),
        );
    }
    if before.description != after.description {
        diff.insert(
            "description".into(),
            json!({ "before": before.description, "after": after.description }),
        );
    }
    if before.color != after.color {
        diff.insert("color".into(), json!({ "before": before.color, "after": after.color }));
    }
    if before.base_role != after.base_role {
        diff.insert(
            "base_role".into(),
            json!({
                "before": before.base_role.map(|b| b.as_str()),
                "after": after.base_role.map(|b| b.as_str()),
            }),
        );
    }
    if before.is_active != after.is_active {
        diff.insert(
            "is_active".into(),
            json!({ "before": before.is_active, "after": after.is_active }),
        );
    }
    serde_json::Value::Object(diff)
}
