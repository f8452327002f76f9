//! Permission matrix engine: resolution and mutation.
//!
//! Resolution order, identical for the matrix view, the
//! effective-permissions view, and the point check:
//! 1. owner membership grants everything unconditionally;
//! 2. an explicit override is authoritative;
//! 3. otherwise the role's base-role default applies, marked inherited;
//! 4. otherwise deny.
//! A member with no custom role inherits directly from their system
//! role's defaults.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use warden_audit::{PermissionAudit, PermissionEvent, PermissionEventType};
use warden_storage::{
    BaseRole, OverrideRow, PermissionOverride, ResourceType, Role, Store, StoreError, UserId,
    WorkspaceId,
};

use crate::cache::Invalidator;
use crate::catalog;
use crate::defaults;
use crate::error::Error;
use crate::roles::RoleRef;

/// Resolved value for one (role, resource, permission) triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Effective {
    pub granted: bool,
    /// True when the value came from the base-role default table rather
    /// than an explicit override or the owner short-circuit.
    pub inherited: bool,
}

/// Full nested view: resource → permission → resolved value.
pub type PermissionMap = BTreeMap<ResourceType, BTreeMap<String, Effective>>;

/// Before/after pair returned by `set_permission`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionChange {
    pub before: Effective,
    pub after: Effective,
}

/// Whole-resource bulk mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAction {
    AllowAll,
    DenyAll,
}

/// Resolve one triple from its override (if any) and inheritance source.
/// Pairs outside the catalog deny without marking inheritance.
pub fn resolve(
    base_role: Option<BaseRole>,
    override_granted: Option<bool>,
    resource: ResourceType,
    permission: &str,
) -> Effective {
    if let Some(granted) = override_granted {
        return Effective {
            granted,
            inherited: false,
        };
    }
    if let Some(base) = base_role {
        if catalog::is_valid_permission(resource, permission) {
            return Effective {
                granted: defaults::base_role_default(base, resource, permission),
                inherited: true,
            };
        }
    }
    Effective {
        granted: false,
        inherited: false,
    }
}

pub struct MatrixEngine {
    store: Arc<dyn Store>,
    perm_audit: Arc<dyn PermissionAudit>,
    invalidator: Invalidator,
}

impl MatrixEngine {
    pub fn new(
        store: Arc<dyn Store>,
        perm_audit: Arc<dyn PermissionAudit>,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            store,
            perm_audit,
            invalidator,
        }
    }

    // ─────────────────────────────────── Reads ────────────────────────────────────────

    /// Full matrix for a custom role: every catalog pair resolved.
    pub async fn role_matrix(&self, role_ref: &RoleRef) -> Result<PermissionMap, Error> {
        match role_ref {
            RoleRef::System(base) => Ok(system_matrix(*base)),
            RoleRef::Custom(role_id) => {
                let role = self.store.get_role(role_id).await.map_err(not_found_role)?;
                let overrides = self.store.list_overrides(role_id).await?;
                Ok(matrix_from(&role, &overrides))
            }
        }
    }

    /// Effective permissions for a workspace member, resolved through
    /// their custom role or directly from their system role's defaults.
    pub async fn effective_permissions(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<PermissionMap, Error> {
        let member = self
            .store
            .get_member(workspace_id, user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => Error::NotFound("membership not found".to_string()),
                other => other.into(),
            })?;

        if member.system_role == BaseRole::Owner {
            return Ok(owner_matrix());
        }
        match member.custom_role_id {
            Some(role_id) => self.role_matrix(&RoleRef::Custom(role_id)).await,
            None => Ok(system_matrix(member.system_role)),
        }
    }

    /// Point check. Missing membership denies; unknown pairs deny.
    pub async fn check(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
        resource: ResourceType,
        permission: &str,
    ) -> Result<bool, Error> {
        let member = match self.store.get_member(workspace_id, user_id).await {
            Ok(member) => member,
            Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if member.system_role == BaseRole::Owner {
            return Ok(true);
        }

        match member.custom_role_id {
            Some(role_id) => {
                let role = self.store.get_role(&role_id).await.map_err(not_found_role)?;
                let row = self
                    .store
                    .get_override(&role_id, resource, permission)
                    .await?;
                Ok(resolve(role.base_role, row.map(|r| r.granted), resource, permission).granted)
            }
            None => Ok(resolve(Some(member.system_role), None, resource, permission).granted),
        }
    }

    // ────────────────────────────────── Mutations ─────────────────────────────────────

    /// Upsert one override. Returns the resolution before and after.
    pub async fn set_permission(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
        resource: ResourceType,
        permission: &str,
        granted: bool,
    ) -> Result<PermissionChange, Error> {
        catalog::validate_permission(resource, permission)?;
        let role = self.require_custom(role_ref).await?;

        let prior = self
            .store
            .get_override(&role.id, resource, permission)
            .await?;
        let before = resolve(
            role.base_role,
            prior.as_ref().map(|r| r.granted),
            resource,
            permission,
        );

        self.store
            .upsert_override(&role.id, &OverrideRow::new(resource, permission, granted))
            .await?;
        let after = Effective {
            granted,
            inherited: false,
        };

        self.dispatch_event(
            PermissionEvent::new(
                &role.workspace_id,
                actor,
                &role.id,
                PermissionEventType::Set,
            )
            .before(json!({
                "resource": resource.as_str(),
                "permission": permission,
                "granted": prior.as_ref().map(|r| r.granted),
            }))
            .after(json!({
                "resource": resource.as_str(),
                "permission": permission,
                "granted": granted,
            })),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(PermissionChange { before, after })
    }

    /// Upsert N overrides in one all-or-nothing transaction.
    pub async fn set_bulk_permissions(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
        rows: &[OverrideRow],
    ) -> Result<(), Error> {
        if rows.is_empty() {
            return Err(Error::BadRequest("empty bulk permission input".to_string()));
        }
        for row in rows {
            catalog::validate_permission(row.resource, &row.permission)?;
        }
        let role = self.require_custom(role_ref).await?;

        // One query for the before snapshot instead of a get per row.
        let existing = self.store.list_overrides(&role.id).await?;
        let touched: Vec<&PermissionOverride> = existing
            .iter()
            .filter(|o| {
                rows.iter()
                    .any(|r| r.resource == o.resource && r.permission == o.permission)
            })
            .collect();

        self.store.upsert_overrides(&role.id, rows).await?;

        self.dispatch_event(
            PermissionEvent::new(
                &role.workspace_id,
                actor,
                &role.id,
                PermissionEventType::BulkSet,
            )
            .before(overrides_json(touched.iter().map(|o| {
                OverrideRow::new(o.resource, o.permission.clone(), o.granted)
            })))
            .after(overrides_json(rows.iter().cloned())),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(())
    }

    /// Set every permission under one resource type to granted
    /// (AllowAll) or denied (DenyAll). Returns the applied rows.
    pub async fn bulk_resource_action(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
        resource: ResourceType,
        action: ResourceAction,
    ) -> Result<Vec<OverrideRow>, Error> {
        let role = self.require_custom(role_ref).await?;
        let granted = matches!(action, ResourceAction::AllowAll);

        // Batch-load existing rows once for the audit snapshot.
        let existing = self.store.list_resource_overrides(&role.id, resource).await?;

        let rows: Vec<OverrideRow> = catalog::permissions_for(resource)
            .iter()
            .map(|p| OverrideRow::new(resource, *p, granted))
            .collect();
        self.store.upsert_overrides(&role.id, &rows).await?;

        self.dispatch_event(
            PermissionEvent::new(
                &role.workspace_id,
                actor,
                &role.id,
                PermissionEventType::ResourceAction,
            )
            .before(overrides_json(existing.into_iter().map(|o| {
                OverrideRow::new(o.resource, o.permission, o.granted)
            })))
            .after(overrides_json(rows.iter().cloned())),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(rows)
    }

    /// Delete explicit overrides (optionally scoped to one resource),
    /// restoring inheritance. Returns the number of deleted rows.
    pub async fn reset_permissions(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
        resource: Option<ResourceType>,
    ) -> Result<u64, Error> {
        let role = self.require_custom(role_ref).await?;

        let before = match resource {
            Some(r) => self.store.list_resource_overrides(&role.id, r).await?,
            None => self.store.list_overrides(&role.id).await?,
        };
        let deleted = self.store.delete_overrides(&role.id, resource).await?;

        self.dispatch_event(
            PermissionEvent::new(
                &role.workspace_id,
                actor,
                &role.id,
                PermissionEventType::Reset,
            )
            .before(overrides_json(before.into_iter().map(|o| {
                OverrideRow::new(o.resource, o.permission, o.granted)
            })))
            .after(json!([])),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(deleted)
    }

    // ────────────────────────────────── Internals ─────────────────────────────────────

    /// Mutations address stored roles only; system roles are synthetic.
    async fn require_custom(&self, role_ref: &RoleRef) -> Result<Role, Error> {
        match role_ref {
            RoleRef::System(base) => Err(Error::Forbidden(format!(
                "system role '{base}' cannot be modified"
            ))),
            RoleRef::Custom(role_id) => {
                self.store.get_role(role_id).await.map_err(not_found_role)
            }
        }
    }

    /// Permission-audit dispatch is fire-and-forget; a sink failure is
    /// logged and cannot fail the mutation.
    fn dispatch_event(&self, event: PermissionEvent) {
        let sink = Arc::clone(&self.perm_audit);
        tokio::spawn(async move {
            if let Err(e) = sink.record(event).await {
                tracing::warn!(error = %e, "permission audit write failed");
            }
        });
    }
}

fn not_found_role(e: StoreError) -> Error {
    match e {
        StoreError::NotFound => Error::NotFound("role not found".to_string()),
        other => other.into(),
    }
}

fn matrix_from(role: &Role, overrides: &[PermissionOverride]) -> PermissionMap {
    let mut matrix = PermissionMap::new();
    for resource in ResourceType::ALL {
        let entries = catalog::permissions_for(resource)
            .iter()
            .map(|permission| {
                let row = overrides
                    .iter()
                    .find(|o| o.resource == resource && o.permission == *permission);
                (
                    permission.to_string(),
                    resolve(role.base_role, row.map(|o| o.granted), resource, permission),
                )
            })
            .collect();
        matrix.insert(resource, entries);
    }
    matrix
}

/// Matrix of a non-owner system role: pure inheritance, no overrides.
fn system_matrix(base: BaseRole) -> PermissionMap {
    let mut matrix = PermissionMap::new();
    for (resource, entries) in defaults::default_matrix(base) {
        matrix.insert(
            resource,
            entries
                .into_iter()
                .map(|(permission, granted)| {
                    (
                        permission,
                        Effective {
                            granted,
                            inherited: true,
                        },
                    )
                })
                .collect(),
        );
    }
    matrix
}

/// Owners are granted everything without consulting stored state.
fn owner_matrix() -> PermissionMap {
    let mut matrix = PermissionMap::new();
    for resource in ResourceType::ALL {
        let entries = catalog::permissions_for(resource)
            .iter()
            .map(|permission| {
                (
                    permission.to_string(),
                    Effective {
                        granted: true,
                        inherited: false,
                    },
                )
            })
            .collect();
        matrix.insert(resource, entries);
    }
    matrix
}

fn overrides_json(rows: impl Iterator<Item = OverrideRow>) -> serde_json::Value {
    serde_json::Value::Array(
        rows.map(|r| {
            json!({
                "resource": r.resource.as_str(),
                "permission": r.permission,
                "granted": r.granted,
            })
        })
        .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_inheritance() {
        let effective = resolve(
            Some(BaseRole::Viewer),
            Some(true),
            ResourceType::Secrets,
            "reveal",
        );
        assert!(effective.granted);
        assert!(!effective.inherited);

        // An explicit deny also wins over a granted default.
        let effective = resolve(
            Some(BaseRole::Admin),
            Some(false),
            ResourceType::Projects,
            "view",
        );
        assert!(!effective.granted);
        assert!(!effective.inherited);
    }

    #[test]
    fn no_override_falls_back_to_base_default() {
        let effective = resolve(Some(BaseRole::Developer), None, ResourceType::Projects, "edit");
        assert!(effective.granted);
        assert!(effective.inherited);

        let effective = resolve(Some(BaseRole::Viewer), None, ResourceType::Projects, "edit");
        assert!(!effective.granted);
        assert!(effective.inherited);
    }

    #[test]
    fn no_base_role_denies_uninherited() {
        let effective = resolve(None, None, ResourceType::Projects, "view");
        assert!(!effective.granted);
        assert!(!effective.inherited);
    }

    #[test]
    fn unknown_pair_denies_even_with_base_role() {
        let effective = resolve(Some(BaseRole::Owner), None, ResourceType::Projects, "publish");
        assert!(!effective.granted);
        assert!(!effective.inherited);
    }

    #[test]
    fn owner_matrix_grants_everything() {
        let matrix = owner_matrix();
        for (_, entries) in matrix {
            for (_, effective) in entries {
                assert!(effective.granted);
                assert!(!effective.inherited);
            }
        }
    }

    #[test]
    fn system_matrix_is_fully_inherited() {
        let matrix = system_matrix(BaseRole::Viewer);
        for (_, entries) in &matrix {
            for effective in entries.values() {
                assert!(effective.inherited);
            }
        }
        assert!(matrix[&ResourceType::Projects]["view"].granted);
        assert!(!matrix[&ResourceType::Projects]["delete"].granted);
    }
}
