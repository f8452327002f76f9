//! Role template registry: fixed, in-process catalog of role archetypes.
//!
//! A template carries a base role and a complete permission map. Only the
//! entries that differ from the base role's defaults are persisted when a
//! role is instantiated — matching values are already covered by
//! inheritance.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use serde_json::json;
use warden_audit::{
    AuditAction, AuditEntry, AuditSink, PermissionAudit, PermissionEvent, PermissionEventType,
};
use warden_storage::{
    BaseRole, CreateRoleParams, OverrideRow, ResourceType, Role, Store, StoreError, UserId,
    WorkspaceId,
};

use crate::cache::Invalidator;
use crate::catalog;
use crate::defaults;
use crate::error::Error;
use crate::roles::{map_create_err, validate_role_name, RoleRef, MAX_CUSTOM_ROLES};

/// Immutable role archetype. `permissions` covers the full catalog.
#[derive(Clone, Debug)]
pub struct RoleTemplate {
    pub id: &'static str,
    /// Default slug for roles instantiated from this template.
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub base_role: BaseRole,
    pub permissions: BTreeMap<ResourceType, BTreeMap<String, bool>>,
}

fn template(
    id: &'static str,
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    base_role: BaseRole,
    tweaks: &[(ResourceType, &str, bool)],
) -> RoleTemplate {
    let mut permissions = defaults::default_matrix(base_role);
    for (resource, permission, granted) in tweaks {
        debug_assert!(
            catalog::is_valid_permission(*resource, permission),
            "template {id} tweaks unknown {resource}.{permission}"
        );
        if let Some(entries) = permissions.get_mut(resource) {
            entries.insert((*permission).to_string(), *granted);
        }
    }
    RoleTemplate {
        id,
        name,
        display_name,
        description,
        base_role,
        permissions,
    }
}

static TEMPLATES: LazyLock<Vec<RoleTemplate>> = LazyLock::new(|| {
    vec![
        template(
            "project-manager",
            "project-manager",
            "Project Manager",
            "Runs projects end to end, including budgets, without raw secret access",
            BaseRole::Admin,
            &[
                (ResourceType::CostManagement, "set_budgets", true),
                (ResourceType::Secrets, "reveal", false),
            ],
        ),
        template(
            "qa-lead",
            "qa-lead",
            "QA Lead",
            "Owns story quality and can roll back bad deployments",
            BaseRole::Developer,
            &[
                (ResourceType::Stories, "delete", true),
                (ResourceType::Deployments, "rollback", true),
            ],
        ),
        template(
            "release-engineer",
            "release-engineer",
            "Release Engineer",
            "Full deployment lifecycle plus integration configuration",
            BaseRole::Developer,
            &[
                (ResourceType::Deployments, "rollback", true),
                (ResourceType::Deployments, "delete", true),
                (ResourceType::Integrations, "configure", true),
            ],
        ),
        template(
            "contractor",
            "contractor",
            "Contractor",
            "Read access to work items without workspace or cost visibility",
            BaseRole::Viewer,
            &[
                (ResourceType::Workspace, "view_settings", false),
                (ResourceType::CostManagement, "view", false),
            ],
        ),
        template(
            "finance-analyst",
            "finance-analyst",
            "Finance Analyst",
            "Cost visibility, budgeting, and export on top of read access",
            BaseRole::Viewer,
            &[
                (ResourceType::CostManagement, "set_budgets", true),
                (ResourceType::CostManagement, "export", true),
            ],
        ),
    ]
});

/// All templates, as owned copies. Callers can never mutate the registry.
pub fn list_templates() -> Vec<RoleTemplate> {
    TEMPLATES.clone()
}

pub fn get_template(id: &str) -> Option<RoleTemplate> {
    TEMPLATES.iter().find(|t| t.id == id).cloned()
}

/// Entries where the template's map differs from its base role's
/// defaults — the only rows worth persisting.
pub fn template_overrides(template: &RoleTemplate) -> Vec<OverrideRow> {
    let mut rows = Vec::new();
    for (resource, entries) in &template.permissions {
        for (permission, granted) in entries {
            if defaults::base_role_default(template.base_role, *resource, permission) != *granted {
                rows.push(OverrideRow::new(*resource, permission.clone(), *granted));
            }
        }
    }
    rows
}

/// Parameters for instantiating a role from a template
#[derive(Clone, Debug)]
pub struct CreateFromTemplateParams {
    pub workspace_id: WorkspaceId,
    pub template_id: String,
    /// Explicit slug; falls back to the template's default name. Either
    /// way the name is deduplicated with a `-2`, `-3`, … suffix.
    pub name: Option<String>,
    /// Per-pair customizations merged over the template map; a matching
    /// entry fully replaces the template's value.
    pub customizations: Vec<OverrideRow>,
    pub created_by: UserId,
}

pub struct TemplateService {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
    perm_audit: Arc<dyn PermissionAudit>,
    invalidator: Invalidator,
}

impl TemplateService {
    pub fn new(
        store: Arc<dyn Store>,
        audit: Arc<dyn AuditSink>,
        perm_audit: Arc<dyn PermissionAudit>,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            store,
            audit,
            perm_audit,
            invalidator,
        }
    }

    /// Diff rows a template would persist on a fresh role.
    pub fn get_template_permissions(&self, template_id: &str) -> Result<Vec<OverrideRow>, Error> {
        let template = get_template(template_id)
            .ok_or_else(|| Error::NotFound(format!("template '{template_id}' not found")))?;
        Ok(template_overrides(&template))
    }

    /// Instantiate a role from a template: create the role row, merge
    /// customizations over the template map, and persist the diff
    /// against base-role defaults in one bulk transaction.
    pub async fn create_role_from_template(
        &self,
        params: &CreateFromTemplateParams,
    ) -> Result<Role, Error> {
        let template = get_template(&params.template_id)
            .ok_or_else(|| Error::NotFound(format!("template '{}' not found", params.template_id)))?;

        for row in &params.customizations {
            catalog::validate_permission(row.resource, &row.permission)?;
        }

        let base_name = match &params.name {
            Some(name) => {
                validate_role_name(name)?;
                name.clone()
            }
            None => template.name.to_string(),
        };
        let name = self.dedupe_name(&params.workspace_id, &base_name).await?;

        let role = self
            .store
            .create_role(
                &CreateRoleParams {
                    workspace_id: params.workspace_id.clone(),
                    name,
                    display_name: template.display_name.to_string(),
                    description: Some(template.description.to_string()),
                    color: None,
                    base_role: Some(template.base_role),
                    template_id: Some(template.id.to_string()),
                    created_by: params.created_by.clone(),
                },
                MAX_CUSTOM_ROLES,
            )
            .await
            .map_err(map_create_err)?;

        // Customizations fully override matching template entries.
        let mut merged = template.permissions.clone();
        for row in &params.customizations {
            if let Some(entries) = merged.get_mut(&row.resource) {
                entries.insert(row.permission.clone(), row.granted);
            }
        }

        let mut diff = Vec::new();
        for (resource, entries) in &merged {
            for (permission, granted) in entries {
                if defaults::base_role_default(template.base_role, *resource, permission)
                    != *granted
                {
                    diff.push(OverrideRow::new(*resource, permission.clone(), *granted));
                }
            }
        }
        if !diff.is_empty() {
            self.store.upsert_overrides(&role.id, &diff).await?;
        }

        self.dispatch_entry(
            AuditEntry::builder(
                &role.workspace_id,
                &params.created_by,
                AuditAction::TemplateInstantiate,
            )
            .entity("role", role.id.to_string())
            .details(json!({ "template_id": template.id, "name": role.name }))
            .build(),
        );
        self.dispatch_event(
            PermissionEvent::new(
                &role.workspace_id,
                &params.created_by,
                &role.id,
                PermissionEventType::TemplateApplied,
            )
            .after(rows_json(&diff)),
        );
        self.invalidator.invalidate_workspace_detached(&role.workspace_id);

        Ok(role)
    }

    /// Put a template-derived role back to its template's permission
    /// set: delete all overrides and re-insert the template diff in one
    /// transaction. The workspace cache is purged before returning.
    pub async fn reset_role_to_template(
        &self,
        actor: &UserId,
        role_ref: &RoleRef,
    ) -> Result<(), Error> {
        let role = match role_ref {
            RoleRef::System(base) => {
                return Err(Error::Forbidden(format!(
                    "system role '{base}' cannot be modified"
                )))
            }
            RoleRef::Custom(role_id) => {
                self.store.get_role(role_id).await.map_err(|e| match e {
                    StoreError::NotFound => Error::NotFound("role not found".to_string()),
                    other => other.into(),
                })?
            }
        };

        let template_id = role
            .template_id
            .as_deref()
            .ok_or_else(|| Error::BadRequest("role is not template-derived".to_string()))?;
        let template = get_template(template_id).ok_or_else(|| {
            Error::NotFound(format!("template '{template_id}' is no longer in the registry"))
        })?;

        let before = self.store.list_overrides(&role.id).await?;
        let diff = template_overrides(&template);
        self.store.replace_overrides(&role.id, &diff).await?;

        // A stale cached answer would otherwise survive until TTL expiry.
        self.invalidator.invalidate_workspace(&role.workspace_id).await;

        self.dispatch_entry(
            AuditEntry::builder(&role.workspace_id, actor, AuditAction::TemplateReset)
                .entity("role", role.id.to_string())
                .details(json!({ "template_id": template.id }))
                .build(),
        );
        self.dispatch_event(
            PermissionEvent::new(&role.workspace_id, actor, &role.id, PermissionEventType::TemplateReset)
                .before(serde_json::Value::Array(
                    before
                        .iter()
                        .map(|o| {
                            json!({
                                "resource": o.resource.as_str(),
                                "permission": o.permission,
                                "granted": o.granted,
                            })
                        })
                        .collect(),
                ))
                .after(rows_json(&diff)),
        );

        Ok(())
    }

    // ────────────────────────────────── Internals ─────────────────────────────────────

    /// Resolve a free slug with one existing-names query, appending
    /// `-2`, `-3`, … until the name is unused.
    async fn dedupe_name(
        &self,
        workspace_id: &WorkspaceId,
        base_name: &str,
    ) -> Result<String, Error> {
        let taken = self.store.list_role_names(workspace_id).await?;
        if !taken.iter().any(|n| n == base_name) {
            return Ok(base_name.to_string());
        }
        let mut suffix = 2u32;
        loop {
            let candidate = format!("{base_name}-{suffix}");
            if !taken.iter().any(|n| n == &candidate) {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    fn dispatch_entry(&self, entry: AuditEntry) {
        let sink = Arc::clone(&self.audit);
        tokio::spawn(async move {
            if let Err(e) = sink.log(entry).await {
                tracing::warn!(error = %e, "audit write failed");
            }
        });
    }

    fn dispatch_event(&self, event: PermissionEvent) {
        let sink = Arc::clone(&self.perm_audit);
        tokio::spawn(async move {
            if let Err(e) = sink.record(event).await {
                tracing::warn!(error = %e, "permission audit write failed");
            }
        });
    }
}

fn rows_json(rows: &[OverrideRow]) -> serde_json::Value {
    serde_json::Value::Array(
        rows.iter()
            .map(|r| {
                json!({
                    "resource": r.resource.as_str(),
                    "permission": r.permission,
                    "granted": r.granted,
                })
            })
            .collect(),
    )
}
