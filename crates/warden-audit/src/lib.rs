//! Audit abstractions for warden.
//!
//! Two sinks, both fire-and-forget from the caller's perspective: the
//! general [`AuditSink`] for role lifecycle entries and the
//! [`PermissionAudit`] sink for permission changes with before/after
//! snapshots. Persistence backends live outside this core; this crate
//! ships a tracing-backed sink and an in-memory sink for assertions.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use warden_storage::{RoleId, UserId, WorkspaceId};

/// Unique identifier for an audit entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    /// Generate a new audit entry ID using UUID v7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Categories of auditable role and permission actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    RoleClone,
    RoleReorder,
    PermissionSet,
    PermissionBulkSet,
    PermissionResourceAction,
    PermissionReset,
    TemplateInstantiate,
    TemplateReset,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::RoleCreate => "role.create",
            AuditAction::RoleUpdate => "role.update",
            AuditAction::RoleDelete => "role.delete",
            AuditAction::RoleClone => "role.clone",
            AuditAction::RoleReorder => "role.reorder",
            AuditAction::PermissionSet => "permission.set",
            AuditAction::PermissionBulkSet => "permission.bulk_set",
            AuditAction::PermissionResourceAction => "permission.resource_action",
            AuditAction::PermissionReset => "permission.reset",
            AuditAction::TemplateInstantiate => "template.instantiate",
            AuditAction::TemplateReset => "template.reset",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "role.create" => Ok(AuditAction::RoleCreate),
            "role.update" => Ok(AuditAction::RoleUpdate),
            "role.delete" => Ok(AuditAction::RoleDelete),
            "role.clone" => Ok(AuditAction::RoleClone),
            "role.reorder" => Ok(AuditAction::RoleReorder),
            "permission.set" => Ok(AuditAction::PermissionSet),
            "permission.bulk_set" => Ok(AuditAction::PermissionBulkSet),
            "permission.resource_action" => Ok(AuditAction::PermissionResourceAction),
            "permission.reset" => Ok(AuditAction::PermissionReset),
            "template.instantiate" => Ok(AuditAction::TemplateInstantiate),
            "template.reset" => Ok(AuditAction::TemplateReset),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// An audit entry for a role or permission operation.
///
/// Uses raw UUIDs for serialization compatibility; use the builder to
/// construct entries from typed IDs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub timestamp: DateTime<Utc>,
    pub workspace_id: Uuid,
    /// User that performed the action
    pub actor_id: Uuid,
    pub action: AuditAction,
    /// Type of entity affected (e.g., "role")
    pub entity_type: String,
    /// Identifier of the affected entity
    pub entity_id: String,
    /// Additional details as JSON (e.g., before/after field diffs)
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn builder(
        workspace_id: &WorkspaceId,
        actor: &UserId,
        action: AuditAction,
    ) -> AuditEntryBuilder {
        AuditEntryBuilder::new(workspace_id, actor, action)
    }

    pub fn get_workspace_id(&self) -> WorkspaceId {
        WorkspaceId(self.workspace_id)
    }

    pub fn get_actor_id(&self) -> UserId {
        UserId(self.actor_id)
    }
}

/// Builder for constructing audit entries
pub struct AuditEntryBuilder {
    workspace_id: Uuid,
    actor_id: Uuid,
    action: AuditAction,
    entity_type: String,
    entity_id: String,
    details: Option<serde_json::Value>,
}

impl AuditEntryBuilder {
    pub fn new(workspace_id: &WorkspaceId, actor: &UserId, action: AuditAction) -> Self {
        Self {
            workspace_id: workspace_id.0,
            actor_id: actor.0,
            action,
            entity_type: String::new(),
            entity_id: String::new(),
            details: None,
        }
    }

    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self.entity_id = entity_id.into();
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            workspace_id: self.workspace_id,
            actor_id: self.actor_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            details: self.details,
        }
    }
}

/// Kind of permission change captured by the permission audit sink
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionEventType {
    Set,
    BulkSet,
    ResourceAction,
    Reset,
    TemplateApplied,
    TemplateReset,
}

impl std::fmt::Display for PermissionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermissionEventType::Set => "set",
            PermissionEventType::BulkSet => "bulk_set",
            PermissionEventType::ResourceAction => "resource_action",
            PermissionEventType::Reset => "reset",
            PermissionEventType::TemplateApplied => "template_applied",
            PermissionEventType::TemplateReset => "template_reset",
        };
        write!(f, "{}", s)
    }
}

/// A permission change with before/after state snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionEvent {
    pub id: AuditEntryId,
    pub timestamp: DateTime<Utc>,
    pub workspace_id: Uuid,
    pub event_type: PermissionEventType,
    pub actor_id: Uuid,
    pub target_role: Uuid,
    /// State before the mutation (shape depends on the event type)
    pub before: Option<serde_json::Value>,
    /// State after the mutation
    pub after: Option<serde_json::Value>,
}

impl PermissionEvent {
    pub fn new(
        workspace_id: &WorkspaceId,
        actor: &UserId,
        target_role: &RoleId,
        event_type: PermissionEventType,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            workspace_id: workspace_id.0,
            event_type,
            actor_id: actor.0,
            target_role: target_role.0,
            before: None,
            after: None,
        }
    }

    pub fn before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }

    pub fn get_target_role(&self) -> RoleId {
        RoleId(self.target_role)
    }
}

/// Error type for audit sinks
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// General audit sink. Callers dispatch fire-and-forget; a sink failure
/// must never break the operation being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Permission audit sink for before/after permission change events.
#[async_trait]
pub trait PermissionAudit: Send + Sync {
    async fn record(&self, event: PermissionEvent) -> Result<(), AuditError>;
}

/// Sink that emits entries as structured tracing events. Suitable as a
/// default wiring when no persistence backend is attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn log(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            audit_id = %entry.id,
            workspace = %entry.workspace_id,
            actor = %entry.actor_id,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "audit"
        );
        Ok(())
    }
}

#[async_trait]
impl PermissionAudit for TracingAudit {
    async fn record(&self, event: PermissionEvent) -> Result<(), AuditError> {
        tracing::info!(
            audit_id = %event.id,
            workspace = %event.workspace_id,
            actor = %event.actor_id,
            event_type = %event.event_type,
            target_role = %event.target_role,
            "permission audit"
        );
        Ok(())
    }
}

/// In-memory sink capturing entries for test assertions.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
    events: Mutex<Vec<PermissionEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit lock poisoned").clone()
    }

    pub fn events(&self) -> Vec<PermissionEvent> {
        self.events.lock().expect("audit lock poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAudit {
    async fn log(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit lock poisoned").push(entry);
        Ok(())
    }
}

#[async_trait]
impl PermissionAudit for MemoryAudit {
    async fn record(&self, event: PermissionEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit lock poisoned").push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_roundtrip() {
        let actions = [
            AuditAction::RoleCreate,
            AuditAction::RoleUpdate,
            AuditAction::RoleDelete,
            AuditAction::RoleClone,
            AuditAction::RoleReorder,
            AuditAction::PermissionSet,
            AuditAction::PermissionBulkSet,
            AuditAction::PermissionResourceAction,
            AuditAction::PermissionReset,
            AuditAction::TemplateInstantiate,
            AuditAction::TemplateReset,
        ];

        for action in actions {
            let display = action.to_string();
            let parsed: AuditAction = display.parse().unwrap();
            assert_eq!(action, parsed, "Roundtrip failed for {:?}", action);
        }
    }

    #[test]
    fn test_audit_action_parse_error() {
        let result = "role.promote".parse::<AuditAction>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Unknown audit action"));
    }

    #[test]
    fn test_audit_action_serde() {
        let action = AuditAction::PermissionBulkSet;
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, "\"permission_bulk_set\"");

        let deserialized: AuditAction = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, action);
    }

    #[test]
    fn test_entry_builder() {
        let workspace_id = WorkspaceId(Uuid::new_v4());
        let actor = UserId(Uuid::new_v4());

        let entry = AuditEntry::builder(&workspace_id, &actor, AuditAction::RoleCreate)
            .entity("role", "qa-lead")
            .details(serde_json::json!({"base_role": "developer"}))
            .build();

        assert_eq!(entry.workspace_id, workspace_id.0);
        assert_eq!(entry.actor_id, actor.0);
        assert_eq!(entry.action, AuditAction::RoleCreate);
        assert_eq!(entry.entity_type, "role");
        assert_eq!(entry.entity_id, "qa-lead");
        assert!(entry.details.is_some());
        assert_eq!(entry.get_workspace_id(), workspace_id);
        assert_eq!(entry.get_actor_id(), actor);
    }

    #[test]
    fn test_entry_id_is_v7() {
        let id = AuditEntryId::new();
        assert_eq!(id.0.get_version_num(), 7);
    }

    #[test]
    fn test_permission_event_snapshots() {
        let workspace_id = WorkspaceId(Uuid::new_v4());
        let actor = UserId(Uuid::new_v4());
        let role = RoleId(Uuid::new_v4());

        let event = PermissionEvent::new(
            &workspace_id,
            &actor,
            &role,
            PermissionEventType::Set,
        )
        .before(serde_json::json!({"granted": null}))
        .after(serde_json::json!({"granted": true}));

        assert_eq!(event.event_type, PermissionEventType::Set);
        assert_eq!(event.get_target_role(), role);
        assert_eq!(event.before, Some(serde_json::json!({"granted": null})));
        assert_eq!(event.after, Some(serde_json::json!({"granted": true})));
    }

    #[tokio::test]
    async fn test_memory_sink_captures() {
        let sink = MemoryAudit::new();
        let workspace_id = WorkspaceId(Uuid::new_v4());
        let actor = UserId(Uuid::new_v4());
        let role = RoleId(Uuid::new_v4());

        sink.log(
            AuditEntry::builder(&workspace_id, &actor, AuditAction::RoleDelete)
                .entity("role", role.to_string())
                .build(),
        )
        .await
        .unwrap();
        sink.record(PermissionEvent::new(
            &workspace_id,
            &actor,
            &role,
            PermissionEventType::Reset,
        ))
        .await
        .unwrap();

        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries()[0].action, AuditAction::RoleDelete);
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].event_type, PermissionEventType::Reset);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingAudit;
        let workspace_id = WorkspaceId(Uuid::new_v4());
        let actor = UserId(Uuid::new_v4());

        let result = sink
            .log(AuditEntry::builder(&workspace_id, &actor, AuditAction::RoleReorder).build())
            .await;
        assert!(result.is_ok());
    }
}
