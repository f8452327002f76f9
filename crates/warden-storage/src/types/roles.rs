//! Role types: system base roles and workspace-scoped custom roles.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::{RoleId, UserId, WorkspaceId};

/// System base role. Used both as a literal membership role and as the
/// inheritance source for custom roles that set `base_role`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseRole {
    Owner,
    Admin,
    Developer,
    Viewer,
}

impl BaseRole {
    /// All base roles, most to least privileged.
    pub const ALL: [BaseRole; 4] = [
        BaseRole::Owner,
        BaseRole::Admin,
        BaseRole::Developer,
        BaseRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseRole::Owner => "owner",
            BaseRole::Admin => "admin",
            BaseRole::Developer => "developer",
            BaseRole::Viewer => "viewer",
        }
    }
}

/// Error type for parsing BaseRole from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBaseRoleError(pub String);

impl std::fmt::Display for ParseBaseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid base role: {}", self.0)
    }
}

impl std::error::Error for ParseBaseRoleError {}

impl FromStr for BaseRole {
    type Err = ParseBaseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(BaseRole::Owner),
            "admin" => Ok(BaseRole::Admin),
            "developer" => Ok(BaseRole::Developer),
            "viewer" => Ok(BaseRole::Viewer),
            _ => Err(ParseBaseRoleError(s.to_string())),
        }
    }
}

impl std::fmt::Display for BaseRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Custom role record. System roles are never stored as rows; they are
/// computed on read from fixed definitions plus live member counts.
#[derive(Clone, Debug)]
pub struct Role {
    pub id: RoleId,
    pub workspace_id: WorkspaceId,
    /// Unique slug within the workspace.
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Inheritance source for permissions without an explicit override.
    /// None means every un-overridden permission resolves to deny.
    pub base_role: Option<BaseRole>,
    pub is_active: bool,
    /// Display ordering within the workspace; lower sorts first.
    pub priority: i64,
    /// Set once at creation when the role was instantiated from a
    /// template; never changed afterwards.
    pub template_id: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a custom role
#[derive(Clone, Debug)]
pub struct CreateRoleParams {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub base_role: Option<BaseRole>,
    pub template_id: Option<String>,
    pub created_by: UserId,
}

/// Field patch for updating a custom role. `None` leaves a field
/// untouched; `base_role: Some(None)` clears the inheritance source.
#[derive(Clone, Debug, Default)]
pub struct UpdateRoleFields {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub base_role: Option<Option<BaseRole>>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_role_roundtrip() {
        for role in BaseRole::ALL {
            let s = role.as_str();
            let parsed: BaseRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_base_role_parse_invalid() {
        assert!("invalid".parse::<BaseRole>().is_err());
        assert!("Owner".parse::<BaseRole>().is_err()); // Case sensitive
        assert!("none".parse::<BaseRole>().is_err()); // "none" maps to Option::None
        assert!("".parse::<BaseRole>().is_err());
    }

    #[test]
    fn test_base_role_is_copy() {
        let role = BaseRole::Admin;
        let copied = role;
        assert_eq!(role, copied);
    }

    #[test]
    fn test_update_fields_default_is_empty_patch() {
        let fields = UpdateRoleFields::default();
        assert!(fields.name.is_none());
        assert!(fields.base_role.is_none());
        assert!(fields.is_active.is_none());
    }
}
