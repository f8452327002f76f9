//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// Workspace identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkspaceId(pub Uuid);

/// User identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Custom role identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleId(pub Uuid);

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_id_debug() {
        let uuid = Uuid::new_v4();
        let role_id = RoleId(uuid);
        assert!(format!("{:?}", role_id).contains(&uuid.to_string()));
    }

    #[test]
    fn test_workspace_id_display() {
        let uuid = Uuid::new_v4();
        assert_eq!(WorkspaceId(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // UserId and RoleId wrapping the same UUID must not compare;
        // this is a compile-time property, the assertion documents intent.
        let uuid = Uuid::new_v4();
        assert_eq!(UserId(uuid).0, RoleId(uuid).0);
    }
}
