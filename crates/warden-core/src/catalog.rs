//! Fixed resource/permission catalog.
//!
//! Every mutation validates its (resource, permission) pair against this
//! vocabulary before touching storage; unknown pairs are rejected, never
//! silently stored. The read path resolves unknown pairs to deny.

use warden_storage::ResourceType;

use crate::error::Error;

/// Permission names for a resource type, in catalog order.
pub fn permissions_for(resource: ResourceType) -> &'static [&'static str] {
    match resource {
        ResourceType::Projects => &["view", "create", "edit", "delete", "manage_members"],
        ResourceType::Agents => &["view", "create", "edit", "delete", "execute"],
        ResourceType::Stories => &["view", "create", "edit", "delete", "assign"],
        ResourceType::Deployments => &["view", "create", "promote", "rollback", "delete"],
        ResourceType::Secrets => &["view", "create", "edit", "delete", "reveal"],
        ResourceType::Integrations => &["view", "connect", "configure", "disconnect"],
        ResourceType::Workspace => &[
            "view_settings",
            "edit_settings",
            "manage_members",
            "manage_roles",
            "manage_billing",
        ],
        ResourceType::CostManagement => &["view", "set_budgets", "export"],
    }
}

pub fn is_valid_permission(resource: ResourceType, permission: &str) -> bool {
    permissions_for(resource).contains(&permission)
}

/// Reject unknown (resource, permission) pairs with BadRequest.
pub fn validate_permission(resource: ResourceType, permission: &str) -> Result<(), Error> {
    if is_valid_permission(resource, permission) {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "unknown permission '{}' for resource '{}'",
            permission, resource
        )))
    }
}

/// Total number of (resource, permission) pairs in the catalog.
pub fn catalog_size() -> usize {
    ResourceType::ALL
        .iter()
        .map(|r| permissions_for(*r).len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resource_has_permissions() {
        for resource in ResourceType::ALL {
            assert!(
                !permissions_for(resource).is_empty(),
                "empty vocabulary for {resource}"
            );
        }
    }

    #[test]
    fn no_duplicate_permissions_within_a_resource() {
        for resource in ResourceType::ALL {
            let perms = permissions_for(resource);
            let unique: std::collections::HashSet<_> = perms.iter().collect();
            assert_eq!(unique.len(), perms.len(), "duplicates under {resource}");
        }
    }

    #[test]
    fn validate_accepts_known_pairs() {
        assert!(validate_permission(ResourceType::Secrets, "reveal").is_ok());
        assert!(validate_permission(ResourceType::Workspace, "manage_roles").is_ok());
    }

    #[test]
    fn validate_rejects_unknown_pairs() {
        let err = validate_permission(ResourceType::Secrets, "rotate").unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        // A permission valid elsewhere is still unknown for this resource.
        let err = validate_permission(ResourceType::CostManagement, "reveal").unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn catalog_size_is_stable() {
        assert_eq!(catalog_size(), 37);
    }
}
