//! Static base-role default table.
//!
//! [base role][resource] → granted permission set, consulted only when no
//! explicit override exists. Exposed through accessors returning owned
//! copies; the table itself is never handed out mutably.

use std::collections::BTreeMap;

use warden_storage::{BaseRole, ResourceType};

use crate::catalog;

/// Permissions granted by default to a base role on a resource.
/// Anything absent from the returned slice resolves to deny.
pub fn granted_permissions(base: BaseRole, resource: ResourceType) -> &'static [&'static str] {
    match base {
        // Owner and admin get the full vocabulary, except the two
        // billing-adjacent permissions reserved to owners.
        BaseRole::Owner => catalog::permissions_for(resource),
        BaseRole::Admin => match resource {
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
            ],
            ResourceType::CostManagement => &["view", "export"],
        },
        BaseRole::Developer => match resource {
            ResourceType::Projects => &["view", "create", "edit"],
            ResourceType::Agents => &["view", "create", "edit", "execute"],
            ResourceType::Stories => &["view", "create", "edit", "assign"],
            ResourceType::Deployments => &["view", "create", "promote"],
            ResourceType::Secrets => &["view", "create", "edit"],
            ResourceType::Integrations => &["view"],
            ResourceType::Workspace => &["view_settings"],
            ResourceType::CostManagement => &["view"],
        },
        BaseRole::Viewer => match resource {
            ResourceType::Projects => &["view"],
            ResourceType::Agents => &["view"],
            ResourceType::Stories => &["view"],
            ResourceType::Deployments => &["view"],
            ResourceType::Secrets => &[],
            ResourceType::Integrations => &["view"],
            ResourceType::Workspace => &["view_settings"],
            ResourceType::CostManagement => &["view"],
        },
    }
}

/// Inherited value for one (base role, resource, permission) triple.
/// Unknown pairs resolve to false.
pub fn base_role_default(base: BaseRole, resource: ResourceType, permission: &str) -> bool {
    granted_permissions(base, resource).contains(&permission)
}

/// Owned full-catalog map of a base role's defaults.
pub fn default_matrix(base: BaseRole) -> BTreeMap<ResourceType, BTreeMap<String, bool>> {
    let mut matrix = BTreeMap::new();
    for resource in ResourceType::ALL {
        let granted = granted_permissions(base, resource);
        let entries = catalog::permissions_for(resource)
            .iter()
            .map(|p| (p.to_string(), granted.contains(p)))
            .collect();
        matrix.insert(resource, entries);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_has_everything() {
        for resource in ResourceType::ALL {
            for permission in catalog::permissions_for(resource) {
                assert!(base_role_default(BaseRole::Owner, resource, permission));
            }
        }
    }

    #[test]
    fn admin_lacks_only_billing_permissions() {
        assert!(!base_role_default(
            BaseRole::Admin,
            ResourceType::Workspace,
            "manage_billing"
        ));
        assert!(!base_role_default(
            BaseRole::Admin,
            ResourceType::CostManagement,
            "set_budgets"
        ));
        let denied: usize = ResourceType::ALL
            .iter()
            .map(|r| {
                catalog::permissions_for(*r)
                    .iter()
                    .filter(|p| !base_role_default(BaseRole::Admin, *r, p))
                    .count()
            })
            .sum();
        assert_eq!(denied, 2);
    }

    #[test]
    fn viewer_is_read_only() {
        for resource in ResourceType::ALL {
            for permission in granted_permissions(BaseRole::Viewer, resource) {
                assert!(
                    permission.starts_with("view"),
                    "viewer granted {permission} on {resource}"
                );
            }
        }
    }

    #[test]
    fn every_default_is_a_catalog_permission() {
        for base in BaseRole::ALL {
            for resource in ResourceType::ALL {
                for permission in granted_permissions(base, resource) {
                    assert!(
                        catalog::is_valid_permission(resource, permission),
                        "{base} grants unknown {resource}.{permission}"
                    );
                }
            }
        }
    }

    #[test]
    fn default_matrix_covers_the_full_catalog() {
        for base in BaseRole::ALL {
            let matrix = default_matrix(base);
            assert_eq!(matrix.len(), ResourceType::ALL.len());
            for resource in ResourceType::ALL {
                assert_eq!(
                    matrix[&resource].len(),
                    catalog::permissions_for(resource).len()
                );
            }
        }
    }

    #[test]
    fn unknown_pair_defaults_to_deny() {
        assert!(!base_role_default(
            BaseRole::Owner,
            ResourceType::Secrets,
            "rotate"
        ));
    }
}
