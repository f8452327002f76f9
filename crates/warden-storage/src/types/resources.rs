//! Resource domains that carry their own permission vocabulary.

use std::str::FromStr;

/// A coarse domain object category. Each resource type has a fixed, finite
/// set of permission names defined in the catalog (warden-core).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Projects,
    Agents,
    Stories,
    Deployments,
    Secrets,
    Integrations,
    Workspace,
    CostManagement,
}

impl ResourceType {
    /// All resource types, in catalog order.
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Projects,
        ResourceType::Agents,
        ResourceType::Stories,
        ResourceType::Deployments,
        ResourceType::Secrets,
        ResourceType::Integrations,
        ResourceType::Workspace,
        ResourceType::CostManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Projects => "projects",
            ResourceType::Agents => "agents",
            ResourceType::Stories => "stories",
            ResourceType::Deployments => "deployments",
            ResourceType::Secrets => "secrets",
            ResourceType::Integrations => "integrations",
            ResourceType::Workspace => "workspace",
            ResourceType::CostManagement => "cost_management",
        }
    }
}

/// Error type for parsing ResourceType from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResourceTypeError(pub String);

impl std::fmt::Display for ParseResourceTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid resource type: {}", self.0)
    }
}

impl std::error::Error for ParseResourceTypeError {}

impl FromStr for ResourceType {
    type Err = ParseResourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(ResourceType::Projects),
            "agents" => Ok(ResourceType::Agents),
            "stories" => Ok(ResourceType::Stories),
            "deployments" => Ok(ResourceType::Deployments),
            "secrets" => Ok(ResourceType::Secrets),
            "integrations" => Ok(ResourceType::Integrations),
            "workspace" => Ok(ResourceType::Workspace),
            "cost_management" => Ok(ResourceType::CostManagement),
            _ => Err(ParseResourceTypeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
