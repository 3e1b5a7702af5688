//! Cloud provider trait definition

use crate::error::Result;
use crate::reference::{OutputRef, collect_refs};
use crate::state::ResourceState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cloud provider abstraction trait
///
/// Providers only perform single-resource operations. Ordering, reference
/// resolution and state bookkeeping are handled by [`crate::Engine`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "azure-native")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Read the current state of a resource, `None` if it does not exist
    async fn read(&self, resource: &ResourceConfig) -> Result<Option<ResourceState>>;

    /// Create a resource; the configuration has all references resolved
    async fn create(&self, resource: &ResourceConfig) -> Result<ResourceState>;

    /// Delete a previously created resource
    async fn delete(&self, resource: &ResourceState) -> Result<()>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Per-resource options that influence scheduling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOptions {
    /// Explicit dependencies (resource keys) in addition to output references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// On replacement, delete the old resource before creating the new one
    #[serde(default)]
    pub delete_before_replace: bool,
}

impl ResourceOptions {
    pub fn delete_before_replace() -> Self {
        Self {
            delete_before_replace: true,
            ..Default::default()
        }
    }

    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.depends_on.push(key.into());
        self
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type token (e.g., "azure-native:network:Subnet")
    pub resource_type: String,

    /// Logical resource name, unique per type
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration, may contain [`OutputRef`] placeholders
    pub config: serde_json::Value,

    /// Scheduling options
    #[serde(default)]
    pub options: ResourceOptions,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
            options: ResourceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResourceOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Reference to one of this resource's outputs
    pub fn output(&self, attribute: &str) -> OutputRef {
        OutputRef::new(self.key(), attribute)
    }

    /// Keys of every resource this one depends on, explicit and implicit
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps = self.options.depends_on.clone();
        for reference in collect_refs(&self.config) {
            if !deps.contains(&reference.resource) {
                deps.push(reference.resource);
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dependencies_merge_explicit_and_implicit() {
        let rg = ResourceConfig::new("group", "rg", "test", json!({}));
        let vnet = ResourceConfig::new(
            "vnet",
            "net",
            "test",
            json!({ "resourceGroup": rg.output("name"), "location": rg.output("location") }),
        )
        .with_options(ResourceOptions::delete_before_replace().depends_on("extra:one"));

        let deps = vnet.dependencies();
        assert_eq!(deps, vec!["extra:one".to_string(), "group:rg".to_string()]);
        assert!(vnet.options.delete_before_replace);
    }
}
