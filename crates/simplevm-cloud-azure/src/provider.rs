//! Azure provider implementation

use crate::az::AzCli;
use crate::error::{AzureError, Result};
use crate::resources::{PROVIDER_NAME, ResourceKind};
use async_trait::async_trait;
use serde_json::Value;
use simplevm_cloud::{AuthStatus, CloudProvider, ResourceConfig, ResourceState, ResourceStatus};
use std::collections::BTreeMap;
use tokio::sync::OnceCell;

/// A resource configuration with every reference resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRequest {
    pub kind: ResourceKind,
    pub name: String,
    pub resource_group: Option<String>,
    pub parent: Option<String>,
    pub body: Value,
}

impl ArmRequest {
    /// Parse a resolved [`ResourceConfig`]
    pub fn from_config(resource: &ResourceConfig) -> Result<Self> {
        let kind = ResourceKind::from_type_token(&resource.resource_type)
            .ok_or_else(|| AzureError::UnsupportedResourceType(resource.resource_type.clone()))?;

        let text = |field: &str| -> Result<Option<String>> {
            match resource.config.get(field) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(AzureError::InvalidConfig(format!(
                    "{}: '{}' must be a string, got {}",
                    resource.key(),
                    field,
                    other
                ))),
            }
        };

        let name = text("name")?.unwrap_or_else(|| resource.id.clone());
        let resource_group = text("resourceGroup")?;
        let parent = text("parent")?;

        if kind != ResourceKind::ResourceGroup && resource_group.is_none() {
            return Err(AzureError::InvalidConfig(format!(
                "{}: resourceGroup is required",
                resource.key()
            )));
        }
        if kind == ResourceKind::Subnet && parent.is_none() {
            return Err(AzureError::InvalidConfig(format!(
                "{}: parent virtual network is required",
                resource.key()
            )));
        }

        Ok(Self {
            kind,
            name,
            resource_group,
            parent,
            body: resource.config.get("body").cloned().unwrap_or(Value::Null),
        })
    }

    /// Full ARM resource ID
    pub fn resource_id(&self, subscription: &str) -> String {
        let group = self.resource_group.as_deref().unwrap_or_default();
        match self.kind {
            ResourceKind::ResourceGroup => {
                format!("/subscriptions/{}/resourceGroups/{}", subscription, self.name)
            }
            ResourceKind::Subnet => format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
                subscription,
                group,
                self.parent.as_deref().unwrap_or_default(),
                self.name
            ),
            kind => format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
                subscription,
                group,
                kind.arm_type(),
                self.name
            ),
        }
    }

    fn tags(&self) -> BTreeMap<String, String> {
        self.body
            .get("tags")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default()
    }

    fn location(&self) -> Option<&str> {
        self.body.get("location").and_then(Value::as_str)
    }
}

/// Convert an ARM response into a [`ResourceState`]
pub fn state_from_response(request: &ArmRequest, response: &Value) -> ResourceState {
    let id = response
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let provisioning_state = response
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str);
    let status = match provisioning_state {
        Some("Succeeded") | None => ResourceStatus::Running,
        Some("Creating") | Some("Updating") => ResourceStatus::Creating,
        Some("Deleting") => ResourceStatus::Deleting,
        Some("Failed") => ResourceStatus::Error,
        Some(_) => ResourceStatus::Unknown,
    };

    let mut state = ResourceState::new(id, request.kind.type_token())
        .with_provider(PROVIDER_NAME)
        .with_status(status)
        .with_attribute("name", Value::String(request.name.clone()));

    if let Some(location) = response.get("location").or_else(|| request.body.get("location")) {
        state.set_attribute("location", location.clone());
    }
    if let Some(ref group) = request.resource_group {
        state.set_attribute("resource_group", Value::String(group.clone()));
    }
    if let Some(ref parent) = request.parent {
        state.set_attribute("parent", Value::String(parent.clone()));
    }
    if let Some(ip) = response.pointer("/properties/ipAddress") {
        state.set_attribute("ip_address", ip.clone());
    }

    state
}

/// Azure provider
pub struct AzureProvider {
    az: AzCli,
    subscription: OnceCell<String>,
}

impl AzureProvider {
    pub fn new() -> Self {
        Self {
            az: AzCli::new(),
            subscription: OnceCell::new(),
        }
    }

    /// Subscription ID, looked up once from `az account show`
    async fn subscription_id(&self) -> Result<&str> {
        let id = self
            .subscription
            .get_or_try_init(|| async { self.az.check_auth().await.map(|account| account.id) })
            .await?;
        Ok(id.as_str())
    }

    async fn read_request(&self, request: &ArmRequest) -> Result<Option<ResourceState>> {
        let response = match request.kind {
            ResourceKind::ResourceGroup => self.az.show_group(&request.name).await?,
            kind => {
                let id = request.resource_id(self.subscription_id().await?);
                self.az.show_resource(&id, kind.api_version()).await?
            }
        };
        Ok(response.map(|r| state_from_response(request, &r)))
    }

    async fn create_request(&self, request: &ArmRequest) -> Result<ResourceState> {
        let response = match request.kind {
            ResourceKind::ResourceGroup => {
                let location = request.location().ok_or_else(|| {
                    AzureError::InvalidConfig(format!("{}: location is required", request.name))
                })?;
                self.az
                    .create_group(&request.name, location, &request.tags())
                    .await?
            }
            kind => {
                let id = request.resource_id(self.subscription_id().await?);
                self.az
                    .create_resource(&id, kind.api_version(), &request.body)
                    .await?
            }
        };
        Ok(state_from_response(request, &response))
    }
}

impl Default for AzureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for AzureProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn display_name(&self) -> &str {
        "Microsoft Azure"
    }

    async fn check_auth(&self) -> simplevm_cloud::Result<AuthStatus> {
        match self.az.check_auth().await {
            Ok(account) => {
                let user = account
                    .user
                    .map(|u| u.name)
                    .unwrap_or_else(|| "unknown".to_string());
                let _ = self.subscription.set(account.id.clone());
                Ok(AuthStatus::ok(format!("{} ({}) as {}", account.name, account.id, user)))
            }
            Err(AzureError::AzNotFound) => Ok(AuthStatus::failed("az CLI is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn read(&self, resource: &ResourceConfig) -> simplevm_cloud::Result<Option<ResourceState>> {
        let request = ArmRequest::from_config(resource)?;
        Ok(self.read_request(&request).await?)
    }

    async fn create(&self, resource: &ResourceConfig) -> simplevm_cloud::Result<ResourceState> {
        let request = ArmRequest::from_config(resource)?;
        tracing::info!("Creating {} {}", request.kind, request.name);
        Ok(self.create_request(&request).await?)
    }

    async fn delete(&self, resource: &ResourceState) -> simplevm_cloud::Result<()> {
        let kind = ResourceKind::from_type_token(&resource.resource_type)
            .ok_or_else(|| AzureError::UnsupportedResourceType(resource.resource_type.clone()))?;

        let outcome = match kind {
            ResourceKind::ResourceGroup => {
                let name: String = resource.get_attribute("name").ok_or_else(|| {
                    AzureError::InvalidConfig(format!("{}: name attribute missing", resource.id))
                })?;
                self.az.delete_group(&name).await
            }
            kind => self.az.delete_resource(&resource.id, kind.api_version()).await,
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(AzureError::NotFound(_)) => {
                tracing::warn!("{} was already deleted", resource.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
