//! az CLI wrapper
//!
//! Wraps the Azure CLI commands used by the provider. Everything except
//! resource groups goes through the generic `az resource` commands with a
//! full ARM request body.

use crate::error::{AzureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// ARM error codes meaning the target itself does not exist
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound"];

/// Whether az stderr reports that the target resource does not exist
///
/// Only whole error codes count, so `SubscriptionNotFound` or
/// `ImageNotFound` stay ordinary failures.
pub fn is_not_found(stderr: &str) -> bool {
    stderr
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| NOT_FOUND_CODES.contains(&token))
}

/// az CLI wrapper
#[derive(Debug, Clone, Default)]
pub struct AzCli;

impl AzCli {
    pub fn new() -> Self {
        Self
    }

    /// Check if az is installed and logged in
    pub async fn check_auth(&self) -> Result<AccountInfo> {
        let which = Command::new("which").arg("az").output().await?;

        if !which.status.success() {
            return Err(AzureError::AzNotFound);
        }

        let output = self
            .run_command(&["account", "show"])
            .await
            .map_err(|e| match e {
                AzureError::CommandFailed(msg) => AzureError::AuthenticationFailed(msg),
                other => other,
            })?;

        let account: AccountInfo = serde_json::from_str(&output)?;
        Ok(account)
    }

    /// Run an az command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        cmd.arg("--output").arg("json").arg("--only-show-errors");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: az {}", args.join(" "));

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_not_found(&stderr) {
                return Err(AzureError::NotFound(stderr));
            }
            return Err(AzureError::CommandFailed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command whose JSON output describes one resource; not found is `None`
    async fn show(&self, args: &[&str]) -> Result<Option<serde_json::Value>> {
        match self.run_command(args).await {
            Ok(output) if output.trim().is_empty() => Ok(None),
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(AzureError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Show a resource group
    pub async fn show_group(&self, name: &str) -> Result<Option<serde_json::Value>> {
        self.show(&["group", "show", "--name", name]).await
    }

    /// Create (or update) a resource group
    pub async fn create_group(
        &self,
        name: &str,
        location: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value> {
        let tag_args = format_tags(tags);

        let mut args = vec!["group", "create", "--name", name, "--location", location];
        if !tag_args.is_empty() {
            args.push("--tags");
            args.extend(tag_args.iter().map(String::as_str));
        }

        let output = self.run_command(&args).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Delete a resource group and wait for completion
    pub async fn delete_group(&self, name: &str) -> Result<()> {
        self.run_command(&["group", "delete", "--name", name, "--yes"])
            .await?;
        Ok(())
    }

    /// Show an ARM resource by ID
    pub async fn show_resource(
        &self,
        id: &str,
        api_version: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.show(&["resource", "show", "--ids", id, "--api-version", api_version])
            .await
    }

    /// Create (or update) an ARM resource from a full request body
    pub async fn create_resource(
        &self,
        id: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = serde_json::to_string(body)?;
        let output = self
            .run_command(&[
                "resource",
                "create",
                "--id",
                id,
                "--api-version",
                api_version,
                "--is-full-object",
                "--properties",
                body.as_str(),
            ])
            .await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Delete an ARM resource by ID
    pub async fn delete_resource(&self, id: &str, api_version: &str) -> Result<()> {
        self.run_command(&["resource", "delete", "--ids", id, "--api-version", api_version])
            .await?;
        Ok(())
    }
}

/// Format tags as `key=value` arguments
pub fn format_tags(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Account information from `az account show`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Subscription ID
    pub id: String,

    /// Subscription name
    pub name: String,

    pub tenant_id: Option<String>,

    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUser {
    pub name: String,
}
