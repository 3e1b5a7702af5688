//! Azure provider error types

use simplevm_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az CLI not found. Please install: https://aka.ms/azure-cli")]
    AzNotFound,

    #[error("az authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Invalid resource configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl From<AzureError> for CloudError {
    fn from(e: AzureError) -> Self {
        match e {
            AzureError::AzNotFound => CloudError::ProviderNotFound("az CLI not found".to_string()),
            AzureError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            AzureError::CommandFailed(msg) => CloudError::CommandFailed(msg),
            AzureError::NotFound(msg) => CloudError::ResourceNotFound(msg),
            AzureError::UnsupportedResourceType(msg) | AzureError::InvalidConfig(msg) => {
                CloudError::InvalidConfig(msg)
            }
            AzureError::CloudError(inner) => inner,
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
