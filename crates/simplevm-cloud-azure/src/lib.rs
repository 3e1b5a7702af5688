//! Azure provider for simplevm
//!
//! This crate implements the CloudProvider trait for Microsoft Azure,
//! covering the resources a single Linux VM needs:
//!
//! - Resource group
//! - Virtual network, subnet and network security group
//! - Public IP address and network interface
//! - Virtual machine
//!
//! # Requirements
//!
//! - `az` CLI must be installed and logged in (`az login`)
//! - The active subscription is used unless one is given explicitly
//!
//! # Example
//!
//! ```ignore
//! use simplevm_cloud_azure::AzureProvider;
//! use simplevm_cloud::CloudProvider;
//!
//! let provider = AzureProvider::new();
//!
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod az;
pub mod error;
pub mod provider;
pub mod resources;

pub use az::{AccountInfo, AccountUser, AzCli};
pub use error::{AzureError, Result};
pub use provider::{ArmRequest, AzureProvider, state_from_response};
pub use resources::*;
