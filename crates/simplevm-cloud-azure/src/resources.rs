//! Azure resource kinds and typed arguments
//!
//! Each `*Args` type turns into a [`ResourceConfig`] whose `config` holds
//! the resource name, its resource group (and parent, for child resources)
//! and the ARM request body:
//!
//! ```json
//! { "name": "...", "resourceGroup": "...", "parent": "...", "body": { ... } }
//! ```
//!
//! Any of these values may be an [`simplevm_cloud::OutputRef`] placeholder.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use simplevm_cloud::ResourceConfig;
use std::collections::BTreeMap;

/// Provider name used in every Azure [`ResourceConfig`]
pub const PROVIDER_NAME: &str = "azure-native";

/// Azure resource kinds supported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ResourceGroup,
    VirtualNetwork,
    NetworkSecurityGroup,
    Subnet,
    PublicIpAddress,
    NetworkInterface,
    VirtualMachine,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::ResourceGroup,
        ResourceKind::VirtualNetwork,
        ResourceKind::NetworkSecurityGroup,
        ResourceKind::Subnet,
        ResourceKind::PublicIpAddress,
        ResourceKind::NetworkInterface,
        ResourceKind::VirtualMachine,
    ];

    /// Type token used as `ResourceConfig::resource_type`
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "azure-native:resources:ResourceGroup",
            ResourceKind::VirtualNetwork => "azure-native:network:VirtualNetwork",
            ResourceKind::NetworkSecurityGroup => "azure-native:network:NetworkSecurityGroup",
            ResourceKind::Subnet => "azure-native:network:Subnet",
            ResourceKind::PublicIpAddress => "azure-native:network:PublicIPAddress",
            ResourceKind::NetworkInterface => "azure-native:network:NetworkInterface",
            ResourceKind::VirtualMachine => "azure-native:compute:VirtualMachine",
        }
    }

    pub fn from_type_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_token() == token)
    }

    /// ARM resource type
    pub fn arm_type(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "Microsoft.Resources/resourceGroups",
            ResourceKind::VirtualNetwork => "Microsoft.Network/virtualNetworks",
            ResourceKind::NetworkSecurityGroup => "Microsoft.Network/networkSecurityGroups",
            ResourceKind::Subnet => "Microsoft.Network/virtualNetworks/subnets",
            ResourceKind::PublicIpAddress => "Microsoft.Network/publicIPAddresses",
            ResourceKind::NetworkInterface => "Microsoft.Network/networkInterfaces",
            ResourceKind::VirtualMachine => "Microsoft.Compute/virtualMachines",
        }
    }

    /// ARM API version used for requests
    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "2022-09-01",
            ResourceKind::VirtualMachine => "2024-03-01",
            _ => "2023-09-01",
        }
    }

    /// Whether the ARM type accepts tags
    pub fn supports_tags(&self) -> bool {
        !matches!(self, ResourceKind::Subnet)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_token())
    }
}

fn resource(kind: ResourceKind, name: &str, config: Value) -> ResourceConfig {
    ResourceConfig::new(kind.type_token(), name, PROVIDER_NAME, config)
}

/// Resource group
#[derive(Debug, Clone)]
pub struct ResourceGroupArgs {
    pub name: String,
    pub location: String,
    pub tags: BTreeMap<String, String>,
}

impl ResourceGroupArgs {
    pub fn into_resource(self) -> ResourceConfig {
        resource(
            ResourceKind::ResourceGroup,
            &self.name,
            json!({
                "name": self.name,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                }
            }),
        )
    }
}

/// Virtual network
#[derive(Debug, Clone)]
pub struct VirtualNetworkArgs {
    pub name: String,
    pub resource_group: Value,
    pub location: Value,
    pub address_prefixes: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl VirtualNetworkArgs {
    pub fn into_resource(self) -> ResourceConfig {
        resource(
            ResourceKind::VirtualNetwork,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                    "properties": {
                        "addressSpace": { "addressPrefixes": self.address_prefixes }
                    }
                }
            }),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleAccess {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityRuleProtocol {
    Tcp,
    Udp,
    Icmp,
    #[serde(rename = "*")]
    Any,
}

/// Network security group rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    pub priority: u32,
    pub direction: SecurityRuleDirection,
    pub access: SecurityRuleAccess,
    pub protocol: SecurityRuleProtocol,
    pub source_port_range: String,
    pub destination_port_range: String,
    pub source_address_prefixes: Vec<String>,
    pub destination_address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
    pub properties: SecurityRuleProperties,
}

/// Network security group
#[derive(Debug, Clone)]
pub struct NetworkSecurityGroupArgs {
    pub name: String,
    pub resource_group: Value,
    pub location: Value,
    pub security_rules: Vec<SecurityRule>,
    pub tags: BTreeMap<String, String>,
}

impl NetworkSecurityGroupArgs {
    pub fn into_resource(self) -> ResourceConfig {
        resource(
            ResourceKind::NetworkSecurityGroup,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                    "properties": { "securityRules": self.security_rules }
                }
            }),
        )
    }
}

/// Subnet of a virtual network
#[derive(Debug, Clone)]
pub struct SubnetArgs {
    pub name: String,
    pub resource_group: Value,
    pub virtual_network_name: Value,
    pub address_prefix: String,
    pub network_security_group_id: Option<Value>,
}

impl SubnetArgs {
    pub fn into_resource(self) -> ResourceConfig {
        let mut properties = json!({ "addressPrefix": self.address_prefix });
        if let Some(nsg) = self.network_security_group_id {
            properties["networkSecurityGroup"] = json!({ "id": nsg });
        }

        resource(
            ResourceKind::Subnet,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "parent": self.virtual_network_name,
                "body": { "properties": properties }
            }),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpAllocationMethod {
    Static,
    Dynamic,
}

/// Public IP address
#[derive(Debug, Clone)]
pub struct PublicIpAddressArgs {
    pub name: String,
    pub resource_group: Value,
    pub location: Value,
    pub allocation_method: IpAllocationMethod,
    pub sku: String,
    pub tags: BTreeMap<String, String>,
}

impl PublicIpAddressArgs {
    pub fn into_resource(self) -> ResourceConfig {
        resource(
            ResourceKind::PublicIpAddress,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                    "sku": { "name": self.sku },
                    "properties": { "publicIPAllocationMethod": self.allocation_method }
                }
            }),
        )
    }
}

/// IP configuration of a network interface
#[derive(Debug, Clone)]
pub struct IpConfiguration {
    pub name: String,
    pub subnet_id: Value,
    pub public_ip_address_id: Option<Value>,
    pub private_ip_allocation_method: IpAllocationMethod,
}

impl IpConfiguration {
    fn to_value(&self) -> Value {
        let mut properties = json!({
            "subnet": { "id": self.subnet_id },
            "privateIPAllocationMethod": self.private_ip_allocation_method,
        });
        if let Some(ref public_ip) = self.public_ip_address_id {
            properties["publicIPAddress"] = json!({ "id": public_ip });
        }
        json!({ "name": self.name, "properties": properties })
    }
}

/// Network interface
#[derive(Debug, Clone)]
pub struct NetworkInterfaceArgs {
    pub name: String,
    pub resource_group: Value,
    pub location: Value,
    pub ip_configurations: Vec<IpConfiguration>,
    pub tags: BTreeMap<String, String>,
}

impl NetworkInterfaceArgs {
    pub fn into_resource(self) -> ResourceConfig {
        let ip_configurations: Vec<Value> =
            self.ip_configurations.iter().map(IpConfiguration::to_value).collect();

        resource(
            ResourceKind::NetworkInterface,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                    "properties": { "ipConfigurations": ip_configurations }
                }
            }),
        )
    }
}

/// OS disk of a virtual machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub name: String,
    pub create_option: String,
    pub delete_option: String,
    pub caching: String,
    pub managed_disk: ManagedDisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDisk {
    pub storage_account_type: String,
}

/// Marketplace image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

/// SSH public key installed for the admin user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshPublicKey {
    pub key_data: String,
    pub path: String,
}

/// OS profile of a Linux virtual machine
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxOsProfile {
    pub admin_username: String,
    pub computer_name: String,
    pub disable_password_authentication: bool,
    pub ssh_public_keys: Vec<SshPublicKey>,
}

impl LinuxOsProfile {
    fn to_value(&self) -> Value {
        json!({
            "adminUsername": self.admin_username,
            "computerName": self.computer_name,
            "linuxConfiguration": {
                "disablePasswordAuthentication": self.disable_password_authentication,
                "ssh": { "publicKeys": self.ssh_public_keys }
            }
        })
    }
}

/// Virtual machine
#[derive(Debug, Clone)]
pub struct VirtualMachineArgs {
    pub name: String,
    pub resource_group: Value,
    pub location: Value,
    pub vm_size: String,
    pub network_interface_ids: Vec<Value>,
    pub os_disk: OsDisk,
    pub image_reference: ImageReference,
    pub os_profile: LinuxOsProfile,
    pub tags: BTreeMap<String, String>,
}

impl VirtualMachineArgs {
    pub fn into_resource(self) -> ResourceConfig {
        let network_interfaces: Vec<Value> = self
            .network_interface_ids
            .iter()
            .map(|id| json!({ "id": id }))
            .collect();

        resource(
            ResourceKind::VirtualMachine,
            &self.name,
            json!({
                "name": self.name,
                "resourceGroup": self.resource_group,
                "body": {
                    "location": self.location,
                    "tags": self.tags,
                    "properties": {
                        "hardwareProfile": { "vmSize": self.vm_size },
                        "storageProfile": {
                            "osDisk": self.os_disk,
                            "imageReference": self.image_reference,
                        },
                        "osProfile": self.os_profile.to_value(),
                        "networkProfile": { "networkInterfaces": network_interfaces },
                    }
                }
            }),
        )
    }
}
