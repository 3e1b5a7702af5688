//! 単一 Linux VM のデプロイ定義
//!
//! スタック設定から [`Settings`] を読み込み、リソースグループ・仮想ネットワーク・
//! NSG・サブネット・パブリック IP・NIC・VM の 7 リソースを宣言する。
//! リソース間の依存関係はすべて出力参照から導かれる。

use simplevm_cloud::{CloudError, Engine, ResourceGraph, ResourceOptions};
use simplevm_cloud_azure::{
    ImageReference, IpAllocationMethod, IpConfiguration, LinuxOsProfile, ManagedDisk,
    NetworkInterfaceArgs, NetworkSecurityGroupArgs, OsDisk, PublicIpAddressArgs,
    ResourceGroupArgs, SecurityRule, SecurityRuleAccess, SecurityRuleDirection,
    SecurityRuleProperties, SecurityRuleProtocol, SshPublicKey, SubnetArgs, VirtualMachineArgs,
    VirtualNetworkArgs,
};
use simplevm_config::{ConfigError, StackConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 全リソースに付与するタグ
pub const DEPLOYED_BY_TAG: &str = "deployed-by";
pub const DEPLOYED_BY_VALUE: &str = "pulumi-module-simplelinuxvm";

/// VM のパブリック IP を公開する出力名
pub const VM_IP_OUTPUT: &str = "vm_ip_address";

const VNET_ADDRESS_SPACE: &str = "10.0.0.0/16";
const SUBNET_ADDRESS_PREFIX: &str = "10.0.1.0/24";
const VM_SIZE: &str = "Standard_B1s";
const ADMIN_USERNAME: &str = "user01";
const AUTHORIZED_KEYS_PATH: &str = "/home/user01/.ssh/authorized_keys";

#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("Error in configuration: \n{0}!")]
    Configuration(#[source] ConfigError),

    /// 構造化値のテキストが解釈できない（設定エラーとしては包まない）
    #[error(transparent)]
    MalformedValue(ConfigError),

    #[error("SSH 公開鍵を読み込めません: {path}")]
    SshKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, ProgramError>;

/// スタック設定から読み込んだデプロイ設定
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub resource_prefix: String,
    pub resource_tags: BTreeMap<String, String>,
    pub deployment_region: String,
    pub whitelisted_ip_ranges: Vec<String>,
    pub ssh_public_key_path: String,
}

impl Settings {
    /// 必須キーをすべて読み込む
    ///
    /// キーの欠落や値の型違いは [`ProgramError::Configuration`] にまとめる。
    /// 構造化値の解釈エラーはそのまま [`ProgramError::MalformedValue`] で返す。
    pub fn from_config(config: &StackConfig) -> Result<Self> {
        Self::read(config).map_err(|e| match e {
            ConfigError::Parse { .. } => ProgramError::MalformedValue(e),
            e => ProgramError::Configuration(e),
        })
    }

    fn read(config: &StackConfig) -> std::result::Result<Self, ConfigError> {
        let resource_prefix = config.require("resourcePrefix")?;
        let raw_tags: BTreeMap<String, serde_yaml::Value> =
            config.require_structured("resourceTags")?;
        let deployment_region = config.require("deploymentRegion")?;
        let whitelisted_ip_ranges: Vec<String> =
            config.require_structured("whitelistedIpRanges")?;
        let ssh_public_key_path = config.require("sshPublicKeyPath")?;

        let mut resource_tags = BTreeMap::new();
        for (key, value) in raw_tags {
            let text = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "resourceTags".to_string(),
                        message: format!("タグ '{}' の値はスカラーである必要があります", key),
                    });
                }
            };
            resource_tags.insert(key, text);
        }

        Ok(Self {
            resource_prefix,
            resource_tags,
            deployment_region,
            whitelisted_ip_ranges,
            ssh_public_key_path,
        })
    }

    /// 設定タグに `deployed-by` を加えたもの（同名キーは上書き）
    pub fn tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.resource_tags.clone();
        tags.insert(DEPLOYED_BY_TAG.to_string(), DEPLOYED_BY_VALUE.to_string());
        tags
    }

    pub fn names(&self) -> Names {
        Names::new(&self.resource_prefix)
    }

    /// SSH 公開鍵ファイルを読み込む
    ///
    /// `~/` はホームディレクトリ、相対パスはプロジェクトルートから解決する。
    pub fn read_ssh_public_key(&self, project_root: &Path) -> Result<String> {
        let path = simplevm_config::resolve_path(project_root, &self.ssh_public_key_path)
            .map_err(ProgramError::Configuration)?;
        std::fs::read_to_string(&path).map_err(|source| ProgramError::SshKey { path, source })
    }
}

/// プレフィックスから決まるリソース名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub resource_group: String,
    pub virtual_network: String,
    pub network_security_group: String,
    pub subnet: String,
    pub vm: String,
    pub public_ip: String,
    pub network_interface: String,
    pub ip_configuration: String,
    pub os_disk: String,
}

impl Names {
    pub fn new(prefix: &str) -> Self {
        let virtual_network = format!("{}-vnet01", prefix);
        let vm = format!("{}-vm01", prefix);
        Self {
            resource_group: format!("{}-rg01", prefix),
            network_security_group: format!("{}-nsg01", prefix),
            subnet: format!("{}-subnet01", virtual_network),
            public_ip: format!("{}-ip01", vm),
            network_interface: format!("{}-nic01", vm),
            ip_configuration: format!("{}-ipcfg01", vm),
            os_disk: format!("{}-disk01", vm),
            virtual_network,
            vm,
        }
    }
}

/// 宣言済みのリソースグラフ
pub struct Deployment {
    pub graph: ResourceGraph,
    pub names: Names,
    /// パブリック IP のリソースキー
    pub public_ip_key: String,
    /// VM のリソースキー
    pub vm_key: String,
}

/// 7 つのリソースを宣言する
pub fn declare(settings: &Settings, ssh_public_key: &str) -> Result<Deployment> {
    let names = settings.names();
    let tags = settings.tags();
    let replace_first = ResourceOptions::delete_before_replace();

    let rg = ResourceGroupArgs {
        name: names.resource_group.clone(),
        location: settings.deployment_region.clone(),
        tags: tags.clone(),
    }
    .into_resource();
    let rg_name = rg.output("name").to_value();
    let location = rg.output("location").to_value();

    let vnet = VirtualNetworkArgs {
        name: names.virtual_network.clone(),
        resource_group: rg_name.clone(),
        location: location.clone(),
        address_prefixes: vec![VNET_ADDRESS_SPACE.to_string()],
        tags: tags.clone(),
    }
    .into_resource()
    .with_options(replace_first.clone());

    let nsg = NetworkSecurityGroupArgs {
        name: names.network_security_group.clone(),
        resource_group: rg_name.clone(),
        location: location.clone(),
        security_rules: vec![SecurityRule {
            name: "sshAllowFromHome".to_string(),
            properties: SecurityRuleProperties {
                priority: 100,
                direction: SecurityRuleDirection::Inbound,
                access: SecurityRuleAccess::Allow,
                protocol: SecurityRuleProtocol::Tcp,
                source_port_range: "*".to_string(),
                destination_port_range: "22".to_string(),
                source_address_prefixes: settings.whitelisted_ip_ranges.clone(),
                destination_address_prefixes: vec![SUBNET_ADDRESS_PREFIX.to_string()],
            },
        }],
        tags: tags.clone(),
    }
    .into_resource()
    .with_options(replace_first.clone());

    let subnet = SubnetArgs {
        name: names.subnet.clone(),
        resource_group: rg_name.clone(),
        virtual_network_name: vnet.output("name").to_value(),
        address_prefix: SUBNET_ADDRESS_PREFIX.to_string(),
        network_security_group_id: Some(nsg.output("id").to_value()),
    }
    .into_resource()
    .with_options(replace_first.clone());

    let public_ip = PublicIpAddressArgs {
        name: names.public_ip.clone(),
        resource_group: rg_name.clone(),
        location: location.clone(),
        allocation_method: IpAllocationMethod::Dynamic,
        sku: "Basic".to_string(),
        tags: tags.clone(),
    }
    .into_resource()
    .with_options(replace_first.clone());

    let nic = NetworkInterfaceArgs {
        name: names.network_interface.clone(),
        resource_group: rg_name.clone(),
        location: location.clone(),
        ip_configurations: vec![IpConfiguration {
            name: names.ip_configuration.clone(),
            subnet_id: subnet.output("id").to_value(),
            public_ip_address_id: Some(public_ip.output("id").to_value()),
            private_ip_allocation_method: IpAllocationMethod::Dynamic,
        }],
        tags: tags.clone(),
    }
    .into_resource()
    .with_options(replace_first.clone());

    let vm = VirtualMachineArgs {
        name: names.vm.clone(),
        resource_group: rg_name,
        location,
        vm_size: VM_SIZE.to_string(),
        network_interface_ids: vec![nic.output("id").to_value()],
        os_disk: OsDisk {
            name: names.os_disk.clone(),
            create_option: "FromImage".to_string(),
            delete_option: "Delete".to_string(),
            caching: "ReadWrite".to_string(),
            managed_disk: ManagedDisk {
                storage_account_type: "Standard_LRS".to_string(),
            },
        },
        image_reference: ImageReference {
            publisher: "Canonical".to_string(),
            offer: "0001-com-ubuntu-server-jammy".to_string(),
            sku: "22_04-lts".to_string(),
            version: "latest".to_string(),
        },
        os_profile: LinuxOsProfile {
            admin_username: ADMIN_USERNAME.to_string(),
            computer_name: names.vm.clone(),
            disable_password_authentication: true,
            ssh_public_keys: vec![SshPublicKey {
                key_data: ssh_public_key.to_string(),
                path: AUTHORIZED_KEYS_PATH.to_string(),
            }],
        },
        tags,
    }
    .into_resource()
    .with_options(replace_first);

    let public_ip_key = public_ip.key();
    let vm_key = vm.key();

    let mut graph = ResourceGraph::new();
    for resource in [rg, vnet, nsg, subnet, public_ip, nic, vm] {
        graph.add(resource)?;
    }

    Ok(Deployment {
        graph,
        names,
        public_ip_key,
        vm_key,
    })
}

/// VM が作成済みなら、パブリック IP を読み直して `vm_ip_address` を出力する
///
/// 動的割り当ての IP は VM に接続されるまで確定しないため、VM の存在を待ってから参照する。
pub async fn export_vm_ip(
    engine: &Engine,
    deployment: &Deployment,
) -> Result<Option<serde_json::Value>> {
    let state = engine.state().await?;
    if state.get_resource(&deployment.vm_key).is_none() {
        return Ok(None);
    }

    let ip = engine
        .read(&deployment.graph, &deployment.public_ip_key)
        .await?
        .and_then(|public_ip| public_ip.attributes.get("ip_address").cloned())
        .filter(|value| !value.is_null());

    match ip {
        Some(ip) => {
            engine.set_output(VM_IP_OUTPUT, ip.clone()).await?;
            Ok(Some(ip))
        }
        None => {
            tracing::warn!("{} has no IP address yet", deployment.names.public_ip);
            Ok(None)
        }
    }
}
