use ipnet::IpNet;
use k8s_openapi::api::core::v1::LocalObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configures an installation of Calico or Calico Enterprise.
///
/// At most one instance of this resource is supported. It must be named "default".
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "Installation",
    plural = "installations",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct InstallationSpec {
    /// The product to install, one of `Calico` or `TigeraSecureEnterprise`. Defaults to `Calico`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<ProductVariant>,

    /// Container registry to pull all images from, e.g. `quay.io/`.
    ///
    /// When left empty, every image is pulled from the default registry of its group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry: String,

    /// Image namespace for the Calico images, e.g. `calico/`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub calico_namespace: String,

    /// Secrets used to pull images from a private registry. They need to exist in the
    /// `tigera-operator` namespace and are copied into every namespace the operator renders into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_provider: Option<Provider>,

    /// Networking configuration. Must not be set on providers that bring their own networking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calico_network: Option<CalicoNetworkSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_metrics_port: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_management_type: Option<ClusterManagementType>,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize, strum::Display,
)]
pub enum ProductVariant {
    Calico,
    TigeraSecureEnterprise,
}

/// The Kubernetes platform the cluster runs on.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    JsonSchema,
    PartialEq,
    Serialize,
    clap::ValueEnum,
    strum::Display,
)]
pub enum Provider {
    #[serde(rename = "EKS")]
    #[strum(serialize = "EKS")]
    #[value(name = "EKS")]
    Eks,

    #[serde(rename = "GKE")]
    #[strum(serialize = "GKE")]
    #[value(name = "GKE")]
    Gke,

    #[serde(rename = "AKS")]
    #[strum(serialize = "AKS")]
    #[value(name = "AKS")]
    Aks,

    #[value(name = "OpenShift")]
    OpenShift,

    #[value(name = "DockerEnterprise")]
    DockerEnterprise,
}

impl Provider {
    /// Providers that manage pod networking themselves, so no Calico networking may be configured.
    pub fn is_restricted_network(&self) -> bool {
        matches!(self, Self::Eks)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    JsonSchema,
    PartialEq,
    Serialize,
    strum::Display,
)]
pub enum ClusterManagementType {
    #[default]
    Standalone,
    Management,
    Managed,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalicoNetworkSpec {
    /// IP pools to create. At most one IPv4 and one IPv6 pool are supported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_pools: Vec<IpPool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_address_autodetection_v4: Option<NodeAddressAutodetection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_address_autodetection_v6: Option<NodeAddressAutodetection>,
}

impl CalicoNetworkSpec {
    /// The first pool with an IPv4 CIDR. Pools with an unparsable CIDR are skipped.
    pub fn ipv4_pool(&self) -> Option<&IpPool> {
        self.ip_pools
            .iter()
            .find(|pool| matches!(pool.network(), Some(IpNet::V4(_))))
    }

    /// The first pool with an IPv6 CIDR. Pools with an unparsable CIDR are skipped.
    pub fn ipv6_pool(&self) -> Option<&IpPool> {
        self.ip_pools
            .iter()
            .find(|pool| matches!(pool.network(), Some(IpNet::V6(_))))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpPool {
    /// The pool CIDR, e.g. `192.168.0.0/16`.
    pub cidr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encapsulation: Option<EncapsulationType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_outgoing: Option<NatOutgoing>,

    /// Selects the nodes IPs are assigned from this pool to, e.g. `all()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<String>,
}

impl IpPool {
    pub fn network(&self) -> Option<IpNet> {
        self.cidr.parse().ok()
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize, strum::Display,
)]
pub enum EncapsulationType {
    #[serde(rename = "IPIPCrossSubnet")]
    #[strum(serialize = "IPIPCrossSubnet")]
    IpipCrossSubnet,

    #[serde(rename = "IPIP")]
    #[strum(serialize = "IPIP")]
    Ipip,

    #[serde(rename = "VXLAN")]
    #[strum(serialize = "VXLAN")]
    Vxlan,

    #[serde(rename = "VXLANCrossSubnet")]
    #[strum(serialize = "VXLANCrossSubnet")]
    VxlanCrossSubnet,

    None,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize, strum::Display,
)]
pub enum NatOutgoing {
    Enabled,
    Disabled,
}

/// How a node determines its own IP address. Only one of the fields should be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddressAutodetection {
    /// Use the first valid IP address on the first enumerated interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_found: Option<bool>,

    /// Regex matching the interface to pick the address from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    /// Regex matching interfaces to exclude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_interface: Option<String>,

    /// An IP address or domain name; the address of the interface used to reach it is picked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_reach: Option<String>,
}
