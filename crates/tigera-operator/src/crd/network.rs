use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The OpenShift cluster network configuration (`config.openshift.io/v1`, named "cluster").
///
/// The operator only ever reads it, to derive the default IP pool on OpenShift.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Network",
    plural = "networks",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    #[serde(default)]
    pub cluster_network: Vec<ClusterNetworkEntry>,

    #[serde(default)]
    pub service_network: Vec<String>,

    #[serde(default)]
    pub network_type: String,
}

/// A contiguous block of pod IPs.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkEntry {
    pub cidr: String,

    #[serde(default)]
    pub host_prefix: u32,
}
