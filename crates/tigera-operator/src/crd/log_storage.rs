use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configures the Elasticsearch and Kibana clusters storing flow, audit and compliance logs.
///
/// The resource is named "tigera-secure". Deleting it tears down both clusters, which the operator
/// sequences through the `tigera.io/eck-cleanup` finalizer.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "operator.tigera.io",
    version = "v1",
    kind = "LogStorage",
    plural = "logstorages",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct LogStorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Nodes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Indices>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,

    /// StorageClass used for the Elasticsearch data volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// The Elasticsearch nodes.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Nodes {
    pub count: i64,

    /// Resources of every Elasticsearch node. The JVM heap is derived from the memory request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indices {
    /// Number of replicas of each index shard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Retention periods in days.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retention {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_reports: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_reports: Option<i32>,
}

impl LogStorage {
    /// Whether the resource has been marked for deletion.
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == finalizer))
    }

    /// Adds the finalizer unless it is already present.
    pub fn add_finalizer(&mut self, finalizer: &str) {
        if !self.has_finalizer(finalizer) {
            self.metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(finalizer.to_owned());
        }
    }

    /// Removes every occurrence of the finalizer, other finalizers are kept in order.
    pub fn remove_finalizer(&mut self, finalizer: &str) {
        if let Some(finalizers) = self.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != finalizer);
        }
    }
}
