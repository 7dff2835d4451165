//! Connection details of the Elasticsearch cluster, shared by everything that talks to it.

use std::collections::BTreeMap;

use const_format::concatcp;
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, KeyToPath, PodSpec, SecretVolumeSource, Volume, VolumeMount,
};

use crate::{
    builder::{
        meta::ObjectMetaBuilder,
        pod::{env_var, env_var_from_secret},
    },
    crd::log_storage::LogStorage,
    defaults::DEFAULT_INDEX_REPLICAS,
};

pub const OPERATOR_NAMESPACE: &str = "tigera-operator";

pub const ELASTICSEARCH_NAMESPACE: &str = "tigera-elasticsearch";
pub const ELASTICSEARCH_NAME: &str = "tigera-secure";
pub const ELASTICSEARCH_SERVICE_NAME: &str = "tigera-secure-es-http";
pub const ELASTICSEARCH_HOST: &str =
    concatcp!(ELASTICSEARCH_SERVICE_NAME, ".", ELASTICSEARCH_NAMESPACE, ".svc");
pub const ELASTICSEARCH_PORT: u16 = 9200;
pub const ELASTICSEARCH_HTTPS_ENDPOINT: &str =
    concatcp!("https://", ELASTICSEARCH_HOST, ":", ELASTICSEARCH_PORT);

pub const ELASTICSEARCH_CONFIG_MAP_NAME: &str = "tigera-secure-elasticsearch";
pub const DEFAULT_ELASTICSEARCH_CLUSTER_NAME: &str = "cluster";
pub const DEFAULT_ELASTICSEARCH_SHARDS: i32 = 5;

/// Public part of the certificate ECK generates for the HTTP endpoint.
pub const ELASTICSEARCH_PUBLIC_CERT_SECRET: &str = "tigera-secure-es-http-certs-public";

const CA_VOLUME_NAME: &str = "elastic-ca-cert-volume";
const CA_MOUNT_PATH: &str = "/etc/ssl/elastic/";
const CA_FILE_NAME: &str = "ca.pem";

/// Cluster wide Elasticsearch settings other components read from the
/// `tigera-secure-elasticsearch` ConfigMap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElasticsearchClusterConfig {
    cluster_name: String,
    replicas: i32,
    shards: i32,
}

impl Default for ElasticsearchClusterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ELASTICSEARCH_CLUSTER_NAME, 0, DEFAULT_ELASTICSEARCH_SHARDS)
    }
}

impl ElasticsearchClusterConfig {
    pub fn new(cluster_name: impl Into<String>, replicas: i32, shards: i32) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            replicas,
            shards,
        }
    }

    /// The configuration of the cluster backing `log_storage`, with the index replicas it
    /// requests.
    pub fn for_log_storage(cluster_name: impl Into<String>, log_storage: &LogStorage) -> Self {
        let replicas = log_storage
            .spec
            .indices
            .as_ref()
            .and_then(|indices| indices.replicas)
            .unwrap_or(DEFAULT_INDEX_REPLICAS);

        Self::new(cluster_name, replicas, DEFAULT_ELASTICSEARCH_SHARDS)
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn config_map(&self) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMetaBuilder::new()
                .name(ELASTICSEARCH_CONFIG_MAP_NAME)
                .namespace(OPERATOR_NAMESPACE)
                .build(),
            data: Some(BTreeMap::from([
                ("clusterName".to_owned(), self.cluster_name.clone()),
                ("replicas".to_owned(), self.replicas.to_string()),
                ("shards".to_owned(), self.shards.to_string()),
            ])),
            ..ConfigMap::default()
        }
    }
}

/// Adds the env vars an Elasticsearch client needs to reach the cluster as the user stored in
/// `user_secret` (keys `username` and `password`).
///
/// The CA certificate is expected at the mount [`decorate_elasticsearch_pod_spec`] adds.
pub fn decorate_elasticsearch_container(
    mut container: Container,
    cluster_name: &str,
    user_secret: &str,
) -> Container {
    container.env.get_or_insert_with(Vec::new).extend([
        env_var("ELASTIC_INDEX_SUFFIX", cluster_name),
        env_var("ELASTIC_SCHEME", "https"),
        env_var("ELASTIC_HOST", ELASTICSEARCH_HOST),
        env_var("ELASTIC_PORT", ELASTICSEARCH_PORT.to_string()),
        env_var("ELASTIC_ACCESS_MODE", "serviceuser"),
        env_var("ELASTIC_SSL_VERIFY", "true"),
        env_var_from_secret("ELASTIC_USER", user_secret, "username"),
        env_var_from_secret("ELASTIC_PASSWORD", user_secret, "password"),
        env_var("ELASTIC_CA", format!("{CA_MOUNT_PATH}{CA_FILE_NAME}")),
    ]);

    container
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .push(VolumeMount {
            name: CA_VOLUME_NAME.to_owned(),
            mount_path: CA_MOUNT_PATH.to_owned(),
            ..VolumeMount::default()
        });

    container
}

/// Adds the volume with the public Elasticsearch CA certificate.
pub fn decorate_elasticsearch_pod_spec(mut pod_spec: PodSpec) -> PodSpec {
    pod_spec.volumes.get_or_insert_with(Vec::new).push(Volume {
        name: CA_VOLUME_NAME.to_owned(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(ELASTICSEARCH_PUBLIC_CERT_SECRET.to_owned()),
            items: Some(vec![KeyToPath {
                key: "tls.crt".to_owned(),
                path: CA_FILE_NAME.to_owned(),
                ..KeyToPath::default()
            }]),
            ..SecretVolumeSource::default()
        }),
        ..Volume::default()
    });

    pod_spec
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::crd::log_storage::{Indices, LogStorageSpec};

    #[test]
    fn cluster_config_map() {
        let config_map = ElasticsearchClusterConfig::new("cluster", 1, 5).config_map();

        assert_eq!(
            config_map.metadata.name.as_deref(),
            Some("tigera-secure-elasticsearch")
        );
        assert_eq!(config_map.metadata.namespace.as_deref(), Some("tigera-operator"));
        assert_eq!(
            config_map.data,
            Some(BTreeMap::from([
                ("clusterName".to_owned(), "cluster".to_owned()),
                ("replicas".to_owned(), "1".to_owned()),
                ("shards".to_owned(), "5".to_owned()),
            ]))
        );
    }

    #[rstest]
    #[case::defaulted(Some(Indices { replicas: Some(2) }), 2)]
    #[case::unset(None, 0)]
    fn cluster_config_follows_log_storage_replicas(
        #[case] indices: Option<Indices>,
        #[case] expected_replicas: i32,
    ) {
        let log_storage = LogStorage::new(
            "tigera-secure",
            LogStorageSpec {
                indices,
                ..LogStorageSpec::default()
            },
        );

        let config = ElasticsearchClusterConfig::for_log_storage("prod", &log_storage);
        assert_eq!(
            config,
            ElasticsearchClusterConfig::new("prod", expected_replicas, 5)
        );
        assert_eq!(
            config
                .config_map()
                .data
                .and_then(|data| data.get("replicas").cloned()),
            Some(expected_replicas.to_string())
        );
    }

    #[test]
    fn https_endpoint() {
        assert_eq!(
            ELASTICSEARCH_HTTPS_ENDPOINT,
            "https://tigera-secure-es-http.tigera-elasticsearch.svc:9200"
        );
    }

    #[test]
    fn container_decoration_keeps_existing_env() {
        let container = decorate_elasticsearch_container(
            Container {
                name: "elastic-curator".to_owned(),
                env: Some(vec![env_var("EE_MAX_TOTAL_STORAGE_PCT", "80")]),
                ..Container::default()
            },
            "cluster",
            "tigera-ee-curator-elasticsearch-access",
        );

        let env = container.env.unwrap();
        assert_eq!(env[0].name, "EE_MAX_TOTAL_STORAGE_PCT");

        let value_of = |name: &str| {
            env.iter()
                .find(|env_var| env_var.name == name)
                .and_then(|env_var| env_var.value.clone())
        };
        assert_eq!(value_of("ELASTIC_INDEX_SUFFIX").as_deref(), Some("cluster"));
        assert_eq!(
            value_of("ELASTIC_HOST").as_deref(),
            Some("tigera-secure-es-http.tigera-elasticsearch.svc")
        );
        assert_eq!(value_of("ELASTIC_PORT").as_deref(), Some("9200"));
        assert_eq!(value_of("ELASTIC_CA").as_deref(), Some("/etc/ssl/elastic/ca.pem"));

        let password = env
            .iter()
            .find(|env_var| env_var.name == "ELASTIC_PASSWORD")
            .and_then(|env_var| env_var.value_from.clone())
            .and_then(|source| source.secret_key_ref)
            .unwrap();
        assert_eq!(password.name, "tigera-ee-curator-elasticsearch-access");
        assert_eq!(password.key, "password");

        let mounts = container.volume_mounts.unwrap();
        assert_eq!(mounts[0].name, "elastic-ca-cert-volume");
        assert_eq!(mounts[0].mount_path, "/etc/ssl/elastic/");
    }

    #[test]
    fn pod_spec_decoration_mounts_public_certificate() {
        let pod_spec = decorate_elasticsearch_pod_spec(PodSpec::default());

        let volumes = pod_spec.volumes.unwrap();
        assert_eq!(volumes.len(), 1);
        let secret = volumes[0].secret.as_ref().unwrap();
        assert_eq!(
            secret.secret_name.as_deref(),
            Some("tigera-secure-es-http-certs-public")
        );
        assert_eq!(
            secret.items.as_ref().unwrap()[0],
            KeyToPath {
                key: "tls.crt".to_owned(),
                path: "ca.pem".to_owned(),
                mode: None,
            }
        );
    }
}
