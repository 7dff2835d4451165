//! Renders the log storage: the ECK operator, the Elasticsearch and Kibana clusters it manages
//! and the curator job enforcing index retention.
//!
//! Deleting the [`LogStorage`] has to wait until ECK has torn down both clusters, which is
//! sequenced through the [`LOG_STORAGE_FINALIZER`]. See [`LogStorageState`] for the lifecycle.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{StatefulSet, StatefulSetSpec},
        batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec},
        core::v1::{
            Container, ContainerPort, EnvVar, ExecAction, HTTPGetAction, PersistentVolumeClaim,
            PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
            Secret, SecretVolumeSource, SecurityContext, Service, ServiceAccount, ServiceSpec,
            Volume, VolumeMount, VolumeResourceRequirements,
        },
        rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject},
    },
    apimachinery::pkg::{
        api::resource::Quantity as K8sQuantity, apis::meta::v1::LabelSelector,
        util::intstr::IntOrString,
    },
};
use kube::Resource;
use serde_json::json;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    builder::{
        meta::ObjectMetaBuilder,
        pod::{ResourceRequirementsBuilder, env_var, env_var_from_field_path},
    },
    cli::RenderOptions,
    crd::{
        eck::{
            Config, Elasticsearch, ElasticsearchSpec, HttpConfig, Kibana, KibanaSpec, NodeSpec,
            ObjectSelector,
        },
        installation::{ClusterManagementType, InstallationSpec, Provider},
        log_storage::LogStorage,
    },
    defaults::{
        DEFAULT_AUDIT_REPORTS_RETENTION_DAYS, DEFAULT_COMPLIANCE_REPORTS_RETENTION_DAYS,
        DEFAULT_ELASTICSEARCH_NODE_COUNT, DEFAULT_FLOWS_RETENTION_DAYS,
        DEFAULT_SNAPSHOTS_RETENTION_DAYS, DEFAULT_STORAGE_CLASS_NAME,
    },
    images::{Image, VERSION_ECK_ELASTICSEARCH, VERSION_ECK_KIBANA, VERSION_ECK_OPERATOR},
    quantity::{self, MemoryQuantity},
    render::{
        Component, RenderedObject, copy_secrets, create_namespace,
        elasticsearch::{
            ELASTICSEARCH_NAME, ELASTICSEARCH_NAMESPACE, ELASTICSEARCH_SERVICE_NAME,
            ElasticsearchClusterConfig, decorate_elasticsearch_container,
            decorate_elasticsearch_pod_spec,
        },
        image_pull_secret_references,
    },
};

pub const LOG_STORAGE_FINALIZER: &str = "tigera.io/eck-cleanup";

pub const ECK_OPERATOR_NAME: &str = "elastic-operator";
pub const ECK_OPERATOR_NAMESPACE: &str = "tigera-eck-operator";
pub const ECK_WEBHOOK_SECRET_NAME: &str = "webhook-server-secret";
pub const ECK_DOCKER_ENTERPRISE_BINDING_NAME: &str = "elastic-operator-docker-enterprise";

pub const TIGERA_ELASTICSEARCH_CERT_SECRET: &str = "tigera-secure-elasticsearch-cert";

pub const KIBANA_NAME: &str = "tigera-secure";
pub const KIBANA_NAMESPACE: &str = "tigera-kibana";
pub const KIBANA_BASE_PATH: &str = "tigera-kibana";
pub const TIGERA_KIBANA_CERT_SECRET: &str = "tigera-secure-kibana-cert";

pub const ES_CURATOR_NAME: &str = "elastic-curator";
pub const ELASTICSEARCH_CURATOR_USER_SECRET: &str = "tigera-ee-curator-elasticsearch-access";

pub const GUARDIAN_SERVICE_NAME: &str = "tigera-guardian";
pub const GUARDIAN_NAMESPACE: &str = "tigera-guardian";

const ECK_CONTROLLER_VERSION_ANNOTATION: &str = "common.k8s.elastic.co/controller-version";
const DEFAULT_ES_JAVA_OPTS: &str = "-Xms1G -Xmx1G";
const DEFAULT_ES_STORAGE: &str = "10Gi";

/// Indices are removed, oldest first, once the total disk utilization exceeds this percentage.
const MAX_TOTAL_STORAGE_PERCENT: i32 = 80;

/// Flow and DNS log indices are removed once they exceed this percentage of the cluster size, so
/// that compliance and security indices can be retained longer.
const MAX_LOGS_STORAGE_PERCENT: i32 = 70;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid Elasticsearch node memory {quantity:?}"))]
    InvalidNodeMemory {
        source: quantity::Error,
        quantity: String,
    },

    #[snafu(display("Elasticsearch node count {count} must be between 1 and {}", i32::MAX))]
    InvalidNodeCount { count: i64 },
}

/// Everything the log storage is rendered from, as observed in the cluster.
#[derive(Clone, Debug, Default)]
pub struct LogStorageConfig {
    /// The LogStorage, [`None`] if it does not exist (yet).
    pub log_storage: Option<LogStorage>,

    /// The defaulted Installation.
    pub installation: InstallationSpec,

    /// The Elasticsearch cluster currently deployed, if any.
    pub elasticsearch: Option<Elasticsearch>,

    /// The Kibana cluster currently deployed, if any.
    pub kibana: Option<Kibana>,

    pub cluster_config: ElasticsearchClusterConfig,

    /// Secrets rendered as they are into the Elasticsearch namespace, e.g. its certificate.
    pub elasticsearch_secrets: Vec<Secret>,

    /// Secrets rendered as they are into the Kibana namespace, e.g. its certificate.
    pub kibana_secrets: Vec<Secret>,

    /// Credentials of the curator. The curator is only deployed once they exist.
    pub curator_secrets: Vec<Secret>,

    /// Image pull secrets, copied into every namespace.
    pub pull_secrets: Vec<Secret>,

    /// The `tigera-secure-es-http` service currently deployed, if any.
    pub es_service: Option<Service>,

    pub options: RenderOptions,
}

/// Whether a resource ECK manages is still around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubResourceState {
    Absent,

    /// Deletion was requested, ECK is still cleaning up.
    Terminating,

    Present,
}

impl SubResourceState {
    pub fn of<K: Resource>(resource: Option<&K>) -> Self {
        match resource {
            None => Self::Absent,
            Some(resource) if resource.meta().deletion_timestamp.is_some() => Self::Terminating,
            Some(_) => Self::Present,
        }
    }
}

/// Lifecycle stage of the log storage, derived from the observed inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogStorageState {
    /// The LogStorage is being deleted. The finalizer is held until both clusters are gone.
    Deleting {
        elasticsearch: SubResourceState,
        kibana: SubResourceState,
    },

    /// Managed clusters send their logs to the management cluster through Guardian.
    ManagedExternal,

    /// There is no LogStorage on a cluster that is not managed.
    NoStorage,

    FullyProvisioned,
}

pub struct LogStorageComponent {
    config: LogStorageConfig,
    provider: Option<Provider>,
    node_count: i32,
    node_resources: ResourceRequirements,
    java_opts: String,
}

impl LogStorageComponent {
    /// Validates the user provided sizing of the Elasticsearch nodes, rendering does not fail
    /// afterwards.
    pub fn new(config: LogStorageConfig) -> Result<Self> {
        let provider = config
            .options
            .provider(config.installation.kubernetes_provider);

        let nodes = config
            .log_storage
            .as_ref()
            .and_then(|log_storage| log_storage.spec.nodes.as_ref());

        let count = nodes.map_or(DEFAULT_ELASTICSEARCH_NODE_COUNT, |nodes| nodes.count);
        let node_count = i32::try_from(count)
            .ok()
            .filter(|count| *count > 0)
            .context(InvalidNodeCountSnafu { count })?;

        let (node_resources, java_opts) = elasticsearch_node_resources(
            nodes.and_then(|nodes| nodes.resource_requirements.as_ref()),
        )?;

        Ok(Self {
            config,
            provider,
            node_count,
            node_resources,
            java_opts,
        })
    }

    pub fn state(&self) -> LogStorageState {
        let managed = self.config.installation.cluster_management_type
            == Some(ClusterManagementType::Managed);

        match &self.config.log_storage {
            Some(log_storage) if log_storage.is_deleting() => LogStorageState::Deleting {
                elasticsearch: SubResourceState::of(self.config.elasticsearch.as_ref()),
                kibana: SubResourceState::of(self.config.kibana.as_ref()),
            },
            _ if managed => LogStorageState::ManagedExternal,
            None => LogStorageState::NoStorage,
            Some(_) => LogStorageState::FullyProvisioned,
        }
    }

    fn openshift(&self) -> bool {
        self.provider == Some(Provider::OpenShift)
    }

    fn registry(&self) -> &str {
        &self.config.installation.registry
    }

    /// The LogStorage as it has to be written back, with the finalizer added.
    fn log_storage_with_finalizer(&self) -> Option<LogStorage> {
        self.config.log_storage.clone().map(|mut log_storage| {
            if !log_storage.has_finalizer(LOG_STORAGE_FINALIZER) {
                tracing::debug!("adding log storage finalizer");
                log_storage.add_finalizer(LOG_STORAGE_FINALIZER);
            }
            log_storage
        })
    }

    fn deleting_objects(
        &self,
        elasticsearch: SubResourceState,
        kibana: SubResourceState,
    ) -> (Vec<RenderedObject>, Vec<RenderedObject>) {
        let mut to_delete = Vec::new();

        if elasticsearch == SubResourceState::Present {
            to_delete.extend(self.config.elasticsearch.clone().map(RenderedObject::from));
        }

        if kibana == SubResourceState::Present {
            to_delete.extend(self.config.kibana.clone().map(RenderedObject::from));
        }

        let mut to_create: Vec<RenderedObject> = Vec::new();
        if let Some(mut log_storage) = self.config.log_storage.clone() {
            if elasticsearch == SubResourceState::Absent && kibana == SubResourceState::Absent {
                tracing::info!(
                    "Elasticsearch and Kibana are gone, releasing log storage finalizer"
                );
                log_storage.remove_finalizer(LOG_STORAGE_FINALIZER);
            }
            to_create.push(log_storage.into());
        }

        (to_create, to_delete)
    }

    fn managed_objects(&self) -> Vec<RenderedObject> {
        let mut to_create: Vec<RenderedObject> = Vec::new();

        to_create.extend(self.log_storage_with_finalizer().map(RenderedObject::from));
        to_create.push(create_namespace(ELASTICSEARCH_NAMESPACE, self.openshift()).into());
        to_create.push(self.elasticsearch_external_service().into());

        to_create
    }

    fn provisioned_objects(&self) -> (Vec<RenderedObject>, Vec<RenderedObject>) {
        let mut to_create: Vec<RenderedObject> = Vec::new();
        let openshift = self.openshift();

        to_create.extend(self.log_storage_with_finalizer().map(RenderedObject::from));

        // ECK operator
        to_create.push(create_namespace(ECK_OPERATOR_NAMESPACE, openshift).into());
        to_create.extend(secrets(copy_secrets(
            ECK_OPERATOR_NAMESPACE,
            &self.config.pull_secrets,
        )));
        to_create.push(eck_operator_cluster_role().into());
        to_create.push(
            eck_operator_cluster_role_binding(ECK_OPERATOR_NAME, ECK_OPERATOR_NAME).into(),
        );
        to_create.push(eck_operator_service_account().into());

        // Allows the ECK operator to run privileged pods on Docker Enterprise
        if self.provider == Some(Provider::DockerEnterprise) {
            to_create.push(
                eck_operator_cluster_role_binding(
                    ECK_DOCKER_ENTERPRISE_BINDING_NAME,
                    "cluster-admin",
                )
                .into(),
            );
        }

        if self.config.options.create_webhook_secret {
            to_create.push(eck_operator_webhook_secret().into());
        }
        to_create.push(self.eck_operator_stateful_set().into());

        // Elasticsearch
        to_create.push(create_namespace(ELASTICSEARCH_NAMESPACE, openshift).into());
        to_create.extend(secrets(copy_secrets(
            ELASTICSEARCH_NAMESPACE,
            &self.config.pull_secrets,
        )));
        to_create.extend(secrets(self.config.elasticsearch_secrets.clone()));
        to_create.push(self.config.cluster_config.config_map().into());
        to_create.push(self.elasticsearch_cluster().into());

        // Kibana
        // Kibana pods keep the default node selector of the project on OpenShift
        to_create.push(create_namespace(KIBANA_NAMESPACE, false).into());
        to_create.extend(secrets(copy_secrets(KIBANA_NAMESPACE, &self.config.pull_secrets)));
        to_create.extend(secrets(self.config.kibana_secrets.clone()));
        to_create.push(self.kibana().into());

        // Curator
        if self.config.curator_secrets.is_empty() {
            tracing::debug!("curator secrets do not exist yet, not rendering the curator");
        } else {
            to_create.extend(secrets(copy_secrets(
                ELASTICSEARCH_NAMESPACE,
                &self.config.curator_secrets,
            )));
            to_create.push(self.curator_cron_job().into());
        }

        // The service of a formerly managed cluster points to Guardian and has to make way for the
        // one ECK creates
        let mut to_delete: Vec<RenderedObject> = Vec::new();
        if let Some(service) = &self.config.es_service {
            if is_external_name_service(service) {
                tracing::info!(
                    "removing external Elasticsearch service of a formerly managed cluster"
                );
                to_delete.push(service.clone().into());
            }
        }

        (to_create, to_delete)
    }

    fn elasticsearch_external_service(&self) -> Service {
        Service {
            metadata: ObjectMetaBuilder::new()
                .name(ELASTICSEARCH_SERVICE_NAME)
                .namespace(ELASTICSEARCH_NAMESPACE)
                .build(),
            spec: Some(ServiceSpec {
                type_: Some("ExternalName".to_owned()),
                external_name: Some(format!(
                    "{GUARDIAN_SERVICE_NAME}.{GUARDIAN_NAMESPACE}.{cluster_domain}",
                    cluster_domain = self.config.options.cluster_domain
                )),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }

    fn eck_operator_stateful_set(&self) -> StatefulSet {
        let labels = BTreeMap::from([
            ("control-plane".to_owned(), ECK_OPERATOR_NAME.to_owned()),
            ("k8s-app".to_owned(), ECK_OPERATOR_NAME.to_owned()),
        ]);
        let image = Image::EckOperator.reference(self.registry(), "");

        let container = Container {
            name: "manager".to_owned(),
            image: Some(image.clone()),
            args: Some(
                ["manager", "--operator-roles", "all", "--enable-debug-logs=false"]
                    .map(String::from)
                    .to_vec(),
            ),
            env: Some(vec![
                env_var_from_field_path("OPERATOR_NAMESPACE", "metadata.namespace"),
                env_var("WEBHOOK_SECRET", ECK_WEBHOOK_SECRET_NAME),
                env_var("WEBHOOK_PODS_LABEL", ECK_OPERATOR_NAME),
                env_var("OPERATOR_IMAGE", image),
            ]),
            resources: Some(
                ResourceRequirementsBuilder::new()
                    .with_cpu_limit("1")
                    .with_memory_limit("150Mi")
                    .with_cpu_request("100m")
                    .with_memory_request("20Mi")
                    .build(),
            ),
            ports: Some(vec![ContainerPort {
                container_port: 9876,
                name: Some("webhook-server".to_owned()),
                protocol: Some("TCP".to_owned()),
                ..ContainerPort::default()
            }]),
            volume_mounts: Some(vec![VolumeMount {
                name: "cert".to_owned(),
                mount_path: "/tmp/cert".to_owned(),
                read_only: Some(true),
                ..VolumeMount::default()
            }]),
            ..Container::default()
        };

        StatefulSet {
            metadata: ObjectMetaBuilder::new()
                .name(ECK_OPERATOR_NAME)
                .namespace(ECK_OPERATOR_NAMESPACE)
                .with_labels(labels.clone())
                .build(),
            spec: Some(StatefulSetSpec {
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..LabelSelector::default()
                },
                service_name: Some(ECK_OPERATOR_NAME.to_owned()),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMetaBuilder::new().with_labels(labels).build()),
                    spec: Some(PodSpec {
                        service_account_name: Some(ECK_OPERATOR_NAME.to_owned()),
                        image_pull_secrets: image_pull_secret_references(&self.config.pull_secrets),
                        containers: vec![container],
                        termination_grace_period_seconds: Some(10),
                        volumes: Some(vec![Volume {
                            name: "cert".to_owned(),
                            secret: Some(SecretVolumeSource {
                                default_mode: Some(420),
                                secret_name: Some(ECK_WEBHOOK_SECRET_NAME.to_owned()),
                                ..SecretVolumeSource::default()
                            }),
                            ..Volume::default()
                        }]),
                        ..PodSpec::default()
                    }),
                },
                ..StatefulSetSpec::default()
            }),
            ..StatefulSet::default()
        }
    }

    fn elasticsearch_cluster(&self) -> Elasticsearch {
        let node_config: Config = ["node.master", "node.data", "node.ingest"]
            .into_iter()
            .map(|key| (key.to_owned(), json!("true")))
            .collect();

        let mut elasticsearch = Elasticsearch::new(
            ELASTICSEARCH_NAME,
            ElasticsearchSpec {
                version: VERSION_ECK_ELASTICSEARCH.to_owned(),
                image: Some(Image::EckElasticsearch.reference(self.registry(), "")),
                http: Some(HttpConfig::with_certificate(TIGERA_ELASTICSEARCH_CERT_SECRET)),
                nodes: vec![NodeSpec {
                    node_count: self.node_count,
                    config: Some(node_config),
                    pod_template: Some(self.elasticsearch_pod_template()),
                    volume_claim_templates: vec![self.elasticsearch_pvc_template()],
                }],
            },
        );
        elasticsearch.metadata = ObjectMetaBuilder::new()
            .name(ELASTICSEARCH_NAME)
            .namespace(ELASTICSEARCH_NAMESPACE)
            .with_annotation(ECK_CONTROLLER_VERSION_ANNOTATION, VERSION_ECK_OPERATOR)
            .build();

        elasticsearch
    }

    fn elasticsearch_pod_template(&self) -> PodTemplateSpec {
        let container = Container {
            name: "elasticsearch".to_owned(),
            resources: Some(self.node_resources.clone()),
            env: Some(vec![env_var("ES_JAVA_OPTS", self.java_opts.clone())]),
            ..Container::default()
        };

        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: vec![container],
                image_pull_secrets: image_pull_secret_references(&self.config.pull_secrets),
                ..PodSpec::default()
            }),
        }
    }

    /// The data volume of every Elasticsearch node. ECK requires the name `elasticsearch-data`.
    fn elasticsearch_pvc_template(&self) -> PersistentVolumeClaim {
        let log_storage_spec = self
            .config
            .log_storage
            .as_ref()
            .map(|log_storage| &log_storage.spec);

        let user_resources = log_storage_spec
            .and_then(|spec| spec.nodes.as_ref())
            .and_then(|nodes| nodes.resource_requirements.as_ref());
        let storage_class_name = log_storage_spec
            .and_then(|spec| spec.storage_class_name.clone())
            .unwrap_or_else(|| DEFAULT_STORAGE_CLASS_NAME.to_owned());

        let mut requests = user_resources
            .and_then(|resources| resources.requests.clone())
            .unwrap_or_default();
        requests
            .entry("storage".to_owned())
            .or_insert_with(|| K8sQuantity(DEFAULT_ES_STORAGE.to_owned()));

        PersistentVolumeClaim {
            metadata: ObjectMetaBuilder::new().name("elasticsearch-data").build(),
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
                resources: Some(VolumeResourceRequirements {
                    limits: user_resources.and_then(|resources| resources.limits.clone()),
                    requests: Some(requests),
                }),
                storage_class_name: Some(storage_class_name),
                ..PersistentVolumeClaimSpec::default()
            }),
            ..PersistentVolumeClaim::default()
        }
    }

    fn kibana(&self) -> Kibana {
        let config: Config = BTreeMap::from([(
            "server".to_owned(),
            json!({
                "basePath": format!("/{KIBANA_BASE_PATH}"),
                "rewriteBasePath": true,
            }),
        )]);

        let container = Container {
            name: "kibana".to_owned(),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    path: Some(format!("/{KIBANA_BASE_PATH}/login")),
                    port: IntOrString::Int(5601),
                    scheme: Some("HTTPS".to_owned()),
                    ..HTTPGetAction::default()
                }),
                ..Probe::default()
            }),
            ..Container::default()
        };

        let mut kibana = Kibana::new(
            KIBANA_NAME,
            KibanaSpec {
                version: VERSION_ECK_KIBANA.to_owned(),
                image: Some(Image::Kibana.reference(self.registry(), "")),
                config: Some(config),
                node_count: 1,
                http: Some(HttpConfig::with_certificate(TIGERA_KIBANA_CERT_SECRET)),
                elasticsearch_ref: Some(ObjectSelector {
                    name: ELASTICSEARCH_NAME.to_owned(),
                    namespace: Some(ELASTICSEARCH_NAMESPACE.to_owned()),
                }),
                pod_template: Some(PodTemplateSpec {
                    metadata: Some(
                        ObjectMetaBuilder::new()
                            .namespace(KIBANA_NAMESPACE)
                            .with_label("name", KIBANA_NAME)
                            .with_label("k8s-app", KIBANA_NAME)
                            .build(),
                    ),
                    spec: Some(PodSpec {
                        image_pull_secrets: image_pull_secret_references(&self.config.pull_secrets),
                        containers: vec![container],
                        ..PodSpec::default()
                    }),
                }),
            },
        );
        kibana.metadata = ObjectMetaBuilder::new()
            .name(KIBANA_NAME)
            .namespace(KIBANA_NAMESPACE)
            .with_label("k8s-app", KIBANA_NAME)
            .with_annotation(ECK_CONTROLLER_VERSION_ANNOTATION, VERSION_ECK_OPERATOR)
            .build();

        kibana
    }

    fn curator_cron_job(&self) -> CronJob {
        let container = Container {
            name: ES_CURATOR_NAME.to_owned(),
            image: Some(Image::EsCurator.reference(self.registry(), "")),
            env: Some(self.curator_env_vars()),
            liveness_probe: Some(Probe {
                exec: Some(ExecAction {
                    command: Some(
                        [
                            "/usr/bin/curator",
                            "--config",
                            "/curator/curator_config.yaml",
                            "--dry-run",
                            "/curator/curator_action.yaml",
                        ]
                        .map(String::from)
                        .to_vec(),
                    ),
                }),
                ..Probe::default()
            }),
            security_context: Some(SecurityContext {
                run_as_non_root: Some(false),
                allow_privilege_escalation: Some(false),
                ..SecurityContext::default()
            }),
            ..Container::default()
        };

        let pod_spec = PodSpec {
            containers: vec![decorate_elasticsearch_container(
                container,
                self.config.cluster_config.cluster_name(),
                ELASTICSEARCH_CURATOR_USER_SECRET,
            )],
            image_pull_secrets: image_pull_secret_references(&self.config.pull_secrets),
            restart_policy: Some("OnFailure".to_owned()),
            ..PodSpec::default()
        };

        CronJob {
            metadata: ObjectMetaBuilder::new()
                .name(ES_CURATOR_NAME)
                .namespace(ELASTICSEARCH_NAMESPACE)
                .build(),
            spec: Some(CronJobSpec {
                schedule: "@hourly".to_owned(),
                job_template: JobTemplateSpec {
                    metadata: Some(ObjectMetaBuilder::new().name(ES_CURATOR_NAME).build()),
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            metadata: None,
                            spec: Some(decorate_elasticsearch_pod_spec(pod_spec)),
                        },
                        ..JobSpec::default()
                    }),
                },
                ..CronJobSpec::default()
            }),
            ..CronJob::default()
        }
    }

    fn curator_env_vars(&self) -> Vec<EnvVar> {
        let retention = self
            .config
            .log_storage
            .as_ref()
            .and_then(|log_storage| log_storage.spec.retention.clone())
            .unwrap_or_default();

        vec![
            env_var(
                "EE_FLOWS_INDEX_RETENTION_PERIOD",
                retention
                    .flows
                    .unwrap_or(DEFAULT_FLOWS_RETENTION_DAYS)
                    .to_string(),
            ),
            env_var(
                "EE_AUDIT_INDEX_RETENTION_PERIOD",
                retention
                    .audit_reports
                    .unwrap_or(DEFAULT_AUDIT_REPORTS_RETENTION_DAYS)
                    .to_string(),
            ),
            env_var(
                "EE_SNAPSHOT_INDEX_RETENTION_PERIOD",
                retention
                    .snapshots
                    .unwrap_or(DEFAULT_SNAPSHOTS_RETENTION_DAYS)
                    .to_string(),
            ),
            env_var(
                "EE_COMPLIANCE_REPORT_INDEX_RETENTION_PERIOD",
                retention
                    .compliance_reports
                    .unwrap_or(DEFAULT_COMPLIANCE_REPORTS_RETENTION_DAYS)
                    .to_string(),
            ),
            env_var(
                "EE_MAX_TOTAL_STORAGE_PCT",
                MAX_TOTAL_STORAGE_PERCENT.to_string(),
            ),
            env_var("EE_MAX_LOGS_STORAGE_PCT", MAX_LOGS_STORAGE_PERCENT.to_string()),
        ]
    }
}

impl Component for LogStorageComponent {
    fn objects(&self) -> (Vec<RenderedObject>, Vec<RenderedObject>) {
        let state = self.state();
        tracing::debug!(?state, "rendering log storage");

        match state {
            LogStorageState::Deleting {
                elasticsearch,
                kibana,
            } => self.deleting_objects(elasticsearch, kibana),
            LogStorageState::ManagedExternal => (self.managed_objects(), Vec::new()),
            LogStorageState::NoStorage => (Vec::new(), Vec::new()),
            LogStorageState::FullyProvisioned => self.provisioned_objects(),
        }
    }

    fn ready(&self) -> bool {
        true
    }
}

/// Container resources and `ES_JAVA_OPTS` of the Elasticsearch nodes.
///
/// User provided requirements replace the defaults. Only their CPU and memory are applied to the
/// container, the heap is sized from the memory request. Without a memory request the heap is
/// sized from the memory limit rather than falling back to the minimum heap.
fn elasticsearch_node_resources(
    user_resources: Option<&ResourceRequirements>,
) -> Result<(ResourceRequirements, String)> {
    let Some(user_resources) = user_resources else {
        let defaults = ResourceRequirementsBuilder::new()
            .with_cpu_limit("1")
            .with_memory_limit("2Gi")
            .with_cpu_request("1")
            .with_memory_request("2Gi")
            .build();
        return Ok((defaults, DEFAULT_ES_JAVA_OPTS.to_owned()));
    };

    let resources = ResourceRequirements {
        limits: cpu_and_memory(user_resources.limits.as_ref()),
        requests: cpu_and_memory(user_resources.requests.as_ref()),
        ..ResourceRequirements::default()
    };

    let memory = [&resources.requests, &resources.limits]
        .into_iter()
        .find_map(|resources| resources.as_ref()?.get("memory"));

    let java_opts = match memory {
        Some(memory) => {
            let heap = MemoryQuantity::try_from(memory)
                .context(InvalidNodeMemorySnafu {
                    quantity: memory.0.clone(),
                })?
                .jvm_heap_size();
            format!("-Xms{heap} -Xmx{heap}")
        }
        None => DEFAULT_ES_JAVA_OPTS.to_owned(),
    };

    Ok((resources, java_opts))
}

fn cpu_and_memory(
    resources: Option<&BTreeMap<String, K8sQuantity>>,
) -> Option<BTreeMap<String, K8sQuantity>> {
    let filtered: BTreeMap<String, K8sQuantity> = resources
        .into_iter()
        .flatten()
        .filter(|(name, _)| matches!(name.as_str(), "cpu" | "memory"))
        .map(|(name, quantity)| (name.clone(), quantity.clone()))
        .collect();

    (!filtered.is_empty()).then_some(filtered)
}

fn secrets(secrets: Vec<Secret>) -> impl Iterator<Item = RenderedObject> {
    secrets.into_iter().map(RenderedObject::from)
}

fn is_external_name_service(service: &Service) -> bool {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        == Some("ExternalName")
}

fn eck_operator_cluster_role() -> ClusterRole {
    let rule = |api_group: &str, resources: &[&str]| PolicyRule {
        api_groups: Some(vec![api_group.to_owned()]),
        resources: Some(resources.iter().map(|resource| (*resource).to_owned()).collect()),
        verbs: ["get", "list", "watch", "create", "update", "patch", "delete"]
            .map(String::from)
            .to_vec(),
        ..PolicyRule::default()
    };

    ClusterRole {
        metadata: ObjectMetaBuilder::new().name(ECK_OPERATOR_NAME).build(),
        rules: Some(vec![
            rule(
                "",
                &[
                    "pods",
                    "endpoints",
                    "events",
                    "persistentvolumeclaims",
                    "secrets",
                    "services",
                    "configmaps",
                ],
            ),
            rule("apps", &["deployments"]),
            rule("batch", &["cronjobs"]),
            rule("policy", &["poddisruptionbudgets"]),
            rule(
                "elasticsearch.k8s.elastic.co",
                &[
                    "elasticsearches",
                    "elasticsearches/status",
                    "elasticsearches/finalizers",
                    "enterpriselicenses",
                    "enterpriselicenses/status",
                ],
            ),
            rule(
                "kibana.k8s.elastic.co",
                &["kibanas", "kibanas/status", "kibanas/finalizers"],
            ),
            rule(
                "apm.k8s.elastic.co",
                &["apmservers", "apmservers/status", "apmservers/finalizers"],
            ),
            rule(
                "associations.k8s.elastic.co",
                &[
                    "apmserverelasticsearchassociations",
                    "apmserverelasticsearchassociations/status",
                ],
            ),
            rule(
                "admissionregistration.k8s.io",
                &[
                    "mutatingwebhookconfigurations",
                    "validatingwebhookconfigurations",
                ],
            ),
        ]),
        ..ClusterRole::default()
    }
}

/// Binds the ECK operator's service account to the cluster role `role`.
fn eck_operator_cluster_role_binding(name: &str, role: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMetaBuilder::new().name(name).build(),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_owned(),
            kind: "ClusterRole".to_owned(),
            name: role.to_owned(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_owned(),
            name: ECK_OPERATOR_NAME.to_owned(),
            namespace: Some(ECK_OPERATOR_NAMESPACE.to_owned()),
            ..Subject::default()
        }]),
    }
}

fn eck_operator_service_account() -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMetaBuilder::new()
            .name(ECK_OPERATOR_NAME)
            .namespace(ECK_OPERATOR_NAMESPACE)
            .build(),
        ..ServiceAccount::default()
    }
}

/// Empty secret the ECK operator stores its webhook certificate in.
fn eck_operator_webhook_secret() -> Secret {
    Secret {
        metadata: ObjectMetaBuilder::new()
            .name(ECK_WEBHOOK_SECRET_NAME)
            .namespace(ECK_OPERATOR_NAMESPACE)
            .build(),
        ..Secret::default()
    }
}
