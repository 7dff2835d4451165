//! Resolves logical image names to fully qualified image references.
//!
//! Every image the operator deploys is a variant of [`Image`]. Its [`RegistryGroup`] decides the
//! registry and image namespace used when the [`Installation`](crate::crd::installation::Installation)
//! does not override them.

use std::{collections::HashMap, sync::LazyLock};

use const_format::concatcp;
use strum::IntoEnumIterator;

pub const CALICO_REGISTRY: &str = "docker.io/";
pub const TIGERA_REGISTRY: &str = "gcr.io/unique-caldron-775/cnx/";
pub const ECK_REGISTRY: &str = "docker.elastic.co/";

pub const DEFAULT_CALICO_NAMESPACE: &str = "calico/";

pub const VERSION_CALICO: &str = "v3.11.1";
pub const VERSION_TIGERA: &str = "v2.6.1";
pub const VERSION_ECK_OPERATOR: &str = "0.9.0";
pub const VERSION_ECK_ELASTICSEARCH: &str = "7.3.2";
pub const VERSION_ECK_KIBANA: &str = "7.3.2";

const NODE_CALICO: &str = concatcp!("node:", VERSION_CALICO);
const CNI: &str = concatcp!("cni:", VERSION_CALICO);
const TYPHA_CALICO: &str = concatcp!("typha:", VERSION_CALICO);
const KUBE_CONTROLLERS_CALICO: &str = concatcp!("kube-controllers:", VERSION_CALICO);
const FLEX_VOLUME: &str = concatcp!("pod2daemon-flexvol:", VERSION_CALICO);

const NODE_TIGERA: &str = concatcp!("tigera/cnx-node:", VERSION_TIGERA);
const TYPHA_TIGERA: &str = concatcp!("tigera/typha:", VERSION_TIGERA);
const KUBE_CONTROLLERS_TIGERA: &str = concatcp!("tigera/kube-controllers:", VERSION_TIGERA);
const API_SERVER: &str = concatcp!("tigera/cnx-apiserver:", VERSION_TIGERA);
const QUERY_SERVER: &str = concatcp!("tigera/cnx-queryserver:", VERSION_TIGERA);
const FLUENTD: &str = concatcp!("tigera/fluentd:", VERSION_TIGERA);
const COMPLIANCE_CONTROLLER: &str = concatcp!("tigera/compliance-controller:", VERSION_TIGERA);
const COMPLIANCE_REPORTER: &str = concatcp!("tigera/compliance-reporter:", VERSION_TIGERA);
const COMPLIANCE_SERVER: &str = concatcp!("tigera/compliance-server:", VERSION_TIGERA);
const COMPLIANCE_SNAPSHOTTER: &str = concatcp!("tigera/compliance-snapshotter:", VERSION_TIGERA);
const COMPLIANCE_BENCHMARKER: &str = concatcp!("tigera/compliance-benchmarker:", VERSION_TIGERA);
const INTRUSION_DETECTION_CONTROLLER: &str =
    concatcp!("tigera/intrusion-detection-controller:", VERSION_TIGERA);
const INTRUSION_DETECTION_JOB_INSTALLER: &str =
    concatcp!("tigera/intrusion-detection-job-installer:", VERSION_TIGERA);
const MANAGER: &str = concatcp!("tigera/cnx-manager:", VERSION_TIGERA);
const MANAGER_PROXY: &str = concatcp!("tigera/voltron:", VERSION_TIGERA);
const MANAGER_ES_PROXY: &str = concatcp!("tigera/es-proxy:", VERSION_TIGERA);
const KIBANA: &str = concatcp!("tigera/kibana:", VERSION_TIGERA);
const ES_CURATOR: &str = concatcp!("tigera/es-curator:", VERSION_TIGERA);
const GUARDIAN: &str = concatcp!("tigera/guardian:", VERSION_TIGERA);

const ECK_OPERATOR: &str = concatcp!("eck/eck-operator:", VERSION_ECK_OPERATOR);
const ECK_ELASTICSEARCH: &str =
    concatcp!("elasticsearch/elasticsearch:", VERSION_ECK_ELASTICSEARCH);

static IMAGE_GROUPS: LazyLock<HashMap<&'static str, RegistryGroup>> = LazyLock::new(|| {
    Image::iter()
        .map(|image| (image.name(), image.registry_group()))
        .collect()
});

/// Where an image is pulled from by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryGroup {
    /// Open source Calico images.
    Calico,

    /// Elastic Cloud on Kubernetes images.
    Eck,

    /// Calico Enterprise images, pulled from the private registry.
    Tigera,
}

impl RegistryGroup {
    pub fn default_registry(&self) -> &'static str {
        match self {
            Self::Calico => CALICO_REGISTRY,
            Self::Eck => ECK_REGISTRY,
            Self::Tigera => TIGERA_REGISTRY,
        }
    }

    pub fn default_namespace(&self) -> &'static str {
        match self {
            Self::Calico => DEFAULT_CALICO_NAMESPACE,
            Self::Eck | Self::Tigera => "",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum Image {
    CalicoNode,
    CalicoCni,
    CalicoTypha,
    CalicoKubeControllers,
    CalicoFlexVolume,
    TigeraNode,
    TigeraTypha,
    TigeraKubeControllers,
    ApiServer,
    QueryServer,
    Fluentd,
    ComplianceController,
    ComplianceReporter,
    ComplianceServer,
    ComplianceSnapshotter,
    ComplianceBenchmarker,
    IntrusionDetectionController,
    IntrusionDetectionJobInstaller,
    Manager,
    ManagerProxy,
    ManagerEsProxy,
    Kibana,
    EsCurator,
    Guardian,
    EckOperator,
    EckElasticsearch,
}

impl Image {
    /// The image name including its tag, e.g. `tigera/es-curator:v2.6.1`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CalicoNode => NODE_CALICO,
            Self::CalicoCni => CNI,
            Self::CalicoTypha => TYPHA_CALICO,
            Self::CalicoKubeControllers => KUBE_CONTROLLERS_CALICO,
            Self::CalicoFlexVolume => FLEX_VOLUME,
            Self::TigeraNode => NODE_TIGERA,
            Self::TigeraTypha => TYPHA_TIGERA,
            Self::TigeraKubeControllers => KUBE_CONTROLLERS_TIGERA,
            Self::ApiServer => API_SERVER,
            Self::QueryServer => QUERY_SERVER,
            Self::Fluentd => FLUENTD,
            Self::ComplianceController => COMPLIANCE_CONTROLLER,
            Self::ComplianceReporter => COMPLIANCE_REPORTER,
            Self::ComplianceServer => COMPLIANCE_SERVER,
            Self::ComplianceSnapshotter => COMPLIANCE_SNAPSHOTTER,
            Self::ComplianceBenchmarker => COMPLIANCE_BENCHMARKER,
            Self::IntrusionDetectionController => INTRUSION_DETECTION_CONTROLLER,
            Self::IntrusionDetectionJobInstaller => INTRUSION_DETECTION_JOB_INSTALLER,
            Self::Manager => MANAGER,
            Self::ManagerProxy => MANAGER_PROXY,
            Self::ManagerEsProxy => MANAGER_ES_PROXY,
            Self::Kibana => KIBANA,
            Self::EsCurator => ES_CURATOR,
            Self::Guardian => GUARDIAN,
            Self::EckOperator => ECK_OPERATOR,
            Self::EckElasticsearch => ECK_ELASTICSEARCH,
        }
    }

    pub fn registry_group(&self) -> RegistryGroup {
        match self {
            Self::CalicoNode
            | Self::CalicoCni
            | Self::CalicoTypha
            | Self::CalicoKubeControllers
            | Self::CalicoFlexVolume => RegistryGroup::Calico,
            Self::EckOperator | Self::EckElasticsearch => RegistryGroup::Eck,
            Self::TigeraNode
            | Self::TigeraTypha
            | Self::TigeraKubeControllers
            | Self::ApiServer
            | Self::QueryServer
            | Self::Fluentd
            | Self::ComplianceController
            | Self::ComplianceReporter
            | Self::ComplianceServer
            | Self::ComplianceSnapshotter
            | Self::ComplianceBenchmarker
            | Self::IntrusionDetectionController
            | Self::IntrusionDetectionJobInstaller
            | Self::Manager
            | Self::ManagerProxy
            | Self::ManagerEsProxy
            | Self::Kibana
            | Self::EsCurator
            | Self::Guardian => RegistryGroup::Tigera,
        }
    }

    /// See [`construct_image`].
    pub fn reference(&self, registry: &str, namespace: &str) -> String {
        construct_image(self.name(), registry, namespace)
    }
}

/// Returns the fully qualified reference of `image_name`.
///
/// A non-empty `registry` or `namespace` replaces the default of the image's [`RegistryGroup`].
/// Names not known to [`Image`] belong to [`RegistryGroup::Tigera`].
pub fn construct_image(image_name: &str, registry: &str, namespace: &str) -> String {
    let group = IMAGE_GROUPS
        .get(image_name)
        .copied()
        .unwrap_or(RegistryGroup::Tigera);

    let registry = if registry.is_empty() {
        group.default_registry()
    } else {
        registry
    };
    let namespace = if namespace.is_empty() {
        group.default_namespace()
    } else {
        namespace
    };

    format!("{registry}{namespace}{image_name}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Image::CalicoNode, "", "", "docker.io/calico/node:v3.11.1")]
    #[case(Image::CalicoCni, "quay.io/", "", "quay.io/calico/cni:v3.11.1")]
    #[case(Image::CalicoTypha, "", "my-ns/", "docker.io/my-ns/typha:v3.11.1")]
    #[case(
        Image::EsCurator,
        "",
        "",
        "gcr.io/unique-caldron-775/cnx/tigera/es-curator:v2.6.1"
    )]
    #[case(
        Image::Kibana,
        "registry.example.com/",
        "",
        "registry.example.com/tigera/kibana:v2.6.1"
    )]
    #[case(Image::EckOperator, "", "", "docker.elastic.co/eck/eck-operator:0.9.0")]
    #[case(
        Image::EckElasticsearch,
        "",
        "",
        "docker.elastic.co/elasticsearch/elasticsearch:7.3.2"
    )]
    #[case(
        Image::EckElasticsearch,
        "mirror/",
        "eck/",
        "mirror/eck/elasticsearch/elasticsearch:7.3.2"
    )]
    fn image_reference(
        #[case] image: Image,
        #[case] registry: &str,
        #[case] namespace: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(image.reference(registry, namespace), expected);
    }

    #[test]
    fn unknown_images_use_tigera_registry() {
        assert_eq!(
            construct_image("tigera/something-new:v1", "", ""),
            "gcr.io/unique-caldron-775/cnx/tigera/something-new:v1"
        );
        assert_eq!(
            construct_image("something-new:v1", "r/", "n/"),
            "r/n/something-new:v1"
        );
    }

    #[test]
    fn image_names_are_unique() {
        assert_eq!(IMAGE_GROUPS.len(), Image::iter().count());
    }
}
