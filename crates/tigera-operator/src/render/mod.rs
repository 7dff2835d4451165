//! Rendering of the desired cluster state into Kubernetes objects.
//!
//! A [`Component`] captures all of its inputs when it is constructed and afterwards only answers
//! which objects should exist and which should be removed. Applying them is up to the caller,
//! in the order they are returned.

use k8s_openapi::{
    api::{
        apps::v1::StatefulSet,
        batch::v1::CronJob,
        core::v1::{ConfigMap, LocalObjectReference, Namespace, Secret, Service, ServiceAccount},
        rbac::v1::{ClusterRole, ClusterRoleBinding},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Resource;

use crate::{
    builder::meta::ObjectMetaBuilder,
    crd::{
        eck::{Elasticsearch, Kibana},
        log_storage::LogStorage,
    },
};

pub mod elasticsearch;
pub mod log_storage;

pub const OPENSHIFT_NODE_SELECTOR_ANNOTATION: &str = "openshift.io/node-selector";

/// Something the operator deploys, rendered into Kubernetes objects.
pub trait Component {
    /// Returns the objects to create (or update) and the objects to delete, both in the order they
    /// have to be applied in.
    fn objects(&self) -> (Vec<RenderedObject>, Vec<RenderedObject>);

    /// Whether the component can be rendered yet.
    fn ready(&self) -> bool;
}

macro_rules! rendered_objects {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Every kind of object a [`Component`] renders.
        #[derive(Clone, Debug, PartialEq)]
        pub enum RenderedObject {
            $($variant(Box<$ty>),)*
        }

        $(
            impl From<$ty> for RenderedObject {
                fn from(object: $ty) -> Self {
                    Self::$variant(Box::new(object))
                }
            }
        )*

        impl RenderedObject {
            pub fn kind(&self) -> String {
                match self {
                    $(Self::$variant(_) => <$ty as Resource>::kind(&()).into_owned(),)*
                }
            }

            pub fn api_version(&self) -> String {
                match self {
                    $(Self::$variant(_) => <$ty as Resource>::api_version(&()).into_owned(),)*
                }
            }

            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Self::$variant(object) => object.meta(),)*
                }
            }
        }
    };
}

rendered_objects! {
    Namespace(Namespace),
    Secret(Secret),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    StatefulSet(StatefulSet),
    ConfigMap(ConfigMap),
    Service(Service),
    CronJob(CronJob),
    Elasticsearch(Elasticsearch),
    Kibana(Kibana),
    LogStorage(LogStorage),
}

impl RenderedObject {
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// The namespace, [`None`] for cluster scoped objects.
    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }
}

/// Renders a namespace. On OpenShift the namespace is opened up for all nodes, otherwise the
/// project's default node selector would restrict where its pods can be scheduled.
pub fn create_namespace(name: &str, openshift: bool) -> Namespace {
    let mut metadata = ObjectMetaBuilder::new();
    metadata.name(name).with_label("name", name);

    if openshift {
        metadata.with_annotation(OPENSHIFT_NODE_SELECTOR_ANNOTATION, "");
    }

    Namespace {
        metadata: metadata.build(),
        ..Namespace::default()
    }
}

/// Copies the given secrets into `namespace`, keeping their name, type and data.
pub fn copy_secrets(namespace: &str, secrets: &[Secret]) -> Vec<Secret> {
    secrets
        .iter()
        .map(|secret| Secret {
            metadata: ObjectMetaBuilder::new()
                .name(secret.metadata.name.clone().unwrap_or_default())
                .namespace(namespace)
                .build(),
            data: secret.data.clone(),
            string_data: secret.string_data.clone(),
            type_: secret.type_.clone(),
            ..Secret::default()
        })
        .collect()
}

pub fn image_pull_secret_references(secrets: &[Secret]) -> Option<Vec<LocalObjectReference>> {
    if secrets.is_empty() {
        return None;
    }

    Some(
        secrets
            .iter()
            .map(|secret| LocalObjectReference {
                name: secret.metadata.name.clone().unwrap_or_default(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::ByteString;
    use rstest::rstest;

    use super::*;

    fn secret(name: &str, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMetaBuilder::new()
                .name(name)
                .namespace(namespace)
                .with_label("origin", "user")
                .build(),
            data: Some(BTreeMap::from([(
                "tls.crt".to_owned(),
                ByteString(b"certificate".to_vec()),
            )])),
            type_: Some("kubernetes.io/tls".to_owned()),
            ..Secret::default()
        }
    }

    #[rstest]
    #[case(false, None)]
    #[case(true, Some(BTreeMap::from([("openshift.io/node-selector".to_owned(), String::new())])))]
    fn namespace_annotations(
        #[case] openshift: bool,
        #[case] expected: Option<BTreeMap<String, String>>,
    ) {
        let namespace = create_namespace("tigera-elasticsearch", openshift);
        assert_eq!(namespace.metadata.name.as_deref(), Some("tigera-elasticsearch"));
        assert_eq!(namespace.metadata.annotations, expected);
    }

    #[test]
    fn copied_secrets_keep_data_but_not_metadata() {
        let copies = copy_secrets("tigera-kibana", &[secret("pull-secret", "tigera-operator")]);

        assert_eq!(copies.len(), 1);
        let copy = &copies[0];
        assert_eq!(copy.metadata.name.as_deref(), Some("pull-secret"));
        assert_eq!(copy.metadata.namespace.as_deref(), Some("tigera-kibana"));
        assert_eq!(copy.metadata.labels, None);
        assert_eq!(copy.type_.as_deref(), Some("kubernetes.io/tls"));
        assert_eq!(copy.data, secret("pull-secret", "tigera-operator").data);
    }

    #[test]
    fn pull_secret_references() {
        assert_eq!(image_pull_secret_references(&[]), None);
        assert_eq!(
            image_pull_secret_references(&[secret("a", "ns"), secret("b", "ns")]),
            Some(vec![
                LocalObjectReference {
                    name: "a".to_owned()
                },
                LocalObjectReference {
                    name: "b".to_owned()
                },
            ])
        );
    }

    #[test]
    fn rendered_object_identity() {
        let object = RenderedObject::from(secret("pull-secret", "tigera-operator"));
        assert_eq!(object.kind(), "Secret");
        assert_eq!(object.api_version(), "v1");
        assert_eq!(object.name(), "pull-secret");
        assert_eq!(object.namespace(), Some("tigera-operator"));

        let object = RenderedObject::from(LogStorage::new("tigera-secure", Default::default()));
        assert_eq!(object.kind(), "LogStorage");
        assert_eq!(object.api_version(), "operator.tigera.io/v1");
        assert_eq!(object.namespace(), None);
    }
}
