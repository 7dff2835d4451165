use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// A builder to build [`ObjectMeta`] objects.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetaBuilder {
    name: Option<String>,
    namespace: Option<String>,
    labels: Option<BTreeMap<String, String>>,
    annotations: Option<BTreeMap<String, String>>,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// This adds a single label to the existing labels.
    /// It'll override a label with the same key.
    pub fn with_label(
        &mut self,
        label_key: impl Into<String>,
        label_value: impl Into<String>,
    ) -> &mut Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(label_key.into(), label_value.into());
        self
    }

    /// This adds multiple labels to the existing labels.
    /// Any existing label with a key that is contained in `labels` will be overwritten
    pub fn with_labels(&mut self, labels: BTreeMap<String, String>) -> &mut Self {
        self.labels.get_or_insert_with(BTreeMap::new).extend(labels);
        self
    }

    /// This adds a single annotation to the existing annotations.
    /// It'll override an annotation with the same key.
    pub fn with_annotation(
        &mut self,
        annotation_key: impl Into<String>,
        annotation_value: impl Into<String>,
    ) -> &mut Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotation_key.into(), annotation_value.into());
        self
    }

    pub fn build(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            ..ObjectMeta::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objectmeta_builder() {
        let meta = ObjectMetaBuilder::new()
            .name("elastic-operator")
            .namespace("tigera-eck-operator")
            .with_label("k8s-app", "elastic-operator")
            .with_labels(BTreeMap::from([
                ("control-plane".to_owned(), "elastic-operator".to_owned()),
                ("k8s-app".to_owned(), "overridden".to_owned()),
            ]))
            .with_annotation("openshift.io/node-selector", "")
            .build();

        assert_eq!(meta.name.as_deref(), Some("elastic-operator"));
        assert_eq!(meta.namespace.as_deref(), Some("tigera-eck-operator"));

        let labels = meta.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("k8s-app").map(String::as_str), Some("overridden"));
        assert_eq!(
            meta.annotations.unwrap().get("openshift.io/node-selector"),
            Some(&String::new())
        );
    }

    #[test]
    fn empty_builder_sets_nothing() {
        assert_eq!(ObjectMetaBuilder::new().build(), ObjectMeta::default());
    }
}
