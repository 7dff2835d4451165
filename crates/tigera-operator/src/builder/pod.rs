//! Helpers for the container and pod level fields the renderers repeat.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector, ResourceRequirements, SecretKeySelector},
    apimachinery::pkg::api::resource::Quantity,
};

pub fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..EnvVar::default()
    }
}

pub fn env_var_from_secret(
    env_var_name: impl Into<String>,
    secret_name: impl Into<String>,
    secret_key: impl Into<String>,
) -> EnvVar {
    EnvVar {
        name: env_var_name.into(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_name.into(),
                key: secret_key.into(),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

/// An env var populated from a field of the pod itself, e.g. `metadata.namespace`.
pub fn env_var_from_field_path(
    env_var_name: impl Into<String>,
    field_path: impl Into<String>,
) -> EnvVar {
    EnvVar {
        name: env_var_name.into(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.into(),
                ..ObjectFieldSelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

/// Builds CPU and memory [`ResourceRequirements`]. Only the values that were set end up in the
/// result.
#[derive(Debug, Default)]
pub struct ResourceRequirementsBuilder {
    cpu_limit: Option<Quantity>,
    cpu_request: Option<Quantity>,
    mem_limit: Option<Quantity>,
    mem_request: Option<Quantity>,
}

impl ResourceRequirementsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cpu_limit(mut self, limit: impl Into<String>) -> Self {
        self.cpu_limit = Some(Quantity(limit.into()));
        self
    }

    pub fn with_cpu_request(mut self, request: impl Into<String>) -> Self {
        self.cpu_request = Some(Quantity(request.into()));
        self
    }

    pub fn with_memory_limit(mut self, limit: impl Into<String>) -> Self {
        self.mem_limit = Some(Quantity(limit.into()));
        self
    }

    pub fn with_memory_request(mut self, request: impl Into<String>) -> Self {
        self.mem_request = Some(Quantity(request.into()));
        self
    }

    pub fn build(self) -> ResourceRequirements {
        let limits = cpu_and_memory(self.cpu_limit, self.mem_limit);
        let requests = cpu_and_memory(self.cpu_request, self.mem_request);

        ResourceRequirements {
            limits: (!limits.is_empty()).then_some(limits),
            requests: (!requests.is_empty()).then_some(requests),
            ..ResourceRequirements::default()
        }
    }
}

fn cpu_and_memory(cpu: Option<Quantity>, memory: Option<Quantity>) -> BTreeMap<String, Quantity> {
    let mut resources = BTreeMap::new();

    if let Some(cpu) = cpu {
        resources.insert("cpu".to_owned(), cpu);
    }

    if let Some(memory) = memory {
        resources.insert("memory".to_owned(), memory);
    }

    resources
}
