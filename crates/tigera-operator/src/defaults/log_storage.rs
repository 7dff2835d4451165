use crate::crd::log_storage::{Indices, LogStorage, Nodes, Retention};

pub const DEFAULT_ELASTICSEARCH_NODE_COUNT: i64 = 1;
pub const DEFAULT_INDEX_REPLICAS: i32 = 0;
pub const DEFAULT_FLOWS_RETENTION_DAYS: i32 = 8;
pub const DEFAULT_AUDIT_REPORTS_RETENTION_DAYS: i32 = 91;
pub const DEFAULT_SNAPSHOTS_RETENTION_DAYS: i32 = 91;
pub const DEFAULT_COMPLIANCE_REPORTS_RETENTION_DAYS: i32 = 91;
pub const DEFAULT_STORAGE_CLASS_NAME: &str = "tigera-elasticsearch";

/// Fills the unset fields of a LogStorage.
pub fn fill_log_storage_defaults(log_storage: &mut LogStorage) {
    let spec = &mut log_storage.spec;

    spec.nodes.get_or_insert_with(|| Nodes {
        count: DEFAULT_ELASTICSEARCH_NODE_COUNT,
        resource_requirements: None,
    });

    spec.indices
        .get_or_insert_with(Indices::default)
        .replicas
        .get_or_insert(DEFAULT_INDEX_REPLICAS);

    let retention = spec.retention.get_or_insert_with(Retention::default);
    retention.flows.get_or_insert(DEFAULT_FLOWS_RETENTION_DAYS);
    retention
        .audit_reports
        .get_or_insert(DEFAULT_AUDIT_REPORTS_RETENTION_DAYS);
    retention
        .snapshots
        .get_or_insert(DEFAULT_SNAPSHOTS_RETENTION_DAYS);
    retention
        .compliance_reports
        .get_or_insert(DEFAULT_COMPLIANCE_REPORTS_RETENTION_DAYS);

    spec.storage_class_name
        .get_or_insert_with(|| DEFAULT_STORAGE_CLASS_NAME.to_owned());
}
