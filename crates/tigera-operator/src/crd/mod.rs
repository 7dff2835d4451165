//! Custom resources read and written by the operator.
//!
//! [`installation`] and [`log_storage`] are owned by the operator itself, [`eck`] contains the
//! Elastic Cloud on Kubernetes resources the log storage renderer creates and [`network`] is the
//! read-only OpenShift cluster network configuration.

pub mod eck;
pub mod installation;
pub mod log_storage;
pub mod network;
