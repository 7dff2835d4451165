//! Reconciliation core of the Tigera operator.
//!
//! The user facing resources ([`crd::installation::Installation`] and
//! [`crd::log_storage::LogStorage`]) are completed by [`defaults`] and then rendered into the
//! Kubernetes objects that make up the deployment by the components in [`render`]. Nothing in
//! here talks to the API server, applying the rendered objects is up to the controller.

pub mod builder;
pub mod cli;
pub mod crd;
pub mod defaults;
pub mod images;
pub mod logging;
pub mod quantity;
pub mod render;

// External re-exports
pub use k8s_openapi;
pub use kube;
