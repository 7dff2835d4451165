//! This module provides builders for various (Kubernetes) objects.

pub mod meta;
pub mod pod;
