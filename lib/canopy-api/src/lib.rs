//! Canopy router API types for Kubernetes integration
//!
//! This library defines:
//! - App: the platform's application record custom resource
//! - Well-known label keys shared by every router backend

pub mod labels;
pub mod v1alpha1;

pub use v1alpha1::{App, AppSpec, DEFAULT_SERVICE_PORT};
