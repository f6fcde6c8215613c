//! Kubernetes backend for the canopy router
//!
//! This library provides:
//! - ClusterStore, the capability surface routers need from the cluster
//! - BaseService, collaborators shared by every Kubernetes router flavor
//! - LbRouter, the LoadBalancer Service backend

pub mod base;
pub mod loadbalancer;
pub mod store;

#[cfg(test)]
mod fake;

pub use base::{BaseConfig, BaseService};
pub use loadbalancer::{LbConfig, LbRouter};
pub use store::{ClusterStore, KubeStore};
