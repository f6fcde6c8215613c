//! Backend router capability

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{Result, RouterOpts};

/// Operations every router backend exposes to the platform API. Each call is
/// a self-contained synchronous sequence against the cluster; backends hold
/// no mutable state between invocations.
#[async_trait]
pub trait BackendRouter: Send + Sync {
    /// Bind an app, creating its routing resources
    async fn create(&self, app_name: &str, opts: RouterOpts) -> Result<()>;

    /// Re-sync an app's routing resources with current cluster state
    async fn update(&self, app_name: &str) -> Result<()>;

    /// Tear down an app's routing resources
    async fn remove(&self, app_name: &str) -> Result<()>;

    /// Exchange the traffic targets of two apps' balancers
    async fn swap(&self, app_src: &str, app_dst: &str) -> Result<()>;

    /// External address of an app's balancer; empty while provisioning
    async fn get_address(&self, app_name: &str) -> Result<String>;

    /// Option keys this backend accepts, mapped to help text
    async fn supported_options(&self) -> Result<BTreeMap<String, String>>;
}
