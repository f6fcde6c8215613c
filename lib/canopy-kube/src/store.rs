//! Cluster access capability and its kube-backed implementation

use async_trait::async_trait;
use canopy_api::App;
use canopy_core::Result;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};

/// Capability surface the routers need from the cluster. Not-found failures
/// stay distinguishable through RouterError::is_not_found, so callers can
/// convert them on their idempotent paths.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>>;

    async fn get_app(&self, name: &str) -> Result<App>;
}

/// ClusterStore backed by the Kubernetes API
pub struct KubeStore {
    client: Client,
    /// Namespace holding App records
    apps_namespace: String,
}

impl KubeStore {
    pub fn new(client: Client, apps_namespace: impl Into<String>) -> Self {
        Self {
            client,
            apps_namespace: apps_namespace.into(),
        }
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        Ok(self.services(namespace).get(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        Ok(self
            .services(namespace)
            .create(&PostParams::default(), service)
            .await?)
    }

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let name = service.metadata.name.clone().unwrap_or_default();
        Ok(self
            .services(namespace)
            .replace(&name, &PostParams::default(), service)
            .await?)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>> {
        let params = ListParams::default().labels(label_selector);
        Ok(self.services(namespace).list(&params).await?.items)
    }

    async fn get_app(&self, name: &str) -> Result<App> {
        let apps: Api<App> = Api::namespaced(self.client.clone(), &self.apps_namespace);
        Ok(apps.get(name).await?)
    }
}
