//! Collaborators shared by every Kubernetes router flavor

use std::collections::BTreeMap;
use std::sync::Arc;

use canopy_api::labels::{
    APP_LABEL, APP_PROCESS_LABEL, MANAGED_SERVICE_LABEL, SWAP_LABEL, WEB_PROCESS_NAME,
};
use canopy_api::App;
use canopy_core::{Result, RouterError};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;

use crate::store::ClusterStore;

/// Static configuration shared by every Kubernetes backend flavor
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BaseConfig {
    /// Fallback namespace for apps without an App record of their own
    #[serde(default)]
    pub namespace: String,

    /// Labels stamped on every managed Service
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Annotations stamped on every managed Service
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Shared state and collaborators for Kubernetes-backed routers
pub struct BaseService {
    config: BaseConfig,
    store: Arc<dyn ClusterStore>,
}

impl BaseService {
    pub fn new(store: Arc<dyn ClusterStore>, config: BaseConfig) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &dyn ClusterStore {
        self.store.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.config.labels
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.config.annotations
    }

    /// App record, when the platform has materialized one
    pub async fn get_app(&self, app_name: &str) -> Result<Option<App>> {
        match self.store.get_app(app_name).await {
            Ok(app) => Ok(Some(app)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Namespace the app's workloads run in
    pub async fn app_namespace(&self, app_name: &str) -> Result<String> {
        Ok(self
            .get_app(app_name)
            .await?
            .map(|app| app.spec.namespace_name.clone())
            .unwrap_or_else(|| self.config.namespace.clone()))
    }

    /// The app's web service, whose pod selector the balancer mirrors.
    /// Services managed by the router itself never qualify.
    pub async fn web_service(&self, app_name: &str) -> Result<Service> {
        let namespace = self.app_namespace(app_name).await?;
        let selector = format!("{APP_LABEL}={app_name}");
        let mut candidates: Vec<Service> = self
            .store
            .list_services(&namespace, &selector)
            .await?
            .into_iter()
            .filter(|service| {
                service
                    .metadata
                    .labels
                    .as_ref()
                    .map_or(true, |labels| !labels.contains_key(MANAGED_SERVICE_LABEL))
            })
            .collect();

        let web = candidates.iter().position(|service| {
            service
                .metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get(APP_PROCESS_LABEL))
                .map(String::as_str)
                == Some(WEB_PROCESS_NAME)
        });

        match web {
            Some(index) => Ok(candidates.swap_remove(index)),
            None if candidates.is_empty() => Err(RouterError::NoWebService(app_name.to_string())),
            None => Ok(candidates.swap_remove(0)),
        }
    }

    /// Peer app name when the resource is currently swapped
    pub fn is_swapped(meta: &ObjectMeta) -> Option<String> {
        meta.labels
            .as_ref()
            .and_then(|labels| labels.get(SWAP_LABEL))
            .filter(|peer| !peer.is_empty())
            .cloned()
    }

    /// Exchange swap bookkeeping between two resources. Swapping an already
    /// swapped pair undoes it.
    pub fn swap_metadata(src: &mut ObjectMeta, dst: &mut ObjectMeta) {
        let src_app = app_of(src);
        let dst_app = app_of(dst);
        let already_swapped = Self::is_swapped(src).as_deref() == Some(dst_app.as_str());

        let src_labels = src.labels.get_or_insert_with(BTreeMap::new);
        if already_swapped {
            src_labels.remove(SWAP_LABEL);
        } else {
            src_labels.insert(SWAP_LABEL.to_string(), dst_app);
        }

        let dst_labels = dst.labels.get_or_insert_with(BTreeMap::new);
        if already_swapped {
            dst_labels.remove(SWAP_LABEL);
        } else {
            dst_labels.insert(SWAP_LABEL.to_string(), src_app);
        }
    }
}

fn app_of(meta: &ObjectMeta) -> String {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(APP_LABEL))
        .cloned()
        .unwrap_or_default()
}
