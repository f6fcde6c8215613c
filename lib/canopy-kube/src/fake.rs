//! In-memory ClusterStore used by the unit tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use canopy_api::App;
use canopy_core::{Result, RouterError};
use k8s_openapi::api::core::v1::Service;
use kube::core::ErrorResponse;

use crate::store::ClusterStore;

pub fn not_found(kind: &str, name: &str) -> RouterError {
    RouterError::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{kind} \"{name}\" not found"),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

pub fn api_failure(message: &str) -> RouterError {
    RouterError::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

#[derive(Default)]
pub struct FakeStore {
    services: Mutex<HashMap<(String, String), Service>>,
    apps: Mutex<HashMap<String, App>>,
    /// Scripted update outcomes per service name; popping true means fail
    update_plan: Mutex<HashMap<String, VecDeque<bool>>>,
}

impl FakeStore {
    pub fn add_service(&self, namespace: &str, service: Service) {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.services
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), service);
    }

    pub fn add_app(&self, app: App) {
        let name = app.metadata.name.clone().unwrap_or_default();
        self.apps.lock().unwrap().insert(name, app);
    }

    pub fn plan_updates(&self, name: &str, outcomes: &[bool]) {
        self.update_plan
            .lock()
            .unwrap()
            .insert(name.to_string(), outcomes.iter().copied().collect());
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        self.service(namespace, name)
            .ok_or_else(|| not_found("services", name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        self.add_service(namespace, service.clone());
        Ok(service.clone())
    }

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let name = service.metadata.name.clone().unwrap_or_default();
        if let Some(plan) = self.update_plan.lock().unwrap().get_mut(&name) {
            if plan.pop_front() == Some(true) {
                return Err(api_failure(&format!("update of {name} failed")));
            }
        }
        let mut services = self.services.lock().unwrap();
        let key = (namespace.to_string(), name.clone());
        if !services.contains_key(&key) {
            return Err(not_found("services", &name));
        }
        services.insert(key, service.clone());
        Ok(service.clone())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        self.services
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("services", name))
    }

    async fn list_services(&self, namespace: &str, label_selector: &str) -> Result<Vec<Service>> {
        let wanted: Vec<(&str, &str)> = label_selector
            .split(',')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let mut parts = pair.splitn(2, '=');
                (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
            })
            .collect();

        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .filter(|(_, service)| {
                let empty = BTreeMap::new();
                let labels = service.metadata.labels.as_ref().unwrap_or(&empty);
                wanted
                    .iter()
                    .all(|(key, value)| labels.get(*key).map(String::as_str) == Some(*value))
            })
            .map(|(_, service)| service.clone())
            .collect())
    }

    async fn get_app(&self, name: &str) -> Result<App> {
        self.apps
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("apps", name))
    }
}
