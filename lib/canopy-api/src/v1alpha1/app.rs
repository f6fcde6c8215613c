use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Port an app's web process listens on when its spec does not say
pub const DEFAULT_SERVICE_PORT: i32 = 8888;

/// App is the platform-side record of a deployed application. Routers read
/// it to resolve the namespace an app's workloads run in and the container
/// port its web process listens on.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "canopy.dev",
    version = "v1alpha1",
    kind = "App",
    plural = "apps",
    namespaced,
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Namespace where the app's workloads and services live
    pub namespace_name: String,

    /// Pool the app is scheduled on
    #[serde(default)]
    pub pool: String,

    /// Port the app's web process listens on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_port: Option<i32>,
}

impl App {
    /// Container port targeted by the balancer's primary port
    pub fn service_port(&self) -> i32 {
        self.spec.service_port.unwrap_or(DEFAULT_SERVICE_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_port_defaults() {
        let app = App::new(
            "myapp",
            AppSpec {
                namespace_name: "default".to_string(),
                pool: "prod".to_string(),
                service_port: None,
            },
        );
        assert_eq!(app.service_port(), DEFAULT_SERVICE_PORT);
    }

    #[test]
    fn test_service_port_from_spec() {
        let app = App::new(
            "myapp",
            AppSpec {
                namespace_name: "default".to_string(),
                pool: String::new(),
                service_port: Some(3000),
            },
        );
        assert_eq!(app.service_port(), 3000);
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let spec = AppSpec {
            namespace_name: "apps".to_string(),
            pool: "prod".to_string(),
            service_port: Some(8080),
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["namespaceName"], "apps");
        assert_eq!(value["servicePort"], 8080);
    }
}
