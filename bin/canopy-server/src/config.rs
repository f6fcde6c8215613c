//! Server configuration loaded from a YAML file

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use canopy_kube::{BaseConfig, LbConfig};
use serde::Deserialize;

/// Full configuration of the router daemon
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for the API, host:port
    pub listen: String,

    /// Fallback namespace for apps without an App record of their own
    pub namespace: String,

    /// Namespace where App records live
    pub apps_namespace: String,

    /// Labels stamped on every managed Service
    pub labels: BTreeMap<String, String>,

    /// Annotations stamped on every managed Service
    pub annotations: BTreeMap<String, String>,

    /// LoadBalancer backend tuning
    pub loadbalancer: LbConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8077".to_string(),
            namespace: "default".to_string(),
            apps_namespace: "canopy-system".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            loadbalancer: LbConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn base_config(&self) -> BaseConfig {
        BaseConfig {
            namespace: self.namespace.clone(),
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "0.0.0.0:8077");
        assert_eq!(config.namespace, "default");
        assert!(config.labels.is_empty());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let raw = r#"
namespace: apps
labels:
  canopy.dev/cluster: east
loadbalancer:
  opts_as_labels:
    team: canopy.dev/team
  pool_labels:
    prod:
      tier: gold
"#;
        let config: ServerConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.namespace, "apps");
        assert_eq!(config.listen, "0.0.0.0:8077");
        assert_eq!(
            config.labels.get("canopy.dev/cluster"),
            Some(&"east".to_string())
        );
        assert_eq!(
            config.loadbalancer.opts_as_labels.get("team"),
            Some(&"canopy.dev/team".to_string())
        );
        assert_eq!(
            config
                .loadbalancer
                .pool_labels
                .get("prod")
                .and_then(|labels| labels.get("tier")),
            Some(&"gold".to_string())
        );
    }
}
