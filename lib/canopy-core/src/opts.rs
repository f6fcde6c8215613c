//! Per-app router options and their annotation round-trip
//!
//! Options supplied when an app is first bound are persisted as annotations
//! on the managed resource, so later syncs can rebuild them without the
//! caller resending anything.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Annotation prefix under which options are persisted on managed Services
pub const OPTS_ANNOTATION_PREFIX: &str = "router.canopy.dev/";

/// Option key carrying the numeric override of the default public port
pub const EXPOSED_PORT_OPT: &str = "exposed-port";

/// Options accepted when binding an app to a router
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterOpts {
    /// Public port override; empty means the backend's default
    #[serde(
        rename = "exposed-port",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub exposed_port: String,

    /// Pool the app is scheduled on
    #[serde(rename = "app-pool", default, skip_serializing_if = "String::is_empty")]
    pub pool: String,

    /// Backend-specific flags, passed through opaquely
    #[serde(flatten)]
    pub additional_opts: BTreeMap<String, String>,
}

impl RouterOpts {
    /// Serialize into prefixed annotations for persistence on the resource
    pub fn to_annotations(&self) -> Result<BTreeMap<String, String>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let fields: BTreeMap<String, String> = serde_json::from_value(value)?;
        Ok(fields
            .into_iter()
            .map(|(key, value)| (format!("{OPTS_ANNOTATION_PREFIX}{key}"), value))
            .collect())
    }

    /// Rebuild options previously persisted with to_annotations
    pub fn from_annotations(meta: &ObjectMeta) -> Result<Self, serde_json::Error> {
        let mut fields = serde_json::Map::new();
        if let Some(annotations) = &meta.annotations {
            for (key, value) in annotations {
                if let Some(opt) = key.strip_prefix(OPTS_ANNOTATION_PREFIX) {
                    fields.insert(opt.to_string(), serde_json::Value::String(value.clone()));
                }
            }
        }
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

/// Loose boolean parsing for option values, matching the CLI's accepted
/// spellings (1/t/true plus casings). Anything else is false.
pub fn parse_bool_opt(value: Option<&String>) -> bool {
    matches!(
        value.map(String::as_str),
        Some("1") | Some("t") | Some("T") | Some("true") | Some("True") | Some("TRUE")
    )
}
