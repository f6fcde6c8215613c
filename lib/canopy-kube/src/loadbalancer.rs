//! LoadBalancer Service backend
//!
//! Exposes each app through a core/v1 Service of type LoadBalancer, keeps it
//! synchronized with the app's web service, and supports exchanging the
//! traffic targets of two balancers without touching their addresses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use canopy_api::labels::{APP_LABEL, APP_POOL_LABEL, MANAGED_SERVICE_LABEL};
use canopy_api::{App, DEFAULT_SERVICE_PORT};
use canopy_core::opts::{parse_bool_opt, EXPOSED_PORT_OPT};
use canopy_core::{BackendRouter, Result, RouterError, RouterOpts};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Deserialize;
use tracing::debug;

use crate::base::BaseService;

/// Default public port when no exposed-port option is given
const DEFAULT_LB_PORT: i32 = 80;

/// Option exposing every web-service port on the balancer
const EXPOSE_ALL_PORTS_OPT: &str = "expose-all-ports";

/// Per-backend configuration for the LoadBalancer flavor
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LbConfig {
    /// Router options mirrored into labels on the managed Service
    #[serde(default)]
    pub opts_as_labels: BTreeMap<String, String>,

    /// Help text for the options in opts_as_labels
    #[serde(default)]
    pub opts_as_labels_docs: BTreeMap<String, String>,

    /// Extra labels applied to Services of apps in a given pool
    #[serde(default)]
    pub pool_labels: BTreeMap<String, BTreeMap<String, String>>,
}

/// Router backend managing one LoadBalancer Service per app
pub struct LbRouter {
    base: BaseService,
    config: LbConfig,
}

impl LbRouter {
    pub fn new(base: BaseService, config: LbConfig) -> Self {
        Self { base, config }
    }

    async fn lb_service(&self, app_name: &str) -> Result<Service> {
        let namespace = self.base.app_namespace(app_name).await?;
        self.base
            .store()
            .get_service(&namespace, &service_name(app_name))
            .await
    }

    /// Reconcile the managed Service with the app's desired state
    async fn sync_lb(
        &self,
        app_name: &str,
        opts: Option<RouterOpts>,
        is_update: bool,
    ) -> Result<()> {
        let app = self.base.get_app(app_name).await?;

        let mut service = match self.lb_service(app_name).await {
            Ok(service) => service,
            Err(err) if err.is_not_found() => {
                let namespace = app
                    .as_ref()
                    .map(|app| app.spec.namespace_name.clone())
                    .unwrap_or_else(|| self.base.namespace().to_string());
                Service {
                    metadata: ObjectMeta {
                        name: Some(service_name(app_name)),
                        namespace: Some(namespace),
                        ..Default::default()
                    },
                    spec: Some(ServiceSpec {
                        type_: Some("LoadBalancer".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }
            }
            Err(err) => return Err(err),
        };

        // A swapped balancer intentionally points at the peer app's pods;
        // routine syncs must not touch it.
        if BaseService::is_swapped(&service.metadata).is_some() {
            debug!("Skipping sync of swapped balancer for app {}", app_name);
            return Ok(());
        }

        let opts = match opts {
            Some(opts) => opts,
            None => RouterOpts::from_annotations(&service.metadata)?,
        };

        let web_service = match self.base.web_service(app_name).await {
            Ok(service) => Some(service),
            Err(RouterError::NoWebService(_)) if !is_update => None,
            Err(err) => return Err(err),
        };

        if let Some(web) = &web_service {
            let selector = web.spec.as_ref().and_then(|spec| spec.selector.clone());
            service
                .spec
                .get_or_insert_with(ServiceSpec::default)
                .selector = selector;
        }

        self.fill_labels_and_annotations(&mut service, app_name, web_service.as_ref(), &opts)?;

        let ports = ports_for_service(&service, app.as_ref(), &opts, web_service.as_ref());
        service.spec.get_or_insert_with(ServiceSpec::default).ports = Some(ports);

        let namespace = service.metadata.namespace.clone().unwrap_or_default();
        // Update first: the common case is an existing Service, and losing
        // the race against a concurrent delete falls through to create.
        match self.base.store().update_service(&namespace, &service).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!("Creating balancer service for app {}", app_name);
                self.base
                    .store()
                    .create_service(&namespace, &service)
                    .await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn fill_labels_and_annotations(
        &self,
        service: &mut Service,
        app_name: &str,
        web_service: Option<&Service>,
        opts: &RouterOpts,
    ) -> Result<()> {
        let mut opts_labels = BTreeMap::new();
        for (opt_name, label_name) in &self.config.opts_as_labels {
            if let Some(value) = opts.additional_opts.get(opt_name) {
                opts_labels.insert(label_name.clone(), value.clone());
            }
        }

        let reserved = BTreeMap::from([
            (APP_LABEL.to_string(), app_name.to_string()),
            (MANAGED_SERVICE_LABEL.to_string(), "true".to_string()),
            (APP_POOL_LABEL.to_string(), opts.pool.clone()),
        ]);

        let no_labels = BTreeMap::new();
        let pool_labels = self
            .config
            .pool_labels
            .get(&opts.pool)
            .unwrap_or(&no_labels);

        let mut label_sources = vec![pool_labels, &opts_labels, self.base.labels(), &reserved];

        let opts_annotations = opts.to_annotations()?;
        let mut annotation_sources = vec![self.base.annotations(), &opts_annotations];

        let web_labels;
        let web_annotations;
        if let Some(web) = web_service {
            web_labels = web.metadata.labels.clone().unwrap_or_default();
            web_annotations = web.metadata.annotations.clone().unwrap_or_default();
            label_sources.push(&web_labels);
            annotation_sources.push(&web_annotations);
        }

        service.metadata.labels = Some(merge_maps(&label_sources));
        service.metadata.annotations = Some(merge_maps(&annotation_sources));
        Ok(())
    }
}

#[async_trait]
impl BackendRouter for LbRouter {
    async fn create(&self, app_name: &str, opts: RouterOpts) -> Result<()> {
        self.sync_lb(app_name, Some(opts), false).await
    }

    async fn update(&self, app_name: &str) -> Result<()> {
        self.sync_lb(app_name, None, true).await
    }

    async fn remove(&self, app_name: &str) -> Result<()> {
        let service = match self.lb_service(app_name).await {
            Ok(service) => service,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        if let Some(dst_app) = BaseService::is_swapped(&service.metadata) {
            return Err(RouterError::AppSwapped {
                app: app_name.to_string(),
                dst_app,
            });
        }

        let namespace = self.base.app_namespace(app_name).await?;
        match self
            .base
            .store()
            .delete_service(&namespace, &service_name(app_name))
            .await
        {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn swap(&self, app_src: &str, app_dst: &str) -> Result<()> {
        let mut src = self.lb_service(app_src).await?;
        if !is_ready(&src) {
            return Err(RouterError::LoadBalancerNotReady);
        }
        let mut dst = self.lb_service(app_dst).await?;
        if !is_ready(&dst) {
            return Err(RouterError::LoadBalancerNotReady);
        }

        let namespace = self.base.app_namespace(app_src).await?;
        let dst_namespace = self.base.app_namespace(app_dst).await?;
        if namespace != dst_namespace {
            return Err(RouterError::CrossNamespaceSwap {
                src: namespace,
                dst: dst_namespace,
            });
        }

        swap_services(&mut src, &mut dst);

        src = self.base.store().update_service(&namespace, &src).await?;

        if let Err(err) = self.base.store().update_service(&namespace, &dst).await {
            // Compensate: restore the first balancer's original selector
            swap_services(&mut src, &mut dst);
            if let Err(rollback) = self.base.store().update_service(&namespace, &src).await {
                return Err(RouterError::SwapRollback {
                    original: Box::new(err),
                    rollback: Box::new(rollback),
                });
            }
            return Err(err);
        }

        debug!("Swapped balancers of {} and {}", app_src, app_dst);
        Ok(())
    }

    async fn get_address(&self, app_name: &str) -> Result<String> {
        let service = self.lb_service(app_name).await?;

        let mut address = String::new();
        let ingress = service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|entries| entries.first());
        if let Some(entry) = ingress {
            address = entry.ip.clone().unwrap_or_default();
            if let Some(port) = service
                .spec
                .as_ref()
                .and_then(|spec| spec.ports.as_ref())
                .and_then(|ports| ports.first())
            {
                address = format!("{}:{}", address, port.port);
            }
            // A hostname supersedes the ip:port form entirely
            if let Some(hostname) = entry.hostname.as_deref().filter(|name| !name.is_empty()) {
                address = hostname.to_string();
            }
        }
        Ok(address)
    }

    async fn supported_options(&self) -> Result<BTreeMap<String, String>> {
        let mut options = BTreeMap::from([
            (EXPOSED_PORT_OPT.to_string(), String::new()),
            (
                EXPOSE_ALL_PORTS_OPT.to_string(),
                "Expose all ports used by the application in the load balancer. Defaults to false."
                    .to_string(),
            ),
        ]);
        for opt_name in self.config.opts_as_labels.keys() {
            let doc = self
                .config
                .opts_as_labels_docs
                .get(opt_name)
                .cloned()
                .unwrap_or_default();
            options.insert(opt_name.clone(), doc);
        }
        Ok(options)
    }
}

/// Name of the managed Service for an app
fn service_name(app_name: &str) -> String {
    format!("{app_name}-router-lb")
}

/// A balancer is ready once the orchestrator assigned it an external IP.
/// Hostname-only ingress does not count.
fn is_ready(service: &Service) -> bool {
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.ip.as_deref())
        .is_some_and(|ip| !ip.is_empty())
}

fn app_service_port(app: Option<&App>) -> i32 {
    app.map(App::service_port).unwrap_or(DEFAULT_SERVICE_PORT)
}

/// Desired port list for a balancer, keyed and emitted in ascending port
/// order so repeated syncs produce identical output.
fn ports_for_service(
    service: &Service,
    app: Option<&App>,
    opts: &RouterOpts,
    web_service: Option<&Service>,
) -> Vec<ServicePort> {
    let mut primary_port = opts.exposed_port.parse::<i32>().unwrap_or(0);
    if primary_port == 0 {
        primary_port = DEFAULT_LB_PORT;
    }

    let existing: BTreeMap<i32, &ServicePort> = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| ports.iter().map(|port| (port.port, port)).collect())
        .unwrap_or_default();

    let mut wanted = BTreeMap::from([(
        primary_port,
        ServicePort {
            name: Some(format!("port-{primary_port}")),
            protocol: Some("TCP".to_string()),
            port: primary_port,
            target_port: Some(IntOrString::Int(app_service_port(app))),
            ..Default::default()
        },
    )]);

    if parse_bool_opt(opts.additional_opts.get(EXPOSE_ALL_PORTS_OPT)) {
        let web_ports = web_service
            .and_then(|web| web.spec.as_ref())
            .and_then(|spec| spec.ports.as_ref());
        if let Some(web_ports) = web_ports {
            for web_port in web_ports {
                // The primary port wins over a conflicting web-service port
                if web_port.port == primary_port {
                    continue;
                }
                let mut port = web_port.clone();
                // Node ports belong to the web service, not to this balancer
                port.node_port = None;
                wanted.insert(port.port, port);
            }
        }
    }

    // Keep orchestrator-assigned node ports stable across syncs
    for (number, port) in wanted.iter_mut() {
        if let Some(current) = existing.get(number) {
            port.node_port = current.node_port;
        }
    }

    wanted.into_values().collect()
}

/// First-writer-wins merge: earlier sources take priority on key collision
fn merge_maps(sources: &[&BTreeMap<String, String>]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for source in sources {
        for (key, value) in source.iter() {
            merged
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    merged
}

/// Exchange the routing selectors and swap bookkeeping of two balancers
fn swap_services(src: &mut Service, dst: &mut Service) {
    let src_selector = src.spec.as_ref().and_then(|spec| spec.selector.clone());
    let dst_selector = dst.spec.as_ref().and_then(|spec| spec.selector.clone());
    src.spec.get_or_insert_with(ServiceSpec::default).selector = dst_selector;
    dst.spec.get_or_insert_with(ServiceSpec::default).selector = src_selector;
    BaseService::swap_metadata(&mut src.metadata, &mut dst.metadata);
}
