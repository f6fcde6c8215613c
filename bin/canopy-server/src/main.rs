use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use canopy_kube::{BaseService, KubeStore, LbRouter};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::tokio::TokioIo;
use kube::Client;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};
use tracing_subscriber::fmt::init as tracing_init;

mod api;
mod config;
mod metrics;
mod tls;

use api::ApiState;
use config::ServerConfig;
use metrics::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    info!("Starting canopy-server...");

    let config = match std::env::var("ROUTER_CONFIG") {
        Ok(path) => ServerConfig::load(PathBuf::from(path).as_path())?,
        Err(_) => ServerConfig::default(),
    };

    let client = Client::try_default().await?;
    let store = Arc::new(KubeStore::new(client, config.apps_namespace.clone()));
    let base = BaseService::new(store, config.base_config());
    let router = LbRouter::new(base, config.loadbalancer.clone());
    info!("LoadBalancer router initialized");

    let metrics = Metrics::new()?;
    let state = Arc::new(ApiState {
        router: Arc::new(router),
        metrics,
    });

    let addr: SocketAddr = config.listen.parse()?;
    let listener = TcpListener::bind(&addr).await?;

    let tls_acceptor = tls::load_tls_config().map(TlsAcceptor::from);
    if tls_acceptor.is_some() {
        info!("API listening on {} (TLS)", addr);
    } else {
        info!("API listening on {}", addr);
    }

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();
        let tls_acceptor = tls_acceptor.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| api::handle_request(req, state.clone()));

            let served = match tls_acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        http1::Builder::new()
                            .serve_connection(TokioIo::new(tls_stream), service)
                            .await
                    }
                    Err(err) => {
                        debug!("TLS error from {}: {}", peer_addr, err);
                        return;
                    }
                },
                None => {
                    http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                }
            };

            if let Err(err) = served {
                debug!("Error serving connection from {}: {}", peer_addr, err);
            }
        });
    }
}
