//! Optional TLS for the API listener

use std::io::BufReader;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rustls::pki_types::PrivateKeyDer;
use rustls::ServerConfig;
use tracing::{info, warn};

/// Build a rustls server config from PEM-encoded certificate chain and key
pub fn server_config_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let mut cert_reader = BufReader::new(cert_pem);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to parse certificates: {}", err))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in PEM data"));
    }

    let mut key_reader = BufReader::new(key_pem);
    let mut private_key = None;
    for item in rustls_pemfile::read_all(&mut key_reader) {
        match item.map_err(|err| anyhow!("failed to parse private key: {}", err))? {
            rustls_pemfile::Item::Pkcs8Key(key) => {
                private_key = Some(PrivateKeyDer::Pkcs8(key));
                break;
            }
            rustls_pemfile::Item::Sec1Key(key) => {
                private_key = Some(PrivateKeyDer::Sec1(key));
                break;
            }
            rustls_pemfile::Item::Pkcs1Key(key) => {
                private_key = Some(PrivateKeyDer::Pkcs1(key));
                break;
            }
            _ => {}
        }
    }
    let private_key = private_key.ok_or_else(|| anyhow!("no private key found in PEM data"))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|err| anyhow!("invalid certificate or key: {}", err))?;
    Ok(Arc::new(config))
}

/// TLS material from ROUTER_TLS_CERT / ROUTER_TLS_KEY, when both are set
pub fn load_tls_config() -> Option<Arc<ServerConfig>> {
    let cert_path = std::env::var("ROUTER_TLS_CERT").ok()?;
    let key_path = std::env::var("ROUTER_TLS_KEY").ok()?;

    let cert = match std::fs::read(&cert_path) {
        Ok(cert) => cert,
        Err(err) => {
            warn!("Failed to read TLS certificate from {}: {}", cert_path, err);
            return None;
        }
    };
    let key = match std::fs::read(&key_path) {
        Ok(key) => key,
        Err(err) => {
            warn!("Failed to read TLS key from {}: {}", key_path, err);
            return None;
        }
    };

    match server_config_from_pem(&cert, &key) {
        Ok(config) => {
            info!("TLS configuration loaded from {} and {}", cert_path, key_path);
            Some(config)
        }
        Err(err) => {
            warn!("Failed to parse TLS configuration: {}", err);
            None
        }
    }
}
