//! HTTP surface exposing the router operations

use std::sync::Arc;
use std::time::Instant;

use canopy_core::{BackendRouter, RouterError, RouterOpts};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use crate::metrics::Metrics;

/// Shared state handed to every request handler
pub struct ApiState {
    pub router: Arc<dyn BackendRouter>,
    pub metrics: Metrics,
}

pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let start = Instant::now();
    let (operation, response) = route(req, &state).await;

    state
        .metrics
        .request_duration_seconds
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .requests_total
        .with_label_values(&[operation, response.status().as_str()])
        .inc();

    Ok(response)
}

async fn route(
    req: Request<Incoming>,
    state: &ApiState,
) -> (&'static str, Response<Full<Bytes>>) {
    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/').to_string();
    let query = req.uri().query().map(str::to_string);

    debug!("{} {}", method, path);

    if path == "/healthcheck" && method == Method::GET {
        return ("healthcheck", text_response(StatusCode::OK, "OK\n"));
    }

    if path == "/metrics" && method == Method::GET {
        let response = match state.metrics.gather() {
            Ok(text) => text_response(StatusCode::OK, &text),
            Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{err}\n")),
        };
        return ("metrics", response);
    }

    if path == "/api/info" && method == Method::GET {
        let response = match state.router.supported_options().await {
            Ok(options) => json_response(StatusCode::OK, &json!(options)),
            Err(err) => error_response(&err),
        };
        return ("info", response);
    }

    let Some((app, action)) = parse_backend_path(&path) else {
        return ("unknown", text_response(StatusCode::NOT_FOUND, "not found\n"));
    };
    let app = app.to_string();
    let action = action.map(str::to_string);

    if action.is_none() {
        if method == Method::GET {
            let response = match state.router.get_address(&app).await {
                Ok(address) => json_response(StatusCode::OK, &json!({ "address": address })),
                Err(err) => error_response(&err),
            };
            return ("get", response);
        }

        if method == Method::POST {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    return (
                        "create",
                        text_response(StatusCode::BAD_REQUEST, &format!("reading body: {err}\n")),
                    );
                }
            };
            let opts = if body.is_empty() {
                RouterOpts::default()
            } else {
                match serde_json::from_slice(&body) {
                    Ok(opts) => opts,
                    Err(err) => {
                        return (
                            "create",
                            text_response(
                                StatusCode::BAD_REQUEST,
                                &format!("parsing options: {err}\n"),
                            ),
                        );
                    }
                }
            };
            return ("create", empty_or_error(state.router.create(&app, opts).await));
        }

        if method == Method::PUT {
            return ("update", empty_or_error(state.router.update(&app).await));
        }

        if method == Method::DELETE {
            return ("remove", empty_or_error(state.router.remove(&app).await));
        }
    } else if action.as_deref() == Some("swap") && method == Method::POST {
        let Some(target) = query.as_deref().and_then(target_from_query) else {
            return (
                "swap",
                text_response(StatusCode::BAD_REQUEST, "missing target\n"),
            );
        };
        return ("swap", empty_or_error(state.router.swap(&app, &target).await));
    }

    (
        "unknown",
        text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n"),
    )
}

/// Split "/api/backend/{app}[/{action}]" into its parts
fn parse_backend_path(path: &str) -> Option<(&str, Option<&str>)> {
    let rest = path.strip_prefix("/api/backend/")?;
    let mut segments = rest.splitn(2, '/');
    let app = segments.next().filter(|app| !app.is_empty())?;
    let action = segments.next().filter(|action| !action.is_empty());
    Some((app, action))
}

fn target_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("target=").map(str::to_string))
        .filter(|target| !target.is_empty())
}

fn status_for(err: &RouterError) -> StatusCode {
    if err.is_not_found() {
        return StatusCode::NOT_FOUND;
    }
    match err {
        RouterError::LoadBalancerNotReady
        | RouterError::AppSwapped { .. }
        | RouterError::NoWebService(_)
        | RouterError::CrossNamespaceSwap { .. }
        | RouterError::Serialization(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &RouterError) -> Response<Full<Bytes>> {
    warn!("Request failed: {}", err);
    json_response(status_for(err), &json!({ "error": err.to_string() }))
}

fn empty_or_error(result: canopy_core::Result<()>) -> Response<Full<Bytes>> {
    match result {
        Ok(()) => text_response(StatusCode::OK, ""),
        Err(err) => error_response(&err),
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
