//! Prometheus metrics for the router API

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Request metrics shared by every handler
#[derive(Clone)]
pub struct Metrics {
    /// API requests by operation and response status
    pub requests_total: IntCounterVec,
    /// API request latency in seconds by operation
    pub request_duration_seconds: HistogramVec,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "router_requests_total",
                "Router API requests by operation and status",
            ),
            &["operation", "status"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            Opts::new(
                "router_request_duration_seconds",
                "Router API request latency in seconds",
            )
            .into(),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            registry,
        })
    }

    /// All metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics
            .requests_total
            .with_label_values(&["create", "200"])
            .inc();

        let text = metrics.gather().unwrap();
        assert!(text.contains("# HELP"));
        assert!(text.contains("router_requests_total"));
    }
}
