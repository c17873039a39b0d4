//! Periodic upstream smoke probe.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::{ProbeConfig, UpstreamConfig};
use crate::observability::metrics;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Healthy { status: u16, body: String },
    Unhealthy { status: u16 },
    Unreachable(String),
    TimedOut,
}

pub struct UpstreamProbe {
    upstream: String,
    config: ProbeConfig,
    client: Client<HttpConnector, Body>,
}

impl UpstreamProbe {
    pub fn new(upstream: &UpstreamConfig, config: ProbeConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            upstream: upstream.address.clone(),
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Upstream probe disabled");
            return;
        }

        tracing::info!(
            upstream = %self.upstream,
            path = %self.config.path,
            interval_ms = self.config.interval_ms,
            "Upstream probe starting"
        );

        // First tick fires immediately.
        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Upstream probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn probe_once(&self) -> ProbeResult {
        let uri = format!("http://{}{}", self.upstream, self.config.path);
        let request = match Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "edge-gateway-probe")
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(uri = %uri, error = %e, "Failed to build probe request");
                return ProbeResult::Unreachable(e.to_string());
            }
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let result = match time::timeout(timeout, self.fetch(request)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::TimedOut,
        };

        match &result {
            ProbeResult::Healthy { status, body } => {
                tracing::info!(upstream = %self.upstream, status, body = %body, "Probe response received");
                metrics::record_probe("healthy");
            }
            ProbeResult::Unhealthy { status } => {
                tracing::warn!(upstream = %self.upstream, status, "Probe failed: non-success status");
                metrics::record_probe("unhealthy");
            }
            ProbeResult::Unreachable(e) => {
                tracing::warn!(upstream = %self.upstream, error = %e, "Probe failed: connection error");
                metrics::record_probe("unreachable");
            }
            ProbeResult::TimedOut => {
                tracing::warn!(upstream = %self.upstream, "Probe failed: timeout");
                metrics::record_probe("timeout");
            }
        }
        result
    }

    async fn fetch(&self, request: Request<Body>) -> ProbeResult {
        let response = match self.client.request(request).await {
            Ok(response) => response,
            Err(e) => return ProbeResult::Unreachable(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return ProbeResult::Unhealthy { status: status.as_u16() };
        }

        let body = Body::new(response.into_body());
        match axum::body::to_bytes(body, 64 * 1024).await {
            Ok(bytes) => ProbeResult::Healthy {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            },
            Err(e) => ProbeResult::Unreachable(e.to_string()),
        }
    }
}
