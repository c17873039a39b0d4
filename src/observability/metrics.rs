//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_admission_total` (counter): admission decisions by `decision`
//! - `gateway_auth_total` (counter): verification results by `outcome`, `reason`
//! - `gateway_responses_total` (counter): responses by `outcome`, `status`, `cancelled`, `failed`
//! - `gateway_response_duration_seconds` (histogram): admission to stream end
//! - `gateway_response_bytes` (histogram): bytes forwarded per success response
//! - `gateway_inspection_errors_total` (counter): chunks forwarded after inspector failure
//! - `gateway_degraded_total` (counter): responses forwarded without observation
//! - `gateway_probe_total` (counter): upstream probe results by `result`

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::http::interceptor::ResponseEvent;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(decision: &'static str) {
    counter!("gateway_admission_total", "decision" => decision).increment(1);
}

pub fn record_auth(outcome: &'static str, reason: &'static str) {
    counter!("gateway_auth_total", "outcome" => outcome, "reason" => reason).increment(1);
}

pub fn record_response(event: &ResponseEvent) {
    let outcome = event.outcome.as_str();
    counter!(
        "gateway_responses_total",
        "outcome" => outcome,
        "status" => event.status.to_string(),
        "cancelled" => if event.cancelled { "true" } else { "false" },
        "failed" => if event.failed { "true" } else { "false" }
    )
    .increment(1);
    histogram!("gateway_response_duration_seconds", "outcome" => outcome).record(event.elapsed.as_secs_f64());
    if event.bytes > 0 {
        histogram!("gateway_response_bytes").record(event.bytes as f64);
    }
}

pub fn record_inspection_error() {
    counter!("gateway_inspection_errors_total").increment(1);
}

pub fn record_degraded() {
    counter!("gateway_degraded_total").increment(1);
}

pub fn record_probe(result: &'static str) {
    counter!("gateway_probe_total", "result" => result).increment(1);
}
