//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::credentials::CredentialStatus;

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The forwarding stage every authenticated request is handed to.
    pub upstream: UpstreamConfig,

    /// Source address allow-list.
    pub admission: AdmissionConfig,

    /// Signature verification settings.
    pub auth: AuthConfig,

    /// Credentials seeded into the in-memory credential store.
    pub credentials: Vec<CredentialConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upstream smoke probe.
    pub probe: ProbeConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream (forwarding stage) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Admission control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Literal addresses ("10.0.0.7", "::1") or CIDR ranges ("10.0.0.0/8").
    pub allow_list: Vec<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            allow_list: vec!["127.0.0.1".to_string()],
        }
    }
}

/// Request signature verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Maximum distance between the request timestamp and now, in seconds.
    pub allowed_skew_secs: u64,

    /// How long a consumed nonce is remembered, in seconds.
    /// The effective TTL is never shorter than `allowed_skew_secs`.
    pub nonce_ttl_secs: u64,

    /// Deadline for each credential store / nonce store call, in milliseconds.
    pub dependency_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_skew_secs: 300,
            nonce_ttl_secs: 300,
            dependency_timeout_ms: 500,
        }
    }
}

/// A credential seeded into the in-memory credential store.
#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub status: CredentialStatus,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("status", &self.status)
            .finish()
    }
}

/// Timeout configuration for the HTTP layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (time until response headers are produced) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Upstream smoke probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Enable the probe.
    pub enabled: bool,

    /// Path requested on the upstream.
    pub path: String,

    /// Interval between probes in milliseconds.
    pub interval_ms: u64,

    /// Probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/health".to_string(),
            interval_ms: 1000,
            timeout_ms: 2000,
        }
    }
}
