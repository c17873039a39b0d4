//! Request identification and the filter's view of an inbound request.
//!
//! # Responsibilities
//! - Assign a unique request ID (UUID v4) unless the client sent one
//! - Capture the immutable request facts the filter decides on
//! - Emit the inbound request log line
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The original request is forwarded; the filter only borrows its facts

use std::net::SocketAddr;

use axum::http::{request::Parts, HeaderMap, HeaderName, Method, Uri};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use url::form_urlencoded;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns `x-request-id` to requests lacking one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Immutable facts about a request, captured when it reaches the filter.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub id: String,
    pub method: Method,
    pub uri: Uri,
    /// Query parameters in arrival order; keys may repeat.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub source: Option<SocketAddr>,
}

impl InboundRequest {
    pub fn from_parts(parts: &Parts, source: Option<SocketAddr>) -> Self {
        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let query = parts
            .uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            id,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            query,
            headers: parts.headers.clone(),
            source,
        }
    }

    /// Source IP as text, or empty when the transport did not report one.
    pub fn source_ip(&self) -> String {
        self.source.map(|addr| addr.ip().to_string()).unwrap_or_default()
    }

    pub fn log(&self) {
        tracing::info!(
            request_id = %self.id,
            method = %self.method,
            uri = %self.uri,
            query = ?self.query,
            source = %self.source_ip(),
            "Inbound request"
        );
    }
}
