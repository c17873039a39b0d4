//! Hand-off to the forwarding stage.
//!
//! # Responsibilities
//! - Define the [`Forwarder`] seam the edge filter delegates to
//! - Provide the default hyper client forwarder to a single upstream
//!
//! # Design Decisions
//! - The upstream body is streamed back, never buffered
//! - The request signature is stripped before leaving the gateway
//! - Upstream failures map to 502, upstream timeouts to 504

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::auth::context::SIGN_HEADER;
use crate::config::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ForwardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// The routing/forwarding stage that runs after the edge filter.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError>;
}

/// Forwards every request to one upstream over plain HTTP.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ForwardError> {
        let authority = Authority::from_str(&config.address)
            .map_err(|_| ForwardError::InvalidUpstream(config.address.clone()))?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn upstream_uri(&self, original: &Uri) -> Uri {
        let mut parts = original.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).unwrap_or_else(|_| original.clone())
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.upstream_uri(&parts.uri);
        parts.headers.remove(SIGN_HEADER);
        if let Ok(host) = HeaderValue::from_str(self.authority.as_str()) {
            parts.headers.insert(axum::http::header::HOST, host);
        }

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(request_id = %request_id, uri = %parts.uri, "Forwarding upstream");

        let request = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ForwardError::Timeout(self.timeout)),
        };

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
