//! The edge filter: admission → authentication → forwarding → interception.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tracing::Instrument;

use crate::auth::{
    AuthFailure, CredentialLookup, NonceStore, SignatureContext, SignatureVerifier, VerifierSettings,
};
use crate::config::GatewayConfig;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::interceptor::ResponseInterceptor;
use crate::http::request::InboundRequest;
use crate::observability::metrics;
use crate::security::admission::{AdmissionGuard, InvalidAllowEntry};

/// Per-request progress through the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Received,
    Admitted,
    Authenticated,
    Forwarded,
    Responded,
    Rejected,
}

/// Why the filter refused a request. Attached to the 403 response as an
/// extension; never written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoAdmission,
    Auth(AuthFailure),
}

impl Rejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::NoAdmission => "no-admission",
            Rejection::Auth(failure) => failure.reason(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::NoAdmission => StatusCode::FORBIDDEN,
            Rejection::Auth(failure) => failure.status_code(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.status_code();
        response.extensions_mut().insert(self);
        response
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    AllowList(#[from] InvalidAllowEntry),
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

pub struct EdgeFilter {
    guard: AdmissionGuard,
    verifier: SignatureVerifier,
    interceptor: ResponseInterceptor,
    forwarder: Arc<dyn Forwarder>,
}

impl EdgeFilter {
    pub fn new(
        guard: AdmissionGuard,
        verifier: SignatureVerifier,
        interceptor: ResponseInterceptor,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            guard,
            verifier,
            interceptor,
            forwarder,
        }
    }

    /// Assemble the filter from configuration and injected collaborators.
    pub fn from_config(
        config: &GatewayConfig,
        credentials: Arc<dyn CredentialLookup>,
        nonces: Arc<dyn NonceStore>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, FilterError> {
        let guard = AdmissionGuard::from_config(config.admission.allow_list.as_slice())?;
        let verifier = SignatureVerifier::new(credentials, nonces, VerifierSettings::from(&config.auth));
        Ok(Self::new(guard, verifier, ResponseInterceptor::default(), forwarder))
    }

    /// Run one request through the filter.
    pub async fn handle(&self, request: Request<Body>, source: Option<SocketAddr>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let inbound = InboundRequest::from_parts(&parts, source);
        let request = Request::from_parts(parts, body);

        let span = tracing::info_span!("edge_filter", request_id = %inbound.id);
        self.run(inbound, request).instrument(span).await
    }

    async fn run(&self, inbound: InboundRequest, request: Request<Body>) -> Response<Body> {
        let started = Instant::now();
        inbound.log();
        trace_stage(FilterStage::Received);

        if !self.guard.admit(&inbound.source_ip()).is_allowed() {
            return reject(Rejection::NoAdmission);
        }
        trace_stage(FilterStage::Admitted);

        let verified = match SignatureContext::from_request(&inbound.headers, &inbound.query) {
            Ok(ctx) => self.verifier.verify(&ctx).await,
            Err(failure) => {
                tracing::warn!(reason = failure.reason(), detail = %failure, "Signature rejected");
                metrics::record_auth("rejected", failure.reason());
                Err(failure)
            }
        };
        if let Err(failure) = verified {
            return reject(Rejection::Auth(failure));
        }
        trace_stage(FilterStage::Authenticated);

        let response = match self.forwarder.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Forwarding failed");
                e.into_response()
            }
        };
        trace_stage(FilterStage::Forwarded);

        let response = match self.interceptor.intercept(response, &inbound.id, started) {
            Ok(response) => response,
            Err(degraded) => {
                tracing::error!(
                    error = %degraded.error,
                    "Gateway filter error, forwarding response unobserved"
                );
                metrics::record_degraded();
                degraded.into_response()
            }
        };
        trace_stage(FilterStage::Responded);
        response
    }
}

fn trace_stage(stage: FilterStage) {
    tracing::trace!(stage = ?stage, "Filter stage");
}

fn reject(rejection: Rejection) -> Response<Body> {
    trace_stage(FilterStage::Rejected);
    tracing::info!(reason = rejection.reason(), "Request rejected");
    rejection.into_response()
}
