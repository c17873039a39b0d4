//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the edge filter as the only handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener
//! - Purge expired nonces from the built-in store while serving
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{InMemoryCredentialStore, InMemoryNonceStore, VerifierSettings};
use crate::config::GatewayConfig;
use crate::filter::{EdgeFilter, FilterError};
use crate::http::forward::HttpForwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub filter: Arc<EdgeFilter>,
}

/// HTTP server for the edge gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    /// Set when the server owns the in-memory nonce store and must purge it.
    nonces: Option<InMemoryNonceStore>,
}

impl HttpServer {
    /// Create a server with the built-in stores and upstream forwarder.
    pub fn new(config: GatewayConfig) -> Result<Self, FilterError> {
        let credentials = Arc::new(InMemoryCredentialStore::from_config(&config.credentials));
        let nonces = InMemoryNonceStore::new();
        let forwarder = Arc::new(HttpForwarder::new(&config.upstream)?);
        let filter = EdgeFilter::from_config(&config, credentials, Arc::new(nonces.clone()), forwarder)?;
        let mut server = Self::with_filter(config, Arc::new(filter));
        server.nonces = Some(nonces);
        Ok(server)
    }

    /// Create a server around an already assembled filter.
    pub fn with_filter(config: GatewayConfig, filter: Arc<EdgeFilter>) -> Self {
        let router = Self::build_router(&config, AppState { filter });
        Self {
            router,
            config,
            nonces: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The router, for serving without a listener (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let purge = self.nonces.map(|store| {
            let every = VerifierSettings::from(&self.config.auth).nonce_ttl.max(Duration::from_secs(1));
            tokio::spawn(store.run_purge(every, shutdown.resubscribe()))
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(purge) = purge {
            let _ = purge.await;
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request passes through the edge filter before reaching the upstream.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let source = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.filter.handle(request, source).await
}
