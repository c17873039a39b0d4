//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, InboundRequest)
//!     → [edge filter: admission, authentication]
//!     → forward.rs (upstream client)
//!     → interceptor.rs (observe streamed response)
//!     → Send to client
//! ```

pub mod forward;
pub mod interceptor;
pub mod request;
pub mod server;

pub use forward::{ForwardError, Forwarder, HttpForwarder};
pub use interceptor::{ResponseEvent, ResponseInterceptor};
pub use request::{InboundRequest, X_REQUEST_ID};
pub use server::HttpServer;
