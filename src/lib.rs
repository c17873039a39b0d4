//! Edge filter for an API gateway: source admission, signed-request
//! authentication with replay protection, and streaming response observation.

pub mod auth;
pub mod config;
pub mod filter;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use filter::EdgeFilter;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
