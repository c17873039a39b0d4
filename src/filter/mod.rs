//! Edge filter subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → edge.rs
//!         → security::admission (reject early: no-admission)
//!         → auth::verifier      (reject early: auth-failure)
//!         → http::forward       (external forwarding stage)
//!         → http::interceptor   (observe the streamed response)
//!     → client
//! ```
//!
//! # Design Decisions
//! - One place maps rejections to HTTP status (403, empty body)
//! - Admission and authentication fail closed; response observation
//!   degrades to plain forwarding

pub mod edge;

pub use edge::{EdgeFilter, FilterError, FilterStage, Rejection};
