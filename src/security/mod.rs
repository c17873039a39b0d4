//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admission.rs (source address allow-list)
//!     → auth (signature verification)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod admission;

pub use admission::{AdmissionDecision, AdmissionGuard, AllowEntry};
