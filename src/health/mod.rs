//! Upstream health subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → probe.rs: one immediate probe of the upstream
//!     → then one probe per interval until shutdown
//!     → result logged + gateway_probe_total
//! ```
//!
//! # Design Decisions
//! - The probe never gates traffic; it is a smoke signal for operators
//! - Every probe has its own timeout

pub mod probe;

pub use probe::UpstreamProbe;
