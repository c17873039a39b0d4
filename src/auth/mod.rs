//! Request authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers + query
//!     → context.rs (SignatureContext: accessKey, nonce, timestamp, sign)
//!     → verifier.rs
//!         → credentials.rs (resolve access key → secret, status)
//!         → timestamp skew window
//!         → signer.rs (canonical string, HMAC-SHA256, constant-time compare)
//!         → nonce.rs (atomic set-if-absent)
//!     → accepted | AuthFailure(reason)
//! ```
//!
//! # Design Decisions
//! - Stores are injected capability traits so tests use in-memory fakes
//! - All failures are 403 to the caller; reasons are logged only

pub mod context;
pub mod credentials;
pub mod error;
pub mod nonce;
pub mod signer;
pub mod verifier;

pub use context::SignatureContext;
pub use credentials::{Credential, CredentialLookup, CredentialStatus, InMemoryCredentialStore, SecretKey};
pub use error::{AuthFailure, StoreError};
pub use nonce::{InMemoryNonceStore, NonceStore};
pub use verifier::{SignatureVerifier, VerifierSettings};
