//! Authentication failure taxonomy.
//!
//! Every variant maps to 403 at the edge. The detailed reason is for logs
//! and metrics only and never reaches the client.

use std::time::Duration;

use axum::http::StatusCode;

/// Why a request failed signature verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
    #[error("unknown credential")]
    UnknownCredential,
    #[error("revoked credential")]
    RevokedCredential,
    #[error("timestamp {timestamp} outside skew window (now {now})")]
    StaleTimestamp { timestamp: i64, now: i64 },
    #[error("nonce already consumed")]
    ReplayedNonce,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("dependency unavailable: {0}")]
    UnavailableDependency(#[from] StoreError),
}

impl AuthFailure {
    /// Stable reason label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::MalformedRequest(_) => "malformed-request",
            AuthFailure::UnknownCredential => "unknown-credential",
            AuthFailure::RevokedCredential => "revoked-credential",
            AuthFailure::StaleTimestamp { .. } => "stale-timestamp",
            AuthFailure::ReplayedNonce => "replayed-nonce",
            AuthFailure::SignatureMismatch => "signature-mismatch",
            AuthFailure::UnavailableDependency(_) => "unavailable-dependency",
        }
    }

    /// All authentication failures surface identically to the caller.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    /// Dependency failures are alerted on separately from caller mistakes.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, AuthFailure::UnavailableDependency(_))
    }
}

/// Failure talking to an external store (credential store or nonce cache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{store} call timed out after {timeout_ms}ms")]
    Timeout { store: &'static str, timeout_ms: u64 },
    #[error("{store} unreachable: {message}")]
    Unreachable { store: &'static str, message: String },
    #[error("nonce TTL {0:?} is out of range")]
    InvalidTtl(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_stable() {
        assert_eq!(AuthFailure::MalformedRequest("missing sign").reason(), "malformed-request");
        assert_eq!(AuthFailure::ReplayedNonce.reason(), "replayed-nonce");
        assert_eq!(
            AuthFailure::StaleTimestamp { timestamp: 0, now: 1000 }.reason(),
            "stale-timestamp"
        );
        let timeout = StoreError::Timeout { store: "nonce-store", timeout_ms: 10 };
        assert_eq!(AuthFailure::from(timeout).reason(), "unavailable-dependency");
    }

    #[test]
    fn test_every_failure_is_forbidden() {
        let failures = [
            AuthFailure::MalformedRequest("x"),
            AuthFailure::UnknownCredential,
            AuthFailure::RevokedCredential,
            AuthFailure::ReplayedNonce,
            AuthFailure::SignatureMismatch,
            AuthFailure::UnavailableDependency(StoreError::Unreachable {
                store: "credential-store",
                message: "down".into(),
            }),
        ];
        for failure in failures {
            assert_eq!(failure.status_code(), StatusCode::FORBIDDEN);
        }
    }
}
