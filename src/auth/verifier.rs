//! Request signature verification.
//!
//! # Responsibilities
//! - Resolve the caller's credential and reject unknown or revoked keys
//! - Bound the request timestamp to the allowed clock-skew window
//! - Recompute the HMAC over the canonical request and compare in constant time
//! - Consume the nonce atomically so a request is accepted at most once
//!
//! # Design Decisions
//! - Fails closed: every error, including store timeouts, rejects the request
//! - The nonce is consumed only after the signature checks out, so forged
//!   requests cannot burn a legitimate caller's nonces
//! - Store calls carry their own deadline; a timeout is `unavailable-dependency`

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;

use crate::auth::context::SignatureContext;
use crate::auth::credentials::CredentialLookup;
use crate::auth::error::{AuthFailure, StoreError};
use crate::auth::nonce::NonceStore;
use crate::auth::signer;
use crate::config::AuthConfig;
use crate::observability::metrics;

/// Tunables for [`SignatureVerifier`].
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub allowed_skew_secs: u64,
    /// Lifetime of a consumed nonce; never shorter than the skew window.
    pub nonce_ttl: Duration,
    pub dependency_timeout: Duration,
}

impl From<&AuthConfig> for VerifierSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            allowed_skew_secs: config.allowed_skew_secs,
            nonce_ttl: Duration::from_secs(config.nonce_ttl_secs.max(config.allowed_skew_secs)),
            dependency_timeout: Duration::from_millis(config.dependency_timeout_ms),
        }
    }
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

pub struct SignatureVerifier {
    credentials: Arc<dyn CredentialLookup>,
    nonces: Arc<dyn NonceStore>,
    settings: VerifierSettings,
}

impl SignatureVerifier {
    pub fn new(
        credentials: Arc<dyn CredentialLookup>,
        nonces: Arc<dyn NonceStore>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            credentials,
            nonces,
            settings,
        }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Verify against the current wall clock.
    pub async fn verify(&self, ctx: &SignatureContext) -> Result<(), AuthFailure> {
        self.verify_at(ctx, unix_now()).await
    }

    /// Verify with an explicit "now" in seconds since the epoch.
    pub async fn verify_at(&self, ctx: &SignatureContext, now: i64) -> Result<(), AuthFailure> {
        let result = self.check(ctx, now).await;
        match &result {
            Ok(()) => {
                tracing::debug!(access_key = %ctx.access_key, "Signature accepted");
                metrics::record_auth("accepted", "none");
            }
            Err(failure) if failure.is_dependency_failure() => {
                tracing::error!(
                    access_key = %ctx.access_key,
                    reason = failure.reason(),
                    error = %failure,
                    "Authentication dependency unavailable"
                );
                metrics::record_auth("rejected", failure.reason());
            }
            Err(failure) => {
                tracing::warn!(
                    access_key = %ctx.access_key,
                    reason = failure.reason(),
                    detail = %failure,
                    "Signature rejected"
                );
                metrics::record_auth("rejected", failure.reason());
            }
        }
        result
    }

    async fn check(&self, ctx: &SignatureContext, now: i64) -> Result<(), AuthFailure> {
        if ctx.access_key.is_empty() {
            return Err(AuthFailure::MalformedRequest("missing accessKey"));
        }
        if ctx.nonce.is_empty() {
            return Err(AuthFailure::MalformedRequest("missing nonce"));
        }
        if ctx.signature.is_empty() {
            return Err(AuthFailure::MalformedRequest("missing sign"));
        }

        let credential = self
            .bounded("credential-store", self.credentials.resolve(&ctx.access_key))
            .await?
            .ok_or(AuthFailure::UnknownCredential)?;
        if !credential.is_active() {
            return Err(AuthFailure::RevokedCredential);
        }

        if now.abs_diff(ctx.timestamp) > self.settings.allowed_skew_secs {
            return Err(AuthFailure::StaleTimestamp {
                timestamp: ctx.timestamp,
                now,
            });
        }

        let canonical = signer::canonical_string(&ctx.access_key, &ctx.nonce, ctx.timestamp, &ctx.params);
        let expected = signer::digest(credential.secret_key.expose(), &canonical);
        let claimed = hex::decode(ctx.signature.trim()).map_err(|_| AuthFailure::SignatureMismatch)?;
        if !bool::from(expected.as_slice().ct_eq(claimed.as_slice())) {
            return Err(AuthFailure::SignatureMismatch);
        }

        let fresh = self
            .bounded(
                "nonce-store",
                self.nonces.set_if_absent(&ctx.access_key, &ctx.nonce, self.settings.nonce_ttl),
            )
            .await?;
        if !fresh {
            return Err(AuthFailure::ReplayedNonce);
        }

        Ok(())
    }

    async fn bounded<T>(
        &self,
        store: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthFailure> {
        match tokio::time::timeout(self.settings.dependency_timeout, call).await {
            Ok(result) => result.map_err(AuthFailure::from),
            Err(_) => Err(StoreError::Timeout {
                store,
                timeout_ms: self.settings.dependency_timeout.as_millis() as u64,
            }
            .into()),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
