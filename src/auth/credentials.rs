//! Credential resolution.
//!
//! The gateway only reads credentials. Persistent storage lives behind
//! [`CredentialLookup`]; [`InMemoryCredentialStore`] is the built-in
//! implementation seeded from configuration.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::auth::error::StoreError;
use crate::config::CredentialConfig;

/// Whether a credential may still sign requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    #[default]
    Active,
    Revoked,
}

/// Opaque secret bytes. `Debug` never prints the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub access_key: String,
    pub secret_key: SecretKey,
    pub status: CredentialStatus,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }
}

/// Resolves an access key to its credential. Must be safe for concurrent calls.
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    /// `Ok(None)` means the access key is unknown.
    async fn resolve(&self, access_key: &str) -> Result<Option<Credential>, StoreError>;
}

/// A thread-safe in-memory credential store.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<DashMap<String, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(credentials: &[CredentialConfig]) -> Self {
        let store = Self::new();
        for c in credentials {
            store.insert(Credential {
                access_key: c.access_key.clone(),
                secret_key: SecretKey::new(c.secret_key.as_bytes()),
                status: c.status,
            });
        }
        tracing::info!(count = store.count(), "Credential store loaded");
        store
    }

    pub fn insert(&self, credential: Credential) {
        self.inner.insert(credential.access_key.clone(), credential);
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl CredentialLookup for InMemoryCredentialStore {
    async fn resolve(&self, access_key: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.inner.get(access_key).map(|r| r.value().clone()))
    }
}
