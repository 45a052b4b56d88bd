//! Credential provider port (driven/secondary port)
//!
//! The host application owns the credential pair. The upload client reads it
//! when building requests and, through the authentication renewer only,
//! replaces it after a refresh exchange or clears it when the session ends.
//!
//! ## Design Notes
//!
//! - Methods are synchronous and infallible: implementations are expected to
//!   keep the current pair in memory and treat persistence failures as their
//!   own concern (log and continue).
//! - Implementations must be shareable across tasks (`Send + Sync`).

use std::sync::RwLock;

use crate::domain::credentials::{CredentialPair, StoredSession};

/// Port trait for reading and mutating the current credentials
pub trait ICredentialProvider: Send + Sync {
    /// Current bearer token, if the user is signed in
    fn access_token(&self) -> Option<String>;

    /// Current refresh token, if one was issued
    fn refresh_token(&self) -> Option<String>;

    /// Replaces the stored session with renewed credentials
    ///
    /// # Arguments
    /// * `user` - Opaque user profile returned alongside the tokens
    /// * `credentials` - The new credential pair
    fn set_credentials(&self, user: Option<serde_json::Value>, credentials: CredentialPair);

    /// Removes all stored credentials
    fn clear(&self);

    /// Snapshot of both tokens, `None` when signed out
    fn credentials(&self) -> Option<CredentialPair> {
        self.access_token().map(|access_token| CredentialPair {
            access_token,
            refresh_token: self.refresh_token(),
        })
    }
}

// ============================================================================
// InMemoryCredentialStore
// ============================================================================

/// Process-local credential store
///
/// Suitable for hosts that manage persistence elsewhere, and for tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: RwLock<Option<StoredSession>>,
}

impl InMemoryCredentialStore {
    /// Creates an empty (signed-out) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding `credentials`
    pub fn with_credentials(credentials: CredentialPair) -> Self {
        Self {
            session: RwLock::new(Some(StoredSession::new(None, credentials))),
        }
    }

    /// Returns a copy of the stored session, including the user payload
    pub fn session(&self) -> Option<StoredSession> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ICredentialProvider for InMemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.session()
            .map(|s| s.credentials.access_token)
            .filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.session()
            .and_then(|s| s.credentials.refresh_token)
            .filter(|t| !t.is_empty())
    }

    fn set_credentials(&self, user: Option<serde_json::Value>, credentials: CredentialPair) {
        let mut guard = self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(StoredSession::new(user, credentials));
    }

    fn clear(&self) {
        let mut guard = self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}
