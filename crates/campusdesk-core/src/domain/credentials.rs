//! Credential values shared between the host application and the upload client
//!
//! A [`CredentialPair`] is created at login by the host, replaced by the
//! authentication renewer after a successful refresh exchange, and destroyed
//! when the session is terminated.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token plus the longer-lived refresh token used to renew it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived bearer token sent in the `Authorization` header
    pub access_token: String,
    /// Token exchanged for a new access token; absent for sessions that cannot renew
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    /// Creates a pair with both tokens present
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// Creates a pair that carries no refresh token
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    /// Returns true if a non-empty refresh token is available
    pub fn can_renew(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything the host persists about an authenticated session
///
/// The `user` payload is whatever the auth backend returned alongside the
/// tokens; the upload client never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Opaque user profile returned by the auth backend
    pub user: Option<serde_json::Value>,
    /// Current credentials
    pub credentials: CredentialPair,
    /// When these credentials were stored
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    /// Wraps credentials stored right now
    pub fn new(user: Option<serde_json::Value>, credentials: CredentialPair) -> Self {
        Self {
            user,
            credentials,
            updated_at: Utc::now(),
        }
    }
}
