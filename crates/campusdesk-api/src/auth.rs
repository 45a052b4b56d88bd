//! Credential renewal for the CampusDesk backend
//!
//! This module provides:
//! - [`ITokenRenewer`] - The seam the upload gateway renews credentials through
//! - [`AuthenticationRenewer`] - Refresh-token exchange against `/api/auth/refresh`
//!
//! ## Single-flight
//!
//! Concurrent renewals presenting the same refresh token share one exchange:
//! the first caller starts it, later callers await the same shared future and
//! observe the same outcome. The slot only holds an exchange while it is
//! pending. Once it resolves, success or failure, the next renewal starts a
//! new exchange.
//!
//! A caller whose refresh token was already rotated away by an earlier
//! exchange receives the access token currently stored, without a second
//! network call. A backend that does not rotate refresh tokens therefore gets
//! one exchange per expiry.
//!
//! On failure the renewer ends the session through [`SessionTerminator`]
//! exactly once per exchange.

use std::sync::Arc;

use async_trait::async_trait;
use campusdesk_core::{domain::CredentialPair, ports::ICredentialProvider};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{client::ApiClient, session::SessionTerminator, ApiError};

/// Path of the refresh-token exchange endpoint
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait ITokenRenewer: Send + Sync {
    /// Returns a fresh access token for `refresh_token`
    ///
    /// # Errors
    /// [`ApiError::RenewalFailed`] if no token could be obtained. The session
    /// has already been terminated when this is returned.
    async fn renew(&self, refresh_token: &str) -> Result<String, ApiError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    success: bool,
    data: Option<RefreshData>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    user: Option<Value>,
    token: Option<String>,
    refresh_token: Option<String>,
}

impl RefreshResponse {
    fn failure_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.is_empty())
    }
}

// ============================================================================
// AuthenticationRenewer
// ============================================================================

type RenewalOutcome = Shared<BoxFuture<'static, Result<String, String>>>;

/// Exchange started for one refresh token
struct InFlightRenewal {
    refresh_token: String,
    outcome: RenewalOutcome,
}

/// State shared with the spawned exchange future
struct RenewerInner {
    client: Client,
    endpoint: String,
    credentials: Arc<dyn ICredentialProvider>,
    terminator: Arc<SessionTerminator>,
}

/// Renews credentials against the backend's refresh endpoint
///
/// On success the credential provider holds the new pair (and user payload).
/// On failure the session is terminated and [`ApiError::RenewalFailed`] is
/// returned.
pub struct AuthenticationRenewer {
    inner: Arc<RenewerInner>,
    in_flight: Mutex<Option<InFlightRenewal>>,
}

impl AuthenticationRenewer {
    /// Creates a renewer that reuses `api`'s HTTP client, base URL and credentials
    pub fn new(api: &ApiClient, terminator: Arc<SessionTerminator>) -> Self {
        Self {
            inner: Arc::new(RenewerInner {
                client: api.http_client().clone(),
                endpoint: api.url(REFRESH_PATH),
                credentials: api.credentials().clone(),
                terminator,
            }),
            in_flight: Mutex::new(None),
        }
    }

    /// Returns the terminator used when renewal fails
    pub fn terminator(&self) -> &Arc<SessionTerminator> {
        &self.inner.terminator
    }

    /// Exchanges `refresh_token` for a new access token
    ///
    /// An empty refresh token terminates the session immediately without a
    /// network call.
    ///
    /// # Arguments
    /// * `refresh_token` - The refresh token the caller's request was made under
    ///
    /// # Returns
    /// The new access token
    pub async fn renew(&self, refresh_token: &str) -> Result<String, ApiError> {
        if refresh_token.is_empty() {
            warn!("No refresh token available");
            self.inner.terminator.terminate("No refresh token available");
            return Err(ApiError::RenewalFailed(
                "No refresh token available".to_string(),
            ));
        }

        let outcome = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(flight)
                    if flight.refresh_token == refresh_token && flight.outcome.peek().is_none() =>
                {
                    debug!("Joining in-flight token renewal");
                    flight.outcome.clone()
                }
                _ => {
                    if let Some(access_token) = self.rotated_access_token(refresh_token) {
                        debug!("Refresh token already rotated, reusing renewed access token");
                        return Ok(access_token);
                    }
                    let inner = self.inner.clone();
                    let token = refresh_token.to_string();
                    let outcome = async move { inner.exchange(&token).await }
                        .boxed()
                        .shared();
                    *slot = Some(InFlightRenewal {
                        refresh_token: refresh_token.to_string(),
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        let result = outcome.clone().await;

        // Only evict the exchange this caller awaited, never a newer one
        {
            let mut slot = self.in_flight.lock().await;
            if slot
                .as_ref()
                .is_some_and(|flight| flight.outcome.ptr_eq(&outcome))
            {
                *slot = None;
            }
        }

        result.map_err(ApiError::RenewalFailed)
    }

    /// Access token stored after `refresh_token` was rotated to a newer one
    fn rotated_access_token(&self, refresh_token: &str) -> Option<String> {
        let current = self.inner.credentials.credentials()?;
        match current.refresh_token.as_deref() {
            Some(stored) if stored != refresh_token => Some(current.access_token),
            _ => None,
        }
    }
}

#[async_trait]
impl ITokenRenewer for AuthenticationRenewer {
    async fn renew(&self, refresh_token: &str) -> Result<String, ApiError> {
        AuthenticationRenewer::renew(self, refresh_token).await
    }
}

impl RenewerInner {
    /// Runs one exchange and applies its outcome to the session
    async fn exchange(&self, refresh_token: &str) -> Result<String, String> {
        info!("Refreshing access token");

        match self.request_tokens(refresh_token).await {
            Ok((user, credentials)) => {
                let access_token = credentials.access_token.clone();
                self.credentials.set_credentials(user, credentials);
                info!("Successfully refreshed access token");
                Ok(access_token)
            }
            Err(message) => {
                warn!(error = %message, "Token refresh failed");
                self.terminator.terminate(&message);
                Err(message)
            }
        }
    }

    async fn request_tokens(
        &self,
        refresh_token: &str,
    ) -> Result<(Option<Value>, CredentialPair), String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| format!("Refresh request failed: {}", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read refresh response: {}", e))?;
        let payload: Option<RefreshResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            return Err(payload
                .and_then(RefreshResponse::failure_message)
                .unwrap_or_else(|| format!("Refresh endpoint returned status {}", status.as_u16())));
        }

        let payload = payload.ok_or_else(|| "Malformed refresh response".to_string())?;
        if !payload.success {
            return Err(payload
                .failure_message()
                .unwrap_or_else(|| "Token refresh was rejected".to_string()));
        }

        let data = payload
            .data
            .ok_or_else(|| "Refresh response has no data".to_string())?;
        let access_token = data
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "Refresh response has no access token".to_string())?;

        // The backend may omit the refresh token when it does not rotate it
        let next_refresh = data
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok((data.user, CredentialPair::new(access_token, next_refresh)))
    }
}
