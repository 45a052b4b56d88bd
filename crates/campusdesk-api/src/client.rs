//! CampusDesk backend HTTP client
//!
//! Generic helper for JSON endpoints. Builds URLs from the configured base,
//! attaches the current bearer token when one is available and maps error
//! statuses to [`ApiError`]. It performs no credential renewal: a 401 from a
//! helper endpoint surfaces to the caller as [`ApiError::Unauthorized`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use campusdesk_api::client::ApiClient;
//! use campusdesk_core::{domain::CredentialPair, ports::InMemoryCredentialStore};
//! use reqwest::Method;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), campusdesk_api::ApiError> {
//! let store = Arc::new(InMemoryCredentialStore::with_credentials(
//!     CredentialPair::new("access", "refresh"),
//! ));
//! let client = ApiClient::new("https://admin.example.edu", store);
//! let status = client
//!     .send_json(client.request(Method::GET, "/api/upload/status"), &CancellationToken::new())
//!     .await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

use std::{future::Future, sync::Arc, time::Duration};

use campusdesk_core::{config::ApiConfig, ports::ICredentialProvider};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ApiError;

/// Error fields the backend uses in failure bodies
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Extracts the server-provided `error` (preferred) or `message` field
///
/// Returns `None` when the body is not JSON or carries neither field.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .filter(|m| !m.is_empty())
        .or(parsed.message.filter(|m| !m.is_empty()))
}

/// Races `fut` against `cancel`, yielding [`ApiError::Cancelled`] if the token fires first
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = fut => result,
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the CampusDesk REST backend
pub struct ApiClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Source of the current bearer token
    credentials: Arc<dyn ICredentialProvider>,
}

impl ApiClient {
    /// Creates a client for `base_url` using a default HTTP client
    ///
    /// # Arguments
    /// * `base_url` - Backend origin, e.g. `https://admin.example.edu`
    /// * `credentials` - Provider of the current tokens
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn ICredentialProvider>) -> Self {
        Self::with_http_client(Client::new(), base_url, credentials)
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_http_client(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn ICredentialProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            credentials,
        }
    }

    /// Creates a client from the `api` configuration section
    ///
    /// Applies the configured per-request timeout.
    pub fn from_config(
        config: &ApiConfig,
        credentials: Arc<dyn ICredentialProvider>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_http_client(client, &config.base_url, credentials))
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the credential provider this client reads tokens from
    pub fn credentials(&self) -> &Arc<dyn ICredentialProvider> {
        &self.credentials
    }

    /// Returns a reference to the underlying HTTP client
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Joins `path` onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates a request builder for the given method and path
    ///
    /// Adds `Authorization: Bearer <token>` only when a token is present.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.credentials.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the JSON body unmodified
    ///
    /// An empty success body yields `Value::Null`.
    ///
    /// # Errors
    /// - [`ApiError::Unauthorized`] on HTTP 401
    /// - [`ApiError::RequestFailed`] on any other non-success status
    /// - [`ApiError::InvalidResponse`] if a success body is not JSON
    /// - [`ApiError::Cancelled`] if `cancel` fires first
    pub async fn send_json(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let response = cancellable(cancel, async { Ok(builder.send().await?) }).await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = cancellable(cancel, async { Ok(response.text().await?) }).await?;

        debug!(path = %url, status = status.as_u16(), "Backend responded");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(
                server_message(&body).unwrap_or_else(|| "Authentication required".to_string()),
            ));
        }

        if !status.is_success() {
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message: server_message(&body).unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                }),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{} returned non-JSON body: {}", url, e)))
    }
}
