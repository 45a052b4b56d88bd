//! CampusDesk API - Resilient upload client for the CampusDesk backend
//!
//! Provides async components for:
//! - Generic authenticated JSON requests against the REST backend
//! - Multipart uploads with one-shot credential renewal on HTTP 401
//! - Refresh-token exchange with single-flight coalescing
//! - Session termination when renewal is impossible
//!
//! ## Modules
//!
//! - [`client`] - Generic HTTP helper (`ApiClient`)
//! - [`auth`] - Refresh-token exchange (`AuthenticationRenewer`)
//! - [`session`] - Session termination (`SessionTerminator`)
//! - [`upload`] - Upload / storage operations (`UploadGateway`)
//! - [`store`] - Keyring-backed credential persistence

pub mod auth;
pub mod client;
pub mod session;
pub mod store;
pub mod upload;

use campusdesk_core::domain::DomainError;
use thiserror::Error;

/// Semantic category of an [`ApiError`]
///
/// Callers branch on the kind rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before any request was sent
    Validation,
    /// The upload endpoint rejected the payload, or the post-renewal retry failed
    UploadFailed,
    /// Authenticated upload got 401 and the session could not be renewed
    AuthExpired,
    /// The refresh-token exchange failed
    RenewalFailed,
    /// A non-upload endpoint answered 401
    Unauthorized,
    /// A non-upload endpoint answered with another error status
    RequestFailed,
    /// A response body could not be parsed
    Parse,
    /// Transport-level failure
    Network,
    /// The caller cancelled the operation
    Cancelled,
    /// Credentials could not be read from or written to secure storage
    CredentialStore,
}

/// Errors that can occur when talking to the CampusDesk backend
///
/// Upload-path variants display the bare message (usually sourced from the
/// server) so it can be shown to users as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input validation failed (e.g. no file supplied)
    #[error("{0}")]
    Validation(String),

    /// The upload was rejected or the retry after renewal failed
    #[error("{0}")]
    UploadFailed(String),

    /// The first attempt was rejected with 401 and renewal failed;
    /// carries the first attempt's error message
    #[error("{0}")]
    AuthExpired(String),

    /// The refresh-token exchange failed
    #[error("Token refresh failed: {0}")]
    RenewalFailed(String),

    /// A non-upload endpoint rejected the credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A non-upload endpoint answered with a non-success status
    #[error("Request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code
        status: u16,
        /// Server-provided or generic message
        message: String,
    },

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The operation was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Secure credential storage failed
    #[error("Credential store error: {0}")]
    CredentialStore(String),
}

impl ApiError {
    /// Returns the semantic category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::UploadFailed(_) => ErrorKind::UploadFailed,
            ApiError::AuthExpired(_) => ErrorKind::AuthExpired,
            ApiError::RenewalFailed(_) => ErrorKind::RenewalFailed,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::RequestFailed { .. } => ErrorKind::RequestFailed,
            ApiError::InvalidResponse(_) => ErrorKind::Parse,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Cancelled => ErrorKind::Cancelled,
            ApiError::CredentialStore(_) => ErrorKind::CredentialStore,
        }
    }

    /// Returns true if the session was terminated while handling this error
    pub fn ended_session(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthExpired | ErrorKind::RenewalFailed)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Validation(err.to_string())
    }
}
