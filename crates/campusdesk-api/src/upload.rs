//! File upload and storage operations
//!
//! [`UploadGateway`] sends files to `POST /api/upload` as multipart form data
//! (`file`, `folder`) and exposes the helper storage endpoints.
//!
//! ## Renewal protocol
//!
//! 1. Snapshot the credential pair and send the request with the access token.
//! 2. On HTTP 401, if a token was sent, renew once through [`ITokenRenewer`]
//!    using the snapshot's refresh token.
//! 3. Retry exactly once with the renewed token. The retry's outcome is final.
//! 4. If renewal fails the session has ended and the caller receives
//!    [`ApiError::AuthExpired`] carrying the first attempt's message.
//!
//! Each attempt builds its own multipart body from the reference-counted file
//! content, so a retry never depends on the first body's state.

use std::sync::Arc;

use campusdesk_core::{
    config::UploadConfig,
    domain::{
        PresignedUrl, UploadAttempt, UploadFile, UploadRequest, UploadResult, UploadState,
        DEFAULT_UPLOAD_FOLDER,
    },
};
use futures_util::{stream, StreamExt, TryStreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{
    multipart::{Form, Part},
    Body, Method, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    auth::ITokenRenewer,
    client::{cancellable, ApiClient},
    ApiError,
};

/// Upload endpoint, also used for `DELETE`
pub const UPLOAD_PATH: &str = "/api/upload";
const STATUS_PATH: &str = "/api/upload/status";
const TEST_PATH: &str = "/api/upload/test";
const PRESIGNED_PATH: &str = "/api/upload/presigned-url";
const PROXY_PATH: &str = "/api/upload/proxy/";

/// Default number of uploads a batch keeps in flight
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Characters left intact by URI-component encoding
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes a storage key for use in a path segment or query value
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, URI_COMPONENT).to_string()
}

/// Builds the proxy URL for `key` under `base_url`
pub fn proxy_url(base_url: &str, key: &str) -> String {
    format!(
        "{}{}{}",
        base_url.trim_end_matches('/'),
        PROXY_PATH,
        encode_key(key)
    )
}

// ============================================================================
// Response interpretation
// ============================================================================

/// Standard backend response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn failure_message(&mut self) -> Option<String> {
        self.error
            .take()
            .filter(|m| !m.is_empty())
            .or_else(|| self.message.take().filter(|m| !m.is_empty()))
    }
}

/// What a single upload request produced
#[derive(Debug, PartialEq)]
enum AttemptOutcome {
    /// The file was stored
    Stored(UploadResult),
    /// The server refused the upload
    Rejected { status: StatusCode, message: String },
}

fn fallback_message(status: StatusCode) -> String {
    format!("Upload failed with status {}", status.as_u16())
}

/// Maps an upload response to an outcome
///
/// A 2xx answer only counts as stored when the envelope reports success and
/// carries both `url` and `key`.
fn interpret_upload_response(status: StatusCode, body: &str) -> AttemptOutcome {
    let envelope: Option<Envelope<UploadResult>> = serde_json::from_str(body).ok();

    let Some(mut envelope) = envelope else {
        return AttemptOutcome::Rejected {
            status,
            message: fallback_message(status),
        };
    };

    if status.is_success() && envelope.success {
        if let Some(result) = envelope.data.take().filter(UploadResult::is_complete) {
            return AttemptOutcome::Stored(result);
        }
        return AttemptOutcome::Rejected {
            status,
            message: envelope
                .failure_message()
                .unwrap_or_else(|| "Upload response did not identify a stored file".to_string()),
        };
    }

    AttemptOutcome::Rejected {
        status,
        message: envelope
            .failure_message()
            .unwrap_or_else(|| fallback_message(status)),
    }
}

/// Builds a fresh multipart body for one attempt
fn build_form(request: &UploadRequest) -> Result<Form, ApiError> {
    let file = request.file();
    let part = Part::stream_with_length(Body::from(file.content()), file.size())
        .file_name(file.name().to_string())
        .mime_str(file.mime_type())?;

    Ok(Form::new()
        .part("file", part)
        .text("folder", request.folder().to_string()))
}

/// Records a state change on `attempt`
fn advance(attempt: &mut UploadAttempt, target: UploadState) {
    let from = attempt.state();
    match attempt.transition_to(target) {
        Ok(()) => debug!(from = %from, to = %target, "Upload state changed"),
        Err(e) => warn!(error = %e, "Ignoring invalid upload state change"),
    }
}

// ============================================================================
// UploadGateway
// ============================================================================

/// Uploads files and manages stored objects
pub struct UploadGateway {
    api: Arc<ApiClient>,
    renewer: Arc<dyn ITokenRenewer>,
    default_folder: String,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl UploadGateway {
    /// Creates a gateway with the default folder and batch width
    pub fn new(api: Arc<ApiClient>, renewer: Arc<dyn ITokenRenewer>) -> Self {
        Self {
            api,
            renewer,
            default_folder: DEFAULT_UPLOAD_FOLDER.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cancel: CancellationToken::new(),
        }
    }

    /// Applies the `upload` configuration section
    pub fn with_upload_config(mut self, config: &UploadConfig) -> Self {
        self.default_folder = config.default_folder.clone();
        self.max_concurrent = config.max_concurrent.max(1);
        self
    }

    /// Ties every operation of this gateway to `token`
    ///
    /// Cancelling it aborts in-flight uploads and helper requests.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Folder used when callers do not name one
    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    /// Uploads a single file
    ///
    /// # Arguments
    /// * `file` - The payload to upload
    /// * `folder` - Destination folder; `None` or empty selects the default
    ///
    /// # Errors
    /// - [`ApiError::Validation`] if the file has no name (no request is sent)
    /// - [`ApiError::UploadFailed`] if the server rejects the upload or the
    ///   retry after renewal fails
    /// - [`ApiError::AuthExpired`] if renewal failed; the session has ended
    pub async fn upload_file(
        &self,
        file: &UploadFile,
        folder: Option<&str>,
    ) -> Result<UploadResult, ApiError> {
        self.upload_file_with_cancel(file, folder, &self.cancel)
            .await
    }

    /// Uploads a single file, aborting when `cancel` fires
    pub async fn upload_file_with_cancel(
        &self,
        file: &UploadFile,
        folder: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, ApiError> {
        file.validate()?;

        let snapshot = self.api.credentials().credentials();
        let request = UploadRequest::new(
            file.clone(),
            folder,
            &self.default_folder,
            snapshot.as_ref().map(|c| c.access_token.clone()),
        );
        let mut attempt = UploadAttempt::new();

        info!(
            file = file.name(),
            folder = request.folder(),
            size = file.size(),
            "Uploading file"
        );

        let first_message = match self
            .send_attempt(&request, &mut attempt, UploadState::Sent, cancel)
            .await
        {
            Ok(AttemptOutcome::Stored(result)) => {
                advance(&mut attempt, UploadState::Succeeded);
                info!(key = %result.key, "Upload complete");
                return Ok(result);
            }
            Ok(AttemptOutcome::Rejected { status, message })
                if status == StatusCode::UNAUTHORIZED && request.is_authenticated() =>
            {
                message
            }
            Ok(AttemptOutcome::Rejected { status, message }) => {
                advance(&mut attempt, UploadState::Failed);
                warn!(status = status.as_u16(), error = %message, "Upload rejected");
                return Err(ApiError::UploadFailed(message));
            }
            Err(e) => {
                advance(&mut attempt, UploadState::Failed);
                return Err(e);
            }
        };

        advance(&mut attempt, UploadState::AuthExpired);
        warn!(file = file.name(), "Upload unauthorized, renewing credentials");
        advance(&mut attempt, UploadState::Renewing);

        let refresh_token = snapshot
            .and_then(|c| c.refresh_token)
            .unwrap_or_default();
        let renewed = match cancellable(cancel, self.renewer.renew(&refresh_token)).await {
            Ok(token) => token,
            Err(ApiError::Cancelled) => {
                advance(&mut attempt, UploadState::Failed);
                return Err(ApiError::Cancelled);
            }
            Err(e) => {
                advance(&mut attempt, UploadState::Logout);
                warn!(error = %e, "Credential renewal failed, session ended");
                return Err(ApiError::AuthExpired(first_message));
            }
        };

        let retry = request.with_token(renewed);
        match self
            .send_attempt(&retry, &mut attempt, UploadState::Retrying, cancel)
            .await
        {
            Ok(AttemptOutcome::Stored(result)) => {
                advance(&mut attempt, UploadState::Succeeded);
                info!(key = %result.key, "Upload complete after renewal");
                Ok(result)
            }
            Ok(AttemptOutcome::Rejected { status, message }) => {
                advance(&mut attempt, UploadState::Failed);
                warn!(status = status.as_u16(), error = %message, "Retry after renewal rejected");
                Err(ApiError::UploadFailed(message))
            }
            Err(ApiError::Cancelled) => {
                advance(&mut attempt, UploadState::Failed);
                Err(ApiError::Cancelled)
            }
            Err(e) => {
                advance(&mut attempt, UploadState::Failed);
                warn!(error = %e, "Retry after renewal failed");
                Err(ApiError::UploadFailed(e.to_string()))
            }
        }
    }

    /// Sends one attempt and interprets the response
    async fn send_attempt(
        &self,
        request: &UploadRequest,
        attempt: &mut UploadAttempt,
        state: UploadState,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, ApiError> {
        let form = build_form(request)?;
        let mut builder = self
            .api
            .http_client()
            .post(self.api.url(UPLOAD_PATH))
            .multipart(form);
        if let Some(token) = request.auth_token() {
            builder = builder.bearer_auth(token);
        }

        advance(attempt, state);
        let response = cancellable(cancel, async { Ok(builder.send().await?) }).await?;
        let status = response.status();
        let body = cancellable(cancel, async { Ok(response.text().await?) }).await?;
        debug!(status = status.as_u16(), "Upload endpoint responded");

        Ok(interpret_upload_response(status, &body))
    }

    /// Uploads several files into one folder
    ///
    /// Results are returned in input order. Up to the configured number of
    /// uploads run at once; the first failure aborts the rest and is returned.
    /// An empty slice resolves immediately without any request.
    pub async fn upload_files(
        &self,
        files: &[UploadFile],
        folder: Option<&str>,
    ) -> Result<Vec<UploadResult>, ApiError> {
        self.upload_files_with_cancel(files, folder, &self.cancel)
            .await
    }

    /// Batch variant of [`Self::upload_file_with_cancel`]
    pub async fn upload_files_with_cancel(
        &self,
        files: &[UploadFile],
        folder: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<UploadResult>, ApiError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        info!(count = files.len(), "Uploading batch");

        stream::iter(
            files
                .iter()
                .map(|file| self.upload_file_with_cancel(file, folder, cancel)),
        )
        .buffered(self.max_concurrent.max(1))
        .try_collect()
        .await
    }

    /// Deletes a stored object by key
    ///
    /// Returns the backend's JSON response unmodified.
    pub async fn delete_file(&self, key: &str) -> Result<Value, ApiError> {
        info!(key, "Deleting stored file");
        let builder = self
            .api
            .request(Method::DELETE, UPLOAD_PATH)
            .json(&json!({ "key": key }));
        self.api.send_json(builder, &self.cancel).await
    }

    /// Fetches the storage service status
    pub async fn get_status(&self) -> Result<Value, ApiError> {
        let builder = self.api.request(Method::GET, STATUS_PATH);
        self.api.send_json(builder, &self.cancel).await
    }

    /// Asks the backend to verify its storage connection
    pub async fn test_connection(&self) -> Result<Value, ApiError> {
        let builder = self.api.request(Method::POST, TEST_PATH);
        self.api.send_json(builder, &self.cancel).await
    }

    /// Requests a temporary direct-access URL for `key`
    pub async fn get_presigned_url(&self, key: &str) -> Result<PresignedUrl, ApiError> {
        let path = format!("{}?key={}", PRESIGNED_PATH, encode_key(key));
        let builder = self.api.request(Method::GET, &path);
        let body = self.api.send_json(builder, &self.cancel).await?;

        let mut envelope: Envelope<PresignedUrl> = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("presigned URL response: {}", e)))?;

        match envelope.data.take() {
            Some(presigned) if envelope.success && !presigned.url.is_empty() => Ok(presigned),
            _ => Err(ApiError::InvalidResponse(
                envelope
                    .failure_message()
                    .unwrap_or_else(|| "presigned URL response has no URL".to_string()),
            )),
        }
    }

    /// Returns the proxy URL for `key`
    ///
    /// Pure: no request is made.
    pub fn get_proxy_url(&self, key: &str) -> String {
        proxy_url(self.api.base_url(), key)
    }
}
