//! Upload payloads, per-attempt requests, results and the attempt state machine
//!
//! ## Attempt lifecycle
//!
//! ```text
//! Initiated -> Sent -> { Succeeded | AuthExpired | Failed }
//! AuthExpired -> Renewing -> { Retrying | Logout }
//! Retrying -> { Succeeded | Failed }
//! ```
//!
//! `Succeeded`, `Failed` and `Logout` are terminal. Any non-terminal state may
//! move to `Failed` (cancellation, transport errors).

use std::{fmt, path::Path};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Folder used when the caller does not name one
pub const DEFAULT_UPLOAD_FOLDER: &str = "program-resources";

/// Fallback content type for unknown extensions
const OCTET_STREAM: &str = "application/octet-stream";

// ============================================================================
// UploadFile
// ============================================================================

/// A binary payload selected for upload
///
/// Content is held in reference-counted [`Bytes`], so every attempt can build
/// its own request body without copying or consuming the original.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    name: String,
    mime_type: String,
    content: Bytes,
}

impl UploadFile {
    /// Creates a file from in-memory content with an explicit content type
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    /// Creates a file whose content type is derived from its extension
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name).to_string();
        Self::new(name, mime_type, content)
    }

    /// Creates a file named after the last component of `path`
    ///
    /// The content is read by the caller, so this stays free of I/O.
    pub fn named_after(path: &Path, content: impl Into<Bytes>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_bytes(name, content)
    }

    /// Checks that a file was actually supplied
    ///
    /// A nameless payload is what an empty file picker produces; it is rejected
    /// before any request is built.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingFile);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns a cheap handle to the content
    pub fn content(&self) -> Bytes {
        self.content.clone()
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Maps common extensions to a content type
fn guess_mime_type(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return OCTET_STREAM,
    };

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => OCTET_STREAM,
    }
}

// ============================================================================
// UploadRequest
// ============================================================================

/// One upload attempt: payload, destination folder and optional bearer token
///
/// Values are immutable. A retry after credential renewal builds a new
/// request through [`UploadRequest::with_token`] instead of mutating the
/// original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    file: UploadFile,
    folder: String,
    auth_token: Option<String>,
}

impl UploadRequest {
    /// Builds a request, substituting `default_folder` for a missing or empty folder
    pub fn new(
        file: UploadFile,
        folder: Option<&str>,
        default_folder: &str,
        auth_token: Option<String>,
    ) -> Self {
        let folder = folder
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(default_folder)
            .to_string();

        Self {
            file,
            folder,
            auth_token: auth_token.filter(|t| !t.is_empty()),
        }
    }

    /// Returns a fresh request for the same file and folder carrying `token`
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            file: self.file.clone(),
            folder: self.folder.clone(),
            auth_token: Some(token.into()),
        }
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Returns true if the request will be sent with an `Authorization` header
    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Metadata of a stored object, returned by a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Public or proxied URL of the stored object
    pub url: String,
    /// Storage key, used for delete / presign / proxy
    pub key: String,
    /// File name as supplied by the uploader
    #[serde(default)]
    pub original_name: String,
    /// Stored size in bytes
    #[serde(default)]
    pub size: u64,
    /// Content type recorded by the storage service
    #[serde(default)]
    pub mime_type: String,
}

impl UploadResult {
    /// Returns true if the result identifies a stored object
    pub fn is_complete(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty()
    }
}

/// Temporary direct-access URL issued by the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    /// Validity in seconds
    #[serde(default)]
    pub expires_in: u64,
}

// ============================================================================
// UploadState / UploadAttempt
// ============================================================================

/// States of a single logical upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    /// Request built, not yet sent
    #[default]
    Initiated,
    /// First attempt in flight
    Sent,
    /// Server answered 401 to an authenticated first attempt
    AuthExpired,
    /// Refresh-token exchange in flight
    Renewing,
    /// Second (final) attempt in flight with the renewed token
    Retrying,
    /// Upload stored
    Succeeded,
    /// Upload rejected or aborted
    Failed,
    /// Renewal failed and the session was terminated
    Logout,
}

impl UploadState {
    /// Returns the state name for display
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Initiated => "Initiated",
            UploadState::Sent => "Sent",
            UploadState::AuthExpired => "AuthExpired",
            UploadState::Renewing => "Renewing",
            UploadState::Retrying => "Retrying",
            UploadState::Succeeded => "Succeeded",
            UploadState::Failed => "Failed",
            UploadState::Logout => "Logout",
        }
    }

    /// Returns true for states with no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Succeeded | UploadState::Failed | UploadState::Logout
        )
    }

    /// Returns true if moving from `self` to `target` is allowed
    pub fn can_transition_to(&self, target: UploadState) -> bool {
        if self.is_terminal() {
            return false;
        }

        // Aborts are possible from anywhere that is still running
        if target == UploadState::Failed {
            return true;
        }

        matches!(
            (self, target),
            (UploadState::Initiated, UploadState::Sent)
                | (UploadState::Sent, UploadState::Succeeded)
                | (UploadState::Sent, UploadState::AuthExpired)
                | (UploadState::AuthExpired, UploadState::Renewing)
                | (UploadState::Renewing, UploadState::Retrying)
                | (UploadState::Renewing, UploadState::Logout)
                | (UploadState::Retrying, UploadState::Succeeded)
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the state history of one logical upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAttempt {
    history: Vec<UploadState>,
}

impl UploadAttempt {
    pub fn new() -> Self {
        Self {
            history: vec![UploadState::Initiated],
        }
    }

    pub fn state(&self) -> UploadState {
        self.history
            .last()
            .copied()
            .unwrap_or(UploadState::Initiated)
    }

    /// Every state visited so far, in order
    pub fn history(&self) -> &[UploadState] {
        &self.history
    }

    /// Moves to `target`, rejecting transitions the lifecycle does not allow
    pub fn transition_to(&mut self, target: UploadState) -> Result<(), DomainError> {
        let current = self.state();
        if !current.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: current.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.history.push(target);
        Ok(())
    }

    /// Number of requests sent to the upload endpoint so far
    pub fn requests_sent(&self) -> usize {
        self.history
            .iter()
            .filter(|s| matches!(s, UploadState::Sent | UploadState::Retrying))
            .count()
    }
}

impl Default for UploadAttempt {
    fn default() -> Self {
        Self::new()
    }
}
