//! Domain values for the upload client
//!
//! - Credential pair held by the host application
//! - Upload payloads, per-attempt requests and results
//! - The single-attempt upload state machine
//! - Domain-specific error types

pub mod credentials;
pub mod errors;
pub mod upload;

// Re-export commonly used types
pub use credentials::{CredentialPair, StoredSession};
pub use errors::DomainError;
pub use upload::{
    PresignedUrl, UploadAttempt, UploadFile, UploadRequest, UploadResult, UploadState,
    DEFAULT_UPLOAD_FOLDER,
};
