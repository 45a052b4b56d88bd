//! Domain error types
//!
//! Validation failures for upload payloads and invalid transitions of the
//! upload attempt state machine.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No file was supplied for an upload
    #[error("No file provided")]
    MissingFile,

    /// A file could not be read from disk
    #[error("Cannot read file {path}: {reason}")]
    UnreadableFile {
        /// Path that was requested
        path: String,
        /// Underlying I/O failure
        reason: String,
    },

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
