//! CLI subcommands

pub mod auth;
pub mod config;
pub mod storage;
pub mod upload;

use campusdesk_api::{ApiError, ErrorKind};

/// Attaches a user-facing hint to backend errors that need one
pub(crate) fn api_failure(err: ApiError) -> anyhow::Error {
    let hint = match err.kind() {
        ErrorKind::AuthExpired | ErrorKind::RenewalFailed => "Session expired, sign in again",
        ErrorKind::Unauthorized => "Not authorized",
        ErrorKind::Network => "Could not reach the CampusDesk backend",
        ErrorKind::Cancelled => "Interrupted",
        _ => return anyhow::Error::new(err),
    };
    anyhow::Error::new(err).context(hint)
}
