//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the upload client depends on but whose
//! implementations belong to the host application.
//!
//! ## Ports Overview
//!
//! - [`ICredentialProvider`] - Access to the process-wide credential pair
//! - [`ISessionListener`] - Notification that the authenticated session ended

pub mod credential_provider;
pub mod session;

pub use credential_provider::{ICredentialProvider, InMemoryCredentialStore};
pub use session::{ISessionListener, SessionExpired};
