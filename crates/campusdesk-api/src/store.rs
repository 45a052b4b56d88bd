//! Keyring-backed credential storage
//!
//! [`KeyringCredentialStore`] keeps the current session in memory and mirrors
//! every change to the OS credential store (Secret Service on Linux) as a
//! JSON-serialized [`StoredSession`]. Reads are served from memory; write
//! failures are logged and do not interrupt the caller.

use std::sync::RwLock;

use campusdesk_core::{
    domain::{CredentialPair, StoredSession},
    ports::ICredentialProvider,
};
use tracing::{debug, info, warn};

use crate::ApiError;

/// Keyring account under which the session is stored
const KEYRING_ACCOUNT: &str = "session";

/// Credential provider persisted in the system keyring
pub struct KeyringCredentialStore {
    service: String,
    cache: RwLock<Option<StoredSession>>,
}

impl KeyringCredentialStore {
    /// Opens the store for `service`, loading any saved session
    ///
    /// # Errors
    /// [`ApiError::CredentialStore`] if the keyring cannot be reached or the
    /// saved entry is corrupt.
    pub fn open(service: impl Into<String>) -> Result<Self, ApiError> {
        let store = Self {
            service: service.into(),
            cache: RwLock::new(None),
        };
        let session = store.load()?;
        *store
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
        Ok(store)
    }

    /// Keyring service name
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns a copy of the current session, including the user payload
    pub fn session(&self) -> Option<StoredSession> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn entry(&self) -> Result<keyring::Entry, ApiError> {
        keyring::Entry::new(&self.service, KEYRING_ACCOUNT)
            .map_err(|e| ApiError::CredentialStore(format!("Failed to create keyring entry: {}", e)))
    }

    fn load(&self) -> Result<Option<StoredSession>, ApiError> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let session = serde_json::from_str(&json).map_err(|e| {
                    ApiError::CredentialStore(format!("Failed to deserialize session: {}", e))
                })?;
                debug!(service = %self.service, "Loaded session from keyring");
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, "No session found in keyring");
                Ok(None)
            }
            Err(e) => Err(ApiError::CredentialStore(format!(
                "Failed to read from keyring: {}",
                e
            ))),
        }
    }

    fn persist(&self, session: &StoredSession) -> Result<(), ApiError> {
        let json = serde_json::to_string(session)
            .map_err(|e| ApiError::CredentialStore(format!("Failed to serialize session: {}", e)))?;
        self.entry()?
            .set_password(&json)
            .map_err(|e| ApiError::CredentialStore(format!("Failed to store session: {}", e)))?;
        debug!(service = %self.service, "Stored session in keyring");
        Ok(())
    }

    fn remove(&self) -> Result<(), ApiError> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(service = %self.service, "Cleared session from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ApiError::CredentialStore(format!(
                "Failed to delete from keyring: {}",
                e
            ))),
        }
    }
}

impl ICredentialProvider for KeyringCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.session()
            .map(|s| s.credentials.access_token)
            .filter(|t| !t.is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.session()
            .and_then(|s| s.credentials.refresh_token)
            .filter(|t| !t.is_empty())
    }

    fn set_credentials(&self, user: Option<serde_json::Value>, credentials: CredentialPair) {
        let session = StoredSession::new(user, credentials);
        if let Err(e) = self.persist(&session) {
            warn!(error = %e, "Keeping renewed credentials in memory only");
        }
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
    }

    fn clear(&self) {
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        if let Err(e) = self.remove() {
            warn!(error = %e, "Session cleared in memory but not in keyring");
        }
    }
}
