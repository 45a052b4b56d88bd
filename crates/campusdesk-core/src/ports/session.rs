//! Session listener port (driven/secondary port)
//!
//! When credential renewal fails the upload client ends the authenticated
//! session. It does not navigate anywhere itself; it emits a
//! [`SessionExpired`] event and the host routes the user to its
//! unauthenticated entry point.
//!
//! ## Design Notes
//!
//! - Delivery is fire-and-forget: listeners are called synchronously on the
//!   task that observed the failure and must not block.
//! - The event is emitted after credentials have been cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted once the session has been terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpired {
    /// Route the host should navigate to (e.g. `/login`)
    pub redirect_to: String,
    /// Why the session ended
    pub reason: String,
    /// When the session was terminated
    pub at: DateTime<Utc>,
}

impl SessionExpired {
    pub fn new(redirect_to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            redirect_to: redirect_to.into(),
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

/// Port trait for reacting to the end of the authenticated session
pub trait ISessionListener: Send + Sync {
    /// Called after credentials were cleared
    fn on_session_expired(&self, event: &SessionExpired);
}

/// Closures can be registered directly as listeners
impl<F> ISessionListener for F
where
    F: Fn(&SessionExpired) + Send + Sync,
{
    fn on_session_expired(&self, event: &SessionExpired) {
        self(event)
    }
}
