//! Session termination
//!
//! [`SessionTerminator`] ends the authenticated session when credentials can
//! no longer be renewed: it clears the credential provider and then notifies
//! every registered [`ISessionListener`] with a [`SessionExpired`] event that
//! points at the host's login route.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

use campusdesk_core::ports::{ICredentialProvider, ISessionListener, SessionExpired};
use tracing::{info, warn};

/// Route emitted in [`SessionExpired`] when none is configured
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Clears credentials and announces the end of the session
pub struct SessionTerminator {
    credentials: Arc<dyn ICredentialProvider>,
    login_route: String,
    listeners: RwLock<Vec<Arc<dyn ISessionListener>>>,
    terminations: AtomicU64,
}

impl SessionTerminator {
    /// Creates a terminator that redirects to `login_route`
    pub fn new(credentials: Arc<dyn ICredentialProvider>, login_route: impl Into<String>) -> Self {
        Self {
            credentials,
            login_route: login_route.into(),
            listeners: RwLock::new(Vec::new()),
            terminations: AtomicU64::new(0),
        }
    }

    /// Registers a listener for [`SessionExpired`] events
    pub fn subscribe(&self, listener: Arc<dyn ISessionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Route the host is asked to navigate to
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Number of times the session has been terminated
    pub fn termination_count(&self) -> u64 {
        self.terminations.load(Ordering::SeqCst)
    }

    /// Clears credentials, then emits [`SessionExpired`] to every listener
    ///
    /// Listeners run synchronously on the calling task.
    pub fn terminate(&self, reason: &str) {
        warn!(reason, redirect_to = %self.login_route, "Ending session");
        self.credentials.clear();
        self.terminations.fetch_add(1, Ordering::SeqCst);

        let event = SessionExpired::new(&self.login_route, reason);
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        for listener in listeners {
            listener.on_session_expired(&event);
        }

        info!("Session terminated, credentials cleared");
    }
}
