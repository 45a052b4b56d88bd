//! Wiring shared by the commands that talk to the backend
//!
//! Builds the credential store, session terminator, renewer and upload
//! gateway from the loaded configuration, and ties them to a cancellation
//! token that fires on Ctrl-C / SIGTERM.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use campusdesk_api::{
    auth::AuthenticationRenewer, client::ApiClient, session::SessionTerminator,
    store::KeyringCredentialStore, upload::UploadGateway,
};
use campusdesk_core::{
    config::Config,
    ports::{ICredentialProvider, ISessionListener, SessionExpired},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output::{get_formatter, OutputFormat};

/// Loads the configuration from `explicit` or the default location
///
/// An explicitly named file must exist and parse; the default location
/// falls back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            Ok((config, path.to_path_buf()))
        }
        None => {
            let path = Config::default_path();
            Ok((Config::load_or_default(&path), path))
        }
    }
}

/// Reports session expiry to the terminal
pub struct CliSessionListener {
    format: OutputFormat,
}

impl CliSessionListener {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ISessionListener for CliSessionListener {
    fn on_session_expired(&self, event: &SessionExpired) {
        get_formatter(self.format).warn(&format!(
            "Session ended ({}). Sign in again at {} and run `campusdesk auth import`.",
            event.reason, event.redirect_to
        ));
    }
}

/// Fully wired backend client
pub struct AppContext {
    pub config: Config,
    pub store: Arc<KeyringCredentialStore>,
    pub renewer: Arc<AuthenticationRenewer>,
    pub gateway: UploadGateway,
}

impl AppContext {
    /// Validates `config` and wires the client stack
    pub fn build(config: Config, format: OutputFormat, cancel: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!("Invalid configuration: {}", messages.join("; "));
        }

        let store = Arc::new(
            KeyringCredentialStore::open(&config.auth.keyring_service)
                .context("Failed to open credential store")?,
        );
        let provider: Arc<dyn ICredentialProvider> = store.clone();

        let api = Arc::new(
            ApiClient::from_config(&config.api, provider.clone())
                .context("Failed to create HTTP client")?,
        );

        let terminator = Arc::new(SessionTerminator::new(
            provider,
            config.auth.login_route.clone(),
        ));
        terminator.subscribe(Arc::new(CliSessionListener::new(format)));

        let renewer = Arc::new(AuthenticationRenewer::new(&api, terminator));
        let gateway = UploadGateway::new(api, renewer.clone())
            .with_upload_config(&config.upload)
            .with_cancellation_token(cancel);

        info!(base_url = %config.api.base_url, "Client ready");

        Ok(Self {
            config,
            store,
            renewer,
            gateway,
        })
    }
}

/// Cancels `token` on Ctrl-C or SIGTERM
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
