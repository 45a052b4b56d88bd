//! Auth commands - Manage the stored CampusDesk session
//!
//! Sign-in happens in the CampusDesk web app; the CLI only keeps the issued
//! tokens in the system keyring.
//!
//! 1. `import`  - Stores an access/refresh token pair (and optional user JSON).
//! 2. `status`  - Shows whether a session is stored and whether it can renew.
//! 3. `refresh` - Exchanges the refresh token for a new access token now.
//! 4. `logout`  - Removes the stored session.

use anyhow::{bail, Context, Result};
use campusdesk_core::{domain::CredentialPair, ports::ICredentialProvider};
use clap::Subcommand;
use tracing::info;

use super::api_failure;
use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat},
};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store tokens issued by the web sign-in
    Import {
        /// Access (bearer) token
        #[arg(long)]
        access_token: String,
        /// Refresh token, required for automatic renewal
        #[arg(long)]
        refresh_token: Option<String>,
        /// User profile as JSON
        #[arg(long)]
        user: Option<String>,
    },
    /// Check authentication status
    Status,
    /// Renew the access token now
    Refresh,
    /// Remove stored credentials
    Logout,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            AuthCommand::Import {
                access_token,
                refresh_token,
                user,
            } => execute_import(
                ctx,
                access_token,
                refresh_token.as_deref(),
                user.as_deref(),
                format,
            ),
            AuthCommand::Status => execute_status(ctx, format),
            AuthCommand::Refresh => execute_refresh(ctx, format).await,
            AuthCommand::Logout => execute_logout(ctx, format),
        }
    }
}

fn execute_import(
    ctx: &AppContext,
    access_token: &str,
    refresh_token: Option<&str>,
    user: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let fmt = get_formatter(format);

    if access_token.trim().is_empty() {
        bail!("Access token must not be empty");
    }
    let user = user
        .map(|raw| serde_json::from_str::<serde_json::Value>(raw))
        .transpose()
        .context("--user is not valid JSON")?;

    let credentials = match refresh_token.filter(|t| !t.trim().is_empty()) {
        Some(refresh) => CredentialPair::new(access_token, refresh),
        None => CredentialPair::access_only(access_token),
    };
    let can_renew = credentials.can_renew();
    ctx.store.set_credentials(user, credentials);

    info!(can_renew, "Imported session");
    fmt.success("Session stored in system keyring");
    if !can_renew {
        fmt.warn("No refresh token stored; the session ends when the access token expires");
    }
    Ok(())
}

fn execute_status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let session = ctx.store.session();

    if format.is_json() {
        let json = match &session {
            Some(s) => serde_json::json!({
                "signed_in": true,
                "can_renew": s.credentials.can_renew(),
                "updated_at": s.updated_at.to_rfc3339(),
                "user": s.user,
                "backend": ctx.config.api.base_url,
            }),
            None => serde_json::json!({
                "signed_in": false,
                "backend": ctx.config.api.base_url,
            }),
        };
        fmt.print_json(&json);
        return Ok(());
    }

    match session {
        Some(s) => {
            fmt.success("Signed in");
            let email = s
                .user
                .as_ref()
                .and_then(|u| u.get("email"))
                .and_then(|e| e.as_str());
            if let Some(email) = email {
                fmt.field("User", email);
            }
            fmt.field("Backend", &ctx.config.api.base_url);
            fmt.field(
                "Renewal",
                if s.credentials.can_renew() {
                    "available"
                } else {
                    "unavailable (no refresh token)"
                },
            );
            fmt.field(
                "Updated",
                &s.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
        None => {
            fmt.warn("Not signed in. Run `campusdesk auth import` first.");
        }
    }
    Ok(())
}

async fn execute_refresh(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);

    if ctx.store.access_token().is_none() {
        bail!("Not signed in");
    }
    let refresh_token = ctx.store.refresh_token().unwrap_or_default();

    ctx.renewer
        .renew(&refresh_token)
        .await
        .map_err(api_failure)?;

    fmt.success("Access token renewed");
    Ok(())
}

fn execute_logout(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);

    if ctx.store.session().is_none() {
        fmt.info("No stored session");
        return Ok(());
    }

    ctx.store.clear();
    info!("Logged out");
    fmt.success("Logged out, credentials removed");
    Ok(())
}
