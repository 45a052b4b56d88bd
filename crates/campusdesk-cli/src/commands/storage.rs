//! Storage commands - Manage objects already stored by the backend
//!
//! # Subcommands
//!
//! - `delete <KEY>`    - Delete a stored object
//! - `status`          - Show storage service status
//! - `test`            - Ask the backend to verify its storage connection
//! - `presign <KEY>`   - Issue a temporary direct-access URL
//! - `proxy-url <KEY>` - Print the proxied URL for a key (no request)

use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use super::api_failure;
use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat, OutputFormatter},
};

#[derive(Debug, Subcommand)]
pub enum StorageCommand {
    /// Delete a stored object by key
    Delete {
        /// Storage key as returned by `upload`
        key: String,
    },
    /// Show storage service status
    Status,
    /// Verify the backend's storage connection
    Test,
    /// Issue a temporary direct-access URL
    Presign {
        /// Storage key
        key: String,
    },
    /// Print the proxied URL for a key
    ProxyUrl {
        /// Storage key
        key: String,
    },
}

impl StorageCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        match self {
            StorageCommand::Delete { key } => {
                info!(key = %key, "Deleting stored object");
                let body = ctx.gateway.delete_file(key).await.map_err(api_failure)?;
                report(&*fmt, format, &format!("Deleted {}", key), &body);
            }
            StorageCommand::Status => {
                let body = ctx.gateway.get_status().await.map_err(api_failure)?;
                report(&*fmt, format, "Storage status", &body);
            }
            StorageCommand::Test => {
                let body = ctx.gateway.test_connection().await.map_err(api_failure)?;
                report(&*fmt, format, "Storage connection OK", &body);
            }
            StorageCommand::Presign { key } => {
                let presigned = ctx
                    .gateway
                    .get_presigned_url(key)
                    .await
                    .map_err(api_failure)?;
                if format.is_json() {
                    fmt.print_json(&serde_json::to_value(&presigned)?);
                } else {
                    fmt.success(&presigned.url);
                    fmt.field("Expires in", &format!("{}s", presigned.expires_in));
                }
            }
            StorageCommand::ProxyUrl { key } => {
                let url = ctx.gateway.get_proxy_url(key);
                if format.is_json() {
                    fmt.print_json(&serde_json::json!({ "key": key, "url": url }));
                } else {
                    println!("{}", url);
                }
            }
        }
        Ok(())
    }
}

/// Prints an opaque backend response
fn report(fmt: &dyn OutputFormatter, format: OutputFormat, heading: &str, body: &Value) {
    if format.is_json() {
        fmt.print_json(body);
        return;
    }

    fmt.success(heading);
    for (label, value) in flatten(body) {
        fmt.field(&label, &value);
    }
}

/// Flattens the interesting part of a response into label/value pairs
///
/// Uses the `data` member when present; nested objects are joined with dots.
fn flatten(body: &Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let label = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(&label, child, out);
                }
            }
            Value::String(s) => out.push((prefix.to_string(), s.clone())),
            Value::Null => {}
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    let mut out = Vec::new();
    let Some(data) = body.get("data") else {
        walk("", body, &mut out);
        return out;
    };

    match data {
        Value::Object(_) => walk("", data, &mut out),
        Value::Null => {}
        other => out.push(("result".to_string(), other.to_string())),
    }
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        out.push(("message".to_string(), message.to_string()));
    }
    out
}
