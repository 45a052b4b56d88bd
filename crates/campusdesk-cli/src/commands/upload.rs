//! Upload command - Send local files to CampusDesk storage
//!
//! `campusdesk upload <FILES>... [--folder <FOLDER>]` uploads every file into
//! one folder. Multiple files run concurrently (bounded by
//! `upload.max_concurrent`); any failure fails the whole command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use campusdesk_core::domain::{DomainError, UploadFile, UploadResult};
use clap::Args;
use tracing::info;

use super::api_failure;
use crate::{
    context::AppContext,
    output::{get_formatter, OutputFormat},
};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Destination folder (defaults to `upload.default_folder`)
    #[arg(short, long)]
    folder: Option<String>,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);

        let mut files = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let file = read_upload_file(path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            files.push(file);
        }

        let folder = self.folder.as_deref();
        info!(
            count = files.len(),
            folder = folder.unwrap_or(ctx.gateway.default_folder()),
            "Starting upload"
        );

        let results = match files.as_slice() {
            [single] => vec![ctx
                .gateway
                .upload_file(single, folder)
                .await
                .map_err(api_failure)?],
            many => ctx
                .gateway
                .upload_files(many, folder)
                .await
                .map_err(api_failure)?,
        };

        if format.is_json() {
            fmt.print_json(&upload_report(&results));
        } else {
            for result in &results {
                fmt.success(&format!("Uploaded {}", display_name(result)));
                fmt.field("Key", &result.key);
                fmt.field("URL", &result.url);
                fmt.field("Size", &format_size(result.size));
            }
        }

        Ok(())
    }
}

/// Reads `path` without blocking the runtime
async fn read_upload_file(path: &Path) -> Result<UploadFile, DomainError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| DomainError::UnreadableFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(UploadFile::named_after(path, content))
}

fn display_name(result: &UploadResult) -> &str {
    if result.original_name.is_empty() {
        &result.key
    } else {
        &result.original_name
    }
}

fn upload_report(results: &[UploadResult]) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "count": results.len(),
        "files": results,
    })
}

/// Formats a byte count with a binary unit suffix
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
