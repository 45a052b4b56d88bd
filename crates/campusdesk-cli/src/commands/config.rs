//! Config command - View and check CampusDesk configuration
//!
//! Provides the `campusdesk config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration and reports every error
//! 3. Prints the configuration file location

use std::path::Path;

use anyhow::{Context, Result};
use campusdesk_core::config::{Config, ValidationError};
use clap::Subcommand;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub fn execute(&self, config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, path, format),
            ConfigCommand::Validate => execute_validate(config, path, format),
            ConfigCommand::Path => {
                if format.is_json() {
                    get_formatter(format).print_json(&serde_json::json!({
                        "config_path": path.display().to_string(),
                        "exists": path.exists(),
                    }));
                } else {
                    println!("{}", path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_validate(config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let errors = config.validate();

    if format.is_json() {
        formatter.print_json(&validation_report(path, &errors));
    } else if errors.is_empty() {
        formatter.success(&format!("Configuration is valid ({})", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error(s) ({})",
            errors.len(),
            path.display()
        ));
        for error in &errors {
            formatter.info(&format!("{}: {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Invalid configuration")
    }
}

fn validation_report(path: &Path, errors: &[ValidationError]) -> serde_json::Value {
    let entries: Vec<_> = errors
        .iter()
        .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
        .collect();
    serde_json::json!({
        "valid": errors.is_empty(),
        "config_path": path.display().to_string(),
        "errors": entries,
    })
}
