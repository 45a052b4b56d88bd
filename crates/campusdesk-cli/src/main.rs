//! CampusDesk CLI - Command-line upload client for the CampusDesk backend
//!
//! Provides commands for:
//! - Uploading files to campus storage
//! - Deleting, presigning and proxying stored objects
//! - Managing the stored session
//! - Inspecting configuration

use std::path::PathBuf;

use anyhow::Result;
use campusdesk_core::config::LoggingConfig;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand, config::ConfigCommand, storage::StorageCommand, upload::UploadCommand,
};
use context::{cancel_on_signal, load_config, AppContext};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "campusdesk",
    version,
    about = "Upload client for the CampusDesk admin backend"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload one or more files
    Upload(UploadCommand),
    /// Manage stored objects
    #[command(subcommand)]
    Storage(StorageCommand),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let default_level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let (config, config_path) = load_config(cli.config.as_deref())?;
    init_tracing(cli.verbose, &config.logging);

    if let Commands::Config(cmd) = &cli.command {
        return cmd.execute(&config, &config_path, format);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let ctx = AppContext::build(config, format, cancel)?;

    match cli.command {
        Commands::Upload(cmd) => cmd.execute(&ctx, format).await,
        Commands::Storage(cmd) => cmd.execute(&ctx, format).await,
        Commands::Auth(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(_) => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = OutputFormat::from_flag(cli.json);

    if let Err(e) = run(cli, format).await {
        get_formatter(format).error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
