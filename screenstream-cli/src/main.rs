//! screenstream CLI
//!
//! Periodic screen capture to JPEG, posted to an HTTP collector.
//!
//! # Usage
//!
//! ```bash
//! # Run a local collector on :5000
//! screenstream collect
//!
//! # Stream the synthetic test pattern to it
//! screenstream stream --endpoint http://127.0.0.1:5000/upload
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// screenstream - poll a capture surface and upload JPEG frames
#[derive(Parser)]
#[command(name = "screenstream")]
#[command(version)]
#[command(about = "Periodic screen capture to JPEG, uploaded over HTTP", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture frames and upload them until interrupted
    Stream(commands::StreamArgs),

    /// Run a development collector that accepts uploads
    Collect(commands::CollectArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),

    /// Show defaults and build information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let directive = format!("screenstream={}", level)
        .parse()
        .context("Invalid log directive")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Stream(args) => commands::stream(args).await?,
        Commands::Collect(args) => commands::collect(args).await?,
        Commands::Config(args) => commands::config(args).await?,
        Commands::Info => commands::info().await?,
    }

    Ok(())
}
