//! Config command - manage the configuration file

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use screenstream_core::config::{sample_config, ConfigFile};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the effective configuration and any warnings
    Show,

    /// Write the sample config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Path => {
            let path = ConfigFile::default_path();
            let marker = if path.exists() { "" } else { " (not created yet)" };
            println!("{}{}", path.display(), marker);
        }
        ConfigCommand::Show => {
            let path = ConfigFile::default_path();
            let file = ConfigFile::load_from(path.clone())
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let config = file
                .to_capture_config()
                .context("Config file has invalid values")?;

            if path.exists() {
                println!("Configuration file: {}\n", path.display());
            } else {
                println!("No configuration file, built-in defaults in effect.\n");
            }

            println!("  Size:          {}x{}", config.width, config.height);
            println!("  Pixel format:  {}", config.pixel_format);
            println!("  Poll interval: {} ms", config.poll_interval_ms);
            println!("  JPEG quality:  {}", config.quality);
            println!("  Endpoint:      {}", config.endpoint);
            println!("  Timeout:       {} ms", config.upload_timeout_ms);
            match config.in_flight_limit() {
                Some(n) => println!("  Max in flight: {}", n),
                None => println!("  Max in flight: unbounded"),
            }

            if let Err(e) = config.validate_strict() {
                println!("\nError: {}", e);
            }
            for warning in config.validate() {
                println!("\nWarning: {}", warning);
            }
        }
        ConfigCommand::Init { force } => {
            let path = ConfigFile::default_path();

            if path.exists() && !force {
                println!("Configuration file already exists: {}", path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            std::fs::write(&path, sample_config()).context("Failed to write config file")?;

            println!("Created configuration file: {}", path.display());
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
