//! Stream command - capture frames and upload them until interrupted

use anyhow::{Context, Result};
use clap::Args;
use screenstream_core::{
    capture::{SyntheticConfig, SyntheticSource},
    config::{CaptureConfig, ConfigFile},
    types::PixelFormat,
    AuthorizationGrant, CaptureController, CaptureSession,
};
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

/// Arguments for the stream command
#[derive(Args)]
pub struct StreamArgs {
    /// Collector URL (overrides [upload] endpoint)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Output width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// JPEG quality, 1-100
    #[arg(short, long)]
    quality: Option<u8>,

    /// Maximum uploads in flight (0 = unbounded)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Pixel format of the capture surface (rgba, bgra, rgb)
    #[arg(long)]
    format: Option<PixelFormat>,

    /// Frames per second rendered by the test pattern source
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Row padding in bytes added by the test pattern source
    /// (default: 8 pixels of the chosen format)
    #[arg(long)]
    padding: Option<u32>,

    /// Stop after this many rendered frames
    #[arg(long)]
    frames: Option<u64>,
}

/// Merge command-line overrides into the file configuration
fn apply_overrides(mut config: CaptureConfig, args: &StreamArgs) -> CaptureConfig {
    if let Some(endpoint) = &args.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if args.width.is_some() || args.height.is_some() {
        let width = args.width.unwrap_or(config.width);
        let height = args.height.unwrap_or(config.height);
        config = config.with_size(width, height);
    }
    if let Some(ms) = args.interval {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(quality) = args.quality {
        config = config.with_quality(quality);
    }
    if let Some(max) = args.max_in_flight {
        config = config.with_max_in_flight(max);
    }
    if let Some(format) = args.format {
        config = config.with_pixel_format(format);
    }
    config
}

/// Test pattern settings matching the capture configuration
fn synthetic_config(config: &CaptureConfig, args: &StreamArgs) -> SyntheticConfig {
    SyntheticConfig {
        width: config.width,
        height: config.height,
        format: config.pixel_format,
        row_padding: args
            .padding
            .unwrap_or_else(|| SyntheticConfig::default_row_padding(config.pixel_format)),
        fps: args.fps,
        frame_limit: args.frames,
    }
}

/// Run a capture session until Ctrl+C or the source ends
pub async fn stream(args: StreamArgs) -> Result<()> {
    let file = ConfigFile::load().context("Failed to load config file")?;
    let config = apply_overrides(file.to_capture_config()?, &args);

    for warning in config.validate() {
        warn!("{}", warning);
    }

    let source = SyntheticSource::start(synthetic_config(&config, &args))
        .context("Failed to start frame source")?;

    let session = CaptureSession::new(AuthorizationGrant::new("synthetic"), config)
        .context("Invalid capture configuration")?;

    println!("screenstream - Streaming\n");
    println!("  Size:      {}x{}", session.width(), session.height());
    println!("  Interval:  {} ms", session.poll_interval().as_millis());
    println!("  Quality:   {}", session.config().quality);
    println!("  Endpoint:  {}", session.endpoint());
    println!();
    println!("Press Ctrl+C to stop...\n");

    let mut controller = CaptureController::new(source);
    controller.start(session).context("Failed to start capture")?;

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl+C")?;
            println!("\nReceived interrupt signal...");
        }
        res = controller.wait() => {
            res?;
            info!("Frame source ended");
        }
    }

    controller.stop().await?;

    println!("Capture stopped.");
    println!("  {}", controller.stats());

    Ok(())
}
