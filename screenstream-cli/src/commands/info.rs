//! Info command - show defaults and build information

use anyhow::Result;
use screenstream_core::config::{
    ConfigFile, DEFAULT_ENDPOINT, DEFAULT_HEIGHT, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUALITY,
    DEFAULT_UPLOAD_TIMEOUT_MS, DEFAULT_WIDTH,
};
use screenstream_core::encode::JPEG_MIME;

/// Show defaults and where configuration is read from
pub async fn info() -> Result<()> {
    println!("screenstream {} - System Information\n", env!("CARGO_PKG_VERSION"));

    println!("Defaults:");
    println!("  Size:          {}x{}", DEFAULT_WIDTH, DEFAULT_HEIGHT);
    println!("  Poll interval: {} ms", DEFAULT_POLL_INTERVAL_MS);
    println!("  Encoding:      {} (quality {})", JPEG_MIME, DEFAULT_QUALITY);
    println!("  Endpoint:      {}", DEFAULT_ENDPOINT);
    println!("  Timeout:       {} ms", DEFAULT_UPLOAD_TIMEOUT_MS);
    println!();

    let path = ConfigFile::default_path();
    println!("Configuration:");
    println!("  File:   {}", path.display());
    println!("  Exists: {}", if path.exists() { "yes" } else { "no" });
    println!();

    println!("Frame sources:");
    println!("  synthetic  scrolling test pattern with padded rows");

    Ok(())
}
