//! Configuration types for screenstream
//!
//! Provides the runtime capture configuration and the on-disk config file.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::PixelFormat;

/// Default output width in pixels
pub const DEFAULT_WIDTH: u32 = 720;
/// Default output height in pixels
pub const DEFAULT_HEIGHT: u32 = 1280;
/// Default delay between poll ticks
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Default JPEG quality (1-100)
pub const DEFAULT_QUALITY: u8 = 50;
/// Default collector endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/upload";
/// Default per-request upload timeout
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 5000;

/// Runtime configuration for a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Pixel layout the capture surface delivers
    pub pixel_format: PixelFormat,
    /// Delay between poll ticks in milliseconds
    pub poll_interval_ms: u64,
    /// Collector URL frames are posted to
    pub endpoint: String,
    /// JPEG quality (1-100)
    pub quality: u8,
    /// Per-request upload timeout in milliseconds
    pub upload_timeout_ms: u64,
    /// Maximum uploads in flight at once (0 = unbounded)
    pub max_in_flight: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            pixel_format: PixelFormat::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            quality: DEFAULT_QUALITY,
            upload_timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
            max_in_flight: 0,
        }
    }
}

impl CaptureConfig {
    /// Create a config posting to the given endpoint, defaults elsewhere
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the output size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the pixel format
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the JPEG quality
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set the upload timeout
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Cap concurrent uploads (0 = unbounded)
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upload timeout as a Duration
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    /// In-flight cap, `None` when unbounded
    pub fn in_flight_limit(&self) -> Option<usize> {
        (self.max_in_flight > 0).then_some(self.max_in_flight)
    }

    /// Check for settings that work but are probably not what the user wants
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.poll_interval_ms > 0 && self.poll_interval_ms < 16 {
            warnings.push(format!(
                "Poll interval of {}ms is faster than most displays refresh. Expect many empty polls.",
                self.poll_interval_ms
            ));
        }

        if self.quality > 90 {
            warnings.push(format!(
                "JPEG quality {} produces large payloads. 50-80 is usually enough for screen content.",
                self.quality
            ));
        }

        if self.max_in_flight == 0 && self.poll_interval_ms < 50 {
            warnings.push(
                "Uploads are unbounded at a fast cadence; a slow collector will pile up requests. Consider max_in_flight."
                    .to_string(),
            );
        }

        if self.upload_timeout_ms > 0 && self.upload_timeout_ms < self.poll_interval_ms {
            warnings.push(format!(
                "Upload timeout ({}ms) is shorter than the poll interval ({}ms).",
                self.upload_timeout_ms, self.poll_interval_ms
            ));
        }

        let pixels = self.width as u64 * self.height as u64;
        if pixels > 3840 * 2160 {
            warnings.push(format!(
                "{}x{} is larger than 4K; encoding may not keep up with the poll interval.",
                self.width, self.height
            ));
        }

        warnings
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate_strict(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "Output size must be non-zero, got {}x{}",
                self.width, self.height
            ));
        }

        if !(1..=100).contains(&self.quality) {
            return Err(format!("Quality must be 1-100, got {}", self.quality));
        }

        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be at least 1ms".to_string());
        }

        if self.upload_timeout_ms == 0 {
            return Err("Upload timeout must be at least 1ms".to_string());
        }

        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| format!("Invalid endpoint '{}': {}", self.endpoint, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "Endpoint must be http or https, got '{}'",
                url.scheme()
            ));
        }

        Ok(())
    }
}
