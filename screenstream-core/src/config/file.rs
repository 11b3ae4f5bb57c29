//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/screenstream/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{
    CaptureConfig, DEFAULT_ENDPOINT, DEFAULT_HEIGHT, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUALITY,
    DEFAULT_UPLOAD_TIMEOUT_MS, DEFAULT_WIDTH,
};
use crate::error::{Result, StreamError};
use crate::types::PixelFormat;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Capture surface settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Encoder settings
    #[serde(default)]
    pub encoder: EncoderSettings,

    /// Upload settings
    #[serde(default)]
    pub upload: UploadSettings,
}

/// Capture surface and cadence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Output width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Delay between polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Pixel format of the capture surface (rgba, bgra, rgb)
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
}

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// JPEG quality (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,
}

/// Upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Collector URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Maximum concurrent uploads (0 = unbounded)
    #[serde(default)]
    pub max_in_flight: usize,
}

// Default value functions
fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_pixel_format() -> String {
    "rgba".to_string()
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_MS
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            poll_interval_ms: default_poll_interval(),
            pixel_format: default_pixel_format(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            quality: default_quality(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout(),
            max_in_flight: 0,
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("screenstream").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("screenstream")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/screenstream/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| StreamError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| StreamError::Config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StreamError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| StreamError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Create a default config file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_path();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to(path)?;
        Ok(true)
    }

    /// Merge the file settings into a runtime capture config
    pub fn to_capture_config(&self) -> Result<CaptureConfig> {
        let pixel_format: PixelFormat = self
            .capture
            .pixel_format
            .parse()
            .map_err(StreamError::Config)?;

        Ok(CaptureConfig {
            width: self.capture.width,
            height: self.capture.height,
            pixel_format,
            poll_interval_ms: self.capture.poll_interval_ms,
            endpoint: self.upload.endpoint.clone(),
            quality: self.encoder.quality,
            upload_timeout_ms: self.upload.timeout_ms,
            max_in_flight: self.upload.max_in_flight,
        })
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# screenstream configuration

[capture]
# Output size in pixels; frames are cropped to this after stripping row padding
width = 720
height = 1280

# Delay between polls of the capture surface, in milliseconds
poll_interval_ms = 100

# Pixel format of the capture surface: rgba, bgra, rgb
pixel_format = "rgba"

[encoder]
# JPEG quality, 1-100
quality = 50

[upload]
# Collector URL; each frame is POSTed as {"image": "data:image/jpeg;base64,..."}
endpoint = "http://127.0.0.1:5000/upload"

# Per-request timeout in milliseconds
timeout_ms = 5000

# Maximum uploads in flight at once (0 = unbounded)
max_in_flight = 0
"#
    .to_string()
}
