//! HTTP upload of encoded frames
//!
//! Each frame is posted on its own as `{"image": "data:image/jpeg;base64,..."}`.
//! Nothing is retried or queued: a failed upload costs only its own frame.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::CaptureConfig;
use crate::error::{Result, StreamError};
use crate::types::EncodedFrame;

/// JSON body sent to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPayload {
    /// Frame as a self-describing data URI
    pub image: String,
}

impl UploadPayload {
    /// Build the payload for a frame
    pub fn from_frame(frame: &EncodedFrame) -> Self {
        Self {
            image: frame.to_data_uri(),
        }
    }
}

/// Posts encoded frames to a fixed endpoint
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Uploader {
    http: reqwest::Client,
    endpoint: Arc<str>,
}

impl Uploader {
    /// Create an uploader for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| StreamError::config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StreamError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Create an uploader from a capture config
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.upload_timeout())
    }

    /// Collector URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one frame and wait for the status line.
    ///
    /// Succeeds on any 2xx. The response body is read and thrown away.
    pub async fn upload(&self, frame: EncodedFrame) -> Result<()> {
        let payload = UploadPayload::from_frame(&frame);
        let size = frame.len();
        drop(frame);

        let response = self
            .http
            .post(&*self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        // Drain so the connection can go back to the pool
        let _ = response.bytes().await;

        if status.is_success() {
            debug!("Uploaded {} byte frame to {} ({})", size, self.endpoint, status);
            Ok(())
        } else {
            Err(StreamError::UploadStatus {
                status: status.as_u16(),
                endpoint: self.endpoint.to_string(),
            })
        }
    }
}
