//! Error types for screenstream

use thiserror::Error;

/// Result type alias using StreamError
pub type Result<T> = std::result::Result<T, StreamError>;

/// Main error type for screenstream operations
#[derive(Debug, Error)]
pub enum StreamError {
    /// Stride or geometry of a raw frame does not match the session
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// JPEG encoding failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Transport-level upload failure (connect, timeout, body)
    #[error("Upload error: {0}")]
    Upload(String),

    /// Collector answered with a non-2xx status
    #[error("Upload rejected by {endpoint}: HTTP {status}")]
    UploadStatus {
        /// HTTP status code returned by the collector
        status: u16,
        /// Endpoint the frame was posted to
        endpoint: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Frame source reported an error other than closing
    #[error("Frame source error: {0}")]
    Source(String),

    /// Frame source has been closed or destroyed
    #[error("Frame source closed")]
    SourceClosed,

    /// Session already running
    #[error("Capture session already active")]
    AlreadyActive,

    /// Capture session not active
    #[error("No active capture session")]
    NoActiveSession,

    /// Session reached its terminal state
    #[error("Capture session already stopped")]
    SessionStopped,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StreamError>,
    },
}

impl StreamError {
    /// Create a malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Create an encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create an upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a frame source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, with any context layers peeled off
    pub fn root(&self) -> &StreamError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the capture loop keeps running after this error.
    ///
    /// Frame-level failures only cost the frame they happened on. Lifecycle
    /// misuse, configuration problems and a closed source are not recoverable
    /// from inside the loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::MalformedFrame(_)
                | Self::Encode(_)
                | Self::Upload(_)
                | Self::UploadStatus { .. }
                | Self::Source(_)
        )
    }

    /// A short hint for the user on how to fix the problem, if there is one
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::MalformedFrame(_) => Some(
                "The capture surface size or row stride does not match the configured width/height. Check [capture] in config.toml.",
            ),
            Self::Upload(_) => Some(
                "Check that the collector is running and the endpoint URL is reachable from this machine.",
            ),
            Self::UploadStatus { .. } => {
                Some("The collector rejected the frame. Check its logs and the endpoint path.")
            }
            Self::Config(_) => Some("Run `screenstream config path` and fix config.toml."),
            Self::AlreadyActive => Some("Stop the running session before starting a new one."),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Upload(format!("request timed out: {}", err))
        } else {
            Self::Upload(err.to_string())
        }
    }
}

impl From<image::ImageError> for StreamError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_peels_context() {
        let err = StreamError::malformed("odd stride").with_context("tick 4");
        assert!(matches!(err.root(), StreamError::MalformedFrame(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_lifecycle_errors_not_recoverable() {
        assert!(!StreamError::AlreadyActive.is_recoverable());
        assert!(!StreamError::SourceClosed.is_recoverable());
        assert!(!StreamError::config("bad").is_recoverable());
    }

    #[test]
    fn test_upload_status_display() {
        let err = StreamError::UploadStatus {
            status: 500,
            endpoint: "http://127.0.0.1:5000/upload".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("/upload"));
    }
}
