//! Capture sessions and the grants that authorize them

use crate::config::CaptureConfig;
use crate::error::{Result, StreamError};
use crate::types::Handle;
use std::time::Duration;

/// Proof that the user allowed screen capture
///
/// Obtained from the platform's permission flow. Single use: building a
/// [`CaptureSession`] consumes it.
pub struct AuthorizationGrant {
    token: String,
}

impl AuthorizationGrant {
    /// Wrap an opaque token from the platform
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The opaque token
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started
    Idle,
    /// Poll loop running
    Active,
    /// Terminal
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// One authorized capture session
#[derive(Debug)]
pub struct CaptureSession {
    handle: Handle,
    config: CaptureConfig,
    state: SessionState,
}

impl CaptureSession {
    /// Create a session from a grant. The config must pass strict validation.
    pub fn new(grant: AuthorizationGrant, config: CaptureConfig) -> Result<Self> {
        config.validate_strict().map_err(StreamError::Config)?;
        drop(grant);

        Ok(Self {
            handle: Handle::new(),
            config,
            state: SessionState::Idle,
        })
    }

    /// Session handle
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Session configuration
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Output width in pixels
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Output height in pixels
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Delay between poll ticks
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    /// Collector URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session =
            CaptureSession::new(AuthorizationGrant::new("grant"), CaptureConfig::default()).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!((session.width(), session.height()), (720, 1280));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CaptureConfig::default().with_quality(0);
        let result = CaptureSession::new(AuthorizationGrant::new("grant"), config);
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[test]
    fn test_grant_debug_hides_token() {
        let grant = AuthorizationGrant::new("secret-token");
        assert!(!format!("{:?}", grant).contains("secret-token"));
        assert_eq!(grant.token(), "secret-token");
    }
}
