//! screenstream core library
//!
//! Polls a screen capture surface at a fixed cadence, JPEG-encodes each new
//! frame and posts it to an HTTP collector without letting the network slow
//! down capture.
//!
//! This library provides:
//! - The [`FrameSource`](capture::FrameSource) seam for capture surfaces
//! - Row-padding removal and JPEG encoding
//! - Fire-and-forget HTTP upload
//! - The capture loop controller with its session lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Frame Source │───▶│  Normalize   │───▶│ JPEG Encode  │───▶│ HTTP Upload  │
//! │ (try latest) │    │ (poll loop)  │    │ (detached)   │    │ (detached)   │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod types;

pub use capture::FrameSource;
pub use config::CaptureConfig;
pub use error::{Result, StreamError};
pub use pipeline::{CaptureController, PipelineStats};
pub use session::{AuthorizationGrant, CaptureSession, SessionState};
pub use types::{EncodedFrame, Handle, NormalizedFrame, PixelFormat, RawFrame};
