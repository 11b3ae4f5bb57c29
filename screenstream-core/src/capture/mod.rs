//! Frame sources
//!
//! The capture loop only sees the [`FrameSource`] trait. Platform capture
//! surfaces live outside this crate; anything that can hand out the latest
//! raw frame without blocking can drive a session.
//!
//! This module provides:
//! - A capacity-1, overwrite-on-arrival slot for producers that run on their own thread
//! - A synthetic test-pattern source for the CLI and tests

mod slot;
mod synthetic;

pub use slot::{latest_frame_channel, FramePublisher, LatestFrameSlot, SlotSource};
pub use synthetic::{render_test_pattern, SyntheticConfig, SyntheticSource};

use crate::error::Result;
use crate::types::RawFrame;

/// Provider of raw pixel buffers from a capture surface
pub trait FrameSource: Send {
    /// Take the most recent frame, if a new one is ready.
    ///
    /// Must not block. `Ok(None)` means nothing new since the last call.
    /// `Err(StreamError::SourceClosed)` means the surface is gone for good and
    /// the session should end; other errors cost only the current poll.
    fn try_acquire_latest(&mut self) -> Result<Option<RawFrame>>;

    /// Release the underlying resources. Calling it twice is harmless.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn try_acquire_latest(&mut self) -> Result<Option<RawFrame>> {
        (**self).try_acquire_latest()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
