//! Single-frame handoff between a producer thread and the capture loop
//!
//! Holds at most one frame. Publishing replaces whatever is pending, so the
//! consumer always sees the newest frame and never builds a backlog.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::FrameSource;
use crate::error::{Result, StreamError};
use crate::types::RawFrame;

#[derive(Default)]
struct SlotState {
    frame: Option<RawFrame>,
    closed: bool,
}

/// Capacity-1, overwrite-on-arrival frame slot
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl LatestFrameSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any frame still pending.
    ///
    /// Returns `Err(SourceClosed)` once the slot is closed.
    pub fn publish(&self, frame: RawFrame) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StreamError::SourceClosed);
        }
        if let Some(old) = state.frame.replace(frame) {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            trace!("Frame @{}ns superseded before it was polled", old.timestamp_ns);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove and return the pending frame
    pub fn take(&self) -> Option<RawFrame> {
        self.state.lock().frame.take()
    }

    /// Whether a frame is waiting
    pub fn has_pending(&self) -> bool {
        self.state.lock().frame.is_some()
    }

    /// Refuse further frames. A pending frame can still be taken.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Whether the slot has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Frames published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames replaced before anyone took them
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }
}

/// Producer half of a slot channel. Dropping it closes the slot.
pub struct FramePublisher {
    slot: Arc<LatestFrameSlot>,
}

impl FramePublisher {
    /// Publish a frame, replacing any frame the consumer has not taken yet
    pub fn publish(&self, frame: RawFrame) -> Result<()> {
        self.slot.publish(frame)
    }

    /// Whether the consumer has closed the source
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Shared slot, for inspecting counters
    pub fn slot(&self) -> &Arc<LatestFrameSlot> {
        &self.slot
    }
}

impl Drop for FramePublisher {
    fn drop(&mut self) {
        self.slot.close();
    }
}

/// Consumer half of a slot channel
pub struct SlotSource {
    slot: Arc<LatestFrameSlot>,
}

impl SlotSource {
    /// Shared slot, for inspecting counters
    pub fn slot(&self) -> &Arc<LatestFrameSlot> {
        &self.slot
    }
}

impl FrameSource for SlotSource {
    fn try_acquire_latest(&mut self) -> Result<Option<RawFrame>> {
        let mut state = self.slot.state.lock();
        match state.frame.take() {
            Some(frame) => Ok(Some(frame)),
            None if state.closed => Err(StreamError::SourceClosed),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        let mut state = self.slot.state.lock();
        state.closed = true;
        state.frame = None;
    }
}

/// Create a connected publisher/source pair sharing one slot
pub fn latest_frame_channel() -> (FramePublisher, SlotSource) {
    let slot = Arc::new(LatestFrameSlot::new());
    (
        FramePublisher { slot: slot.clone() },
        SlotSource { slot },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    fn frame(ts: u64) -> RawFrame {
        RawFrame::packed(2, 2, PixelFormat::Rgba8888, vec![0; 16], ts)
    }

    #[test]
    fn test_latest_frame_wins() {
        let (publisher, mut source) = latest_frame_channel();
        publisher.publish(frame(1)).unwrap();
        publisher.publish(frame(2)).unwrap();
        publisher.publish(frame(3)).unwrap();

        let got = source.try_acquire_latest().unwrap().unwrap();
        assert_eq!(got.timestamp_ns, 3);
        assert!(source.try_acquire_latest().unwrap().is_none());
        assert_eq!(publisher.slot().superseded(), 2);
        assert_eq!(publisher.slot().published(), 3);
    }

    #[test]
    fn test_dropping_publisher_closes_after_drain() {
        let (publisher, mut source) = latest_frame_channel();
        publisher.publish(frame(7)).unwrap();
        drop(publisher);

        assert!(source.try_acquire_latest().unwrap().is_some());
        assert!(matches!(
            source.try_acquire_latest(),
            Err(StreamError::SourceClosed)
        ));
    }

    #[test]
    fn test_close_rejects_publish() {
        let (publisher, mut source) = latest_frame_channel();
        source.close();
        source.close();
        assert!(publisher.is_closed());
        assert!(matches!(
            publisher.publish(frame(1)),
            Err(StreamError::SourceClosed)
        ));
    }
}
