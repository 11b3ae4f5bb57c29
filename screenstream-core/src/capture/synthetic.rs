//! Synthetic capture surface
//!
//! Renders a moving gradient on a dedicated thread at a fixed frame rate and
//! hands frames over through a [`LatestFrameSlot`]. Rows can carry padding so
//! the normalizer sees the same layout a real capture driver produces.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::slot::{latest_frame_channel, FramePublisher, LatestFrameSlot, SlotSource};
use super::FrameSource;
use crate::error::{Result, StreamError};
use crate::types::{PixelFormat, RawFrame};

/// Byte written into row padding
const PADDING_FILL: u8 = 0xEE;

/// Settings for [`SyntheticSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Extra bytes appended to every row
    pub row_padding: u32,
    /// Frames rendered per second
    pub fps: u32,
    /// Stop after this many frames (the source then reports closed)
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
            format: PixelFormat::Rgba8888,
            row_padding: Self::default_row_padding(PixelFormat::Rgba8888),
            fps: 30,
            frame_limit: None,
        }
    }
}

impl SyntheticConfig {
    /// Eight pixels of padding in the given format
    pub fn default_row_padding(format: PixelFormat) -> u32 {
        8 * format.bytes_per_pixel()
    }

    /// Bytes between row starts
    pub fn row_stride(&self) -> u32 {
        self.width * self.format.bytes_per_pixel() + self.row_padding
    }
}

/// Render one frame of the test pattern.
///
/// The pattern is a diagonal gradient that scrolls by one pixel per frame.
/// Row padding bytes are filled with a constant so leftovers are easy to spot.
pub fn render_test_pattern(config: &SyntheticConfig, frame_no: u64) -> Vec<u8> {
    let bpp = config.format.bytes_per_pixel() as usize;
    let stride = config.row_stride() as usize;
    let width = config.width as usize;
    let mut data = vec![PADDING_FILL; stride * config.height as usize];
    let shift = frame_no as usize;

    for y in 0..config.height as usize {
        let row = &mut data[y * stride..y * stride + width * bpp];
        for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
            let r = ((x + shift) * 255 / width.max(1)) as u8;
            let g = (y * 255 / (config.height as usize).max(1)) as u8;
            let b = ((x + y + shift) % 256) as u8;
            match config.format {
                PixelFormat::Rgba8888 => px.copy_from_slice(&[r, g, b, 255]),
                PixelFormat::Bgra8888 => px.copy_from_slice(&[b, g, r, 255]),
                PixelFormat::Rgb888 => px.copy_from_slice(&[r, g, b]),
            }
        }
    }

    data
}

/// Test-pattern frame source backed by a producer thread
pub struct SyntheticSource {
    /// Consumer side of the frame slot
    source: SlotSource,
    /// Thread handle for the render loop
    thread: Option<std::thread::JoinHandle<()>>,
    /// Channel to signal shutdown
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl SyntheticSource {
    /// Start rendering frames
    pub fn start(config: SyntheticConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 || config.fps == 0 {
            return Err(StreamError::config(format!(
                "Synthetic source needs non-zero size and fps, got {}x{} @ {}fps",
                config.width, config.height, config.fps
            )));
        }

        if config.row_padding % config.format.bytes_per_pixel() != 0 {
            return Err(StreamError::config(format!(
                "Row padding {} is not a whole number of {} pixels ({} bytes each)",
                config.row_padding,
                config.format,
                config.format.bytes_per_pixel()
            )));
        }

        let (publisher, source) = latest_frame_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("screenstream-synthetic".to_string())
            .spawn(move || run_render_loop(config, publisher, shutdown_rx))
            .map_err(|e| {
                StreamError::source(format!("Failed to spawn synthetic source thread: {}", e))
            })?;

        info!(
            "Synthetic source started: {}x{} {} @ {}fps, stride {}",
            config.width,
            config.height,
            config.format,
            config.fps,
            config.row_stride()
        );

        Ok(Self {
            source,
            thread: Some(thread),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Shared slot, for inspecting publish/supersede counters
    pub fn slot(&self) -> &Arc<LatestFrameSlot> {
        self.source.slot()
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    fn join(&mut self) {
        self.signal_shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            debug!("Synthetic source thread joined");
        }
    }
}

impl FrameSource for SyntheticSource {
    fn try_acquire_latest(&mut self) -> Result<Option<RawFrame>> {
        self.source.try_acquire_latest()
    }

    /// Stops the render thread without waiting for it; dropping joins it.
    fn close(&mut self) {
        self.source.close();
        self.signal_shutdown();
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.source.close();
        self.join();
    }
}

/// Render loop (runs on the dedicated thread)
fn run_render_loop(
    config: SyntheticConfig,
    publisher: FramePublisher,
    shutdown_rx: mpsc::Receiver<()>,
) {
    let frame_interval = Duration::from_secs(1) / config.fps;
    let started = Instant::now();
    let mut frame_no = 0u64;

    loop {
        if config.frame_limit.is_some_and(|limit| frame_no >= limit) {
            debug!("Synthetic source reached its frame limit ({})", frame_no);
            break;
        }

        let frame = RawFrame {
            data: render_test_pattern(&config, frame_no),
            format: config.format,
            width: config.width,
            height: config.height,
            row_stride: config.row_stride(),
            pixel_stride: config.format.bytes_per_pixel(),
            timestamp_ns: started.elapsed().as_nanos() as u64,
        };

        if publisher.publish(frame).is_err() {
            break;
        }
        frame_no += 1;

        match shutdown_rx.recv_timeout(frame_interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    // Dropping the publisher closes the slot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_layout() {
        let config = SyntheticConfig {
            width: 4,
            height: 3,
            row_padding: 8,
            ..Default::default()
        };
        let data = render_test_pattern(&config, 0);
        assert_eq!(data.len(), (4 * 4 + 8) * 3);
        // Padding sits after each row's pixels
        assert!(data[16..24].iter().all(|&b| b == PADDING_FILL));
        // Alpha channel is opaque
        assert_eq!(data[3], 255);
    }

    #[test]
    fn test_source_ends_after_frame_limit() {
        let mut source = SyntheticSource::start(SyntheticConfig {
            width: 8,
            height: 8,
            fps: 200,
            frame_limit: Some(3),
            ..Default::default()
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut frames = 0;
        loop {
            match source.try_acquire_latest() {
                Ok(Some(_)) => frames += 1,
                Ok(None) => std::thread::sleep(Duration::from_millis(1)),
                Err(StreamError::SourceClosed) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
            assert!(Instant::now() < deadline, "source never closed");
        }
        assert!(frames >= 1 && frames <= 3);
    }

    #[test]
    fn test_zero_fps_rejected() {
        let result = SyntheticSource::start(SyntheticConfig {
            fps: 0,
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_padding_must_be_whole_pixels() {
        let result = SyntheticSource::start(SyntheticConfig {
            format: PixelFormat::Rgb888,
            row_padding: 32,
            ..Default::default()
        });
        assert!(matches!(result, Err(StreamError::Config(_))));

        let padding = SyntheticConfig::default_row_padding(PixelFormat::Rgb888);
        assert_eq!(padding, 24);
        let source = SyntheticSource::start(SyntheticConfig {
            width: 8,
            height: 8,
            format: PixelFormat::Rgb888,
            row_padding: padding,
            frame_limit: Some(1),
            ..Default::default()
        });
        assert!(source.is_ok());
    }

    #[test]
    fn test_close_does_not_join_render_thread() {
        let mut source = SyntheticSource::start(SyntheticConfig {
            width: 8,
            height: 8,
            fps: 1,
            ..Default::default()
        })
        .unwrap();

        source.close();
        assert!(source.thread.is_some());
        assert!(matches!(
            source.try_acquire_latest(),
            Err(StreamError::SourceClosed)
        ));

        let deadline = Instant::now() + Duration::from_secs(2);
        while !source.thread.as_ref().is_some_and(|t| t.is_finished()) {
            assert!(Instant::now() < deadline, "render thread kept running");
            std::thread::sleep(Duration::from_millis(5));
        }
        drop(source);
    }
}
