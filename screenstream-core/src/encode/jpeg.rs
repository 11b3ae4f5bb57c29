//! JPEG compression of normalized frames

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::trace;

use crate::error::{Result, StreamError};
use crate::types::{EncodedFrame, NormalizedFrame, PixelFormat};

/// MIME type of frames produced by [`FrameEncoder`]
pub const JPEG_MIME: &str = "image/jpeg";

/// Fixed-quality JPEG encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    /// Create an encoder with the given quality (1-100)
    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(StreamError::config(format!(
                "JPEG quality must be 1-100, got {}",
                quality
            )));
        }
        Ok(Self { quality })
    }

    /// Configured quality
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress a frame. Alpha is dropped; JPEG has no alpha channel.
    pub fn encode(&self, frame: &NormalizedFrame) -> Result<EncodedFrame> {
        let bpp = frame.format.bytes_per_pixel() as usize;
        let expected = frame.pixel_count() * bpp;
        if frame.data.len() != expected {
            return Err(StreamError::encode(format!(
                "{}x{} {} frame needs {} bytes, got {}",
                frame.width,
                frame.height,
                frame.format,
                expected,
                frame.data.len()
            )));
        }

        let rgb = to_rgb(frame);
        let mut out = Vec::with_capacity(rgb.len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            &rgb,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;

        trace!(
            "Encoded {}x{} frame to {} bytes (q={})",
            frame.width,
            frame.height,
            out.len(),
            self.quality
        );

        Ok(EncodedFrame::new(
            out,
            JPEG_MIME,
            frame.width,
            frame.height,
            frame.timestamp_ns,
        ))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            quality: crate::config::DEFAULT_QUALITY,
        }
    }
}

fn to_rgb(frame: &NormalizedFrame) -> Vec<u8> {
    match frame.format {
        PixelFormat::Rgb888 => frame.data.clone(),
        PixelFormat::Rgba8888 => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        PixelFormat::Bgra8888 => frame
            .data
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
    }
}
