//! Row-padding removal and cropping
//!
//! Capture drivers hand out buffers whose rows are wider than the visible
//! image. The normalizer treats each row as `target_width + padding /
//! pixel_stride` pixels and crops to the top-left `target_width x
//! target_height` rectangle, producing a tightly packed buffer.

use tracing::trace;

use crate::error::{Result, StreamError};
use crate::types::{NormalizedFrame, RawFrame};

/// Strips row padding and crops raw frames to the session's output size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNormalizer {
    width: u32,
    height: u32,
}

impl FrameNormalizer {
    /// Create a normalizer for the given output size
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Output size (width, height)
    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Produce a packed `width x height` copy of the frame.
    ///
    /// Fails with [`StreamError::MalformedFrame`] when the stride metadata
    /// cannot describe a frame of the output size. Never panics on bad input.
    pub fn normalize(&self, raw: &RawFrame) -> Result<NormalizedFrame> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::malformed(format!(
                "output size {}x{} is empty",
                self.width, self.height
            )));
        }

        let pixel_stride = raw.pixel_stride;
        if pixel_stride == 0 || pixel_stride != raw.format.bytes_per_pixel() {
            return Err(StreamError::malformed(format!(
                "pixel stride {} does not match {} ({} bytes)",
                pixel_stride,
                raw.format,
                raw.format.bytes_per_pixel()
            )));
        }

        if raw.width < self.width || raw.height < self.height {
            return Err(StreamError::malformed(format!(
                "frame {}x{} is smaller than output {}x{}",
                raw.width, raw.height, self.width, self.height
            )));
        }

        let row_padding = raw.row_padding(self.width);
        if row_padding < 0 {
            return Err(StreamError::malformed(format!(
                "row stride {} cannot hold {} pixels of {} bytes",
                raw.row_stride, self.width, pixel_stride
            )));
        }
        if row_padding % pixel_stride as i64 != 0 {
            return Err(StreamError::malformed(format!(
                "row padding {} is not a multiple of pixel stride {}",
                row_padding, pixel_stride
            )));
        }

        let padded_width = self.width as usize + row_padding as usize / pixel_stride as usize;
        let stride = raw.row_stride as usize;
        let row_bytes = self.width as usize * pixel_stride as usize;
        let rows = self.height as usize;

        // The last row may end without its padding
        let required = stride
            .checked_mul(rows.saturating_sub(1))
            .and_then(|v| v.checked_add(row_bytes))
            .ok_or_else(|| StreamError::malformed("frame dimensions overflow"))?;
        if raw.data.len() < required {
            return Err(StreamError::malformed(format!(
                "buffer holds {} bytes, {} needed for {} rows of stride {}",
                raw.data.len(),
                required,
                rows,
                stride
            )));
        }

        trace!(
            "Normalizing {}x{} (stride {}, padded width {}) -> {}x{}",
            raw.width, raw.height, stride, padded_width, self.width, self.height
        );

        let mut data = Vec::with_capacity(row_bytes * rows);
        for row in raw.data.chunks(stride).take(rows) {
            data.extend_from_slice(&row[..row_bytes]);
        }

        Ok(NormalizedFrame {
            data,
            format: raw.format,
            width: self.width,
            height: self.height,
            timestamp_ns: raw.timestamp_ns,
        })
    }
}
