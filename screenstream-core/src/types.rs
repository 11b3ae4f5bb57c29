//! Core types for screenstream
//!
//! These types represent the frames as they move through the
//! poll, normalize, encode and upload stages.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// Pixel layout of a capture buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit R, G, B, A
    #[default]
    Rgba8888,
    /// 8-bit B, G, R, A
    Bgra8888,
    /// 8-bit R, G, B, no alpha
    Rgb888,
}

impl PixelFormat {
    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba8888 | Self::Bgra8888 => 4,
            Self::Rgb888 => 3,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgba8888 => write!(f, "RGBA8888"),
            Self::Bgra8888 => write!(f, "BGRA8888"),
            Self::Rgb888 => write!(f, "RGB888"),
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rgba" | "rgba8888" => Ok(Self::Rgba8888),
            "bgra" | "bgra8888" => Ok(Self::Bgra8888),
            "rgb" | "rgb888" => Ok(Self::Rgb888),
            _ => Err(format!("Unknown pixel format: {}", s)),
        }
    }
}

/// Pixel buffer as delivered by a frame source
///
/// Rows may carry trailing padding: `row_stride` is the distance in bytes
/// between the starts of consecutive rows and can exceed
/// `width * pixel_stride`.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Pixel bytes, `row_stride` bytes per row
    pub data: Vec<u8>,
    /// Pixel layout
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes between row starts
    pub row_stride: u32,
    /// Bytes between pixel starts
    pub pixel_stride: u32,
    /// Capture timestamp in nanoseconds, monotonically increasing per source
    pub timestamp_ns: u64,
}

impl RawFrame {
    /// Build a frame whose rows have no padding
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        timestamp_ns: u64,
    ) -> Self {
        let pixel_stride = format.bytes_per_pixel();
        Self {
            data,
            format,
            width,
            height,
            row_stride: width * pixel_stride,
            pixel_stride,
            timestamp_ns,
        }
    }

    /// Padding bytes at the end of each row for the given output width.
    ///
    /// Negative when the stride cannot even hold `target_width` pixels.
    pub fn row_padding(&self, target_width: u32) -> i64 {
        self.row_stride as i64 - self.pixel_stride as i64 * target_width as i64
    }
}

/// Tightly packed pixel buffer at exactly the session's output size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFrame {
    /// `width * height * format.bytes_per_pixel()` bytes, row-major
    pub data: Vec<u8>,
    /// Pixel layout
    pub format: PixelFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Capture timestamp carried over from the raw frame
    pub timestamp_ns: u64,
}

impl NormalizedFrame {
    /// Number of pixels in the frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Compressed image ready for upload
///
/// Produced once by the encoder and consumed once by the uploader.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    data: Bytes,
    mime: &'static str,
    width: u32,
    height: u32,
    timestamp_ns: u64,
}

impl EncodedFrame {
    /// Wrap an encoded payload
    pub fn new(
        data: impl Into<Bytes>,
        mime: &'static str,
        width: u32,
        height: u32,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            data: data.into(),
            mime,
            width,
            height,
            timestamp_ns,
        }
    }

    /// Encoded image bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// MIME type of the payload, e.g. `image/jpeg`
    pub fn mime(&self) -> &'static str {
        self.mime
    }

    /// Image dimensions (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Capture timestamp in nanoseconds
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Self-describing `data:` URI carrying the payload as unwrapped base64
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            BASE64_STANDARD.encode(&self.data)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = Handle::new();
        let b = Handle::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_row_padding() {
        let frame = RawFrame {
            data: Vec::new(),
            format: PixelFormat::Rgba8888,
            width: 728,
            height: 1280,
            row_stride: 2912,
            pixel_stride: 4,
            timestamp_ns: 0,
        };
        assert_eq!(frame.row_padding(720), 32);
        assert_eq!(frame.row_padding(800), -288);
    }

    #[test]
    fn test_packed_frame_stride() {
        let frame = RawFrame::packed(10, 2, PixelFormat::Rgb888, vec![0; 60], 1);
        assert_eq!(frame.row_stride, 30);
        assert_eq!(frame.pixel_stride, 3);
        assert_eq!(frame.row_padding(10), 0);
    }

    #[test]
    fn test_data_uri_has_no_line_breaks() {
        let frame = EncodedFrame::new(vec![0xAB; 300], "image/jpeg", 1, 1, 0);
        let uri = frame.to_data_uri();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(!uri.contains('\n'));
        assert_eq!(uri.len(), "data:image/jpeg;base64,".len() + 400);
    }

    #[test]
    fn test_pixel_format_parse() {
        assert_eq!("rgba".parse::<PixelFormat>(), Ok(PixelFormat::Rgba8888));
        assert_eq!("BGRA8888".parse::<PixelFormat>(), Ok(PixelFormat::Bgra8888));
        assert!("yuv".parse::<PixelFormat>().is_err());
    }
}
