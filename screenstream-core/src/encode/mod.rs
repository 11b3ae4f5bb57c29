//! Frame preparation and compression
//!
//! This module provides:
//! - Row-padding removal and cropping to the output size
//! - Fixed-quality JPEG encoding

mod jpeg;
mod normalize;

pub use jpeg::{FrameEncoder, JPEG_MIME};
pub use normalize::FrameNormalizer;
