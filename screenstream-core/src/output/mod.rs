//! Frame delivery
//!
//! Encoded frames leave the process as HTTP POSTs to a collector.

mod upload;

pub use upload::{UploadPayload, Uploader};
