//! Mock infrastructure for testing
//!
//! Provides frame builders, a scripted frame source that records every poll,
//! and a local HTTP collector.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use parking_lot::Mutex;
use screenstream_core::capture::FrameSource;
use screenstream_core::error::{Result, StreamError};
use screenstream_core::types::{PixelFormat, RawFrame};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Create an RGBA frame whose rows are `row_stride` bytes apart
///
/// Pixels hold a gradient whose bytes stay below 0xEE; padding bytes are 0xEE.
pub fn create_padded_frame(width: u32, height: u32, row_stride: u32, timestamp_ns: u64) -> RawFrame {
    let mut data = vec![0xEEu8; (row_stride * height) as usize];
    for y in 0..height {
        for x in 0..width.min(row_stride / 4) {
            let off = (y * row_stride + x * 4) as usize;
            data[off..off + 4].copy_from_slice(&[(x % 200) as u8, (y % 200) as u8, 128, 200]);
        }
    }

    RawFrame {
        data,
        format: PixelFormat::Rgba8888,
        width,
        height,
        row_stride,
        pixel_stride: 4,
        timestamp_ns,
    }
}

/// Create a packed RGBA frame of a solid color
pub fn create_test_frame(width: u32, height: u32, color: [u8; 4]) -> RawFrame {
    let data = color.repeat((width * height) as usize);
    RawFrame::packed(width, height, PixelFormat::Rgba8888, data, now_ns())
}

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// What the scripted source does once its script runs out
#[derive(Debug, Clone)]
pub enum AfterScript {
    /// Report "no frame" forever
    Idle,
    /// Hand out a copy of this frame on every poll
    Repeat(RawFrame),
    /// Report the source as closed
    Close,
}

/// Observations made by a [`ScriptedSource`], shared with the test
#[derive(Default)]
pub struct SourceMonitor {
    polls: Mutex<Vec<Instant>>,
    served: AtomicU64,
    closed: AtomicBool,
}

impl SourceMonitor {
    /// Number of polls so far
    pub fn poll_count(&self) -> usize {
        self.polls.lock().len()
    }

    /// Poll instants
    pub fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().clone()
    }

    /// Frames handed out
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::SeqCst)
    }

    /// Whether close() was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Frame source that replays a fixed script of poll results
pub struct ScriptedSource {
    script: VecDeque<Option<RawFrame>>,
    after: AfterScript,
    monitor: Arc<SourceMonitor>,
}

impl ScriptedSource {
    /// Create a source from a script
    pub fn new(script: Vec<Option<RawFrame>>, after: AfterScript) -> (Self, Arc<SourceMonitor>) {
        let monitor = Arc::new(SourceMonitor::default());
        (
            Self {
                script: script.into(),
                after,
                monitor: monitor.clone(),
            },
            monitor,
        )
    }

    /// A source that never has a frame
    pub fn empty() -> (Self, Arc<SourceMonitor>) {
        Self::new(Vec::new(), AfterScript::Idle)
    }
}

impl FrameSource for ScriptedSource {
    fn try_acquire_latest(&mut self) -> Result<Option<RawFrame>> {
        self.monitor.polls.lock().push(Instant::now());
        if self.monitor.is_closed() {
            return Err(StreamError::SourceClosed);
        }

        let next = match self.script.pop_front() {
            Some(step) => step,
            None => match &self.after {
                AfterScript::Idle => None,
                AfterScript::Repeat(frame) => Some(frame.clone()),
                AfterScript::Close => return Err(StreamError::SourceClosed),
            },
        };

        if next.is_some() {
            self.monitor.served.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }

    fn close(&mut self) {
        self.monitor.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct CollectorState {
    status: StatusCode,
    delay: Duration,
    received: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicU64>,
}

/// Local HTTP collector accepting `POST /upload`
pub struct TestCollector {
    /// Full upload URL
    pub url: String,
    received: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicU64>,
}

impl TestCollector {
    /// Start a collector answering every upload with `status`
    pub async fn start(status: StatusCode) -> Self {
        Self::start_with_delay(status, Duration::ZERO).await
    }

    /// Start a collector that waits `delay` before answering
    pub async fn start_with_delay(status: StatusCode, delay: Duration) -> Self {
        let state = CollectorState {
            status,
            delay,
            received: Arc::new(Mutex::new(Vec::new())),
            hits: Arc::new(AtomicU64::new(0)),
        };
        let received = state.received.clone();
        let hits = state.hits.clone();

        let app = Router::new()
            .route("/upload", post(handle_upload))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind collector");
        let addr = listener.local_addr().expect("collector addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/upload", addr),
            received,
            hits,
        }
    }

    /// Requests received so far
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    /// `image` fields received so far
    pub fn images(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Wait until at least `n` requests arrived, or the timeout passes
    pub async fn wait_for_hits(&self, n: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.hits() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.hits() >= n
    }
}

async fn handle_upload(
    State(state): State<CollectorState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(image) = body.get("image").and_then(|v| v.as_str()) {
        state.received.lock().push(image.to_string());
    }
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.status
}

/// Decode a `data:image/jpeg;base64,...` URI and return the image size
pub fn decode_data_uri(uri: &str) -> (u32, u32) {
    let b64 = uri
        .strip_prefix("data:image/jpeg;base64,")
        .expect("jpeg data uri prefix");
    let bytes = BASE64_STANDARD.decode(b64).expect("valid base64");
    let img = image::load_from_memory(&bytes).expect("decodable jpeg");
    (img.width(), img.height())
}
