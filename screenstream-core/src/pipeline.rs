//! Capture loop controller
//!
//! Polls the frame source at a fixed cadence. Each hit is normalized on the
//! loop itself, then encoding and upload run as a detached task so a slow
//! collector never delays the next poll.
//!
//! ```text
//! ┌──────────────┐  poll   ┌────────────┐  spawn  ┌─────────┐   ┌──────────┐
//! │ Frame Source │────────▶│ Normalizer │────────▶│ Encoder │──▶│ Uploader │
//! └──────────────┘         └────────────┘         └─────────┘   └──────────┘
//!        ▲                       │
//!        └── sleep(poll_interval)┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::capture::FrameSource;
use crate::encode::{FrameEncoder, FrameNormalizer};
use crate::error::{Result, StreamError};
use crate::output::Uploader;
use crate::session::{CaptureSession, SessionState};
use crate::types::NormalizedFrame;

/// Counters shared between the loop and its upload tasks
#[derive(Debug, Default)]
struct Counters {
    polls: AtomicU64,
    misses: AtomicU64,
    frames_captured: AtomicU64,
    malformed: AtomicU64,
    source_errors: AtomicU64,
    encode_failures: AtomicU64,
    uploads_dispatched: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    dropped_busy: AtomicU64,
    in_flight: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    /// No new frame
    Miss,
    /// Frame normalized and handed off
    Dispatched,
    /// Frame dropped before hand-off
    Skipped,
    /// Source is gone
    Closed,
}

/// Everything the poll loop needs besides the source
struct LoopContext {
    normalizer: FrameNormalizer,
    encoder: FrameEncoder,
    uploader: Uploader,
    poll_interval: Duration,
    in_flight_limit: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
}

/// Drives one capture session at a time
///
/// Owns the frame source exclusively. While a session is active the source
/// lives inside the poll task; it is closed when the loop ends.
pub struct CaptureController<S: FrameSource + 'static> {
    /// Source, held here until the session starts
    source: Option<S>,
    /// Current session (kept after stop for inspection)
    session: Option<CaptureSession>,
    /// Poll loop task
    loop_handle: Option<JoinHandle<()>>,
    /// Signals the poll loop to exit
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Shared counters
    counters: Arc<Counters>,
    /// Start time
    start_time: Option<Instant>,
    /// Uptime frozen when the loop was joined
    final_uptime: Option<Duration>,
}

impl<S: FrameSource + 'static> CaptureController<S> {
    /// Create a controller that will drive the given source
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            session: None,
            loop_handle: None,
            shutdown_tx: None,
            counters: Arc::new(Counters::default()),
            start_time: None,
            final_uptime: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        match &self.session {
            // The loop ended on its own (source closed) but nobody joined it yet
            Some(_) if self.loop_finished() => SessionState::Stopped,
            Some(session) => session.state(),
            None if self.source.is_some() => SessionState::Idle,
            None => SessionState::Stopped,
        }
    }

    /// The session being (or last) driven
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    fn loop_finished(&self) -> bool {
        self.loop_handle.as_ref().is_some_and(|h| h.is_finished())
    }

    /// Whether the poll loop is still running
    pub fn is_running(&self) -> bool {
        self.loop_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Start polling for the given session.
    ///
    /// Spawns the poll loop on the current tokio runtime; the first poll
    /// happens right away. Fails with `AlreadyActive` if a session is running
    /// and `SessionStopped` once the controller has been stopped.
    pub fn start(&mut self, mut session: CaptureSession) -> Result<()> {
        match self.state() {
            SessionState::Active => return Err(StreamError::AlreadyActive),
            SessionState::Stopped => return Err(StreamError::SessionStopped),
            SessionState::Idle => {}
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            StreamError::config("CaptureController::start must run inside a tokio runtime")
        })?;

        let config = session.config();
        let encoder = FrameEncoder::new(config.quality)?;
        let uploader = Uploader::from_config(config)?;
        let ctx = LoopContext {
            normalizer: FrameNormalizer::new(config.width, config.height),
            encoder,
            uploader,
            poll_interval: config.poll_interval(),
            in_flight_limit: config
                .in_flight_limit()
                .map(|n| Arc::new(Semaphore::new(n))),
            counters: self.counters.clone(),
        };

        let source = self.source.take().ok_or(StreamError::SessionStopped)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            "Starting {}: {}x{} every {}ms -> {} (q={}{})",
            session.handle(),
            config.width,
            config.height,
            config.poll_interval_ms,
            config.endpoint,
            config.quality,
            match config.in_flight_limit() {
                Some(n) => format!(", max {} in flight", n),
                None => String::new(),
            }
        );

        let handle = session.handle();
        self.loop_handle = Some(runtime.spawn(async move {
            run_capture_loop(source, ctx, shutdown_rx).await;
            debug!("Poll loop for {} exited", handle);
        }));
        self.shutdown_tx = Some(shutdown_tx);
        self.start_time = Some(Instant::now());

        session.set_state(SessionState::Active);
        self.session = Some(session);
        Ok(())
    }

    /// Stop polling.
    ///
    /// Waits for the current tick's synchronous part and for the source to
    /// close; uploads already dispatched keep running on their own. Once this returns no further
    /// uploads are dispatched. Stopping twice is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Idle => return Err(StreamError::NoActiveSession),
            SessionState::Stopped => {
                self.join_loop().await;
                return Ok(());
            }
            SessionState::Active => {}
        }

        if let Some(session) = &self.session {
            info!("Stopping {}", session.handle());
        }
        if let Some(tx) = &self.shutdown_tx {
            let _ = tx.send(true);
        }

        self.join_loop().await;
        Ok(())
    }

    /// Wait until the poll loop ends on its own (the source closed).
    ///
    /// Cancel-safe: dropping the future leaves the session running.
    pub async fn wait(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Idle => Err(StreamError::NoActiveSession),
            SessionState::Stopped | SessionState::Active => {
                self.join_loop().await;
                Ok(())
            }
        }
    }

    async fn join_loop(&mut self) {
        let Some(handle) = self.loop_handle.as_mut() else {
            return;
        };
        if let Err(e) = handle.await {
            warn!("Poll loop task failed: {}", e);
        }
        self.loop_handle = None;
        self.shutdown_tx = None;
        self.final_uptime = self.start_time.map(|t| t.elapsed());

        let stats = self.stats();
        if let Some(session) = self.session.as_mut() {
            session.set_state(SessionState::Stopped);
            info!("{} stopped ({})", session.handle(), stats);
        }
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            polls: c.polls.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            frames_captured: c.frames_captured.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            source_errors: c.source_errors.load(Ordering::Relaxed),
            encode_failures: c.encode_failures.load(Ordering::Relaxed),
            uploads_dispatched: c.uploads_dispatched.load(Ordering::Relaxed),
            uploads_succeeded: c.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: c.uploads_failed.load(Ordering::Relaxed),
            dropped_busy: c.dropped_busy.load(Ordering::Relaxed),
            in_flight: c.in_flight.load(Ordering::Relaxed),
            uptime: self
                .final_uptime
                .or_else(|| self.start_time.map(|t| t.elapsed()))
                .unwrap_or_default(),
        }
    }
}

impl<S: FrameSource + 'static> Drop for CaptureController<S> {
    fn drop(&mut self) {
        // The loop closes the source on its way out
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
    }
}

/// Poll loop (runs as its own task)
async fn run_capture_loop<S: FrameSource + 'static>(
    mut source: S,
    ctx: LoopContext,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if poll_once(&mut source, &ctx) == Tick::Closed {
            info!("Frame source closed, ending capture");
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                // Sender dropped counts as shutdown too
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }

    // Closing may join a producer thread; keep it off the async workers
    let closed = tokio::task::spawn_blocking(move || {
        source.close();
        drop(source);
    })
    .await;
    if let Err(e) = closed {
        warn!("Closing frame source failed: {}", e);
    }
}

/// One tick: acquire, normalize, hand off. Never blocks.
fn poll_once<S: FrameSource>(source: &mut S, ctx: &LoopContext) -> Tick {
    let counters = &ctx.counters;
    Counters::bump(&counters.polls);

    let raw = match source.try_acquire_latest() {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            Counters::bump(&counters.misses);
            trace!("No new frame");
            return Tick::Miss;
        }
        Err(StreamError::SourceClosed) => return Tick::Closed,
        Err(e) => {
            Counters::bump(&counters.source_errors);
            warn!("Frame source error, skipping tick: {}", e);
            return Tick::Skipped;
        }
    };
    Counters::bump(&counters.frames_captured);

    let normalized = match ctx.normalizer.normalize(&raw) {
        Ok(frame) => frame,
        Err(e) => {
            Counters::bump(&counters.malformed);
            warn!("Skipping frame @{}ns: {}", raw.timestamp_ns, e);
            return Tick::Skipped;
        }
    };
    // Release the capture buffer before doing anything slow
    drop(raw);

    dispatch(normalized, ctx)
}

/// Spawn encode + upload for one frame without waiting on it
fn dispatch(frame: NormalizedFrame, ctx: &LoopContext) -> Tick {
    let counters = ctx.counters.clone();

    let permit = match &ctx.in_flight_limit {
        Some(limit) => match limit.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                Counters::bump(&counters.dropped_busy);
                debug!(
                    "Upload limit reached, dropping frame @{}ns",
                    frame.timestamp_ns
                );
                return Tick::Skipped;
            }
        },
        None => None,
    };

    Counters::bump(&counters.uploads_dispatched);
    counters.in_flight.fetch_add(1, Ordering::Relaxed);

    let encoder = ctx.encoder;
    let uploader = ctx.uploader.clone();
    tokio::spawn(async move {
        let _permit = permit;
        deliver(frame, encoder, uploader, &counters).await;
        counters.in_flight.fetch_sub(1, Ordering::Relaxed);
    });

    Tick::Dispatched
}

async fn deliver(
    frame: NormalizedFrame,
    encoder: FrameEncoder,
    uploader: Uploader,
    counters: &Counters,
) {
    let ts = frame.timestamp_ns;

    let encoded = match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(e)) => {
            Counters::bump(&counters.encode_failures);
            warn!("Dropping frame @{}ns, encode failed: {}", ts, e);
            return;
        }
        Err(e) => {
            Counters::bump(&counters.encode_failures);
            warn!("Dropping frame @{}ns, encoder task failed: {}", ts, e);
            return;
        }
    };

    match uploader.upload(encoded).await {
        Ok(()) => Counters::bump(&counters.uploads_succeeded),
        Err(e) => {
            Counters::bump(&counters.uploads_failed);
            warn!("Dropping frame @{}ns: {}", ts, e);
        }
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Poll ticks run
    pub polls: u64,
    /// Ticks that found no new frame
    pub misses: u64,
    /// Frames taken from the source
    pub frames_captured: u64,
    /// Frames rejected by the normalizer
    pub malformed: u64,
    /// Ticks lost to source errors
    pub source_errors: u64,
    /// Frames the encoder rejected
    pub encode_failures: u64,
    /// Encode+upload units spawned
    pub uploads_dispatched: u64,
    /// Uploads answered with 2xx
    pub uploads_succeeded: u64,
    /// Uploads that failed or were rejected
    pub uploads_failed: u64,
    /// Frames dropped because the in-flight limit was reached
    pub dropped_busy: u64,
    /// Uploads currently running
    pub in_flight: u64,
    /// Time since start
    pub uptime: Duration,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} polls, {} frames, {} uploaded, {} failed, {} malformed, {} dropped in {:.1}s",
            self.polls,
            self.frames_captured,
            self.uploads_succeeded,
            self.uploads_failed + self.encode_failures,
            self.malformed,
            self.dropped_busy,
            self.uptime.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::latest_frame_channel;
    use crate::config::CaptureConfig;
    use crate::session::AuthorizationGrant;
    use crate::types::{PixelFormat, RawFrame};

    fn context(limit: Option<usize>) -> LoopContext {
        LoopContext {
            normalizer: FrameNormalizer::new(4, 4),
            encoder: FrameEncoder::default(),
            uploader: Uploader::new("http://127.0.0.1:9/upload", Duration::from_millis(200))
                .unwrap(),
            poll_interval: Duration::from_millis(10),
            in_flight_limit: limit.map(|n| Arc::new(Semaphore::new(n))),
            counters: Arc::new(Counters::default()),
        }
    }

    fn frame(stride: u32) -> RawFrame {
        RawFrame {
            data: vec![0; (stride * 4) as usize],
            format: PixelFormat::Rgba8888,
            width: 4,
            height: 4,
            row_stride: stride,
            pixel_stride: 4,
            timestamp_ns: 1,
        }
    }

    #[tokio::test]
    async fn test_poll_once_outcomes() {
        let ctx = context(None);
        let (publisher, mut source) = latest_frame_channel();

        assert_eq!(poll_once(&mut source, &ctx), Tick::Miss);

        publisher.publish(frame(18)).unwrap();
        assert_eq!(poll_once(&mut source, &ctx), Tick::Skipped);

        publisher.publish(frame(16)).unwrap();
        assert_eq!(poll_once(&mut source, &ctx), Tick::Dispatched);

        drop(publisher);
        assert_eq!(poll_once(&mut source, &ctx), Tick::Closed);

        let c = &ctx.counters;
        assert_eq!(c.polls.load(Ordering::Relaxed), 4);
        assert_eq!(c.misses.load(Ordering::Relaxed), 1);
        assert_eq!(c.malformed.load(Ordering::Relaxed), 1);
        assert_eq!(c.uploads_dispatched.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_in_flight_limit_drops_instead_of_queueing() {
        let ctx = context(Some(1));
        let (publisher, mut source) = latest_frame_channel();

        publisher.publish(frame(16)).unwrap();
        assert_eq!(poll_once(&mut source, &ctx), Tick::Dispatched);
        publisher.publish(frame(16)).unwrap();
        assert_eq!(poll_once(&mut source, &ctx), Tick::Skipped);

        assert_eq!(ctx.counters.dropped_busy.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        let (_publisher, source) = latest_frame_channel();
        let mut controller = CaptureController::new(source);
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(matches!(
            controller.stop().await,
            Err(StreamError::NoActiveSession)
        ));
        assert_eq!(controller.state(), SessionState::Idle);

        let config = CaptureConfig::new("http://127.0.0.1:9/upload").with_size(4, 4);
        let session = CaptureSession::new(AuthorizationGrant::new("t"), config.clone()).unwrap();
        controller.start(session).unwrap();

        let again = CaptureSession::new(AuthorizationGrant::new("t"), config.clone()).unwrap();
        assert!(matches!(
            controller.start(again),
            Err(StreamError::AlreadyActive)
        ));

        controller.stop().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);

        let late = CaptureSession::new(AuthorizationGrant::new("t"), config).unwrap();
        assert!(matches!(
            controller.start(late),
            Err(StreamError::SessionStopped)
        ));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (_publisher, source) = latest_frame_channel();
        let mut controller = CaptureController::new(source);
        let session =
            CaptureSession::new(AuthorizationGrant::new("t"), CaptureConfig::default()).unwrap();
        assert!(matches!(
            controller.start(session),
            Err(StreamError::Config(_))
        ));
        assert_eq!(controller.state(), SessionState::Idle);
    }
}
