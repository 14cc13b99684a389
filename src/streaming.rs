//! MJPEG streaming session.
//!
//! A session loops capture, optional recognition, and transmit until the
//! peer goes away or the camera fails. It runs on a blocking worker and
//! hands multipart parts to the HTTP body through a bounded channel, so a
//! slow client throttles capture instead of buffering frames.

use std::convert::Infallible;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::frame::Frame;
use crate::recognition::TextRecognizer;
use crate::session::CameraSession;
use crate::text_cache::RecognizedText;
use crate::traits::{CameraDevice, CameraError};

/// Boundary separating MJPEG parts. Must not occur in JPEG data.
pub const MJPEG_BOUNDARY: &str = "pi_cam_frame_4f1e0b7a";

/// Parts buffered between the capture worker and the connection.
const STREAM_BUFFER_PARTS: usize = 1;

/// The connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream peer disconnected")]
pub struct Disconnected;

/// Destination for encoded multipart parts.
pub trait FrameSink {
    /// Whether the peer is still there.
    fn is_open(&self) -> bool;

    /// Send one part, blocking while the peer is not keeping up.
    fn send(&mut self, part: Bytes) -> Result<(), Disconnected>;

    /// Parts that have left the sink for the connection. Parts still
    /// buffered when the peer goes away are not counted.
    fn written(&self) -> u64;
}

/// [`FrameSink`] feeding a streaming HTTP response body.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    written: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Sink paired with the response that drains it.
    pub fn channel() -> (Self, Response) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER_PARTS);
        let written = Arc::new(AtomicU64::new(0));
        let response = mjpeg_response(rx, Arc::clone(&written));
        (Self { tx, written }, response)
    }
}

impl FrameSink for ChannelSink {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&mut self, part: Bytes) -> Result<(), Disconnected> {
        self.tx.blocking_send(Ok(part)).map_err(|_| Disconnected)
    }

    fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }
}

fn mjpeg_response(
    rx: mpsc::Receiver<Result<Bytes, Infallible>>,
    written: Arc<AtomicU64>,
) -> Response {
    // Counted when the body hands a part to the connection, not when queued.
    let parts = ReceiverStream::new(rx).map(move |part| {
        written.fetch_add(1, Ordering::AcqRel);
        part
    });

    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace;boundary={MJPEG_BOUNDARY}"),
            ),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_owned(),
            ),
            (header::PRAGMA, "no-cache".to_owned()),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

/// Encode a frame as one multipart part: boundary, headers, JPEG, CRLF.
pub fn encode_part(frame: &Frame) -> std::io::Result<Bytes> {
    let head = format!(
        "--{MJPEG_BOUNDARY}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        frame.format().content_type(),
        frame.len()
    );
    let mut part = Vec::with_capacity(head.len() + frame.len() + 2);
    part.extend_from_slice(head.as_bytes());
    frame.write_to(&mut part)?;
    part.extend_from_slice(b"\r\n");
    Ok(Bytes::from(part))
}

/// Recognition integration for a streaming session.
#[derive(Clone)]
pub struct RecognitionStep {
    recognizer: Arc<dyn TextRecognizer>,
    cache: Arc<RecognizedText>,
    sample_every: NonZeroU32,
    runtime: Handle,
}

impl RecognitionStep {
    /// Recognize every `sample_every`th frame, publishing results to `cache`.
    ///
    /// `runtime` drives the async recognizer from the blocking worker.
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        cache: Arc<RecognizedText>,
        sample_every: NonZeroU32,
        runtime: Handle,
    ) -> Self {
        Self {
            recognizer,
            cache,
            sample_every,
            runtime,
        }
    }

    fn is_due(&self, frame_index: u64) -> bool {
        frame_index % u64::from(self.sample_every.get()) == 0
    }

    /// Returns whether the cache was updated. Failures are logged and swallowed.
    fn run(&self, frame: &Frame) -> bool {
        let started = Instant::now();
        let result = self
            .runtime
            .block_on(self.recognizer.recognize(frame.data()));
        let latency = started.elapsed();

        match result {
            Ok(text) => {
                debug!(?latency, chars = text.len(), "recognized text");
                self.cache.set(text);
                true
            }
            Err(err) => {
                warn!(?latency, %err, "text recognition failed");
                false
            }
        }
    }
}

/// Why a streaming session ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The peer went away.
    Disconnected,
    /// The camera failed to produce a frame.
    CaptureFailed(CameraError),
}

/// Summary of a finished streaming session.
#[derive(Debug)]
pub struct StreamReport {
    /// Frames that left the sink for the connection.
    pub frames: u64,
    /// Successful recognition updates.
    pub recognitions: u64,
    /// Session duration.
    pub elapsed: Duration,
    /// Terminal condition.
    pub end: StreamEnd,
}

impl StreamReport {
    /// Average frames per second over the session.
    #[allow(clippy::cast_precision_loss)]
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Capture, recognize, transmit loop for one MJPEG client.
#[derive(Clone, Default)]
pub struct StreamingSession {
    recognition: Option<RecognitionStep>,
}

impl StreamingSession {
    /// Plain MJPEG session.
    pub const fn new() -> Self {
        Self { recognition: None }
    }

    /// Session that also feeds frames to a recognizer.
    pub const fn with_recognition(recognition: RecognitionStep) -> Self {
        Self {
            recognition: Some(recognition),
        }
    }

    /// Stream until the sink closes or capture fails.
    ///
    /// Liveness is checked before each capture so a dead connection does not
    /// cost a capture cycle.
    pub fn run<D, S>(&self, camera: &mut CameraSession<D>, sink: &mut S) -> StreamReport
    where
        D: CameraDevice,
        S: FrameSink,
    {
        let started = Instant::now();
        let resolution = camera.resolution();
        info!(%resolution, recognition = self.recognition.is_some(), "MJPEG streaming begin");

        let mut frame_index = 0u64;
        let mut recognitions = 0u64;
        let end = match camera.open_stream() {
            Err(err) => StreamEnd::CaptureFailed(err),
            Ok(mut stream) => loop {
                if !sink.is_open() {
                    break StreamEnd::Disconnected;
                }

                let frame = match stream.capture() {
                    Ok(frame) => frame,
                    Err(err) => break StreamEnd::CaptureFailed(err),
                };

                if let Some(step) = &self.recognition {
                    if step.is_due(frame_index) && step.run(&frame) {
                        recognitions += 1;
                    }
                }

                let sent = encode_part(&frame)
                    .map_err(|_| Disconnected)
                    .and_then(|part| sink.send(part));
                if sent.is_err() {
                    break StreamEnd::Disconnected;
                }
                frame_index += 1;
            },
        };

        let report = StreamReport {
            frames: sink.written(),
            recognitions,
            elapsed: started.elapsed(),
            end,
        };
        match &report.end {
            StreamEnd::Disconnected => info!(
                frames = report.frames,
                fps = report.fps(),
                recognitions = report.recognitions,
                "MJPEG streaming end: peer disconnected"
            ),
            StreamEnd::CaptureFailed(err) => warn!(
                frames = report.frames,
                fps = report.fps(),
                recognitions = report.recognitions,
                %err,
                "MJPEG streaming end: capture failed"
            ),
        }
        report
    }
}
