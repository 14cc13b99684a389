//! HTTP routes and shared application state.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::frame::Frame;
use crate::recognition::TextRecognizer;
use crate::request::{FrameRequest, RenderMode};
use crate::resolution::{Resolution, ResolutionCatalog};
use crate::session::CameraSession;
use crate::streaming::{ChannelSink, RecognitionStep, StreamReport, StreamingSession};
use crate::text_cache::RecognizedText;
use crate::traits::CameraDevice;

/// Front page.
pub const INDEX_HTML: &str = include_str!("../static/index.html");

/// Disallow-all robots policy.
pub const ROBOTS_TXT: &str = "User-Agent: *\nDisallow: /\n";

/// Recognition settings for MJPEG streams.
#[derive(Clone)]
pub struct RecognitionMode {
    /// OCR backend.
    pub recognizer: Arc<dyn TextRecognizer>,
    /// Recognize every Nth streamed frame.
    pub sample_every: NonZeroU32,
}

/// Shared application state.
pub struct AppState<D: CameraDevice> {
    inner: Arc<AppStateInner<D>>,
}

struct AppStateInner<D: CameraDevice> {
    catalog: ResolutionCatalog,
    camera: Arc<Mutex<CameraSession<D>>>,
    recognized: Arc<RecognizedText>,
    recognition: Option<RecognitionMode>,
}

impl<D: CameraDevice> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: CameraDevice> AppState<D> {
    /// Wrap an initialized camera. With `recognition`, MJPEG streams feed
    /// frames to the recognizer.
    pub fn new(camera: CameraSession<D>, recognition: Option<RecognitionMode>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                catalog: camera.catalog().clone(),
                camera: Arc::new(Mutex::new(camera)),
                recognized: Arc::new(RecognizedText::new()),
                recognition,
            }),
        }
    }

    /// Supported resolutions.
    pub fn catalog(&self) -> &ResolutionCatalog {
        &self.inner.catalog
    }

    /// Latest recognition result.
    pub fn recognized_text(&self) -> &RecognizedText {
        &self.inner.recognized
    }

    /// Wait for exclusive use of the camera.
    pub async fn lock_camera(&self) -> OwnedMutexGuard<CameraSession<D>> {
        Arc::clone(&self.inner.camera).lock_owned().await
    }

    fn streaming_session(&self) -> StreamingSession {
        self.inner
            .recognition
            .as_ref()
            .map_or_else(StreamingSession::new, |mode| {
                StreamingSession::with_recognition(RecognitionStep::new(
                    Arc::clone(&mode.recognizer),
                    Arc::clone(&self.inner.recognized),
                    mode.sample_every,
                    Handle::current(),
                ))
            })
    }
}

/// Build the router.
pub fn router<D>(state: AppState<D>) -> Router
where
    D: CameraDevice + Send + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/robots.txt", get(robots))
        .route("/resolutions.csv", get(resolutions::<D>))
        .route("/recognized_text", get(recognized_text::<D>))
        .route("/:file", get(frame::<D>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn robots() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], ROBOTS_TXT)
}

async fn resolutions<D>(State(state): State<AppState<D>>) -> impl IntoResponse
where
    D: CameraDevice + Send + 'static,
{
    ([(header::CONTENT_TYPE, "text/csv")], state.catalog().to_csv())
}

async fn recognized_text<D>(State(state): State<AppState<D>>) -> impl IntoResponse
where
    D: CameraDevice + Send + 'static,
{
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.recognized_text().get(),
    )
}

async fn frame<D>(State(state): State<AppState<D>>, Path(file): Path<String>) -> Result<Response>
where
    D: CameraDevice + Send + 'static,
{
    let request: FrameRequest = file.parse().map_err(|err| {
        debug!(%err, "rejected frame request");
        AppError::NotFound
    })?;

    let resolution = state.catalog().find(request.width, request.height);
    if !resolution.is_valid() {
        return Err(AppError::UnknownResolution);
    }
    if !resolution.matches(request.width, request.height) {
        let location = request
            .with_dimensions(resolution.width(), resolution.height())
            .path();
        return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
    }

    let camera = state.lock_camera().await;
    match request.mode {
        RenderMode::Bmp | RenderMode::Jpeg => serve_still(camera, resolution, request.mode).await,
        RenderMode::Mjpeg => Ok(serve_mjpeg(&state, camera, resolution)),
    }
}

/// Best effort: on failure the request is served at the active resolution.
fn switch_resolution<D: CameraDevice>(camera: &mut CameraSession<D>, resolution: Resolution) {
    match camera.change_resolution(resolution) {
        Ok(()) => debug!(%resolution, "changeResolution success"),
        Err(err) => warn!(
            %resolution,
            active = %camera.resolution(),
            %err,
            "changeResolution failure"
        ),
    }
}

async fn serve_still<D>(
    camera: OwnedMutexGuard<CameraSession<D>>,
    resolution: Resolution,
    mode: RenderMode,
) -> Result<Response>
where
    D: CameraDevice + Send + 'static,
{
    let frame = tokio::task::spawn_blocking(move || -> Result<Frame> {
        let mut camera = camera;
        switch_resolution(&mut camera, resolution);
        let frame = camera.capture()?;
        drop(camera);
        info!(
            width = frame.width(),
            height = frame.height(),
            bytes = frame.len(),
            "capture success"
        );

        if mode != RenderMode::Bmp {
            return Ok(frame);
        }
        let frame = frame.to_bitmap()?;
        info!(
            width = frame.width(),
            height = frame.height(),
            bytes = frame.len(),
            "toBitmap success"
        );
        Ok(frame)
    })
    .await
    .map_err(|err| AppError::Internal(err.to_string()))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, frame.format().content_type().to_owned()),
            (header::CONTENT_LENGTH, frame.len().to_string()),
        ],
        Body::from(frame.into_data()),
    )
        .into_response())
}

fn serve_mjpeg<D>(
    state: &AppState<D>,
    camera: OwnedMutexGuard<CameraSession<D>>,
    resolution: Resolution,
) -> Response
where
    D: CameraDevice + Send + 'static,
{
    let (response, _supervisor) = spawn_mjpeg(state, camera, resolution);
    response
}

/// Start a streaming worker. The returned task resolves to the worker's
/// report, or `None` if the worker died.
fn spawn_mjpeg<D>(
    state: &AppState<D>,
    camera: OwnedMutexGuard<CameraSession<D>>,
    resolution: Resolution,
) -> (Response, JoinHandle<Option<StreamReport>>)
where
    D: CameraDevice + Send + 'static,
{
    let (mut sink, response) = ChannelSink::channel();
    let session = state.streaming_session();

    // Holds the camera until the client goes away or capture fails.
    let worker = tokio::task::spawn_blocking(move || {
        let mut camera = camera;
        switch_resolution(&mut camera, resolution);
        session.run(&mut camera, &mut sink)
    });

    let supervisor = tokio::spawn(async move {
        match worker.await {
            Ok(report) => Some(report),
            Err(err) => {
                error!(%err, "MJPEG worker failed");
                None
            }
        }
    });

    (response, supervisor)
}
