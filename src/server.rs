//! HTTP surface over the capture engine.
//!
//! Routes:
//! - `GET  /snapshot`      latest frame as `{b64}` (204 before the first frame,
//!                          503 `{error}` when no backend is available)
//! - `GET  /screenshot`    fresh full-screen grab as `{b64}`
//! - `GET  /stream`        endless `multipart/x-mixed-replace` JPEG feed
//! - `POST /capture/start` body `{x?, y?, w?, h?}` → `{status}`
//! - `POST /capture/stop`  → `{status}`
//! - `GET  /stats`         status summary

use crate::capture::{CaptureController, CaptureError, ControlError, RegionRequest};
use crate::stats::{self, StatsReport};
use crate::stream::{self, StreamError, STREAM_CONTENT_TYPE};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CaptureController>,
    /// Cancelled when the server begins shutting down; ends live streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(controller: Arc<CaptureController>) -> Self {
        Self::with_shutdown(controller, CancellationToken::new())
    }

    pub fn with_shutdown(controller: Arc<CaptureController>, shutdown: CancellationToken) -> Self {
        Self {
            controller,
            shutdown,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ImageResponse {
    pub b64: String,
}

/// Request-level failures and how they look on the wire.
#[derive(Debug)]
pub enum ApiError {
    InvalidRegion(ControlError),
    BadBody(String),
    Stream(StreamError),
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        Self::InvalidRegion(e)
    }
}

impl From<StreamError> for ApiError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRegion(e) => (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: e.to_string(),
                }),
            )
                .into_response(),
            Self::BadBody(message) => (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse { status: message }),
            )
                .into_response(),
            Self::Stream(StreamError::NoFrameAvailable) => StatusCode::NO_CONTENT.into_response(),
            Self::Stream(StreamError::Capture(e @ CaptureError::Unavailable(_))) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response(),
            Self::Stream(e) => {
                log::error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

pub fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/screenshot", get(screenshot))
        .route("/stream", get(live_stream))
        .route("/capture/start", post(start_capture))
        .route("/capture/stop", post(stop_capture))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(setup_cors())
}

/// Serve the API on `listener` until `shutdown` is cancelled.
///
/// Cancelling also ends every open `/stream` body, so the graceful drain
/// finishes even with viewers attached.
pub async fn serve(
    listener: tokio::net::TcpListener,
    controller: Arc<CaptureController>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(AppState::with_shutdown(controller, shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

async fn snapshot(State(state): State<AppState>) -> Result<Json<ImageResponse>, ApiError> {
    match stream::snapshot(state.controller.buffer()).await {
        Ok(b64) => Ok(Json(ImageResponse { b64 })),
        Err(StreamError::NoFrameAvailable) => {
            // No frame will ever arrive without a backend; say why.
            state
                .controller
                .backend_availability()
                .map_err(StreamError::from)?;
            Err(StreamError::NoFrameAvailable.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn screenshot(State(state): State<AppState>) -> Result<Json<ImageResponse>, ApiError> {
    let start = std::time::Instant::now();
    let frame = state
        .controller
        .capture_still()
        .await
        .map_err(StreamError::from)?;
    let capture_ms = start.elapsed().as_millis();

    let b64 = stream::encode_png_base64(Arc::new(frame)).await?;
    log::info!(
        "Screenshot served (captured in {}ms, {}ms total)",
        capture_ms,
        start.elapsed().as_millis()
    );
    Ok(Json(ImageResponse { b64 }))
}

async fn live_stream(State(state): State<AppState>) -> Response {
    let settings = state.controller.settings();
    let parts = stream::mjpeg_stream(
        Arc::clone(state.controller.buffer()),
        settings.interval,
        settings.jpeg_quality,
        state.shutdown.clone(),
    );
    log::info!("Stream viewer connected");

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn start_capture(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let request = parse_region_request(&body)?;
    let outcome = state.controller.start(request)?;
    Ok(Json(StatusResponse {
        status: outcome.message().to_string(),
    }))
}

async fn stop_capture(State(state): State<AppState>) -> Json<StatusResponse> {
    let outcome = state.controller.stop().await;
    Json(StatusResponse {
        status: outcome.message().to_string(),
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsReport> {
    Json(stats::report(&state.controller.status()))
}

/// An empty body means "full screen with defaults".
fn parse_region_request(body: &[u8]) -> Result<RegionRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegionRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadBody(format!("Invalid region body: {}", e)))
}
