//! End-to-end tests for the HTTP surface.
//!
//! Drives the real router with `tower::ServiceExt::oneshot` against a
//! synthetic screen grabber, so no display is needed.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use image::{Rgb, RgbImage};
use region_cast_lib::capture::{
    CaptureController, CaptureError, Region, ScreenGrabber, UnavailableGrabber,
};
use region_cast_lib::config::CaptureSettings;
use region_cast_lib::server::{router, serve, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Paints a gradient of the requested size.
struct SyntheticScreen;

impl ScreenGrabber for SyntheticScreen {
    fn capture(&self, region: Option<Region>) -> Result<RgbImage, CaptureError> {
        let (w, h) = region.map(|r| (r.width, r.height)).unwrap_or((320, 180));
        Ok(RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 200])))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

fn settings() -> CaptureSettings {
    CaptureSettings {
        interval: Duration::from_millis(33),
        stop_timeout: Duration::from_secs(2),
        ..CaptureSettings::default()
    }
}

fn app_with(grabber: Arc<dyn ScreenGrabber>) -> (Router, Arc<CaptureController>) {
    let controller = Arc::new(CaptureController::new(settings(), grabber));
    (router(AppState::new(Arc::clone(&controller))), controller)
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.expect("oneshot request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).expect("response should be JSON"))
}

// ── Control ─────────────────────────────────────────────────────────

#[tokio::test]
async fn start_stop_scenario() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/capture/start",
        r#"{"x": 100, "y": 50, "w": 800, "h": 600}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Capture started");

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (_, stats) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(stats["state"], "Running");
    assert_eq!(stats["region"], "Custom (100, 50, 800, 600)");
    let frames = stats["frames"].as_u64().unwrap();
    let fps = stats["fps"].as_f64().unwrap();
    // ~30/s nominal; slower hosts only lower the rate.
    assert!(frames >= 5 && frames <= 50, "frames = {}", frames);
    assert!(fps > 2.0 && fps <= 31.0, "fps = {}", fps);

    let (status, body) = send_json(&app, Method::POST, "/capture/stop", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Capture stopped");

    let (_, after) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(after["state"], "Stopped");
    assert!(after["status_text"]
        .as_str()
        .unwrap()
        .contains("**Status**: Stopped"));
    let frozen = after["frames"].as_u64().unwrap();
    assert!(frozen >= frames);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let (_, later) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(later["frames"].as_u64().unwrap(), frozen);
}

#[tokio::test]
async fn start_is_idempotent_and_stop_is_idempotent() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));

    let (_, first) = send_json(&app, Method::POST, "/capture/start", "").await;
    assert_eq!(first["status"], "Capture started");
    let (status, second) = send_json(&app, Method::POST, "/capture/start", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "Already capturing");

    let (_, stopped) = send_json(&app, Method::POST, "/capture/stop", "").await;
    assert_eq!(stopped["status"], "Capture stopped");
    let (status, again) = send_json(&app, Method::POST, "/capture/stop", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "Already stopped");
}

#[tokio::test]
async fn small_region_is_rejected_without_state_change() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/capture/start",
        r#"{"x": 0, "y": 0, "w": 40, "h": 400}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["status"].as_str().unwrap().contains("too small"));

    let (_, stats) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(stats["state"], "Stopped");
}

#[tokio::test]
async fn full_screen_bounds_show_as_full_screen() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));

    send_json(
        &app,
        Method::POST,
        "/capture/start",
        r#"{"x": 0, "y": 0, "w": 1920, "h": 1080}"#,
    )
    .await;
    let (_, stats) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(stats["region"], "Full screen");
    send_json(&app, Method::POST, "/capture/stop", "").await;
}

#[tokio::test]
async fn malformed_start_body_is_bad_request() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));
    let (status, _) = send(&app, Method::POST, "/capture/start", "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Snapshot ────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_before_any_frame_is_no_content() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));
    let (status, body) = send(&app, Method::GET, "/snapshot", "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn snapshot_after_capture_is_png() {
    use base64::{engine::general_purpose::STANDARD, Engine};

    let (app, controller) = app_with(Arc::new(SyntheticScreen));
    send_json(
        &app,
        Method::POST,
        "/capture/start",
        r#"{"x": 10, "y": 10, "w": 128, "h": 96}"#,
    )
    .await;

    for _ in 0..50 {
        if controller.buffer().snapshot().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let (status, body) = send_json(&app, Method::GET, "/snapshot", "").await;
    assert_eq!(status, StatusCode::OK);
    let png = STANDARD.decode(body["b64"].as_str().unwrap()).unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (128, 96));

    send_json(&app, Method::POST, "/capture/stop", "").await;
}

#[tokio::test]
async fn screenshot_grabs_full_screen_without_a_session() {
    let (app, controller) = app_with(Arc::new(SyntheticScreen));
    let (status, body) = send_json(&app, Method::GET, "/screenshot", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["b64"].as_str().unwrap().is_empty());
    assert!(controller.buffer().snapshot().is_none());
}

#[tokio::test]
async fn screenshot_on_headless_host_reports_error() {
    let (app, _controller) = app_with(Arc::new(UnavailableGrabber::new("no display")));
    let (status, body) = send_json(&app, Method::GET, "/screenshot", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("no display"));
}

#[tokio::test]
async fn headless_session_runs_but_never_has_frames() {
    let (app, _controller) = app_with(Arc::new(UnavailableGrabber::new("no display")));
    let (status, body) = send_json(&app, Method::POST, "/capture/start", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Capture started");

    tokio::time::sleep(Duration::from_millis(150)).await;
    let (status, body) = send_json(&app, Method::GET, "/snapshot", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("no display"));

    let (_, stats) = send_json(&app, Method::GET, "/stats", "").await;
    assert_eq!(stats["state"], "Running");
    assert_eq!(stats["frames"], 0);

    send_json(&app, Method::POST, "/capture/stop", "").await;
}

// ── Stream ──────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_is_multipart_and_survives_sessions() {
    let (app, _controller) = app_with(Arc::new(SyntheticScreen));

    let request = Request::builder()
        .uri("/stream")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut body = response.into_body().into_data_stream();

    // Nothing captured yet: placeholder parts, connection stays open.
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(
        &first[..],
        b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\r\n".as_slice()
    );

    // A session starts and ends while the viewer stays attached.
    send_json(&app, Method::POST, "/capture/start", "").await;
    let mut saw_jpeg = false;
    for _ in 0..60 {
        let part = body.next().await.unwrap().unwrap();
        if part.windows(2).any(|w| w == [0xFF, 0xD8]) {
            saw_jpeg = true;
            break;
        }
    }
    assert!(saw_jpeg, "stream never carried a JPEG frame");
    send_json(&app, Method::POST, "/capture/stop", "").await;

    // Still streaming after the session is over.
    let part = body.next().await.unwrap().unwrap();
    assert!(part.starts_with(b"--frame\r\n"));
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_completes_with_a_stream_viewer_attached() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let controller = Arc::new(CaptureController::new(settings(), Arc::new(SyntheticScreen)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, Arc::clone(&controller), shutdown.clone()));

    let mut viewer = tokio::net::TcpStream::connect(addr).await.unwrap();
    viewer
        .write_all(b"GET /stream HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 1024];
    let n = viewer.read(&mut buf).await.unwrap();
    assert!(buf[..n].starts_with(b"HTTP/1.1 200"), "unexpected response start");

    controller.start(Default::default()).unwrap();
    shutdown.cancel();

    let served = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("serve kept running while a /stream viewer was attached");
    served.unwrap().unwrap();

    // The viewer is still connected; its stream was closed from our side.
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), viewer.read_to_end(&mut rest))
        .await
        .expect("stream body should be terminated")
        .unwrap();

    controller.stop().await;
}
