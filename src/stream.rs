//! Frame encoding and the live multipart stream.
//!
//! Encoding is CPU-heavy, so it runs on the blocking pool against an
//! `Arc<Frame>` taken from the buffer; the buffer lock is never held here.

use crate::capture::{CaptureError, Frame, FrameBuffer};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, Stream, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use std::convert::Infallible;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Multipart boundary token used by the live stream.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the live stream response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("No frame captured yet")]
    NoFrameAvailable,

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, StreamError> {
    let mut png_bytes: Vec<u8> = Vec::new();
    frame
        .image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| StreamError::Encode(e.to_string()))?;
    Ok(png_bytes)
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, StreamError> {
    let mut jpeg_bytes: Vec<u8> = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, quality)
        .encode_image(&frame.image)
        .map_err(|e| StreamError::Encode(e.to_string()))?;
    Ok(jpeg_bytes)
}

/// PNG-encode a frame off the async threads and return it as base64.
pub async fn encode_png_base64(frame: Arc<Frame>) -> Result<String, StreamError> {
    let start = std::time::Instant::now();
    let png_bytes = tokio::task::spawn_blocking(move || encode_png(&frame))
        .await
        .map_err(|e| StreamError::Encode(format!("Encoding task failed: {}", e)))??;

    log::debug!(
        "PNG encoded in {}ms ({} bytes)",
        start.elapsed().as_millis(),
        png_bytes.len()
    );
    Ok(STANDARD.encode(&png_bytes))
}

/// The current frame as base64 PNG.
pub async fn snapshot(buffer: &FrameBuffer) -> Result<String, StreamError> {
    let frame = buffer.snapshot().ok_or(StreamError::NoFrameAvailable)?;
    encode_png_base64(frame).await
}

/// Wrap one payload as a multipart part. An empty payload is the
/// placeholder sent while no frame exists.
pub fn multipart_part(payload: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(payload.len() + 64);
    part.put_slice(b"--");
    part.put_slice(BOUNDARY.as_bytes());
    part.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(payload);
    part.put_slice(b"\r\n");
    part.freeze()
}

async fn next_payload(buffer: &FrameBuffer, quality: u8) -> Vec<u8> {
    let Some(frame) = buffer.snapshot() else {
        return Vec::new();
    };
    match tokio::task::spawn_blocking(move || encode_jpeg(&frame, quality)).await {
        Ok(Ok(jpeg)) => jpeg,
        Ok(Err(e)) => {
            log::warn!("Stream frame dropped: {}", e);
            Vec::new()
        }
        Err(e) => {
            log::warn!("Stream encoding task failed: {}", e);
            Vec::new()
        }
    }
}

/// A sequence of multipart JPEG parts, one per `interval`.
///
/// Independent of capture sessions: before the first frame (or with an
/// unavailable backend) it keeps emitting empty parts. It ends when the
/// consumer drops it (client disconnect) or when `shutdown` fires, so a
/// graceful server shutdown is not held open by attached viewers.
pub fn mjpeg_stream(
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    quality: u8,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::unfold((buffer, true), move |(buffer, first)| async move {
        if !first {
            tokio::time::sleep(interval).await;
        }
        let payload = next_payload(&buffer, quality).await;
        Some((Ok(multipart_part(&payload)), (buffer, false)))
    })
    .take_until(shutdown.cancelled_owned())
}
