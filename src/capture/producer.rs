//! The background capture loop.

use super::frame_buffer::{Frame, FrameBuffer};
use super::region::Region;
use super::screenshot::ScreenGrabber;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Grab, publish, sleep, until `cancel` fires.
///
/// The token is checked at the top of every cycle and again after the
/// (uncancellable) capture call, so a producer that was told to stop while
/// mid-capture stops there. Frames are tagged with `generation`; once a
/// later session has reset the buffer they are refused under its lock, which
/// closes the gap between the token check and the publish. The sleep is a
/// fixed `interval` no matter how long the capture took.
pub(crate) async fn run(
    grabber: Arc<dyn ScreenGrabber>,
    buffer: Arc<FrameBuffer>,
    region: Option<Region>,
    interval: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    log::info!(
        "[CAPTURE] Producer started ({}, every {}ms)",
        describe(region),
        interval.as_millis()
    );

    let mut consecutive_failures: u64 = 0;

    while !cancel.is_cancelled() {
        let grab = Arc::clone(&grabber);
        let result = tokio::task::spawn_blocking(move || grab.capture(region)).await;

        match result {
            Ok(Ok(image)) => {
                if cancel.is_cancelled() {
                    break;
                }
                if consecutive_failures > 0 {
                    log::info!(
                        "[CAPTURE] Capture recovered after {} failed cycle(s)",
                        consecutive_failures
                    );
                    consecutive_failures = 0;
                }
                if !buffer.publish(Frame::new(image), generation) {
                    log::debug!("[CAPTURE] Session superseded, producer exiting");
                    break;
                }
            }
            Ok(Err(e)) => {
                consecutive_failures += 1;
                if consecutive_failures == 1 {
                    log::warn!("[CAPTURE] {}, skipping cycle", e);
                } else {
                    log::debug!("[CAPTURE] {} (failure #{})", e, consecutive_failures);
                }
            }
            Err(e) => {
                log::error!("[CAPTURE] Capture task failed: {}", e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    log::info!("[CAPTURE] Producer exited");
}

fn describe(region: Option<Region>) -> String {
    match region {
        Some(r) => format!("region {}", r),
        None => "full screen".to_string(),
    }
}
