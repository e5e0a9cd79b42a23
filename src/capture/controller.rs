//! Capture session lifecycle: start, stop, and the status projection.
//!
//! A single `CaptureController` owns the state that used to be ambient:
//! the running/stopped flag, the active region, the frame buffer and the
//! handle to the producer task. It is shared with every HTTP handler.

use super::frame_buffer::{CaptureStats, Frame, FrameBuffer};
use super::producer;
use super::region::{ControlError, Region, RegionRequest};
use super::screenshot::{CaptureError, ScreenGrabber};
use crate::config::CaptureSettings;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

impl StartOutcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Started => "Capture started",
            Self::AlreadyRunning => "Already capturing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

impl StopOutcome {
    pub fn message(self) -> &'static str {
        match self {
            Self::Stopped => "Capture stopped",
            Self::AlreadyStopped => "Already stopped",
        }
    }
}

/// Point-in-time view of the controller, for the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStatus {
    pub state: CaptureState,
    /// `None` means full screen.
    pub region: Option<Region>,
    pub stats: CaptureStats,
}

struct Producer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Session {
    state: CaptureState,
    region: Option<Region>,
    producer: Option<Producer>,
}

pub struct CaptureController {
    settings: CaptureSettings,
    grabber: Arc<dyn ScreenGrabber>,
    buffer: Arc<FrameBuffer>,
    session: Mutex<Session>,
}

impl CaptureController {
    pub fn new(settings: CaptureSettings, grabber: Arc<dyn ScreenGrabber>) -> Self {
        Self {
            settings,
            grabber,
            buffer: Arc::new(FrameBuffer::new()),
            session: Mutex::new(Session {
                state: CaptureState::Stopped,
                region: None,
                producer: None,
            }),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Whether the process-wide backend can capture at all.
    pub fn backend_availability(&self) -> Result<(), CaptureError> {
        self.grabber.availability()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a capture session.
    ///
    /// Must be called from within a tokio runtime. Starting while already
    /// running is a no-op acknowledgement; a rejected region leaves the
    /// state untouched.
    pub fn start(&self, request: RegionRequest) -> Result<StartOutcome, ControlError> {
        let mut session = self.session();
        if session.state == CaptureState::Running {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let region = request.resolve(self.settings.screen_width, self.settings.screen_height)?;

        let generation = self.buffer.reset_stats(Instant::now());

        let cancel = CancellationToken::new();
        let task = tokio::spawn(producer::run(
            Arc::clone(&self.grabber),
            Arc::clone(&self.buffer),
            region,
            self.settings.interval,
            generation,
            cancel.clone(),
        ));

        session.state = CaptureState::Running;
        session.region = region;
        session.producer = Some(Producer { cancel, task });

        match region {
            Some(r) => log::info!("[CAPTURE] Session started for region {}", r),
            None => log::info!("[CAPTURE] Session started for full screen"),
        }
        Ok(StartOutcome::Started)
    }

    /// End the current session.
    ///
    /// Waits at most `stop_timeout` for the producer to notice; reports
    /// `Stopped` either way. A producer still winding down after that is
    /// already cancelled, and the next `start` retires its generation, so it
    /// will not publish again.
    pub async fn stop(&self) -> StopOutcome {
        let producer = {
            let mut session = self.session();
            if session.state == CaptureState::Stopped {
                return StopOutcome::AlreadyStopped;
            }
            session.state = CaptureState::Stopped;
            session.region = None;
            session.producer.take()
        };

        if let Some(Producer { cancel, task }) = producer {
            cancel.cancel();
            match tokio::time::timeout(self.settings.stop_timeout, task).await {
                Ok(Ok(())) => log::info!("[CAPTURE] Session stopped"),
                Ok(Err(e)) => log::error!("[CAPTURE] Producer task ended abnormally: {}", e),
                Err(_) => log::warn!(
                    "[CAPTURE] Producer did not exit within {}ms, leaving it to wind down",
                    self.settings.stop_timeout.as_millis()
                ),
            }
        }

        StopOutcome::Stopped
    }

    pub fn status(&self) -> CaptureStatus {
        let (state, region) = {
            let session = self.session();
            (session.state, session.region)
        };
        CaptureStatus {
            state,
            region,
            stats: self.buffer.stats(),
        }
    }

    /// Grab one full-screen frame, outside of any session.
    pub async fn capture_still(&self) -> Result<Frame, CaptureError> {
        let grabber = Arc::clone(&self.grabber);
        let image = tokio::task::spawn_blocking(move || grabber.capture(None))
            .await
            .map_err(|e| CaptureError::Failed(format!("Capture task failed: {}", e)))??;
        Ok(Frame::new(image))
    }
}
