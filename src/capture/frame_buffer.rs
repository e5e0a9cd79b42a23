//! Most recent frame plus throughput counters.
//!
//! One lock guards everything. It is held only for the pointer swap and
//! counter updates; capturing and encoding always happen outside it.

use image::RgbImage;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Length of the fps measurement window.
pub const STATS_WINDOW: Duration = Duration::from_secs(1);

/// An immutable captured bitmap and the moment it was taken.
#[derive(Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self::captured_at(image, Instant::now())
    }

    pub fn captured_at(image: RgbImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CaptureStats {
    /// Rate over the last completed window.
    pub fps: f64,
    /// Frames published since the current session started.
    pub frames: u64,
}

#[derive(Default)]
struct Inner {
    last: Option<Arc<Frame>>,
    stats: CaptureStats,
    window_start: Option<Instant>,
    window_frames: u64,
    /// Bumped by every `reset_stats`; publishes tagged with an older value
    /// come from a finished session and are dropped.
    generation: u64,
}

#[derive(Default)]
pub struct FrameBuffer {
    inner: Mutex<Inner>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every critical section leaves Inner consistent, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Zero the counters and open a fresh stats window at `now`.
    /// The last frame is kept so viewers don't flash empty between sessions.
    ///
    /// Returns the generation that publishes of the new session must carry.
    pub fn reset_stats(&self, now: Instant) -> u64 {
        let mut inner = self.lock();
        inner.stats = CaptureStats::default();
        inner.window_start = Some(now);
        inner.window_frames = 0;
        inner.generation += 1;
        inner.generation
    }

    /// The generation handed out by the most recent `reset_stats`.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Replace the current frame and account for it in the stats.
    ///
    /// Returns `false` without touching anything when `generation` is not
    /// the current one.
    pub fn publish(&self, frame: Frame, generation: u64) -> bool {
        let at = frame.captured_at;
        let frame = Arc::new(frame);

        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.last = Some(frame);
        inner.stats.frames += 1;
        inner.window_frames += 1;

        let window_start = *inner.window_start.get_or_insert(at);
        let elapsed = at.saturating_duration_since(window_start);
        if elapsed >= STATS_WINDOW {
            inner.stats.fps = inner.window_frames as f64 / elapsed.as_secs_f64();
            inner.window_start = Some(at);
            inner.window_frames = 0;
        }
        true
    }

    /// The current frame, if any has ever been published.
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.lock().last.clone()
    }

    pub fn stats(&self) -> CaptureStats {
        self.lock().stats
    }
}
