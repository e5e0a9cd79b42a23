//! Human-readable capture status.

use crate::capture::{CaptureState, CaptureStatus};
use serde::Serialize;

/// JSON body of the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub status_text: String,
    pub state: CaptureState,
    pub fps: f64,
    pub frames: u64,
    pub region: String,
}

pub fn region_text(status: &CaptureStatus) -> String {
    match status.region {
        Some(region) => format!("Custom {}", region),
        None => "Full screen".to_string(),
    }
}

/// Markdown-flavoured summary, e.g.
///
/// ```text
/// ### Live Stats
/// - **Status**: Running
/// - **FPS**: 29.8
/// - **Frames**: 412
/// - **Region**: Custom (100, 50, 800, 600)
/// ```
pub fn format_status(status: &CaptureStatus) -> String {
    let state = match status.state {
        CaptureState::Running => "Running",
        CaptureState::Stopped => "Stopped",
    };
    format!(
        "### Live Stats\n- **Status**: {}\n- **FPS**: {:.1}\n- **Frames**: {}\n- **Region**: {}",
        state,
        status.stats.fps,
        status.stats.frames,
        region_text(status)
    )
}

pub fn report(status: &CaptureStatus) -> StatsReport {
    StatsReport {
        status_text: format_status(status),
        state: status.state,
        fps: status.stats.fps,
        frames: status.stats.frames,
        region: region_text(status),
    }
}
