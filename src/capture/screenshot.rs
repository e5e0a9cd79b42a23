//! Screen grabbing using the `xcap` crate.
//!
//! This is the infrastructure layer; it talks to the OS.
//! The backend is chosen exactly once at startup by [`select_grabber`];
//! nothing re-probes the host mid-stream.

use super::region::{self, Region};
use crate::config::BackendChoice;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use xcap::Monitor;

/// A platform screen-capture primitive.
///
/// `capture(None)` grabs the whole primary display; `capture(Some(r))`
/// returns a bitmap sized exactly to `r`. No retries happen here.
pub trait ScreenGrabber: Send + Sync + 'static {
    fn capture(&self, region: Option<Region>) -> Result<RgbImage, CaptureError>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// `Err(Unavailable)` when no capture can ever succeed on this host.
    fn availability(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Screen capture unavailable: {0}")]
    Unavailable(String),

    #[error("Screen capture failed: {0}")]
    Failed(String),
}

/// Captures the primary monitor through xcap, then crops to the region.
pub struct XcapGrabber;

impl XcapGrabber {
    fn primary_monitor() -> Result<Monitor, CaptureError> {
        let monitors = Monitor::all()
            .map_err(|e| CaptureError::Failed(format!("Failed to enumerate monitors: {}", e)))?;

        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                return Ok(monitor);
            }
            // If no monitor reports as primary, use the first one
            if fallback.is_none() {
                fallback = Some(monitor);
            }
        }

        fallback.ok_or_else(|| CaptureError::Failed("No monitor found".to_string()))
    }
}

impl ScreenGrabber for XcapGrabber {
    fn capture(&self, region: Option<Region>) -> Result<RgbImage, CaptureError> {
        let monitor = Self::primary_monitor()?;

        let rgba = monitor
            .capture_image()
            .map_err(|e| CaptureError::Failed(e.to_string()))?;
        let full = DynamicImage::ImageRgba8(rgba).to_rgb8();

        match region {
            None => Ok(full),
            Some(r) => region::crop(&full, &r).map_err(|e| CaptureError::Failed(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "xcap"
    }
}

/// Stand-in used when the host has no usable display. Every call fails the
/// same way, so callers see a steady "frame unavailable" instead of a crash.
pub struct UnavailableGrabber {
    reason: String,
}

impl UnavailableGrabber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ScreenGrabber for UnavailableGrabber {
    fn capture(&self, _region: Option<Region>) -> Result<RgbImage, CaptureError> {
        Err(CaptureError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn availability(&self) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable(self.reason.clone()))
    }
}

/// What the startup probe concluded about the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Interactive,
    Headless(String),
}

/// Decide whether an interactive display session exists.
///
/// `var` looks up environment variables; `os` is `std::env::consts::OS`.
pub fn detect_session<F>(var: F, os: &str) -> SessionKind
where
    F: Fn(&str) -> Option<String>,
{
    for platform in ["RAILWAY", "RENDER"] {
        if var(platform).is_some() {
            return SessionKind::Headless(format!("{} hosting environment detected", platform));
        }
    }

    if os == "linux" {
        if var("DISPLAY").is_none() && var("WAYLAND_DISPLAY").is_none() {
            return SessionKind::Headless("neither DISPLAY nor WAYLAND_DISPLAY is set".into());
        }
        match var("XDG_SESSION_TYPE").as_deref() {
            None | Some("") => {
                return SessionKind::Headless("XDG_SESSION_TYPE is not set".into());
            }
            Some("tty") => {
                return SessionKind::Headless("XDG_SESSION_TYPE is tty".into());
            }
            Some(_) => {}
        }
    }

    SessionKind::Interactive
}

/// Pick the process-wide capture backend. Call once at startup.
pub fn select_grabber(choice: BackendChoice) -> Arc<dyn ScreenGrabber> {
    let grabber: Arc<dyn ScreenGrabber> = match choice {
        BackendChoice::Xcap => Arc::new(XcapGrabber),
        BackendChoice::None => Arc::new(UnavailableGrabber::new("capture disabled by configuration")),
        BackendChoice::Auto => {
            match detect_session(|key| std::env::var(key).ok(), std::env::consts::OS) {
                SessionKind::Headless(reason) => {
                    log::warn!("Headless host ({}), screen capture disabled", reason);
                    Arc::new(UnavailableGrabber::new(reason))
                }
                SessionKind::Interactive => match Monitor::all() {
                    Ok(monitors) if !monitors.is_empty() => {
                        log::info!("Interactive display detected ({} monitor(s))", monitors.len());
                        Arc::new(XcapGrabber)
                    }
                    Ok(_) => Arc::new(UnavailableGrabber::new("no monitors found")),
                    Err(e) => {
                        log::warn!("Monitor enumeration failed: {}", e);
                        Arc::new(UnavailableGrabber::new(format!(
                            "monitor enumeration failed: {}",
                            e
                        )))
                    }
                },
            }
        }
    };

    log::info!("Capture backend: {}", grabber.name());
    grabber
}
