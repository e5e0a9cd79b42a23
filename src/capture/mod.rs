//! Screen capture domain: public API.
//!
//! This module owns grabbing, the live frame buffer and the capture
//! session lifecycle. External code should only use what is exported here.

mod controller;
mod frame_buffer;
mod producer;
mod region;
mod screenshot;

pub use controller::{CaptureController, CaptureState, CaptureStatus, StartOutcome, StopOutcome};
pub use frame_buffer::{CaptureStats, Frame, FrameBuffer, STATS_WINDOW};
pub use region::{crop, ControlError, CropError, Region, RegionRequest, MIN_REGION_SIZE};
pub use screenshot::{
    detect_session, select_grabber, CaptureError, ScreenGrabber, SessionKind, UnavailableGrabber,
    XcapGrabber,
};
