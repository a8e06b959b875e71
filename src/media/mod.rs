//! Camera source module
//!
//! Owns the hardware capture lifecycle: permission acquisition, start/stop
//! under single-owner discipline, and still-frame extraction. The platform
//! camera backend sits behind the `MediaCapture` trait and is selected at
//! composition time.

pub mod device;
pub mod frame;
pub mod manager;
mod traits;

#[cfg(test)]
pub mod testing;

pub use device::{DeviceCapture, HostGate};
pub use frame::StillFrame;
pub use manager::{SourceManager, SourceState};
pub use traits::{MediaCapture, MediaTrack, PermissionGate, SourceHandle};

use crate::assets::{FRAME_HEIGHT, FRAME_RATE, FRAME_WIDTH, JPEG_QUALITY};
use thiserror::Error;

/// Tri-state outcome of a platform permission check or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    /// Explicitly refused; the user must act in system settings.
    Denied,
    /// Never asked, or the platform could not tell.
    Undetermined,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::Undetermined => write!(f, "not determined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

/// Capability profile declared when acquiring the camera.
#[derive(Debug, Clone)]
pub struct CaptureProfile {
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub jpeg_quality: u8,
}

impl Default for CaptureProfile {
    fn default() -> Self {
        CaptureProfile {
            facing: Facing::Front,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            frame_rate: FRAME_RATE,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    /// Recoverable: the user can grant access and start again.
    #[error("camera permission {0}")]
    Permission(PermissionStatus),
    /// Hardware busy or unavailable; retryable by invoking start again.
    #[error("failed to acquire capture device: {0}")]
    Acquisition(String),
    /// Per-frame failure; callers skip the tick and continue.
    #[error("frame extraction failed: {0}")]
    Extraction(String),
}
