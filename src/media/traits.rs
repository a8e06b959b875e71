//! Traits for camera capture functionality

use crate::media::frame::StillFrame;
use crate::media::{CaptureProfile, MediaError, PermissionStatus};
use async_trait::async_trait;

/// Platform permission primitive, check-then-request.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Current status without prompting the user.
    fn check(&self) -> PermissionStatus;

    /// Ask the platform for access. May suspend on a user dialog.
    async fn request(&self) -> PermissionStatus;
}

/// Platform camera implementation.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Acquire the device with the declared capability profile and return a
    /// track-bearing handle.
    async fn open(&self, profile: &CaptureProfile) -> Result<SourceHandle, MediaError>;

    /// Grab one still frame from the handle's source, or `None` when the
    /// source has nothing to offer.
    async fn extract(&self, handle: &SourceHandle) -> Result<Option<StillFrame>, MediaError>;
}

/// One constituent track of a capture handle.
pub trait MediaTrack: Send {
    fn label(&self) -> &str;

    fn is_ended(&self) -> bool;

    /// Stop the track. Must tolerate being called on an ended track.
    fn stop(&mut self);
}

/// The hardware capture handle: a set of tracks released individually.
pub struct SourceHandle {
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl SourceHandle {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> SourceHandle {
        SourceHandle { tracks }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| !t.is_ended()).count()
    }

    /// Stops every track that is not already ended; returns how many were
    /// actually stopped.
    pub fn stop_tracks(&mut self) -> usize {
        let mut stopped = 0;
        for track in &mut self.tracks {
            if track.is_ended() {
                continue;
            }
            track.stop();
            stopped += 1;
        }
        stopped
    }
}
