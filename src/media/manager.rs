use crate::media::frame::StillFrame;
use crate::media::traits::{MediaCapture, PermissionGate, SourceHandle};
use crate::media::{CaptureProfile, MediaError, PermissionStatus};
use log::{debug, error, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

/// Source lifecycle values for atomic access.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl SourceState {
    /// Convert from u8 value. Returns Idle for invalid values.
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SourceState::Starting,
            2 => SourceState::Running,
            3 => SourceState::Stopping,
            _ => SourceState::Idle,
        }
    }
}

/// The acquired hardware source: handle plus acquisition timestamp.
pub struct MediaSource {
    pub handle: SourceHandle,
    pub acquired_at: Instant,
}

struct ManagerShared {
    capture: Box<dyn MediaCapture>,
    gate: Box<dyn PermissionGate>,
    profile: CaptureProfile,
    state: AtomicU8,
    // two independent flags so a start racing an async permission step and a
    // later start call can never interleave two acquisitions
    starting: AtomicBool,
    running: AtomicBool,
    source: Mutex<Option<MediaSource>>,
}

/// Sole owner of the camera capture handle.
///
/// Acquisition and release are serialized: `start` is a no-op while a start is
/// pending or a source is running, `stop` is always safe, and every exit path
/// releases all hardware tracks.
#[derive(Clone)]
pub struct SourceManager {
    shared: Arc<ManagerShared>,
}

impl SourceManager {
    pub fn new(
        capture: Box<dyn MediaCapture>,
        gate: Box<dyn PermissionGate>,
        profile: CaptureProfile,
    ) -> SourceManager {
        SourceManager {
            shared: Arc::new(ManagerShared {
                capture,
                gate,
                profile,
                state: AtomicU8::new(SourceState::Idle as u8),
                starting: AtomicBool::new(false),
                running: AtomicBool::new(false),
                source: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SourceState {
        SourceState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SourceState) {
        self.shared.state.store(state as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_starting(&self) -> bool {
        self.shared.starting.load(Ordering::Acquire)
    }

    /// Acquire the camera. No-op when a start is already in progress or a
    /// source is already running.
    pub async fn start(&self) -> Result<(), MediaError> {
        if self.shared.running.load(Ordering::Acquire) {
            debug!("camera already running, start ignored");
            return Ok(());
        }
        if self.shared.starting.swap(true, Ordering::AcqRel) {
            debug!("camera start already in progress, start ignored");
            return Ok(());
        }

        self.set_state(SourceState::Starting);
        let outcome = self.start_inner().await;
        self.shared.starting.store(false, Ordering::Release);

        if let Err(err) = &outcome {
            error!("camera start failed: {err}");
            self.set_state(SourceState::Idle);
        }
        outcome
    }

    async fn start_inner(&self) -> Result<(), MediaError> {
        let mut slot = self.shared.source.lock().await;

        // a stale handle must be fully released before acquiring a new one
        if let Some(mut previous) = slot.take() {
            previous.handle.stop_tracks();
            self.shared.running.store(false, Ordering::Release);
        }

        let mut status = self.shared.gate.check();
        if status != PermissionStatus::Granted {
            status = self.shared.gate.request().await;
        }
        if status != PermissionStatus::Granted {
            return Err(MediaError::Permission(status));
        }

        let handle = self.shared.capture.open(&self.shared.profile).await?;
        info!("camera started with {} track(s)", handle.track_count());

        *slot = Some(MediaSource {
            handle,
            acquired_at: Instant::now(),
        });
        self.shared.running.store(true, Ordering::Release);
        self.set_state(SourceState::Running);
        Ok(())
    }

    /// Release the camera. Idempotent, and safe to call from a teardown path
    /// even if `start` never completed.
    pub async fn stop(&self) {
        let mut slot = self.shared.source.lock().await;
        if let Some(mut source) = slot.take() {
            self.set_state(SourceState::Stopping);
            let stopped = source.handle.stop_tracks();
            info!("camera stopped, released {stopped} track(s)");
        }
        self.shared.running.store(false, Ordering::Release);
        self.set_state(SourceState::Idle);
    }

    /// Visibility drives the lifecycle: visible acquires, hidden releases.
    pub async fn set_visible(&self, visible: bool) -> Result<(), MediaError> {
        if visible {
            self.start().await
        } else {
            self.stop().await;
            Ok(())
        }
    }

    /// Read-only frame access for the scheduler. `None` when no source is
    /// running; extraction without a source is a skip, not an error.
    pub async fn extract_frame(&self) -> Result<Option<StillFrame>, MediaError> {
        if !self.is_running() {
            return Ok(None);
        }
        let slot = self.shared.source.lock().await;
        match slot.as_ref() {
            Some(source) => self.shared.capture.extract(&source.handle).await,
            None => Ok(None),
        }
    }
}
