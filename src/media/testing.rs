//! In-memory capture and permission fakes for tests.

use crate::media::frame::StillFrame;
use crate::media::traits::{MediaCapture, MediaTrack, PermissionGate, SourceHandle};
use crate::media::{CaptureProfile, MediaError, PermissionStatus};
use async_trait::async_trait;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct CaptureCounters {
    opens: AtomicUsize,
    extracts: AtomicUsize,
    track_stops: AtomicUsize,
}

impl CaptureCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn extracts(&self) -> usize {
        self.extracts.load(Ordering::SeqCst)
    }

    pub fn track_stops(&self) -> usize {
        self.track_stops.load(Ordering::SeqCst)
    }
}

/// Capture fake producing tiny JPEG frames and counting lifecycle calls.
pub struct FakeCapture {
    counters: Arc<CaptureCounters>,
    fail_open: AtomicBool,
}

impl FakeCapture {
    pub fn new() -> FakeCapture {
        FakeCapture {
            counters: Arc::new(CaptureCounters::default()),
            fail_open: AtomicBool::new(false),
        }
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        Arc::clone(&self.counters)
    }

    pub fn fail_next_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaCapture for FakeCapture {
    async fn open(&self, _profile: &CaptureProfile) -> Result<SourceHandle, MediaError> {
        if self.fail_open.swap(false, Ordering::SeqCst) {
            return Err(MediaError::Acquisition("device busy".into()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let track = FakeTrack {
            counters: Arc::clone(&self.counters),
            label: "fake-video0".to_string(),
            ended: false,
        };
        Ok(SourceHandle::new(vec![Box::new(track)]))
    }

    async fn extract(&self, handle: &SourceHandle) -> Result<Option<StillFrame>, MediaError> {
        if handle.live_tracks() == 0 {
            return Ok(None);
        }
        self.counters.extracts.fetch_add(1, Ordering::SeqCst);
        let image = RgbImage::new(4, 4);
        Ok(Some(StillFrame::from_rgb(&image, 80)?))
    }
}

pub struct FakeTrack {
    counters: Arc<CaptureCounters>,
    label: String,
    ended: bool,
}

impl MediaTrack for FakeTrack {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn stop(&mut self) {
        if self.ended {
            return;
        }
        self.counters.track_stops.fetch_add(1, Ordering::SeqCst);
        self.ended = true;
    }
}

pub struct GateCounters {
    requests: AtomicUsize,
    request_result: Mutex<PermissionStatus>,
}

impl GateCounters {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn set_request_result(&self, status: PermissionStatus) {
        *self.request_result.lock().unwrap() = status;
    }
}

/// Permission fake with a scriptable request outcome and an optional hold so
/// tests can park a start inside the pending prompt.
pub struct FakeGate {
    check_result: PermissionStatus,
    counters: Arc<GateCounters>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeGate {
    fn with_results(check: PermissionStatus, request: PermissionStatus) -> FakeGate {
        FakeGate {
            check_result: check,
            counters: Arc::new(GateCounters {
                requests: AtomicUsize::new(0),
                request_result: Mutex::new(request),
            }),
            hold: Mutex::new(None),
        }
    }

    pub fn granting() -> FakeGate {
        Self::with_results(PermissionStatus::Undetermined, PermissionStatus::Granted)
    }

    pub fn denying() -> FakeGate {
        Self::with_results(PermissionStatus::Undetermined, PermissionStatus::Denied)
    }

    pub fn undetermined() -> FakeGate {
        Self::with_results(
            PermissionStatus::Undetermined,
            PermissionStatus::Undetermined,
        )
    }

    pub fn counters(&self) -> Arc<GateCounters> {
        Arc::clone(&self.counters)
    }

    /// Make the next requests wait until the returned notify fires.
    pub fn hold_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }
}

#[async_trait]
impl PermissionGate for FakeGate {
    fn check(&self) -> PermissionStatus {
        self.check_result
    }

    async fn request(&self) -> PermissionStatus {
        self.counters.requests.fetch_add(1, Ordering::SeqCst);
        let waiter = self.hold.lock().unwrap().clone();
        if let Some(notify) = waiter {
            notify.notified().await;
        }
        *self.counters.request_result.lock().unwrap()
    }
}
