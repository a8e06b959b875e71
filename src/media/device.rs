//! Host camera implementation backed by nokhwa.

use crate::media::frame::StillFrame;
use crate::media::traits::{MediaCapture, MediaTrack, PermissionGate, SourceHandle};
use crate::media::{CaptureProfile, Facing, MediaError, PermissionStatus};
use async_trait::async_trait;
use log::{debug, info, warn};
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use std::sync::{Arc, Mutex, Weak};

/// Permission gate for host platforms, where camera access is granted at
/// device-open time and a refusal surfaces as an acquisition failure.
pub struct HostGate;

#[async_trait]
impl PermissionGate for HostGate {
    fn check(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

/// Camera capture through the host video backend.
///
/// The strong camera reference lives in the track handed to the caller, so
/// dropping the source handle releases the device; extraction only upgrades a
/// weak reference.
pub struct DeviceCapture {
    active: Mutex<Option<ActiveDevice>>,
}

struct ActiveDevice {
    camera: Weak<Mutex<Camera>>,
    jpeg_quality: u8,
}

impl DeviceCapture {
    pub fn new() -> DeviceCapture {
        DeviceCapture {
            active: Mutex::new(None),
        }
    }
}

impl Default for DeviceCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCapture for DeviceCapture {
    async fn open(&self, profile: &CaptureProfile) -> Result<SourceHandle, MediaError> {
        let requested = CameraFormat::new(
            Resolution::new(profile.width, profile.height),
            FrameFormat::MJPEG,
            profile.frame_rate,
        );
        if profile.facing != Facing::Front {
            // host backends expose no facing metadata; index 0 is all we have
            warn!("rear-facing capture requested, using default device");
        }

        let camera = tokio::task::spawn_blocking(move || -> Result<Camera, MediaError> {
            let format =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(requested));
            let mut camera = Camera::new(CameraIndex::Index(0), format)
                .map_err(|e| MediaError::Acquisition(e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| MediaError::Acquisition(e.to_string()))?;
            Ok(camera)
        })
        .await
        .map_err(|e| MediaError::Acquisition(e.to_string()))??;

        info!(
            "capture device opened at {}x{}@{}fps",
            profile.width, profile.height, profile.frame_rate
        );

        let camera = Arc::new(Mutex::new(camera));
        *self.active.lock().unwrap() = Some(ActiveDevice {
            camera: Arc::downgrade(&camera),
            jpeg_quality: profile.jpeg_quality,
        });

        let track = DeviceTrack {
            camera,
            label: "video0".to_string(),
            ended: false,
        };
        Ok(SourceHandle::new(vec![Box::new(track)]))
    }

    async fn extract(&self, handle: &SourceHandle) -> Result<Option<StillFrame>, MediaError> {
        if handle.live_tracks() == 0 {
            return Ok(None);
        }
        let (camera, quality) = match self.active.lock().unwrap().as_ref() {
            Some(device) => match device.camera.upgrade() {
                Some(camera) => (camera, device.jpeg_quality),
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        let frame = tokio::task::spawn_blocking(move || -> Result<StillFrame, MediaError> {
            let mut camera = camera
                .lock()
                .map_err(|_| MediaError::Extraction("camera lock poisoned".into()))?;
            let buffer = camera
                .frame()
                .map_err(|e| MediaError::Extraction(e.to_string()))?;
            let decoded = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| MediaError::Extraction(e.to_string()))?;
            StillFrame::from_rgb(&decoded, quality)
        })
        .await
        .map_err(|e| MediaError::Extraction(e.to_string()))??;

        Ok(Some(frame))
    }
}

struct DeviceTrack {
    camera: Arc<Mutex<Camera>>,
    label: String,
    ended: bool,
}

impl MediaTrack for DeviceTrack {
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
        if let Ok(mut camera) = self.camera.lock() {
            if let Err(err) = camera.stop_stream() {
                debug!("stopping {}: {}", self.label, err);
            }
        }
        self.ended = true;
    }
}
