use crate::media::MediaError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use std::time::Instant;

/// An encoded still frame extracted from the live source.
#[derive(Clone)]
pub struct StillFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
    pub captured_at: Instant,
}

impl StillFrame {
    /// Encode a raw RGB frame as JPEG at the given quality.
    pub fn from_rgb(image: &RgbImage, quality: u8) -> Result<StillFrame, MediaError> {
        let mut encoded = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
        encoder
            .encode_image(image)
            .map_err(|e| MediaError::Extraction(e.to_string()))?;

        Ok(StillFrame {
            data: Bytes::from(encoded),
            width: image.width(),
            height: image.height(),
            format: "jpeg",
            captured_at: Instant::now(),
        })
    }

    /// Wire representation of the frame payload.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for StillFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StillFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("size", &self.size())
            .finish()
    }
}
