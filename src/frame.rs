use crate::error::{CamkitError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Device orientation a frame was captured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    LandscapeLeft,
    LandscapeRight,
    PortraitUpsideDown,
}

impl Orientation {
    pub fn is_landscape(&self) -> bool {
        matches!(self, Orientation::LandscapeLeft | Orientation::LandscapeRight)
    }

    /// Host-facing orientation label
    pub fn label(&self) -> &'static str {
        if self.is_landscape() {
            "LANDSCAPE"
        } else {
            "PORTRAIT"
        }
    }
}

/// A single frame delivered on the continuous stream. Pixel data is RGBA8,
/// shared behind an `Arc` so delivery and ticket fulfillment never copy it.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub id: u64,
    pub timestamp: SystemTime,
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        orientation: Orientation,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            orientation,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Host-facing "WxH" resolution string
    pub fn resolution_string(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn to_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.as_ref().clone()).ok_or_else(
            || CamkitError::encoding("frame buffer does not match declared dimensions"),
        )
    }
}

/// Rectangular sub-area of a frame used for cropping captured output, either
/// in pixel units or in percentage-of-frame units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRegion {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
    pub measured_by_percentage: bool,
}

impl ScanRegion {
    pub fn validate(&self) -> Result<()> {
        if self.right <= self.left || self.bottom <= self.top {
            return Err(CamkitError::invalid_argument(
                "scan region must have positive width and height",
            ));
        }
        if self.measured_by_percentage
            && (self.right > 100 || self.bottom > 100 || self.left > 100 || self.top > 100)
        {
            return Err(CamkitError::invalid_argument(
                "percentage scan region fields must be within 0..=100",
            ));
        }
        Ok(())
    }

    /// Resolve the crop rectangle (x, y, width, height) in pixels for a frame
    /// of the given dimensions. Percentage fields scale by frame size and the
    /// result is truncated to an integral pixel rectangle within bounds.
    pub fn crop_rect(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let (mut left, mut top, mut width, mut height) = (
            self.left as f64,
            self.top as f64,
            (self.right - self.left) as f64,
            (self.bottom - self.top) as f64,
        );
        if self.measured_by_percentage {
            left = left / 100.0 * frame_width as f64;
            top = top / 100.0 * frame_height as f64;
            width = width / 100.0 * frame_width as f64;
            height = height / 100.0 * frame_height as f64;
        }

        let x = (left as u32).min(frame_width.saturating_sub(1));
        let y = (top as u32).min(frame_height.saturating_sub(1));
        let w = (width as u32).max(1).min(frame_width - x);
        let h = (height as u32).max(1).min(frame_height - y);
        (x, y, w, h)
    }
}

/// Per-frame output processing: orientation normalization, optional crop and
/// JPEG/base64 encoding for transport.
pub struct FramePipeline;

impl FramePipeline {
    /// Rotate the frame to upright orientation. No-op when already upright.
    pub fn normalize(frame: &FrameData) -> Result<RgbaImage> {
        let image = frame.to_image()?;
        let upright = match frame.orientation {
            Orientation::Portrait => image,
            Orientation::LandscapeLeft => image::imageops::rotate90(&image),
            Orientation::LandscapeRight => image::imageops::rotate270(&image),
            Orientation::PortraitUpsideDown => image::imageops::rotate180(&image),
        };
        Ok(upright)
    }

    pub fn crop(image: &RgbaImage, region: &ScanRegion) -> RgbaImage {
        let (x, y, w, h) = region.crop_rect(image.width(), image.height());
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }

    /// Normalize, apply the active scan region if any, and return the
    /// output-ready image.
    pub fn process(frame: &FrameData, region: Option<&ScanRegion>) -> Result<RgbaImage> {
        let upright = Self::normalize(frame)?;
        Ok(match region {
            Some(region) => Self::crop(&upright, region),
            None => upright,
        })
    }

    /// Encode to JPEG at a caller-specified quality in [0, 100]
    pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        // The encoder expects 1..=100; a zero quality request maps to minimum
        let quality = quality.clamp(1, 100);
        let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| CamkitError::encoding(format!("JPEG encode failed: {}", e)))?;
        Ok(buf)
    }

    pub fn to_base64_jpeg(image: &RgbaImage, quality: u8) -> Result<String> {
        let jpeg = Self::encode_jpeg(image, quality)?;
        Ok(BASE64.encode(jpeg))
    }
}
