use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};
use uuid::Uuid;

use crate::error::AppError;

/// One RGB image sample from the camera stream.
///
/// `Clone` copies the pixel buffer, so a cloned frame never aliases the
/// caller's buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
            frame_id: Uuid::new_v4(),
        }
    }

    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AppError> {
        let len = pixels.len();
        RgbImage::from_raw(width, height, pixels)
            .map(Self::new)
            .ok_or_else(|| {
                AppError::InvalidFrame(format!(
                    "{} bytes do not hold a {}x{} RGB image",
                    len, width, height
                ))
            })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}
