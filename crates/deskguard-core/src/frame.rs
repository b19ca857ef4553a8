//! Immutable RGB frame snapshots shared by the security and render loops.

use image::{ImageFormat, RgbImage};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

/// Where a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOrigin {
    Live,
    Static,
}

/// A captured RGB8 frame. Pixel data is shared and never mutated after capture.
#[derive(Clone)]
pub struct Frame {
    pub(crate) data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub origin: FrameOrigin,
    pub captured_at: Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap packed RGB8 pixels (`width * height * 3` bytes).
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        origin: FrameOrigin,
        sequence: u32,
    ) -> Result<Self, FrameError> {
        let expected = rgb_len(width, height);
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.into(),
            width,
            height,
            origin,
            captured_at: Instant::now(),
            sequence,
        })
    }

    /// Build a frame from a decoded image, e.g. an uploaded still.
    pub fn from_image(image: RgbImage, origin: FrameOrigin) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw().into(),
            width,
            height,
            origin,
            captured_at: Instant::now(),
            sequence: 0,
        }
    }

    /// Same pixels, fresh capture time. Used when a frozen still is sampled again.
    pub fn resampled(&self) -> Self {
        Self {
            captured_at: Instant::now(),
            ..self.clone()
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Frame area in pixels.
    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }

    /// Copy out into an owned `RgbImage` for drawing or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.to_vec())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Encode as JPEG for evidence files and HTTP service payloads.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, FrameError> {
        let mut out = Cursor::new(Vec::new());
        self.to_rgb_image().write_to(&mut out, ImageFormat::Jpeg)?;
        Ok(out.into_inner())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("origin", &self.origin)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}
