//! Parameter types for compression requests.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the queue (which decides what gets compressed, and
//! when) and the engine (which does the actual pixel work), so the queue
//! can be tested against a mock engine without touching a codec.

use crate::formats::ImageFormat;

/// Lossy encoding quality in `0.0..=1.0` (fraction of maximum).
/// Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Map to the 1–100 scale most encoders take.
    pub fn as_percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).max(1)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.8)
    }
}

/// Full specification of one compression request.
///
/// `max_width`/`max_height` bound the output dimensions (aspect ratio
/// preserved; images already inside the bounds are not upscaled).
/// `target_size_kb` asks the engine to step quality down until the encoded
/// output fits, or the quality floor is reached — best effort, not a
/// guarantee.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressOptions {
    pub format: ImageFormat,
    pub quality: Quality,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub target_size_kb: Option<u32>,
}

impl CompressOptions {
    pub fn new(format: ImageFormat, quality: f32) -> Self {
        Self {
            format,
            quality: Quality::new(quality),
            max_width: None,
            max_height: None,
            target_size_kb: None,
        }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self::new(ImageFormat::Webp, Quality::default().value())
    }
}
