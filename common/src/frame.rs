use chrono::Utc;
use image::{DynamicImage, GrayImage};

/// A single captured bitmap with its capture timestamp.
///
/// Frames are read-only once constructed. The change detector keeps at most
/// one of them alive across iterations (the current reference slide); every
/// other frame is dropped as soon as the accept/reject decision is made.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
    captured_at_ms: i64,
}

impl Frame {
    pub fn new(image: DynamicImage, captured_at_ms: i64) -> Self {
        Self {
            image,
            captured_at_ms,
        }
    }

    /// Wrap an image captured "now".
    pub fn from_image(image: DynamicImage) -> Self {
        Self::new(image, Utc::now().timestamp_millis())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Single-channel intensity view used by the similarity engines.
    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Capture time as Unix millis.
    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at_ms
    }
}

/// An accepted slide: a frame plus its 1-based position in the session.
///
/// Records are immutable and handed to the output sink exactly once, in
/// sequence order.
#[derive(Debug, Clone)]
pub struct SlideRecord {
    seq: u64,
    frame: Frame,
}

impl SlideRecord {
    pub fn new(seq: u64, frame: Frame) -> Self {
        Self { seq, frame }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn captured_at_ms(&self) -> i64 {
        self.frame.captured_at_ms
    }
}
