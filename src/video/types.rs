use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Represents a single decoded video frame
///
/// A thin wrapper around an RGB8 image buffer. Decoders hand these out and
/// encoders consume them; the change estimator works on the raw bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self { buffer: ImageBuffer::new(width, height) }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Create a frame from raw RGB bytes (`width * height * 3` of them)
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Interleaved RGB bytes, row major
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }
}

/// Stream properties of an opened video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    /// Duration in seconds derived from frame count and frame rate
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    /// Bytes in one rgb24 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Frame number containing the given timestamp
    pub fn frame_at(&self, seconds: f64) -> u64 {
        time_to_frame(seconds, self.fps)
    }
}

/// `floor(seconds * fps)`, clamped at zero
pub fn time_to_frame(seconds: f64, fps: f64) -> u64 {
    (seconds * fps).floor().max(0.0) as u64
}

/// Encoder parameters for one output file
#[derive(Debug, Clone, PartialEq)]
pub struct WriterParams {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Encoder name understood by the backend (e.g. `libx264`)
    pub codec: String,
}

impl WriterParams {
    /// Match the source's native rate and size
    pub fn matching(metadata: &VideoMetadata, codec: &str) -> Self {
        Self {
            fps: metadata.fps,
            width: metadata.width,
            height: metadata.height,
            codec: codec.to_string(),
        }
    }
}
