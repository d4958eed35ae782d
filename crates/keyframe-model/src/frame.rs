//! Decoded frame buffers.

use serde::{Deserialize, Serialize};

use framezoom_common::error::{FramezoomError, FramezoomResult};

/// Channel layout of a frame. Fixed for the lifetime of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit R, G, B.
    Rgb24,
    /// Packed 8-bit R, G, B, A.
    Rgba32,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }

    /// Name understood by ffmpeg's `-pix_fmt`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba32 => "rgba",
        }
    }
}

/// One decoded image: `height` rows of `width` tightly packed pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FrameBuffer {
    /// Wrap raw pixel bytes, checking the length against the geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> FramezoomResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramezoomError::transform(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let expected = Self::byte_len(width, height, format);
        if data.len() != expected {
            return Err(FramezoomError::transform(format!(
                "frame buffer holds {} bytes, expected {expected} for {width}x{height} {}",
                data.len(),
                format.ffmpeg_name()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A frame where every pixel is `pixel`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> FramezoomResult<Self> {
        if pixel.len() != format.channels() {
            return Err(FramezoomError::transform(format!(
                "fill pixel has {} channels, {} expects {}",
                pixel.len(),
                format.ffmpeg_name(),
                format.channels()
            )));
        }
        let count = width as usize * height as usize;
        let data = pixel.repeat(count);
        Self::new(width, height, format, data)
    }

    /// Number of bytes a frame of this geometry occupies.
    pub fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.channels()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channels of the pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels();
        let offset = y as usize * self.stride() + x as usize * c;
        &self.data[offset..offset + c]
    }

    /// Whether `other` has the same dimensions and layout.
    pub fn same_shape(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}
