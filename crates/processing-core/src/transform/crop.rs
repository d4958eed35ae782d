//! Center-crop-and-rescale zoom.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};

use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_keyframe_model::frame::{FrameBuffer, PixelFormat};
use framezoom_keyframe_model::zoom::ZoomResolution;

use super::{effective_zoom, FrameTransformer};

/// A crop rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Crop of size `(width / zoom, height / zoom)` centered on the frame.
///
/// The size is clamped to `[1, width] x [1, height]`, so zoom factors below 1
/// select the whole frame and huge factors collapse to a single pixel.
pub fn center_crop_window(width: u32, height: u32, zoom: f64) -> CropWindow {
    let crop_w = (width as f64 / zoom).round().clamp(1.0, width as f64) as u32;
    let crop_h = (height as f64 / zoom).round().clamp(1.0, height as f64) as u32;
    CropWindow {
        x: (width - crop_w) / 2,
        y: (height - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    }
}

/// Zoom by cropping around the frame center and scaling back up.
///
/// The keyframe center is not used.
#[derive(Debug, Clone, Copy)]
pub struct CenterCropZoom {
    min_zoom: f64,
}

impl CenterCropZoom {
    pub fn new(min_zoom: f64) -> Self {
        Self { min_zoom }
    }
}

impl FrameTransformer for CenterCropZoom {
    fn name(&self) -> &'static str {
        "center-crop"
    }

    fn transform(
        &self,
        frame: FrameBuffer,
        resolution: &ZoomResolution,
    ) -> FramezoomResult<FrameBuffer> {
        let Some(state) = resolution.state() else {
            return Ok(frame);
        };
        let Some(zoom) = effective_zoom(state, self.min_zoom)? else {
            return Ok(frame);
        };

        let (width, height) = frame.dimensions();
        let window = center_crop_window(width, height, zoom);
        if window.covers(width, height) {
            return Ok(frame);
        }

        let format = frame.format();
        let data = match format {
            PixelFormat::Rgb24 => crop_rescale::<Rgb<u8>>(frame.into_data(), width, height, window)?,
            PixelFormat::Rgba32 => {
                crop_rescale::<Rgba<u8>>(frame.into_data(), width, height, window)?
            }
        };
        FrameBuffer::new(width, height, format, data)
    }
}

fn crop_rescale<P>(data: Vec<u8>, width: u32, height: u32, window: CropWindow) -> FramezoomResult<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let source: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| FramezoomError::transform("frame buffer too small for its dimensions"))?;
    let cropped = imageops::crop_imm(&source, window.x, window.y, window.width, window.height)
        .to_image();
    Ok(imageops::resize(&cropped, width, height, FilterType::Triangle).into_raw())
}
