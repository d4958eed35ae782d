//! Frame transformers: apply a resolved zoom to one frame buffer.
//!
//! Two strategies exist and they do not produce the same pixels:
//!
//! - [`AffineZoom`] scales about the keyframe center (`affine`).
//! - [`CenterCropZoom`] crops around the frame center and rescales
//!   (`center-crop`); the keyframe center is ignored.
//!
//! Every transformer returns a frame with the input's dimensions and pixel
//! format. An inactive resolution hands the input buffer back untouched.

mod affine;
mod crop;

pub use affine::AffineZoom;
pub use crop::{center_crop_window, CenterCropZoom, CropWindow};

use framezoom_common::config::{TransformSettings, TransformStrategy};
use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_keyframe_model::frame::FrameBuffer;
use framezoom_keyframe_model::zoom::{ZoomResolution, ZoomState};

/// A geometric zoom strategy.
pub trait FrameTransformer: Send + Sync {
    /// Strategy name, as used in configuration.
    fn name(&self) -> &'static str;

    /// Produce the output frame for `resolution`.
    fn transform(
        &self,
        frame: FrameBuffer,
        resolution: &ZoomResolution,
    ) -> FramezoomResult<FrameBuffer>;
}

/// Build the transformer selected by `settings.strategy`.
pub fn build_transformer(settings: &TransformSettings) -> Box<dyn FrameTransformer> {
    tracing::debug!(
        strategy = settings.strategy.as_str(),
        min_zoom = settings.min_zoom,
        "Building frame transformer"
    );
    match settings.strategy {
        TransformStrategy::Affine => Box::new(AffineZoom::new(settings.edge_fill, settings.min_zoom)),
        TransformStrategy::CenterCrop => Box::new(CenterCropZoom::new(settings.min_zoom)),
    }
}

/// The zoom factor to apply, or `None` when the frame should pass through.
fn effective_zoom(state: &ZoomState, min_zoom: f64) -> FramezoomResult<Option<f64>> {
    let zoom = state.zoom_factor;
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(FramezoomError::transform(format!(
            "zoom factor must be positive and finite, got {zoom}"
        )));
    }
    if zoom <= min_zoom {
        return Ok(None);
    }
    Ok(Some(zoom))
}
