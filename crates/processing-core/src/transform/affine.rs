//! Scale-about-point zoom.
//!
//! The forward map is a similarity transform with no rotation:
//!
//! ```text
//! | s  0  (1 - s) * cx |
//! | 0  s  (1 - s) * cy |
//! ```
//!
//! Output pixels are filled by inverse mapping, `src = c + (dst - c) / s`,
//! and bilinear sampling.

use framezoom_common::config::EdgeFill;
use framezoom_common::error::FramezoomResult;
use framezoom_keyframe_model::frame::FrameBuffer;
use framezoom_keyframe_model::zoom::{ZoomCenter, ZoomResolution};

use super::{effective_zoom, FrameTransformer};
use crate::sample::sample_bilinear;

/// Zoom by scaling about the keyframe center.
#[derive(Debug, Clone, Copy)]
pub struct AffineZoom {
    edge_fill: EdgeFill,
    min_zoom: f64,
}

impl AffineZoom {
    pub fn new(edge_fill: EdgeFill, min_zoom: f64) -> Self {
        Self {
            edge_fill,
            min_zoom,
        }
    }

    pub fn edge_fill(&self) -> EdgeFill {
        self.edge_fill
    }

    fn warp(&self, src: &FrameBuffer, zoom: f64, center: ZoomCenter) -> FramezoomResult<FrameBuffer> {
        let (width, height) = src.dimensions();
        let channels = src.channels();
        let inv = 1.0 / zoom;

        let mut data = vec![0u8; FrameBuffer::byte_len(width, height, src.format())];
        for (y, row) in data.chunks_exact_mut(src.stride()).enumerate() {
            let sy = center.y + (y as f64 - center.y) * inv;
            for (x, out) in row.chunks_exact_mut(channels).enumerate() {
                let sx = center.x + (x as f64 - center.x) * inv;
                sample_bilinear(src, sx, sy, self.edge_fill, out);
            }
        }

        FrameBuffer::new(width, height, src.format(), data)
    }
}

impl FrameTransformer for AffineZoom {
    fn name(&self) -> &'static str {
        "affine"
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
        self.warp(&frame, zoom, state.center)
    }
}
