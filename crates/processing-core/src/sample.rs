//! Bilinear pixel sampling with an explicit out-of-bounds policy.

use framezoom_common::config::EdgeFill;
use framezoom_keyframe_model::frame::FrameBuffer;

/// Sample `src` at the fractional pixel position `(sx, sy)` into `out`.
///
/// Integer coordinates address pixel indices, so `(0.0, 0.0)` is exactly the
/// top-left pixel. With [`EdgeFill::Solid`], taps that fall outside the frame
/// contribute the fill color, which blends the border smoothly like a
/// constant-border warp. With [`EdgeFill::Replicate`] the position is clamped
/// into the frame first.
pub fn sample_bilinear(src: &FrameBuffer, sx: f64, sy: f64, fill: EdgeFill, out: &mut [u8]) {
    let channels = src.channels();
    debug_assert_eq!(out.len(), channels);

    let max_x = (src.width() - 1) as f64;
    let max_y = (src.height() - 1) as f64;

    let (sx, sy, solid) = match fill {
        EdgeFill::Replicate => (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y), None),
        EdgeFill::Solid(color) => (sx, sy, Some(color)),
    };

    // Entirely outside: no tap can land on the frame.
    if let Some(color) = solid {
        if sx <= -1.0 || sy <= -1.0 || sx >= max_x + 1.0 || sy >= max_y + 1.0 {
            out.copy_from_slice(&color[..channels]);
            return;
        }
    }

    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 4];
    for (tx, ty, weight) in taps {
        if weight == 0.0 {
            continue;
        }
        let pixel = fetch(src, tx, ty, solid);
        for (a, &v) in acc.iter_mut().zip(pixel.iter()).take(channels) {
            *a += v as f64 * weight;
        }
    }

    for (o, a) in out.iter_mut().zip(acc.iter()) {
        *o = a.round().clamp(0.0, 255.0) as u8;
    }
}

/// Pixel at integer position, or the fill color / clamped edge outside.
fn fetch(src: &FrameBuffer, x: i64, y: i64, solid: Option<[u8; 4]>) -> [u8; 4] {
    let w = src.width() as i64;
    let h = src.height() as i64;
    let inside = x >= 0 && y >= 0 && x < w && y < h;

    if !inside {
        if let Some(color) = solid {
            return color;
        }
    }

    let px = x.clamp(0, w - 1) as u32;
    let py = y.clamp(0, h - 1) as u32;
    let mut pixel = [0u8; 4];
    let channels = src.pixel(px, py);
    pixel[..channels.len()].copy_from_slice(channels);
    pixel
}

#[cfg(test)]
mod tests {
    use super::*;
    use framezoom_keyframe_model::frame::PixelFormat;

    fn two_by_one() -> FrameBuffer {
        FrameBuffer::new(2, 1, PixelFormat::Rgb24, vec![0, 0, 0, 200, 100, 50]).unwrap()
    }

    #[test]
    fn test_integer_position_is_exact() {
        let src = two_by_one();
        let mut out = [0u8; 3];
        sample_bilinear(&src, 1.0, 0.0, EdgeFill::Replicate, &mut out);
        assert_eq!(out, [200, 100, 50]);
    }

    #[test]
    fn test_midpoint_blends() {
        let src = two_by_one();
        let mut out = [0u8; 3];
        sample_bilinear(&src, 0.5, 0.0, EdgeFill::Replicate, &mut out);
        assert_eq!(out, [100, 50, 25]);
    }

    #[test]
    fn test_replicate_clamps() {
        let src = two_by_one();
        let mut out = [0u8; 3];
        sample_bilinear(&src, 50.0, -3.0, EdgeFill::Replicate, &mut out);
        assert_eq!(out, [200, 100, 50]);
    }

    #[test]
    fn test_solid_fill_far_outside() {
        let src = two_by_one();
        let mut out = [0u8; 3];
        sample_bilinear(&src, -5.0, 0.0, EdgeFill::Solid([9, 8, 7, 255]), &mut out);
        assert_eq!(out, [9, 8, 7]);
    }

    #[test]
    fn test_solid_fill_blends_at_border() {
        let src = two_by_one();
        let mut out = [0u8; 3];
        sample_bilinear(&src, 1.5, 0.0, EdgeFill::Solid([0, 0, 0, 255]), &mut out);
        assert_eq!(out, [100, 50, 25]);
    }

    #[test]
    fn test_rgba_alpha_channel_sampled() {
        let src = FrameBuffer::new(1, 1, PixelFormat::Rgba32, vec![1, 2, 3, 128]).unwrap();
        let mut out = [0u8; 4];
        sample_bilinear(&src, 0.0, 0.0, EdgeFill::Solid([0, 0, 0, 0]), &mut out);
        assert_eq!(out, [1, 2, 3, 128]);
    }
}
