//! Pixel blending helpers shared by the fill-style removal methods.
//!
//! Blends follow `out = original * (1 - t) + replacement * t` per RGB
//! channel; alpha is never touched.

use image::{Rgba, RgbaImage};

use crate::watermark::PixelRect;

/// Hermite smoothstep: 0 below `edge0`, 1 above `edge1`, smooth in between.
#[must_use]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blend the RGB channels of `px` toward `target` by factor `t` in `[0, 1]`.
///
/// Results are truncated toward zero, so `t = 0` is an exact no-op.
pub fn blend_rgb(px: &mut Rgba<u8>, target: [u8; 3], t: f32) {
    let t = t.clamp(0.0, 1.0);
    for ch in 0..3 {
        let value = f32::from(px[ch]) * (1.0 - t) + f32::from(target[ch]) * t;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            px[ch] = value.clamp(0.0, 255.0) as u8;
        }
    }
}

/// Integer mean colour of the pixels inside `rect`.
///
/// Returns `None` for an empty rectangle.
#[must_use]
pub fn mean_rgb(image: &RgbaImage, rect: PixelRect) -> Option<[u8; 3]> {
    let count = rect.area();
    if count == 0 {
        return None;
    }

    let mut sums = [0u64; 3];
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            let px = image.get_pixel(x, y);
            for ch in 0..3 {
                sums[ch] += u64::from(px[ch]);
            }
        }
    }

    // Each mean is at most 255.
    #[allow(clippy::cast_possible_truncation)]
    let mean = sums.map(|s| (s / count) as u8);
    Some(mean)
}
