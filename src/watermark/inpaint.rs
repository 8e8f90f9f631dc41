//! Built-in classical inpainting.
//!
//! [`DiffusionInpainter`] fills the masked region from its boundary inward,
//! one onion layer at a time: every masked pixel that has known pixels within
//! `radius` takes their inverse-square-distance weighted mean, then joins the
//! known set. A few Jacobi smoothing passes over the filled region remove the
//! layer banding. RGB only; alpha is left as it was.

use image::{GrayImage, Rgba, RgbaImage};

use crate::capabilities::ClassicalInpainter;
use crate::error::{ensure_not_empty, Error, Result};

/// Onion-peel diffusion inpainting, the crate's own classical backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffusionInpainter {
    /// Laplacian smoothing passes after the fill.
    pub smoothing_passes: u32,
}

impl Default for DiffusionInpainter {
    fn default() -> Self {
        Self {
            smoothing_passes: 4,
        }
    }
}

fn index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Weighted mean of known pixels within `radius` of `(x, y)`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn known_mean(image: &RgbaImage, known: &[bool], x: u32, y: u32, radius: i64) -> Option<[u8; 3]> {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let (cx, cy) = (i64::from(x), i64::from(y));
    let mut sums = [0.0_f32; 3];
    let mut total = 0.0_f32;

    for ny in (cy - radius).max(0)..=(cy + radius).min(h - 1) {
        for nx in (cx - radius).max(0)..=(cx + radius).min(w - 1) {
            let (ux, uy) = (nx as u32, ny as u32);
            if !known[index(image.width(), ux, uy)] {
                continue;
            }
            let d2 = ((nx - cx).pow(2) + (ny - cy).pow(2)) as f32;
            let weight = 1.0 / d2;
            let px = image.get_pixel(ux, uy);
            for ch in 0..3 {
                sums[ch] += weight * f32::from(px[ch]);
            }
            total += weight;
        }
    }

    (total > 0.0).then(|| sums.map(|s| to_u8(s / total)))
}

/// Mean of the 4-neighbourhood, clipped at the image border.
fn neighbour_mean(image: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
    let (w, h) = image.dimensions();
    let neighbours = [
        (x.checked_sub(1), Some(y)),
        ((x + 1 < w).then_some(x + 1), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), (y + 1 < h).then_some(y + 1)),
    ];

    let mut sums = [0u32; 3];
    let mut count = 0u32;
    for (nx, ny) in neighbours {
        if let (Some(nx), Some(ny)) = (nx, ny) {
            let px = image.get_pixel(nx, ny);
            for ch in 0..3 {
                sums[ch] += u32::from(px[ch]);
            }
            count += 1;
        }
    }
    if count == 0 {
        let px = image.get_pixel(x, y);
        return [px[0], px[1], px[2]];
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sums.map(|s| to_u8(s as f32 / count as f32));
    mean
}

fn set_rgb(px: &mut Rgba<u8>, rgb: [u8; 3]) {
    px[0] = rgb[0];
    px[1] = rgb[1];
    px[2] = rgb[2];
}

impl ClassicalInpainter for DiffusionInpainter {
    fn name(&self) -> &'static str {
        "diffusion inpainter"
    }

    fn inpaint(&self, image: &RgbaImage, mask: &GrayImage, radius: u32) -> Result<RgbaImage> {
        ensure_not_empty(image)?;
        if mask.dimensions() != image.dimensions() {
            return Err(Error::DimensionMismatch {
                service: self.name(),
                expected_w: image.width(),
                expected_h: image.height(),
                actual_w: mask.width(),
                actual_h: mask.height(),
            });
        }

        let masked: Vec<(u32, u32)> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        let mut known: Vec<bool> = mask.pixels().map(|p| p[0] == 0).collect();
        if masked.is_empty() || !known.contains(&true) {
            return Ok(image.clone());
        }

        let width = image.width();
        let radius = i64::from(radius.max(1));
        let mut out = image.clone();
        let mut pending = masked.clone();
        let mut layers = 0u32;

        while !pending.is_empty() {
            let mut layer = Vec::new();
            let mut rest = Vec::new();
            for &(x, y) in &pending {
                match known_mean(&out, &known, x, y, radius) {
                    Some(rgb) => layer.push((x, y, rgb)),
                    None => rest.push((x, y)),
                }
            }
            if layer.is_empty() {
                break;
            }
            for (x, y, rgb) in layer {
                set_rgb(out.get_pixel_mut(x, y), rgb);
                known[index(width, x, y)] = true;
            }
            pending = rest;
            layers += 1;
        }

        for _ in 0..self.smoothing_passes {
            let updates: Vec<_> = masked
                .iter()
                .map(|&(x, y)| (x, y, neighbour_mean(&out, x, y)))
                .collect();
            for (x, y, rgb) in updates {
                set_rgb(out.get_pixel_mut(x, y), rgb);
            }
        }

        tracing::debug!(pixels = masked.len(), layers, "diffusion inpaint done");
        Ok(out)
    }
}
