//! Luminance-preserving recolor.
//!
//! Re-tints the neutral (white/gray) painted region of a sprite with an
//! arbitrary colour. Each eligible pixel keeps its brightness, so shading
//! and anti-aliased edges survive, while dark outlines, transparent pixels
//! and reserved accent colours (a red nose, say) are left alone.

use image::{Rgb, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_not_empty, Error, Result};

/// Thresholds deciding which pixels are eligible for re-tinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecolorParams {
    /// Every pairwise channel difference must be below this (near-gray).
    pub similarity: u8,
    /// Average brightness must exceed this (excludes dark outlines).
    pub dark_threshold: u8,
    /// Accent exclusion: red above this...
    pub accent_red_min: u8,
    /// ...with green below this...
    pub accent_green_max: u8,
    /// ...and blue below this is a reserved accent colour.
    pub accent_blue_max: u8,
}

impl Default for RecolorParams {
    fn default() -> Self {
        Self {
            similarity: 40,
            dark_threshold: 60,
            accent_red_min: 150,
            accent_green_max: 100,
            accent_blue_max: 100,
        }
    }
}

impl RecolorParams {
    /// Whether the pixel is a reserved accent colour.
    #[must_use]
    pub fn is_accent(&self, [r, g, b]: [u8; 3]) -> bool {
        r > self.accent_red_min && g < self.accent_green_max && b < self.accent_blue_max
    }

    /// Whether an RGBA pixel should be re-tinted.
    #[must_use]
    pub fn is_eligible(&self, [r, g, b, a]: [u8; 4]) -> bool {
        let near_gray = r.abs_diff(g) < self.similarity
            && g.abs_diff(b) < self.similarity
            && r.abs_diff(b) < self.similarity;
        near_gray
            && brightness([r, g, b]) > f32::from(self.dark_threshold)
            && a > 0
            && !self.is_accent([r, g, b])
    }
}

fn brightness([r, g, b]: [u8; 3]) -> f32 {
    (f32::from(r) + f32::from(g) + f32::from(b)) / 3.0
}

/// Boolean mask of pixels eligible for re-tinting, row-major.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] for a zero-area image.
pub fn recolor_mask(image: &RgbaImage, params: &RecolorParams) -> Result<Vec<bool>> {
    ensure_not_empty(image)?;
    Ok(image.pixels().map(|px| params.is_eligible(px.0)).collect())
}

/// Re-tint the neutral region of `image` with `target`, preserving shading.
///
/// Each eligible channel becomes `brightness / 255 * target`, rounded and
/// clamped. Ineligible pixels and the alpha channel pass through untouched.
/// A white target reproduces true grays within rounding.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] for a zero-area image.
pub fn recolor(image: &RgbaImage, target: Rgb<u8>, params: &RecolorParams) -> Result<RgbaImage> {
    ensure_not_empty(image)?;
    let mut out = image.clone();
    let mut tinted = 0usize;

    for px in out.pixels_mut() {
        if !params.is_eligible(px.0) {
            continue;
        }
        let luminance = brightness([px[0], px[1], px[2]]) / 255.0;
        for ch in 0..3 {
            let value = luminance * f32::from(target[ch]);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                px[ch] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
        tinted += 1;
    }

    tracing::debug!(tinted, target = ?target.0, "recolored neutral region");
    Ok(out)
}

/// Produce one recolored copy per named target colour.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] for a zero-area image.
pub fn recolor_variants<'a>(
    image: &RgbaImage,
    variants: &[(&'a str, Rgb<u8>)],
    params: &RecolorParams,
) -> Result<Vec<(&'a str, RgbaImage)>> {
    variants
        .iter()
        .map(|&(name, target)| Ok((name, recolor(image, target, params)?)))
        .collect()
}

/// Parse a colour given as `#RRGGBB`, `RRGGBB` or `r,g,b`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] when the string is not a colour.
pub fn parse_rgb(s: &str) -> Result<Rgb<u8>> {
    let invalid = || Error::InvalidParameter(format!("not a colour: {s:?}"));
    let s = s.trim();

    if s.contains(',') {
        let parts: Vec<u8> = s
            .split(',')
            .map(|p| p.trim().parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<_>>()?;
        return match parts.as_slice() {
            [r, g, b] => Ok(Rgb([*r, *g, *b])),
            _ => Err(invalid()),
        };
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn params() -> RecolorParams {
        RecolorParams::default()
    }

    #[test]
    fn white_target_preserves_true_grays() {
        let mut img = RgbaImage::new(200, 1);
        for (x, px) in img.pixels_mut().enumerate() {
            let v = u8::try_from(x + 56).unwrap();
            *px = Rgba([v, v, v, 255]);
        }
        let out = recolor(&img, Rgb([255, 255, 255]), &params()).unwrap();
        for (a, b) in img.pixels().zip(out.pixels()) {
            for ch in 0..4 {
                assert!(a[ch].abs_diff(b[ch]) <= 1, "{a:?} -> {b:?}");
            }
        }
    }

    #[test]
    fn accent_pixels_are_never_modified() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([200, 20, 20, 255]));
        for target in [[0, 0, 0], [255, 255, 255], [128, 0, 32], [100, 149, 237]] {
            let out = recolor(&img, Rgb(target), &params()).unwrap();
            assert_eq!(out, img);
        }
    }

    #[test]
    fn dark_outline_is_untouched() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([10, 10, 10, 255]));
        let out = recolor(&img, Rgb([128, 0, 32]), &params()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn transparent_pixels_are_untouched() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
        let out = recolor(&img, Rgb([0, 0, 255]), &params()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn colored_features_are_untouched() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([40, 120, 220, 255]));
        let out = recolor(&img, Rgb([255, 0, 0]), &params()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn shading_is_preserved_on_tint() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([128, 128, 128, 200]));
        let out = recolor(&img, Rgb([100, 200, 50]), &params()).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [100, 200, 50, 255]);
        // 128/255 of the target, alpha untouched
        assert_eq!(out.get_pixel(1, 0).0, [50, 100, 25, 200]);
    }

    #[test]
    fn mask_matches_eligibility_rules() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(0, 0, Rgba([220, 220, 220, 255]));
        img.put_pixel(1, 0, Rgba([30, 30, 30, 255]));
        img.put_pixel(2, 0, Rgba([200, 20, 20, 255]));
        img.put_pixel(3, 0, Rgba([220, 220, 220, 0]));
        let mask = recolor_mask(&img, &params()).unwrap();
        assert_eq!(mask, vec![true, false, false, false]);
    }

    #[test]
    fn variants_are_produced_in_order() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let variants = [("white", Rgb([255, 255, 255])), ("garnet", Rgb([128, 0, 32]))];
        let out = recolor_variants(&img, &variants, &params()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "white");
        assert_eq!(out[0].1, img);
        assert_eq!(out[1].1.get_pixel(0, 0).0, [128, 0, 32, 255]);
    }

    #[test]
    fn parse_rgb_accepts_hex_and_triplets() {
        assert_eq!(parse_rgb("#6495ED").unwrap().0, [100, 149, 237]);
        assert_eq!(parse_rgb("ffb6c1").unwrap().0, [255, 182, 193]);
        assert_eq!(parse_rgb(" 128, 0 ,32 ").unwrap().0, [128, 0, 32]);
    }

    #[test]
    fn parse_rgb_rejects_garbage() {
        for bad in ["", "#12345", "zzzzzz", "1,2", "1,2,300", "#ééé"] {
            assert!(parse_rgb(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(recolor(&RgbaImage::new(0, 3), Rgb([1, 2, 3]), &params()).is_err());
    }
}
