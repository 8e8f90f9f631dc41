//! Chroma-key alpha matting.
//!
//! Turns a generated image with a solid backdrop into an image with a
//! computed alpha channel. Two backdrop models are supported:
//!
//! - [`BackdropModel::GreenDominant`]: any pixel whose green channel dominates
//!   is background. Soft edges get partial alpha from a green-ratio band and
//!   are defringed so no green halo survives.
//! - [`BackdropModel::Sampled`]: the backdrop colour is read from a known
//!   background pixel and matched with a per-channel tolerance. Hard mask,
//!   no soft edges.
//!
//! Geometry is never changed: output dimensions equal input dimensions.

use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_not_empty, Result};

/// Thresholds for the green-dominant backdrop model.
///
/// The defaults are tuned for generator output on pure `#00FF00` and on the
/// yellow-green screens (around `(166, 217, 36)`) that image models tend to
/// produce instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenKeyParams {
    /// Blue must stay below this for a pixel to count as green-dominant.
    pub blue_max: f32,
    /// Green-dominant pixels brighter than this are definite background.
    pub green_min: f32,
    /// Lower bound of the soft-edge band on `g / (r + b + 1)`.
    pub ratio_low: f32,
    /// Width of the soft-edge band; full suppression at `ratio_low + ratio_band`.
    pub ratio_band: f32,
    /// Fraction of opacity removed at full edge suppression.
    pub max_suppression: f32,
    /// Strong-green override: minimum green.
    pub strong_green_min: f32,
    /// Strong-green override: green must exceed red by this much.
    pub strong_red_margin: f32,
    /// Strong-green override: green must exceed blue by this much.
    pub strong_blue_margin: f32,
    /// Soft-edge pixels (alpha in `1..defringe_alpha_max`) get defringed.
    pub defringe_alpha_max: u8,
    /// Defringed green is capped at this multiple of `(r + b) / 2`.
    pub defringe_factor: f32,
}

impl Default for GreenKeyParams {
    fn default() -> Self {
        Self {
            blue_max: 100.0,
            green_min: 150.0,
            ratio_low: 0.8,
            ratio_band: 0.7,
            max_suppression: 0.8,
            strong_green_min: 180.0,
            strong_red_margin: 30.0,
            strong_blue_margin: 100.0,
            defringe_alpha_max: 240,
            defringe_factor: 1.2,
        }
    }
}

impl GreenKeyParams {
    /// Green strictly exceeds red and blue, and blue is low.
    #[must_use]
    pub fn is_background_dominant(&self, [r, g, b]: [f32; 3]) -> bool {
        g > r && g > b && b < self.blue_max
    }

    /// Saturated green that the ratio test can miss.
    #[must_use]
    pub fn is_strong_green(&self, [r, g, b]: [f32; 3]) -> bool {
        g > self.strong_green_min && g > r + self.strong_red_margin && g > b + self.strong_blue_margin
    }

    /// Opacity factor in `[0, 1]` for one pixel: 0 is background, 1 is subject.
    #[must_use]
    pub fn alpha_factor(&self, rgb: [f32; 3]) -> f32 {
        let [r, g, b] = rgb;
        if self.is_background_dominant(rgb) && g > self.green_min {
            return 0.0;
        }
        if self.is_strong_green(rgb) {
            return 0.0;
        }

        // +1 keeps black pixels at ratio 0 instead of dividing by zero.
        let ratio = if g > 0.0 { g / (r + b + 1.0) } else { 0.0 };
        let band = self.ratio_band.max(f32::EPSILON);
        let edge_greenness = ((ratio - self.ratio_low) / band).clamp(0.0, 1.0);
        (1.0 - edge_greenness * self.max_suppression).clamp(0.0, 1.0)
    }

    /// Cap the green channel of a soft-edge pixel to remove the halo.
    fn defringe(&self, [r, g, b]: [f32; 3]) -> u8 {
        let capped = g.min((r + b) / 2.0 * self.defringe_factor);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            capped.clamp(0.0, 255.0) as u8
        }
    }
}

/// Parameters for the sampled-colour backdrop model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampledKeyParams {
    /// X coordinate of the known-background sample pixel.
    pub sample_x: u32,
    /// Y coordinate of the known-background sample pixel.
    pub sample_y: u32,
    /// A pixel is background when every channel differs by less than this.
    pub tolerance: u8,
}

impl Default for SampledKeyParams {
    fn default() -> Self {
        Self {
            sample_x: 5,
            sample_y: 5,
            tolerance: 30,
        }
    }
}

/// The backdrop colour model used for one matting call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackdropModel {
    /// Green-family backdrop with soft edges and defringing.
    GreenDominant(GreenKeyParams),
    /// Backdrop colour sampled from a known background pixel; hard mask.
    Sampled(SampledKeyParams),
}

impl Default for BackdropModel {
    fn default() -> Self {
        Self::GreenDominant(GreenKeyParams::default())
    }
}

/// Per-pixel opacity in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl AlphaMask {
    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Opacity at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        assert!(x < self.width && y < self.height, "mask index out of bounds");
        self.values[(y * self.width + x) as usize]
    }

    /// All opacities, row-major.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Quantise to an 8-bit alpha plane (truncating, as the matte does).
    #[must_use]
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| Luma([to_alpha(self.get(x, y))]))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_alpha(factor: f32) -> u8 {
    (factor.clamp(0.0, 1.0) * 255.0) as u8
}

fn rgb_f32(px: &Rgba<u8>) -> [f32; 3] {
    [f32::from(px[0]), f32::from(px[1]), f32::from(px[2])]
}

/// Read the backdrop colour at the configured sample point.
///
/// The sample point is clamped into the image so tiny images still work.
///
/// # Errors
///
/// Returns [`crate::Error::EmptyImage`] for a zero-area image.
pub fn sample_backdrop(image: &RgbaImage, params: &SampledKeyParams) -> Result<Rgb<u8>> {
    ensure_not_empty(image)?;
    let (x, y) = sample_point(image, params);
    let px = image.get_pixel(x, y);
    Ok(Rgb([px[0], px[1], px[2]]))
}

fn sample_point(image: &RgbaImage, params: &SampledKeyParams) -> (u32, u32) {
    (
        params.sample_x.min(image.width() - 1),
        params.sample_y.min(image.height() - 1),
    )
}

/// An already-keyed image has no backdrop colour left to sample.
fn sample_is_transparent(image: &RgbaImage, params: &SampledKeyParams) -> bool {
    let (x, y) = sample_point(image, params);
    image.get_pixel(x, y)[3] == 0
}

fn matches_backdrop(px: &Rgba<u8>, backdrop: Rgb<u8>, tolerance: u8) -> bool {
    (0..3).all(|ch| px[ch].abs_diff(backdrop[ch]) < tolerance)
}

/// Compute the opacity mask for an image under a backdrop model.
///
/// The mask reflects the backdrop only; any alpha already present in the
/// input is combined later by [`matte`].
///
/// # Errors
///
/// Returns [`crate::Error::EmptyImage`] for a zero-area image.
pub fn alpha_mask(image: &RgbaImage, model: &BackdropModel) -> Result<AlphaMask> {
    ensure_not_empty(image)?;
    let values = match model {
        BackdropModel::GreenDominant(params) => image
            .pixels()
            .map(|px| params.alpha_factor(rgb_f32(px)))
            .collect(),
        BackdropModel::Sampled(params) if sample_is_transparent(image, params) => {
            tracing::debug!("sample point already transparent, nothing keyed");
            vec![1.0; image.pixels().len()]
        }
        BackdropModel::Sampled(params) => {
            let backdrop = sample_backdrop(image, params)?;
            tracing::debug!(r = backdrop[0], g = backdrop[1], b = backdrop[2], "sampled backdrop colour");
            image
                .pixels()
                .map(|px| {
                    if matches_backdrop(px, backdrop, params.tolerance) {
                        0.0
                    } else {
                        1.0
                    }
                })
                .collect()
        }
    };

    Ok(AlphaMask {
        width: image.width(),
        height: image.height(),
        values,
    })
}

/// Remove the backdrop from an image, producing an image with alpha.
///
/// Alpha already present in the input is kept where it is lower than the
/// computed opacity, so pixels that were transparent stay transparent. When no
/// backdrop pixel is found the image comes back unchanged.
///
/// Green-dominant keying keeps the original red and blue channels, defringes
/// green on soft-edge pixels and leaves fully opaque subject pixels alone.
/// Sampled keying clears background pixels to `(0, 0, 0, 0)`.
///
/// # Errors
///
/// Returns [`crate::Error::EmptyImage`] for a zero-area image.
pub fn matte(image: &RgbaImage, model: &BackdropModel) -> Result<RgbaImage> {
    let mask = alpha_mask(image, model)?;
    let mut out = image.clone();

    match model {
        BackdropModel::GreenDominant(params) => {
            for (px, &factor) in out.pixels_mut().zip(mask.values()) {
                let key_alpha = to_alpha(factor);
                if key_alpha > 0 && key_alpha < params.defringe_alpha_max {
                    px[1] = params.defringe(rgb_f32(px));
                }
                px[3] = px[3].min(key_alpha);
            }
        }
        BackdropModel::Sampled(_) => {
            for (px, &factor) in out.pixels_mut().zip(mask.values()) {
                if factor <= 0.0 {
                    *px = Rgba([0, 0, 0, 0]);
                }
            }
        }
    }

    let cleared = out.pixels().filter(|px| px[3] == 0).count();
    tracing::debug!(
        width = out.width(),
        height = out.height(),
        cleared,
        "matted backdrop"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    fn green() -> BackdropModel {
        BackdropModel::default()
    }

    #[test]
    fn pure_green_image_becomes_fully_transparent() {
        let img = solid(10, 10, [0, 255, 0]);
        let out = matte(&img, &green()).unwrap();
        assert_eq!(out.dimensions(), (10, 10));
        assert!(out.pixels().all(|px| px[3] == 0));
    }

    #[test]
    fn near_black_subject_stays_opaque_and_unchanged() {
        let img = solid(10, 10, [10, 10, 10]);
        let out = matte(&img, &green()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn yellow_green_screen_is_background() {
        let img = solid(4, 4, [166, 217, 36]);
        let out = matte(&img, &green()).unwrap();
        assert!(out.pixels().all(|px| px[3] == 0));
    }

    #[test]
    fn rematting_transparent_background_keeps_alpha_zero() {
        let img = solid(6, 6, [20, 200, 40]);
        let once = matte(&img, &green()).unwrap();
        let twice = matte(&once, &green()).unwrap();
        assert!(once.pixels().all(|px| px[3] == 0));
        assert!(twice.pixels().all(|px| px[3] == 0));
    }

    #[test]
    fn strong_green_override_catches_high_blue_pixels() {
        // Blue too high for the dominance test, but still saturated green.
        let params = GreenKeyParams::default();
        let rgb = [150.0, 230.0, 120.0];
        assert!(!params.is_background_dominant(rgb));
        assert!(params.is_strong_green(rgb));
        assert!(params.alpha_factor(rgb).abs() < f32::EPSILON);
    }

    #[test]
    fn soft_edge_gets_partial_alpha_and_defringe() {
        let img = solid(1, 1, [100, 150, 60]);
        let out = matte(&img, &green()).unwrap();
        let px = out.get_pixel(0, 0);
        assert!(px[3] > 0 && px[3] < 240, "alpha {}", px[3]);
        // green capped at (100 + 60) / 2 * 1.2
        assert_eq!(px[1], 96);
        assert_eq!(px[0], 100);
        assert_eq!(px[2], 60);
    }

    #[test]
    fn zero_pixel_has_zero_ratio() {
        let params = GreenKeyParams::default();
        assert!((params.alpha_factor([0.0, 0.0, 0.0]) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_suppression_never_exceeds_configured_maximum() {
        let params = GreenKeyParams::default();
        // Ratio far above the band but not dominant background (blue too high).
        let factor = params.alpha_factor([0.0, 160.0, 100.0]);
        assert!((factor - 0.2).abs() < 1e-5, "factor {factor}");
    }

    #[test]
    fn opaque_subject_is_not_defringed() {
        let img = solid(2, 2, [200, 180, 170]);
        let out = matte(&img, &green()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn existing_transparency_is_preserved() {
        let mut img = solid(2, 1, [200, 40, 40]);
        img.put_pixel(1, 0, Rgba([200, 40, 40, 0]));
        let out = matte(&img, &green()).unwrap();
        assert_eq!(out.get_pixel(0, 0)[3], 255);
        assert_eq!(out.get_pixel(1, 0)[3], 0);
    }

    #[test]
    fn sampled_model_clears_backdrop_and_keeps_subject() {
        let mut img = solid(10, 10, [141, 206, 74]);
        for y in 3..7 {
            for x in 3..7 {
                img.put_pixel(x, y, Rgba([200, 50, 50, 255]));
            }
        }
        let model = BackdropModel::Sampled(SampledKeyParams::default());
        let out = matte(&img, &model).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(9, 9).0, [0, 0, 0, 0]);
        assert_eq!(out.get_pixel(4, 4).0, [200, 50, 50, 255]);
    }

    #[test]
    fn sampled_model_respects_tolerance() {
        let mut img = solid(8, 8, [50, 50, 200]);
        img.put_pixel(7, 7, Rgba([79, 50, 200, 255]));
        img.put_pixel(6, 7, Rgba([80, 50, 200, 255]));
        let model = BackdropModel::Sampled(SampledKeyParams::default());
        let out = matte(&img, &model).unwrap();
        assert_eq!(out.get_pixel(7, 7)[3], 0);
        assert_eq!(out.get_pixel(6, 7)[3], 255);
    }

    #[test]
    fn sample_point_is_clamped_into_small_images() {
        let img = solid(3, 3, [1, 2, 3]);
        let c = sample_backdrop(&img, &SampledKeyParams::default()).unwrap();
        assert_eq!(c.0, [1, 2, 3]);
    }

    #[test]
    fn alpha_mask_matches_matte_alpha() {
        let mut img = solid(3, 1, [0, 255, 0]);
        img.put_pixel(1, 0, Rgba([100, 150, 60, 255]));
        img.put_pixel(2, 0, Rgba([90, 90, 90, 255]));
        let mask = alpha_mask(&img, &green()).unwrap();
        let plane = mask.to_luma8();
        let out = matte(&img, &green()).unwrap();
        for x in 0..3 {
            assert_eq!(plane.get_pixel(x, 0)[0], out.get_pixel(x, 0)[3]);
        }
        assert!(mask.get(0, 0).abs() < f32::EPSILON);
        assert!((mask.get(2, 0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = RgbaImage::new(0, 0);
        assert!(matte(&img, &green()).is_err());
    }

    #[test]
    fn backdrop_model_deserializes_from_tagged_json() {
        let model: BackdropModel =
            serde_json::from_str(r#"{"kind":"sampled","tolerance":12}"#).unwrap();
        assert_eq!(
            model,
            BackdropModel::Sampled(SampledKeyParams {
                tolerance: 12,
                ..SampledKeyParams::default()
            })
        );
    }

    #[test]
    fn sampled_matte_is_idempotent_on_dark_subject() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([250, 0, 250, 255]));
        for y in 8..14 {
            for x in 8..14 {
                img.put_pixel(x, y, Rgba([10, 10, 10, 255]));
            }
        }
        let model = BackdropModel::Sampled(SampledKeyParams::default());
        let once = matte(&img, &model).unwrap();
        assert_eq!(once.get_pixel(5, 5).0, [0, 0, 0, 0]);
        assert_eq!(once.get_pixel(10, 10).0, [10, 10, 10, 255]);

        let twice = matte(&once, &model).unwrap();
        assert_eq!(twice, once);
    }
}
