//! Corner watermark localisation and removal.
//!
//! Removal runs exactly one method from a ranked chain, best first:
//!
//! | Rank | Method | Needs |
//! |---|---|---|
//! | 1 | [`RemovalMethod::ModelInpaint`] | a [`MaskInpainter`](crate::MaskInpainter) |
//! | 2 | [`RemovalMethod::ClassicalInpaint`] | a [`ClassicalInpainter`](crate::ClassicalInpainter) |
//! | 3 | [`RemovalMethod::Clone`] | nothing |
//! | 4 | [`RemovalMethod::RadialFill`] | nothing |
//! | 5 | [`RemovalMethod::CropRescale`] | nothing |
//!
//! The method is chosen from the [`Capabilities`] passed in, so the same set
//! of capabilities always selects the same method.

mod corner;
mod detection;
#[cfg(feature = "classical-inpaint")]
mod inpaint;
mod methods;

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub use corner::{Corner, PixelRect};
use corner::CornerFrame;
pub use detection::{detect_watermark, Detection, DetectionParams};
#[cfg(feature = "classical-inpaint")]
pub use inpaint::DiffusionInpainter;

use crate::capabilities::Capabilities;
use crate::error::{ensure_not_empty, ensure_same_size, Error, Result};

/// A watermark removal strategy, ordered best (rank 1) to worst (rank 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalMethod {
    /// Detect the mark and hand an elliptical mask to a large-mask inpainter.
    ModelInpaint,
    /// Inpaint a fixed corner triangle with a classical routine.
    ClassicalInpaint,
    /// Paste a patch cloned from further along an edge.
    Clone,
    /// Blend the corner toward the mean colour of a nearby patch.
    RadialFill,
    /// Trim the corner edges and scale back up.
    CropRescale,
}

impl RemovalMethod {
    /// Every method, best first.
    pub const CHAIN: [Self; 5] = [
        Self::ModelInpaint,
        Self::ClassicalInpaint,
        Self::Clone,
        Self::RadialFill,
        Self::CropRescale,
    ];

    /// Quality rank, 1 is best.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::ModelInpaint => 1,
            Self::ClassicalInpaint => 2,
            Self::Clone => 3,
            Self::RadialFill => 4,
            Self::CropRescale => 5,
        }
    }

    /// Stable name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ModelInpaint => "model-inpaint",
            Self::ClassicalInpaint => "classical-inpaint",
            Self::Clone => "clone",
            Self::RadialFill => "radial-fill",
            Self::CropRescale => "crop-rescale",
        }
    }

    /// Whether the capabilities this method needs are present.
    #[must_use]
    pub fn is_available(self, capabilities: &Capabilities) -> bool {
        match self {
            Self::ModelInpaint => capabilities.mask_inpainter.is_some(),
            Self::ClassicalInpaint => capabilities.classical_inpainter.is_some(),
            Self::Clone | Self::RadialFill | Self::CropRescale => true,
        }
    }
}

impl fmt::Display for RemovalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RemovalMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "model-inpaint" | "model" | "lama" => Ok(Self::ModelInpaint),
            "classical-inpaint" | "inpaint" | "classical" => Ok(Self::ClassicalInpaint),
            "clone" => Ok(Self::Clone),
            "radial-fill" | "fill" => Ok(Self::RadialFill),
            "crop-rescale" | "crop" => Ok(Self::CropRescale),
            _ => Err(Error::InvalidParameter(format!("unknown removal method: {s}"))),
        }
    }
}

/// Pick the best available method, starting at `ceiling` when given.
///
/// The pure-pixel methods are always available, so this never fails.
#[must_use]
pub fn select_method(capabilities: &Capabilities, ceiling: Option<RemovalMethod>) -> RemovalMethod {
    RemovalMethod::CHAIN
        .into_iter()
        .filter(|m| ceiling.is_none_or(|c| *m >= c))
        .find(|m| m.is_available(capabilities))
        .unwrap_or(RemovalMethod::CropRescale)
}

/// Where the clone method takes its patch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloneSource {
    /// Further away from the corner vertically (above, for bottom corners).
    #[default]
    Above,
    /// Further away from the corner horizontally, on the same rows.
    Beside,
}

impl CloneSource {
    fn other(self) -> Self {
        match self {
            Self::Above => Self::Beside,
            Self::Beside => Self::Above,
        }
    }
}

/// How the cloned patch is blended into the corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloneBlend {
    /// Hard paste.
    None,
    /// Horizontal alpha ramp from the outer edge of the patch.
    Horizontal,
    /// Radial alpha falloff away from the corner.
    #[default]
    Radial,
}

/// Watermark removal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Corner holding the mark.
    pub corner: Corner,
    /// Nominal size of the corner region, in pixels.
    pub size: u32,
    /// Extra radius around a located mark for model inpainting.
    pub padding: u32,
    /// Sampling radius for classical inpainting.
    pub inpaint_radius: u32,
    /// Clone patch direction.
    pub clone_source: CloneSource,
    /// Clone patch distance as a multiple of `size` (at least 1).
    pub clone_offset: f32,
    /// Clone seam blending.
    pub clone_blend: CloneBlend,
    /// Side of the patch sampled for the radial fill colour.
    pub fill_sample: u32,
    /// Radial fill gain; the blend is 0 where the square meets the rest of
    /// the image and reaches 1 within `(size - 1) * (1 - 1 / fill_falloff)` of
    /// the image corner.
    pub fill_falloff: f32,
    /// Best method to consider; lower-ranked methods remain as fallbacks.
    pub method: Option<RemovalMethod>,
    /// Detection tunables.
    pub detection: DetectionParams,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            corner: Corner::BottomRight,
            size: 60,
            padding: 10,
            inpaint_radius: 3,
            clone_source: CloneSource::Above,
            clone_offset: 2.0,
            clone_blend: CloneBlend::Radial,
            fill_sample: 20,
            fill_falloff: 1.2,
            method: None,
            detection: DetectionParams::default(),
        }
    }
}

/// The area targeted by a removal, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkRegion {
    /// Centre of the mark.
    pub center: (u32, u32),
    /// Diameter / side of the mark.
    pub size: u32,
}

impl WatermarkRegion {
    /// Half the size.
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.size / 2
    }
}

/// Result of one removal call.
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    /// The cleaned image.
    pub image: RgbaImage,
    /// Method that actually produced `image`.
    pub method: RemovalMethod,
    /// Region that was targeted.
    pub region: WatermarkRegion,
    /// Whether the region came from detection rather than the nominal offset.
    pub detected: bool,
}

/// Removes corner watermarks using the best method the capabilities allow.
///
/// Create once per process and reuse; it holds no per-call state.
#[derive(Debug, Clone, Default)]
pub struct WatermarkRemover {
    config: WatermarkConfig,
    capabilities: Capabilities,
}

impl WatermarkRemover {
    /// Create a remover from settings and the available capabilities.
    #[must_use]
    pub fn new(config: WatermarkConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// The method [`remove`](Self::remove) will start with.
    #[must_use]
    pub fn selected_method(&self) -> RemovalMethod {
        select_method(&self.capabilities, self.config.method)
    }

    /// The fixed corner-offset region used when detection misses.
    #[must_use]
    pub fn nominal_region(&self, width: u32, height: u32) -> WatermarkRegion {
        let frame = CornerFrame::new(self.config.corner, width, height);
        let half = self.config.size / 2;
        let center = frame
            .to_image(half.min(width.saturating_sub(1)), half.min(height.saturating_sub(1)))
            .unwrap_or((0, 0));
        WatermarkRegion {
            center,
            size: self.config.size,
        }
    }

    /// Run detection at the configured corner.
    #[must_use]
    pub fn detect(&self, image: &RgbaImage) -> Option<Detection> {
        detect_watermark(image, self.config.corner, &self.config.detection)
    }

    /// Detected region, or the nominal one on a miss. The flag tells which.
    #[must_use]
    pub fn locate(&self, image: &RgbaImage) -> (WatermarkRegion, bool) {
        match self.detect(image) {
            Some(d) => (
                WatermarkRegion {
                    center: d.center,
                    size: d.size,
                },
                true,
            ),
            None => {
                tracing::warn!("watermark not detected, using nominal corner offset");
                (self.nominal_region(image.width(), image.height()), false)
            }
        }
    }

    /// Remove the watermark.
    ///
    /// Dimensions are preserved by every method; crop-rescale scales back to
    /// the original size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyImage`] for a zero-area image, and propagates any
    /// failure of an external inpainting backend unchanged.
    pub fn remove(&self, image: &RgbaImage) -> Result<RemovalOutcome> {
        ensure_not_empty(image)?;
        let (width, height) = image.dimensions();
        let frame = CornerFrame::new(self.config.corner, width, height);
        let size = self.config.size.min(width).min(height);
        let nominal = self.nominal_region(width, height);
        let method = self.selected_method();
        tracing::info!(%method, rank = method.rank(), size, "removing watermark");

        let outcome = |image, method, region, detected| RemovalOutcome {
            image,
            method,
            region,
            detected,
        };

        match method {
            RemovalMethod::ModelInpaint => {
                let inpainter = self.capabilities.mask_inpainter.as_ref().ok_or_else(|| Error::External {
                    service: "mask inpainter",
                    message: "not available".to_string(),
                })?;
                let (region, detected) = self.locate(image);
                let mask = methods::ellipse_mask(
                    width,
                    height,
                    region.center,
                    region.radius() + self.config.padding,
                );
                let cleaned = inpainter.inpaint(image, &mask)?;
                ensure_same_size(inpainter.name(), image, &cleaned)?;
                Ok(outcome(cleaned, method, region, detected))
            }
            RemovalMethod::ClassicalInpaint => {
                let inpainter =
                    self.capabilities
                        .classical_inpainter
                        .as_ref()
                        .ok_or_else(|| Error::External {
                            service: "classical inpainter",
                            message: "not available".to_string(),
                        })?;
                let mask = methods::triangle_mask(frame, width, height, size);
                let cleaned = inpainter.inpaint(image, &mask, self.config.inpaint_radius)?;
                ensure_same_size(inpainter.name(), image, &cleaned)?;
                Ok(outcome(cleaned, method, nominal, false))
            }
            RemovalMethod::Clone => {
                let cloned = methods::clone_patch(
                    image,
                    frame,
                    size,
                    self.config.clone_source,
                    self.config.clone_offset,
                    self.config.clone_blend,
                );
                if let Some((cleaned, used)) = cloned {
                    tracing::debug!(source = ?used, "cloned corner patch");
                    Ok(outcome(cleaned, method, nominal, false))
                } else {
                    tracing::warn!(width, height, "image too small to clone from, using radial fill");
                    let cleaned = self.radial_fill(image, frame, size);
                    Ok(outcome(cleaned, RemovalMethod::RadialFill, nominal, false))
                }
            }
            RemovalMethod::RadialFill => {
                let cleaned = self.radial_fill(image, frame, size);
                Ok(outcome(cleaned, method, nominal, false))
            }
            RemovalMethod::CropRescale => {
                let cleaned = methods::crop_rescale(image, frame, size);
                Ok(outcome(cleaned, method, nominal, false))
            }
        }
    }

    fn radial_fill(&self, image: &RgbaImage, frame: CornerFrame, size: u32) -> RgbaImage {
        methods::radial_fill(
            image,
            frame,
            size,
            self.config.fill_sample,
            self.config.fill_falloff,
        )
    }
}

/// Remove a corner watermark of `nominal_size` with default settings.
///
/// # Errors
///
/// See [`WatermarkRemover::remove`].
pub fn remove_watermark(
    image: &RgbaImage,
    nominal_size: u32,
    capabilities: &Capabilities,
) -> Result<RgbaImage> {
    let config = WatermarkConfig {
        size: nominal_size,
        ..WatermarkConfig::default()
    };
    WatermarkRemover::new(config, capabilities.clone())
        .remove(image)
        .map(|o| o.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{ClassicalInpainter, MaskInpainter};
    use image::{GrayImage, Rgba};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingInpainter {
        mask: Mutex<Option<GrayImage>>,
    }

    impl MaskInpainter for RecordingInpainter {
        fn inpaint(&self, image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage> {
            *self.mask.lock().unwrap() = Some(mask.clone());
            let mut out = image.clone();
            for (px, m) in out.pixels_mut().zip(mask.pixels()) {
                if m[0] != 0 {
                    *px = Rgba([1, 2, 3, px[3]]);
                }
            }
            Ok(out)
        }
    }

    struct FailingInpainter;

    impl MaskInpainter for FailingInpainter {
        fn inpaint(&self, _image: &RgbaImage, _mask: &GrayImage) -> Result<RgbaImage> {
            Err(Error::External {
                service: "mask inpainter",
                message: "model crashed".to_string(),
            })
        }
    }

    struct ShrinkingInpainter;

    impl ClassicalInpainter for ShrinkingInpainter {
        fn inpaint(&self, _image: &RgbaImage, _mask: &GrayImage, _radius: u32) -> Result<RgbaImage> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn flat(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([90, 100, 110, 255]))
    }

    #[test]
    fn selection_follows_rank_and_availability() {
        let none = Capabilities::none();
        assert_eq!(select_method(&none, None), RemovalMethod::Clone);

        let model = Capabilities::none().with_mask_inpainter(Arc::new(RecordingInpainter::default()));
        assert_eq!(select_method(&model, None), RemovalMethod::ModelInpaint);
        assert_eq!(
            select_method(&model, Some(RemovalMethod::ClassicalInpaint)),
            RemovalMethod::Clone
        );
        assert_eq!(
            select_method(&model, Some(RemovalMethod::CropRescale)),
            RemovalMethod::CropRescale
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let caps = Capabilities::none();
        let first = select_method(&caps, Some(RemovalMethod::ModelInpaint));
        for _ in 0..50 {
            assert_eq!(select_method(&caps, Some(RemovalMethod::ModelInpaint)), first);
        }
    }

    #[test]
    fn method_names_round_trip_through_from_str() {
        for m in RemovalMethod::CHAIN {
            assert_eq!(m.name().parse::<RemovalMethod>().unwrap(), m);
            assert_eq!(m.to_string(), m.name());
        }
        assert_eq!("fill".parse::<RemovalMethod>().unwrap(), RemovalMethod::RadialFill);
        assert_eq!("crop".parse::<RemovalMethod>().unwrap(), RemovalMethod::CropRescale);
        assert!("magic".parse::<RemovalMethod>().is_err());
    }

    #[test]
    fn ranks_are_strictly_increasing() {
        let ranks: Vec<u8> = RemovalMethod::CHAIN.iter().map(|m| m.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn detection_miss_falls_back_to_nominal_region() {
        let recorder = Arc::new(RecordingInpainter::default());
        let caps = Capabilities::none().with_mask_inpainter(recorder.clone());
        let remover = WatermarkRemover::new(WatermarkConfig::default(), caps);
        let img = flat(200, 150);

        let out = remover.remove(&img).unwrap();
        assert_eq!(out.method, RemovalMethod::ModelInpaint);
        assert!(!out.detected);
        assert_eq!(out.region, remover.nominal_region(200, 150));
        assert_eq!(out.region.center, (169, 119));

        let mask = recorder.mask.lock().unwrap().clone().unwrap();
        assert_eq!(mask.get_pixel(169, 119)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
        assert_eq!(out.image.get_pixel(169, 119).0, [1, 2, 3, 255]);
    }

    #[test]
    fn external_failure_is_propagated() {
        let caps = Capabilities::none().with_mask_inpainter(Arc::new(FailingInpainter));
        let remover = WatermarkRemover::new(WatermarkConfig::default(), caps);
        let err = remover.remove(&flat(120, 120)).unwrap_err();
        assert!(err.to_string().contains("model crashed"));
    }

    #[test]
    fn resized_inpaint_output_is_rejected() {
        let caps = Capabilities::none().with_classical_inpainter(Arc::new(ShrinkingInpainter));
        let remover = WatermarkRemover::new(WatermarkConfig::default(), caps);
        assert!(matches!(
            remover.remove(&flat(120, 120)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn pure_pixel_methods_preserve_dimensions() {
        let img = flat(300, 260);
        for method in [
            RemovalMethod::Clone,
            RemovalMethod::RadialFill,
            RemovalMethod::CropRescale,
        ] {
            let config = WatermarkConfig {
                method: Some(method),
                ..WatermarkConfig::default()
            };
            let out = WatermarkRemover::new(config, Capabilities::none())
                .remove(&img)
                .unwrap();
            assert_eq!(out.method, method);
            assert_eq!(out.image.dimensions(), (300, 260));
        }
    }

    #[test]
    fn clone_degrades_to_fill_on_small_images() {
        let config = WatermarkConfig {
            size: 30,
            ..WatermarkConfig::default()
        };
        let out = WatermarkRemover::new(config, Capabilities::none())
            .remove(&flat(50, 50))
            .unwrap();
        assert_eq!(out.method, RemovalMethod::RadialFill);
    }

    #[cfg(feature = "classical-inpaint")]
    #[test]
    fn builtin_classical_inpaint_clears_corner_mark() {
        let mut img = flat(120, 120);
        for y in 110..120 {
            for x in 110..120 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let config = WatermarkConfig {
            size: 40,
            ..WatermarkConfig::default()
        };
        let out = WatermarkRemover::new(config, Capabilities::builtin())
            .remove(&img)
            .unwrap();
        assert_eq!(out.method, RemovalMethod::ClassicalInpaint);
        assert_eq!(out.image.dimensions(), (120, 120));
        assert_eq!(out.image.get_pixel(119, 119).0, [90, 100, 110, 255]);
        assert_eq!(out.image.get_pixel(0, 0), img.get_pixel(0, 0));
    }

    #[test]
    fn free_function_uses_nominal_size() {
        let img = flat(100, 100);
        let out = remove_watermark(&img, 20, &Capabilities::none()).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
    }

    #[test]
    fn empty_image_is_rejected() {
        let remover = WatermarkRemover::default();
        assert!(matches!(
            remover.remove(&RgbaImage::new(0, 0)),
            Err(Error::EmptyImage { .. })
        ));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: WatermarkConfig =
            serde_json::from_str(r#"{"corner":"top-left","method":"radial-fill"}"#).unwrap();
        assert_eq!(config.corner, Corner::TopLeft);
        assert_eq!(config.method, Some(RemovalMethod::RadialFill));
        assert_eq!(config.size, 60);
    }
}
