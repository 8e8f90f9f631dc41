//! Background removal stage: chroma keying or an AI remover.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::error::{ensure_not_empty, ensure_same_size, Result};
use crate::matting::{matte, BackdropModel, GreenKeyParams, SampledKeyParams};

/// Which background removal to run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Green-dominant chroma key with soft edges.
    Green(GreenKeyParams),
    /// Chroma key against a colour sampled from the image.
    Sampled(SampledKeyParams),
    /// The external AI background remover, when available.
    Ai,
}

impl BackgroundMode {
    /// Label recorded in the manifest's `backgroundRemoved` field.
    #[must_use]
    pub fn manifest_label(&self) -> &'static str {
        match self {
            Self::Green(_) | Self::Sampled(_) => "green",
            Self::Ai => "ai",
        }
    }
}

/// Result of the background stage.
#[derive(Debug, Clone)]
pub struct BackgroundOutcome {
    /// Output image; the input unchanged when nothing ran.
    pub image: RgbaImage,
    /// Whether background removal actually ran.
    pub removed: bool,
}

/// Run the background stage.
///
/// AI removal without a [`crate::BackgroundRemover`] logs a warning and passes
/// the image through with `removed == false`.
///
/// # Errors
///
/// Returns [`crate::Error::EmptyImage`] for a zero-area image and propagates
/// failures of the AI remover.
pub fn remove_background(
    image: &RgbaImage,
    mode: &BackgroundMode,
    capabilities: &Capabilities,
) -> Result<BackgroundOutcome> {
    ensure_not_empty(image)?;
    let image = match mode {
        BackgroundMode::Green(params) => matte(image, &BackdropModel::GreenDominant(*params))?,
        BackgroundMode::Sampled(params) => matte(image, &BackdropModel::Sampled(*params))?,
        BackgroundMode::Ai => {
            let Some(remover) = &capabilities.background_remover else {
                tracing::warn!("AI background removal unavailable, image passed through");
                return Ok(BackgroundOutcome {
                    image: image.clone(),
                    removed: false,
                });
            };
            let out = remover.remove_background(image)?;
            ensure_same_size(remover.name(), image, &out)?;
            out
        }
    };
    Ok(BackgroundOutcome {
        image,
        removed: true,
    })
}
