//! Optional external capabilities.
//!
//! Heavy collaborators (a large-mask inpainting model, a classical
//! computer-vision inpainting routine, an AI background remover) are plugged
//! in through these traits. A [`Capabilities`] value is built once by the
//! caller and passed explicitly; an absent capability is never an error, it
//! only changes which fallback runs.

use std::fmt;
use std::sync::Arc;

use image::{GrayImage, RgbaImage};

use crate::error::Result;

/// Large-mask inpainting: fill every nonzero mask pixel from context.
pub trait MaskInpainter: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str {
        "mask inpainter"
    }

    /// Inpaint `image` where `mask` is nonzero. Must return an image of the
    /// same dimensions.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying model, propagated unchanged.
    fn inpaint(&self, image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage>;
}

/// Classical (diffusion / fast-marching style) inpainting with a radius.
pub trait ClassicalInpainter: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str {
        "classical inpainter"
    }

    /// Inpaint `image` where `mask` is nonzero, sampling within `radius`.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying routine, propagated unchanged.
    fn inpaint(&self, image: &RgbaImage, mask: &GrayImage, radius: u32) -> Result<RgbaImage>;
}

/// Segmentation-based background removal for arbitrary backdrops.
pub trait BackgroundRemover: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str {
        "background remover"
    }

    /// Return `image` with background pixels made transparent.
    ///
    /// # Errors
    ///
    /// Any failure of the underlying model, propagated unchanged.
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// The set of optional capabilities available to this process.
#[derive(Clone, Default)]
pub struct Capabilities {
    /// Rank-1 watermark removal backend.
    pub mask_inpainter: Option<Arc<dyn MaskInpainter>>,
    /// Rank-2 watermark removal backend.
    pub classical_inpainter: Option<Arc<dyn ClassicalInpainter>>,
    /// Backend for AI background removal.
    pub background_remover: Option<Arc<dyn BackgroundRemover>>,
}

impl Capabilities {
    /// No optional capability at all: only the pure-pixel methods remain.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Capabilities compiled into this crate.
    ///
    /// With the `classical-inpaint` feature this provides the built-in
    /// [`crate::DiffusionInpainter`].
    #[must_use]
    pub fn builtin() -> Self {
        #[cfg(feature = "classical-inpaint")]
        let classical_inpainter: Option<Arc<dyn ClassicalInpainter>> =
            Some(Arc::new(crate::watermark::DiffusionInpainter::default()));
        #[cfg(not(feature = "classical-inpaint"))]
        let classical_inpainter: Option<Arc<dyn ClassicalInpainter>> = None;

        Self {
            classical_inpainter,
            ..Self::default()
        }
    }

    /// Add a large-mask inpainting backend.
    #[must_use]
    pub fn with_mask_inpainter(mut self, inpainter: Arc<dyn MaskInpainter>) -> Self {
        self.mask_inpainter = Some(inpainter);
        self
    }

    /// Add a classical inpainting backend.
    #[must_use]
    pub fn with_classical_inpainter(mut self, inpainter: Arc<dyn ClassicalInpainter>) -> Self {
        self.classical_inpainter = Some(inpainter);
        self
    }

    /// Add a background removal backend.
    #[must_use]
    pub fn with_background_remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.background_remover = Some(remover);
        self
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("mask_inpainter", &self.mask_inpainter.as_ref().map(|c| c.name()))
            .field(
                "classical_inpainter",
                &self.classical_inpainter.as_ref().map(|c| c.name()),
            )
            .field(
                "background_remover",
                &self.background_remover.as_ref().map(|c| c.name()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl MaskInpainter for Passthrough {
        fn inpaint(&self, image: &RgbaImage, _mask: &GrayImage) -> Result<RgbaImage> {
            Ok(image.clone())
        }
    }

    #[test]
    fn none_has_nothing() {
        let caps = Capabilities::none();
        assert!(caps.mask_inpainter.is_none());
        assert!(caps.classical_inpainter.is_none());
        assert!(caps.background_remover.is_none());
    }

    #[cfg(feature = "classical-inpaint")]
    #[test]
    fn builtin_provides_classical_inpainting() {
        assert!(Capabilities::builtin().classical_inpainter.is_some());
    }

    #[test]
    fn debug_lists_backend_names() {
        let caps = Capabilities::none().with_mask_inpainter(Arc::new(Passthrough));
        let text = format!("{caps:?}");
        assert!(text.contains("mask inpainter"));
        assert!(text.contains("classical_inpainter: None"));
    }
}
