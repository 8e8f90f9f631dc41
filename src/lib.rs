//! Clean up AI-generated sprite art for use in a game.
//!
//! Three independent operations work on RGBA images:
//!
//! - **Matting** turns a solid chroma backdrop into transparency with soft,
//!   spill-free edges ([`matte`], [`alpha_mask`]).
//! - **Watermark removal** clears a corner logo using the best method the
//!   available capabilities allow, falling back through model inpainting,
//!   classical inpainting, patch cloning, radial fill and crop-rescale
//!   ([`WatermarkRemover`], [`remove_watermark`]).
//! - **Recolor** re-tints the neutral region of a sprite while keeping its
//!   shading, outlines and accent colours ([`recolor`]).
//!
//! External services (an inpainting model, a background remover) are
//! passed in explicitly through [`Capabilities`]; nothing is discovered from
//! global state.
//!
//! # Quick Start
//!
//! ```no_run
//! use sprite_prep::{matte, recolor, BackdropModel, Capabilities, RecolorParams, WatermarkRemover};
//!
//! let img = image::open("cat.png").unwrap().to_rgba8();
//!
//! let remover = WatermarkRemover::new(Default::default(), Capabilities::builtin());
//! let outcome = remover.remove(&img).expect("watermark removal failed");
//! println!("removed with {}", outcome.method);
//!
//! let keyed = matte(&outcome.image, &BackdropModel::default()).unwrap();
//! let pink = recolor(&keyed, image::Rgb([255, 182, 193]), &RecolorParams::default()).unwrap();
//! pink.save("cat_pink.png").unwrap();
//! ```
//!
//! # Batch processing
//!
//! [`AssetPipeline`] runs the stages over files or whole directories and
//! produces [`ManifestRecord`]s describing what was done.
//!
//! ```no_run
//! use std::path::Path;
//! use sprite_prep::{AssetPipeline, Capabilities, PipelineParams, ProcessOptions};
//!
//! let pipeline = AssetPipeline::new(&PipelineParams::default(), Capabilities::builtin());
//! let results = pipeline.process_directory(Path::new("raw"), Path::new("clean"), &ProcessOptions::default());
//! println!("{} processed", results.iter().filter(|r| r.success).count());
//! ```

#![deny(missing_docs)]

pub mod background;
pub mod blending;
pub mod capabilities;
mod engine;
pub mod error;
pub mod external;
pub mod manifest;
pub mod matting;
pub mod recolor;
pub mod watermark;

pub use background::{remove_background, BackgroundMode, BackgroundOutcome};
pub use capabilities::{BackgroundRemover, Capabilities, ClassicalInpainter, MaskInpainter};
pub use engine::{
    default_output_path, is_supported_image, save_image, AssetPipeline, PipelineParams,
    ProcessOptions, ProcessResult, ProcessedImage,
};
pub use error::{rgba_from_raw, Error, Result};
pub use external::ExternalCommand;
pub use manifest::{Manifest, ManifestRecord};
pub use matting::{
    alpha_mask, matte, sample_backdrop, AlphaMask, BackdropModel, GreenKeyParams,
    SampledKeyParams,
};
pub use recolor::{parse_rgb, recolor, recolor_mask, recolor_variants, RecolorParams};
#[cfg(feature = "classical-inpaint")]
pub use watermark::DiffusionInpainter;
pub use watermark::{
    detect_watermark, remove_watermark, select_method, CloneBlend, CloneSource, Corner,
    Detection, DetectionParams, RemovalMethod, RemovalOutcome, WatermarkConfig, WatermarkRegion,
    WatermarkRemover,
};
