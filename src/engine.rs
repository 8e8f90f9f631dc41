//! Asset pipeline: watermark removal, background removal and recolor over
//! files and directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::background::{remove_background, BackgroundMode};
use crate::capabilities::Capabilities;
use crate::error::{Error, Result};
use crate::manifest::{format_dimensions, timestamp, Dimensions, ManifestRecord};
use crate::matting::{GreenKeyParams, SampledKeyParams};
use crate::recolor::{recolor, RecolorParams};
use crate::watermark::{RemovalMethod, WatermarkConfig, WatermarkRemover};

/// Tunables for every stage, loadable from a JSON file.
///
/// Missing keys keep their defaults, so a file may override a single value:
///
/// ```json
/// { "watermark": { "size": 80, "corner": "bottom-left" } }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Watermark removal and detection.
    pub watermark: WatermarkConfig,
    /// Green-dominant keying.
    pub green: GreenKeyParams,
    /// Sampled-colour keying.
    pub sampled: SampledKeyParams,
    /// Recolor eligibility.
    pub recolor: RecolorParams,
}

impl PipelineParams {
    /// Read parameters from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and a JSON error if it
    /// does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Which stages to run on each image.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Leave watermarks alone.
    pub skip_watermark: bool,
    /// Background removal to run, if any.
    pub background: Option<BackgroundMode>,
    /// Re-tint the neutral region with this colour.
    pub recolor: Option<Rgb<u8>>,
    /// Generation prompt recorded in the manifest.
    pub prompt: Option<String>,
    /// Notes recorded in the manifest.
    pub notes: Option<String>,
}

impl ProcessOptions {
    fn has_work(&self) -> bool {
        !self.skip_watermark || self.background.is_some() || self.recolor.is_some()
    }
}

/// An image after the in-memory stages.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// The resulting pixels.
    pub image: RgbaImage,
    /// Watermark method that ran, if any.
    pub method: Option<RemovalMethod>,
    /// Manifest label of the background removal that ran, if any.
    pub background: Option<&'static str>,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Path the output was written to.
    pub output: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped because no stage was requested.
    pub skipped: bool,
    /// Watermark method that ran, if any.
    pub method: Option<RemovalMethod>,
    /// Provenance record for the manifest, on success.
    pub record: Option<ManifestRecord>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path, output: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            output: output.to_path_buf(),
            success: false,
            skipped: false,
            method: None,
            record: None,
            message: String::new(),
        }
    }

    /// Manifest key for this asset: the input file stem.
    #[must_use]
    pub fn asset_name(&self) -> String {
        self.path
            .file_stem()
            .map_or_else(|| self.path.display().to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// Runs the cleanup stages with one set of parameters and capabilities.
///
/// Build once and reuse for many images; it is `Sync`, so directories are
/// processed in parallel when the `cli` feature is enabled.
#[derive(Debug, Clone)]
pub struct AssetPipeline {
    remover: WatermarkRemover,
    recolor: RecolorParams,
    capabilities: Capabilities,
}

impl AssetPipeline {
    /// Pipeline using `params` and the given external capabilities.
    #[must_use]
    pub fn new(params: &PipelineParams, capabilities: Capabilities) -> Self {
        Self {
            remover: WatermarkRemover::new(params.watermark.clone(), capabilities.clone()),
            recolor: params.recolor,
            capabilities,
        }
    }

    /// The watermark remover used by this pipeline.
    #[must_use]
    pub fn remover(&self) -> &WatermarkRemover {
        &self.remover
    }

    /// Run the requested stages in order: watermark, background, recolor.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure.
    pub fn process_image(&self, image: &RgbaImage, opts: &ProcessOptions) -> Result<ProcessedImage> {
        let mut current = image.clone();
        let mut method = None;
        let mut background = None;

        if !opts.skip_watermark {
            let outcome = self.remover.remove(&current)?;
            method = Some(outcome.method);
            current = outcome.image;
        }

        if let Some(mode) = &opts.background {
            let outcome = remove_background(&current, mode, &self.capabilities)?;
            if outcome.removed {
                background = Some(mode.manifest_label());
            }
            current = outcome.image;
        }

        if let Some(target) = opts.recolor {
            current = recolor(&current, target, &self.recolor)?;
        }

        Ok(ProcessedImage {
            image: current,
            method,
            background,
        })
    }

    /// Process a single image file: load, clean, save, and build its record.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        let mut result = ProcessResult::new(input, output);

        if !opts.has_work() {
            result.skipped = true;
            result.success = true;
            result.message = "No stages requested".to_string();
            return result;
        }

        let source = match image::open(input) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let processed = match self.process_image(&source, opts) {
            Ok(p) => p,
            Err(e) => {
                result.message = format!("Failed to process: {e}");
                return result;
            }
        };
        result.method = processed.method;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                result.message = format!("Failed to create output directory: {e}");
                return result;
            }
        }

        if let Err(e) = save_image(&processed.image, output) {
            result.message = format!("Failed to save: {e}");
            return result;
        }

        let output_name = output.display().to_string();
        result.record = Some(ManifestRecord {
            original: input.display().to_string(),
            processed: output_name.clone(),
            final_path: output_name,
            dimensions: Dimensions {
                original: format_dimensions(source.width(), source.height()),
                final_size: format_dimensions(processed.image.width(), processed.image.height()),
            },
            generated: timestamp(),
            watermark_removed: processed.method.is_some(),
            background_removed: processed.background.map(str::to_string),
            prompt: opts.prompt.clone(),
            notes: opts.notes.clone(),
        });
        result.success = true;
        result.message = describe(&processed);
        tracing::info!(file = %input.display(), message = %result.message, "processed");
        result
    }

    /// Process all supported images in a directory, in path order.
    ///
    /// Outputs are named like [`default_output_path`] inside `output_dir`.
    /// Inputs whose output names collide (`hero.png` and `hero.jpg`) are all
    /// reported as failures and nothing is written for them.
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let mut inputs: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                let mut failed = ProcessResult::new(input_dir, output_dir);
                failed.message = format!("Failed to read directory: {e}");
                return vec![failed];
            }
        };
        inputs.sort();

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            let mut failed = ProcessResult::new(input_dir, output_dir);
            failed.message = format!("Failed to create output directory: {e}");
            return vec![failed];
        }

        let mut claims: BTreeMap<String, usize> = BTreeMap::new();
        for input in &inputs {
            *claims.entry(clean_file_name(input)).or_default() += 1;
        }

        let run = |input: &PathBuf| {
            let name = clean_file_name(input);
            let output = output_dir.join(&name);
            if claims.get(&name).is_some_and(|&n| n > 1) {
                tracing::warn!(file = %input.display(), output = %name, "output name collision");
                let mut failed = ProcessResult::new(input, &output);
                failed.message = format!("Output {name} is shared with another input");
                return failed;
            }
            self.process_file(input, &output, opts)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            inputs.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            inputs.iter().map(run).collect()
        }
    }
}

fn describe(processed: &ProcessedImage) -> String {
    let mut parts = Vec::new();
    if let Some(method) = processed.method {
        parts.push(format!("watermark: {method}"));
    }
    if let Some(label) = processed.background {
        parts.push(format!("background: {label}"));
    }
    if parts.is_empty() {
        "Saved".to_string()
    } else {
        parts.join(", ")
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp"),
        None => false,
    }
}

/// Save an RGBA image with format-specific settings.
///
/// JPEG has no alpha channel, so it is dropped and the image is written at
/// quality 95.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = DynamicImage::ImageRgba8(img.clone());

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 95);
            encoder.encode_image(&DynamicImage::ImageRgb8(dyn_img.to_rgb8()))?;
        }
        ImageFormat::Png | ImageFormat::WebP => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

fn clean_file_name(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    format!("{stem}_clean.png")
}

/// Generate a default output path from an input path.
///
/// Example: `"cat.jpg"` becomes `"cat_clean.png"`. Output is always PNG so
/// transparency survives.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(clean_file_name(input))
}
