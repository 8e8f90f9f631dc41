//! Adapters that run external programs as capabilities.
//!
//! A command line such as `lama-inpaint {input} {mask} {output}` or
//! `rembg i {input} {output}` is run once per call, exchanging PNG files in a
//! private temporary directory. Placeholders missing from the command line
//! are filled in so the files keep that order. No timeout or retry is applied.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::{GrayImage, RgbaImage};

use crate::capabilities::{BackgroundRemover, MaskInpainter};
use crate::error::{Error, Result};

const INPUT: &str = "{input}";
const MASK: &str = "{mask}";
const OUTPUT: &str = "{output}";

/// An external program used as an inpainter or background remover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

/// Temporary working directory, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("sprite-prep-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self(dir))
    }

    fn file(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

impl ExternalCommand {
    /// Command from a program and its arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an empty command line.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::InvalidParameter("empty command line".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    /// Arguments with placeholders substituted.
    ///
    /// `files` lists placeholders in `{input} {mask} {output}` order. A missing
    /// placeholder is inserted before the first later one present, or appended.
    fn resolve_args(&self, files: &[(&str, &Path)]) -> Vec<String> {
        let mut args = self.args.clone();
        for (k, &(placeholder, _)) in files.iter().enumerate() {
            if args.iter().any(|a| a.contains(placeholder)) {
                continue;
            }
            let later = args
                .iter()
                .position(|a| files[k + 1..].iter().any(|&(p, _)| a.contains(p)));
            match later {
                Some(at) => args.insert(at, placeholder.to_string()),
                None => args.push(placeholder.to_string()),
            }
        }
        for &(placeholder, path) in files {
            let path = path.to_string_lossy();
            for arg in &mut args {
                *arg = arg.replace(placeholder, &path);
            }
        }
        args
    }

    fn run(&self, service: &'static str, files: &[(&str, &Path)]) -> Result<()> {
        let args = self.resolve_args(files);
        tracing::debug!(program = %self.program, ?args, "running external command");
        let output = Command::new(&self.program).args(&args).output()?;
        if !output.status.success() {
            return Err(Error::External {
                service,
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl MaskInpainter for ExternalCommand {
    fn name(&self) -> &'static str {
        "external inpainter"
    }

    fn inpaint(&self, image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage> {
        let scratch = Scratch::new()?;
        let (input, mask_path, output) = (
            scratch.file("input.png"),
            scratch.file("mask.png"),
            scratch.file("output.png"),
        );
        image.save(&input)?;
        mask.save(&mask_path)?;
        self.run(
            MaskInpainter::name(self),
            &[(INPUT, &input), (MASK, &mask_path), (OUTPUT, &output)],
        )?;
        Ok(image::open(&output)?.to_rgba8())
    }
}

impl BackgroundRemover for ExternalCommand {
    fn name(&self) -> &'static str {
        "external background remover"
    }

    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let scratch = Scratch::new()?;
        let (input, output) = (scratch.file("input.png"), scratch.file("output.png"));
        image.save(&input)?;
        self.run(
            BackgroundRemover::name(self),
            &[(INPUT, &input), (OUTPUT, &output)],
        )?;
        Ok(image::open(&output)?.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn parse_splits_program_and_args() {
        let cmd = ExternalCommand::parse("rembg i {input} {output}").unwrap();
        assert_eq!(cmd.program, "rembg");
        assert_eq!(cmd.args, vec!["i", "{input}", "{output}"]);
        assert!(ExternalCommand::parse("   ").is_err());
    }

    #[test]
    fn placeholders_are_substituted_or_appended() {
        let cmd = ExternalCommand::parse("tool --in={input}").unwrap();
        let args = cmd.resolve_args(&[
            (INPUT, Path::new("/tmp/a.png")),
            (OUTPUT, Path::new("/tmp/b.png")),
        ]);
        assert_eq!(args, vec!["--in=/tmp/a.png", "/tmp/b.png"]);
    }

    #[test]
    fn missing_mask_goes_between_input_and_output() {
        let cmd = ExternalCommand::parse("tool {input} {output}").unwrap();
        let args = cmd.resolve_args(&[
            (INPUT, Path::new("in.png")),
            (MASK, Path::new("mask.png")),
            (OUTPUT, Path::new("out.png")),
        ]);
        assert_eq!(args, vec!["in.png", "mask.png", "out.png"]);

        let cmd = ExternalCommand::parse("tool -o {output}").unwrap();
        let args = cmd.resolve_args(&[
            (INPUT, Path::new("in.png")),
            (MASK, Path::new("mask.png")),
            (OUTPUT, Path::new("out.png")),
        ]);
        assert_eq!(args, vec!["-o", "in.png", "mask.png", "out.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn copy_command_round_trips_image() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 128]));
        let cmd = ExternalCommand::parse("cp {input} {output}").unwrap();
        let out = BackgroundRemover::remove_background(&cmd, &img).unwrap();
        assert_eq!(out, img);

        let inpaint = ExternalCommand::new(
            "sh",
            ["-c", r#"test -f "$2" && cp "$1" "$3""#, "sh", "{input}", "{mask}", "{output}"]
                .map(String::from)
                .to_vec(),
        );
        let out = MaskInpainter::inpaint(&inpaint, &img, &GrayImage::new(4, 3)).unwrap();
        assert_eq!(out, img);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_external_error() {
        let img = RgbaImage::new(2, 2);
        let cmd = ExternalCommand::parse("false").unwrap();
        let err = BackgroundRemover::remove_background(&cmd, &img).unwrap_err();
        assert!(matches!(err, Error::External { .. }), "{err}");
    }
}
