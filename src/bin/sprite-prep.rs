use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::Level;

use sprite_prep::{
    default_output_path, parse_rgb, recolor_variants, AssetPipeline, BackgroundMode, Capabilities,
    Corner, ExternalCommand, Manifest, PipelineParams, ProcessOptions, ProcessResult,
    RemovalMethod,
};

#[derive(Parser)]
#[command(
    name = "sprite-prep",
    about = "Clean up generated sprite art: chroma-key matting, corner watermark removal, recolor",
    version,
    after_help = "Watermark methods, best first: model-inpaint, classical-inpaint, clone, \
                  radial-fill, crop-rescale.\n\
                  Unavailable methods fall through to the next one."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file overriding default parameters
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// External inpainting command, e.g. "lama {input} {mask} {output}"
    #[arg(long, global = true)]
    inpaint_command: Option<String>,

    /// External background removal command, e.g. "rembg i {input} {output}"
    #[arg(long, global = true)]
    bg_command: Option<String>,

    /// Disable the built-in classical inpainter
    #[arg(long, global = true)]
    no_classical: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Key out a solid backdrop into transparency
    Matte {
        #[command(flatten)]
        io: Io,
        /// Key against the colour sampled near the top-left instead of green
        #[arg(long)]
        sampled: bool,
    },
    /// Remove a corner watermark
    Dewatermark {
        #[command(flatten)]
        io: Io,
        #[command(flatten)]
        mark: Mark,
    },
    /// Re-tint the neutral region, keeping shading
    Recolor {
        #[command(flatten)]
        io: Io,
        /// Target colour (#RRGGBB or r,g,b); repeat as name=colour for variants
        #[arg(short, long = "color", required = true)]
        colors: Vec<String>,
    },
    /// Run the full cleanup pipeline and record results in a manifest
    Process {
        #[command(flatten)]
        io: Io,
        #[command(flatten)]
        mark: Mark,
        /// Background removal to run
        #[arg(short, long, value_enum)]
        background: Option<Background>,
        /// Leave watermarks alone
        #[arg(long)]
        skip_watermark: bool,
        /// Re-tint the neutral region with this colour
        #[arg(long)]
        recolor: Option<String>,
        /// Generation prompt recorded in the manifest
        #[arg(long)]
        prompt: Option<String>,
        /// Notes recorded in the manifest
        #[arg(long)]
        notes: Option<String>,
        /// Manifest file (default: manifest.json in the output directory)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Io {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: {name}_clean.png)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct Mark {
    /// Nominal watermark size in pixels
    #[arg(short, long)]
    size: Option<u32>,

    /// Corner holding the watermark (top-left, top-right, bottom-left, bottom-right)
    #[arg(long)]
    corner: Option<Corner>,

    /// Best removal method to try
    #[arg(short, long)]
    method: Option<RemovalMethod>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Background {
    Green,
    Sampled,
    Ai,
}

fn fail<T>(message: impl std::fmt::Display) -> T {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut params = match &cli.params {
        Some(path) => PipelineParams::load(path)
            .unwrap_or_else(|e| fail(format!("cannot read {}: {e}", path.display()))),
        None => PipelineParams::default(),
    };
    let capabilities = build_capabilities(&cli).unwrap_or_else(fail);

    let (io, opts, manifest) = match &cli.command {
        Command::Matte { io, sampled } => {
            let mode = if *sampled {
                BackgroundMode::Sampled(params.sampled)
            } else {
                BackgroundMode::Green(params.green)
            };
            let opts = ProcessOptions {
                skip_watermark: true,
                background: Some(mode),
                ..ProcessOptions::default()
            };
            (io, opts, None)
        }
        Command::Dewatermark { io, mark } => {
            apply_mark(&mut params, mark);
            (io, ProcessOptions::default(), None)
        }
        Command::Recolor { io, colors } => {
            if colors.len() > 1 || colors.iter().any(|c| c.contains('=')) {
                run_variants(io, colors, &params, cli.quiet);
                return;
            }
            let target = parse_rgb(&colors[0]).unwrap_or_else(fail);
            let opts = ProcessOptions {
                skip_watermark: true,
                recolor: Some(target),
                ..ProcessOptions::default()
            };
            (io, opts, None)
        }
        Command::Process {
            io,
            mark,
            background,
            skip_watermark,
            recolor,
            prompt,
            notes,
            manifest,
        } => {
            apply_mark(&mut params, mark);
            let opts = ProcessOptions {
                skip_watermark: *skip_watermark,
                background: background.map(|b| match b {
                    Background::Green => BackgroundMode::Green(params.green),
                    Background::Sampled => BackgroundMode::Sampled(params.sampled),
                    Background::Ai => BackgroundMode::Ai,
                }),
                recolor: recolor
                    .as_deref()
                    .map(|c| parse_rgb(c).unwrap_or_else(fail)),
                prompt: prompt.clone(),
                notes: notes.clone(),
            };
            let manifest = manifest.clone().unwrap_or_else(|| {
                let dir = match (&io.output, io.input.is_dir()) {
                    (Some(out), true) => out.clone(),
                    (Some(out), false) => out.parent().map(Path::to_path_buf).unwrap_or_default(),
                    (None, _) => io.input.parent().map(Path::to_path_buf).unwrap_or_default(),
                };
                dir.join("manifest.json")
            });
            (io, opts, Some(manifest))
        }
    };

    if !io.input.exists() {
        fail(format!("Input path does not exist: {}", io.input.display()))
    }

    let pipeline = AssetPipeline::new(&params, capabilities);
    if let Some(banner) = method_banner(&pipeline, &opts).filter(|_| !cli.quiet) {
        eprintln!("{banner}");
        eprintln!();
    }

    let results = if io.input.is_dir() {
        let Some(output_dir) = &io.output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: sprite-prep <command> <input_dir> -o <output_dir>");
            process::exit(1);
        };
        pipeline.process_directory(&io.input, output_dir, &opts)
    } else {
        let output = io
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&io.input));
        vec![pipeline.process_file(&io.input, &output, &opts)]
    };

    if let Some(path) = manifest {
        update_manifest(&path, &results);
    }

    report(&results, cli.verbose, cli.quiet);
}

fn build_capabilities(cli: &Cli) -> sprite_prep::Result<Capabilities> {
    let mut caps = if cli.no_classical {
        Capabilities::none()
    } else {
        Capabilities::builtin()
    };
    if let Some(cmd) = &cli.inpaint_command {
        caps = caps.with_mask_inpainter(Arc::new(ExternalCommand::parse(cmd)?));
    }
    if let Some(cmd) = &cli.bg_command {
        caps = caps.with_background_remover(Arc::new(ExternalCommand::parse(cmd)?));
    }
    Ok(caps)
}

fn apply_mark(params: &mut PipelineParams, mark: &Mark) {
    let wm = &mut params.watermark;
    if let Some(size) = mark.size {
        wm.size = size;
    }
    if let Some(corner) = mark.corner {
        wm.corner = corner;
    }
    if mark.method.is_some() {
        wm.method = mark.method;
    }
}

fn update_manifest(path: &Path, results: &[ProcessResult]) {
    let mut manifest = Manifest::load(path)
        .unwrap_or_else(|e| fail(format!("cannot read manifest {}: {e}", path.display())));
    for r in results {
        if let Some(record) = &r.record {
            manifest.insert(r.asset_name(), record.clone());
        }
    }
    if let Err(e) = manifest.save(path) {
        fail(format!("cannot write manifest {}: {e}", path.display()))
    }
}

fn run_variants(io: &Io, colors: &[String], params: &PipelineParams, quiet: bool) {
    let named: Vec<(String, image::Rgb<u8>)> = colors
        .iter()
        .map(|spec| {
            let (name, colour) = spec.split_once('=').unwrap_or((spec.as_str(), spec.as_str()));
            let name = name.trim_start_matches('#').replace(',', "-");
            (name, parse_rgb(colour).unwrap_or_else(fail))
        })
        .collect();
    let variants: Vec<(&str, image::Rgb<u8>)> =
        named.iter().map(|(n, c)| (n.as_str(), *c)).collect();

    let img = image::open(&io.input)
        .unwrap_or_else(|e| fail(format!("Failed to load: {e}")))
        .to_rgba8();
    let out_dir = io
        .output
        .clone()
        .or_else(|| io.input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stem = io.input.file_stem().unwrap_or_default().to_string_lossy();

    let outputs = recolor_variants(&img, &variants, &params.recolor).unwrap_or_else(fail);
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        fail(format!("Failed to create output directory: {e}"))
    }
    for (name, variant) in outputs {
        let path = out_dir.join(format!("{stem}_{name}.png"));
        match variant.save(&path) {
            Ok(()) if !quiet => eprintln!("[OK] {}", path.display()),
            Ok(()) => {}
            Err(e) => fail(format!("Failed to save {}: {e}", path.display())),
        }
    }
}

fn report(results: &[ProcessResult], verbose: bool, quiet: bool) {
    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in results {
        print_result(r, verbose, quiet);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn method_banner(pipeline: &AssetPipeline, opts: &ProcessOptions) -> Option<String> {
    (!opts.skip_watermark)
        .then(|| format!("Watermark method: {}", pipeline.remover().selected_method()))
}

fn print_result(result: &ProcessResult, verbose: bool, quiet: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        eprintln!("[SKIP] {filename}: {}", result.message);
    } else if result.success {
        eprintln!("[OK] {filename} ({})", result.message);
        if verbose {
            eprintln!("  -> {}", result.output.display());
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}
