//! Clean a single green-screen sprite: remove the corner watermark, key out
//! the backdrop and write one recolored variant.
//!
//! Usage:
//! ```sh
//! cargo run --example clean_sprite -- input.png output.png [#RRGGBB]
//! ```

use std::env;
use std::process;

use sprite_prep::{
    parse_rgb, AssetPipeline, BackgroundMode, Capabilities, GreenKeyParams, PipelineParams,
    ProcessOptions,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [colour]", args[0]);
        process::exit(1);
    }

    let recolor = match args.get(3).map(|c| parse_rgb(c)) {
        Some(Ok(colour)) => Some(colour),
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
        None => None,
    };

    let pipeline = AssetPipeline::new(&PipelineParams::default(), Capabilities::builtin());
    let opts = ProcessOptions {
        background: Some(BackgroundMode::Green(GreenKeyParams::default())),
        recolor,
        ..ProcessOptions::default()
    };
    let result = pipeline.process_file(args[1].as_ref(), args[2].as_ref(), &opts);

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
