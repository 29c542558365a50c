use std::path::PathBuf;
use std::time::Instant;
use std::fs;
use anyhow::{bail, Context};
use clap::Parser;
use rayon::prelude::*;

use rim_preview_lib::config::Config;
use rim_preview_lib::image_io::{get_photo_files_in_dir, load_image};
use rim_preview_lib::pipeline::process_image;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "RimPreview - Painted Rim Preview")]
struct Args {
    /// Path to input photo or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Rim color as #RRGGBB, r,g,b or "transparent" (overwrites config)
    #[clap(long)]
    color: Option<String>,

    /// Color intensity 0-100 (overwrites config)
    #[clap(long)]
    intensity: Option<i32>,

    /// Brightness threshold used for the preview (overwrites config)
    #[clap(short, long)]
    threshold: Option<i32>,

    /// Use the car mask to drop the photo background
    #[clap(long)]
    remove_background: bool,

    /// Enable debug mode (save intermediate images and print more info)
    #[clap(short, long)]
    debug: bool,
}

/// Main function
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = Config::from_file_or_default(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }

    if let Some(color) = args.color.clone() {
        config.color = color;
    }

    if let Some(intensity) = args.intensity {
        config.intensity = intensity;
    }

    if let Some(threshold) = args.threshold {
        config.default_threshold = threshold;
    }

    if args.remove_background {
        config.remove_background = true;
    }

    config.validate().context("invalid configuration")?;

    let start_time = Instant::now();

    if args.debug {
        fs::create_dir_all(PathBuf::from(&config.output_base_dir).join("debug"))?;
    }

    let input_path = PathBuf::from(&config.input_path);

    if input_path.is_file() {
        log::info!("Processing single file: {}", input_path.display());
        let input_image = load_image(&input_path)?;
        process_image(input_image, &config, args.debug)
            .with_context(|| format!("processing {}", input_path.display()))?;
    } else if input_path.is_dir() {
        log::info!("Processing directory: {}", input_path.display());
        let photos = get_photo_files_in_dir(
            &input_path,
            &config.wheel_mask_suffix,
            &config.car_mask_suffix,
        )?;

        log::info!("Found {} photos with wheel masks", photos.len());

        let process = |path: &PathBuf| {
            log::info!("Processing: {}", path.display());
            let result = load_image(path).and_then(|img| process_image(img, &config, args.debug));
            if let Err(e) = &result {
                log::error!("Error processing {}: {}", path.display(), e);
            }
            result
        };

        let failures = if config.use_parallel {
            photos.par_iter().map(process).filter(|r| r.is_err()).count()
        } else {
            photos.iter().map(process).filter(|r| r.is_err()).count()
        };

        if failures > 0 {
            bail!("{} of {} photos failed", failures, photos.len());
        }
    } else {
        bail!("input path {} does not exist", input_path.display());
    }

    log::info!("Processing completed in {:.2} seconds", start_time.elapsed().as_secs_f64());

    Ok(())
}
