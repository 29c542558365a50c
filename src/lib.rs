// src/lib.rs - Library interface for RimPreview

pub mod colorize;
pub mod config;
pub mod errors;
pub mod image_io;
pub mod image_utils;
pub mod labeling;
pub mod output;
pub mod pipeline;
pub mod rasterize;
pub mod regions;

// Re-export commonly used types and functions
pub use errors::{RimPreviewError, Result};
pub use config::Config;
pub use pipeline::{build_preview, process_image, process_threshold, sweep_thresholds, PreviewOutput, ThresholdResult};
pub use image_io::{InputImage, load_image, load_mask, save_image, save_mask};

// Re-export the pixel-processing stages
pub use rasterize::{rasterize, count_above, BinaryMask};
pub use labeling::{label, LabelMap, Region};
pub use regions::{
    coverage,
    kept_pixel_count,
    kept_regions,
    rank_regions,
    select_top_regions,
    DEFAULT_KEEP_REGIONS,
};
pub use colorize::{
    colorize,
    composite_over,
    Color,
    Intensity,
    RgbColor,
};
