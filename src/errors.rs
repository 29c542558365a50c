use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for RimPreview
#[derive(Error, Debug)]
pub enum RimPreviewError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid threshold {0}: must be between 0 and 255")]
    InvalidThreshold(i32),

    #[error("Invalid intensity {0}: must be between 0 and 100")]
    InvalidIntensity(i32),

    #[error("Dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Invalid color format '{0}': use hex (#RRGGBB) or RGB (r,g,b) format")]
    InvalidColorFormat(String),

    #[error("Image dimensions too large: {width}x{height} (maximum allowed: {max}x{max})")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, RimPreviewError>;
