use std::fs;
use std::path::Path;
use csv::Writer;
use serde::Serialize;

use crate::errors::Result;
use crate::pipeline::{PreviewOutput, ThresholdResult};

/// Per-threshold line of the JSON summary
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdSummary {
    pub threshold: u8,
    pub region_count: usize,
    pub kept_pixels: u64,
    pub coverage_percent: f64,
}

/// JSON summary of one preview, shaped for a threshold scrubber
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub filename: String,
    pub default_threshold: u8,
    pub color: String,
    pub intensity: u8,
    pub wheel_pixels: u64,
    pub coverage_reliable: bool,
    pub thresholds: Vec<ThresholdSummary>,
}

impl PreviewSummary {
    pub fn new(filename: &str, preview: &PreviewOutput) -> Self {
        let wheel_pixels = preview.sweep.first().map_or(0, |r| r.wheel_pixel_count);
        Self {
            filename: filename.to_string(),
            default_threshold: preview.selected_threshold,
            color: preview.color.to_string(),
            intensity: preview.intensity.percent(),
            wheel_pixels,
            coverage_reliable: wheel_pixels > 0,
            thresholds: preview
                .sweep
                .iter()
                .map(|r| ThresholdSummary {
                    threshold: r.threshold,
                    region_count: r.regions.len(),
                    kept_pixels: r.kept_pixel_count,
                    coverage_percent: r.coverage_percent,
                })
                .collect(),
        }
    }
}

/// Write the per-threshold coverage table to CSV
pub fn write_coverage_csv<P: AsRef<Path>>(
    results: &[ThresholdResult],
    output_dir: P,
    filename: &str,
) -> Result<()> {
    let output_path = output_dir.as_ref().join("coverage").join(format!("{}.csv", filename));

    // Create directory if it doesn't exist
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record([
        "Threshold",
        "Region_Count",
        "Kept_Pixels",
        "Wheel_Pixels",
        "Coverage_Percent",
    ])?;

    for result in results {
        writer.write_record(&[
            result.threshold.to_string(),
            result.regions.len().to_string(),
            result.kept_pixel_count.to_string(),
            result.wheel_pixel_count.to_string(),
            format!("{:.6}", result.coverage_percent),
        ])?;
    }

    writer.flush()?;

    Ok(())
}

/// Write the preview summary as pretty-printed JSON
pub fn write_summary_json<P: AsRef<Path>>(
    summary: &PreviewSummary,
    output_dir: P,
    filename: &str,
) -> Result<()> {
    let output_path = output_dir.as_ref().join("summary").join(format!("{}.json", filename));

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(summary)?;
    fs::write(output_path, content)?;

    Ok(())
}
