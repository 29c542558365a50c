use std::path::PathBuf;
use std::time::Instant;

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use crate::colorize::{colorize, composite_over, Color, Intensity};
use crate::config::Config;
use crate::errors::{RimPreviewError, Result};
use crate::image_io::{load_mask, mask_path_for, save_image, save_mask, InputImage};
use crate::image_utils::{apply_alpha_mask, check_dimensions, check_max_size, extract_masked_luma};
use crate::labeling::{label, Region};
use crate::output::{write_coverage_csv, write_summary_json, PreviewSummary};
use crate::rasterize::{count_above, rasterize, validate_threshold, BinaryMask};
use crate::regions::{coverage, kept_pixel_count, kept_regions, select_top_regions};

/// Rim detection result for one brightness threshold
#[derive(Debug, Clone)]
pub struct ThresholdResult {
    pub threshold: u8,
    /// Mask of the kept rim regions
    pub rim_mask: BinaryMask,
    /// All regions found at this threshold, by ascending label
    pub regions: Vec<Region>,
    pub kept_pixel_count: u64,
    pub wheel_pixel_count: u64,
    pub coverage_percent: f64,
    /// False when the wheel area was empty and coverage was forced to 0
    pub coverage_reliable: bool,
}

/// Everything needed to show one rim preview
#[derive(Debug, Clone)]
pub struct PreviewOutput {
    pub sweep: Vec<ThresholdResult>,
    pub selected_threshold: u8,
    pub color: Color,
    pub intensity: Intensity,
    /// Photo the overlay is drawn onto (car-only when background is removed)
    pub base: RgbaImage,
    pub overlay: RgbaImage,
    pub composite: RgbaImage,
}

impl PreviewOutput {
    /// Result of the threshold the preview was rendered at
    pub fn selected(&self) -> Option<&ThresholdResult> {
        self.sweep.iter().find(|r| r.threshold == self.selected_threshold)
    }
}

/// Run rim detection on the wheel brightness image at one threshold
pub fn process_threshold(
    wheel_luma: &GrayImage,
    wheel_pixel_count: u64,
    threshold: i32,
    keep: usize,
) -> Result<ThresholdResult> {
    let threshold_value = validate_threshold(threshold)?;
    let bright = rasterize(wheel_luma, threshold)?;
    let (label_map, regions) = label(&bright);
    let rim_mask = select_top_regions(&regions, &label_map, keep);
    let kept_pixel_count = kept_pixel_count(&kept_regions(&regions, keep));
    let coverage_percent = coverage(kept_pixel_count, wheel_pixel_count);

    log::debug!(
        "Threshold {}: {} regions, rim area {} pixels ({:.2}% of wheel)",
        threshold, regions.len(), kept_pixel_count, coverage_percent
    );

    Ok(ThresholdResult {
        threshold: threshold_value,
        rim_mask,
        regions,
        kept_pixel_count,
        wheel_pixel_count,
        coverage_percent,
        coverage_reliable: wheel_pixel_count > 0,
    })
}

/// Run rim detection for every threshold, results ordered as given
pub fn sweep_thresholds(
    wheel_luma: &GrayImage,
    wheel_pixel_count: u64,
    thresholds: &[i32],
    keep: usize,
    parallel: bool,
) -> Result<Vec<ThresholdResult>> {
    // Reject bad input before any work is done
    for &t in thresholds {
        validate_threshold(t)?;
    }

    if parallel {
        thresholds
            .par_iter()
            .map(|&t| process_threshold(wheel_luma, wheel_pixel_count, t, keep))
            .collect()
    } else {
        thresholds
            .iter()
            .map(|&t| process_threshold(wheel_luma, wheel_pixel_count, t, keep))
            .collect()
    }
}

/// Build a rim preview from a photo and its segmentation masks.
///
/// `selected_threshold` picks the rim mask used for colorization; it must be
/// one of the swept thresholds.
pub fn build_preview(
    photo: &RgbaImage,
    wheel_mask: &GrayImage,
    car_mask: Option<&GrayImage>,
    config: &Config,
    selected_threshold: i32,
) -> Result<PreviewOutput> {
    check_max_size(photo.dimensions(), config.max_image_size)?;
    check_dimensions(photo.dimensions(), wheel_mask.dimensions())?;
    if let Some(car_mask) = car_mask {
        check_dimensions(photo.dimensions(), car_mask.dimensions())?;
    }

    let color = config.parsed_color()?;
    let intensity = config.parsed_intensity()?;
    let selected = validate_threshold(selected_threshold)?;

    let wheel_luma = extract_masked_luma(photo, wheel_mask)?;
    let wheel_pixel_count = count_above(wheel_mask, config.wheel_mask_cutoff);
    if wheel_pixel_count == 0 {
        log::warn!("Wheel mask has no pixels above {}; coverage reported as 0", config.wheel_mask_cutoff);
    } else {
        log::debug!("Wheel area: {} pixels", wheel_pixel_count);
    }

    let sweep = sweep_thresholds(
        &wheel_luma,
        wheel_pixel_count,
        &config.thresholds(),
        config.keep_regions,
        config.use_parallel,
    )?;

    let rim_mask = sweep
        .iter()
        .find(|r| r.threshold == selected)
        .map(|r| r.rim_mask.as_image())
        .ok_or_else(|| {
            RimPreviewError::Config(format!(
                "threshold {} is not one of the swept thresholds",
                selected_threshold
            ))
        })?;

    let base = match car_mask {
        Some(car_mask) => apply_alpha_mask(photo, car_mask)?,
        None => photo.clone(),
    };

    // Shading always comes from the unmasked photo
    let overlay = colorize(rim_mask, photo, color, intensity)?;
    let composite = composite_over(&base, &overlay)?;

    Ok(PreviewOutput {
        sweep,
        selected_threshold: selected,
        color,
        intensity,
        base,
        overlay,
        composite,
    })
}

/// Process a single photo: load its masks, build the preview and write all outputs
pub fn process_image(
    input_image: InputImage,
    config: &Config,
    debug: bool,
) -> Result<()> {
    let InputImage { image, path, filename } = input_image;
    let start = Instant::now();

    let wheel_mask_path = mask_path_for(&path, &config.wheel_mask_suffix)
        .ok_or_else(|| RimPreviewError::InvalidPath(path.clone()))?;
    let wheel_mask = load_mask(&wheel_mask_path)?;

    let car_mask = if config.remove_background {
        let car_mask_path = mask_path_for(&path, &config.car_mask_suffix)
            .ok_or_else(|| RimPreviewError::InvalidPath(path.clone()))?;
        Some(load_mask(&car_mask_path)?)
    } else {
        None
    };

    let preview = build_preview(
        &image,
        &wheel_mask,
        car_mask.as_ref(),
        config,
        config.default_threshold,
    )?;

    let output_base = PathBuf::from(&config.output_base_dir);
    for sub in ["masks", "overlay", "preview"] {
        std::fs::create_dir_all(output_base.join(sub))?;
    }

    for result in &preview.sweep {
        let mask_path = output_base
            .join("masks")
            .join(format!("{}_t{:03}.png", filename, result.threshold));
        save_mask(result.rim_mask.as_image(), mask_path)?;
    }

    save_image(&preview.overlay, output_base.join("overlay").join(format!("{}.png", filename)))?;
    save_image(&preview.composite, output_base.join("preview").join(format!("{}.png", filename)))?;

    if debug {
        let debug_dir = output_base.join("debug");
        std::fs::create_dir_all(&debug_dir)?;
        save_image(&preview.base, debug_dir.join(format!("{}_base.png", filename)))?;
        save_mask(&extract_masked_luma(&image, &wheel_mask)?, debug_dir.join(format!("{}_wheel_luma.png", filename)))?;
    }

    write_coverage_csv(&preview.sweep, &output_base, &filename)?;
    write_summary_json(&PreviewSummary::new(&filename, &preview), &output_base, &filename)?;

    if let Some(selected) = preview.selected() {
        log::info!(
            "{}: threshold {} -> {} regions, rim coverage {:.2}%{} ({:.2}s)",
            filename,
            selected.threshold,
            selected.regions.len(),
            selected.coverage_percent,
            if selected.coverage_reliable { "" } else { " (wheel mask empty)" },
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    /// Dark photo with two bright 3x3 "rims" inside two 5x5 "wheels"
    fn two_wheel_scene() -> (RgbaImage, GrayImage) {
        let photo = RgbaImage::from_fn(16, 8, |x, y| {
            let in_rim = (2..5).contains(&y) && ((2..5).contains(&x) || (10..13).contains(&x));
            if in_rim {
                Rgba([220, 220, 220, 255])
            } else {
                Rgba([40, 40, 40, 255])
            }
        });
        let wheel_mask = GrayImage::from_fn(16, 8, |x, y| {
            let in_wheel = (1..6).contains(&y) && ((1..6).contains(&x) || (9..14).contains(&x));
            Luma([if in_wheel { 255 } else { 0 }])
        });
        (photo, wheel_mask)
    }

    #[test]
    fn threshold_result_counts_rims() {
        let (photo, wheel_mask) = two_wheel_scene();
        let luma = extract_masked_luma(&photo, &wheel_mask).unwrap();
        let wheel_pixels = count_above(&wheel_mask, 10);
        assert_eq!(wheel_pixels, 50);

        let result = process_threshold(&luma, wheel_pixels, 100, 2).unwrap();

        assert_eq!(result.regions.len(), 2);
        assert_eq!(result.kept_pixel_count, 18);
        assert!((result.coverage_percent - 36.0).abs() < 1e-9);
        assert!(result.coverage_reliable);
    }

    #[test]
    fn low_threshold_merges_rim_with_wheel() {
        let (photo, wheel_mask) = two_wheel_scene();
        let luma = extract_masked_luma(&photo, &wheel_mask).unwrap();

        let result = process_threshold(&luma, 50, 30, 2).unwrap();

        assert_eq!(result.regions.len(), 2);
        assert_eq!(result.kept_pixel_count, 50);
        assert!((result.coverage_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_wheel_is_flagged_unreliable() {
        let luma = GrayImage::from_pixel(4, 4, Luma([200]));
        let result = process_threshold(&luma, 0, 50, 2).unwrap();
        assert_eq!(result.coverage_percent, 0.0);
        assert!(!result.coverage_reliable);
    }

    #[test]
    fn sweep_preserves_threshold_order() {
        let (photo, wheel_mask) = two_wheel_scene();
        let luma = extract_masked_luma(&photo, &wheel_mask).unwrap();
        let thresholds = [100, 20, 60];

        let parallel = sweep_thresholds(&luma, 50, &thresholds, 2, true).unwrap();
        let sequential = sweep_thresholds(&luma, 50, &thresholds, 2, false).unwrap();

        let order: Vec<u8> = parallel.iter().map(|r| r.threshold).collect();
        assert_eq!(order, vec![100, 20, 60]);
        for (p, s) in parallel.iter().zip(&sequential) {
            assert_eq!(p.rim_mask, s.rim_mask);
            assert_eq!(p.regions, s.regions);
        }
    }

    #[test]
    fn sweep_rejects_bad_threshold_up_front() {
        let luma = GrayImage::new(2, 2);
        assert!(matches!(
            sweep_thresholds(&luma, 4, &[20, 999], 2, true),
            Err(RimPreviewError::InvalidThreshold(999))
        ));
    }

    #[test]
    fn preview_colors_only_rims() {
        let (photo, wheel_mask) = two_wheel_scene();
        let config = Config::default();

        let preview = build_preview(&photo, &wheel_mask, None, &config, 100).unwrap();

        assert_eq!(preview.sweep.len(), config.thresholds().len());
        assert_eq!(preview.selected().unwrap().kept_pixel_count, 18);
        // Rim pixel: luminosity 220 saturates red, shading kept in nothing else
        assert_eq!(preview.overlay.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(preview.composite.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        // Tyre pixel stays untouched
        assert_eq!(preview.overlay.get_pixel(1, 1)[3], 0);
        assert_eq!(preview.composite.get_pixel(1, 1), &Rgba([40, 40, 40, 255]));
    }

    #[test]
    fn preview_with_car_mask_drops_background() {
        let (photo, wheel_mask) = two_wheel_scene();
        let car_mask = GrayImage::from_fn(16, 8, |x, _| Luma([if x < 15 { 255 } else { 0 }]));
        let config = Config::default();

        let preview = build_preview(&photo, &wheel_mask, Some(&car_mask), &config, 50).unwrap();

        assert_eq!(preview.base.get_pixel(15, 0)[3], 0);
        assert_eq!(preview.composite.get_pixel(15, 0)[3], 0);
        assert_eq!(preview.composite.get_pixel(0, 0), &Rgba([40, 40, 40, 255]));
    }

    #[test]
    fn preview_rejects_mismatched_mask() {
        let (photo, _) = two_wheel_scene();
        let wheel_mask = GrayImage::new(8, 8);
        let result = build_preview(&photo, &wheel_mask, None, &Config::default(), 50);
        assert!(matches!(result, Err(RimPreviewError::DimensionMismatch { .. })));
    }

    #[test]
    fn preview_rejects_oversized_photo() {
        let (photo, wheel_mask) = two_wheel_scene();
        let mut config = Config::default();
        config.max_image_size = 10;
        let result = build_preview(&photo, &wheel_mask, None, &config, 50);
        assert!(matches!(result, Err(RimPreviewError::ImageTooLarge { .. })));
    }

    #[test]
    fn preview_with_empty_wheel_mask_reports_zero_coverage() {
        let (photo, _) = two_wheel_scene();
        let wheel_mask = GrayImage::from_pixel(16, 8, Luma([10]));

        let preview = build_preview(&photo, &wheel_mask, None, &Config::default(), 50).unwrap();

        assert_eq!(preview.sweep.len(), 17);
        assert!(preview
            .sweep
            .iter()
            .all(|r| r.wheel_pixel_count == 0 && r.coverage_percent == 0.0 && !r.coverage_reliable));
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rim_preview_pipeline_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_scene(dir: &std::path::Path) -> InputImage {
        let (photo, wheel_mask) = two_wheel_scene();
        save_image(&photo, dir.join("scene.png")).unwrap();
        save_mask(&wheel_mask, dir.join("scene_wheel.png")).unwrap();
        crate::image_io::load_image(dir.join("scene.png")).unwrap()
    }

    #[test]
    fn process_image_writes_every_output() {
        let dir = scratch_dir("outputs");
        let input = write_scene(&dir);
        let out = dir.join("out");
        let config = Config {
            input_path: dir.to_string_lossy().into_owned(),
            output_base_dir: out.to_string_lossy().into_owned(),
            ..Config::default()
        };

        process_image(input, &config, false).unwrap();

        let masks: Vec<PathBuf> = config
            .thresholds()
            .iter()
            .map(|t| out.join("masks").join(format!("scene_t{:03}.png", t)))
            .collect();
        let reports = [
            out.join("overlay").join("scene.png"),
            out.join("preview").join("scene.png"),
            out.join("coverage").join("scene.csv"),
            out.join("summary").join("scene.json"),
        ];
        let missing: Vec<&PathBuf> = masks
            .iter()
            .chain(&reports)
            .filter(|p| !p.is_file())
            .collect();
        let mask_count = std::fs::read_dir(out.join("masks")).unwrap().count();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(masks.len(), 17);
        assert!(missing.is_empty(), "missing outputs: {:?}", missing);
        assert_eq!(mask_count, 17);
    }

    #[test]
    fn process_image_needs_car_mask_to_remove_background() {
        let dir = scratch_dir("no_car_mask");
        let input = write_scene(&dir);
        let config = Config {
            input_path: dir.to_string_lossy().into_owned(),
            output_base_dir: dir.join("out").to_string_lossy().into_owned(),
            remove_background: true,
            ..Config::default()
        };

        let result = process_image(input, &config, false);
        let _ = std::fs::remove_dir_all(&dir);

        assert!(matches!(&result, Err(RimPreviewError::InvalidPath(p)) if p.ends_with("scene_car.png")));
    }

    #[test]
    fn preview_rejects_unswept_threshold() {
        let (photo, wheel_mask) = two_wheel_scene();
        let result = build_preview(&photo, &wheel_mask, None, &Config::default(), 51);
        assert!(matches!(result, Err(RimPreviewError::Config(_))));
    }
}
