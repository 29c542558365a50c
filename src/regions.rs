use image::{GrayImage, Luma};

use crate::image_utils::{BACKGROUND, FOREGROUND};
use crate::labeling::{LabelMap, Region};
use crate::rasterize::BinaryMask;

/// Number of regions kept as rims: one per visible wheel
pub const DEFAULT_KEEP_REGIONS: usize = 2;

/// Order regions by size, largest first.
///
/// Equal sizes fall back to ascending label, so the region discovered
/// first in raster order comes first.
pub fn rank_regions(regions: &[Region]) -> Vec<Region> {
    let mut ranked = regions.to_vec();
    ranked.sort_by(|a, b| {
        b.pixel_count
            .cmp(&a.pixel_count)
            .then_with(|| a.label.cmp(&b.label))
    });
    ranked
}

/// The `keep` largest regions, in rank order
pub fn kept_regions(regions: &[Region], keep: usize) -> Vec<Region> {
    let mut ranked = rank_regions(regions);
    ranked.truncate(keep);
    ranked
}

/// Total pixel area of a set of regions
pub fn kept_pixel_count(kept: &[Region]) -> u64 {
    kept.iter().map(|r| r.pixel_count).sum()
}

/// Build a mask holding only the pixels of the `keep` largest regions
pub fn select_top_regions(regions: &[Region], label_map: &LabelMap, keep: usize) -> BinaryMask {
    let kept = kept_regions(regions, keep);

    // Lookup by label; kept labels are few, the table stays small
    let table_len = kept.iter().map(|r| r.label as usize + 1).max().unwrap_or(0);
    let mut is_kept = vec![false; table_len];
    for region in &kept {
        is_kept[region.label as usize] = true;
    }

    let (width, height) = label_map.dimensions();
    let samples: Vec<u8> = label_map
        .labels()
        .iter()
        .map(|&l| {
            let l = l as usize;
            if l != 0 && l < table_len && is_kept[l] {
                FOREGROUND
            } else {
                BACKGROUND
            }
        })
        .collect();

    let image = GrayImage::from_raw(width, height, samples)
        .unwrap_or_else(|| GrayImage::from_pixel(width, height, Luma([BACKGROUND])));

    log::debug!(
        "Kept {} of {} regions ({} pixels)",
        kept.len(),
        regions.len(),
        kept_pixel_count(&kept)
    );

    BinaryMask::from_binary_image(image)
}

/// Rim coverage as a percentage of the wheel area.
///
/// A wheel area of zero gives 0 with a warning; the figure is then
/// meaningless but not an error.
pub fn coverage(kept_pixel_count: u64, wheel_foreground_count: u64) -> f64 {
    if wheel_foreground_count == 0 {
        log::debug!(
            "Wheel mask has no foreground pixels; coverage of {} rim pixels reported as 0",
            kept_pixel_count
        );
        return 0.0;
    }
    100.0 * kept_pixel_count as f64 / wheel_foreground_count as f64
}
