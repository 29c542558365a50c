use image::{GrayImage, Luma};
use rayon::prelude::*;

use crate::errors::{RimPreviewError, Result};
use crate::image_utils::{BACKGROUND, FOREGROUND};

/// A single-channel image whose samples are only ever 0 or 255
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// Build a mask from a per-pixel predicate
    pub fn from_fn<F>(width: u32, height: u32, mut is_foreground: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([if is_foreground(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { image }
    }

    /// Wrap an image already known to hold only 0/255 samples
    pub(crate) fn from_binary_image(image: GrayImage) -> Self {
        debug_assert!(image.as_raw().iter().all(|&v| v == FOREGROUND || v == BACKGROUND));
        Self { image }
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == FOREGROUND
    }

    /// Raw samples in row-major order
    #[inline]
    pub fn samples(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Number of 255-valued pixels
    pub fn foreground_count(&self) -> u64 {
        self.samples().iter().filter(|&&v| v == FOREGROUND).count() as u64
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// Threshold a grayscale image into a binary mask.
///
/// A pixel becomes foreground when `sample >= threshold`. Rows are
/// processed in parallel since no pixel depends on its neighbours.
pub fn rasterize(grayscale: &GrayImage, threshold: i32) -> Result<BinaryMask> {
    let threshold = validate_threshold(threshold)?;
    let (width, height) = grayscale.dimensions();
    let mut output = GrayImage::new(width, height);

    if width > 0 && height > 0 {
        let row_len = width as usize;
        let dst: &mut [u8] = &mut output;
        dst.par_chunks_mut(row_len)
            .zip(grayscale.as_raw().par_chunks(row_len))
            .for_each(|(dst_row, src_row)| {
                for (d, &s) in dst_row.iter_mut().zip(src_row) {
                    *d = if s >= threshold { FOREGROUND } else { BACKGROUND };
                }
            });
    }

    log::debug!(
        "Rasterized {}x{} mask at threshold {}",
        width, height, threshold
    );

    Ok(BinaryMask::from_binary_image(output))
}

/// Count the pixels whose sample is strictly above `cutoff`
pub fn count_above(grayscale: &GrayImage, cutoff: u8) -> u64 {
    grayscale
        .as_raw()
        .par_iter()
        .filter(|&&v| v > cutoff)
        .count() as u64
}

/// Convert an integer threshold to a sample value, rejecting anything outside [0, 255]
pub fn validate_threshold(threshold: i32) -> Result<u8> {
    u8::try_from(threshold).map_err(|_| RimPreviewError::InvalidThreshold(threshold))
}
