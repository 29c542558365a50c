use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use crate::errors::{RimPreviewError, Result};

/// Sample value of a foreground pixel in a binary mask
pub const FOREGROUND: u8 = 255;
/// Sample value of a background pixel in a binary mask
pub const BACKGROUND: u8 = 0;

/// Rec.601 luminosity of an RGB triple, in [0.0, 255.0]
#[inline]
pub fn luminosity(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Luminosity rounded to an 8-bit gray sample
#[inline]
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    luminosity(r, g, b).round().min(255.0) as u8
}

/// Reject two buffers whose dimensions differ
pub fn check_dimensions(expected: (u32, u32), actual: (u32, u32)) -> Result<()> {
    if expected != actual {
        return Err(RimPreviewError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Reject images larger than the configured maximum in either direction
pub fn check_max_size(dimensions: (u32, u32), max: u32) -> Result<()> {
    let (width, height) = dimensions;
    if width > max || height > max {
        return Err(RimPreviewError::ImageTooLarge { width, height, max });
    }
    Ok(())
}

/// Take the first channel of a decoded mask image.
///
/// Segmentation masks arrive as gray, RGB or RGBA images; in every case
/// the first channel carries the mask value.
pub fn first_channel(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => {
            let rgba = other.to_rgba8();
            let (width, height) = rgba.dimensions();
            GrayImage::from_fn(width, height, |x, y| Luma([rgba.get_pixel(x, y)[0]]))
        }
    }
}

/// Replace the alpha channel of an image with a mask
pub fn apply_alpha_mask(image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage> {
    check_dimensions(image.dimensions(), mask.dimensions())?;

    let (width, height) = image.dimensions();
    let mut result = RgbaImage::new(width, height);

    for (x, y, pixel) in result.enumerate_pixels_mut() {
        let original = image.get_pixel(x, y);
        let alpha = mask.get_pixel(x, y)[0];
        *pixel = Rgba([original[0], original[1], original[2], alpha]);
    }

    Ok(result)
}

/// Cut the masked area out of an image, flatten it onto black and convert
/// it to grayscale.
///
/// The result is the brightness image the rim threshold is applied to:
/// pixels outside the mask end up black, partially masked pixels are
/// darkened in proportion to the mask value.
pub fn extract_masked_luma(image: &RgbaImage, mask: &GrayImage) -> Result<GrayImage> {
    check_dimensions(image.dimensions(), mask.dimensions())?;

    let (width, height) = image.dimensions();
    let mut result = GrayImage::new(width, height);

    for (x, y, pixel) in result.enumerate_pixels_mut() {
        let original = image.get_pixel(x, y);
        let alpha = mask.get_pixel(x, y)[0] as f64 / 255.0;
        let flatten = |c: u8| (c as f64 * alpha).round() as u8;
        *pixel = Luma([luma_u8(flatten(original[0]), flatten(original[1]), flatten(original[2]))]);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn luminosity_uses_rec601_weights() {
        assert_approx_eq!(luminosity(255, 0, 0), 76.245, 1e-9);
        assert_approx_eq!(luminosity(0, 255, 0), 149.685, 1e-9);
        assert_approx_eq!(luminosity(0, 0, 255), 29.07, 1e-9);
        assert_approx_eq!(luminosity(200, 200, 200), 200.0, 1e-9);
        assert_eq!(luma_u8(255, 255, 255), 255);
    }

    #[test]
    fn dimension_check_reports_both_sizes() {
        assert!(check_dimensions((4, 4), (4, 4)).is_ok());
        match check_dimensions((4, 4), (4, 5)) {
            Err(RimPreviewError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 5));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn oversized_images_are_rejected() {
        assert!(check_max_size((4096, 4096), 4096).is_ok());
        assert!(matches!(
            check_max_size((4097, 10), 4096),
            Err(RimPreviewError::ImageTooLarge { width: 4097, .. })
        ));
    }

    #[test]
    fn alpha_mask_replaces_alpha_only() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 255]));
        let mask = GrayImage::from_raw(2, 1, vec![0, 200]).unwrap();

        let masked = apply_alpha_mask(&image, &mask).unwrap();

        assert_eq!(masked.get_pixel(0, 0), &Rgba([10, 20, 30, 0]));
        assert_eq!(masked.get_pixel(1, 0), &Rgba([10, 20, 30, 200]));
    }

    #[test]
    fn masked_luma_is_black_outside_mask() {
        let image = RgbaImage::from_pixel(3, 1, Rgba([200, 200, 200, 255]));
        let mask = GrayImage::from_raw(3, 1, vec![0, 255, 128]).unwrap();

        let luma = extract_masked_luma(&image, &mask).unwrap();

        assert_eq!(luma.get_pixel(0, 0)[0], 0);
        assert_eq!(luma.get_pixel(1, 0)[0], 200);
        assert_eq!(luma.get_pixel(2, 0)[0], 100);
    }

    #[test]
    fn first_channel_of_rgb_mask() {
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([77, 1, 2]));
        let gray = first_channel(&DynamicImage::ImageRgb8(rgb));
        assert!(gray.pixels().all(|p| p[0] == 77));
    }
}
