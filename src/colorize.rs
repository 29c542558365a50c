use std::fmt;
use std::str::FromStr;

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::errors::{RimPreviewError, Result};
use crate::image_utils::{check_dimensions, luminosity};

/// Lifts the luminosity-scaled color so painted rims do not look dull
pub const SATURATION_BOOST: f64 = 1.5;

/// Canonical 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Target rim color, or no colorization at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    None,
    Rgb(RgbColor),
}

impl Color {
    /// Parse `#RRGGBB`, `r,g,b`, or the `transparent`/`none` sentinels
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("transparent") || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Color::None);
        }

        parse_hex(trimmed)
            .or_else(|| parse_triple(trimmed))
            .map(Color::Rgb)
            .ok_or_else(|| RimPreviewError::InvalidColorFormat(input.to_string()))
    }
}

impl FromStr for Color {
    type Err = RimPreviewError;

    fn from_str(s: &str) -> Result<Self> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::None => write!(f, "transparent"),
            Color::Rgb(c) => write!(f, "#{:02x}{:02x}{:02x}", c.r, c.g, c.b),
        }
    }
}

fn parse_hex(input: &str) -> Option<RgbColor> {
    let hex = input.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(RgbColor::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn parse_triple(input: &str) -> Option<RgbColor> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut channels = [0u8; 3];
    for (channel, part) in channels.iter_mut().zip(&parts) {
        *channel = part.parse::<u8>().ok()?;
    }
    Some(RgbColor::new(channels[0], channels[1], channels[2]))
}

/// Blend strength between the original shading (0) and the full color (100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intensity(u8);

impl Intensity {
    pub const MAX: Intensity = Intensity(100);

    pub fn new(percent: i32) -> Result<Self> {
        if !(0..=100).contains(&percent) {
            return Err(RimPreviewError::InvalidIntensity(percent));
        }
        Ok(Intensity(percent as u8))
    }

    #[inline]
    pub fn percent(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Recolor one shading pixel, keeping its luminosity
#[inline]
fn colorize_pixel(shading: [u8; 3], color: [u8; 3], k: f64) -> [u8; 3] {
    let factor = luminosity(shading[0], shading[1], shading[2]) / 255.0;
    let mut out = [0u8; 3];
    for i in 0..3 {
        let original = shading[i] as f64;
        let colored = (color[i] as f64 * factor * SATURATION_BOOST).min(255.0);
        out[i] = (original * (1.0 - k) + colored * k).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Produce a transparent-outside RGBA layer with the masked area recolored.
///
/// `mask` is used directly as alpha, so graded masks give soft edges.
/// With no color or zero intensity the layer is fully transparent.
pub fn colorize(
    mask: &GrayImage,
    shading: &RgbaImage,
    color: Color,
    intensity: Intensity,
) -> Result<RgbaImage> {
    check_dimensions(mask.dimensions(), shading.dimensions())?;

    let (width, height) = mask.dimensions();
    let mut overlay = RgbaImage::new(width, height);

    let target = match color {
        Color::Rgb(c) if intensity.percent() > 0 => c.channels(),
        _ => return Ok(overlay),
    };

    if width == 0 || height == 0 {
        return Ok(overlay);
    }

    let k = intensity.fraction();
    let row_len = width as usize;
    let dst: &mut [u8] = &mut overlay;

    dst.par_chunks_mut(row_len * 4)
        .zip(mask.as_raw().par_chunks(row_len))
        .zip(shading.as_raw().par_chunks(row_len * 4))
        .for_each(|((out_row, mask_row), shade_row)| {
            for ((out, &alpha), shade) in out_row
                .chunks_exact_mut(4)
                .zip(mask_row)
                .zip(shade_row.chunks_exact(4))
            {
                if alpha == 0 {
                    continue;
                }
                let rgb = colorize_pixel([shade[0], shade[1], shade[2]], target, k);
                out.copy_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);
            }
        });

    log::debug!("Colorized {}x{} layer with {} at {}%", width, height, color, intensity.percent());

    Ok(overlay)
}

/// Draw `overlay` over `base` (source-over, straight alpha)
pub fn composite_over(base: &RgbaImage, overlay: &RgbaImage) -> Result<RgbaImage> {
    check_dimensions(base.dimensions(), overlay.dimensions())?;

    let (width, height) = base.dimensions();
    let mut result = RgbaImage::new(width, height);

    for (x, y, pixel) in result.enumerate_pixels_mut() {
        let dst = base.get_pixel(x, y);
        let src = overlay.get_pixel(x, y);
        *pixel = blend_source_over(dst, src);
    }

    Ok(result)
}

fn blend_source_over(dst: &Rgba<u8>, src: &Rgba<u8>) -> Rgba<u8> {
    let src_a = src[3] as f64 / 255.0;
    let dst_a = dst[3] as f64 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let c = (src[i] as f64 * src_a + dst[i] as f64 * dst_a * (1.0 - src_a)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
