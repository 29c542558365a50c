use std::path::{Path, PathBuf};
use std::fs;
use image::{GrayImage, ImageFormat, RgbaImage};

use crate::errors::{RimPreviewError, Result};
use crate::image_utils::first_channel;

/// Extensions accepted for car photos
const PHOTO_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Represents an input image with its metadata
pub struct InputImage {
    pub image: RgbaImage,
    pub path: PathBuf,
    pub filename: String,
}

/// Path of the mask belonging to a photo: `<dir>/<stem><suffix>.png`
pub fn mask_path_for(photo: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = photo.file_stem()?.to_str()?;
    Some(photo.with_file_name(format!("{}{}.png", stem, suffix)))
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Photo a mask file belongs to, if any.
///
/// A file is only a mask when it is a PNG, its stem ends in one of the mask
/// suffixes, and a photo with the remaining stem sits in the same directory.
/// `red_car.jpg` stays a photo unless `red.*` exists next to it.
fn mask_owner(path: &Path, mask_suffixes: &[&str]) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;

    mask_suffixes
        .iter()
        .filter_map(|suffix| stem.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
        .flat_map(|base| {
            PHOTO_EXTENSIONS.iter().flat_map(move |ext| {
                [ext.to_string(), ext.to_ascii_uppercase()]
                    .into_iter()
                    .map(move |ext| path.with_file_name(format!("{}.{}", base, ext)))
            })
        })
        .find(|candidate| candidate != path && candidate.is_file())
}

/// Get all photos from a directory (recursively) that have a wheel mask next to them
pub fn get_photo_files_in_dir<P: AsRef<Path>>(
    dir_path: P,
    wheel_suffix: &str,
    car_suffix: &str,
) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(RimPreviewError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(RimPreviewError::Config(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let mut photos = Vec::new();
    find_photo_files_recursive(dir_path, &[wheel_suffix, car_suffix], &mut photos)?;

    photos.retain(|photo| {
        let has_mask = mask_path_for(photo, wheel_suffix)
            .map(|mask| mask.is_file())
            .unwrap_or(false);
        if !has_mask {
            log::warn!("Skipping {}: no wheel mask found", photo.display());
        }
        has_mask
    });
    photos.sort();

    Ok(photos)
}

/// Helper function to recursively search for photos
fn find_photo_files_recursive(
    dir_path: &Path,
    mask_suffixes: &[&str],
    result: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_photo_files_recursive(&path, mask_suffixes, result)?;
        } else if path.is_file() && is_photo(&path) {
            match mask_owner(&path, mask_suffixes) {
                Some(owner) => log::debug!(
                    "Treating {} as a mask of {}", path.display(), owner.display()
                ),
                None => result.push(path),
            }
        }
    }

    Ok(())
}

/// Load a photo ensuring RGBA format
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    // Get filename without extension
    let filename = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RimPreviewError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let rgba_img = image::open(path)?.to_rgba8();

    Ok(InputImage {
        image: rgba_img,
        path: path.to_path_buf(),
        filename,
    })
}

/// Load a segmentation mask as a single-channel image
pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RimPreviewError::InvalidPath(path.to_path_buf()));
    }
    Ok(first_channel(&image::open(path)?))
}

/// Save an RGBA image to the specified path
pub fn save_image<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a single-channel mask to the specified path
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<()> {
    mask.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
