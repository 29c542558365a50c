use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::colorize::{Color, Intensity};
use crate::errors::{RimPreviewError, Result};
use crate::rasterize::validate_threshold;
use crate::regions::DEFAULT_KEEP_REGIONS;

/// Configuration for RimPreview
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Car photo, or a directory of photos
    pub input_path: String,
    pub output_base_dir: String,

    // Segmentation masks sit next to the photo as `<stem><suffix>.png`
    #[serde(default = "default_wheel_mask_suffix")]
    pub wheel_mask_suffix: String,

    #[serde(default = "default_car_mask_suffix")]
    pub car_mask_suffix: String,

    // Brightness threshold sweep for the rim scrubber
    #[serde(default = "default_threshold_start")]
    pub threshold_start: i32,

    #[serde(default = "default_threshold_end")]
    pub threshold_end: i32,

    #[serde(default = "default_threshold_step")]
    pub threshold_step: i32,

    #[serde(default = "default_default_threshold")]
    pub default_threshold: i32,

    /// Wheel mask values above this count towards the wheel area
    #[serde(default = "default_wheel_mask_cutoff")]
    pub wheel_mask_cutoff: u8,

    #[serde(default = "default_keep_regions")]
    pub keep_regions: usize,

    // Colorization
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_intensity")]
    pub intensity: i32,

    #[serde(default = "default_max_image_size")]
    pub max_image_size: u32,

    #[serde(default)]
    pub remove_background: bool,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,
}

fn default_wheel_mask_suffix() -> String {
    "_wheel".to_string()
}

fn default_car_mask_suffix() -> String {
    "_car".to_string()
}

fn default_threshold_start() -> i32 {
    20
}

fn default_threshold_end() -> i32 {
    100
}

fn default_threshold_step() -> i32 {
    5
}

fn default_default_threshold() -> i32 {
    50
}

fn default_wheel_mask_cutoff() -> u8 {
    10
}

fn default_keep_regions() -> usize {
    DEFAULT_KEEP_REGIONS
}

fn default_color() -> String {
    "#ff0000".to_string()
}

fn default_intensity() -> i32 {
    100
}

fn default_max_image_size() -> u32 {
    4096
}

fn default_parallel() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: "./input".to_string(),
            output_base_dir: "./output".to_string(),
            wheel_mask_suffix: default_wheel_mask_suffix(),
            car_mask_suffix: default_car_mask_suffix(),
            threshold_start: default_threshold_start(),
            threshold_end: default_threshold_end(),
            threshold_step: default_threshold_step(),
            default_threshold: default_default_threshold(),
            wheel_mask_cutoff: default_wheel_mask_cutoff(),
            keep_regions: default_keep_regions(),
            color: default_color(),
            intensity: default_intensity(),
            max_image_size: default_max_image_size(),
            remove_background: false,
            use_parallel: default_parallel(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RimPreviewError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            RimPreviewError::Config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Load the config file if present, defaults otherwise
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::info!("No config file at '{}', using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Thresholds of the sweep, ascending
    pub fn thresholds(&self) -> Vec<i32> {
        if self.threshold_step <= 0 || self.threshold_start > self.threshold_end {
            return Vec::new();
        }
        (self.threshold_start..=self.threshold_end)
            .step_by(self.threshold_step as usize)
            .collect()
    }

    pub fn parsed_color(&self) -> Result<Color> {
        Color::parse(&self.color)
    }

    pub fn parsed_intensity(&self) -> Result<Intensity> {
        Intensity::new(self.intensity)
    }

    /// Validate configuration values (does not touch the filesystem)
    pub fn validate_values(&self) -> Result<()> {
        validate_threshold(self.threshold_start)?;
        validate_threshold(self.threshold_end)?;
        validate_threshold(self.default_threshold)?;

        if self.threshold_step <= 0 {
            return Err(RimPreviewError::Config(
                "threshold_step must be > 0".to_string(),
            ));
        }

        if self.threshold_start > self.threshold_end {
            return Err(RimPreviewError::Config(
                "threshold_start must be <= threshold_end".to_string(),
            ));
        }

        if !self.thresholds().contains(&self.default_threshold) {
            return Err(RimPreviewError::Config(format!(
                "default_threshold {} is not one of the swept thresholds",
                self.default_threshold
            )));
        }

        if self.keep_regions == 0 {
            return Err(RimPreviewError::Config(
                "keep_regions must be > 0".to_string(),
            ));
        }

        if self.max_image_size == 0 {
            return Err(RimPreviewError::Config(
                "max_image_size must be > 0".to_string(),
            ));
        }

        if self.wheel_mask_suffix.is_empty() {
            return Err(RimPreviewError::Config(
                "wheel_mask_suffix must not be empty".to_string(),
            ));
        }

        self.parsed_color()?;
        self.parsed_intensity()?;

        Ok(())
    }

    /// Validate configuration and prepare output directories
    pub fn validate(&self) -> Result<()> {
        let input_path = PathBuf::from(&self.input_path);
        if !input_path.exists() {
            return Err(RimPreviewError::InvalidPath(input_path));
        }

        self.validate_values()?;

        let base_dir = PathBuf::from(&self.output_base_dir);
        for sub in ["masks", "overlay", "preview", "coverage", "summary"] {
            fs::create_dir_all(base_dir.join(sub))?;
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            RimPreviewError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_matches_scrubber_range() {
        let config = Config::default();
        let thresholds = config.thresholds();
        assert_eq!(thresholds.first(), Some(&20));
        assert_eq!(thresholds.last(), Some(&100));
        assert_eq!(thresholds.len(), 17);
        assert!(config.validate_values().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            "input_path = \"photos\"\noutput_base_dir = \"out\"\ncolor = \"0,128,255\"\n",
        )
        .unwrap();
        assert_eq!(config.default_threshold, 50);
        assert_eq!(config.wheel_mask_cutoff, 10);
        assert_eq!(config.keep_regions, 2);
        assert_eq!(config.intensity, 100);
        assert!(!config.remove_background);
        assert!(config.validate_values().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.threshold_end = 300;
        assert!(matches!(
            config.validate_values(),
            Err(RimPreviewError::InvalidThreshold(300))
        ));

        let mut config = Config::default();
        config.default_threshold = 52;
        assert!(matches!(config.validate_values(), Err(RimPreviewError::Config(_))));

        let mut config = Config::default();
        config.color = "blue-ish".to_string();
        assert!(matches!(
            config.validate_values(),
            Err(RimPreviewError::InvalidColorFormat(_))
        ));

        let mut config = Config::default();
        config.intensity = 120;
        assert!(matches!(
            config.validate_values(),
            Err(RimPreviewError::InvalidIntensity(120))
        ));

        let mut config = Config::default();
        config.threshold_step = 0;
        assert!(config.thresholds().is_empty());
        assert!(matches!(config.validate_values(), Err(RimPreviewError::Config(_))));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let path = std::env::temp_dir().join("rim_preview_config_round_trip.toml");
        let mut config = Config::default();
        config.color = "#00ff00".to_string();
        config.default_threshold = 60;

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.color, "#00ff00");
        assert_eq!(loaded.default_threshold, 60);
        assert_eq!(loaded.thresholds(), config.thresholds());
    }
}
