use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for an activity-clipping run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How the activity series is sampled
    pub sampling: SamplingConfig,

    /// Threshold and run-length settings
    pub segmentation: SegmentationConfig,

    /// Clip output settings
    pub export: ExportConfig,

    /// Decoder/encoder settings
    pub video: VideoConfig,

    /// Activity plot settings
    pub plot: PlotConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        self.segmentation.validate()?;
        self.export.validate()?;
        self.video.validate()?;
        self.plot.validate()?;
        Ok(())
    }
}

/// Activity sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Frames advanced between samples (150 = every 5 seconds at 30 fps)
    pub stride: u64,

    /// Stop sampling after this many seconds (full video when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stride: 150,
            end_time: None,
        }
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sampling.stride".to_string(),
                value: self.stride.to_string()
            }.into());
        }

        if let Some(end_time) = self.end_time {
            if !end_time.is_finite() || end_time < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: "sampling.end_time".to_string(),
                    value: end_time.to_string()
                }.into());
            }
        }

        Ok(())
    }
}

/// Threshold and segment filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Standard deviations above the mean used as the activity threshold
    pub deviation_multiplier: f64,

    /// Interior runs must span more than this many samples to be kept
    pub min_run_length: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            deviation_multiplier: 1.0,
            min_run_length: 4,
        }
    }
}

impl SegmentationConfig {
    fn validate(&self) -> Result<()> {
        if !self.deviation_multiplier.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "segmentation.deviation_multiplier".to_string(),
                value: self.deviation_multiplier.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Clip export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Root directory for clips; clips land in `<clip_dir>/<prefix>/`
    pub clip_dir: PathBuf,

    /// Prefix for the clip subdirectory and file names (include a trailing '_')
    pub prefix: String,

    /// Output container extension
    pub extension: String,

    /// Encoder passed to ffmpeg's `-c:v`
    pub codec: String,

    /// Number of clips exported concurrently
    pub workers: usize,

    /// Append the segment index to names that would overwrite an earlier clip
    pub disambiguate_collisions: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            clip_dir: PathBuf::from("clips"),
            prefix: "YH_".to_string(),
            extension: "mp4".to_string(),
            codec: "libx264".to_string(),
            workers: 1,
            disambiguate_collisions: false,
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        let max_workers = num_cpus::get().max(1) * 4;
        if self.workers == 0 || self.workers > max_workers {
            return Err(ConfigError::InvalidValue {
                key: "export.workers".to_string(),
                value: self.workers.to_string()
            }.into());
        }

        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::InvalidValue {
                key: "export.extension".to_string(),
                value: self.extension.clone()
            }.into());
        }

        if self.prefix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                key: "export.prefix".to_string(),
                value: self.prefix.clone()
            }.into());
        }

        if self.codec.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "export.codec".to_string(),
                value: self.codec.clone()
            }.into());
        }

        Ok(())
    }
}

/// External decoder/encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg executable
    pub ffmpeg: PathBuf,

    /// ffprobe executable
    pub ffprobe: PathBuf,

    /// Seeks at most this far ahead decode forward instead of restarting the decoder
    pub max_forward_skip: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            max_forward_skip: 300,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.ffmpeg.as_os_str().is_empty() || self.ffprobe.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "video.ffmpeg/ffprobe".to_string(),
                value: String::new()
            }.into());
        }

        Ok(())
    }
}

/// Activity plot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Render the plot at all
    pub enabled: bool,

    /// Output directory
    pub dir: PathBuf,

    /// File name, written as `<dir>/<prefix><filename>`
    pub filename: String,

    /// Image size in pixels
    pub width: u32,
    pub height: u32,

    /// Histogram bin count
    pub bins: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("plots"),
            filename: "avg_pixel_change_plot.png".to_string(),
            width: 1200,
            height: 600,
            bins: 50,
        }
    }
}

impl PlotConfig {
    fn validate(&self) -> Result<()> {
        if self.width < 200 || self.height < 100 {
            return Err(ConfigError::InvalidValue {
                key: "plot.size".to_string(),
                value: format!("{}x{}", self.width, self.height)
            }.into());
        }

        if self.bins == 0 {
            return Err(ConfigError::InvalidValue {
                key: "plot.bins".to_string(),
                value: self.bins.to_string()
            }.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.sampling.end_time = Some(3600.0);
        original_config.export.prefix = "YH_s1_tr1_".to_string();

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.sampling.stride, loaded_config.sampling.stride);
        assert_eq!(loaded_config.sampling.end_time, Some(3600.0));
        assert_eq!(loaded_config.export.prefix, "YH_s1_tr1_");
        assert_eq!(original_config.plot.bins, loaded_config.plot.bins);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[sampling]\nstride = 30\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.sampling.stride, 30);
        assert_eq!(config.sampling.end_time, None);
        assert_eq!(config.segmentation.min_run_length, 4);
        assert_eq!(config.export.extension, "mp4");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ClipperError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_zero_stride_is_invalid() {
        let mut config = Config::default();
        config.sampling.stride = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_end_time_is_invalid() {
        let mut config = Config::default();
        config.sampling.end_time = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_export_settings() {
        let mut config = Config::default();
        config.export.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.extension = ".mp4".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.prefix = "a/b".to_string();
        assert!(config.validate().is_err());
    }
}
