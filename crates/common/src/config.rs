//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::TinytvResult;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External toolchain locations.
    #[serde(default)]
    pub tools: ToolPaths,

    /// Default encode settings offered to the user.
    #[serde(default)]
    pub device: DeviceDefaults,

    /// Size-estimate calibration settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Paths to the encoder and prober executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Encoder executable (bare name resolves through `PATH`).
    pub ffmpeg: PathBuf,

    /// Prober executable. Derived from `ffmpeg` when unset.
    #[serde(default)]
    pub ffprobe: Option<PathBuf>,
}

/// Default encode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDefaults {
    /// Default target FPS (12 or 24).
    pub fps: u32,

    /// Default quality value (2 = best/largest, 31 = worst/smallest).
    pub quality: u8,

    /// Default scale mode: "contain", "cover" or "stretch".
    pub scale_mode: String,

    /// Whether audio loudness normalization is on by default.
    pub normalize_audio: bool,
}

/// Calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Seconds of source encoded per calibration sample.
    pub sample_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tinytv=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: None,
        }
    }
}

impl Default for DeviceDefaults {
    fn default() -> Self {
        Self {
            fps: 24,
            quality: 5,
            scale_mode: "cover".to_string(),
            normalize_audio: false,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { sample_secs: 2.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ToolPaths {
    /// Resolve the prober path.
    ///
    /// An explicit `ffprobe` wins. Otherwise a sibling of the encoder whose
    /// file name has `ffmpeg` replaced by `ffprobe` is used when it exists,
    /// and plain `ffprobe` from `PATH` as a last resort.
    pub fn resolved_ffprobe(&self) -> PathBuf {
        if let Some(explicit) = &self.ffprobe {
            return explicit.clone();
        }
        sibling_prober(&self.ffmpeg).unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}

fn sibling_prober(ffmpeg: &Path) -> Option<PathBuf> {
    let name = ffmpeg.file_name()?.to_string_lossy().to_lowercase();
    if !name.starts_with("ffmpeg") {
        return None;
    }
    let candidate = ffmpeg.with_file_name(name.replacen("ffmpeg", "ffprobe", 1));
    candidate.exists().then_some(candidate)
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> TinytvResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> TinytvResult<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("tinytv").join("config.json")
}
