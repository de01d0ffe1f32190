//! Application configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// File name used for merged output when none is configured.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "mergedVideo.mp4";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VidjoinConfig {
    /// Directory merged videos are written to when no explicit output is given.
    pub output_dir: PathBuf,

    /// File name used inside `output_dir`.
    pub output_file_name: String,

    /// Export defaults.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Export parameters the caller may choose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Container to write. `None` infers it from the output extension.
    pub file_type: Option<OutputFileType>,

    /// ffmpeg binary used for encoding.
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary used for asset metadata.
    pub ffprobe_path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vidjoin_export=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

/// Output container selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFileType {
    #[default]
    Mp4,
    Mov,
    M4v,
}

impl OutputFileType {
    /// Infer the container from a file extension, if recognised.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    /// Muxer name passed to ffmpeg's `-f`.
    pub fn ffmpeg_format(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::M4v => "ipod",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::M4v => "m4v",
        }
    }
}

impl FromStr for OutputFileType {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "mov" => Ok(Self::Mov),
            "m4v" => Ok(Self::M4v),
            other => Err(MergeError::config(format!(
                "Unknown output format: {other}. Use: mp4, mov, m4v"
            ))),
        }
    }
}

impl fmt::Display for OutputFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl Default for VidjoinConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            file_type: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
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

impl VidjoinConfig {
    /// Load config from the standard location, falling back to defaults.
    ///
    /// `VIDJOIN_FFMPEG` and `VIDJOIN_FFPROBE` override the configured binaries.
    pub fn load() -> Self {
        let mut config = Self::load_file(&config_file_path());
        config.apply_env_overrides();
        config
    }

    fn load_file(config_path: &Path) -> Self {
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

    fn apply_env_overrides(&mut self) {
        if let Ok(ffmpeg) = std::env::var("VIDJOIN_FFMPEG") {
            self.export.ffmpeg_path = PathBuf::from(ffmpeg);
        }
        if let Ok(ffprobe) = std::env::var("VIDJOIN_FFPROBE") {
            self.export.ffprobe_path = PathBuf::from(ffprobe);
        }
    }

    /// Default destination for a merge when the caller names none.
    pub fn default_output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file_name)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vidjoin").join("config.json")
}

/// Default output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("vidjoin").join("merged")
}
