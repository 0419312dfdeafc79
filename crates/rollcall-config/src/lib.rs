//! Configuration file loading for rollcall.
//!
//! Settings are read from the first TOML file found in a fixed list of
//! system paths. Every field is optional; [`ResolvedConfig`] fills the gaps
//! with built-in defaults so callers never deal with `Option` values.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/rollcall/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/rollcall/config.toml";

pub const DEFAULT_KNOWN_FACES_DIR: &str = "known_faces";
pub const DEFAULT_REPORTS_DIR: &str = "attendance_reports";
pub const DEFAULT_VIDEO_DEVICE: &str = "/dev/video0";
pub const DEFAULT_PIXEL_FORMAT: &str = "YUYV";
pub const DEFAULT_WARMUP_FRAMES: u32 = 4;
pub const DEFAULT_TOLERANCE: f64 = 0.6;
pub const DEFAULT_FRAME_INTERVAL: u32 = 5;
pub const DEFAULT_SNAPSHOT_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_JITTERS: u32 = 1;

/// Raw on-disk representation. Everything is optional so a partial file
/// only overrides what it names.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigFile {
    pub known_faces_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
    pub video_device: Option<String>,
    pub pixel_format: Option<String>,
    pub warmup_frames: Option<u32>,
    pub tolerance: Option<f64>,
    pub frame_interval: Option<u32>,
    pub snapshot_delay_secs: Option<f64>,
    pub jitters: Option<u32>,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

/// Fully resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub known_faces_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub video_device: String,
    pub pixel_format: String,
    pub warmup_frames: u32,
    pub tolerance: f64,
    pub frame_interval: u32,
    pub snapshot_delay_secs: f64,
    pub jitters: u32,
    pub landmark_model: Option<PathBuf>,
    pub encoder_model: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            known_faces_dir: raw
                .known_faces_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWN_FACES_DIR)),
            reports_dir: raw
                .reports_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR)),
            video_device: raw
                .video_device
                .unwrap_or_else(|| DEFAULT_VIDEO_DEVICE.to_string()),
            pixel_format: raw
                .pixel_format
                .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string()),
            warmup_frames: raw.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            tolerance: raw.tolerance.unwrap_or(DEFAULT_TOLERANCE),
            // An interval of zero would never run detection; treat it as 1.
            frame_interval: raw.frame_interval.unwrap_or(DEFAULT_FRAME_INTERVAL).max(1),
            snapshot_delay_secs: raw
                .snapshot_delay_secs
                .unwrap_or(DEFAULT_SNAPSHOT_DELAY_SECS)
                .max(0.0),
            jitters: raw.jitters.unwrap_or(DEFAULT_JITTERS),
            landmark_model: raw.landmark_model,
            encoder_model: raw.encoder_model,
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

/// A parsed config file together with the path it came from, if any.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ConfigFile,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

pub fn load_config() -> Result<LoadedConfig, ConfigError> {
    load_from_paths(&default_paths())
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_paths())
}

pub fn load_resolved_from_paths(paths: &[PathBuf]) -> Result<ResolvedConfigWithSource, ConfigError> {
    let loaded = load_from_paths(paths)?;
    Ok(ResolvedConfigWithSource {
        resolved: ResolvedConfig::from_raw(loaded.config),
        source: loaded.path,
    })
}

/// Returns the first config file that exists in `paths`. Missing files are
/// skipped; any other read failure is an error.
pub fn load_from_paths(paths: &[PathBuf]) -> Result<LoadedConfig, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = parse_config(path, &contents)?;
                return Ok(LoadedConfig {
                    config,
                    path: Some(path.clone()),
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    Ok(LoadedConfig {
        config: ConfigFile::default(),
        path: None,
    })
}

pub fn default_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

fn parse_config(path: &Path, contents: &str) -> Result<ConfigFile, ConfigError> {
    toml::from_str(contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
