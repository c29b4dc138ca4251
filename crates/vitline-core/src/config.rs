//! Configuration system for vitline.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VITLINE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vitline/config.toml
//!   3. ~/.config/vitline/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VitlineConfig {
    pub codec: CodecConfig,
    pub display: DisplayConfig,
    pub scanner: ScannerConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Longest compressed string placed in a single code, and the
    /// fragment size once a payload is chunked.
    pub max_fragment_len: usize,
    /// Frame count above which descriptions are dropped and the payload
    /// is encoded again.
    pub reduce_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rotation interval when the frame count exceeds `fast_above`.
    pub fast_interval_ms: u64,
    /// Rotation interval when the frame count exceeds `medium_above`.
    pub medium_interval_ms: u64,
    /// Rotation interval for small frame sets.
    pub slow_interval_ms: u64,
    pub fast_above: usize,
    pub medium_above: usize,
    /// Frame rate requested from the capture capability during video export.
    pub capture_fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Decode rate requested from the camera.
    pub fps: u32,
    /// Partial transfers older than this are dropped. 0 = never.
    pub assembly_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON file holding every consumed nonce.
    pub store_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_fragment_len: 380,
            reduce_threshold: 50,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 300,
            medium_interval_ms: 500,
            slow_interval_ms: 800,
            fast_above: 10,
            medium_above: 5,
            capture_fps: 25,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            assembly_timeout_secs: 300,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            store_path: data_dir().join("consumed-nonces.json"),
        }
    }
}

impl DisplayConfig {
    /// Frame rotation interval for a set of `total` frames. More frames
    /// rotate faster so one scan window still covers the whole set.
    pub fn rotation_interval(&self, total: usize) -> Duration {
        let ms = if total > self.fast_above {
            self.fast_interval_ms
        } else if total > self.medium_above {
            self.medium_interval_ms
        } else {
            self.slow_interval_ms
        };
        Duration::from_millis(ms)
    }
}

impl ScannerConfig {
    pub fn assembly_timeout(&self) -> Option<Duration> {
        match self.assembly_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vitline")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("vitline")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl VitlineConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read a config file, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(VitlineConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VITLINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&VitlineConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply VITLINE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("VITLINE_CODEC__MAX_FRAGMENT_LEN").and_then(|v| v.parse().ok()) {
            self.codec.max_fragment_len = n;
        }
        if let Some(n) = lookup("VITLINE_CODEC__REDUCE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.codec.reduce_threshold = n;
        }
        if let Some(n) =
            lookup("VITLINE_SCANNER__ASSEMBLY_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.scanner.assembly_timeout_secs = n;
        }
        if let Some(p) = lookup("VITLINE_REPLAY__STORE_PATH") {
            self.replay.store_path = PathBuf::from(p);
        }
    }
}
