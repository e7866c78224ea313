// THEORY:
// `MonitorConfig` is the single set of tunables for a run. Every field has a
// default, so an empty or partial TOML file is a valid configuration, and the
// binary layers its CLI flags on top of whatever the file provides.
//
// Key architectural principles:
// 1.  **Defaults First**: `#[serde(default)]` on every section means a missing key
//     keeps the documented value rather than failing the parse.
// 2.  **Validate Once**: `validate` rejects values that would make a cycle
//     meaningless (empty window, zero decimation, non-finite threshold, zero-sized
//     cells) before the driver is built.
// 3.  **Nested Sections**: analysis and rendering settings live in their own
//     structs, matching the `[analysis]` and `[render]` tables of the file.

use crate::core_modules::anomaly::DEFAULT_FIRE_THRESHOLD;
use crate::core_modules::window_buffer::DEFAULT_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DECIMATION: usize = 4;
pub const DEFAULT_PACING_MS: u64 = 1000;
pub const DEFAULT_OUTPUT_DIR: &str = "collages";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for a monitoring run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Number of frames kept in the sliding window.
    pub window_capacity: usize,
    /// Only every k-th raw record is admitted; the other k-1 are read and dropped.
    pub decimation: usize,
    /// A frame is anomalous when any reading is strictly above this value.
    pub fire_threshold: f64,
    /// Pause between cycles, in milliseconds.
    pub pacing_ms: u64,
    /// Where artifacts are written. Created if absent.
    pub output_dir: PathBuf,
    /// Fill the window silently before the first rendered cycle.
    pub prefill_window: bool,
    /// Keep the process alive after the source drains until interrupted.
    pub hold_on_drain: bool,
    pub analysis: AnalysisConfig,
    pub render: RenderConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            decimation: DEFAULT_DECIMATION,
            fire_threshold: DEFAULT_FIRE_THRESHOLD,
            pacing_ms: DEFAULT_PACING_MS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            prefill_window: false,
            hold_on_drain: false,
            analysis: AnalysisConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// When false, no request is made and every assessment is empty.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    /// Ignore the first element of the reply's summary array.
    pub drop_first_summary_item: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-vision-preview".to_string(),
            max_tokens: 300,
            api_key_env: "OPENAI_API_KEY".to_string(),
            drop_first_summary_item: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixels per grid cell in collage and dashboard panels.
    pub cell_size: u32,
    /// Pixels per grid cell in the newest-frame image.
    pub newest_cell_size: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cell_size: 12,
            newest_cell_size: 24,
        }
    }
}

impl MonitorConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::Invalid("window_capacity must be at least 1".into()));
        }
        if self.decimation == 0 {
            return Err(ConfigError::Invalid("decimation must be at least 1".into()));
        }
        if !self.fire_threshold.is_finite() {
            return Err(ConfigError::Invalid("fire_threshold must be a finite number".into()));
        }
        if self.render.cell_size == 0 || self.render.newest_cell_size == 0 {
            return Err(ConfigError::Invalid("render cell sizes must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn parse_config(text: &str, origin: &Path) -> Result<MonitorConfig, ConfigError> {
    let config: MonitorConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads a TOML config file; `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(MonitorConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, path)
}
