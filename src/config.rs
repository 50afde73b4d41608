//! Runtime configuration from a TOML file plus `VOXCORE_*` env overrides.
//!
//! Layering: built-in defaults, then the optional TOML file, then environment
//! variables. Invalid env values fall back to the layered value without
//! crashing; out-of-range values are floored or clamped. Fatal combinations
//! (a cache budget no catalog model fits under, an empty command table) are
//! rejected by [`RuntimeConfig::validate`] before anything is constructed.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `VOXCORE_CACHE_MAX_RESIDENT` | 2 | Max models resident at once |
//! | `VOXCORE_CACHE_BUDGET_BYTES` | 262144 | Cache memory budget (bytes) |
//! | `VOXCORE_MAX_MODEL_BYTES` | 262144 | Largest loadable model (bytes) |
//! | `VOXCORE_OVERHEAD_FACTOR` | 2.0 | Inference scratch multiplier |
//! | `VOXCORE_VAD_NOISE_FLOOR_DB` | -55.0 | Silence threshold (dBFS) |
//! | `VOXCORE_VAD_MIN_CONFIDENCE` | 0.3 | Min confidence to call voiced |
//! | `VOXCORE_WAKE_THRESHOLD` | 0.6 | Wake-word detection threshold |
//! | `VOXCORE_CLASSIFY_THRESHOLD` | 0.55 | Command acceptance threshold |
//! | `VOXCORE_CATALOG_PATH` | (builtin) | TOML model catalog file |
//! | `VOXCORE_WEIGHTS_DIR` | (none) | Directory of `<name>.bin` weights |
//! | `VOXCORE_LOG_LEVEL` | info | Tracing filter directive |
//! | `VOXCORE_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CacheConfig, Catalog};
use crate::pipeline::PipelineConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// Configuration that cannot be loaded or describes a system that cannot run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog error: {0}")]
    Catalog(#[from] crate::models::CatalogError),
    /// A value combination the pipeline cannot operate under.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Memory-compatibility knobs, a section of [`RuntimeConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Inference scratch space as a multiple of the model footprint.
    pub overhead_factor: f64,
    /// Hard ceiling on a single model's footprint, in bytes.
    pub max_model_bytes: u64,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self { overhead_factor: 2.0, max_model_bytes: 256 * 1024 }
    }
}

/// Full runtime configuration; the input to [`crate::Pipeline::from_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// TOML catalog file; the built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Directory holding `<name>.bin` weight files; synthetic weights when
    /// unset.
    pub weights_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub compat: CompatConfig,
    pub pipeline: PipelineConfig,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            weights_dir: None,
            cache: CacheConfig::default(),
            compat: CompatConfig::default(),
            pipeline: PipelineConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `f64` env var, returning `default` on missing, invalid, or
/// non-finite.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => match val.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Parse an `f32` env var, returning `default` on missing, invalid, or
/// non-finite.
fn parse_f32(key: &str, default: f32) -> f32 {
    match std::env::var(key) {
        Ok(val) => match val.parse::<f32>() {
            Ok(v) if v.is_finite() => v,
            _ => default,
        },
        Err(_) => default,
    }
}

fn parse_path(key: &str, default: Option<PathBuf>) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => Some(PathBuf::from(val)),
        _ => default,
    }
}

impl RuntimeConfig {
    /// Load from a TOML string, before env overrides.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load defaults, then the TOML file at `path` (when given), then env.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_toml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay `VOXCORE_*` environment variables. Floors and clamps keep
    /// every knob in its operating range.
    pub fn apply_env(&mut self) {
        let max_resident = parse_usize("VOXCORE_CACHE_MAX_RESIDENT", self.cache.max_resident);
        self.cache.max_resident = max_resident.max(1);
        self.cache.budget_bytes = parse_u64("VOXCORE_CACHE_BUDGET_BYTES", self.cache.budget_bytes);

        self.compat.max_model_bytes =
            parse_u64("VOXCORE_MAX_MODEL_BYTES", self.compat.max_model_bytes);
        let overhead = parse_f64("VOXCORE_OVERHEAD_FACTOR", self.compat.overhead_factor);
        self.compat.overhead_factor = overhead.max(1.0);

        self.pipeline.vad.noise_floor_db =
            parse_f32("VOXCORE_VAD_NOISE_FLOOR_DB", self.pipeline.vad.noise_floor_db);
        let min_conf =
            parse_f32("VOXCORE_VAD_MIN_CONFIDENCE", self.pipeline.vad.min_confidence);
        self.pipeline.vad.min_confidence = min_conf.clamp(0.0, 1.0);
        let wake = parse_f32("VOXCORE_WAKE_THRESHOLD", self.pipeline.wake.threshold);
        self.pipeline.wake.threshold = wake.clamp(0.0, 1.0);
        let classify =
            parse_f32("VOXCORE_CLASSIFY_THRESHOLD", self.pipeline.classify.acceptance_threshold);
        self.pipeline.classify.acceptance_threshold = classify.clamp(0.0, 1.0);

        self.catalog_path = parse_path("VOXCORE_CATALOG_PATH", self.catalog_path.take());
        self.weights_dir = parse_path("VOXCORE_WEIGHTS_DIR", self.weights_dir.take());

        if let Ok(level) = std::env::var("VOXCORE_LOG_LEVEL") {
            if !level.is_empty() {
                self.log.level = level;
            }
        }
        if let Ok(format) = std::env::var("VOXCORE_LOG_FORMAT") {
            match format.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    /// Reject configurations the pipeline cannot run under. Called at
    /// startup, before any model is loaded.
    pub fn validate(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        if catalog.is_empty() {
            return Err(ConfigError::Invalid("catalog has no models".to_string()));
        }
        // At least one model must fit the budget, or every call fails.
        if let Some(smallest) = catalog.smallest_footprint() {
            if self.cache.budget_bytes < smallest {
                return Err(ConfigError::Invalid(format!(
                    "cache budget {}B is smaller than every catalog model (smallest {}B)",
                    self.cache.budget_bytes, smallest
                )));
            }
        }
        if self.pipeline.classify.commands.is_empty() {
            return Err(ConfigError::Invalid("command table is empty".to_string()));
        }
        if self.pipeline.vad.span_db <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "vad span_db must be positive, got {}",
                self.pipeline.vad.span_db
            )));
        }
        Ok(())
    }
}
