//! Telemetry: structured logging setup and metric helpers.
//!
//! All output is local (stderr, file, or an in-process metrics recorder);
//! the core has no network surface.

mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_cache_eviction, record_cache_load, record_pipeline_run, record_resident_bytes,
};
