//! Metric names and recording helpers over the `metrics` facade.
//!
//! The host decides where metrics go by installing a recorder; without one
//! these calls are no-ops, which keeps the silence fast path cheap.

/// Count of pipeline runs, labeled by terminal outcome.
pub const PIPELINE_RUNS: &str = "voxcore_pipeline_runs";
/// End-to-end pipeline call latency in milliseconds.
pub const PIPELINE_DURATION_MS: &str = "voxcore_pipeline_duration_ms";
/// Count of models constructed by the loader collaborator.
pub const CACHE_LOADS: &str = "voxcore_cache_loads";
/// Count of LRU evictions.
pub const CACHE_EVICTIONS: &str = "voxcore_cache_evictions";
/// Bytes currently charged against the cache budget.
pub const CACHE_RESIDENT_BYTES: &str = "voxcore_cache_resident_bytes";

pub fn record_pipeline_run(outcome: &'static str, duration_ms: f64) {
    metrics::counter!(PIPELINE_RUNS, "outcome" => outcome).increment(1);
    metrics::histogram!(PIPELINE_DURATION_MS).record(duration_ms);
}

pub fn record_cache_load() {
    metrics::counter!(CACHE_LOADS).increment(1);
}

pub fn record_cache_eviction() {
    metrics::counter!(CACHE_EVICTIONS).increment(1);
}

pub fn record_resident_bytes(bytes: u64) {
    metrics::gauge!(CACHE_RESIDENT_BYTES).set(bytes as f64);
}
