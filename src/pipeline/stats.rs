//! Running pipeline statistics.
//!
//! Monotone process-lifetime counters, reset only on explicit request. Held
//! by the orchestrator; nothing else mutates them.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time view of the running counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub total_processing_ms: f64,
    pub avg_processing_ms: f64,
    /// Largest single-call free-memory drop observed, in bytes.
    pub peak_memory_delta_bytes: i64,
}

#[derive(Debug, Default)]
pub struct RunningStats {
    total_calls: AtomicU64,
    total_processing_micros: AtomicU64,
    peak_memory_delta: AtomicI64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed call into the counters.
    pub fn record(&self, elapsed: Duration, memory_delta_bytes: i64) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        let mut current = self.peak_memory_delta.load(Ordering::Relaxed);
        while memory_delta_bytes > current {
            match self.peak_memory_delta.compare_exchange_weak(
                current,
                memory_delta_bytes,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let total_ms = self.total_processing_micros.load(Ordering::Relaxed) as f64 / 1000.0;
        StatsSnapshot {
            total_calls,
            total_processing_ms: total_ms,
            avg_processing_ms: if total_calls == 0 { 0.0 } else { total_ms / total_calls as f64 },
            peak_memory_delta_bytes: self.peak_memory_delta.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Explicit request only.
    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.total_processing_micros.store(0, Ordering::Relaxed);
        self.peak_memory_delta.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates() {
        let stats = RunningStats::new();
        stats.record(Duration::from_millis(4), 1_000);
        stats.record(Duration::from_millis(6), 3_000);

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 2);
        assert!((snap.total_processing_ms - 10.0).abs() < 0.01);
        assert!((snap.avg_processing_ms - 5.0).abs() < 0.01);
        assert_eq!(snap.peak_memory_delta_bytes, 3_000);
    }

    #[test]
    fn peak_is_monotone_until_reset() {
        let stats = RunningStats::new();
        stats.record(Duration::ZERO, 5_000);
        stats.record(Duration::ZERO, 2_000);
        assert_eq!(stats.snapshot().peak_memory_delta_bytes, 5_000);

        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 0);
        assert_eq!(snap.peak_memory_delta_bytes, 0);
        assert_eq!(snap.avg_processing_ms, 0.0);
    }

    #[test]
    fn negative_deltas_never_become_peak() {
        let stats = RunningStats::new();
        stats.record(Duration::ZERO, -4_000);
        assert_eq!(stats.snapshot().peak_memory_delta_bytes, 0);
    }
}
