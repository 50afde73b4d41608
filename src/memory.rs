//! Free-memory probing for load decisions.
//!
//! The cache and compatibility checker query a [`MemoryProbe`] before every
//! load decision. Probes must be cheap and side-effect free; results are
//! never cached because free memory changes between calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reports the amount of free memory available for model residency.
pub trait MemoryProbe {
    /// Current free memory in bytes.
    fn free_bytes(&self) -> u64;
}

/// Probe backed by an explicitly set value.
///
/// Used by tests and by hosts that track free memory themselves (e.g. an
/// allocator watermark on an MCU). Cloning shares the underlying value.
#[derive(Clone, Default)]
pub struct FixedProbe {
    free: Arc<AtomicU64>,
}

impl FixedProbe {
    pub fn new(free_bytes: u64) -> Self {
        Self { free: Arc::new(AtomicU64::new(free_bytes)) }
    }

    /// Update the reported free memory.
    pub fn set(&self, free_bytes: u64) {
        self.free.store(free_bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedProbe {
    fn free_bytes(&self) -> u64 {
        self.free.load(Ordering::SeqCst)
    }
}
