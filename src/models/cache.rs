//! Bounded cache of resident models with LRU eviction and strict memory
//! accounting.
//!
//! The cache is the only owner of [`LoadedModel`]s. Stages borrow a model for
//! the duration of one call through [`BorrowedModel`], whose lifetime is tied
//! to the cache borrow; retaining a handle past the call does not compile.
//!
//! Invariants, enforced *before* every insertion so they hold at every
//! observable point:
//! - sum of resident byte costs never exceeds the configured budget;
//! - at most `max_resident` entries coexist;
//! - at most one resident copy per model name.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryProbe;

use super::catalog::Catalog;
use super::compat::CompatibilityChecker;
use super::loader::{LoadError, LoadedModel, ModelLoader};

#[derive(Debug, Error)]
pub enum CacheError {
    /// The model cannot run here regardless of cache state.
    #[error("model incompatible: {0}")]
    Incompatible(String),

    /// Compatible in principle, but the cache budget cannot fit the model
    /// even after evicting every other entry. A configuration problem, not a
    /// model problem.
    #[error("cache budget of {budget} bytes cannot fit {name} ({footprint} bytes)")]
    InsufficientMemory { name: String, footprint: u64, budget: u64 },

    /// The loader collaborator failed; propagated verbatim.
    #[error("load failure: {0}")]
    LoadFailure(#[from] LoadError),
}

/// Cache sizing, fixed at construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of models resident at once (small, e.g. 1–3).
    pub max_resident: usize,
    /// Memory budget for all resident models, in bytes.
    pub budget_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_resident: 2, budget_bytes: 256 * 1024 }
    }
}

/// A resident model plus LRU bookkeeping.
struct CacheEntry {
    model: LoadedModel,
    /// Insertion order, breaks last-used ties (earliest inserted loses).
    inserted_seq: u64,
    /// Monotone access counter value at last use.
    last_used: u64,
}

/// Temporary, non-owning access to a cache-owned model.
///
/// Valid only while the cache borrow lives; a stage must not (and cannot)
/// keep it past its call.
pub struct BorrowedModel<'a> {
    model: &'a LoadedModel,
}

impl fmt::Debug for BorrowedModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedModel")
            .field("name", &self.model.name())
            .finish_non_exhaustive()
    }
}

impl Deref for BorrowedModel<'_> {
    type Target = LoadedModel;

    fn deref(&self) -> &LoadedModel {
        self.model
    }
}

/// Point-in-time view of cache occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    pub resident_bytes: u64,
    pub entry_count: usize,
    pub per_entry: Vec<EntryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub name: String,
    pub bytes: u64,
    pub last_used: u64,
}

/// Access counters, monotone over the cache lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded store of loaded models.
///
/// Single-threaded by design: `&mut self` encodes the run-to-completion
/// discipline, and the LRU bookkeeping is not safe under concurrent
/// mutation. Hosts sharing a cache across callers must serialize access
/// behind one lock (see `SharedPipeline`).
pub struct ModelCache {
    config: CacheConfig,
    catalog: Arc<Catalog>,
    checker: CompatibilityChecker,
    loader: Arc<dyn ModelLoader>,
    probe: Arc<dyn MemoryProbe>,
    entries: Vec<CacheEntry>,
    access_seq: u64,
    insert_seq: u64,
    stats: CacheStats,
}

impl ModelCache {
    pub fn new(
        config: CacheConfig,
        catalog: Arc<Catalog>,
        checker: CompatibilityChecker,
        loader: Arc<dyn ModelLoader>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self {
            config,
            catalog,
            checker,
            loader,
            probe,
            entries: Vec::new(),
            access_seq: 0,
            insert_seq: 0,
            stats: CacheStats::default(),
        }
    }

    /// Borrow a resident model, loading it on a miss.
    ///
    /// On a hit the entry's last-used counter is bumped. On a miss the model
    /// is checked against current free memory, entries are evicted
    /// oldest-LRU-first until both the count bound and the byte budget admit
    /// the new entry, and the loader collaborator is asked to construct it.
    pub fn get_or_load(&mut self, name: &str) -> Result<BorrowedModel<'_>, CacheError> {
        self.stats.accesses += 1;
        self.access_seq += 1;

        if let Some(idx) = self.entries.iter().position(|e| e.model.name() == name) {
            self.stats.hits += 1;
            self.entries[idx].last_used = self.access_seq;
            return Ok(BorrowedModel { model: &self.entries[idx].model });
        }

        self.stats.misses += 1;

        let descriptor = self
            .catalog
            .lookup(name)
            .ok_or_else(|| CacheError::Incompatible(format!("model '{name}' not in catalog")))?
            .clone();

        let free = self.probe.free_bytes();
        let compat = self.checker.check(&descriptor, free);
        if !compat.compatible {
            return Err(CacheError::Incompatible(compat.reason));
        }

        // Even a fully drained cache cannot hold a model larger than the
        // whole budget. Checked before any eviction happens.
        if descriptor.footprint_bytes > self.config.budget_bytes {
            return Err(CacheError::InsufficientMemory {
                name: descriptor.name.clone(),
                footprint: descriptor.footprint_bytes,
                budget: self.config.budget_bytes,
            });
        }

        while self.entries.len() >= self.config.max_resident
            || self.resident_bytes() + descriptor.footprint_bytes > self.config.budget_bytes
        {
            if !self.evict_lru() {
                // Cache already empty; cannot free more. Unreachable given
                // the budget check above, kept as a hard stop.
                return Err(CacheError::InsufficientMemory {
                    name: descriptor.name.clone(),
                    footprint: descriptor.footprint_bytes,
                    budget: self.config.budget_bytes,
                });
            }
        }

        let model = self.loader.load(&descriptor)?;
        tracing::debug!(
            model = %descriptor.name,
            resident_bytes = model.resident_bytes(),
            free_bytes = free,
            "model loaded into cache"
        );
        crate::telemetry::record_cache_load();

        self.insert_seq += 1;
        self.entries.push(CacheEntry {
            model,
            inserted_seq: self.insert_seq,
            last_used: self.access_seq,
        });
        crate::telemetry::record_resident_bytes(self.resident_bytes());

        // Just pushed, so the last entry is the new model.
        let idx = self.entries.len() - 1;
        Ok(BorrowedModel { model: &self.entries[idx].model })
    }

    /// Explicitly remove a model. No-op if absent. Used for manual memory
    /// pressure relief.
    pub fn unload(&mut self, name: &str) {
        if let Some(idx) = self.entries.iter().position(|e| e.model.name() == name) {
            let entry = self.entries.remove(idx);
            tracing::debug!(model = name, "model unloaded");
            self.loader.unload(entry.model);
            crate::telemetry::record_resident_bytes(self.resident_bytes());
        }
    }

    /// Evict the single least-recently-used entry, ties broken by earliest
    /// insertion. Returns false if the cache was empty.
    pub fn evict_lru(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.last_used, e.inserted_seq))
            .map(|(idx, _)| idx);

        let Some(idx) = victim else {
            return false;
        };

        let entry = self.entries.remove(idx);
        self.stats.evictions += 1;
        tracing::debug!(model = entry.model.name(), "model evicted");
        crate::telemetry::record_cache_eviction();
        self.loader.unload(entry.model);
        crate::telemetry::record_resident_bytes(self.resident_bytes());
        true
    }

    /// Sum of resident byte costs across all entries.
    pub fn resident_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.model.resident_bytes()).sum()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.model.name() == name)
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Occupancy report for telemetry and host diagnostics.
    pub fn memory_report(&self) -> MemoryReport {
        MemoryReport {
            resident_bytes: self.resident_bytes(),
            entry_count: self.entries.len(),
            per_entry: self
                .entries
                .iter()
                .map(|e| EntryReport {
                    name: e.model.name().to_string(),
                    bytes: e.model.resident_bytes(),
                    last_used: e.last_used,
                })
                .collect(),
        }
    }
}
