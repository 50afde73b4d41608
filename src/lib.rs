//! voxcore — an offline voice-command pipeline for memory-constrained
//! devices.
//!
//! Audio buffers pass through four stages, cheapest first: voice activity
//! detection, wake-word detection, command classification, and response
//! lookup. Each stage can short-circuit, so silence costs almost nothing and
//! never touches a model. Models are borrowed from a bounded LRU cache that
//! enforces a byte budget and a resident-count cap against a live memory
//! probe.
//!
//! # Design constraints
//!
//! - **Offline**: no network surface; weights come from local files or a
//!   deterministic synthetic loader.
//! - **Bounded**: resident model bytes never exceed the configured budget,
//!   checked before every load.
//! - **Run-to-completion**: one call processes one buffer on the calling
//!   thread; hosts with multiple channels wrap a [`SharedPipeline`].

pub mod config;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod telemetry;

use std::sync::Arc;

use parking_lot::Mutex;

use config::{ConfigError, RuntimeConfig};
use memory::MemoryProbe;
use models::{Catalog, CompatibilityChecker, FileLoader, ModelCache, ModelLoader, SyntheticLoader};
use pipeline::{Orchestrator, PipelineResult, StatsSnapshot, FEATURE_LEN};

/// Seed for the synthetic loader when no weights directory is configured.
const SYNTHETIC_SEED: u64 = 7;

/// The assembled pipeline: catalog, cache, and stages wired from one
/// [`RuntimeConfig`].
///
/// `process` takes `&mut self`; a `Pipeline` serves one caller at a time.
pub struct Pipeline {
    inner: Orchestrator,
}

impl Pipeline {
    /// Build from configuration, picking collaborators from it: the TOML
    /// catalog file or the built-in catalog, and the file loader or the
    /// synthetic loader. Fails fast on configurations that cannot serve.
    pub fn from_config(
        config: RuntimeConfig,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self, ConfigError> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::from_toml(&std::fs::read_to_string(path)?)?,
            None => Catalog::builtin(),
        };
        let loader: Arc<dyn ModelLoader> = match &config.weights_dir {
            Some(dir) => Arc::new(FileLoader::new(dir.clone(), FEATURE_LEN)),
            None => Arc::new(SyntheticLoader::new(SYNTHETIC_SEED, FEATURE_LEN)),
        };
        Self::with_collaborators(config, catalog, loader, probe)
    }

    /// Build with explicit catalog and loader collaborators.
    pub fn with_collaborators(
        config: RuntimeConfig,
        catalog: Catalog,
        loader: Arc<dyn ModelLoader>,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self, ConfigError> {
        config.validate(&catalog)?;
        let checker =
            CompatibilityChecker::new(config.compat.overhead_factor, config.compat.max_model_bytes);
        let cache =
            ModelCache::new(config.cache, Arc::new(catalog), checker, loader, probe.clone());
        Ok(Self { inner: Orchestrator::new(config.pipeline, cache, probe) })
    }

    /// Process one audio buffer to a terminal result.
    pub fn process(&mut self, samples: &[i16]) -> PipelineResult {
        self.inner.run(samples)
    }

    /// Snapshot of running latency and memory statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats()
    }

    pub fn reset_stats(&self) {
        self.inner.reset_stats()
    }

    /// The model cache, for reporting and manual unloads.
    pub fn cache(&self) -> &ModelCache {
        self.inner.cache()
    }

    pub fn cache_mut(&mut self) -> &mut ModelCache {
        self.inner.cache_mut()
    }

    /// Wrap in a mutex for hosts feeding audio from more than one channel.
    pub fn into_shared(self) -> SharedPipeline {
        SharedPipeline { inner: Arc::new(Mutex::new(self)) }
    }
}

/// A cloneable handle serializing calls onto one [`Pipeline`].
///
/// Calls run to completion under the lock, preserving the single-caller
/// cache discipline; channels contend rather than interleave.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<Pipeline>>,
}

impl SharedPipeline {
    pub fn process(&self, samples: &[i16]) -> PipelineResult {
        self.inner.lock().process(samples)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::FixedProbe;
    use pipeline::PipelineOutcome;

    fn probe() -> Arc<dyn MemoryProbe> {
        Arc::new(FixedProbe::new(512 * 1024))
    }

    #[test]
    fn test_pipeline_from_default_config() {
        let mut pipeline = Pipeline::from_config(RuntimeConfig::default(), probe()).unwrap();
        let result = pipeline.process(&[0i16; 512]);
        assert!(matches!(result.outcome, PipelineOutcome::NoVoice));
        assert_eq!(pipeline.stats().total_calls, 1);
    }

    #[test]
    fn test_from_config_rejects_bad_budget() {
        let mut config = RuntimeConfig::default();
        config.cache.budget_bytes = 1024; // below every builtin model
        assert!(Pipeline::from_config(config, probe()).is_err());
    }

    #[test]
    fn test_shared_pipeline_clones_share_state() {
        let pipeline = Pipeline::from_config(RuntimeConfig::default(), probe()).unwrap();
        let shared = pipeline.into_shared();
        let other = shared.clone();
        shared.process(&[0i16; 256]);
        other.process(&[0i16; 256]);
        assert_eq!(shared.stats().total_calls, 2);
    }
}
