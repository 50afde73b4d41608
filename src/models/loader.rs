//! Model loading: the collaborator boundary between the cache and whatever
//! actually materializes model weights.
//!
//! The core never interprets weight formats; a loaded model is an opaque
//! scorer plus a declared resident cost. Two loaders are provided: a
//! memory-mapped file loader with optional SHA-256 verification, and a
//! synthetic in-memory loader for tests and board bring-up.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use memmap2::Mmap;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::catalog::{Capability, ModelDescriptor};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),

    #[error("hash mismatch for model {name}: expected {expected}, got {actual}")]
    HashMismatch { name: String, expected: String, actual: String },

    #[error("invalid model data: {0}")]
    InvalidFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unique identity of one loaded model instance.
///
/// A fresh load always gets a fresh handle, so callers can distinguish a
/// cache hit from a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(u64);

impl ModelHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Opaque scorer over a fixed-length feature vector.
///
/// `score` returns one value per output class, each in [0, 1]. Wake-word
/// models expose a single class; classifiers expose one per command row in
/// their weight table. Scoring must be deterministic for identical input.
pub trait ModelScorer: Send {
    fn num_classes(&self) -> usize;
    fn score(&self, features: &[f32]) -> Vec<f32>;
}

/// A resident model: weights plus scratch, owned by the cache once created.
///
/// No component other than the cache may hold one of these longer than a
/// single stage call.
pub struct LoadedModel {
    handle: ModelHandle,
    name: String,
    resident_bytes: u64,
    scorer: Box<dyn ModelScorer>,
}

impl LoadedModel {
    pub fn new(
        handle: ModelHandle,
        name: String,
        resident_bytes: u64,
        scorer: Box<dyn ModelScorer>,
    ) -> Self {
        Self { handle, name, resident_bytes, scorer }
    }

    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared resident cost charged against the cache budget.
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    pub fn scorer(&self) -> &dyn ModelScorer {
        self.scorer.as_ref()
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("resident_bytes", &self.resident_bytes)
            .finish()
    }
}

/// Materializes models from descriptors. Potentially slow; called only on
/// cache misses.
pub trait ModelLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError>;

    /// Release a model's resources. The default drops the handle, which is
    /// sufficient for heap- and mmap-backed weights.
    fn unload(&self, model: LoadedModel) {
        drop(model);
    }
}

/// Weight storage behind a quantized scorer.
enum WeightSource {
    Mapped(Mmap),
    Heap(Vec<u8>),
}

impl WeightSource {
    fn as_bytes(&self) -> &[u8] {
        match self {
            WeightSource::Mapped(mmap) => mmap,
            WeightSource::Heap(buf) => buf,
        }
    }
}

/// Linear scorer over signed 8-bit quantized weights.
///
/// The weight blob is read as rows of `feature_len` i8 values, one row per
/// output class. Class score is the mean weighted feature mapped into [0, 1].
/// No allocation proportional to the weight size happens at score time.
pub struct QuantizedScorer {
    weights: WeightSource,
    feature_len: usize,
    num_classes: usize,
}

impl QuantizedScorer {
    fn new(
        weights: WeightSource,
        feature_len: usize,
        capability: Capability,
    ) -> Result<Self, LoadError> {
        let len = weights.as_bytes().len();
        if len < feature_len {
            return Err(LoadError::InvalidFormat(format!(
                "weight blob of {len} bytes is smaller than one row of {feature_len}"
            )));
        }
        let num_classes = match capability {
            Capability::WakeWord | Capability::AudioClassification => 1,
            Capability::Classification | Capability::LanguageModel => len / feature_len,
        };
        Ok(Self { weights, feature_len, num_classes })
    }
}

impl ModelScorer for QuantizedScorer {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn score(&self, features: &[f32]) -> Vec<f32> {
        let bytes = self.weights.as_bytes();
        let n = self.feature_len.min(features.len());
        let mut scores = Vec::with_capacity(self.num_classes);
        for class in 0..self.num_classes {
            let row = &bytes[class * self.feature_len..(class + 1) * self.feature_len];
            let mut dot = 0.0f32;
            for i in 0..n {
                let w = row[i] as i8 as f32 / 128.0;
                dot += w * features[i];
            }
            // dot/n lies in [-1, 1] for features in [0, 1]; remap to [0, 1].
            let score = ((dot / n.max(1) as f32) + 1.0) / 2.0;
            scores.push(score.clamp(0.0, 1.0));
        }
        scores
    }
}

/// Loads model weights by memory-mapping files under a base directory.
///
/// Files are looked up as `<base>/<name>.bin`. When an expected SHA-256 hash
/// is registered for a model, the mapped contents are verified before the
/// model is handed out.
pub struct FileLoader {
    base_dir: PathBuf,
    feature_len: usize,
    expected_hashes: HashMap<String, String>,
    next_id: AtomicU64,
}

impl FileLoader {
    pub fn new(base_dir: impl Into<PathBuf>, feature_len: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            feature_len,
            expected_hashes: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an expected SHA-256 hex digest for a model name.
    pub fn expect_hash(&mut self, name: impl Into<String>, sha256_hex: impl Into<String>) {
        self.expected_hashes.insert(name.into(), sha256_hex.into());
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.bin"))
    }

    fn verify_hash(&self, name: &str, bytes: &[u8]) -> Result<(), LoadError> {
        let Some(expected) = self.expected_hashes.get(name) else {
            return Ok(());
        };
        let actual = hex::encode(Sha256::digest(bytes));
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(LoadError::HashMismatch {
                name: name.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl ModelLoader for FileLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError> {
        let path = self.model_path(&descriptor.name);
        if !path.exists() {
            return Err(LoadError::NotFound(path));
        }

        let file = File::open(&path)?;
        // SAFETY: read-only mapping; model files are immutable while resident.
        let mmap = unsafe { Mmap::map(&file)? };

        self.verify_hash(&descriptor.name, &mmap)?;

        if mmap.len() as u64 > descriptor.footprint_bytes {
            return Err(LoadError::InvalidFormat(format!(
                "{} is {} bytes on disk but declares a footprint of {}",
                descriptor.name,
                mmap.len(),
                descriptor.footprint_bytes
            )));
        }

        let scorer = QuantizedScorer::new(
            WeightSource::Mapped(mmap),
            self.feature_len,
            descriptor.capability,
        )?;

        tracing::info!(model = %descriptor.name, path = %path.display(), "model mapped");

        Ok(LoadedModel::new(
            ModelHandle(self.next_id.fetch_add(1, Ordering::SeqCst)),
            descriptor.name.clone(),
            descriptor.footprint_bytes,
            Box::new(scorer),
        ))
    }
}

/// Generates deterministic synthetic weights in memory.
///
/// Used by tests and board bring-up before real weight files are flashed.
/// Weight bytes are a pure function of the model name and the loader seed,
/// so identical inputs always score identically. Loads are counted, which
/// lets tests prove cache hits versus fresh loads.
pub struct SyntheticLoader {
    seed: u64,
    feature_len: usize,
    next_id: AtomicU64,
    load_count: AtomicUsize,
    unload_count: AtomicUsize,
}

impl SyntheticLoader {
    pub fn new(seed: u64, feature_len: usize) -> Self {
        Self {
            seed,
            feature_len,
            next_id: AtomicU64::new(1),
            load_count: AtomicUsize::new(0),
            unload_count: AtomicUsize::new(0),
        }
    }

    /// Number of `load` calls served so far.
    pub fn loads(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Number of models explicitly unloaded.
    pub fn unloads(&self) -> usize {
        self.unload_count.load(Ordering::SeqCst)
    }

    fn synth_weights(&self, name: &str, len: usize) -> Vec<u8> {
        // Cheap deterministic byte stream (FNV-style mix of seed and name).
        let mut state = self.seed ^ 0xcbf2_9ce4_8422_2325;
        for b in name.bytes() {
            state = (state ^ b as u64).wrapping_mul(0x0100_0000_01b3);
        }
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(i as u64);
            out.push((state >> 33) as u8);
        }
        out
    }
}

impl ModelLoader for SyntheticLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<LoadedModel, LoadError> {
        self.load_count.fetch_add(1, Ordering::SeqCst);

        let weights = self.synth_weights(&descriptor.name, descriptor.footprint_bytes as usize);
        let scorer = QuantizedScorer::new(
            WeightSource::Heap(weights),
            self.feature_len,
            descriptor.capability,
        )?;

        Ok(LoadedModel::new(
            ModelHandle(self.next_id.fetch_add(1, Ordering::SeqCst)),
            descriptor.name.clone(),
            descriptor.footprint_bytes,
            Box::new(scorer),
        ))
    }

    fn unload(&self, model: LoadedModel) {
        self.unload_count.fetch_add(1, Ordering::SeqCst);
        drop(model);
    }
}

/// Write a synthetic weight file for a descriptor, for tests and demos.
pub fn write_synthetic_weights(
    dir: &Path,
    descriptor: &ModelDescriptor,
    seed: u64,
) -> std::io::Result<PathBuf> {
    let loader = SyntheticLoader::new(seed, 1);
    let bytes = loader.synth_weights(&descriptor.name, descriptor.footprint_bytes as usize);
    let path = dir.join(format!("{}.bin", descriptor.name));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::Catalog;

    const FEATURE_LEN: usize = 10;

    #[test]
    fn synthetic_loader_is_deterministic() {
        let catalog = Catalog::builtin();
        let descriptor = catalog.lookup("wake-word-tiny").unwrap();
        let loader = SyntheticLoader::new(7, FEATURE_LEN);

        let a = loader.load(descriptor).unwrap();
        let b = loader.load(descriptor).unwrap();
        let features = vec![0.5f32; FEATURE_LEN];
        assert_eq!(a.scorer().score(&features), b.scorer().score(&features));
        assert_ne!(a.handle(), b.handle(), "each load is a distinct instance");
        assert_eq!(loader.loads(), 2);
    }

    #[test]
    fn scorer_output_is_bounded() {
        let catalog = Catalog::builtin();
        let descriptor = catalog.lookup("command-classifier").unwrap();
        let loader = SyntheticLoader::new(1, FEATURE_LEN);
        let model = loader.load(descriptor).unwrap();

        let features = vec![1.0f32; FEATURE_LEN];
        let scores = model.scorer().score(&features);
        assert!(model.scorer().num_classes() > 1);
        for s in scores {
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn file_loader_maps_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin();
        let descriptor = catalog.lookup("wake-word-tiny").unwrap();
        write_synthetic_weights(dir.path(), descriptor, 3).unwrap();

        let loader = FileLoader::new(dir.path(), FEATURE_LEN);
        let model = loader.load(descriptor).unwrap();
        assert_eq!(model.name(), "wake-word-tiny");
        assert_eq!(model.resident_bytes(), descriptor.footprint_bytes);
    }

    #[test]
    fn file_loader_rejects_bad_hash() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin();
        let descriptor = catalog.lookup("wake-word-tiny").unwrap();
        write_synthetic_weights(dir.path(), descriptor, 3).unwrap();

        let mut loader = FileLoader::new(dir.path(), FEATURE_LEN);
        loader.expect_hash("wake-word-tiny", "00".repeat(32));
        let err = loader.load(descriptor).unwrap_err();
        assert!(matches!(err, LoadError::HashMismatch { .. }));
    }

    #[test]
    fn file_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin();
        let loader = FileLoader::new(dir.path(), FEATURE_LEN);
        let err = loader.load(catalog.lookup("microllama").unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
