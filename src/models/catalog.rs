//! Model catalog: descriptors for every model the device knows about.
//!
//! The catalog is a read-only, insertion-ordered table built once at startup.
//! Descriptors declare resource costs only; the pipeline treats the model
//! itself as an opaque scorer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a model can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WakeWord,
    Classification,
    LanguageModel,
    AudioClassification,
}

/// Coarse performance tier hint declared by the model author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Low,
    Medium,
    High,
}

/// Immutable description of one candidate model.
///
/// Created at catalog-build time and never mutated. `footprint_bytes` is the
/// declared static cost as loaded; runtime scratch overhead is accounted for
/// separately by the compatibility checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique name, e.g. "wake-word-tiny".
    pub name: String,
    /// Static memory cost of the loaded model in bytes.
    pub footprint_bytes: u64,
    /// Minimum free memory required to run at all, in bytes.
    pub min_memory_bytes: u64,
    /// Capability tag.
    pub capability: Capability,
    /// Declared performance-tier hint.
    pub tier: PerformanceTier,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate model name: {0}")]
    DuplicateName(String),

    #[error("descriptor for {0} has empty name")]
    EmptyName(String),

    #[error("invalid catalog file: {0}")]
    InvalidFile(String),
}

/// Serialized form of a catalog file.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    model: Vec<ModelDescriptor>,
}

/// Read-only table of model descriptors, keyed by name.
///
/// Iteration order is insertion order; classification tie-breaking and
/// recommendation output depend on it being stable.
#[derive(Debug, Clone)]
pub struct Catalog {
    descriptors: Vec<ModelDescriptor>,
}

impl Catalog {
    /// Build a catalog from descriptors, rejecting duplicates.
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Result<Self, CatalogError> {
        for (i, d) in descriptors.iter().enumerate() {
            if d.name.is_empty() {
                return Err(CatalogError::EmptyName(format!("index {i}")));
            }
            if descriptors[..i].iter().any(|prev| prev.name == d.name) {
                return Err(CatalogError::DuplicateName(d.name.clone()));
            }
        }
        Ok(Self { descriptors })
    }

    /// Parse a catalog from a TOML document with `[[model]]` tables.
    pub fn from_toml(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(text).map_err(|e| CatalogError::InvalidFile(e.to_string()))?;
        Self::new(file.model)
    }

    /// The built-in catalog of on-device models.
    pub fn builtin() -> Self {
        let kb = |n: u64| n * 1024;
        Self {
            descriptors: vec![
                ModelDescriptor {
                    name: "wake-word-tiny".into(),
                    footprint_bytes: kb(8),
                    min_memory_bytes: kb(20),
                    capability: Capability::WakeWord,
                    tier: PerformanceTier::Low,
                },
                ModelDescriptor {
                    name: "command-classifier".into(),
                    footprint_bytes: kb(45),
                    min_memory_bytes: kb(80),
                    capability: Capability::Classification,
                    tier: PerformanceTier::Medium,
                },
                ModelDescriptor {
                    name: "tinyllama-pico".into(),
                    footprint_bytes: kb(200),
                    min_memory_bytes: kb(220),
                    capability: Capability::LanguageModel,
                    tier: PerformanceTier::High,
                },
                ModelDescriptor {
                    name: "microllama".into(),
                    footprint_bytes: kb(80),
                    min_memory_bytes: kb(120),
                    capability: Capability::LanguageModel,
                    tier: PerformanceTier::Medium,
                },
                ModelDescriptor {
                    name: "vad-micro".into(),
                    footprint_bytes: kb(15),
                    min_memory_bytes: kb(30),
                    capability: Capability::AudioClassification,
                    tier: PerformanceTier::Low,
                },
            ],
        }
    }

    /// Look up a descriptor by name.
    pub fn lookup(&self, name: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// All descriptors in insertion order.
    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    /// First descriptor carrying the given capability, in catalog order.
    pub fn first_with_capability(&self, cap: Capability) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.capability == cap)
    }

    /// Smallest minimum-memory requirement across the catalog.
    ///
    /// Used by startup validation: a cache budget below this value can never
    /// hold any model.
    pub fn smallest_footprint(&self) -> Option<u64> {
        self.descriptors.iter().map(|d| d.footprint_bytes).min()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
