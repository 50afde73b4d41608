//! Model lifecycle: catalog, compatibility, loading, and the bounded cache.

pub mod cache;
pub mod catalog;
pub mod compat;
pub mod loader;

pub use cache::{BorrowedModel, CacheConfig, CacheError, CacheStats, MemoryReport, ModelCache};
pub use catalog::{Capability, Catalog, CatalogError, ModelDescriptor, PerformanceTier};
pub use compat::{
    recommended_models, CompatibilityChecker, CompatibilityResult, PerformanceImpact, RankedModel,
};
pub use loader::{
    write_synthetic_weights, FileLoader, LoadError, LoadedModel, ModelHandle, ModelLoader,
    ModelScorer, SyntheticLoader,
};
