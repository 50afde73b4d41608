//! Staged inference pipeline: VAD → wake word → classification → response.

pub mod classify;
pub mod features;
pub mod orchestrator;
pub mod respond;
pub mod stage;
pub mod stats;
pub mod vad;
pub mod wake;

pub use classify::{ClassifyConfig, ClassifyStage, ClassifyVerdict, DEFAULT_COMMANDS};
pub use features::{FeatureExtractor, FeatureVector, SpectralFeatures, FEATURE_LEN};
pub use orchestrator::{
    Orchestrator, PipelineConfig, PipelineErrorKind, PipelineOutcome, PipelineResult,
};
pub use respond::{ResponseConfig, ResponseStage, ResponseVerdict, UNHANDLED_RESPONSE};
pub use stage::{StageKind, StageRecord};
pub use stats::{RunningStats, StatsSnapshot};
pub use vad::{VadConfig, VadStage, VadVerdict};
pub use wake::{WakeConfig, WakeStage, WakeVerdict};
