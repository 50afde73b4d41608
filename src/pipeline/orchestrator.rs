//! Sequential, short-circuiting pipeline orchestration.
//!
//! One call threads one audio buffer through VAD → wake-word →
//! classification → response. The silence path is the dominant fast path: it
//! never touches the model cache. Cache errors terminate the call with an
//! error outcome instead of aborting the caller's loop; the orchestrator
//! never retries and never substitutes a different model on its own.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryProbe;
use crate::models::{CacheError, ModelCache};

use super::classify::{ClassifyConfig, ClassifyStage};
use super::features::{FeatureExtractor, FeatureVector, SpectralFeatures};
use super::respond::{ResponseConfig, ResponseStage};
use super::stage::{PendingStage, StageKind, StageRecord, StageTimer};
use super::stats::{RunningStats, StatsSnapshot};
use super::vad::{VadConfig, VadStage};
use super::wake::{WakeConfig, WakeStage};

/// Why a call ended with an error outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorKind {
    /// Model cannot run here; a configuration or hardware change is needed.
    Incompatible,
    /// Transient: may succeed once memory frees up or the budget is raised.
    InsufficientMemory,
    /// Loader collaborator failure, not retriable within the same call.
    LoadFailure,
}

impl From<&CacheError> for PipelineErrorKind {
    fn from(err: &CacheError) -> Self {
        match err {
            CacheError::Incompatible(_) => PipelineErrorKind::Incompatible,
            CacheError::InsufficientMemory { .. } => PipelineErrorKind::InsufficientMemory,
            CacheError::LoadFailure(_) => PipelineErrorKind::LoadFailure,
        }
    }
}

/// Terminal outcome of one pipeline call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// VAD found no voice; nothing else ran.
    NoVoice,
    /// Voice present but the wake phrase was not detected.
    NoWakeWord,
    /// Wake phrase confirmed but no command cleared the acceptance
    /// threshold. Guessing is worse than admitting uncertainty.
    WakeWordOnly,
    /// A command was recognized and resolved to a response.
    Command { command: String, response: String },
    /// A stage failed to obtain its model.
    Error { error: PipelineErrorKind, message: String },
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::NoVoice => "no_voice",
            PipelineOutcome::NoWakeWord => "no_wake_word",
            PipelineOutcome::WakeWordOnly => "wake_word_only",
            PipelineOutcome::Command { .. } => "command",
            PipelineOutcome::Error { .. } => "error",
        }
    }
}

/// Everything the caller learns from one buffer. Created fresh per call.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub outcome: PipelineOutcome,
    pub confidence: f32,
    /// Timing and memory delta for every stage that ran, in order.
    pub stages: Vec<StageRecord>,
    /// Name of the model used by the terminal stage, if any was borrowed.
    pub terminal_model: Option<String>,
}

/// Stage wiring and thresholds for one orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vad: VadConfig,
    pub wake: WakeConfig,
    pub classify: ClassifyConfig,
    pub response: ResponseConfig,
}

/// Owns the cache and the stages; one instance per logical caller.
///
/// `run` takes `&mut self`: calls are run-to-completion and never overlap on
/// the same instance. Hosts wanting concurrent channels use one orchestrator
/// per channel or wrap one in [`crate::SharedPipeline`].
pub struct Orchestrator {
    cache: ModelCache,
    probe: Arc<dyn MemoryProbe>,
    extractor: Box<dyn FeatureExtractor>,
    vad: VadStage,
    wake: WakeStage,
    classify: ClassifyStage,
    respond: ResponseStage,
    stats: RunningStats,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, cache: ModelCache, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            cache,
            probe,
            extractor: Box::new(SpectralFeatures),
            vad: VadStage::new(config.vad),
            wake: WakeStage::new(config.wake),
            classify: ClassifyStage::new(config.classify),
            respond: ResponseStage::new(config.response),
            stats: RunningStats::new(),
        }
    }

    /// Swap in a custom feature extractor collaborator.
    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Process one audio buffer to a terminal result.
    pub fn run(&mut self, samples: &[i16]) -> PipelineResult {
        let span = tracing::debug_span!("pipeline_run", samples = samples.len());
        let _guard = span.enter();
        let started = Instant::now();
        let mut stages: Vec<StageRecord> = Vec::with_capacity(4);

        let result = self.run_stages(samples, &mut stages);

        let elapsed = started.elapsed();
        let peak_delta = stages.iter().map(|s| s.memory_delta_bytes).max().unwrap_or(0);
        self.stats.record(elapsed, peak_delta);

        crate::telemetry::record_pipeline_run(
            result.outcome.label(),
            elapsed.as_secs_f64() * 1000.0,
        );

        tracing::debug!(
            outcome = result.outcome.label(),
            confidence = result.confidence,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "pipeline call finished"
        );

        PipelineResult { stages, ..result }
    }

    fn run_stages(&mut self, samples: &[i16], stages: &mut Vec<StageRecord>) -> PipelineResult {
        // Stage 1: VAD. Pure statistics, zero cache interaction.
        let timer = StageTimer::start(StageKind::VoiceActivity, self.probe.as_ref());
        let call = PendingStage::new(StageKind::VoiceActivity);
        let verdict = self.vad.evaluate(samples);
        let (_, vad, voiced) = call.score(verdict).resolve(verdict.voice_present).finish();
        stages.push(timer.stop(self.probe.as_ref()));

        if !voiced {
            return PipelineResult {
                outcome: PipelineOutcome::NoVoice,
                confidence: vad.confidence,
                stages: Vec::new(),
                terminal_model: None,
            };
        }

        let features = self.extractor.extract(samples);

        // Stage 2: wake word, borrowing through the cache.
        let timer = StageTimer::start(StageKind::WakeWord, self.probe.as_ref());
        let call = PendingStage::new(StageKind::WakeWord);
        let wake_model = self.wake.model_name().to_string();
        let verdict = match self.borrow_and_score_wake(&features) {
            Ok(v) => v,
            Err(e) => {
                stages.push(timer.stop(self.probe.as_ref()));
                return self.error_result(&e, &wake_model);
            }
        };
        let (_, wake, detected) = call.score(verdict).resolve(verdict.detected).finish();
        stages.push(timer.stop(self.probe.as_ref()));

        if !detected {
            return PipelineResult {
                outcome: PipelineOutcome::NoWakeWord,
                confidence: wake.confidence,
                stages: Vec::new(),
                terminal_model: Some(wake_model),
            };
        }

        // Stage 3: command classification.
        let timer = StageTimer::start(StageKind::Classification, self.probe.as_ref());
        let call = PendingStage::new(StageKind::Classification);
        let classifier_model = self.classify.model_name().to_string();
        let verdict = match self.borrow_and_classify(&features) {
            Ok(v) => v,
            Err(e) => {
                stages.push(timer.stop(self.probe.as_ref()));
                return self.error_result(&e, &classifier_model);
            }
        };
        let accepted = verdict.confidence >= self.classify.acceptance_threshold();
        let (_, classified, accepted) = call.score(verdict).resolve(accepted).finish();
        stages.push(timer.stop(self.probe.as_ref()));

        if !accepted {
            // Wake word confirmed but no confident command: report that
            // honestly instead of guessing.
            return PipelineResult {
                outcome: PipelineOutcome::WakeWordOnly,
                confidence: classified.confidence,
                stages: Vec::new(),
                terminal_model: Some(classifier_model),
            };
        }

        // Stage 4: response lookup. Pure table, no model.
        let timer = StageTimer::start(StageKind::Response, self.probe.as_ref());
        let call = PendingStage::new(StageKind::Response);
        let verdict = self.respond.evaluate(&classified.command);
        let (_, response, _) = call.score(verdict.clone()).resolve(verdict.handled).finish();
        stages.push(timer.stop(self.probe.as_ref()));

        PipelineResult {
            outcome: PipelineOutcome::Command {
                command: classified.command,
                response: response.response,
            },
            confidence: classified.confidence,
            stages: Vec::new(),
            terminal_model: Some(classifier_model),
        }
    }

    fn borrow_and_score_wake(
        &mut self,
        features: &FeatureVector,
    ) -> Result<super::wake::WakeVerdict, CacheError> {
        let name = self.wake.model_name().to_string();
        let model = self.cache.get_or_load(&name)?;
        Ok(self.wake.evaluate(features, &model))
    }

    fn borrow_and_classify(
        &mut self,
        features: &FeatureVector,
    ) -> Result<super::classify::ClassifyVerdict, CacheError> {
        let name = self.classify.model_name().to_string();
        let model = self.cache.get_or_load(&name)?;
        Ok(self.classify.evaluate(features, &model))
    }

    fn error_result(&self, err: &CacheError, model: &str) -> PipelineResult {
        tracing::warn!(model, error = %err, "stage failed to obtain model");
        PipelineResult {
            outcome: PipelineOutcome::Error {
                error: PipelineErrorKind::from(err),
                message: err.to_string(),
            },
            confidence: 0.0,
            stages: Vec::new(),
            terminal_model: None,
        }
    }

    /// Running statistics since construction or the last reset.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Explicitly zero the running statistics.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// The underlying cache, e.g. for memory reports or manual unloads.
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ModelCache {
        &mut self.cache
    }
}
