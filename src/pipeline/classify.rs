//! Command classification over a borrowed model.
//!
//! The model's per-class scores are mapped onto the configured command table.
//! The chosen command is the argmax, ties broken by table order (earliest
//! wins), and the reported distribution always sums to at most 1.0.

use serde::{Deserialize, Serialize};

use crate::models::LoadedModel;

use super::features::FeatureVector;

/// The default on-device command vocabulary.
pub const DEFAULT_COMMANDS: &[&str] = &[
    "turn_on_light",
    "turn_off_light",
    "increase_volume",
    "decrease_volume",
    "play_music",
    "stop_music",
    "set_timer",
    "check_weather",
    "tell_time",
    "help",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Catalog name of the classification model to borrow.
    pub model: String,
    /// Minimum top-command confidence to accept the classification.
    pub acceptance_threshold: f32,
    /// Recognized commands, in tie-break order.
    pub commands: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            model: "command-classifier".into(),
            acceptance_threshold: 0.55,
            commands: DEFAULT_COMMANDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifyVerdict {
    /// Winning command name.
    pub command: String,
    /// Confidence of the winning command after normalization.
    pub confidence: f32,
    /// Per-command confidences, parallel to the configured command table.
    /// Sums to at most 1.0.
    pub distribution: Vec<(String, f32)>,
}

#[derive(Debug, Clone)]
pub struct ClassifyStage {
    config: ClassifyConfig,
}

impl ClassifyStage {
    pub fn new(config: ClassifyConfig) -> Self {
        Self { config }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    pub fn acceptance_threshold(&self) -> f32 {
        self.config.acceptance_threshold
    }

    pub fn evaluate(&self, features: &FeatureVector, model: &LoadedModel) -> ClassifyVerdict {
        let raw = model.scorer().score(features);
        let count = raw.len().min(self.config.commands.len());
        let scores = &raw[..count];
        if scores.is_empty() {
            return ClassifyVerdict {
                command: self.config.commands.first().cloned().unwrap_or_default(),
                confidence: 0.0,
                distribution: Vec::new(),
            };
        }

        // Normalize only when the raw mass exceeds 1.0, so weak models keep
        // their genuinely low confidences.
        let total: f32 = scores.iter().sum();
        let scale = if total > 1.0 { 1.0 / total } else { 1.0 };

        let mut winner = 0usize;
        for (i, &score) in scores.iter().enumerate() {
            // Strict comparison keeps the earliest index on ties.
            if score > scores[winner] {
                winner = i;
            }
        }

        let distribution: Vec<(String, f32)> = self
            .config
            .commands
            .iter()
            .take(scores.len())
            .zip(scores.iter())
            .map(|(name, &s)| (name.clone(), s * scale))
            .collect();

        ClassifyVerdict {
            command: self.config.commands[winner].clone(),
            confidence: scores[winner] * scale,
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoadedModel, ModelHandle, ModelScorer};
    use crate::pipeline::features::FEATURE_LEN;

    struct FixedScorer(Vec<f32>);

    impl ModelScorer for FixedScorer {
        fn num_classes(&self) -> usize {
            self.0.len()
        }
        fn score(&self, _features: &[f32]) -> Vec<f32> {
            self.0.clone()
        }
    }

    fn model_with_scores(scores: Vec<f32>) -> LoadedModel {
        LoadedModel::new(
            ModelHandle::new(1),
            "command-classifier".into(),
            1024,
            Box::new(FixedScorer(scores)),
        )
    }

    fn stage() -> ClassifyStage {
        ClassifyStage::new(ClassifyConfig::default())
    }

    #[test]
    fn argmax_picks_highest_score() {
        let model = model_with_scores(vec![0.1, 0.2, 0.7, 0.05]);
        let verdict = stage().evaluate(&[0.5; FEATURE_LEN], &model);
        assert_eq!(verdict.command, "increase_volume");
    }

    #[test]
    fn ties_break_by_table_order() {
        let model = model_with_scores(vec![0.4, 0.4, 0.4]);
        let verdict = stage().evaluate(&[0.5; FEATURE_LEN], &model);
        assert_eq!(verdict.command, "turn_on_light", "earliest command wins ties");
    }

    #[test]
    fn distribution_sums_to_at_most_one() {
        let model = model_with_scores(vec![0.9, 0.8, 0.7, 0.6]);
        let verdict = stage().evaluate(&[0.5; FEATURE_LEN], &model);
        let sum: f32 = verdict.distribution.iter().map(|(_, s)| s).sum();
        assert!(sum <= 1.0 + f32::EPSILON, "distribution sum {sum} exceeds 1.0");
    }

    #[test]
    fn weak_scores_are_not_inflated() {
        let model = model_with_scores(vec![0.05, 0.1, 0.02]);
        let verdict = stage().evaluate(&[0.5; FEATURE_LEN], &model);
        assert_eq!(verdict.confidence, 0.1);
    }

    #[test]
    fn identical_features_give_identical_verdicts() {
        let model = model_with_scores(vec![0.3, 0.6, 0.1]);
        let features = [0.42; FEATURE_LEN];
        let a = stage().evaluate(&features, &model);
        let b = stage().evaluate(&features, &model);
        assert_eq!(a.command, b.command);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.distribution, b.distribution);
    }
}
