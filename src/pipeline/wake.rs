//! Wake-word detection over a borrowed model.

use serde::{Deserialize, Serialize};

use crate::models::LoadedModel;

use super::features::FeatureVector;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Catalog name of the wake-word model to borrow.
    pub model: String,
    /// Detection threshold on the model score.
    pub threshold: f32,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self { model: "wake-word-tiny".into(), threshold: 0.6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeVerdict {
    pub detected: bool,
    pub confidence: f32,
}

/// Scores a feature vector against a borrowed wake-word model.
#[derive(Debug, Clone)]
pub struct WakeStage {
    config: WakeConfig,
}

impl WakeStage {
    pub fn new(config: WakeConfig) -> Self {
        Self { config }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    pub fn evaluate(&self, features: &FeatureVector, model: &LoadedModel) -> WakeVerdict {
        let scores = model.scorer().score(features);
        let confidence = scores.first().copied().unwrap_or(0.0).clamp(0.0, 1.0);
        WakeVerdict { detected: confidence >= self.config.threshold, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Catalog, ModelLoader, SyntheticLoader};
    use crate::pipeline::features::FEATURE_LEN;

    #[test]
    fn verdict_follows_threshold() {
        let catalog = Catalog::builtin();
        let loader = SyntheticLoader::new(5, FEATURE_LEN);
        let model = loader.load(catalog.lookup("wake-word-tiny").unwrap()).unwrap();

        let features = [0.8f32; FEATURE_LEN];
        let score = model.scorer().score(&features)[0];

        let permissive = WakeStage::new(WakeConfig { threshold: 0.0, ..WakeConfig::default() });
        assert!(permissive.evaluate(&features, &model).detected);

        let strict = WakeStage::new(WakeConfig { threshold: 1.1, ..WakeConfig::default() });
        let verdict = strict.evaluate(&features, &model);
        assert!(!verdict.detected);
        assert_eq!(verdict.confidence, score.clamp(0.0, 1.0));
    }
}
