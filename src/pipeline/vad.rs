//! Voice-activity detection on raw sample statistics.
//!
//! This is the one stage allowed to skip the model cache entirely: it runs on
//! RMS energy alone, so the silence fast path has zero cache interaction and
//! the lowest possible latency.

use serde::{Deserialize, Serialize};

/// VAD tuning. All thresholds are configuration, never fixed in code; the
/// noise floor in particular is empirically tunable per deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Energy at or below this level counts as background noise (dBFS).
    pub noise_floor_db: f32,
    /// Confidence ramps from 0 to 1 as energy rises this many dB above the
    /// floor.
    pub span_db: f32,
    /// Minimum confidence to call the buffer voiced.
    pub min_confidence: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self { noise_floor_db: -55.0, span_db: 20.0, min_confidence: 0.3 }
    }
}

/// Outcome of one VAD evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadVerdict {
    pub voice_present: bool,
    /// How far energy exceeds the noise floor, clamped to [0, 1].
    pub confidence: f32,
    /// Measured buffer energy in dBFS, for telemetry.
    pub energy_db: f32,
}

/// Energy-based voice-activity stage. No model borrow required.
#[derive(Debug, Clone, Copy)]
pub struct VadStage {
    config: VadConfig,
}

impl VadStage {
    pub fn new(config: VadConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, samples: &[i16]) -> VadVerdict {
        let energy_db = rms_dbfs(samples);
        let confidence = ((energy_db - self.config.noise_floor_db) / self.config.span_db)
            .clamp(0.0, 1.0);
        VadVerdict {
            voice_present: confidence >= self.config.min_confidence,
            confidence,
            energy_db,
        }
    }
}

/// RMS energy of the buffer in dB relative to full scale. Empty or silent
/// buffers report the floor value rather than negative infinity.
fn rms_dbfs(samples: &[i16]) -> f32 {
    const SILENCE_DB: f32 = -120.0;
    if samples.is_empty() {
        return SILENCE_DB;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt() / i16::MAX as f64;
    if rms <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * rms.log10()) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> VadStage {
        VadStage::new(VadConfig::default())
    }

    #[test]
    fn silence_is_negative_with_zero_confidence() {
        let verdict = stage().evaluate(&vec![0i16; 480]);
        assert!(!verdict.voice_present);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn empty_buffer_is_negative() {
        let verdict = stage().evaluate(&[]);
        assert!(!verdict.voice_present);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn loud_signal_is_positive() {
        let loud: Vec<i16> = (0..480).map(|i| if i % 2 == 0 { 20_000 } else { -20_000 }).collect();
        let verdict = stage().evaluate(&loud);
        assert!(verdict.voice_present);
        assert!(verdict.confidence > 0.9);
    }

    #[test]
    fn confidence_is_clamped() {
        let max: Vec<i16> = vec![i16::MAX; 256];
        let verdict = stage().evaluate(&max);
        assert!(verdict.confidence <= 1.0);
    }

    #[test]
    fn floor_is_configurable() {
        let strict = VadStage::new(VadConfig { noise_floor_db: 0.0, ..VadConfig::default() });
        let loud: Vec<i16> = (0..480).map(|i| if i % 2 == 0 { 20_000 } else { -20_000 }).collect();
        assert!(!strict.evaluate(&loud).voice_present, "nothing clears a 0 dBFS floor");
    }
}
