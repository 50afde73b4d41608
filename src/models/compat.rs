//! Compatibility checking: can a model run given current free memory?
//!
//! Results are derived values computed on demand and never cached, because
//! free memory changes between calls.
//!
//! # Impact-tier policy
//!
//! `performance_impact` is a design choice, not a derived constant: the ratio
//! of required memory to free memory is compared against fixed breakpoints —
//! ratio > 0.8 is High, ratio > 0.5 is Medium, anything else Low. The
//! breakpoints are pinned by tests in this module.

use serde::Serialize;

use super::catalog::{Catalog, ModelDescriptor};

/// Coarse cost of running a model on the current memory situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceImpact {
    Low,
    Medium,
    High,
}

/// Outcome of a compatibility check. Derived, never stored.
#[derive(Debug, Clone)]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub reason: String,
    /// Overhead-scaled memory the model needs to run, in bytes.
    pub required_memory: u64,
    pub performance_impact: PerformanceImpact,
}

/// Decides whether a model fits the current memory situation.
///
/// `overhead_factor` models inference scratch space on top of the declared
/// footprint; it is configuration (MCU and desktop profiles differ by an
/// order of magnitude), never hard-coded at call sites.
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityChecker {
    overhead_factor: f64,
    max_model_bytes: u64,
}

const IMPACT_HIGH_RATIO: f64 = 0.8;
const IMPACT_MEDIUM_RATIO: f64 = 0.5;

impl CompatibilityChecker {
    pub fn new(overhead_factor: f64, max_model_bytes: u64) -> Self {
        // Scratch space can only add to the footprint.
        Self { overhead_factor: overhead_factor.max(1.0), max_model_bytes }
    }

    /// Memory the model needs to run: the declared minimum, or the
    /// overhead-scaled footprint, whichever is larger.
    pub fn required_memory(&self, descriptor: &ModelDescriptor) -> u64 {
        let scaled = (descriptor.footprint_bytes as f64 * self.overhead_factor) as u64;
        descriptor.min_memory_bytes.max(scaled)
    }

    /// Check a descriptor against a live free-memory snapshot.
    pub fn check(&self, descriptor: &ModelDescriptor, free_memory_bytes: u64) -> CompatibilityResult {
        let required = self.required_memory(descriptor);
        let impact = impact_for_ratio(required, free_memory_bytes);

        if required > free_memory_bytes {
            return CompatibilityResult {
                compatible: false,
                reason: format!(
                    "insufficient memory: {} needs {} bytes, {} free",
                    descriptor.name, required, free_memory_bytes
                ),
                required_memory: required,
                performance_impact: PerformanceImpact::High,
            };
        }

        if descriptor.footprint_bytes > self.max_model_bytes {
            return CompatibilityResult {
                compatible: false,
                reason: format!(
                    "model too large: {} bytes exceeds configured limit of {} bytes",
                    descriptor.footprint_bytes, self.max_model_bytes
                ),
                required_memory: required,
                performance_impact: PerformanceImpact::High,
            };
        }

        CompatibilityResult {
            compatible: true,
            reason: "compatible".into(),
            required_memory: required,
            performance_impact: impact,
        }
    }
}

fn impact_for_ratio(required: u64, free: u64) -> PerformanceImpact {
    if free == 0 {
        return PerformanceImpact::High;
    }
    let ratio = required as f64 / free as f64;
    if ratio > IMPACT_HIGH_RATIO {
        PerformanceImpact::High
    } else if ratio > IMPACT_MEDIUM_RATIO {
        PerformanceImpact::Medium
    } else {
        PerformanceImpact::Low
    }
}

/// A catalog model ranked for the current memory situation.
#[derive(Debug, Clone)]
pub struct RankedModel<'a> {
    pub descriptor: &'a ModelDescriptor,
    /// Capability count divided by memory pressure; higher is better.
    pub score: f64,
    pub memory_usage_percent: f64,
}

/// Rank compatible catalog models for the current free memory, best first.
///
/// Scoring favors models that deliver capability per byte of pressure; a
/// model needing most of free memory scores low even if it fits.
pub fn recommended_models<'a>(
    catalog: &'a Catalog,
    checker: &CompatibilityChecker,
    free_memory_bytes: u64,
) -> Vec<RankedModel<'a>> {
    let mut ranked: Vec<RankedModel<'a>> = catalog
        .descriptors()
        .iter()
        .filter_map(|descriptor| {
            let result = checker.check(descriptor, free_memory_bytes);
            if !result.compatible || free_memory_bytes == 0 {
                return None;
            }
            let memory_ratio = result.required_memory as f64 / free_memory_bytes as f64;
            if memory_ratio <= 0.0 {
                return None;
            }
            Some(RankedModel {
                descriptor,
                score: 1.0 / memory_ratio,
                memory_usage_percent: memory_ratio * 100.0,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::Catalog;

    fn checker() -> CompatibilityChecker {
        // overhead factor 1.0 keeps required == declared minimum for the
        // builtin models, matching the worked scenarios below.
        CompatibilityChecker::new(1.0, 200_000)
    }

    #[test]
    fn wake_word_tiny_fits_in_100kb() {
        let catalog = Catalog::builtin();
        let result = checker().check(catalog.lookup("wake-word-tiny").unwrap(), 100_000);
        assert!(result.compatible, "{}", result.reason);
    }

    #[test]
    fn command_classifier_rejected_at_50kb() {
        let catalog = Catalog::builtin();
        let result = checker().check(catalog.lookup("command-classifier").unwrap(), 50_000);
        assert!(!result.compatible);
        assert!(result.reason.contains("insufficient memory"), "{}", result.reason);
        assert_eq!(result.required_memory, 80 * 1024);
    }

    #[test]
    fn oversized_model_rejected_by_limit() {
        let catalog = Catalog::builtin();
        let checker = CompatibilityChecker::new(1.0, 10_000);
        let result = checker.check(catalog.lookup("command-classifier").unwrap(), 1_000_000);
        assert!(!result.compatible);
        assert!(result.reason.contains("too large"));
    }

    #[test]
    fn overhead_factor_scales_required_memory() {
        let catalog = Catalog::builtin();
        let descriptor = catalog.lookup("wake-word-tiny").unwrap();
        // 8KB footprint * 3.0 = 24KB, above the 20KB declared minimum.
        let checker = CompatibilityChecker::new(3.0, 200_000);
        assert_eq!(checker.required_memory(descriptor), 24 * 1024);
    }

    #[test]
    fn impact_tier_breakpoints() {
        // The ratio policy is a design choice; pin it exactly.
        assert_eq!(impact_for_ratio(81, 100), PerformanceImpact::High);
        assert_eq!(impact_for_ratio(80, 100), PerformanceImpact::Medium);
        assert_eq!(impact_for_ratio(51, 100), PerformanceImpact::Medium);
        assert_eq!(impact_for_ratio(50, 100), PerformanceImpact::Low);
        assert_eq!(impact_for_ratio(10, 0), PerformanceImpact::High);
    }

    #[test]
    fn recommendations_sorted_best_first() {
        let catalog = Catalog::builtin();
        let ranked = recommended_models(&catalog, &checker(), 150_000);
        assert!(!ranked.is_empty());
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // The tiniest model delivers the best capability-per-pressure score.
        assert_eq!(ranked[0].descriptor.name, "wake-word-tiny");
    }
}
