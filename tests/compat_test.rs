//! Compatibility decisions over the builtin catalog.

use voxcore::models::{recommended_models, Catalog, CompatibilityChecker, PerformanceImpact};

const KB: u64 = 1024;

#[test]
fn midrange_device_fits_the_small_models_only() {
    // 128 KB free, scratch overhead 2x. Required memory per model:
    // wake 20K, vad 30K, classifier 90K, microllama 160K, tinyllama 400K.
    let catalog = Catalog::builtin();
    let checker = CompatibilityChecker::new(2.0, 256 * KB);
    let free = 128 * KB;

    let wake = checker.check(catalog.lookup("wake-word-tiny").unwrap(), free);
    assert!(wake.compatible);
    assert_eq!(wake.required_memory, 20 * KB);
    assert_eq!(wake.performance_impact, PerformanceImpact::Low);

    let classifier = checker.check(catalog.lookup("command-classifier").unwrap(), free);
    assert!(classifier.compatible);
    assert_eq!(classifier.required_memory, 90 * KB);
    assert_eq!(classifier.performance_impact, PerformanceImpact::Medium);

    let microllama = checker.check(catalog.lookup("microllama").unwrap(), free);
    assert!(!microllama.compatible);
    assert!(microllama.reason.contains("insufficient memory"));
}

#[test]
fn size_limit_rejects_independent_of_free_memory() {
    let catalog = Catalog::builtin();
    let checker = CompatibilityChecker::new(1.0, 100 * KB);

    // tinyllama-pico's 200 KB footprint exceeds the configured limit even
    // with abundant free memory.
    let result = checker.check(catalog.lookup("tinyllama-pico").unwrap(), 10_000 * KB);
    assert!(!result.compatible);
    assert!(result.reason.contains("too large"));
}

#[test]
fn recommendations_are_compatible_and_ranked_best_first() {
    let catalog = Catalog::builtin();
    let checker = CompatibilityChecker::new(2.0, 256 * KB);
    let ranked = recommended_models(&catalog, &checker, 128 * KB);

    // Only wake (20K), vad (30K), and classifier (90K) fit under 128 KB.
    assert_eq!(ranked.len(), 3);
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score, "ranking must be descending");
    }
    for model in &ranked {
        assert!(checker.check(model.descriptor, 128 * KB).compatible);
    }
}

#[test]
fn no_recommendations_on_an_exhausted_device() {
    let catalog = Catalog::builtin();
    let checker = CompatibilityChecker::new(2.0, 256 * KB);
    assert!(recommended_models(&catalog, &checker, 0).is_empty());
}
