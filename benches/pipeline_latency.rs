//! Pipeline latency benchmarks.
//!
//! Measures the silence fast path, the full command path with warm models,
//! and feature extraction over growing buffer sizes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use voxcore::config::RuntimeConfig;
use voxcore::memory::{FixedProbe, MemoryProbe};
use voxcore::pipeline::{FeatureExtractor, SpectralFeatures};
use voxcore::Pipeline;

fn probe() -> Arc<dyn MemoryProbe> {
    Arc::new(FixedProbe::new(512 * 1024))
}

fn voiced_buffer(len: usize) -> Vec<i16> {
    (0..len).map(|i| if (i / 3) % 2 == 0 { 18_000 } else { -18_000 }).collect()
}

fn bench_silence_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("silence_fast_path");
    let mut pipeline = Pipeline::from_config(RuntimeConfig::default(), probe()).unwrap();
    let silence = vec![0i16; 960];

    group.throughput(Throughput::Elements(silence.len() as u64));
    group.bench_function("960_samples", |b| {
        b.iter(|| pipeline.process(black_box(&silence)))
    });

    group.finish();
}

fn bench_full_command_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_command_path");

    let mut config = RuntimeConfig::default();
    config.pipeline.wake.threshold = 0.0;
    config.pipeline.classify.acceptance_threshold = 0.0;
    let mut pipeline = Pipeline::from_config(config, probe()).unwrap();

    let buffer = voiced_buffer(960);
    // Warm the cache so the bench measures inference, not loading.
    pipeline.process(&buffer);

    group.throughput(Throughput::Elements(buffer.len() as u64));
    group.bench_function("960_samples_warm", |b| {
        b.iter(|| pipeline.process(black_box(&buffer)))
    });

    group.finish();
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    let extractor = SpectralFeatures;

    for (name, len) in [("480_samples", 480), ("960_samples", 960), ("4800_samples", 4800)] {
        let buffer = voiced_buffer(len);

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("spectral", name), &buffer, |b, buf| {
            b.iter(|| extractor.extract(black_box(buf)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_silence_fast_path,
    bench_full_command_path,
    bench_feature_extraction
);
criterion_main!(benches);
