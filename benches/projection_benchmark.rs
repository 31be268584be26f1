//! Projection and full-pipeline latency benchmarks.
//!
//! These track how the projection stage scales with corpus size for the
//! Barnes-Hut default and for exact t-SNE, which is quadratic in the number
//! of points.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench projection_benchmark
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pubatlas_core::{
    AtlasPipeline, EmbeddingMatrix, HashingEmbedder, PipelineOptions, ProjectionOptions,
    Projector, SourceBatch, TsneMethod,
};
use serde_json::{Map, Value};
use std::hint::black_box;

/// Clustered random embeddings: `clusters` centroids with jitter around each.
fn synthetic_embeddings(points: usize, dimension: usize, clusters: usize) -> EmbeddingMatrix {
    let mut rng = fastrand::Rng::with_seed(7);
    let centroids: Vec<Vec<f32>> = (0..clusters)
        .map(|_| (0..dimension).map(|_| rng.f32() * 4.0 - 2.0).collect())
        .collect();
    let rows = (0..points)
        .map(|i| {
            centroids[i % clusters]
                .iter()
                .map(|c| c + (rng.f32() - 0.5) * 0.2)
                .collect()
        })
        .collect();
    EmbeddingMatrix::from_rows(rows, "synthetic").unwrap()
}

fn synthetic_sources(sources: usize, per_source: usize) -> Vec<SourceBatch> {
    let topics = [
        "soft robotic grippers",
        "legged locomotion control",
        "imitation learning policies",
        "tactile sensing skins",
        "trajectory optimization",
    ];
    (0..sources)
        .map(|s| {
            let records = (0..per_source)
                .map(|i| {
                    let mut record = Map::new();
                    record.insert(
                        "title".into(),
                        Value::String(format!("{} study {i}", topics[(s + i) % topics.len()])),
                    );
                    record
                })
                .collect();
            SourceBatch::new(format!("source_{s}"), records)
        })
        .collect()
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    group.sample_size(10);

    for (name, method, sizes) in [
        ("barnes_hut", TsneMethod::BarnesHut, &[200usize, 1000, 2000][..]),
        ("exact", TsneMethod::Exact, &[200, 500][..]),
    ] {
        let mut options = ProjectionOptions::default();
        options.tsne.iterations = 500;
        options.tsne.method = method;
        let projector = Projector::new(options).unwrap();
        for &points in sizes {
            let embeddings = synthetic_embeddings(points, 64, 5);
            let id = BenchmarkId::new(name, points);
            group.bench_with_input(id, &embeddings, |b, e| {
                b.iter(|| black_box(projector.project(e).unwrap()));
            });
        }
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let options = PipelineOptions::builder().iterations(500).build();
    let pipeline = AtlasPipeline::with_options(HashingEmbedder::default(), options).unwrap();
    let sources = synthetic_sources(8, 25);

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("eight_sources_200_titles", |b| {
        b.iter(|| black_box(pipeline.run(sources.clone()).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_projection, bench_pipeline);
criterion_main!(benches);
