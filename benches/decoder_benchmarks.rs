//! Benchmarks for heatmap decoding and tracking

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use human_pose_3d::{
    config::{DecoderConfig, TrackingConfig},
    decoder::{
        grouping::{extract_all_peaks, group_keypoints},
        tracking::OneEuroFilter,
        DecodeParams, HeatmapDecoder, PoseDecoder,
    },
    inference::InferenceOutput,
};
use ndarray::{Array3, Axis};
use rand::Rng;

const MAP_HEIGHT: usize = 32;
const MAP_WIDTH: usize = 56;

/// Maps with `people` upright stick figures spread across the width
fn synthetic_output(people: usize) -> InferenceOutput {
    let mut output = InferenceOutput {
        features: Array3::zeros((57, MAP_HEIGHT, MAP_WIDTH)),
        heatmaps: Array3::zeros((19, MAP_HEIGHT, MAP_WIDTH)),
        pafs: Array3::zeros((38, MAP_HEIGHT, MAP_WIDTH)),
    };
    for person in 0..people {
        let x = 4 + person * (MAP_WIDTH - 8) / people.max(1);
        output.heatmaps[[1, 6, x]] = 0.9;
        output.heatmaps[[2, 6, x + 3]] = 0.85;
        output.heatmaps[[3, 14, x + 3]] = 0.8;
        output.heatmaps[[8, 18, x + 1]] = 0.8;
        output.heatmaps[[9, 26, x + 1]] = 0.75;
    }
    output.pafs.index_axis_mut(Axis(0), 12).fill(1.0);
    output.pafs.index_axis_mut(Axis(0), 15).fill(1.0);
    output.pafs.index_axis_mut(Axis(0), 1).fill(1.0);

    let mut rng = rand::thread_rng();
    output.features.mapv_inplace(|_| rng.gen_range(-0.5..0.5));
    output
}

fn params() -> DecodeParams {
    DecodeParams {
        input_scale: 256.0 / 720.0,
        stride: 8,
        focal_length: 1024.0,
        is_video: true,
    }
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for people in [0, 1, 4] {
        let output = synthetic_output(people);
        group.bench_with_input(BenchmarkId::new("heatmap_decoder", people), &output, |b, output| {
            let mut decoder = HeatmapDecoder::new(DecoderConfig::default(), TrackingConfig::default());
            b.iter(|| black_box(decoder.decode(output, &params()).expect("Decoding failed")));
        });
    }

    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouping");
    let config = DecoderConfig::default();
    let output = synthetic_output(4);

    group.bench_function("extract_all_peaks", |b| {
        b.iter(|| black_box(extract_all_peaks(output.heatmaps.view(), &config)));
    });

    let peaks = extract_all_peaks(output.heatmaps.view(), &config);
    group.bench_function("group_keypoints", |b| {
        b.iter(|| black_box(group_keypoints(&peaks, output.pafs.view(), &config)));
    });

    group.finish();
}

fn bench_one_euro(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin() * 50.0 + rng.gen_range(-2.0..2.0)).collect();

    c.bench_function("one_euro_1000_samples", |b| {
        b.iter(|| {
            let mut filter = OneEuroFilter::from_config(&TrackingConfig::default());
            for &value in &samples {
                black_box(filter.filter(value));
            }
        });
    });
}

criterion_group!(benches, bench_decode, bench_grouping, bench_one_euro);
criterion_main!(benches);
