// benches/benchmarks.rs -- CPU stage benchmarks.
//
//   cargo bench --bench benchmarks
//
// Frames are synthetic 640x480 scenes (gradient background plus flat
// patches), the configured default resolution.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use huekey::collector::{ColorCollector, ObservedColorSet};
use huekey::color::{Quantizer, Rgb8};
use huekey::frame::Frame;
use huekey::kmeans::{kmeans, KmeansConfig};
use huekey::palette::{extract_palette, Palette};
use huekey::recolor::{recolor_rgba, RecolorParams};

// ============================================================
// Helpers
// ============================================================

/// Smooth gradient with six flat-colored rectangles on top.
fn make_scene(w: u32, h: u32) -> Frame {
    let patches = [
        Rgb8::new(255, 0, 0),
        Rgb8::new(0, 255, 0),
        Rgb8::new(0, 0, 255),
        Rgb8::new(255, 128, 0),
        Rgb8::new(40, 40, 40),
        Rgb8::new(200, 200, 255),
    ];
    Frame::from_rgb_fn(w, h, |x, y| {
        for (i, &c) in patches.iter().enumerate() {
            let rx = 50 + i as u32 * 90;
            let ry = 40 + (i as u32 % 3) * 120;
            if (rx..rx + 80).contains(&x) && (ry..ry + 60).contains(&y) {
                return c;
            }
        }
        Rgb8::new((x * 255 / w) as u8, (y * 255 / h) as u8, ((x + y) % 256) as u8)
    })
    .expect("valid scene")
}

fn observed(frame: &Frame) -> ObservedColorSet {
    let c = ColorCollector::new(Quantizer::default());
    let mut set = ObservedColorSet::new();
    c.collect(&mut set, frame.as_bytes());
    set
}

// ============================================================
// Per-stage benchmarks
// ============================================================

fn bench_collect(c: &mut Criterion) {
    let frame = make_scene(640, 480);
    let collector = ColorCollector::new(Quantizer::default());

    let mut group = c.benchmark_group("collect");
    group.bench_function("fresh_set_640x480", |b| {
        b.iter(|| {
            let mut set = ObservedColorSet::new();
            collector.collect(&mut set, black_box(frame.as_bytes()))
        })
    });
    // Steady state: every key already present.
    let mut warm = observed(&frame);
    group.bench_function("warm_set_640x480", |b| {
        b.iter(|| collector.collect(&mut warm, black_box(frame.as_bytes())))
    });
    group.finish();
}

fn bench_kmeans(c: &mut Criterion) {
    let frame = make_scene(640, 480);
    let samples = observed(&frame).snapshot(&Quantizer::default());
    let config = KmeansConfig::default();

    let mut group = c.benchmark_group("kmeans");
    group.sample_size(10);
    for n in [1_000usize, 10_000, samples.len()] {
        let points: Vec<[f64; 3]> = samples.iter().take(n).map(|s| s.to_f64()).collect();
        group.bench_with_input(BenchmarkId::new("k16", points.len()), &points, |b, pts| {
            b.iter(|| kmeans(pts, &config))
        });
    }
    group.bench_function("extract_palette_scene", |b| {
        b.iter(|| extract_palette(&samples, &config, 1))
    });
    group.finish();
}

fn bench_recolor(c: &mut Criterion) {
    let frame = make_scene(640, 480);
    let params = RecolorParams::default();
    let seed = Palette::seed();
    let full = extract_palette(
        &observed(&frame).snapshot(&Quantizer::default()),
        &KmeansConfig::default(),
        1,
    )
    .expect("non-empty scene");

    let mut group = c.benchmark_group("recolor_cpu");
    group.bench_function("seed_palette_640x480", |b| {
        b.iter(|| recolor_rgba(black_box(frame.as_bytes()), &seed, &params))
    });
    group.bench_function("extracted_palette_640x480", |b| {
        b.iter(|| recolor_rgba(black_box(frame.as_bytes()), &full, &params))
    });
    group.finish();
}

// ============================================================
// Register
// ============================================================

criterion_group!(benches, bench_collect, bench_kmeans, bench_recolor);
criterion_main!(benches);
