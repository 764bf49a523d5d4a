//! Benchmarks for replay resampling
//!
//! Two ~90 s laps sampled irregularly at roughly 4 Hz, resampled onto a 60 Hz
//! clock, plus the per-frame projection used during playback.
//!
//! Platform: Cross-platform (synthetic traces, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pitlane::replay::{self, ReplayPlayer};
use pitlane::types::TelemetrySample;
use std::hint::black_box;

/// Irregular trace: spacing alternates between 0.2 s and 0.3 s
fn lap(duration: f64, phase: f64) -> Vec<TelemetrySample> {
    let mut samples = Vec::new();
    let mut time = 0.0;
    let mut step = 0usize;
    while time <= duration {
        let angle = time / duration * std::f64::consts::TAU + phase;
        samples.push(TelemetrySample {
            x: angle.cos() * 1500.0,
            y: angle.sin() * 900.0,
            speed: 180.0 + 120.0 * (angle * 3.0).sin(),
            throttle: (50.0 + 50.0 * (angle * 3.0).sin()).clamp(0.0, 100.0),
            brake: (angle * 3.0).sin() < -0.6,
            gear: (2.0 + 6.0 * (0.5 + 0.5 * (angle * 3.0).sin())).round() as i32,
            drs: if step % 40 < 8 { 12 } else { 8 },
            time,
        });
        time += if step % 2 == 0 { 0.2 } else { 0.3 };
        step += 1;
    }
    samples
}

fn bench_resample(c: &mut Criterion) {
    let first = lap(90.412, 0.0);
    let second = lap(91.037, 0.05);

    let mut group = c.benchmark_group("resample");
    for rate in [30.0, 60.0] {
        let frames = (91.037f64 * rate).ceil() as u64;
        group.throughput(Throughput::Elements(frames * 2));
        group.bench_with_input(BenchmarkId::from_parameter(rate), &rate, |b, &rate| {
            b.iter(|| black_box(replay::resample(black_box(&first), black_box(&second), 90.412, 91.037, rate)))
        });
    }
    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let player = ReplayPlayer::load(&lap(90.412, 0.0), &lap(91.037, 0.05), 90.412, 91.037, 60.0);
    let total = player.total_frames();

    c.bench_function("frame_pair_full_lap", |b| {
        b.iter(|| {
            for frame in 0..total {
                let gap = (frame as f64 / total as f64) * 0.8;
                black_box(player.frame_pair(frame, black_box(gap)));
            }
        })
    });
}

criterion_group!(benches, bench_resample, bench_projection);
criterion_main!(benches);
