use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use ddr_radar::radar::{MetricsOptions, compute_chart_metrics, rasterize_notes};

const FIXTURE: &str = include_str!("fixtures/bench_song.sm");

fn bench_parse(c: &mut Criterion) {
    let model = ddr_radar::parse(FIXTURE).expect("benchmark fixture should parse");
    assert!(!model.charts.is_empty(), "benchmark fixture has no charts");
    let options = MetricsOptions::default();

    let mut group = c.benchmark_group("parse");
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.throughput(Throughput::Bytes(FIXTURE.len() as u64));

    group.bench_function("parse_only", |b| {
        b.iter(|| black_box(ddr_radar::parse(black_box(FIXTURE))));
    });

    group.bench_function("analyze_full", |b| {
        b.iter(|| black_box(ddr_radar::analyze(black_box(FIXTURE), &options)));
    });

    group.finish();

    let mut group = c.benchmark_group("metrics");
    group.bench_function("radar_all_charts", |b| {
        b.iter(|| {
            for (ty, chart) in model.charts_with_types() {
                black_box(compute_chart_metrics(black_box(chart), ty.mode, &options));
            }
        });
    });
    group.bench_function("rasterize_notes", |b| {
        b.iter(|| {
            for (ty, chart) in model.charts_with_types() {
                black_box(rasterize_notes(black_box(&chart.notes), ty.mode.lanes()));
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
