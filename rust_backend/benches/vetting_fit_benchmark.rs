use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use kepler_completeness::algorithms::{
    fit_weighted, histogram2d, BrokenPowerLaw2d, LMConfig, WeightedData,
};
use kepler_completeness::core::PeriodRadiusGrid;
use kepler_completeness::services::{initial_guess, VettingEfficiencyModel};

/// Cell-center data drawn from a sloped surface, with a small deterministic wiggle
fn synthetic_bins(grid: &PeriodRadiusGrid) -> WeightedData {
    let truth = VettingEfficiencyModel::new([0.85, 80.0, 0.02, -0.25, 6.0, 0.05, -1.5]);
    let mut data = WeightedData::default();
    for (i, &p) in grid.period_centers().iter().enumerate() {
        for (j, &r) in grid.radius_centers().iter().enumerate() {
            let wiggle = 0.01 * (((i * 7 + j * 3) % 5) as f64 - 2.0);
            data.push(p, r, truth.evaluate(p, r) + wiggle, 0.05);
        }
    }
    data
}

fn bench_vetting_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("vetting_fit");
    let grid = PeriodRadiusGrid::new();
    let data = synthetic_bins(&grid);
    let config = LMConfig::default();

    for score_cut in [0.0, 0.9] {
        group.bench_with_input(
            BenchmarkId::new("broken_power_law", score_cut),
            &score_cut,
            |b, &cut| {
                b.iter(|| {
                    fit_weighted(
                        &BrokenPowerLaw2d,
                        black_box(&data),
                        initial_guess(cut),
                        &config,
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");
    let grid = PeriodRadiusGrid::new();

    let n = 100_000;
    let periods: Vec<f64> = (0..n).map(|i| 0.5 * 1460.0f64.powf(i as f64 / n as f64)).collect();
    let radii: Vec<f64> = (0..n)
        .map(|i| 0.3 * 66.0f64.powf(((i * 7919) % n) as f64 / n as f64))
        .collect();

    group.bench_function("histogram2d_100k", |b| {
        b.iter(|| {
            histogram2d(
                black_box(&periods),
                black_box(&radii),
                grid.periods().view(),
                grid.radii().view(),
            )
        })
    });

    group.finish();
}

fn bench_surface_evaluation(c: &mut Criterion) {
    let grid = PeriodRadiusGrid::new();
    let model = VettingEfficiencyModel::new([0.9, 100.0, 0.0, -0.2, 5.7, 0.1, -2.7]);

    c.bench_function("evaluate_grid", |b| {
        b.iter(|| black_box(&model).evaluate_grid(&grid))
    });
}

criterion_group!(
    benches,
    bench_vetting_fit,
    bench_histogram,
    bench_surface_evaluation
);
criterion_main!(benches);
