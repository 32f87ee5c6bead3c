use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_fhe::datasets::{make_regression, RegressionConfig};
use kolosal_fhe::fhe::{CompilationConfig, ExecutionMode};
use kolosal_fhe::models::LinearRegression;

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(20);

    for n_bits in [2u8, 8, 16].iter() {
        let (x, y) = make_regression(&RegressionConfig::new(1000, 10).with_random_state(42)).unwrap();
        group.bench_with_input(BenchmarkId::new("linear", n_bits), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut model = LinearRegression::new(*n_bits);
                model.fit(black_box(x), black_box(y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let config = CompilationConfig::for_testing();

    for n_rows in [100, 1000].iter() {
        let (x, y) = make_regression(&RegressionConfig::new(*n_rows, 10).with_random_state(42)).unwrap();
        let mut model = LinearRegression::new(4);
        model.fit(&x, &y).unwrap();
        model.compile(&x, &config).unwrap();

        group.bench_with_input(BenchmarkId::new("clear", n_rows), &x, |b, x| {
            b.iter(|| model.predict_with(black_box(x), ExecutionMode::Clear).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("fhe", n_rows), &x, |b, x| {
            b.iter(|| model.predict_with(black_box(x), ExecutionMode::Fhe).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
