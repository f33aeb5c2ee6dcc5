use criterion::black_box;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use gpr::prelude::*;
use nalgebra::DMatrix;

fn make_data(n: usize) -> (DMatrix<f64>, DMatrix<f64>) {
    let x = DMatrix::from_fn(n, 1, |i, _| (i as f64) * 10.0 / (n as f64));
    let y = x.map(f64::sin);
    (x, y)
}

fn bench_exact_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("GpRegression, train + objective");
    for n in [10, 20, 50] {
        let (x, y) = make_data(n);
        group.bench_with_input(format!("{} points", n), &n, |b, _| {
            b.iter(|| {
                let kernel = ConstantKernel::new_unchecked(1.0)
                    * RBFKernel::new_unchecked(1.0);
                let model = GpRegression::train(
                    kernel,
                    ZeroMean::new(1).unwrap(),
                    GaussianLikelihood::new_unchecked(0.25),
                    x.clone(),
                    y.clone(),
                )
                .unwrap();
                black_box(model.objective())
            })
        });
    }
    group.finish();
}

fn bench_sparse_bound(c: &mut Criterion) {
    let (x, y) = make_data(50);
    let z = DMatrix::from_fn(10, 1, |i, _| (i as f64));
    let mut group = c.benchmark_group("SparseGpRegression, train + bound");
    group.bench_function("50 points, 10 inducing", |b| {
        b.iter(|| {
            let kernel = ConstantKernel::new_unchecked(1.0)
                * RBFKernel::new_unchecked(1.0);
            let model = SparseGpRegression::train(
                kernel,
                ZeroMean::new(1).unwrap(),
                GaussianLikelihood::new_unchecked(0.25),
                InducingPoints::fixed(z.clone()).unwrap(),
                x.clone(),
                y.clone(),
            )
            .unwrap();
            black_box(model.objective())
        })
    });
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = make_data(50);
    let kernel =
        ConstantKernel::new_unchecked(1.0) * RBFKernel::new_unchecked(1.0);
    let model = GpRegression::train(
        kernel,
        ZeroMean::new(1).unwrap(),
        GaussianLikelihood::new_unchecked(0.25),
        x,
        y,
    )
    .unwrap();
    let xs = DMatrix::from_fn(100, 1, |i, _| (i as f64) * 0.1);

    let mut group = c.benchmark_group("GpRegression, predict");
    group.bench_function("100 points", |b| {
        b.iter(|| black_box(model.predict(&xs).unwrap()))
    });
    group.finish();
}

criterion_group!(
    gp_benches,
    bench_exact_train,
    bench_sparse_bound,
    bench_predict
);
criterion_main!(gp_benches);
