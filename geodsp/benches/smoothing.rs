/// Benchmarks for local anisotropic smoothing

use criterion::{criterion_group, criterion_main, Criterion};

use geodsp::{EigenTensors3, LocalSmoothingFilter};

fn smooth_3d(num_threads: usize) {
    const N: usize = 48;
    let mut tensors = EigenTensors3::new(N, N, N);
    for i3 in 0..N {
        for i2 in 0..N {
            for i1 in 0..N {
                let theta = 0.05 * (i1 + 2 * i2 + 3 * i3) as f32;
                tensors.set_eigenvalues(i1, i2, i3, 1.0, 0.5, 0.1);
                tensors.set_eigenvector_u(i1, i2, i3, [theta.cos().abs(), theta.sin(), 0.0]);
                tensors.set_eigenvector_w(i1, i2, i3, [0.0, 0.0, 1.0]);
            }
        }
    }
    let x: Vec<f32> = (0..N * N * N).map(|i| (i as f32 * 0.7).sin()).collect();
    let mut y = vec![0.0f32; x.len()];
    let mut filter = LocalSmoothingFilter::new(0.01, 100).unwrap();
    filter.set_num_threads(num_threads);
    filter.apply3(&tensors, 1.0, None, N, N, N, &x, &mut y).unwrap();
}

fn my_benchmark(c: &mut Criterion) {
    c.bench_function("smooth_3d_serial", |b| b.iter(|| smooth_3d(1)));
    c.bench_function("smooth_3d_threads4", |b| b.iter(|| smooth_3d(4)));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
