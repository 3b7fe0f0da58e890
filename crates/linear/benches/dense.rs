use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linear::{solve_direct, DEFAULT_PIVOT_EPSILON};
use nalgebra::{DMatrix, DVector};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_system(n: usize, rng: &mut StdRng) -> (DMatrix<f64>, DVector<f64>) {
    // Diagonally dominant, so the factorization never trips the singularity
    // check while still doing real row-swapping work.
    let mut a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
    for i in 0..n {
        a[(i, i)] += n as f64;
    }
    let b = DVector::from_fn(n, |_, _| rng.gen_range(-1.0..1.0));
    (a, b)
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for n in [5usize, 10, 50] {
        let (a, b) = random_system(n, &mut rng);
        c.bench_function(&format!("dense solver {n}"), |bench| {
            bench.iter(|| {
                solve_direct(black_box(&a), black_box(&b), DEFAULT_PIVOT_EPSILON).unwrap()
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
