//! Benchmarks for distance kernels.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use arbor_vector::{distance, DistanceMetric, Vector, VectorType};

fn generate_vectors(dims: usize) -> (Vector, Vector) {
    let a: Vec<f32> = (0..dims).map(|i| (i as f32) * 0.1).collect();
    let b: Vec<f32> = (0..dims).map(|i| (i as f32) * 0.2 + 0.5).collect();
    (Vector::Float32(a), Vector::Float32(b))
}

fn bench_f32(c: &mut Criterion) {
    for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
        let mut group = c.benchmark_group(format!("f32_{metric:?}"));
        for dims in [128, 256, 512, 768, 1024, 1536].iter() {
            let (a, b) = generate_vectors(*dims);
            group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
                bencher.iter(|| distance(black_box(&a), black_box(&b), metric))
            });
        }
        group.finish();
    }
}

fn bench_f8(c: &mut Criterion) {
    let mut group = c.benchmark_group("f8_cosine");
    for dims in [128, 256, 512, 768, 1024, 1536].iter() {
        let (a, b) = generate_vectors(*dims);
        let a = a.convert_to(VectorType::Float8);
        let b = b.convert_to(VectorType::Float8);
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| distance(black_box(&a), black_box(&b), DistanceMetric::Cosine))
        });
    }
    group.finish();
}

fn bench_bit1(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit1_hamming");
    for dims in [128, 256, 512, 768, 1024, 1536].iter() {
        let (a, b) = generate_vectors(*dims);
        let a = a.convert_to(VectorType::Bit1);
        let b = b.convert_to(VectorType::Bit1);
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| distance(black_box(&a), black_box(&b), DistanceMetric::Cosine))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_f32, bench_f8, bench_bit1);
criterion_main!(benches);
