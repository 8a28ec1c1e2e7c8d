use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use mesh_ami::engine::{AmiEngine, AmiSettings, FaceAreaWeightEngine, NearestFaceEngine};
use mesh_ami::topology::patch::FaceSurface;

/// `n × n` unit quads in the plane `z = 0`, interior points jittered by up to `jitter`.
fn jittered_grid(n: usize, up: bool, jitter: f64, seed: u64) -> FaceSurface {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            let interior = i > 0 && i < n && j > 0 && j < n;
            let (dx, dy) = if interior {
                (rng.gen_range(-jitter..jitter), rng.gen_range(-jitter..jitter))
            } else {
                (0.0, 0.0)
            };
            points.push([i as f64 + dx, j as f64 + dy, 0.0]);
        }
    }
    let p = |i: usize, j: usize| points[j * (n + 1) + i];
    let mut polygons = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let mut face = vec![p(i, j), p(i + 1, j), p(i + 1, j + 1), p(i, j + 1)];
            if !up {
                face.reverse();
            }
            polygons.push(face);
        }
    }
    FaceSurface::new(polygons, (0..n * n).collect()).expect("valid grid")
}

fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("ami_build");
    let settings = AmiSettings::default();

    for &n in &[8usize, 16, 32] {
        let src = jittered_grid(n, true, 0.2, 1);
        let tgt = jittered_grid(n, false, 0.2, 2);

        group.bench_with_input(BenchmarkId::new("face_area", n), &n, |b, _| {
            let engine = FaceAreaWeightEngine::default();
            b.iter(|| black_box(engine.build(&src, &tgt, &settings)));
        });
        group.bench_with_input(BenchmarkId::new("nearest_face", n), &n, |b, _| {
            b.iter(|| black_box(NearestFaceEngine.build(&src, &tgt, &settings)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engines);
criterion_main!(benches);
