#![allow(dead_code)]
use mesh_ami::{
    algs::communicator::LocalComm,
    data::dict::PatchDict,
    geometry::tensor::Vec3,
    topology::patch::Patch,
};
use rand::Rng;
use rand::rngs::SmallRng;

/// Structured grid of `nx × ny` quads covering `origin .. origin + extent` in the plane `z`.
///
/// `up` selects a +z normal; otherwise faces are wound for −z.
pub fn grid_patch(
    name: &str,
    nx: usize,
    ny: usize,
    origin: [f64; 2],
    extent: [f64; 2],
    z: f64,
    up: bool,
    dict: PatchDict,
) -> Patch {
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            points.push([
                origin[0] + extent[0] * i as f64 / nx as f64,
                origin[1] + extent[1] * j as f64 / ny as f64,
                z,
            ]);
        }
    }
    let p = |i: usize, j: usize| j * (nx + 1) + i;
    let mut faces = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let mut f = vec![p(i, j), p(i + 1, j), p(i + 1, j + 1), p(i, j + 1)];
            if !up {
                f.reverse();
            }
            faces.push(f);
        }
    }
    Patch::new(name, points, faces, dict).unwrap()
}

/// Unit-width strip of `n` unit quads from `x0` along x in the plane `z = 0`.
pub fn strip(name: &str, n: usize, x0: f64, up: bool, dict: PatchDict) -> Patch {
    grid_patch(name, n, 1, [x0, 0.0], [n as f64, 1.0], 0.0, up, dict)
}

/// Annular sector in the plane `z = 0` between radii `r` and angles `theta_deg`.
pub fn annulus_patch(
    name: &str,
    n_r: usize,
    n_t: usize,
    r: [f64; 2],
    theta_deg: [f64; 2],
    up: bool,
    dict: PatchDict,
) -> Patch {
    let mut points = Vec::new();
    for j in 0..=n_t {
        let t = (theta_deg[0] + (theta_deg[1] - theta_deg[0]) * j as f64 / n_t as f64).to_radians();
        for i in 0..=n_r {
            let radius = r[0] + (r[1] - r[0]) * i as f64 / n_r as f64;
            points.push([radius * t.cos(), radius * t.sin(), 0.0]);
        }
    }
    let p = |i: usize, j: usize| j * (n_r + 1) + i;
    let mut faces = Vec::new();
    for j in 0..n_t {
        for i in 0..n_r {
            let mut f = vec![p(i, j), p(i + 1, j), p(i + 1, j + 1), p(i, j + 1)];
            if !up {
                f.reverse();
            }
            faces.push(f);
        }
    }
    Patch::new(name, points, faces, dict).unwrap()
}

/// Patch in the half-plane through the z axis at angle `deg`, `nr × nz` quads
/// over radii 1..2 and heights 0..1.
///
/// Unreversed, the normal is `−e_θ`; a sector's low-angle side uses that, its
/// high-angle side is `reversed`.
pub fn radial_patch(name: &str, deg: f64, nr: usize, nz: usize, reversed: bool, dict: PatchDict) -> Patch {
    let (s, c) = deg.to_radians().sin_cos();
    let mut points = Vec::new();
    for j in 0..=nz {
        for i in 0..=nr {
            let radius = 1.0 + i as f64 / nr as f64;
            points.push([radius * c, radius * s, j as f64 / nz as f64]);
        }
    }
    let p = |i: usize, j: usize| j * (nr + 1) + i;
    let mut faces = Vec::new();
    for j in 0..nz {
        for i in 0..nr {
            let mut f = vec![p(i, j), p(i + 1, j), p(i + 1, j + 1), p(i, j + 1)];
            if reversed {
                f.reverse();
            }
            faces.push(f);
        }
    }
    Patch::new(name, points, faces, dict).unwrap()
}

/// Unit square in the plane `x = x`, normal `+x` when `positive`.
pub fn x_plane_patch(name: &str, x: f64, positive: bool, dict: PatchDict) -> Patch {
    let points = vec![[x, 0.0, 0.0], [x, 1.0, 0.0], [x, 1.0, 1.0], [x, 0.0, 1.0]];
    let mut face = vec![0, 1, 2, 3];
    if !positive {
        face.reverse();
    }
    Patch::new(name, points, vec![face], dict).unwrap()
}

/// A patch with no faces on this rank.
pub fn empty_patch(name: &str, dict: PatchDict) -> Patch {
    Patch::new(name, Vec::new(), Vec::new(), dict).unwrap()
}

/// A random owning rank for each of `n_faces` faces.
pub fn random_owners(n_faces: usize, parts: usize, rng: &mut SmallRng) -> Vec<usize> {
    (0..n_faces).map(|_| rng.gen_range(0..parts)).collect()
}

/// Split `patch` over `parts` ranks following `owners`, keeping global ids.
pub fn split(patch: &Patch, owners: &[usize], parts: usize) -> Vec<Patch> {
    let mut owned = vec![Vec::new(); parts];
    for (f, &rank) in owners.iter().enumerate() {
        owned[rank].push(f);
    }
    owned
        .iter()
        .map(|faces| patch.select_faces(faces).unwrap())
        .collect()
}

/// Scatter the faces of `patch` randomly over `parts` ranks.
pub fn decompose(patch: &Patch, parts: usize, rng: &mut SmallRng) -> Vec<Patch> {
    let owners = random_owners(patch.len(), parts, rng);
    split(patch, &owners, parts)
}

/// Run `f` on every rank of a fresh in-process job; results in rank order.
pub fn run_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(LocalComm) -> R + Sync,
{
    let world = LocalComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = world.into_iter().map(|comm| s.spawn(|| f(comm))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// `(global id, value)` pairs of every rank, reassembled in global order.
pub fn assemble(parts: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let n: usize = parts.iter().map(Vec::len).sum();
    let mut out = vec![f64::NAN; n];
    for &(g, v) in parts.iter().flatten() {
        out[g] = v;
    }
    out
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "{a} vs {b} (tol {tol})");
}

pub fn assert_vec_close(a: Vec3, b: Vec3, tol: f64) {
    for k in 0..3 {
        assert_close(a[k], b[k], tol);
    }
}
