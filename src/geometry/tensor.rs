//! Small dense vector and tensor helpers.
//!
//! Vectors are `[f64; 3]`; tensors are row-major `[f64; 9]`, so `t[3 * i + j]`
//! is row `i`, column `j`.

pub type Vec3 = [f64; 3];
pub type Tensor = [f64; 9];

pub const ZERO: Vec3 = [0.0, 0.0, 0.0];
pub const IDENTITY: Tensor = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Magnitudes below this are treated as zero.
pub const SMALL: f64 = 1e-15;

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn mag_sqr(a: Vec3) -> f64 {
    dot(a, a)
}

#[inline]
pub fn mag(a: Vec3) -> f64 {
    mag_sqr(a).sqrt()
}

/// Unit vector along `a`, or `None` for a (near) zero vector.
pub fn normalised(a: Vec3) -> Option<Vec3> {
    let m = mag(a);
    (m > SMALL).then(|| scale(a, 1.0 / m))
}

/// Component of `a` normal to the unit vector `axis`.
pub fn perpendicular(a: Vec3, axis: Vec3) -> Vec3 {
    sub(a, scale(axis, dot(a, axis)))
}

pub fn transpose(t: &Tensor) -> Tensor {
    [t[0], t[3], t[6], t[1], t[4], t[7], t[2], t[5], t[8]]
}

pub fn tensor_dot_vec(t: &Tensor, v: Vec3) -> Vec3 {
    [
        t[0] * v[0] + t[1] * v[1] + t[2] * v[2],
        t[3] * v[0] + t[4] * v[1] + t[5] * v[2],
        t[6] * v[0] + t[7] * v[1] + t[8] * v[2],
    ]
}

pub fn tensor_dot(a: &Tensor, b: &Tensor) -> Tensor {
    let mut out = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            out[3 * i + j] = (0..3).map(|k| a[3 * i + k] * b[3 * k + j]).sum();
        }
    }
    out
}

/// Tensor whose rows are `r0`, `r1`, `r2`.
pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Tensor {
    [r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], r2[0], r2[1], r2[2]]
}

/// Largest absolute component difference between two tensors.
pub fn max_abs_diff(a: &Tensor, b: &Tensor) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Rotation by `angle` radians about the unit vector `axis` (Rodrigues' formula).
///
/// `R = cos θ I + sin θ [k]× + (1 − cos θ) k kᵀ`
pub fn rotation_tensor(axis: Vec3, angle: f64) -> Tensor {
    let (s, c) = angle.sin_cos();
    let [x, y, z] = axis;
    let t = 1.0 - c;
    [
        c + t * x * x,
        t * x * y - s * z,
        t * x * z + s * y,
        t * x * y + s * z,
        c + t * y * y,
        t * y * z - s * x,
        t * x * z - s * y,
        t * y * z + s * x,
        c + t * z * z,
    ]
}

/// Signed rotation angle (radians) of `rotation` about the unit `axis`.
///
/// Measured on a unit vector normal to the axis, so only meaningful for
/// rotations that keep `axis` fixed.
pub fn rotation_angle(rotation: &Tensor, axis: Vec3) -> f64 {
    let trial = if axis[0].abs() < 0.9 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let u = normalised(perpendicular(trial, axis)).unwrap_or([0.0, 0.0, 1.0]);
    let v = tensor_dot_vec(rotation, u);
    dot(axis, cross(u, v)).atan2(dot(u, v))
}
