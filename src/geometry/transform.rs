//! Rigid-body transforms `x ↦ R·x + t`.

use crate::algs::wire::WireTransform;
use crate::geometry::tensor::{
    IDENTITY, Tensor, Vec3, ZERO, add, mag, max_abs_diff, sub, tensor_dot, tensor_dot_vec,
    transpose,
};
use serde::{Deserialize, Serialize};

/// A rotation (optional) followed by a translation.
///
/// `rotation == None` is the identity, which keeps pure translations exact.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: Option<Tensor>,
    pub translation: Vec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub const fn identity() -> Self {
        Self {
            rotation: None,
            translation: ZERO,
        }
    }

    pub const fn translation(t: Vec3) -> Self {
        Self {
            rotation: None,
            translation: t,
        }
    }

    /// Rotation `r` about the point `centre`: `x ↦ r·(x − c) + c`.
    pub fn rotation_about(r: Tensor, centre: Vec3) -> Self {
        Self {
            rotation: Some(r),
            translation: sub(centre, tensor_dot_vec(&r, centre)),
        }
    }

    pub fn transform_position(&self, x: Vec3) -> Vec3 {
        add(self.transform_vector(x), self.translation)
    }

    /// Transform a direction or area vector (rotation only).
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        match &self.rotation {
            Some(r) => tensor_dot_vec(r, v),
            None => v,
        }
    }

    pub fn inverse(&self) -> Self {
        match &self.rotation {
            Some(r) => {
                let rt = transpose(r);
                let t = tensor_dot_vec(&rt, self.translation);
                Self {
                    rotation: Some(rt),
                    translation: [-t[0], -t[1], -t[2]],
                }
            }
            None => Self::translation([
                -self.translation[0],
                -self.translation[1],
                -self.translation[2],
            ]),
        }
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    pub fn compose(&self, inner: &Self) -> Self {
        let rotation = match (&self.rotation, &inner.rotation) {
            (Some(a), Some(b)) => Some(tensor_dot(a, b)),
            (Some(a), None) => Some(*a),
            (None, Some(b)) => Some(*b),
            (None, None) => None,
        };
        Self {
            rotation,
            translation: self.transform_position(inner.translation),
        }
    }

    /// `self` applied `n` times; negative `n` applies the inverse.
    pub fn power(&self, n: i32) -> Self {
        let step = if n < 0 { self.inverse() } else { *self };
        (0..n.unsigned_abs()).fold(Self::identity(), |acc, _| step.compose(&acc))
    }

    pub fn rotation_tensor(&self) -> Tensor {
        self.rotation.unwrap_or(IDENTITY)
    }

    /// True when rotation and translation are both (numerically) absent.
    pub fn is_identity(&self, tol: f64) -> bool {
        let rot_ok = self
            .rotation
            .as_ref()
            .map_or(true, |r| max_abs_diff(r, &IDENTITY) <= tol);
        rot_ok && mag(self.translation) <= tol
    }

    /// Component-wise comparison with absolute tolerance `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        max_abs_diff(&self.rotation_tensor(), &other.rotation_tensor()) <= tol
            && self
                .translation
                .iter()
                .zip(other.translation.iter())
                .all(|(a, b)| (a - b).abs() <= tol)
    }

    pub fn to_wire(&self) -> WireTransform {
        WireTransform {
            rotation: self.rotation_tensor(),
            translation: self.translation,
            has_rotation_le: u64::from(self.rotation.is_some()).to_le(),
        }
    }

    pub fn from_wire(w: &WireTransform) -> Self {
        Self {
            rotation: (u64::from_le(w.has_rotation_le) != 0).then_some(w.rotation),
            translation: w.translation,
        }
    }
}
