//! Rigid-body transform between the two halves of a coupled pair.
//!
//! `reverse` maps owner geometry onto the neighbour, `forward` maps neighbour
//! geometry into the owner frame; one is the inverse of the other. Every
//! quantity that drives a decision here (representative faces, summed area
//! vectors) goes through a collective first, so all ranks resolve the same
//! transform.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{max_mag_sqr_pick, reduce_sum, reduce_sum_vec3, tags};
use crate::algs::wire::WireFarthestFace;
use crate::data::dict::{PatchDict, TransformKind};
use crate::geometry::tensor::{
    SMALL, Tensor, Vec3, ZERO, add, cross, from_rows, mag, mag_sqr, normalised, perpendicular,
    rotation_angle, rotation_tensor, scale, sub, tensor_dot, tensor_dot_vec, transpose,
};
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::Patch;
use log::{debug, warn};

/// Transform parameters declared on one patch, checked for completeness.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformConfig {
    pub kind: TransformKind,
    /// Unit axis (rotational only).
    pub axis: Vec3,
    pub centre: Vec3,
    pub angle_deg: Option<f64>,
    pub separation: Vec3,
    pub match_tolerance: f64,
}

impl TransformConfig {
    pub fn from_dict(
        patch: &str,
        dict: &PatchDict,
        default_match_tolerance: f64,
    ) -> Result<Self, MeshAmiError> {
        let mut cfg = Self {
            kind: dict.transform,
            axis: ZERO,
            centre: dict.rotation_centre.unwrap_or(ZERO),
            angle_deg: dict.rotation_angle,
            separation: ZERO,
            match_tolerance: dict.match_tolerance.unwrap_or(default_match_tolerance),
        };
        match dict.transform {
            TransformKind::None => {}
            TransformKind::Rotational => {
                let axis = dict.rotation_axis.ok_or_else(|| MeshAmiError::MissingRotationAxis {
                    patch: patch.to_owned(),
                })?;
                cfg.axis = normalised(axis).ok_or_else(|| {
                    MeshAmiError::DegenerateRotationAxis {
                        patch: patch.to_owned(),
                    }
                })?;
            }
            TransformKind::Translational => {
                cfg.separation =
                    dict.separation_vector
                        .ok_or_else(|| MeshAmiError::MissingSeparation {
                            patch: patch.to_owned(),
                        })?;
            }
        }
        Ok(cfg)
    }
}

/// Both halves of a pair must declare the same transform kind.
pub fn check_transform_kinds(
    owner: &str,
    owner_dict: &PatchDict,
    neighbour: &str,
    neighbour_dict: &PatchDict,
) -> Result<(), MeshAmiError> {
    if owner_dict.transform != neighbour_dict.transform {
        return Err(MeshAmiError::TransformKindMismatch {
            patch: owner.to_owned(),
            neighbour: neighbour.to_owned(),
            ours: owner_dict.transform,
            theirs: neighbour_dict.transform,
        });
    }
    Ok(())
}

/// Resolved transform of a coupled pair, as seen from one side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CyclicTransform {
    pub kind: TransformKind,
    /// This side onto the other side.
    pub reverse: RigidTransform,
    /// Other side into this side's frame.
    pub forward: RigidTransform,
    pub collocated: bool,
    pub rotation_axis: Option<Vec3>,
    pub rotation_centre: Option<Vec3>,
    /// Signed angle (degrees) of `reverse` about `rotation_axis`.
    pub rotation_angle_deg: Option<f64>,
    /// False when there was no geometry to infer the transform from.
    pub resolved: bool,
}

impl CyclicTransform {
    pub fn identity() -> Self {
        Self {
            kind: TransformKind::None,
            reverse: RigidTransform::identity(),
            forward: RigidTransform::identity(),
            collocated: true,
            rotation_axis: None,
            rotation_centre: None,
            rotation_angle_deg: None,
            resolved: true,
        }
    }

    fn translational(separation: Vec3) -> Self {
        let reverse = RigidTransform::translation(separation);
        Self {
            kind: TransformKind::Translational,
            reverse,
            forward: reverse.inverse(),
            collocated: false,
            ..Self::identity()
        }
    }

    fn rotational(reverse_rotation: Tensor, axis: Vec3, centre: Vec3, angle_deg: f64) -> Self {
        let reverse = RigidTransform::rotation_about(reverse_rotation, centre);
        Self {
            kind: TransformKind::Rotational,
            reverse,
            forward: reverse.inverse(),
            collocated: false,
            rotation_axis: Some(axis),
            rotation_centre: Some(centre),
            rotation_angle_deg: Some(angle_deg),
            resolved: true,
        }
    }

    pub fn reverse_rotation(&self) -> Option<Tensor> {
        self.reverse.rotation
    }

    pub fn forward_rotation(&self) -> Option<Tensor> {
        self.forward.rotation
    }

    /// Translation part of `reverse`.
    pub fn separation(&self) -> Vec3 {
        self.reverse.translation
    }

    /// The same transform seen from the other half of the pair.
    pub fn neighbour_view(&self) -> Self {
        Self {
            reverse: self.forward,
            forward: self.reverse,
            rotation_angle_deg: self.rotation_angle_deg.map(|a| -a),
            ..*self
        }
    }

    /// Write the resolved parameters into `dict` so a restart reproduces them.
    pub fn write_into(&self, dict: &mut PatchDict) {
        dict.transform = self.kind;
        match self.kind {
            TransformKind::None => {}
            TransformKind::Rotational => {
                dict.rotation_axis = self.rotation_axis;
                dict.rotation_centre = self.rotation_centre;
                if self.resolved {
                    dict.rotation_angle = self.rotation_angle_deg;
                }
            }
            TransformKind::Translational => {
                dict.separation_vector = Some(self.separation());
            }
        }
    }
}

/// Face of `patch` farthest from the rotation axis, with its unit normal.
fn farthest_face(patch: &Patch, axis: Vec3, centre: Vec3) -> Option<WireFarthestFace> {
    let mut best: Option<WireFarthestFace> = None;
    for (c, a) in patch.face_centres().iter().zip(patch.base_face_areas()) {
        let dist_sqr = mag_sqr(perpendicular(sub(*c, centre), axis));
        let Some(normal) = normalised(*a) else { continue };
        if best.is_none_or(|b| dist_sqr > b.dist_sqr) {
            best = Some(WireFarthestFace { dist_sqr, normal });
        }
    }
    best
}

/// Orthonormal frame with rows (axis, n×axis, n), `n` projected normal to the axis.
fn axis_frame(axis: Vec3, normal: Vec3, patch: &str) -> Result<Tensor, MeshAmiError> {
    let n = normalised(perpendicular(normal, axis)).ok_or_else(|| {
        MeshAmiError::InvalidGeometry(format!(
            "representative face normal of patch `{patch}` is parallel to the rotation axis"
        ))
    })?;
    Ok(from_rows(axis, cross(n, axis), n))
}

/// Sum of area vectors and of area magnitudes over the local faces.
fn local_area_sums(patch: &Patch) -> (Vec3, f64) {
    patch
        .base_face_areas()
        .iter()
        .fold((ZERO, 0.0), |(v, m), a| (add(v, *a), m + mag(*a)))
}

/// Resolve the transform of the pair `owner`/`neighbour` from the owner's config.
///
/// Collective: every rank must call this for the same pair at the same point.
pub fn resolve_transform<C: Communicator>(
    comm: &C,
    cfg: &TransformConfig,
    owner: &Patch,
    neighbour: &Patch,
) -> Result<CyclicTransform, MeshAmiError> {
    match cfg.kind {
        TransformKind::None => Ok(CyclicTransform::identity()),
        TransformKind::Translational => Ok(CyclicTransform::translational(cfg.separation)),
        TransformKind::Rotational => match cfg.angle_deg {
            Some(angle) => resolve_angle_sign(comm, cfg, angle, owner, neighbour),
            None => resolve_from_frames(comm, cfg, owner, neighbour),
        },
    }
}

fn resolve_from_frames<C: Communicator>(
    comm: &C,
    cfg: &TransformConfig,
    owner: &Patch,
    neighbour: &Patch,
) -> Result<CyclicTransform, MeshAmiError> {
    let own_local = farthest_face(owner, cfg.axis, cfg.centre);
    let nbr_local = farthest_face(neighbour, cfg.axis, cfg.centre);
    let own = max_mag_sqr_pick(comm, tags::FARTHEST_FACE, own_local, |f| f.dist_sqr)?;
    let nbr = max_mag_sqr_pick(comm, tags::FARTHEST_FACE, nbr_local, |f| f.dist_sqr)?;

    match (own, nbr) {
        (None, None) => {
            debug!(
                "rotational pair `{}`/`{}` has no faces; transform left unresolved",
                owner.name(),
                neighbour.name()
            );
            let mut t = CyclicTransform::rotational(
                rotation_tensor(cfg.axis, 0.0),
                cfg.axis,
                cfg.centre,
                0.0,
            );
            t.resolved = false;
            Ok(t)
        }
        (Some((_, a)), Some((_, b))) => {
            let e0 = axis_frame(cfg.axis, a.normal, owner.name())?;
            let e1 = axis_frame(cfg.axis, scale(b.normal, -1.0), neighbour.name())?;
            let reverse = tensor_dot(&transpose(&e1), &e0);
            let angle = rotation_angle(&reverse, cfg.axis).to_degrees();
            debug!(
                "rotational pair `{}`/`{}`: inferred angle {angle:.6} deg",
                owner.name(),
                neighbour.name()
            );
            Ok(CyclicTransform::rotational(reverse, cfg.axis, cfg.centre, angle))
        }
        _ => Err(MeshAmiError::InvalidGeometry(format!(
            "rotational pair `{}`/`{}`: one side has faces and the other has none",
            owner.name(),
            neighbour.name()
        ))),
    }
}

fn resolve_angle_sign<C: Communicator>(
    comm: &C,
    cfg: &TransformConfig,
    angle_deg: f64,
    owner: &Patch,
    neighbour: &Patch,
) -> Result<CyclicTransform, MeshAmiError> {
    let (own_vec, own_mag) = local_area_sums(owner);
    let (nbr_vec, _) = local_area_sums(neighbour);
    let own_vec = reduce_sum_vec3(comm, tags::AREA_SUM, own_vec)?;
    let nbr_vec = reduce_sum_vec3(comm, tags::AREA_SUM, nbr_vec)?;
    let own_mag = reduce_sum(comm, tags::AREA_SUM, own_mag)?;

    // matched faces cancel: forward(Σ A_nbr) + Σ A_own ≈ 0
    let residual = |r: &Tensor| {
        let err = mag(add(tensor_dot_vec(&transpose(r), nbr_vec), own_vec));
        if own_mag > SMALL { err / own_mag } else { 0.0 }
    };
    let theta = angle_deg.to_radians();
    let plus = rotation_tensor(cfg.axis, theta);
    let minus = rotation_tensor(cfg.axis, -theta);
    let (err_plus, err_minus) = (residual(&plus), residual(&minus));
    let (rotation, signed, err) = if err_minus < err_plus {
        (minus, -angle_deg, err_minus)
    } else {
        (plus, angle_deg, err_plus)
    };

    if err > cfg.match_tolerance {
        warn!(
            "rotational pair `{}`/`{}`: area mismatch {err:.3e} exceeds matchTolerance {:.3e} \
             (angle {signed} deg); check rotationAxis, rotationCentre and rotationAngle",
            owner.name(),
            neighbour.name(),
            cfg.match_tolerance
        );
    }
    Ok(CyclicTransform::rotational(rotation, cfg.axis, cfg.centre, signed))
}
