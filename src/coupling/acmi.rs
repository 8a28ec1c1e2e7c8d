//! Overlap masks for partially overlapping pairs.
//!
//! A face's coverage (its raw weight sum) becomes its mask. The overlap patch
//! keeps `mask` of its geometric area and its non-overlap companion takes the
//! remaining `1 − mask`, so the two always add up to the original face. The
//! weights themselves are normalised to one; coverage lives in the areas.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{reduce_sum_count, tags};
use crate::engine::AmiInstance;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::Patch;
use itertools::izip;

/// Masks of both halves, one value per local face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlapMasks {
    pub owner: Vec<f64>,
    pub neighbour: Vec<f64>,
}

/// Clamp coverage into `(tol, 1 − tol)`.
pub fn clamp_mask(weights_sum: &[f64], tol: f64) -> Vec<f64> {
    weights_sum.iter().map(|s| s.clamp(tol, 1.0 - tol)).collect()
}

/// Masks from the raw weight sums of a local AMI.
pub fn compute_masks(ami: &AmiInstance, tol: f64) -> OverlapMasks {
    OverlapMasks {
        owner: clamp_mask(ami.src_weights_sum(), tol),
        neighbour: clamp_mask(ami.tgt_weights_sum(), tol),
    }
}

/// The companion must mirror `patch` face by face on every rank.
///
/// Collective: the mismatch count is summed so that all ranks fail together.
pub fn check_companion<C: Communicator>(
    comm: &C,
    patch: &Patch,
    companion: &Patch,
) -> Result<(), MeshAmiError> {
    let local_mismatch = usize::from(patch.len() != companion.len());
    if reduce_sum_count(comm, tags::FACE_COUNT, local_mismatch)? > 0 {
        return Err(MeshAmiError::CompanionSizeMismatch {
            patch: patch.name().to_owned(),
            companion: companion.name().to_owned(),
            expected: patch.len(),
            found: companion.len(),
        });
    }
    Ok(())
}

/// Scale `patch` to `mask` and `companion` to `1 − mask`, both from base areas.
///
/// An empty mask (no local faces) leaves both untouched.
pub fn apply_mask(patch: &mut Patch, companion: &mut Patch, mask: &[f64]) -> Result<(), MeshAmiError> {
    if mask.is_empty() {
        return Ok(());
    }
    let complement: Vec<f64> = mask.iter().map(|m| 1.0 - m).collect();
    patch.scale_face_areas(mask)?;
    companion.scale_face_areas(&complement)
}

/// `mask·coupled + (1 − mask)·other`, face by face.
pub fn blend(coupled: &[f64], other: &[f64], mask: &[f64]) -> Result<Vec<f64>, MeshAmiError> {
    if other.len() != coupled.len() || mask.len() != coupled.len() {
        return Err(MeshAmiError::SizeMismatch {
            what: "blended values",
            expected: coupled.len(),
            found: other.len().min(mask.len()),
        });
    }
    Ok(izip!(coupled, other, mask)
        .map(|(c, o, m)| m * c + (1.0 - m) * o)
        .collect())
}
