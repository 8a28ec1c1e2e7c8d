//! Repeat-count discovery for periodic families.
//!
//! The owner and neighbour of a repeat pair are `n` applications of a base
//! transform `T` apart, `T` being the transform of a separate coupled patch
//! (the transform patch). `n` is found by walking the owner centroid towards
//! the neighbour centroid, then the candidates `T^(n−1)`, `T^n`, `T^(n+1)` are
//! each built and scored by coverage. The centre and the better of its two
//! neighbours are kept and merged, so a face straddling a period boundary
//! takes contributions from both.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{Consensus, keep_first_valid, tags};
use crate::coupling::{Side, side_rows};
use crate::coupling::ami::{build_global, gather_surface, localise};
use crate::engine::instance::interpolate_rows;
use crate::engine::{AmiEngine, AmiInstance, AmiSettings};
use crate::geometry::tensor::{Vec3, mag, sub};
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::Patch;
use log::{info, warn};

/// Resolved repeat count, candidate transforms and the retained merged pair.
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatState {
    n: i32,
    base: RigidTransform,
    candidates: [RigidTransform; 3],
    scores: [f64; 3],
    retained: [usize; 2],
    amis: [AmiInstance; 2],
    src_weights_sum: Vec<f64>,
    tgt_weights_sum: Vec<f64>,
}

impl RepeatState {
    /// Number of base-transform applications from owner to neighbour.
    pub fn n(&self) -> i32 {
        self.n
    }

    pub fn base(&self) -> &RigidTransform {
        &self.base
    }

    /// `T^(n−1)`, `T^n`, `T^(n+1)`.
    pub fn candidates(&self) -> &[RigidTransform; 3] {
        &self.candidates
    }

    /// Coverage scores of the three candidates.
    pub fn scores(&self) -> [f64; 3] {
        self.scores
    }

    /// Repeat counts of the two retained candidates, centre first.
    pub fn retained_n(&self) -> [i32; 2] {
        self.retained.map(|k| self.n - 1 + k as i32)
    }

    /// Retained instances (local rows), weights already merged.
    pub fn amis(&self) -> &[AmiInstance; 2] {
        &self.amis
    }

    /// Combined raw coverage of each local face on `side`.
    pub fn weights_sum(&self, side: Side) -> &[f64] {
        match side {
            Side::Owner => &self.src_weights_sum,
            Side::Neighbour => &self.tgt_weights_sum,
        }
    }

    /// Sum of both retained interpolations of `donor` (ordered by global id).
    pub fn interpolate(
        &self,
        side: Side,
        donor: &[f64],
        default_values: Option<&[f64]>,
        low_weight_correction: f64,
    ) -> Result<Vec<f64>, MeshAmiError> {
        let mut out = interpolate_rows(side_rows(&self.amis[0], side), donor, None, -1.0)?;
        let other = interpolate_rows(side_rows(&self.amis[1], side), donor, None, -1.0)?;
        out.iter_mut().zip(other).for_each(|(a, b)| *a += b);
        if low_weight_correction > 0.0 {
            if let Some(defaults) = default_values {
                if defaults.len() != out.len() {
                    return Err(MeshAmiError::SizeMismatch {
                        what: "default values",
                        expected: out.len(),
                        found: defaults.len(),
                    });
                }
                for ((v, &s), &d) in out.iter_mut().zip(self.weights_sum(side)).zip(defaults) {
                    if s < low_weight_correction {
                        *v = d;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Agree on the transform patch's transform across ranks.
///
/// `local` is `Some` only on ranks holding faces of the transform patch.
/// Collective.
pub fn agree_transform_patch<C: Communicator>(
    comm: &C,
    patch: &str,
    transform_patch: &str,
    local: Option<RigidTransform>,
    tol: f64,
) -> Result<RigidTransform, MeshAmiError> {
    let consensus = keep_first_valid(
        comm,
        tags::TRANSFORM_PATCH,
        local.map(|t| t.to_wire()),
        |a, b| RigidTransform::from_wire(a).approx_eq(&RigidTransform::from_wire(b), tol),
    )?;
    let base = match consensus {
        Consensus::Empty => {
            return Err(MeshAmiError::EmptyTransformPatch {
                patch: patch.to_owned(),
                transform_patch: transform_patch.to_owned(),
            });
        }
        Consensus::Conflict {
            first_rank,
            other_rank,
            ..
        } => {
            return Err(MeshAmiError::NonUniformTransformPatch {
                patch: patch.to_owned(),
                transform_patch: transform_patch.to_owned(),
                first_rank,
                other_rank,
            });
        }
        Consensus::Uniform { value, .. } => RigidTransform::from_wire(&value),
    };
    if base.is_identity(tol) {
        return Err(MeshAmiError::InvalidTransformPatch {
            patch: patch.to_owned(),
            transform_patch: transform_patch.to_owned(),
            reason: "has an identity transform",
        });
    }
    Ok(base)
}

/// Step `n` while `|T^n(source) − target|` strictly decreases, upwards first.
///
/// Returns the count and whether the walk stopped at `cap`.
pub fn walk_repeat_count(base: &RigidTransform, source: Vec3, target: Vec3, cap: usize) -> (i32, bool) {
    let distance = |p: Vec3| mag(sub(p, target));
    let inverse = base.inverse();
    let mut n = 0i32;
    let mut at = source;
    let mut best = distance(at);

    for (step, dir) in [(base, 1), (&inverse, -1)] {
        let mut taken = 0;
        loop {
            let next = step.transform_position(at);
            let d = distance(next);
            if d >= best {
                break;
            }
            if taken == cap {
                return (n, true);
            }
            at = next;
            best = d;
            n += dir;
            taken += 1;
        }
        if taken > 0 {
            break;
        }
    }
    (n, false)
}

/// Walk, build the three candidates, keep two and merge them.
///
/// Collective; every rank obtains the same state restricted to its local rows.
pub fn resolve_repeat<C: Communicator>(
    comm: &C,
    engine: &dyn AmiEngine,
    owner: &Patch,
    neighbour: &Patch,
    base: RigidTransform,
    settings: &AmiSettings,
    max_walk: usize,
) -> Result<RepeatState, MeshAmiError> {
    let src = gather_surface(comm, owner.name(), &owner.surface())?;
    let tgt = gather_surface(comm, neighbour.name(), &neighbour.surface())?;
    let (c_src, _) = src.centroid();
    let (c_tgt, _) = tgt.centroid();

    let (n, capped) = walk_repeat_count(&base, c_src, c_tgt, max_walk);
    if capped {
        warn!(
            "repeat pair `{}`/`{}`: repeat-count walk stopped after {max_walk} steps at n = {n}",
            owner.name(),
            neighbour.name()
        );
    }

    let candidates = [base.power(n - 1), base.power(n), base.power(n + 1)];
    let src_areas = src.mag_areas();
    let mut amis = Vec::with_capacity(3);
    let mut scores = [0.0; 3];
    for (k, t) in candidates.iter().enumerate() {
        let mapped = tgt.transformed(&t.inverse());
        let ami = build_global(engine, owner.name(), neighbour.name(), &src, &mapped, settings)?;
        scores[k] = ami.src_coverage(&src_areas);
        amis.push(ami);
    }
    info!(
        "repeat pair `{}`/`{}`: n = {n}, coverage of n-1/n/n+1 = {:.6}/{:.6}/{:.6}",
        owner.name(),
        neighbour.name(),
        scores[0],
        scores[1],
        scores[2]
    );

    let side = if scores[0] >= scores[2] { 0 } else { 2 };
    let retained = [1, side];
    let mut centre = std::mem::take(&mut amis[1]);
    let mut other = std::mem::take(&mut amis[side]);

    let combined = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x + y).collect() };
    let src_sum = combined(centre.src_weights_sum(), other.src_weights_sum());
    let tgt_sum = combined(centre.tgt_weights_sum(), other.tgt_weights_sum());
    centre.normalise_by(Some(src_sum.as_slice()), Some(tgt_sum.as_slice()));
    other.normalise_by(Some(src_sum.as_slice()), Some(tgt_sum.as_slice()));

    let pick = |sums: &[f64], ids: &[usize]| -> Vec<f64> { ids.iter().map(|&g| sums[g]).collect() };
    Ok(RepeatState {
        n,
        base,
        candidates,
        scores,
        retained,
        amis: [
            localise(&centre, owner, neighbour),
            localise(&other, owner, neighbour),
        ],
        src_weights_sum: pick(&src_sum, owner.global_ids()),
        tgt_weights_sum: pick(&tgt_sum, neighbour.global_ids()),
    })
}
