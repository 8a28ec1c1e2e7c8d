//! Nearest-face engine: each face takes its closest facing partner, weight one.

use crate::engine::{AmiEngine, AmiInstance, AmiSettings, face_bounds, facing, spheres_overlap};
use crate::geometry::tensor::{Vec3, mag_sqr, sub};
use crate::topology::patch::FaceSurface;

#[derive(Clone, Copy, Debug, Default)]
pub struct NearestFaceEngine;

/// For every face of `from`, the index of the nearest candidate face of `to`.
///
/// Candidates must face `from`'s face and have intersecting bounding spheres.
/// Ties go to the lower index.
fn nearest_rows(
    from: &FaceSurface,
    to: &FaceSurface,
    reverse_to: bool,
) -> Vec<Vec<usize>> {
    let (from_normals, from_radii) = face_bounds(from);
    let (to_normals, to_radii) = face_bounds(to);
    let to_centres: &[Vec3] = to.centres();

    (0..from.len())
        .map(|i| {
            let Some(n_i) = from_normals[i] else {
                return Vec::new();
            };
            let c_i = from.centres()[i];
            let mut best: Option<(usize, f64)> = None;
            for j in 0..to.len() {
                let Some(n_j) = to_normals[j] else { continue };
                if !facing(n_i, n_j, reverse_to)
                    || !spheres_overlap(c_i, from_radii[i], to_centres[j], to_radii[j])
                {
                    continue;
                }
                let d = mag_sqr(sub(to_centres[j], c_i));
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((j, d));
                }
            }
            best.map(|(j, _)| vec![j]).unwrap_or_default()
        })
        .collect()
}

impl AmiEngine for NearestFaceEngine {
    fn build(&self, src: &FaceSurface, tgt: &FaceSurface, settings: &AmiSettings) -> AmiInstance {
        let src_address = nearest_rows(src, tgt, settings.reverse_target);
        let tgt_address = nearest_rows(tgt, src, settings.reverse_target);
        let ones = |rows: &[Vec<usize>]| -> Vec<Vec<f64>> {
            rows.iter().map(|r| vec![1.0; r.len()]).collect()
        };
        let src_weights = ones(&src_address);
        let tgt_weights = ones(&tgt_address);
        let mut ami = AmiInstance::new(src_address, src_weights, tgt_address, tgt_weights);
        ami.set_low_weight_correction(settings.low_weight_correction);
        ami
    }
}
