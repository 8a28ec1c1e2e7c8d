//! Conservative area-weighted engine.
//!
//! Every target face is projected onto the plane of each candidate source
//! face and clipped against it (Sutherland–Hodgman); the area of what is left
//! is the overlap. Source faces are expected to be convex, which is what the
//! clipper needs. Candidates are pre-filtered by a facing test and by their
//! bounding spheres.

use crate::engine::{
    AmiEngine, AmiInstance, AmiSettings, face_bounds, facing, spheres_overlap, transpose_rows,
};
use crate::geometry::tensor::{Vec3, add, cross, dot, mag, scale, sub};
use crate::topology::patch::{FaceSurface, polygon_centre_and_area};

/// Overlap-area weights: raw weight = overlap area / face area.
#[derive(Clone, Copy, Debug)]
pub struct FaceAreaWeightEngine {
    /// Overlaps smaller than this fraction of both faces are dropped.
    pub min_overlap_fraction: f64,
}

impl Default for FaceAreaWeightEngine {
    fn default() -> Self {
        Self {
            min_overlap_fraction: 1e-10,
        }
    }
}

/// Orthogonal projection of `p` onto the plane through `origin` with unit normal `n`.
fn project(p: Vec3, origin: Vec3, n: Vec3) -> Vec3 {
    sub(p, scale(n, dot(sub(p, origin), n)))
}

/// Clip `subject` against the convex `clip` polygon whose unit normal is `n`.
///
/// Both polygons lie in one plane. `clip` may be wound either way about `n`.
pub(crate) fn clip_polygon(subject: &[Vec3], clip: &[Vec3], n: Vec3) -> Vec<Vec3> {
    let (_, clip_area) = polygon_centre_and_area(clip);
    let winding = if dot(clip_area, n) >= 0.0 { 1.0 } else { -1.0 };

    let mut output = subject.to_vec();
    for k in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let a = clip[k];
        let b = clip[(k + 1) % clip.len()];
        let inward = scale(cross(n, sub(b, a)), winding);
        let side = |p: Vec3| dot(inward, sub(p, a));

        let input = std::mem::take(&mut output);
        for (m, &cur) in input.iter().enumerate() {
            let prev = input[(m + input.len() - 1) % input.len()];
            let (d_cur, d_prev) = (side(cur), side(prev));
            if d_cur >= 0.0 {
                if d_prev < 0.0 {
                    output.push(intersect(prev, cur, d_prev, d_cur));
                }
                output.push(cur);
            } else if d_prev >= 0.0 {
                output.push(intersect(prev, cur, d_prev, d_cur));
            }
        }
    }
    output
}

fn intersect(p: Vec3, q: Vec3, dp: f64, dq: f64) -> Vec3 {
    let t = dp / (dp - dq);
    add(p, scale(sub(q, p), t))
}

/// Area of the part of `tgt_poly` that overlaps `src_poly` when projected onto its plane.
pub(crate) fn overlap_area(src_poly: &[Vec3], src_centre: Vec3, src_normal: Vec3, tgt_poly: &[Vec3]) -> f64 {
    let projected: Vec<Vec3> = tgt_poly
        .iter()
        .map(|p| project(*p, src_centre, src_normal))
        .collect();
    let clipped = clip_polygon(&projected, src_poly, src_normal);
    if clipped.len() < 3 {
        return 0.0;
    }
    mag(polygon_centre_and_area(&clipped).1)
}

impl AmiEngine for FaceAreaWeightEngine {
    fn build(&self, src: &FaceSurface, tgt: &FaceSurface, settings: &AmiSettings) -> AmiInstance {
        let (src_normals, src_radii) = face_bounds(src);
        let (tgt_normals, tgt_radii) = face_bounds(tgt);
        let src_mag = src.mag_areas();
        let tgt_mag = tgt.mag_areas();

        let mut src_address = vec![Vec::new(); src.len()];
        let mut src_overlap = vec![Vec::new(); src.len()];
        for i in 0..src.len() {
            let Some(n_i) = src_normals[i] else { continue };
            let c_i = src.centres()[i];
            for j in 0..tgt.len() {
                let Some(n_j) = tgt_normals[j] else { continue };
                if !facing(n_i, n_j, settings.reverse_target)
                    || !spheres_overlap(c_i, src_radii[i], tgt.centres()[j], tgt_radii[j])
                {
                    continue;
                }
                let area = overlap_area(&src.polygons()[i], c_i, n_i, &tgt.polygons()[j]);
                if area > self.min_overlap_fraction * src_mag[i].min(tgt_mag[j]) {
                    src_address[i].push(j);
                    src_overlap[i].push(area);
                }
            }
        }

        let (tgt_address, tgt_overlap) = transpose_rows(&src_address, &src_overlap, tgt.len());
        let to_weights = |overlaps: Vec<Vec<f64>>, areas: &[f64]| -> Vec<Vec<f64>> {
            overlaps
                .into_iter()
                .zip(areas)
                .map(|(row, &a)| row.into_iter().map(|o| o / a).collect())
                .collect()
        };
        let src_weights = to_weights(src_overlap, &src_mag);
        let tgt_weights = to_weights(tgt_overlap, &tgt_mag);

        let mut ami = AmiInstance::new(src_address, src_weights, tgt_address, tgt_weights);
        ami.set_low_weight_correction(settings.low_weight_correction);
        ami
    }
}
