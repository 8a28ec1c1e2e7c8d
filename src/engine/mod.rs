//! Weight engines: turn two face surfaces into an [`AmiInstance`].
//!
//! Engines are pure geometry. They see the source surface and the target
//! surface already placed in a common frame, and return *raw* weights; the
//! coupling layer decides on normalisation, masking and repeat merging.
//!
//! Two engines ship with the crate, selected through [`AmiMethod`]:
//! [`FaceAreaWeightEngine`] (conservative, overlap-area based) and
//! [`NearestFaceEngine`] (one partner per face). Anything implementing
//! [`AmiEngine`] can be installed on a boundary mesh instead.

pub mod face_area;
pub mod instance;
pub mod nearest;

pub use face_area::FaceAreaWeightEngine;
pub use instance::{AmiInstance, AmiRows};
pub use nearest::NearestFaceEngine;

use crate::data::dict::AmiMethod;
use crate::geometry::tensor::{SMALL, Vec3, dot, mag, scale, sub};
use crate::topology::patch::FaceSurface;

/// Per-interface options handed to an engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmiSettings {
    pub method: AmiMethod,
    /// Checked by the coupling layer on the assembled interface, not by engines.
    pub require_match: bool,
    pub low_weight_correction: f64,
    /// Flip target normals before the facing test.
    pub reverse_target: bool,
}

impl Default for AmiSettings {
    fn default() -> Self {
        Self {
            method: AmiMethod::FaceAreaWeight,
            require_match: true,
            low_weight_correction: -1.0,
            reverse_target: false,
        }
    }
}

/// Builds interpolation weights between two surfaces.
///
/// Addresses in the returned instance are positions in `tgt` (for source
/// rows) and in `src` (for target rows). Implementations must be
/// deterministic: every rank calls them on the same input and relies on
/// getting the same output.
pub trait AmiEngine: Send + Sync {
    fn build(&self, src: &FaceSurface, tgt: &FaceSurface, settings: &AmiSettings) -> AmiInstance;
}

/// The built-in engine for `method`.
pub fn engine_for(method: AmiMethod) -> Box<dyn AmiEngine> {
    match method {
        AmiMethod::FaceAreaWeight => Box::new(FaceAreaWeightEngine::default()),
        AmiMethod::NearestFace => Box::new(NearestFaceEngine::default()),
    }
}

/// Two faces face each other when their unit normals are close to opposite.
pub(crate) const MIN_FACING_COS: f64 = 0.5;

/// Unit normal, or `None` for a degenerate face.
pub(crate) fn unit_normal(area: Vec3) -> Option<Vec3> {
    let m = mag(area);
    (m > SMALL).then(|| scale(area, 1.0 / m))
}

/// Bounding sphere radius of a polygon about `centre`.
pub(crate) fn bounding_radius(polygon: &[Vec3], centre: Vec3) -> f64 {
    polygon
        .iter()
        .map(|p| mag(sub(*p, centre)))
        .fold(0.0, f64::max)
}

/// Unit normals and bounding radii of every face of `surface`.
pub(crate) fn face_bounds(surface: &FaceSurface) -> (Vec<Option<Vec3>>, Vec<f64>) {
    let normals = surface.areas().iter().map(|a| unit_normal(*a)).collect();
    let radii = surface
        .polygons()
        .iter()
        .zip(surface.centres())
        .map(|(poly, c)| bounding_radius(poly, *c))
        .collect();
    (normals, radii)
}

pub(crate) fn facing(n_src: Vec3, n_tgt: Vec3, reverse_target: bool) -> bool {
    let d = dot(n_src, n_tgt);
    let d = if reverse_target { -d } else { d };
    d < -MIN_FACING_COS
}

/// Bounding spheres of radius `r1`, `r2` about `c1`, `c2` intersect.
pub(crate) fn spheres_overlap(c1: Vec3, r1: f64, c2: Vec3, r2: f64) -> bool {
    let reach = (r1 + r2) * (1.0 + 1e-8);
    mag(sub(c1, c2)) <= reach
}

/// Build the target-side rows as the transpose of the source-side rows.
pub(crate) fn transpose_rows(
    src_address: &[Vec<usize>],
    src_overlap: &[Vec<f64>],
    n_tgt: usize,
) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let mut tgt_address = vec![Vec::new(); n_tgt];
    let mut tgt_overlap = vec![Vec::new(); n_tgt];
    for (i, (addr, overlap)) in src_address.iter().zip(src_overlap).enumerate() {
        for (&j, &o) in addr.iter().zip(overlap) {
            tgt_address[j].push(i);
            tgt_overlap[j].push(o);
        }
    }
    (tgt_address, tgt_overlap)
}
