//! Boundary patches and the face surfaces handed to the weight engines.
//!
//! A [`Patch`] is the part of one boundary face group held by this rank: a
//! compact point list, faces as vertex loops into it, and a global face id per
//! face. Face centres and area vectors follow the usual finite-volume
//! convention: the area vector points out of the mesh and its magnitude is the
//! face area.

use crate::data::dict::PatchDict;
use crate::geometry::tensor::{SMALL, Vec3, ZERO, add, cross, mag, scale, sub};
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;

/// Centre and area vector of a planar-ish polygon.
///
/// The polygon is split into triangles fanning from its vertex average; the
/// centre is the area-weighted mean of the triangle centroids.
pub fn polygon_centre_and_area(points: &[Vec3]) -> (Vec3, Vec3) {
    match points.len() {
        0 => (ZERO, ZERO),
        1 | 2 => {
            let avg = scale(points.iter().fold(ZERO, |acc, p| add(acc, *p)), 1.0 / points.len() as f64);
            (avg, ZERO)
        }
        3 => {
            let area = scale(cross(sub(points[1], points[0]), sub(points[2], points[0])), 0.5);
            let centre = scale(add(add(points[0], points[1]), points[2]), 1.0 / 3.0);
            (centre, area)
        }
        n => {
            let avg = scale(points.iter().fold(ZERO, |acc, p| add(acc, *p)), 1.0 / n as f64);
            let mut area = ZERO;
            let mut weighted = ZERO;
            let mut total = 0.0;
            for k in 0..n {
                let a = points[k];
                let b = points[(k + 1) % n];
                let tri = scale(cross(sub(b, a), sub(avg, a)), 0.5);
                let m = mag(tri);
                let centroid = scale(add(add(a, b), avg), 1.0 / 3.0);
                area = add(area, tri);
                weighted = add(weighted, scale(centroid, m));
                total += m;
            }
            let centre = if total > SMALL {
                scale(weighted, 1.0 / total)
            } else {
                avg
            };
            (centre, area)
        }
    }
}

/// Explicit face polygons with their centres, area vectors and global ids.
///
/// This is the geometry the weight engines see. Unlike [`Patch`] it is
/// self-contained, so it can be transformed and shipped between ranks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceSurface {
    polygons: Vec<Vec<Vec3>>,
    centres: Vec<Vec3>,
    areas: Vec<Vec3>,
    global_ids: Vec<usize>,
}

impl FaceSurface {
    pub fn new(polygons: Vec<Vec<Vec3>>, global_ids: Vec<usize>) -> Result<Self, MeshAmiError> {
        if polygons.len() != global_ids.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "surface global ids",
                expected: polygons.len(),
                found: global_ids.len(),
            });
        }
        let (centres, areas) = polygons
            .iter()
            .map(|poly| polygon_centre_and_area(poly))
            .unzip();
        Ok(Self {
            polygons,
            centres,
            areas,
            global_ids,
        })
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Vec<Vec3>] {
        &self.polygons
    }

    pub fn centres(&self) -> &[Vec3] {
        &self.centres
    }

    pub fn areas(&self) -> &[Vec3] {
        &self.areas
    }

    pub fn mag_areas(&self) -> Vec<f64> {
        self.areas.iter().map(|a| mag(*a)).collect()
    }

    pub fn global_ids(&self) -> &[usize] {
        &self.global_ids
    }

    /// Copy of the surface moved by `t`.
    pub fn transformed(&self, t: &RigidTransform) -> Self {
        Self {
            polygons: self
                .polygons
                .iter()
                .map(|poly| poly.iter().map(|p| t.transform_position(*p)).collect())
                .collect(),
            centres: self.centres.iter().map(|c| t.transform_position(*c)).collect(),
            areas: self.areas.iter().map(|a| t.transform_vector(*a)).collect(),
            global_ids: self.global_ids.clone(),
        }
    }

    /// Area-weighted centroid and total area.
    pub fn centroid(&self) -> (Vec3, f64) {
        let mut sum = ZERO;
        let mut total = 0.0;
        for (c, a) in self.centres.iter().zip(&self.areas) {
            let m = mag(*a);
            sum = add(sum, scale(*c, m));
            total += m;
        }
        if total > SMALL {
            (scale(sum, 1.0 / total), total)
        } else {
            (ZERO, total)
        }
    }
}

/// One boundary patch as held by this rank.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    name: String,
    dict: PatchDict,
    points: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    global_ids: Vec<usize>,
    face_centres: Vec<Vec3>,
    base_face_areas: Vec<Vec3>,
    face_areas: Vec<Vec3>,
}

impl Patch {
    /// Build a patch; global face ids default to `0..faces.len()`.
    pub fn new(
        name: &str,
        points: Vec<Vec3>,
        faces: Vec<Vec<usize>>,
        dict: PatchDict,
    ) -> Result<Self, MeshAmiError> {
        let global_ids = (0..faces.len()).collect();
        let mut patch = Self {
            name: name.to_owned(),
            dict,
            points,
            faces,
            global_ids,
            face_centres: Vec::new(),
            base_face_areas: Vec::new(),
            face_areas: Vec::new(),
        };
        patch.update_geometry()?;
        Ok(patch)
    }

    /// Replace the global face ids (one per local face).
    pub fn with_global_ids(mut self, global_ids: Vec<usize>) -> Result<Self, MeshAmiError> {
        if global_ids.len() != self.faces.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "patch global ids",
                expected: self.faces.len(),
                found: global_ids.len(),
            });
        }
        self.global_ids = global_ids;
        Ok(self)
    }

    /// The part of this patch made of `local_faces`, keeping their global ids.
    ///
    /// Points are renumbered compactly. Used to emulate a decomposed mesh.
    pub fn select_faces(&self, local_faces: &[usize]) -> Result<Self, MeshAmiError> {
        let mut point_map = vec![usize::MAX; self.points.len()];
        let mut points = Vec::new();
        let mut faces = Vec::with_capacity(local_faces.len());
        let mut global_ids = Vec::with_capacity(local_faces.len());
        for &f in local_faces {
            let face = self.faces.get(f).ok_or_else(|| {
                MeshAmiError::InvalidGeometry(format!(
                    "patch `{}` has {} faces, cannot select face {f}",
                    self.name,
                    self.faces.len()
                ))
            })?;
            let renumbered = face
                .iter()
                .map(|&p| {
                    if point_map[p] == usize::MAX {
                        point_map[p] = points.len();
                        points.push(self.points[p]);
                    }
                    point_map[p]
                })
                .collect();
            faces.push(renumbered);
            global_ids.push(self.global_ids[f]);
        }
        Patch::new(&self.name, points, faces, self.dict.clone())?.with_global_ids(global_ids)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dict(&self) -> &PatchDict {
        &self.dict
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn global_ids(&self) -> &[usize] {
        &self.global_ids
    }

    pub fn face_centres(&self) -> &[Vec3] {
        &self.face_centres
    }

    /// Current area vectors; scaled by the overlap mask on ACMI patches.
    pub fn face_areas(&self) -> &[Vec3] {
        &self.face_areas
    }

    /// Geometric area vectors, never scaled.
    pub fn base_face_areas(&self) -> &[Vec3] {
        &self.base_face_areas
    }

    pub fn mag_face_areas(&self) -> Vec<f64> {
        self.face_areas.iter().map(|a| mag(*a)).collect()
    }

    /// Face polygons of this patch with their geometric (unscaled) areas.
    pub fn surface(&self) -> FaceSurface {
        FaceSurface {
            polygons: self
                .faces
                .iter()
                .map(|face| face.iter().map(|&p| self.points[p]).collect())
                .collect(),
            centres: self.face_centres.clone(),
            areas: self.base_face_areas.clone(),
            global_ids: self.global_ids.clone(),
        }
    }

    pub(crate) fn set_points(&mut self, points: Vec<Vec3>) -> Result<(), MeshAmiError> {
        if points.len() != self.points.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "moved points",
                expected: self.points.len(),
                found: points.len(),
            });
        }
        self.points = points;
        self.update_geometry()
    }

    pub(crate) fn set_topology(
        &mut self,
        points: Vec<Vec3>,
        faces: Vec<Vec<usize>>,
        global_ids: Vec<usize>,
    ) -> Result<(), MeshAmiError> {
        if global_ids.len() != faces.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "patch global ids",
                expected: faces.len(),
                found: global_ids.len(),
            });
        }
        self.points = points;
        self.faces = faces;
        self.global_ids = global_ids;
        self.update_geometry()
    }

    /// Set current areas to `base · factor` face by face.
    pub(crate) fn scale_face_areas(&mut self, factors: &[f64]) -> Result<(), MeshAmiError> {
        if factors.len() != self.base_face_areas.len() {
            return Err(MeshAmiError::SizeMismatch {
                what: "area scaling factors",
                expected: self.base_face_areas.len(),
                found: factors.len(),
            });
        }
        for ((area, base), f) in self
            .face_areas
            .iter_mut()
            .zip(&self.base_face_areas)
            .zip(factors)
        {
            *area = scale(*base, *f);
        }
        Ok(())
    }

    fn update_geometry(&mut self) -> Result<(), MeshAmiError> {
        let n_points = self.points.len();
        let mut centres = Vec::with_capacity(self.faces.len());
        let mut areas = Vec::with_capacity(self.faces.len());
        for (f, face) in self.faces.iter().enumerate() {
            if let Some(&point) = face.iter().find(|&&p| p >= n_points) {
                return Err(MeshAmiError::InvalidFace {
                    patch: self.name.clone(),
                    face: f,
                    point,
                    n_points,
                });
            }
            let poly: Vec<Vec3> = face.iter().map(|&p| self.points[p]).collect();
            let (c, a) = polygon_centre_and_area(&poly);
            centres.push(c);
            areas.push(a);
        }
        self.face_centres = centres;
        self.face_areas = areas.clone();
        self.base_face_areas = areas;
        Ok(())
    }
}
