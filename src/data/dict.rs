//! Patch dictionaries and crate-level coupling settings.
//!
//! Dictionaries arrive already parsed (any serde format will do); keys use the
//! camelCase spelling of the case files, e.g. `neighbourPatch` or
//! `rotationAxis`. [`PatchDict`] is also what gets written back after a
//! transform has been resolved, so that a restart reproduces it exactly.

use crate::geometry::tensor::Vec3;
use serde::{Deserialize, Serialize};

/// Rigid-body relation declared between the two halves of a coupled pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    None,
    Rotational,
    Translational,
}

/// Weight engine used to build an interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmiMethod {
    /// Area-weighted: weights are overlap-area fractions.
    #[default]
    #[serde(rename = "faceAreaWeightAMI")]
    FaceAreaWeight,
    /// Each face takes its nearest facing partner with weight one.
    #[serde(rename = "nearestFaceAMI")]
    NearestFace,
}

/// Coupling entries of one boundary patch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchDict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbour_patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub couple_group: Option<String>,
    pub transform: TransformKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_axis: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_centre: Option<Vec3>,
    /// Degrees. Unset means "infer from the geometry".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separation_vector: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_overlap_patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_patch: Option<String>,
    pub method: AmiMethod,
    /// Faces whose weight sum falls below this take a default value; negative disables.
    pub low_weight_correction: f64,
    pub flip_normals: bool,
    /// Unset means: required for plain AMI, not for ACMI or repeat-AMI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_match: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_tolerance: Option<f64>,
}

impl Default for PatchDict {
    fn default() -> Self {
        Self {
            neighbour_patch: None,
            couple_group: None,
            transform: TransformKind::None,
            rotation_axis: None,
            rotation_centre: None,
            rotation_angle: None,
            separation_vector: None,
            non_overlap_patch: None,
            transform_patch: None,
            method: AmiMethod::default(),
            low_weight_correction: -1.0,
            flip_normals: false,
            require_match: None,
            match_tolerance: None,
        }
    }
}

impl PatchDict {
    /// An uncoupled patch (wall, inlet, non-overlap companion, ...).
    pub fn wall() -> Self {
        Self::default()
    }

    /// A coupled patch naming its neighbour, with no transform.
    pub fn coupled(neighbour: &str) -> Self {
        Self {
            neighbour_patch: Some(neighbour.to_owned()),
            ..Self::default()
        }
    }

    /// A coupled patch whose neighbour is the other member of `group`.
    pub fn grouped(group: &str) -> Self {
        Self {
            couple_group: Some(group.to_owned()),
            ..Self::default()
        }
    }

    /// Rotational transform; `angle_deg == None` lets the geometry decide.
    pub fn with_rotation(mut self, axis: Vec3, centre: Vec3, angle_deg: Option<f64>) -> Self {
        self.transform = TransformKind::Rotational;
        self.rotation_axis = Some(axis);
        self.rotation_centre = Some(centre);
        self.rotation_angle = angle_deg;
        self
    }

    /// Translational transform: neighbour = this + `separation`.
    pub fn with_translation(mut self, separation: Vec3) -> Self {
        self.transform = TransformKind::Translational;
        self.separation_vector = Some(separation);
        self
    }

    pub fn with_non_overlap(mut self, companion: &str) -> Self {
        self.non_overlap_patch = Some(companion.to_owned());
        self
    }

    pub fn with_transform_patch(mut self, transform_patch: &str) -> Self {
        self.transform_patch = Some(transform_patch.to_owned());
        self
    }

    pub fn with_method(mut self, method: AmiMethod) -> Self {
        self.method = method;
        self
    }

    /// True when this patch takes part in a coupled pair.
    pub fn is_coupled(&self) -> bool {
        self.neighbour_patch.is_some() || self.couple_group.is_some()
    }
}

/// Tolerances and limits shared by every interface of a boundary mesh.
///
/// The defaults are the long-standing values of the CFD cases this code
/// serves; change them only with validation against such cases.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CouplingSettings {
    /// Overlap masks are clamped into `(tol, 1 − tol)`.
    pub overlap_tolerance: f64,
    /// Area-balance residual above which a transform is reported as a poor match.
    pub match_tolerance: f64,
    /// Upper bound on steps of the repeat-count walk in each direction.
    pub max_repeat_walk: usize,
    /// Absolute tolerance for comparing transforms across ranks.
    pub transform_tolerance: f64,
}

impl Default for CouplingSettings {
    fn default() -> Self {
        Self {
            overlap_tolerance: 1e-10,
            match_tolerance: 1e-4,
            max_repeat_walk: 64,
            transform_tolerance: 1e-8,
        }
    }
}
