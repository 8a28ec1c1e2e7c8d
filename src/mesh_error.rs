//! MeshAmiError: Unified error type for mesh-ami public APIs
//!
//! Configuration problems (neighbour lookup, transform declarations, companion
//! and transform patches) are fatal and reported here with an actionable
//! message. Geometric tolerance problems are not errors; they are logged.

use std::fmt::Debug;
use thiserror::Error;

use crate::data::dict::TransformKind;

/// Unified error type for mesh-ami operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshAmiError {
    /// Two patches of one boundary mesh share a name.
    #[error("Configuration error: duplicate patch name `{0}`")]
    DuplicatePatchName(String),
    /// A patch index outside the boundary mesh was requested.
    #[error("Patch index {index} out of range ({len} patches)")]
    PatchIndexOutOfRange { index: usize, len: usize },
    /// A coupled patch names a neighbour that does not exist.
    #[error("Configuration error: patch `{patch}` refers to neighbour patch `{neighbour}` which does not exist")]
    MissingNeighbour { patch: String, neighbour: String },
    /// A coupled patch names itself as its neighbour.
    #[error("Configuration error: patch `{patch}` names itself as its neighbour")]
    SelfReferentialNeighbour { patch: String },
    /// A couple group does not single out exactly one other patch.
    #[error("Configuration error: patch `{patch}` coupleGroup `{group}` must contain exactly one other patch, found {found:?}")]
    AmbiguousCoupleGroup {
        patch: String,
        group: String,
        found: Vec<String>,
    },
    /// A patch carries coupling keys but no neighbour specification.
    #[error("Configuration error: patch `{patch}` sets `{key}` but has neither neighbourPatch nor coupleGroup")]
    MissingNeighbourSpec { patch: String, key: &'static str },
    /// A patch sets two keys that cannot be combined.
    #[error("Configuration error: patch `{patch}` sets both `{first}` and `{second}`")]
    ConflictingKeys {
        patch: String,
        first: &'static str,
        second: &'static str,
    },
    /// A patch is claimed as neighbour by more than one patch.
    ///
    /// A reciprocal declaration that is merely absent only logs a warning.
    /// One naming a third patch would put a patch into two interfaces, and
    /// each patch belongs to at most one, so that case is fatal.
    #[error("Configuration error: patch `{patch}` is coupled to both `{first}` and `{second}`")]
    ConflictingCoupling {
        patch: String,
        first: String,
        second: String,
    },
    /// The two halves of a coupled pair declare different transform kinds.
    #[error("Configuration error: patch `{patch}` ({ours:?}) and neighbour patch `{neighbour}` ({theirs:?}) have different transformation types")]
    TransformKindMismatch {
        patch: String,
        neighbour: String,
        ours: TransformKind,
        theirs: TransformKind,
    },
    /// The two halves of a coupled pair declare different coupling kinds.
    #[error("Configuration error: patch `{patch}` and neighbour patch `{neighbour}` must both be {kind} patches")]
    CouplingKindMismatch {
        patch: String,
        neighbour: String,
        kind: &'static str,
    },
    /// A rotational transform has no rotation axis.
    #[error("Configuration error: rotational patch `{patch}` requires a rotationAxis")]
    MissingRotationAxis { patch: String },
    /// A rotation axis of (near) zero length.
    #[error("Configuration error: patch `{patch}` has a rotationAxis of zero magnitude")]
    DegenerateRotationAxis { patch: String },
    /// A translational transform has no separation vector.
    #[error("Configuration error: translational patch `{patch}` requires a separationVector")]
    MissingSeparation { patch: String },
    /// A helper patch (non-overlap companion or transform patch) cannot be found.
    #[error("Configuration error: patch `{patch}` refers to {role} `{name}` which does not exist")]
    MissingPatch {
        patch: String,
        role: &'static str,
        name: String,
    },
    /// The non-overlap companion does not mirror the ACMI patch face by face.
    #[error("Configuration error: nonOverlapPatch `{companion}` of `{patch}` has {found} faces, expected {expected}")]
    CompanionSizeMismatch {
        patch: String,
        companion: String,
        expected: usize,
        found: usize,
    },
    /// The two halves of a repeat-AMI pair name different transform patches.
    #[error("Configuration error: transform patches of `{patch}` (`{ours}`) and its neighbour (`{theirs}`) are not the same")]
    TransformPatchMismatch {
        patch: String,
        ours: String,
        theirs: String,
    },
    /// The transform patch is not a coupled patch with a usable transform.
    #[error("Configuration error: transform patch `{transform_patch}` of `{patch}` {reason}")]
    InvalidTransformPatch {
        patch: String,
        transform_patch: String,
        reason: &'static str,
    },
    /// The non-overlap companion of an ACMI patch cannot take the split area.
    #[error("Configuration error: nonOverlapPatch `{companion}` of `{patch}` {reason}")]
    InvalidCompanion {
        patch: String,
        companion: String,
        reason: &'static str,
    },
    /// No rank holds any face of the transform patch.
    #[error("Transform patch `{transform_patch}` of `{patch}` has no faces on any processor; its transform cannot be determined. Preserve this patch during decomposition so that at least one processor keeps its faces")]
    EmptyTransformPatch {
        patch: String,
        transform_patch: String,
    },
    /// Ranks disagree on the transform of the transform patch.
    #[error("Transform patch `{transform_patch}` of `{patch}` has a non-uniform transform (ranks {first_rank} and {other_rank} differ)")]
    NonUniformTransformPatch {
        patch: String,
        transform_patch: String,
        first_rank: usize,
        other_rank: usize,
    },
    /// The engine was asked to require a full match but faces found no partner.
    #[error("AMI between `{patch}` and `{neighbour}`: {count} {side} faces have no overlapping face (requireMatch is set)")]
    UnmatchedFaces {
        patch: String,
        neighbour: String,
        side: &'static str,
        count: usize,
    },
    /// A patch is not part of any coupled interface.
    #[error("Patch `{0}` is not a coupled patch")]
    NotCoupled(String),
    /// Weights were requested before the interface was built for the current geometry.
    #[error("Coupled interface of patch `{0}` is out of date; call update_couplings first")]
    NotBuilt(String),
    /// Field or table sizes disagree.
    #[error("Size mismatch for {what}: expected {expected}, found {found}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A face references a point that does not exist.
    #[error("Patch `{patch}` face {face} references point {point} but the patch has {n_points} points")]
    InvalidFace {
        patch: String,
        face: usize,
        point: usize,
        n_points: usize,
    },
    /// Invalid geometry (degenerate face, inconsistent layout, ...).
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Communication with a neighbouring rank failed.
    #[error("Communication error with rank {neighbor}: {detail}")]
    CommError { neighbor: usize, detail: String },
}
