//! # mesh-ami
//!
//! mesh-ami couples boundary patches of non-conforming meshes through an
//! Arbitrary Mesh Interface (AMI). For every coupled pair it resolves the
//! rigid-body transform between the two halves, builds per-face interpolation
//! addressing and weights, and keeps those decisions identical on every rank of
//! a decomposed (SPMD) run.
//!
//! ## Features
//! - Rotational, translational and collocated pairs, with the rotation angle
//!   either given (sign chosen from the geometry) or inferred
//! - Partially overlapping pairs (ACMI): face areas split between the coupled
//!   patch and its non-overlap companion
//! - Periodic repeat pairs: discovery of the repeat count of a base transform
//!   and merging of the two best bracketing candidates
//! - Pluggable weight engines behind [`engine::AmiEngine`]
//! - Pluggable communication backends (serial, in-process, MPI)
//!
//! ## Determinism
//!
//! Every cross-rank decision is taken from gathered data folded in rank order,
//! and engines run on global surfaces ordered by global face id. One rank and
//! N ranks therefore agree on transforms and per-face weight sums.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-ami = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! Build a [`topology::BoundaryMesh`] from the patches of this rank, call
//! [`update_couplings`](topology::BoundaryMesh::update_couplings) on every rank,
//! then read weights through [`coupling`](topology::BoundaryMesh::coupling).

pub mod algs;
pub mod coupling;
pub mod data;
pub mod debug_invariants;
pub mod engine;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshAmiError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::coupling::{
        CouplingKind, CyclicTransform, InterfaceState, PatchCoupling, RepeatState, Side,
    };
    pub use crate::data::dict::{AmiMethod, CouplingSettings, PatchDict, TransformKind};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::engine::{AmiEngine, AmiInstance, AmiSettings};
    pub use crate::geometry::transform::RigidTransform;
    pub use crate::mesh_error::MeshAmiError;
    pub use crate::topology::{BoundaryMesh, FaceSurface, Patch};
}
