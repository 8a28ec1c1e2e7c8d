//! Coupled-interface orchestration.
//!
//! - [`cyclic_transform`]: rigid-body transform between the halves of a pair
//! - [`ami`]: global surface assembly around a weight engine
//! - [`acmi`]: overlap masks and area splitting for partially overlapping pairs
//! - [`repeat`]: repeat-count discovery for periodic families
//! - [`interface`]: the per-pair state machine and side-aware read views

pub mod acmi;
pub mod ami;
pub mod cyclic_transform;
pub mod interface;
pub mod repeat;

pub use acmi::OverlapMasks;
pub use cyclic_transform::{CyclicTransform, TransformConfig};
pub use interface::{CoupledInterface, CouplingData, CouplingKind, InterfaceState, PatchCoupling};
pub use repeat::RepeatState;

use crate::engine::{AmiInstance, AmiRows};

/// Which half of a coupled pair a patch is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Lower patch index; builds the interface.
    Owner,
    Neighbour,
}

/// Rows of `ami` belonging to `side`: source rows for the owner, target rows for the neighbour.
pub(crate) fn side_rows(ami: &AmiInstance, side: Side) -> AmiRows<'_> {
    match side {
        Side::Owner => ami.src_rows(),
        Side::Neighbour => ami.tgt_rows(),
    }
}
