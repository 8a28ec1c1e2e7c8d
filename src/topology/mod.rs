//! Boundary patches and the boundary mesh that couples them.

pub mod boundary;
pub mod patch;

pub use boundary::BoundaryMesh;
pub use patch::{FaceSurface, Patch};
