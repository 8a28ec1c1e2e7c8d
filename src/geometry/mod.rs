//! Small fixed-size vector algebra and rigid-body transforms.

pub mod tensor;
pub mod transform;

pub use tensor::{Tensor, Vec3};
pub use transform::RigidTransform;
