//! Parallel plumbing: communicators, wire records and collective reductions.

pub mod communicator;
pub mod reduction;
pub mod wire;

pub use communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
