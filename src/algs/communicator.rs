//! Thin façade over intra-process (mailbox) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Handles are **waitable**; the collectives in [`reduction`](super::reduction)
//! call `.wait()` before they trust that a buffer is ready.
//!
//! Every rank of a job is one mesh partition (SPMD). A communicator therefore
//! knows its own rank and the size of the job, and every collective built on
//! top of it must be entered by all ranks in the same order.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Typed message tag so collectives for different purposes never share a channel by accident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Point-to-point communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Rank of this process in the job.
    fn rank(&self) -> usize;
    /// Number of ranks in the job.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: CommTag) -> Self::RecvHandle;

    /// True when there is nobody to talk to.
    fn is_serial(&self) -> bool {
        self.size() <= 1
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for serial runs: rank 0 of a job of one.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: CommTag, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: CommTag) {}
}

// --- LocalComm: several ranks inside one process ---
type Key = (u64, usize, usize, u16); // (world, src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static NEXT_WORLD: AtomicU64 = AtomicU64::new(1);

/// Receive handle of [`LocalComm`]; `wait` blocks until the peer has posted.
pub struct LocalHandle {
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let popped = MAILBOX
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = popped {
                MAILBOX.remove_if(&self.key, |_, queue| queue.is_empty());
                return Some(bytes.to_vec());
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: each rank usually lives on its own thread.
///
/// Messages between a (src, dst, tag) triple are delivered in FIFO order.
/// Ranks created by one call to [`LocalComm::world`] form an isolated job.
#[derive(Clone, Debug)]
pub struct LocalComm {
    world: u64,
    rank: usize,
    size: usize,
}

impl LocalComm {
    /// Create the `size` ranks of a fresh, isolated job.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let world = NEXT_WORLD.fetch_add(1, Ordering::Relaxed);
        (0..size).map(|rank| LocalComm { world, rank, size }).collect()
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
        let key = (self.world, self.rank, peer, tag.as_u16());
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: CommTag) -> Self::RecvHandle {
        LocalHandle {
            key: (self.world, peer, self.rank, tag.as_u16()),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use crate::mesh_error::MeshAmiError;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination as _, Source as _};
    use std::rc::Rc;

    /// MPI world communicator.
    ///
    /// Sends are standard-mode blocking sends and receives complete eagerly;
    /// the pairwise schedule of the collectives keeps this deadlock-free.
    pub struct MpiComm {
        _universe: Rc<Universe>,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, MeshAmiError> {
            let universe = mpi::initialize().ok_or_else(|| MeshAmiError::CommError {
                neighbor: 0,
                detail: "MPI was already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                _universe: Rc::new(universe),
                world,
                rank,
                size,
            })
        }
    }

    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag.as_u16()));
        }

        fn irecv(&self, peer: usize, tag: CommTag) -> MpiHandle {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag.as_u16()));
            MpiHandle(Some(data))
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
