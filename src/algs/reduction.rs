//! Cross-rank consensus primitives.
//!
//! Every decision that could differ between ranks (representative face,
//! rotation sign, transform-patch value, repeat count) is taken from data that
//! went through one of these collectives. Each collective gathers every rank's
//! contribution and folds it **in rank order**, so all ranks obtain bitwise
//! identical results, including floating-point sums.
//!
//! All ranks must call the same collectives in the same order. A rank that
//! skips one leaves its peers blocked.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{cast_slice, decode_records, expect_exact_len};
use crate::geometry::tensor::Vec3;
use crate::mesh_error::MeshAmiError;
use bytemuck::Pod;

/// Tags used by the coupling code, one per purpose.
pub mod tags {
    use crate::algs::communicator::CommTag;

    pub const AREA_SUM: CommTag = CommTag::new(0xA101);
    pub const FARTHEST_FACE: CommTag = CommTag::new(0xA102);
    pub const FACE_COUNT: CommTag = CommTag::new(0xA103);
    pub const SURFACE: CommTag = CommTag::new(0xA104);
    pub const TRANSFORM_PATCH: CommTag = CommTag::new(0xA105);
    pub const FIELD: CommTag = CommTag::new(0xA106);
}

/// Exchange one payload with every peer. Entry `r` of the result is rank `r`'s payload.
///
/// Peers are visited in ascending order; within a pair the lower rank sends
/// first. Every exchange is completed even after a failure so that no peer is
/// left waiting; the first failure is returned at the end.
pub fn all_gather_bytes<C>(
    comm: &C,
    tag: CommTag,
    payload: &[u8],
) -> Result<Vec<Vec<u8>>, MeshAmiError>
where
    C: Communicator,
{
    let me = comm.rank();
    let size = comm.size();
    let mut gathered = vec![Vec::new(); size.max(1)];
    gathered[me] = payload.to_vec();

    let mut maybe_err = None;
    for peer in (0..size).filter(|&p| p != me) {
        let received = if me < peer {
            let send = comm.isend(peer, tag, payload);
            let data = comm.irecv(peer, tag).wait();
            let _ = send.wait();
            data
        } else {
            let data = comm.irecv(peer, tag).wait();
            let _ = comm.isend(peer, tag, payload).wait();
            data
        };
        match received {
            Some(data) => gathered[peer] = data,
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshAmiError::CommError {
                    neighbor: peer,
                    detail: format!("no payload received for tag {:#06x}", tag.as_u16()),
                });
            }
            None => {} // already have an error; keep draining
        }
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(gathered),
    }
}

/// Gather a slice of records from every rank.
pub fn all_gather<C, T>(comm: &C, tag: CommTag, local: &[T]) -> Result<Vec<Vec<T>>, MeshAmiError>
where
    C: Communicator,
    T: Pod,
{
    all_gather_bytes(comm, tag, cast_slice(local))?
        .into_iter()
        .enumerate()
        .map(|(rank, bytes)| {
            decode_records(&bytes).map_err(|detail| MeshAmiError::CommError {
                neighbor: rank,
                detail,
            })
        })
        .collect()
}

/// Combine one value per rank with `op`, folding from rank 0 upwards.
pub fn all_reduce<C, T, F>(comm: &C, tag: CommTag, value: T, op: F) -> Result<T, MeshAmiError>
where
    C: Communicator,
    T: Pod,
    F: Fn(T, T) -> T,
{
    if comm.is_serial() {
        return Ok(value);
    }
    let gathered = all_gather_bytes(comm, tag, cast_slice(std::slice::from_ref(&value)))?;
    let mut values = Vec::with_capacity(gathered.len());
    for (rank, bytes) in gathered.iter().enumerate() {
        expect_exact_len(bytes.len(), std::mem::size_of::<T>())
            .map_err(|detail| MeshAmiError::CommError { neighbor: rank, detail })?;
        values.push(bytemuck::pod_read_unaligned::<T>(bytes));
    }
    let mut iter = values.into_iter();
    let first = iter.next().unwrap_or(value);
    Ok(iter.fold(first, op))
}

/// Global sum of a scalar.
pub fn reduce_sum<C: Communicator>(comm: &C, tag: CommTag, value: f64) -> Result<f64, MeshAmiError> {
    all_reduce(comm, tag, value, |a, b| a + b)
}

/// Global component-wise sum of a vector.
pub fn reduce_sum_vec3<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: Vec3,
) -> Result<Vec3, MeshAmiError> {
    all_reduce(comm, tag, value, |a, b| [a[0] + b[0], a[1] + b[1], a[2] + b[2]])
}

/// Global sum of a count.
pub fn reduce_sum_count<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: usize,
) -> Result<usize, MeshAmiError> {
    Ok(all_reduce(comm, tag, value as u64, |a, b| a + b)? as usize)
}

/// Pick the candidate with the largest magnitude over all ranks.
///
/// Ranks without a candidate pass `None`. Ties go to the lowest rank. Returns
/// the winning rank together with its candidate, or `None` when no rank had one.
pub fn max_mag_sqr_pick<C, T, F>(
    comm: &C,
    tag: CommTag,
    local: Option<T>,
    mag_sqr: F,
) -> Result<Option<(usize, T)>, MeshAmiError>
where
    C: Communicator,
    T: Pod,
    F: Fn(&T) -> f64,
{
    let candidates = gather_optional(comm, tag, local)?;
    let mut best: Option<(usize, T, f64)> = None;
    for (rank, candidate) in candidates.into_iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        let m = mag_sqr(&candidate);
        match best {
            Some((_, _, best_m)) if m <= best_m => {}
            _ => best = Some((rank, candidate, m)),
        }
    }
    Ok(best.map(|(rank, candidate, _)| (rank, candidate)))
}

/// Outcome of [`keep_first_valid`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Consensus<T> {
    /// No rank supplied a value.
    Empty,
    /// All ranks that supplied a value agree with the first one.
    Uniform { rank: usize, value: T },
    /// Rank `other_rank` disagrees with the first valid value.
    Conflict {
        first_rank: usize,
        other_rank: usize,
        value: T,
    },
}

/// Propagate a value that is only known on some ranks.
///
/// The first valid value in rank order is kept; later valid values are
/// compared against it with `same`, and the first disagreement is reported.
pub fn keep_first_valid<C, T, F>(
    comm: &C,
    tag: CommTag,
    local: Option<T>,
    same: F,
) -> Result<Consensus<T>, MeshAmiError>
where
    C: Communicator,
    T: Pod,
    F: Fn(&T, &T) -> bool,
{
    let candidates = gather_optional(comm, tag, local)?;
    let mut result = Consensus::Empty;
    for (rank, candidate) in candidates.into_iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        match result {
            Consensus::Empty => {
                result = Consensus::Uniform {
                    rank,
                    value: candidate,
                }
            }
            Consensus::Uniform { rank: first, value } if !same(&value, &candidate) => {
                result = Consensus::Conflict {
                    first_rank: first,
                    other_rank: rank,
                    value,
                }
            }
            _ => {}
        }
    }
    Ok(result)
}

/// Gather an optional record per rank; an empty payload encodes `None`.
fn gather_optional<C, T>(
    comm: &C,
    tag: CommTag,
    local: Option<T>,
) -> Result<Vec<Option<T>>, MeshAmiError>
where
    C: Communicator,
    T: Pod,
{
    let payload: &[u8] = match &local {
        Some(value) => cast_slice(std::slice::from_ref(value)),
        None => &[],
    };
    all_gather_bytes(comm, tag, payload)?
        .into_iter()
        .enumerate()
        .map(|(rank, bytes)| {
            if bytes.is_empty() {
                return Ok(None);
            }
            expect_exact_len(bytes.len(), std::mem::size_of::<T>())
                .map_err(|detail| MeshAmiError::CommError { neighbor: rank, detail })?;
            Ok(Some(bytemuck::pod_read_unaligned::<T>(&bytes)))
        })
        .collect()
}
