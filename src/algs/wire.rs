//! Fixed wire records for the collective reductions.
//!
//! All multi-byte integers are stored **little-endian** (`.to_le()` on the way
//! out, `.from_le()` on the way in). Floating-point fields are raw IEEE-754
//! bit patterns; every rank of a job shares one architecture.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a received buffer into records.
///
/// Receive buffers carry no alignment guarantee, so records are read one by
/// one with an unaligned load.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, String> {
    let width = size_of::<T>();
    if width == 0 || bytes.len() % width != 0 {
        return Err(format!(
            "buffer of {} bytes is not a whole number of {width}-byte records",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Header of one face in a gathered surface; followed by `n_points` [`WirePoint`]s.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFace {
    pub global_id_le: u64,
    pub n_points_le: u64,
}

impl WireFace {
    pub fn new(global_id: usize, n_points: usize) -> Self {
        Self {
            global_id_le: (global_id as u64).to_le(),
            n_points_le: (n_points as u64).to_le(),
        }
    }
    pub fn global_id(&self) -> usize {
        u64::from_le(self.global_id_le) as usize
    }
    pub fn n_points(&self) -> usize {
        u64::from_le(self.n_points_le) as usize
    }
}

/// A point (vertex) of a gathered face.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePoint(pub [f64; 3]);

/// A rigid transform `x ↦ R·x + t`; `has_rotation == 0` means `R` is the identity.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireTransform {
    pub rotation: [f64; 9],
    pub translation: [f64; 3],
    pub has_rotation_le: u64,
}

/// Candidate representative face: squared distance from the rotation axis and its unit normal.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireFarthestFace {
    pub dist_sqr: f64,
    pub normal: [f64; 3],
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_handles_misaligned_buffers() {
        let recs = [WireFace::new(3, 4), WireFace::new(9, 3)];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(cast_slice(&recs));
        let decoded: Vec<WireFace> = decode_records(&bytes[1..]).unwrap();
        assert_eq!(decoded[0].global_id(), 3);
        assert_eq!(decoded[1].n_points(), 3);
    }

    #[test]
    fn decode_rejects_partial_records() {
        let err = decode_records::<WireFace>(&[0u8; 17]).unwrap_err();
        assert!(err.contains("17 bytes"), "{err}");
    }
}
