//! Global surface assembly around a weight engine.
//!
//! Each rank holds only its local faces of a patch. Both surfaces are
//! all-gathered and ordered by global face id, the engine runs on the global
//! surfaces (same input on every rank, so same output), and each rank keeps
//! the rows of its local faces. Addresses therefore always name global face
//! ids of the opposite patch.

use crate::algs::communicator::Communicator;
use crate::algs::reduction::{all_gather, tags};
use crate::algs::wire::{WireFace, WirePoint};
use crate::engine::{AmiEngine, AmiInstance, AmiSettings};
use crate::geometry::tensor::Vec3;
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::{FaceSurface, Patch};
use log::debug;

/// Place `(global id, item)` pairs into slots; ids must be a permutation of `0..n`.
fn order_by_global_id<T>(patch: &str, items: Vec<(usize, T)>) -> Result<Vec<T>, MeshAmiError> {
    let n = items.len();
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(n).collect();
    for (gid, item) in items {
        match slots.get_mut(gid) {
            Some(slot) if slot.is_none() => *slot = Some(item),
            _ => {
                return Err(MeshAmiError::InvalidGeometry(format!(
                    "global face ids of patch `{patch}` are not a permutation of 0..{n} (id {gid})"
                )));
            }
        }
    }
    // all n slots were filled by n distinct in-range ids
    Ok(slots.into_iter().flatten().collect())
}

/// The whole of `surface` over all ranks, ordered by global face id.
///
/// Collective.
pub fn gather_surface<C: Communicator>(
    comm: &C,
    patch: &str,
    surface: &FaceSurface,
) -> Result<FaceSurface, MeshAmiError> {
    let mut items: Vec<(usize, Vec<Vec3>)> = Vec::new();
    if comm.is_serial() {
        items.extend(
            surface
                .global_ids()
                .iter()
                .copied()
                .zip(surface.polygons().iter().cloned()),
        );
    } else {
        let faces: Vec<WireFace> = surface
            .global_ids()
            .iter()
            .zip(surface.polygons())
            .map(|(&gid, poly)| WireFace::new(gid, poly.len()))
            .collect();
        let points: Vec<WirePoint> = surface
            .polygons()
            .iter()
            .flat_map(|poly| poly.iter().map(|p| WirePoint(*p)))
            .collect();
        let all_faces = all_gather(comm, tags::SURFACE, &faces)?;
        let all_points = all_gather(comm, tags::SURFACE, &points)?;
        for (rank, (faces, points)) in all_faces.iter().zip(&all_points).enumerate() {
            let mut offset = 0;
            for face in faces {
                let end = offset + face.n_points();
                let poly = points.get(offset..end).ok_or_else(|| MeshAmiError::CommError {
                    neighbor: rank,
                    detail: format!(
                        "surface of `{patch}`: {} points received, face needs up to {end}",
                        points.len()
                    ),
                })?;
                items.push((face.global_id(), poly.iter().map(|p| p.0).collect()));
                offset = end;
            }
        }
    }
    let n = items.len();
    let polygons = order_by_global_id(patch, items)?;
    FaceSurface::new(polygons, (0..n).collect())
}

/// A field over the whole patch, ordered by global face id.
///
/// Collective. Use it to assemble donor fields for interpolation.
pub fn gather_field<C: Communicator>(
    comm: &C,
    patch: &Patch,
    values: &[f64],
) -> Result<Vec<f64>, MeshAmiError> {
    if values.len() != patch.len() {
        return Err(MeshAmiError::SizeMismatch {
            what: "field values",
            expected: patch.len(),
            found: values.len(),
        });
    }
    let ids: Vec<u64> = patch.global_ids().iter().map(|&g| g as u64).collect();
    let all_ids = all_gather(comm, tags::FIELD, &ids)?;
    let all_values = all_gather(comm, tags::FIELD, values)?;
    let items = all_ids
        .into_iter()
        .zip(all_values)
        .flat_map(|(ids, vals)| ids.into_iter().map(|g| g as usize).zip(vals))
        .collect();
    order_by_global_id(patch.name(), items)
}

/// Owner and neighbour surfaces over all ranks, the neighbour mapped into the owner frame.
#[derive(Clone, Debug)]
pub struct GlobalPair {
    pub src: FaceSurface,
    pub tgt: FaceSurface,
}

/// Collective.
pub fn gather_pair<C: Communicator>(
    comm: &C,
    owner: &Patch,
    neighbour: &Patch,
    forward: &RigidTransform,
) -> Result<GlobalPair, MeshAmiError> {
    let src = gather_surface(comm, owner.name(), &owner.surface())?;
    let tgt = gather_surface(comm, neighbour.name(), &neighbour.surface())?;
    let tgt = if forward.is_identity(0.0) {
        tgt
    } else {
        tgt.transformed(forward)
    };
    Ok(GlobalPair { src, tgt })
}

/// Run the engine on global surfaces and enforce `require_match`.
pub fn build_global(
    engine: &dyn AmiEngine,
    owner: &str,
    neighbour: &str,
    src: &FaceSurface,
    tgt: &FaceSurface,
    settings: &AmiSettings,
) -> Result<AmiInstance, MeshAmiError> {
    let ami = engine.build(src, tgt, settings);
    if ami.src_size() != src.len() || ami.tgt_size() != tgt.len() {
        return Err(MeshAmiError::SizeMismatch {
            what: "engine rows",
            expected: src.len() + tgt.len(),
            found: ami.src_size() + ami.tgt_size(),
        });
    }
    if settings.require_match {
        let (src_unmatched, tgt_unmatched) = ami.unmatched();
        let unmatched = [("source", src_unmatched), ("target", tgt_unmatched)];
        if let Some(&(side, count)) = unmatched.iter().find(|(_, c)| *c > 0) {
            return Err(MeshAmiError::UnmatchedFaces {
                patch: owner.to_owned(),
                neighbour: neighbour.to_owned(),
                side,
                count,
            });
        }
    }
    Ok(ami)
}

/// Rows of the local faces of `owner` and `neighbour`.
pub fn localise(global: &AmiInstance, owner: &Patch, neighbour: &Patch) -> AmiInstance {
    global.select_rows(owner.global_ids(), neighbour.global_ids())
}

/// Plain interface build: gather, run the engine, normalise, keep local rows.
///
/// Collective.
pub fn build_local<C: Communicator>(
    comm: &C,
    engine: &dyn AmiEngine,
    owner: &Patch,
    neighbour: &Patch,
    forward: &RigidTransform,
    settings: &AmiSettings,
) -> Result<AmiInstance, MeshAmiError> {
    let pair = gather_pair(comm, owner, neighbour, forward)?;
    let mut global = build_global(
        engine,
        owner.name(),
        neighbour.name(),
        &pair.src,
        &pair.tgt,
        settings,
    )?;
    global.normalise_weights();
    debug!(
        "AMI `{}` -> `{}`: {} x {} global faces, {} x {} local",
        owner.name(),
        neighbour.name(),
        pair.src.len(),
        pair.tgt.len(),
        owner.len(),
        neighbour.len()
    );
    Ok(localise(&global, owner, neighbour))
}
