//! The boundary mesh: all patches of this rank and one interface per coupled pair.
//!
//! Neighbours are resolved once, at construction, either by name
//! (`neighbourPatch`) or as the unique other member of a `coupleGroup`. Every
//! configuration problem is detected there, from the dictionaries alone, so it
//! fails identically on every rank.
//!
//! Geometry changes are reported through [`move_points`](BoundaryMesh::move_points),
//! [`update_patch_topology`](BoundaryMesh::update_patch_topology) or
//! [`notify_geometry_changed`](BoundaryMesh::notify_geometry_changed). They
//! only mark interfaces `Invalid`; the rebuild happens in
//! [`update_couplings`](BoundaryMesh::update_couplings), which is collective:
//! every rank must issue the same notifications and call it at the same point.

use std::collections::HashMap;
use std::sync::Arc;

use crate::algs::communicator::Communicator;
use crate::coupling::cyclic_transform::{TransformConfig, check_transform_kinds};
use crate::coupling::interface::{CoupledInterface, CouplingKind, PatchCoupling};
use crate::coupling::Side;
use crate::data::dict::{CouplingSettings, PatchDict, TransformKind};
use crate::engine::{AmiEngine, AmiSettings, engine_for};
use crate::geometry::tensor::Vec3;
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::Patch;
use log::{debug, warn};

pub struct BoundaryMesh {
    patches: Vec<Patch>,
    interfaces: Vec<CoupledInterface>,
    patch_interface: Vec<Option<usize>>,
    settings: CouplingSettings,
    engine: Option<Arc<dyn AmiEngine>>,
}

impl std::fmt::Debug for BoundaryMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryMesh")
            .field("patches", &self.patches.len())
            .field("interfaces", &self.interfaces)
            .field("settings", &self.settings)
            .field("custom_engine", &self.engine.is_some())
            .finish()
    }
}

/// Neighbour named by `patch`'s dictionary, if it names one.
fn resolve_neighbour(
    index: usize,
    patches: &[Patch],
    by_name: &HashMap<&str, usize>,
) -> Result<Option<usize>, MeshAmiError> {
    let patch = &patches[index];
    let dict = patch.dict();
    let target = if let Some(name) = &dict.neighbour_patch {
        *by_name
            .get(name.as_str())
            .ok_or_else(|| MeshAmiError::MissingNeighbour {
                patch: patch.name().to_owned(),
                neighbour: name.clone(),
            })?
    } else if let Some(group) = &dict.couple_group {
        let members: Vec<usize> = patches
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != index && p.dict().couple_group.as_deref() == Some(group))
            .map(|(i, _)| i)
            .collect();
        match members.as_slice() {
            [only] => *only,
            _ => {
                return Err(MeshAmiError::AmbiguousCoupleGroup {
                    patch: patch.name().to_owned(),
                    group: group.clone(),
                    found: members.iter().map(|&i| patches[i].name().to_owned()).collect(),
                });
            }
        }
    } else {
        for (key, set) in [
            ("transform", dict.transform != TransformKind::None),
            ("nonOverlapPatch", dict.non_overlap_patch.is_some()),
            ("transformPatch", dict.transform_patch.is_some()),
        ] {
            if set {
                return Err(MeshAmiError::MissingNeighbourSpec {
                    patch: patch.name().to_owned(),
                    key,
                });
            }
        }
        return Ok(None);
    };
    if target == index {
        return Err(MeshAmiError::SelfReferentialNeighbour {
            patch: patch.name().to_owned(),
        });
    }
    if dict.non_overlap_patch.is_some() && dict.transform_patch.is_some() {
        return Err(MeshAmiError::ConflictingKeys {
            patch: patch.name().to_owned(),
            first: "nonOverlapPatch",
            second: "transformPatch",
        });
    }
    Ok(Some(target))
}

/// Index of a helper patch named by `patch`.
fn lookup(
    by_name: &HashMap<&str, usize>,
    patch: &Patch,
    role: &'static str,
    name: &str,
) -> Result<usize, MeshAmiError> {
    by_name
        .get(name)
        .copied()
        .ok_or_else(|| MeshAmiError::MissingPatch {
            patch: patch.name().to_owned(),
            role,
            name: name.to_owned(),
        })
}

/// Coupling kind of the pair `owner`/`neighbour`; both sides must agree.
fn coupling_kind(
    by_name: &HashMap<&str, usize>,
    owner: &Patch,
    neighbour: &Patch,
) -> Result<CouplingKind, MeshAmiError> {
    let (od, nd) = (owner.dict(), neighbour.dict());
    let mismatch = |kind: &'static str| MeshAmiError::CouplingKindMismatch {
        patch: owner.name().to_owned(),
        neighbour: neighbour.name().to_owned(),
        kind,
    };
    match (&od.non_overlap_patch, &nd.non_overlap_patch) {
        (Some(oc), Some(nc)) => {
            return Ok(CouplingKind::Overlap {
                owner_companion: lookup(by_name, owner, "nonOverlapPatch", oc)?,
                neighbour_companion: lookup(by_name, neighbour, "nonOverlapPatch", nc)?,
            });
        }
        (None, None) => {}
        _ => return Err(mismatch("ACMI")),
    }
    match (&od.transform_patch, &nd.transform_patch) {
        (Some(ot), Some(nt)) => {
            if ot != nt {
                return Err(MeshAmiError::TransformPatchMismatch {
                    patch: owner.name().to_owned(),
                    ours: ot.clone(),
                    theirs: nt.clone(),
                });
            }
            if od.transform != TransformKind::None {
                return Err(MeshAmiError::ConflictingKeys {
                    patch: owner.name().to_owned(),
                    first: "transformPatch",
                    second: "transform",
                });
            }
            Ok(CouplingKind::Periodic {
                transform_patch: lookup(by_name, owner, "transformPatch", ot)?,
            })
        }
        (None, None) => Ok(CouplingKind::Plain),
        _ => Err(mismatch("repeat-AMI")),
    }
}

impl BoundaryMesh {
    pub fn new(patches: Vec<Patch>) -> Result<Self, MeshAmiError> {
        Self::with_settings(patches, CouplingSettings::default())
    }

    pub fn with_settings(
        patches: Vec<Patch>,
        settings: CouplingSettings,
    ) -> Result<Self, MeshAmiError> {
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(patches.len());
        for (i, p) in patches.iter().enumerate() {
            if by_name.insert(p.name(), i).is_some() {
                return Err(MeshAmiError::DuplicatePatchName(p.name().to_owned()));
            }
        }

        let declared = (0..patches.len())
            .map(|i| resolve_neighbour(i, &patches, &by_name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut partner: Vec<Option<usize>> = vec![None; patches.len()];
        for (i, target) in declared.iter().enumerate() {
            let Some(j) = *target else { continue };
            for (a, b) in [(i, j), (j, i)] {
                match partner[a] {
                    Some(k) if k != b => {
                        return Err(MeshAmiError::ConflictingCoupling {
                            patch: patches[a].name().to_owned(),
                            first: patches[k].name().to_owned(),
                            second: patches[b].name().to_owned(),
                        });
                    }
                    _ => partner[a] = Some(b),
                }
            }
            if declared[j].is_none() {
                warn!(
                    "patch `{}` names `{}` as its neighbour, but `{}` does not name `{}` back",
                    patches[i].name(),
                    patches[j].name(),
                    patches[j].name(),
                    patches[i].name()
                );
            }
        }

        let mut interfaces = Vec::new();
        let mut patch_interface = vec![None; patches.len()];
        for (owner, nbr) in partner.iter().enumerate() {
            let Some(neighbour) = *nbr else { continue };
            if neighbour < owner {
                continue;
            }
            let (o, n) = (&patches[owner], &patches[neighbour]);
            check_transform_kinds(o.name(), o.dict(), n.name(), n.dict())?;
            let kind = coupling_kind(&by_name, o, n)?;
            let config = TransformConfig::from_dict(o.name(), o.dict(), settings.match_tolerance)?;
            TransformConfig::from_dict(n.name(), n.dict(), settings.match_tolerance)?;

            let od = o.dict();
            let ami_settings = AmiSettings {
                method: od.method,
                require_match: kind == CouplingKind::Plain && od.require_match.unwrap_or(true),
                low_weight_correction: od.low_weight_correction,
                reverse_target: od.flip_normals,
            };
            patch_interface[owner] = Some(interfaces.len());
            patch_interface[neighbour] = Some(interfaces.len());
            interfaces.push(CoupledInterface::new(owner, neighbour, kind, config, ami_settings));
        }

        let mesh = Self {
            patches,
            interfaces,
            patch_interface,
            settings,
            engine: None,
        };
        mesh.check_companions()?;
        mesh.check_transform_patches()?;
        Ok(mesh)
    }

    /// Each non-overlap companion belongs to exactly one ACMI patch and is
    /// not coupled itself.
    fn check_companions(&self) -> Result<(), MeshAmiError> {
        let mut claimed = vec![false; self.patches.len()];
        for iface in &self.interfaces {
            let CouplingKind::Overlap {
                owner_companion,
                neighbour_companion,
            } = iface.kind()
            else {
                continue;
            };
            for (patch, companion) in [
                (iface.owner(), owner_companion),
                (iface.neighbour(), neighbour_companion),
            ] {
                let invalid = |reason: &'static str| MeshAmiError::InvalidCompanion {
                    patch: self.patches[patch].name().to_owned(),
                    companion: self.patches[companion].name().to_owned(),
                    reason,
                };
                if companion == iface.owner() || companion == iface.neighbour() {
                    return Err(invalid("is one of the ACMI pair itself"));
                }
                if self.patch_interface[companion].is_some() {
                    return Err(invalid("is a coupled patch"));
                }
                if claimed[companion] {
                    return Err(invalid("is already the companion of another patch"));
                }
                claimed[companion] = true;
            }
        }
        Ok(())
    }

    /// Transform patches must be coupled, non-periodic and carry a transform.
    fn check_transform_patches(&self) -> Result<(), MeshAmiError> {
        for iface in &self.interfaces {
            let CouplingKind::Periodic { transform_patch } = iface.kind() else {
                continue;
            };
            let invalid = |reason: &'static str| MeshAmiError::InvalidTransformPatch {
                patch: self.patches[iface.owner()].name().to_owned(),
                transform_patch: self.patches[transform_patch].name().to_owned(),
                reason,
            };
            if transform_patch == iface.owner() || transform_patch == iface.neighbour() {
                return Err(invalid("is one of the repeat pair itself"));
            }
            let Some(k) = self.patch_interface[transform_patch] else {
                return Err(invalid("is not a coupled patch"));
            };
            if matches!(self.interfaces[k].kind(), CouplingKind::Periodic { .. }) {
                return Err(invalid("is itself a repeat pair"));
            }
            if self.patches[transform_patch].dict().transform == TransformKind::None {
                return Err(invalid("declares no transform"));
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> &CouplingSettings {
        &self.settings
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, index: usize) -> Result<&Patch, MeshAmiError> {
        self.patches
            .get(index)
            .ok_or(MeshAmiError::PatchIndexOutOfRange {
                index,
                len: self.patches.len(),
            })
    }

    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name() == name)
    }

    pub fn interfaces(&self) -> &[CoupledInterface] {
        &self.interfaces
    }

    /// Replace the built-in engines by `engine` for every interface.
    pub fn set_engine(&mut self, engine: Arc<dyn AmiEngine>) {
        self.engine = Some(engine);
        self.notify_geometry_changed();
    }

    /// `patch`'s view of its coupled interface.
    pub fn coupling(&self, patch: usize) -> Result<PatchCoupling<'_>, MeshAmiError> {
        let p = self.patch(patch)?;
        let k = self.patch_interface[patch].ok_or_else(|| MeshAmiError::NotCoupled(p.name().to_owned()))?;
        let iface = &self.interfaces[k];
        let side = iface
            .side_of(patch)
            .ok_or_else(|| MeshAmiError::NotCoupled(p.name().to_owned()))?;
        Ok(PatchCoupling::new(p.name(), iface, side))
    }

    /// Dictionary of `patch` with the resolved transform written in.
    pub fn write_dict(&self, patch: usize) -> Result<PatchDict, MeshAmiError> {
        let mut dict = self.patch(patch)?.dict().clone();
        if let Ok(coupling) = self.coupling(patch) {
            if let Ok(t) = coupling.transform() {
                t.write_into(&mut dict);
            }
        }
        Ok(dict)
    }

    /// New point positions for `patch` (same count, same faces).
    pub fn move_points(&mut self, patch: usize, points: Vec<Vec3>) -> Result<(), MeshAmiError> {
        self.patch(patch)?;
        self.patches[patch].set_points(points)?;
        self.invalidate_dependents(patch);
        Ok(())
    }

    /// New points, faces and global ids for `patch`.
    pub fn update_patch_topology(
        &mut self,
        patch: usize,
        points: Vec<Vec3>,
        faces: Vec<Vec<usize>>,
        global_ids: Vec<usize>,
    ) -> Result<(), MeshAmiError> {
        self.patch(patch)?;
        self.patches[patch].set_topology(points, faces, global_ids)?;
        self.invalidate_dependents(patch);
        Ok(())
    }

    /// Mark every interface stale.
    pub fn notify_geometry_changed(&mut self) {
        self.interfaces.iter_mut().for_each(CoupledInterface::invalidate);
    }

    fn invalidate_dependents(&mut self, patch: usize) {
        let mut stale: Vec<bool> = self.interfaces.iter().map(|i| i.depends_on(patch)).collect();
        // a repeat pair follows the interface of its transform patch
        for (k, iface) in self.interfaces.iter().enumerate() {
            if let CouplingKind::Periodic { transform_patch } = iface.kind() {
                if let Some(t) = self.patch_interface[transform_patch] {
                    stale[k] |= stale[t];
                }
            }
        }
        for (iface, stale) in self.interfaces.iter_mut().zip(stale) {
            if stale {
                iface.invalidate();
            }
        }
    }

    /// Transform of `transform_patch` from its own side, if this rank holds any of its faces.
    fn transform_patch_local(&self, transform_patch: usize) -> Result<Option<RigidTransform>, MeshAmiError> {
        if self.patches[transform_patch].is_empty() {
            return Ok(None);
        }
        let coupling = self.coupling(transform_patch)?;
        let t = coupling.transform()?;
        Ok(Some(t.reverse))
    }

    /// Rebuild every stale interface; returns how many were rebuilt.
    ///
    /// Collective. Non-periodic interfaces are rebuilt first (in index order)
    /// because periodic ones take their base transform from them.
    pub fn update_couplings<C: Communicator>(&mut self, comm: &C) -> Result<usize, MeshAmiError> {
        let is_periodic = |i: &CoupledInterface| matches!(i.kind(), CouplingKind::Periodic { .. });
        let order: Vec<usize> = (0..self.interfaces.len())
            .filter(|&k| !is_periodic(&self.interfaces[k]))
            .chain((0..self.interfaces.len()).filter(|&k| is_periodic(&self.interfaces[k])))
            .collect();

        let mut rebuilt = 0;
        for k in order {
            if self.interfaces[k].is_built() {
                continue;
            }
            let local = match self.interfaces[k].kind() {
                CouplingKind::Periodic { transform_patch } => self.transform_patch_local(transform_patch)?,
                _ => None,
            };
            let fallback;
            let engine: &dyn AmiEngine = match &self.engine {
                Some(engine) => engine.as_ref(),
                None => {
                    fallback = engine_for(self.interfaces[k].ami_settings().method);
                    fallback.as_ref()
                }
            };
            self.interfaces[k].rebuild(comm, &mut self.patches, engine, &self.settings, local)?;
            rebuilt += 1;
        }
        if rebuilt > 0 {
            debug!("rank {}: rebuilt {rebuilt} coupled interfaces", comm.rank());
        }
        Ok(rebuilt)
    }

    /// Side of `patch` in its interface, if coupled.
    pub fn side_of(&self, patch: usize) -> Option<Side> {
        let k = (*self.patch_interface.get(patch)?)?;
        self.interfaces[k].side_of(patch)
    }
}
