//! One coupled interface per patch pair, and the side-aware views onto it.
//!
//! An interface is either `Invalid` (geometry changed since the last build, or
//! never built) or `Built`. Reads never rebuild: they fail with `NotBuilt`
//! until [`BoundaryMesh::update_couplings`](crate::topology::BoundaryMesh::update_couplings)
//! has run on every rank.

use crate::algs::communicator::Communicator;
use crate::coupling::acmi::{self, OverlapMasks};
use crate::coupling::ami::build_local;
use crate::coupling::cyclic_transform::{CyclicTransform, TransformConfig, resolve_transform};
use crate::coupling::repeat::{RepeatState, agree_transform_patch, resolve_repeat};
use crate::coupling::{Side, side_rows};
use crate::data::dict::CouplingSettings;
use crate::engine::instance::interpolate_rows;
use crate::engine::{AmiEngine, AmiInstance, AmiRows, AmiSettings};
use crate::geometry::transform::RigidTransform;
use crate::mesh_error::MeshAmiError;
use crate::topology::patch::Patch;
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceState {
    Invalid,
    Built,
}

/// What kind of coupling a pair is, with the helper patches it needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouplingKind {
    /// Plain AMI (optionally cyclic through a transform).
    Plain,
    /// Partially overlapping pair; each side has a non-overlap companion.
    Overlap {
        owner_companion: usize,
        neighbour_companion: usize,
    },
    /// Periodic pair `n` applications of the transform patch's transform apart.
    Periodic { transform_patch: usize },
}

/// Built state of an interface.
#[derive(Clone, Debug, PartialEq)]
pub enum CouplingData {
    Plain(AmiInstance),
    Overlap {
        ami: AmiInstance,
        masks: OverlapMasks,
    },
    Periodic(RepeatState),
}

#[derive(Clone, Debug)]
pub struct CoupledInterface {
    owner: usize,
    neighbour: usize,
    kind: CouplingKind,
    transform_config: TransformConfig,
    ami_settings: AmiSettings,
    state: InterfaceState,
    transform: Option<CyclicTransform>,
    data: Option<CouplingData>,
    builds: usize,
}

impl CoupledInterface {
    pub fn new(
        owner: usize,
        neighbour: usize,
        kind: CouplingKind,
        transform_config: TransformConfig,
        ami_settings: AmiSettings,
    ) -> Self {
        Self {
            owner,
            neighbour,
            kind,
            transform_config,
            ami_settings,
            state: InterfaceState::Invalid,
            transform: None,
            data: None,
            builds: 0,
        }
    }

    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn neighbour(&self) -> usize {
        self.neighbour
    }

    pub fn kind(&self) -> CouplingKind {
        self.kind
    }

    pub fn state(&self) -> InterfaceState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state == InterfaceState::Built
    }

    pub fn ami_settings(&self) -> &AmiSettings {
        &self.ami_settings
    }

    pub fn transform_config(&self) -> &TransformConfig {
        &self.transform_config
    }

    /// Number of completed builds.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn side_of(&self, patch: usize) -> Option<Side> {
        if patch == self.owner {
            Some(Side::Owner)
        } else if patch == self.neighbour {
            Some(Side::Neighbour)
        } else {
            None
        }
    }

    /// True when a change to `patch` makes this interface stale.
    pub fn depends_on(&self, patch: usize) -> bool {
        if patch == self.owner || patch == self.neighbour {
            return true;
        }
        match self.kind {
            CouplingKind::Plain => false,
            CouplingKind::Overlap {
                owner_companion,
                neighbour_companion,
            } => patch == owner_companion || patch == neighbour_companion,
            CouplingKind::Periodic { transform_patch } => patch == transform_patch,
        }
    }

    pub fn invalidate(&mut self) {
        self.state = InterfaceState::Invalid;
    }

    /// Owner-side transform, if built.
    pub fn transform(&self) -> Option<&CyclicTransform> {
        self.transform.as_ref()
    }

    pub fn data(&self) -> Option<&CouplingData> {
        self.data.as_ref()
    }

    /// Rebuild transform and weights from the current patch geometry.
    ///
    /// Collective. For periodic pairs `transform_patch_local` is the transform
    /// patch's transform (from its own side) on ranks that hold some of its faces.
    pub fn rebuild<C: Communicator>(
        &mut self,
        comm: &C,
        patches: &mut [Patch],
        engine: &dyn AmiEngine,
        settings: &CouplingSettings,
        transform_patch_local: Option<RigidTransform>,
    ) -> Result<(), MeshAmiError> {
        self.state = InterfaceState::Invalid;
        self.transform = None;
        self.data = None;

        let (owner, neighbour) = (&patches[self.owner], &patches[self.neighbour]);
        let transform = resolve_transform(comm, &self.transform_config, owner, neighbour)?;

        let data = match self.kind {
            CouplingKind::Plain => CouplingData::Plain(build_local(
                comm,
                engine,
                owner,
                neighbour,
                &transform.forward,
                &self.ami_settings,
            )?),
            CouplingKind::Overlap {
                owner_companion,
                neighbour_companion,
            } => {
                acmi::check_companion(comm, owner, &patches[owner_companion])?;
                acmi::check_companion(comm, neighbour, &patches[neighbour_companion])?;
                let ami = build_local(
                    comm,
                    engine,
                    owner,
                    neighbour,
                    &transform.forward,
                    &self.ami_settings,
                )?;
                let masks = acmi::compute_masks(&ami, settings.overlap_tolerance);
                let (patch, companion) = pair_mut(patches, self.owner, owner_companion)?;
                acmi::apply_mask(patch, companion, &masks.owner)?;
                let (patch, companion) = pair_mut(patches, self.neighbour, neighbour_companion)?;
                acmi::apply_mask(patch, companion, &masks.neighbour)?;
                CouplingData::Overlap { ami, masks }
            }
            CouplingKind::Periodic { transform_patch } => {
                let base = agree_transform_patch(
                    comm,
                    owner.name(),
                    patches[transform_patch].name(),
                    transform_patch_local,
                    settings.transform_tolerance,
                )?;
                CouplingData::Periodic(resolve_repeat(
                    comm,
                    engine,
                    owner,
                    neighbour,
                    base,
                    &self.ami_settings,
                    settings.max_repeat_walk,
                )?)
            }
        };

        self.transform = Some(transform);
        self.data = Some(data);
        self.state = InterfaceState::Built;
        self.builds += 1;
        debug!(
            "interface `{}`/`{}` rebuilt ({} builds)",
            patches[self.owner].name(),
            patches[self.neighbour].name(),
            self.builds
        );
        Ok(())
    }
}

/// Two distinct patches borrowed mutably.
fn pair_mut(patches: &mut [Patch], a: usize, b: usize) -> Result<(&mut Patch, &mut Patch), MeshAmiError> {
    if a == b || a.max(b) >= patches.len() {
        return Err(MeshAmiError::PatchIndexOutOfRange {
            index: a.max(b),
            len: patches.len(),
        });
    }
    if a < b {
        let (lo, hi) = patches.split_at_mut(b);
        Ok((&mut lo[a], &mut hi[0]))
    } else {
        let (lo, hi) = patches.split_at_mut(a);
        Ok((&mut hi[0], &mut lo[b]))
    }
}

/// One patch's view of its coupled interface.
#[derive(Clone, Copy, Debug)]
pub struct PatchCoupling<'a> {
    name: &'a str,
    interface: &'a CoupledInterface,
    side: Side,
}

impl<'a> PatchCoupling<'a> {
    pub(crate) fn new(name: &'a str, interface: &'a CoupledInterface, side: Side) -> Self {
        Self {
            name,
            interface,
            side,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_owner(&self) -> bool {
        self.side == Side::Owner
    }

    /// Index of the patch on the other side.
    pub fn neighbour_patch(&self) -> usize {
        match self.side {
            Side::Owner => self.interface.neighbour,
            Side::Neighbour => self.interface.owner,
        }
    }

    pub fn interface(&self) -> &'a CoupledInterface {
        self.interface
    }

    pub fn kind(&self) -> CouplingKind {
        self.interface.kind
    }

    fn data(&self) -> Result<&'a CouplingData, MeshAmiError> {
        let interface: &'a CoupledInterface = self.interface;
        match (interface.state, &interface.data) {
            (InterfaceState::Built, Some(data)) => Ok(data),
            _ => Err(MeshAmiError::NotBuilt(self.name.to_owned())),
        }
    }

    /// The resolved transform as seen from this side.
    pub fn transform(&self) -> Result<CyclicTransform, MeshAmiError> {
        self.data()?;
        let t = self
            .interface
            .transform
            .ok_or_else(|| MeshAmiError::NotBuilt(self.name.to_owned()))?;
        Ok(match self.side {
            Side::Owner => t,
            Side::Neighbour => t.neighbour_view(),
        })
    }

    /// Addressing and weights of this side's local faces (plain and overlap pairs).
    ///
    /// Periodic pairs carry two instances; use [`repeat`](Self::repeat).
    pub fn rows(&self) -> Result<AmiRows<'a>, MeshAmiError> {
        match self.data()? {
            CouplingData::Plain(ami) | CouplingData::Overlap { ami, .. } => {
                Ok(side_rows(ami, self.side))
            }
            CouplingData::Periodic(_) => Err(MeshAmiError::InvalidGeometry(format!(
                "patch `{}` is a repeat pair with two weight tables",
                self.name
            ))),
        }
    }

    /// Raw coverage of each local face (combined over both candidates for periodic pairs).
    pub fn weights_sum(&self) -> Result<&'a [f64], MeshAmiError> {
        match self.data()? {
            CouplingData::Plain(ami) | CouplingData::Overlap { ami, .. } => {
                Ok(side_rows(ami, self.side).weights_sum)
            }
            CouplingData::Periodic(state) => Ok(state.weights_sum(self.side)),
        }
    }

    /// Overlap mask of this side, for overlap pairs.
    pub fn mask(&self) -> Result<Option<&'a [f64]>, MeshAmiError> {
        Ok(match self.data()? {
            CouplingData::Overlap { masks, .. } => Some(match self.side {
                Side::Owner => masks.owner.as_slice(),
                Side::Neighbour => masks.neighbour.as_slice(),
            }),
            _ => None,
        })
    }

    pub fn repeat(&self) -> Result<Option<&'a RepeatState>, MeshAmiError> {
        Ok(match self.data()? {
            CouplingData::Periodic(state) => Some(state),
            _ => None,
        })
    }

    /// Interpolate the neighbour's field (ordered by its global face ids) onto this side.
    pub fn interpolate(
        &self,
        donor: &[f64],
        default_values: Option<&[f64]>,
    ) -> Result<Vec<f64>, MeshAmiError> {
        let lwc = self.interface.ami_settings.low_weight_correction;
        match self.data()? {
            CouplingData::Plain(ami) | CouplingData::Overlap { ami, .. } => {
                interpolate_rows(side_rows(ami, self.side), donor, default_values, lwc)
            }
            CouplingData::Periodic(state) => state.interpolate(self.side, donor, default_values, lwc),
        }
    }

    /// Overlap pairs: `mask·interpolated + (1 − mask)·non_overlap`. Other pairs interpolate.
    pub fn interpolate_blended(
        &self,
        donor: &[f64],
        non_overlap: &[f64],
    ) -> Result<Vec<f64>, MeshAmiError> {
        let coupled = self.interpolate(donor, None)?;
        match self.mask()? {
            Some(mask) => acmi::blend(&coupled, non_overlap, mask),
            None => Ok(coupled),
        }
    }
}
