//! Border regions of a subdomain: faces, edges and corners
//!
//! Every boundary cell of a subdomain belongs to exactly one border region. A region is tagged with
//! an offset vector `v ∈ {-1,0,1}³` with one (face), two (edge) or three (corner) non-zero components
//! pointing towards the neighbor processes it borders. A region is *external* if at least one of
//! these neighbors is another process, otherwise the subdomain is its own periodic neighbor there.
//!
//! Regions never own cells or proxies, they store indices into the [`CellGrid`] and the
//! [`ProxyRegistry`] of their process. All protocol operations are provided by the [`BorderRegion`]
//! trait and are driven by the region's [`InteractionPlan`].

use std::fmt;

use arrayvec::ArrayVec;
use log::trace;

use crate::cell_grid::{CellGrid, CellRef};
use crate::geometry::{GeometryInvariantViolation, ProcessCoordinate, SimulationGeometry};
use crate::ghost::{ProxyIndex, ProxyRegistry};
use crate::interaction::{BondForce, BondTable, PairForce};
use crate::particle::Bead;
use crate::profile;
use crate::protocol::{Phase, PhaseTracker};
use crate::topology::{Axis, AxisFlags, NeighborDirection};
use crate::{HaloError, Real};

pub mod builder;
pub mod corner;
pub mod edge;
pub mod face;

pub use builder::{BorderBuilder, BorderSet, EdgesBuilt, FacesBuilt};
pub use corner::Corner;
pub use edge::Edge;
pub use face::Face;

/// Identifier of a border region of a subdomain, the index of its offset vector
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(u8);

impl RegionId {
    /// Number of border regions of a subdomain
    pub const COUNT: usize = NeighborDirection::COUNT;

    #[inline(always)]
    pub fn from_direction(offset: NeighborDirection) -> Self {
        Self(offset.index() as u8)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the offset vector of the region
    #[inline(always)]
    pub fn direction(self) -> NeighborDirection {
        NeighborDirection::from_index(self.index())
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionId({}, {:?})", self.0, self.direction().offset())
    }
}

/// The three kinds of border regions
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RegionKind {
    Face,
    Edge,
    Corner,
}

impl RegionKind {
    /// Returns the kind of region with the given offset vector
    pub fn of(offset: NeighborDirection) -> Self {
        match offset.num_nonzero() {
            1 => RegionKind::Face,
            2 => RegionKind::Edge,
            _ => RegionKind::Corner,
        }
    }
}

/// Partition of the neighbor directions of a region's cells by how their pairs are evaluated
///
/// For a region with offset `v` on a process with external axes `E`, the directions leading to
/// ghost proxies are `G = { d : ∃a ∈ E, v_a ≠ 0, d_a = v_a }`. Pairs with local cells are evaluated
/// once along the canonical directions (Newton's third law). Pairs with ghost cells are evaluated
/// along all of `G` but only applied to the local bead, the owner of the ghost bead does the same
/// from its side.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct InteractionPlan {
    /// Canonical directions leading to local cells
    pub local: ArrayVec<NeighborDirection, 13>,
    /// Canonical directions leading to ghost proxies
    pub shared: ArrayVec<NeighborDirection, 13>,
    /// Non-canonical directions leading to ghost proxies
    pub correction: ArrayVec<NeighborDirection, 13>,
}

impl InteractionPlan {
    /// Computes the plan of a region from its offset vector and the external axes of the process
    pub fn new(offset: NeighborDirection, external_axes: AxisFlags) -> Self {
        let is_ghost_direction = |d: &NeighborDirection| {
            Axis::all_possible().iter().any(|&axis| {
                let v_a = offset.component(axis);
                external_axes.contains(axis.flag()) && v_a != 0 && d.component(axis) == v_a
            })
        };

        let mut plan = Self::default();
        for direction in NeighborDirection::canonical() {
            if is_ghost_direction(direction) {
                plan.shared.push(*direction);
            } else {
                plan.local.push(*direction);
            }
        }
        plan.correction = NeighborDirection::all()
            .iter()
            .filter(|d| !d.is_canonical() && is_ghost_direction(d))
            .copied()
            .collect();
        plan
    }

    /// Returns all directions that lead to ghost proxies
    pub fn ghost_directions(&self) -> impl Iterator<Item = &NeighborDirection> {
        self.shared.iter().chain(self.correction.iter())
    }
}

/// Cell and proxy indices of a region, shared by all region kinds
#[derive(Clone, Debug)]
pub struct RegionLayout {
    id: RegionId,
    /// Cells owned by the region for force and position updates
    cells: Vec<usize>,
    /// Cells used for ghost bookkeeping, sorted by flat index
    anchors: Vec<usize>,
    /// Proxies in direction of the offset vector of every anchor
    ghosts: Vec<ProxyIndex>,
    plan: InteractionPlan,
}

impl RegionLayout {
    /// Collects the cells of the region with the given offset and wires all ghost slots it is responsible for
    ///
    /// A region creates the proxies whose overhang direction equals its offset vector. Other ghost
    /// slots of its anchors have to be wired already by regions built before.
    pub(crate) fn build<R: Real>(
        geometry: &SimulationGeometry<R>,
        grid: &mut CellGrid<R>,
        registry: &mut ProxyRegistry<R>,
        offset: NeighborDirection,
        is_external: bool,
    ) -> Result<Self, GeometryInvariantViolation> {
        let id = RegionId::from_direction(offset);
        let (anchors, cells) = region_cells(geometry, offset);
        let process = *grid.process();

        let mut ghosts = Vec::new();
        if is_external {
            wire_anchors(geometry, grid, registry, &process, id, &anchors)?;
            ghosts = anchors
                .iter()
                .map(|&anchor| diagonal_ghost(geometry, grid, anchor, offset))
                .collect::<Result<Vec<_>, _>>()?;
        }

        trace!(
            "Built region {:?}: {} cells, {} anchors, {} ghosts",
            id,
            cells.len(),
            anchors.len(),
            ghosts.len()
        );

        Ok(Self {
            id,
            cells,
            anchors,
            ghosts,
            plan: InteractionPlan::new(offset, geometry.external_axes()),
        })
    }

    #[inline(always)]
    pub fn id(&self) -> RegionId {
        self.id
    }

    #[inline(always)]
    pub fn offset(&self) -> NeighborDirection {
        self.id.direction()
    }

    #[inline(always)]
    pub fn cells(&self) -> &[usize] {
        self.cells.as_slice()
    }

    #[inline(always)]
    pub fn anchors(&self) -> &[usize] {
        self.anchors.as_slice()
    }

    #[inline(always)]
    pub fn ghosts(&self) -> &[ProxyIndex] {
        self.ghosts.as_slice()
    }

    #[inline(always)]
    pub fn plan(&self) -> &InteractionPlan {
        &self.plan
    }
}

/// Returns the anchor cells and the owned cells of the region with the given offset, both sorted by flat index
fn region_cells<R: Real>(
    geometry: &SimulationGeometry<R>,
    offset: NeighborDirection,
) -> (Vec<usize>, Vec<usize>) {
    let n_cells = geometry.subdomain_cells();
    let boundary = |axis: Axis| -> Option<usize> {
        match offset.component(axis) {
            -1 => Some(0),
            1 => Some(n_cells[axis.dim()] - 1),
            _ => None,
        }
    };

    let mut anchors = Vec::new();
    let mut cells = Vec::new();
    for index in 0..geometry.num_subdomain_cells() {
        let ijk = geometry.unflatten_local_cell(index);
        let mut is_anchor = true;
        let mut is_owned = true;
        for &axis in Axis::all_possible() {
            let i = ijk[axis.dim()];
            match boundary(axis) {
                Some(b) => is_anchor &= i == b,
                None => is_owned &= i > 0 && i + 1 < n_cells[axis.dim()],
            }
        }
        if is_anchor {
            anchors.push(index);
            if is_owned {
                cells.push(index);
            }
        }
    }
    (anchors, cells)
}

/// Wires every neighbor slot of the anchors whose ghost overhangs in direction of the region's offset
fn wire_anchors<R: Real>(
    geometry: &SimulationGeometry<R>,
    grid: &mut CellGrid<R>,
    registry: &mut ProxyRegistry<R>,
    process: &ProcessCoordinate,
    id: RegionId,
    anchors: &[usize],
) -> Result<(), GeometryInvariantViolation> {
    let offset = id.direction();
    for &anchor in anchors {
        let ijk = signed(grid.cell(anchor).ijk());
        for &direction in NeighborDirection::all() {
            if let Err(key) = geometry.resolve_local(direction.apply(ijk)) {
                if geometry.overhang_direction(&key) == Some(offset) {
                    let proxy = registry.get_or_create(geometry, process, key, id)?;
                    grid.wire_ghost(anchor, direction, proxy);
                }
            }
        }
    }
    grid.refresh_force_loops(anchors);
    Ok(())
}

/// Returns the proxy in direction of the region offset of an anchor cell
fn diagonal_ghost<R: Real>(
    geometry: &SimulationGeometry<R>,
    grid: &CellGrid<R>,
    anchor: usize,
    offset: NeighborDirection,
) -> Result<ProxyIndex, GeometryInvariantViolation> {
    let cell = grid.cell(anchor);
    match cell.neighbor(offset) {
        CellRef::Ghost(proxy) => Ok(proxy),
        CellRef::Unresolved => {
            let target = offset.apply(signed(cell.ijk()));
            let key = geometry.resolve_local(target).err().unwrap_or(target);
            Err(GeometryInvariantViolation::MissingProxy { key })
        }
        CellRef::Local(_) => Err(GeometryInvariantViolation::UnexpectedNeighbor {
            cell: *cell.ijk(),
            direction: offset.index(),
            expected: "ghost",
        }),
    }
}

#[inline(always)]
fn signed(ijk: &[usize; 3]) -> [i64; 3] {
    [ijk[0] as i64, ijk[1] as i64, ijk[2] as i64]
}

/// Everything a region needs to run the protocol operations of one process
pub struct HaloContext<'a, R: Real> {
    pub geometry: &'a SimulationGeometry<R>,
    pub grid: &'a mut CellGrid<R>,
    pub registry: &'a ProxyRegistry<R>,
    pub phase: &'a PhaseTracker,
    pub pair_force: &'a dyn PairForce<R>,
    pub bond_force: &'a dyn BondForce<R>,
    pub bonds: &'a BondTable,
}

/// Protocol operations shared by faces, edges and corners
///
/// Every operation checks the current [`Phase`] first and fails with a
/// [`ProtocolOrderingViolation`](crate::protocol::ProtocolOrderingViolation) if it is called out of
/// order. Operations on ghost pairs are no-ops for regions that are not external.
pub trait BorderRegion<R: Real>: Send + Sync {
    /// Returns the cell and proxy indices of the region
    fn layout(&self) -> &RegionLayout;

    /// Returns whether the region borders at least one other process
    fn is_external(&self) -> bool;

    fn kind(&self) -> RegionKind {
        RegionKind::of(self.offset())
    }

    fn id(&self) -> RegionId {
        self.layout().id()
    }

    fn offset(&self) -> NeighborDirection {
        self.layout().offset()
    }

    /// Cells owned by the region for force and position updates
    fn cells(&self) -> &[usize] {
        self.layout().cells()
    }

    /// Cells used for ghost bookkeeping
    fn anchor_cells(&self) -> &[usize] {
        self.layout().anchors()
    }

    /// Proxies referenced by the region
    fn ghost_cells(&self) -> &[ProxyIndex] {
        self.layout().ghosts()
    }

    fn plan(&self) -> &InteractionPlan {
        self.layout().plan()
    }

    /// Returns the position of a cell in the list of anchor cells
    fn anchor_position(&self, cell: usize) -> Option<usize> {
        self.anchor_cells().binary_search(&cell).ok()
    }

    /// Advances the beads of a region without neighbor processes
    fn update_pos(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase.require("update_pos", Phase::PositionUpdate)?;
        integrate_cells(ctx, self.cells(), false)
    }

    /// Advances the beads of an external region, beads moving to another process are marked as lost
    fn update_shared_pos(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase
            .require("update_shared_pos", Phase::PositionUpdate)?;
        integrate_cells(ctx, self.cells(), true)
    }

    /// Non-bonded forces within the region's cells and with local neighbor cells
    fn update_force(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase.require("update_force", Phase::LocalForce)?;
        local_pair_forces(ctx, self.cells(), &self.plan().local)
    }

    /// Non-bonded forces with ghost cells in canonical directions
    fn calculate_shared_force(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase
            .require("calculate_shared_force", Phase::SharedForce)?;
        if !self.is_external() {
            return Ok(());
        }
        ghost_pair_forces(ctx, self.cells(), &self.plan().shared)
    }

    /// Non-bonded forces with ghost cells in the non-canonical directions of the region's orientation
    fn calculate_correction_force(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase
            .require("calculate_correction_force", Phase::SharedForce)?;
        if !self.is_external() {
            return Ok(());
        }
        ghost_pair_forces(ctx, self.cells(), &self.plan().correction)
    }

    /// Commits the staged ghost pair forces of the region's beads to their total forces
    fn update_shared_force(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase
            .require("update_shared_force", Phase::ForceCompletion)?;
        for &cell in self.cells() {
            for bead in ctx.grid.cell_mut(cell).beads_mut() {
                bead.commit_shared_force();
            }
        }
        Ok(())
    }

    /// Bond forces of the region's beads whose partner is owned by another process
    fn calculate_shared_bond_force(&self, ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
        ctx.phase
            .require("calculate_shared_bond_force", Phase::BondedForce)?;
        shared_bond_forces(ctx, self.cells())
    }

    /// Clears the proxies created by this region, returns the number of cleared proxies
    fn clear_external_cells(
        &self,
        registry: &mut ProxyRegistry<R>,
        phase: &PhaseTracker,
    ) -> Result<usize, HaloError> {
        phase.require("clear_external_cells", Phase::GhostExchange)?;
        Ok(registry.clear_owned_by(self.id()))
    }

    /// Returns the beads resident in the region's cells
    fn get_beads<'g>(&self, grid: &'g CellGrid<R>) -> Vec<&'g Bead<R>> {
        self.cells()
            .iter()
            .flat_map(|&c| grid.cell(c).beads().iter())
            .collect()
    }

    /// Returns the ghost beads mirrored in the proxies referenced by the region
    fn get_external_beads<'g>(&self, registry: &'g ProxyRegistry<R>) -> Vec<&'g Bead<R>> {
        self.ghost_cells()
            .iter()
            .flat_map(|&p| registry.get(p).beads().iter())
            .collect()
    }
}

/// Integrates velocities and positions of all beads in the given cells (semi-implicit Euler, unit mass)
///
/// Beads that leave their cell are queued as arrivals of the destination cell. Beads whose new
/// cell is owned by another process are marked as lost if `allow_migration` is set.
pub(crate) fn integrate_cells<R: Real>(
    ctx: &mut HaloContext<'_, R>,
    cells: &[usize],
    allow_migration: bool,
) -> Result<(), HaloError> {
    let geometry = ctx.geometry;
    let dt = geometry.time_step();
    let process = *ctx.grid.process();

    for &cell_index in cells {
        let ijk = *ctx.grid.cell(cell_index).ijk();
        let old_global = geometry.global_cell_of_local(&process, &ijk);
        let beads = std::mem::take(ctx.grid.cell_mut(cell_index).beads_mut());
        let mut staying = Vec::with_capacity(beads.len());

        for mut bead in beads {
            bead.velocity += bead.force * dt;
            bead.position = geometry.wrap_position(&(bead.position + bead.velocity * dt));

            let new_global = geometry.global_cell_of(&bead.position);
            if !geometry.are_adjacent_global_cells(&old_global, &new_global) {
                return Err(GeometryInvariantViolation::ExcessiveDisplacement {
                    bead: bead.id,
                    from: old_global,
                    to: new_global,
                }
                .into());
            }

            let (owner, local) = geometry.owner_of_global_cell(&new_global);
            if owner != process {
                if !allow_migration {
                    return Err(GeometryInvariantViolation::LeftSubdomain { bead: bead.id, cell: ijk }.into());
                }
                ctx.grid.push_lost(cell_index, bead);
                continue;
            }

            let destination = ctx.grid.flatten(&local);
            if destination == cell_index {
                staying.push(bead);
            } else {
                ctx.grid.push_arrival(destination, bead);
            }
        }

        *ctx.grid.cell_mut(cell_index).beads_mut() = staying;
    }

    Ok(())
}

/// Pairs within each of the given cells and with their local neighbors in the given directions, Newton's third law
pub(crate) fn local_pair_forces<R: Real>(
    ctx: &mut HaloContext<'_, R>,
    cells: &[usize],
    directions: &[NeighborDirection],
) -> Result<(), HaloError> {
    profile!("local_pair_forces");
    let geometry = ctx.geometry;
    let pair_force = ctx.pair_force;

    for &cell_index in cells {
        intra_cell_forces(geometry, pair_force, ctx.grid.cell_mut(cell_index).beads_mut());

        for &direction in directions {
            let neighbor = match ctx.grid.cell(cell_index).neighbor(direction) {
                CellRef::Local(neighbor) => neighbor,
                _ => {
                    return Err(GeometryInvariantViolation::UnexpectedNeighbor {
                        cell: *ctx.grid.cell(cell_index).ijk(),
                        direction: direction.index(),
                        expected: "local",
                    }
                    .into());
                }
            };

            neighbor_pair_forces(geometry, pair_force, ctx.grid, cell_index, neighbor);
        }
    }

    Ok(())
}

/// Canonical force loop of cells whose 13 force loop neighbors are all local
pub(crate) fn bulk_pair_forces<R: Real>(
    ctx: &mut HaloContext<'_, R>,
    cells: &[usize],
) -> Result<(), HaloError> {
    profile!("bulk_pair_forces");
    let geometry = ctx.geometry;
    let pair_force = ctx.pair_force;

    for &cell_index in cells {
        intra_cell_forces(geometry, pair_force, ctx.grid.cell_mut(cell_index).beads_mut());

        let force_neighbors = *ctx.grid.cell(cell_index).force_neighbors();
        for (slot, neighbor) in force_neighbors.iter().enumerate() {
            let Some(neighbor) = neighbor.local() else {
                return Err(GeometryInvariantViolation::UnexpectedNeighbor {
                    cell: *ctx.grid.cell(cell_index).ijk(),
                    direction: NeighborDirection::canonical()[slot].index(),
                    expected: "local",
                }
                .into());
            };
            neighbor_pair_forces(geometry, pair_force, ctx.grid, cell_index, neighbor);
        }
    }

    Ok(())
}

/// All pairs between two distinct local cells, Newton's third law
fn neighbor_pair_forces<R: Real>(
    geometry: &SimulationGeometry<R>,
    pair_force: &dyn PairForce<R>,
    grid: &mut CellGrid<R>,
    cell_index: usize,
    neighbor: usize,
) {
    let (cell, other) = grid.get_pair_mut(cell_index, neighbor);
    for bead_i in cell.beads_mut().iter_mut() {
        for bead_j in other.beads_mut().iter_mut() {
            let r_ij = geometry.minimum_image(&(bead_i.position - bead_j.position));
            let f = pair_force.force(&r_ij, bead_i.kind, bead_j.kind);
            bead_i.force += f;
            bead_j.force -= f;
        }
    }
}

/// All pairs within a single cell, each evaluated once
pub(crate) fn intra_cell_forces<R: Real>(
    geometry: &SimulationGeometry<R>,
    pair_force: &dyn PairForce<R>,
    beads: &mut [Bead<R>],
) {
    for i in 1..beads.len() {
        let (head, tail) = beads.split_at_mut(i);
        let bead_i = &mut tail[0];
        for bead_j in head.iter_mut() {
            let r_ij = geometry.minimum_image(&(bead_i.position - bead_j.position));
            let f = pair_force.force(&r_ij, bead_i.kind, bead_j.kind);
            bead_i.force += f;
            bead_j.force -= f;
        }
    }
}

/// Pairs of the given cells with ghost beads in the given directions, staged on the local bead only
pub(crate) fn ghost_pair_forces<R: Real>(
    ctx: &mut HaloContext<'_, R>,
    cells: &[usize],
    directions: &[NeighborDirection],
) -> Result<(), HaloError> {
    profile!("ghost_pair_forces");
    let geometry = ctx.geometry;
    let pair_force = ctx.pair_force;
    let registry = ctx.registry;

    for &cell_index in cells {
        for &direction in directions {
            let proxy = match ctx.grid.cell(cell_index).neighbor(direction) {
                CellRef::Ghost(proxy) => registry.get(proxy),
                _ => {
                    return Err(GeometryInvariantViolation::UnexpectedNeighbor {
                        cell: *ctx.grid.cell(cell_index).ijk(),
                        direction: direction.index(),
                        expected: "ghost",
                    }
                    .into());
                }
            };

            for bead in ctx.grid.cell_mut(cell_index).beads_mut().iter_mut() {
                for ghost in proxy.beads() {
                    let r_ij = geometry.minimum_image(&(bead.position - ghost.position));
                    bead.shared_force += pair_force.force(&r_ij, bead.kind, ghost.kind);
                }
            }
        }
    }

    Ok(())
}

/// Returns the minimum image bond vector and checks the bond length precondition
fn bond_vector<R: Real>(
    geometry: &SimulationGeometry<R>,
    bead: &Bead<R>,
    partner_id: i64,
    partner_position: &nalgebra::Vector3<R>,
) -> Result<nalgebra::Vector3<R>, GeometryInvariantViolation> {
    let r_ij = geometry.minimum_image(&(bead.position - partner_position));
    let length = r_ij.norm();
    if length > geometry.min_cell_width() {
        return Err(GeometryInvariantViolation::BondTooLong {
            bead: bead.id,
            partner: partner_id,
            length: length.to_f64().unwrap_or(f64::NAN),
            max_length: geometry.min_cell_width().to_f64().unwrap_or(f64::NAN),
        });
    }
    Ok(r_ij)
}

/// Bonds between two local beads, each evaluated once and applied to both beads
pub(crate) fn local_bond_forces<R: Real>(ctx: &mut HaloContext<'_, R>) -> Result<(), HaloError> {
    profile!("local_bond_forces");
    if ctx.bonds.is_empty() {
        return Ok(());
    }

    let mut contributions = Vec::new();
    for (cell_index, cell) in ctx.grid.cells().iter().enumerate() {
        for (slot, bead) in cell.beads().iter().enumerate() {
            for &partner in ctx.bonds.partners(bead.id) {
                if partner < bead.id {
                    continue;
                }
                let Some((partner_cell, partner_slot)) = ctx.grid.locate(partner) else {
                    continue;
                };
                let partner_position = ctx.grid.cell(partner_cell).beads()[partner_slot].position;
                let r_ij = bond_vector(ctx.geometry, bead, partner, &partner_position)?;
                let f = ctx.bond_force.force(&r_ij);
                contributions.push(((cell_index, slot), f));
                contributions.push(((partner_cell, partner_slot), -f));
            }
        }
    }

    for ((cell, slot), f) in contributions {
        ctx.grid.cell_mut(cell).beads_mut()[slot].force += f;
    }
    Ok(())
}

/// Bonds of beads in the given cells whose partner is not local, applied to the local bead only
///
/// The partner has to be mirrored in a ghost proxy adjacent to the bead's cell.
pub(crate) fn shared_bond_forces<R: Real>(
    ctx: &mut HaloContext<'_, R>,
    cells: &[usize],
) -> Result<(), HaloError> {
    if ctx.bonds.is_empty() {
        return Ok(());
    }

    let registry = ctx.registry;
    let mut contributions = Vec::new();
    for &cell_index in cells {
        let cell = ctx.grid.cell(cell_index);
        for (slot, bead) in cell.beads().iter().enumerate() {
            for &partner in ctx.bonds.partners(bead.id) {
                if ctx.grid.locate(partner).is_some() {
                    continue;
                }

                let partner_position = cell
                    .neighbors()
                    .iter()
                    .filter_map(|n| n.ghost())
                    .find_map(|proxy| {
                        registry
                            .get(proxy)
                            .beads()
                            .iter()
                            .find(|g| g.id == partner)
                            .map(|g| g.position)
                    })
                    .ok_or(GeometryInvariantViolation::MissingBondPartner {
                        bead: bead.id,
                        partner,
                    })?;

                let r_ij = bond_vector(ctx.geometry, bead, partner, &partner_position)?;
                contributions.push((cell_index, slot, ctx.bond_force.force(&r_ij)));
            }
        }
    }

    for (cell, slot, f) in contributions {
        ctx.grid.cell_mut(cell).beads_mut()[slot].force += f;
    }
    Ok(())
}
