//! The per-process driver running the synchronization protocol of a time step

use log::{debug, trace};

use crate::border::{
    BorderSet, HaloContext, RegionId, bulk_pair_forces, integrate_cells, local_bond_forces,
};
use crate::cell_grid::{CellGrid, CellRef};
use crate::comm::{Communicator, GhostRecord, MessageTag, decode_records, encode_records};
use crate::geometry::{
    ConfigurationError, GeometryInvariantViolation, ProcessCoordinate, SimulationGeometry,
};
use crate::ghost::ProxyRegistry;
use crate::interaction::ForceField;
use crate::particle::{Bead, ParticleSnapshot};
use crate::profile;
use crate::protocol::{Phase, PhaseTracker};
use crate::topology::NeighborDirection;
use crate::{HaloError, Real};

/// Boundary cell whose beads are mirrored into a ghost proxy of a neighbor process
#[derive(Copy, Clone, Debug)]
struct GhostRoute {
    /// Position of the destination rank in the sorted list of neighbor ranks
    neighbor: usize,
    cell: usize,
    region: u32,
    anchor: u32,
    direction: u32,
}

/// Counters of a single time step of one process
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct StepStatistics {
    pub step: u64,
    pub n_beads: usize,
    pub n_ghost_beads: usize,
    pub n_emigrants: usize,
    pub n_immigrants: usize,
}

/// One subdomain of the decomposed simulation with its cells, ghost proxies and border regions
pub struct Subdomain<R: Real, C: Communicator> {
    geometry: SimulationGeometry<R>,
    process: ProcessCoordinate,
    rank: usize,
    grid: CellGrid<R>,
    registry: ProxyRegistry<R>,
    borders: BorderSet<R>,
    phase: PhaseTracker,
    forces: ForceField<R>,
    comm: C,
    /// Ranks of all distinct neighbor processes, sorted
    neighbor_ranks: Vec<usize>,
    ghost_routes: Vec<GhostRoute>,
}

impl<R: Real, C: Communicator> Subdomain<R, C> {
    /// Creates the subdomain of the rank of the given communicator and builds its border regions
    pub fn new(
        geometry: &SimulationGeometry<R>,
        forces: ForceField<R>,
        comm: C,
    ) -> Result<Self, HaloError> {
        profile!("Subdomain::new");
        if comm.size() != geometry.num_processes() {
            return Err(ConfigurationError::ProcessCountMismatch {
                expected: geometry.num_processes(),
                actual: comm.size(),
            }
            .into());
        }
        if forces.pair.cutoff() > geometry.cutoff() {
            return Err(ConfigurationError::InvalidCutoff {
                cutoff: forces.pair.cutoff().to_f64().unwrap_or(f64::NAN),
                min_cell_width: geometry.cutoff().to_f64().unwrap_or(f64::NAN),
            }
            .into());
        }

        let rank = comm.rank();
        let process = geometry.coord_of(rank);
        let mut grid = CellGrid::new(geometry, process);
        let mut registry = ProxyRegistry::new();
        let borders = BorderSet::build(geometry, &mut grid, &mut registry)?;
        let neighbor_ranks = geometry.neighbor_ranks(&process);
        let ghost_routes = Self::ghost_routes(geometry, &grid, &borders, &process, &neighbor_ranks)?;

        debug!(
            "Rank {} at {:?}: {} proxies, {} neighbor ranks, {} ghost routes",
            rank,
            process,
            registry.len(),
            neighbor_ranks.len(),
            ghost_routes.len()
        );

        Ok(Self {
            geometry: geometry.clone(),
            process,
            rank,
            grid,
            registry,
            borders,
            phase: PhaseTracker::new(),
            forces,
            comm,
            neighbor_ranks,
            ghost_routes,
        })
    }

    /// Computes for every boundary cell and every neighbor process mirroring it where its beads end up
    ///
    /// The cell `c` mirrored in direction `s` appears on the receiver as the extended cell
    /// `c - s⊙L`, which is the neighbor in direction `-s` of an anchor of the receiver's region `-s`.
    /// All processes share the same layout, so the anchor position is looked up locally.
    fn ghost_routes(
        geometry: &SimulationGeometry<R>,
        grid: &CellGrid<R>,
        borders: &BorderSet<R>,
        process: &ProcessCoordinate,
        neighbor_ranks: &[usize],
    ) -> Result<Vec<GhostRoute>, HaloError> {
        let n_cells = geometry.subdomain_cells();
        let external_axes = geometry.external_axes();
        let mut routes = Vec::new();

        for &direction in NeighborDirection::all() {
            if !external_axes.contains(direction.support()) {
                continue;
            }
            let dest = geometry.neighbor_rank(process, direction);
            let neighbor = neighbor_ranks
                .binary_search(&dest)
                .map_err(|_| anyhow::anyhow!("rank {} is not a neighbor of {:?}", dest, process))?;

            let receiver_direction = direction.opposite();
            let receiver_region = borders.region(RegionId::from_direction(receiver_direction));

            for (cell, c) in grid.cells().iter().enumerate() {
                let ijk = c.ijk();
                let mut anchor = *ijk;
                let mut on_boundary = true;
                for dim in 0..3 {
                    match direction.offset()[dim] {
                        1 => {
                            on_boundary &= ijk[dim] == n_cells[dim] - 1;
                            anchor[dim] = 0;
                        }
                        -1 => {
                            on_boundary &= ijk[dim] == 0;
                            anchor[dim] = n_cells[dim] - 1;
                        }
                        _ => {}
                    }
                }
                if !on_boundary {
                    continue;
                }

                let anchor_position = receiver_region
                    .anchor_position(grid.flatten(&anchor))
                    .ok_or_else(|| {
                        anyhow::anyhow!("cell {:?} is no anchor of region {:?}", anchor, receiver_region.id())
                    })?;
                routes.push(GhostRoute {
                    neighbor,
                    cell,
                    region: receiver_region.id().index() as u32,
                    anchor: anchor_position as u32,
                    direction: receiver_direction.index() as u32,
                });
            }
        }

        trace!("Computed {} ghost routes", routes.len());
        Ok(routes)
    }

    /// Inserts all beads whose position lies in this subdomain, returns the number of inserted beads
    pub fn insert_owned_beads<'b>(&mut self, beads: impl IntoIterator<Item = &'b Bead<R>>) -> usize {
        let mut n_inserted = 0;
        for bead in beads {
            let (owner, local) = self.geometry.owner_of_position(&bead.position);
            if owner == self.process {
                let mut bead = bead.clone();
                bead.position = self.geometry.wrap_position(&bead.position);
                bead.reset_forces();
                let cell = self.grid.flatten(&local);
                self.grid.insert(cell, bead);
                n_inserted += 1;
            }
        }
        self.grid.rebuild_bead_index();
        n_inserted
    }

    /// Runs all phases of one time step
    pub fn step(&mut self) -> Result<StepStatistics, HaloError> {
        profile!("step");
        let mut stats = StepStatistics::default();

        self.phase.advance(Phase::PositionUpdate)?;
        self.update_positions()?;

        self.phase.advance(Phase::Migration)?;
        (stats.n_emigrants, stats.n_immigrants) = self.migrate()?;

        self.phase.advance(Phase::GhostExchange)?;
        stats.n_ghost_beads = self.exchange_ghosts()?;

        self.phase.advance(Phase::LocalForce)?;
        self.compute_local_forces()?;

        self.phase.advance(Phase::SharedForce)?;
        self.compute_shared_forces()?;

        self.phase.advance(Phase::ForceCompletion)?;
        self.complete_shared_forces()?;

        self.phase.advance(Phase::BondedForce)?;
        self.compute_bond_forces()?;

        self.phase.advance(Phase::Complete)?;
        stats.step = self.phase.step();
        stats.n_beads = self.grid.num_beads();

        trace!("Rank {} finished step: {:?}", self.rank, stats);
        Ok(stats)
    }

    /// Splits the subdomain into the context for the region operations and the regions
    fn context(&mut self) -> (HaloContext<'_, R>, &BorderSet<R>) {
        let Self {
            geometry,
            grid,
            registry,
            borders,
            phase,
            forces,
            ..
        } = self;
        (
            HaloContext {
                geometry,
                grid,
                registry,
                phase,
                pair_force: forces.pair.as_ref(),
                bond_force: forces.bond.as_ref(),
                bonds: forces.bonds.as_ref(),
            },
            borders,
        )
    }

    fn update_positions(&mut self) -> Result<(), HaloError> {
        profile!("update_positions");
        {
            let (mut ctx, borders) = self.context();
            integrate_cells(&mut ctx, borders.bulk_cells(), false)?;
            for region in borders.regions() {
                if region.is_external() {
                    region.update_shared_pos(&mut ctx)?;
                } else {
                    region.update_pos(&mut ctx)?;
                }
            }
        }
        self.grid.commit_arrivals();
        Ok(())
    }

    /// Sends lost beads to their new owners and inserts the beads received from the neighbors
    fn migrate(&mut self) -> Result<(usize, usize), HaloError> {
        profile!("migrate");
        let lost = self.grid.drain_lost();
        let n_emigrants = lost.len();

        let mut outgoing = vec![Vec::<ParticleSnapshot>::new(); self.neighbor_ranks.len()];
        for bead in &lost {
            let (owner, _) = self.geometry.owner_of_position(&bead.position);
            let dest = self.geometry.rank_of(&owner);
            let neighbor = self.neighbor_ranks.binary_search(&dest).map_err(|_| {
                GeometryInvariantViolation::MigrantNotOwned {
                    bead: bead.id,
                    rank: dest,
                }
            })?;
            outgoing[neighbor].push(bead.snapshot());
        }

        for (&dest, snapshots) in self.neighbor_ranks.iter().zip(outgoing.iter()) {
            self.comm
                .send(dest, MessageTag::Migration, encode_records(snapshots))?;
        }

        let mut n_immigrants = 0;
        for &source in &self.neighbor_ranks {
            let payload = self.comm.recv(source, MessageTag::Migration)?;
            let snapshots: Vec<ParticleSnapshot> =
                decode_records(&payload, source, MessageTag::Migration)?;
            for snapshot in &snapshots {
                let bead = Bead::from_snapshot(snapshot).ok_or(
                    crate::comm::CommError::MalformedPayload {
                        peer: source,
                        tag: MessageTag::Migration,
                        reason: "bead coordinates cannot be represented",
                    },
                )?;
                let (owner, local) = self.geometry.owner_of_position(&bead.position);
                if owner != self.process {
                    return Err(GeometryInvariantViolation::MigrantNotOwned {
                        bead: bead.id,
                        rank: self.rank,
                    }
                    .into());
                }
                let cell = self.grid.flatten(&local);
                self.grid.insert(cell, bead);
                n_immigrants += 1;
            }
        }

        self.grid.rebuild_bead_index();
        if n_emigrants + n_immigrants > 0 {
            debug!(
                "Rank {} migration: {} beads sent, {} received",
                self.rank, n_emigrants, n_immigrants
            );
        }
        Ok((n_emigrants, n_immigrants))
    }

    /// Clears all ghost proxies and refills them with the boundary beads of the neighbor processes
    fn exchange_ghosts(&mut self) -> Result<usize, HaloError> {
        profile!("exchange_ghosts");
        for region in self.borders.external_regions() {
            region.clear_external_cells(&mut self.registry, &self.phase)?;
        }

        let mut outgoing = vec![Vec::<GhostRecord>::new(); self.neighbor_ranks.len()];
        for route in &self.ghost_routes {
            for bead in self.grid.cell(route.cell).beads() {
                outgoing[route.neighbor].push(GhostRecord::new(
                    route.region,
                    route.anchor,
                    route.direction,
                    bead.snapshot(),
                ));
            }
        }

        for (&dest, records) in self.neighbor_ranks.iter().zip(outgoing.iter()) {
            self.comm
                .send(dest, MessageTag::Ghost, encode_records(records))?;
        }

        let mut n_received = 0;
        for i in 0..self.neighbor_ranks.len() {
            let source = self.neighbor_ranks[i];
            let payload = self.comm.recv(source, MessageTag::Ghost)?;
            let records: Vec<GhostRecord> = decode_records(&payload, source, MessageTag::Ghost)?;
            n_received += records.len();
            for record in &records {
                self.inject_ghost(source, record)?;
            }
        }

        debug!(
            "Rank {} ghost exchange: {} ghost beads received",
            self.rank, n_received
        );
        Ok(n_received)
    }

    /// Resolves the slot addressed by a ghost record and appends the bead to its proxy
    fn inject_ghost(&mut self, source: usize, record: &GhostRecord) -> Result<(), HaloError> {
        let invalid = || GeometryInvariantViolation::InvalidGhostAddress {
            region: record.region,
            cell: record.cell,
            direction: record.direction,
        };

        if record.region as usize >= RegionId::COUNT
            || record.direction as usize >= NeighborDirection::COUNT
        {
            return Err(invalid().into());
        }
        let region = self
            .borders
            .region(RegionId::from_direction(NeighborDirection::from_index(
                record.region as usize,
            )));
        let anchor = *region
            .anchor_cells()
            .get(record.cell as usize)
            .ok_or_else(invalid)?;
        let direction = NeighborDirection::from_index(record.direction as usize);
        let proxy = match self.grid.cell(anchor).neighbor(direction) {
            CellRef::Ghost(proxy) => proxy,
            _ => return Err(invalid().into()),
        };

        let mirrored = self.registry.get(proxy);
        if mirrored.owner() != region.id() || mirrored.source_rank() != source {
            return Err(invalid().into());
        }

        let bead = Bead::from_snapshot(&record.snapshot).ok_or(
            crate::comm::CommError::MalformedPayload {
                peer: source,
                tag: MessageTag::Ghost,
                reason: "bead coordinates cannot be represented",
            },
        )?;
        self.registry.push_bead(proxy, bead);
        Ok(())
    }

    fn compute_local_forces(&mut self) -> Result<(), HaloError> {
        profile!("compute_local_forces");
        self.grid.reset_forces();
        let (mut ctx, borders) = self.context();
        bulk_pair_forces(&mut ctx, borders.bulk_cells())?;
        for region in borders.regions() {
            region.update_force(&mut ctx)?;
        }
        Ok(())
    }

    fn compute_shared_forces(&mut self) -> Result<(), HaloError> {
        profile!("compute_shared_forces");
        let (mut ctx, borders) = self.context();
        for region in borders.external_regions() {
            region.calculate_shared_force(&mut ctx)?;
            region.calculate_correction_force(&mut ctx)?;
        }
        Ok(())
    }

    fn complete_shared_forces(&mut self) -> Result<(), HaloError> {
        let (mut ctx, borders) = self.context();
        for region in borders.regions() {
            region.update_shared_force(&mut ctx)?;
        }
        Ok(())
    }

    fn compute_bond_forces(&mut self) -> Result<(), HaloError> {
        profile!("compute_bond_forces");
        let (mut ctx, borders) = self.context();
        local_bond_forces(&mut ctx)?;
        for region in borders.regions() {
            region.calculate_shared_bond_force(&mut ctx)?;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline(always)]
    pub fn process(&self) -> &ProcessCoordinate {
        &self.process
    }

    #[inline(always)]
    pub fn geometry(&self) -> &SimulationGeometry<R> {
        &self.geometry
    }

    #[inline(always)]
    pub fn grid(&self) -> &CellGrid<R> {
        &self.grid
    }

    #[inline(always)]
    pub fn registry(&self) -> &ProxyRegistry<R> {
        &self.registry
    }

    #[inline(always)]
    pub fn borders(&self) -> &BorderSet<R> {
        &self.borders
    }

    #[inline(always)]
    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    /// Returns the ranks of all distinct neighbor processes
    #[inline(always)]
    pub fn neighbor_ranks(&self) -> &[usize] {
        self.neighbor_ranks.as_slice()
    }

    /// Iterates over all beads owned by this process
    pub fn beads(&self) -> impl Iterator<Item = &Bead<R>> {
        self.grid.beads()
    }

    /// Returns the number of beads owned by this process
    pub fn num_beads(&self) -> usize {
        self.grid.num_beads()
    }
}
