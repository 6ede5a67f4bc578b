//! The array of cells of a single subdomain and their neighbor tables
//!
//! Every cell knows all of its 26 neighbors, either as a local cell of the same subdomain or as a
//! ghost proxy mirroring a cell of a neighbor process. Along axes without neighbor processes the
//! subdomain is periodic with itself, so these neighbors are wired directly at construction. The
//! remaining slots are wired by the border regions once their ghost proxies exist.

use log::trace;
use nalgebra::Vector3;

use crate::geometry::{GeometryInvariantViolation, ProcessCoordinate, SimulationGeometry};
use crate::ghost::ProxyIndex;
use crate::particle::{Bead, BeadId};
use crate::topology::NeighborDirection;
use crate::{MapType, Real, new_map};

/// Reference from a neighbor slot to the cell it resolves to
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CellRef {
    /// Index of a cell of the local subdomain
    Local(usize),
    /// A ghost proxy in the registry of this process
    Ghost(ProxyIndex),
    /// The slot has not been wired yet
    Unresolved,
}

impl CellRef {
    /// Returns the local cell index if the slot resolves to a local cell
    #[inline(always)]
    pub fn local(&self) -> Option<usize> {
        match self {
            CellRef::Local(index) => Some(*index),
            _ => None,
        }
    }

    /// Returns the proxy index if the slot resolves to a ghost proxy
    #[inline(always)]
    pub fn ghost(&self) -> Option<ProxyIndex> {
        match self {
            CellRef::Ghost(proxy) => Some(*proxy),
            _ => None,
        }
    }
}

/// A cell of the subdomain with its resident beads and neighbor tables
#[derive(Clone, Debug)]
pub struct Cell<R: Real> {
    ijk: [usize; 3],
    beads: Vec<Bead<R>>,
    /// Beads that moved into this cell during the current position update
    arrivals: Vec<Bead<R>>,
    /// Beads that left the subdomain from this cell and wait for migration
    lost: Vec<Bead<R>>,
    neighbors: [CellRef; NeighborDirection::COUNT],
    force_neighbors: [CellRef; NeighborDirection::CANONICAL_COUNT],
}

impl<R: Real> Cell<R> {
    fn new(ijk: [usize; 3]) -> Self {
        Self {
            ijk,
            beads: Vec::new(),
            arrivals: Vec::new(),
            lost: Vec::new(),
            neighbors: [CellRef::Unresolved; NeighborDirection::COUNT],
            force_neighbors: [CellRef::Unresolved; NeighborDirection::CANONICAL_COUNT],
        }
    }

    /// Returns the local coordinate of the cell
    #[inline(always)]
    pub fn ijk(&self) -> &[usize; 3] {
        &self.ijk
    }

    /// Returns the beads resident in this cell
    #[inline(always)]
    pub fn beads(&self) -> &[Bead<R>] {
        self.beads.as_slice()
    }

    /// Returns mutable access to the beads resident in this cell
    #[inline(always)]
    pub fn beads_mut(&mut self) -> &mut Vec<Bead<R>> {
        &mut self.beads
    }

    /// Returns the beads that left the subdomain from this cell in the current step
    #[inline(always)]
    pub fn lost(&self) -> &[Bead<R>] {
        self.lost.as_slice()
    }

    /// Returns the neighbor in the given direction
    #[inline(always)]
    pub fn neighbor(&self, direction: NeighborDirection) -> CellRef {
        self.neighbors[direction.index()]
    }

    /// Returns all 26 neighbor slots, ordered by direction index
    #[inline(always)]
    pub fn neighbors(&self) -> &[CellRef; NeighborDirection::COUNT] {
        &self.neighbors
    }

    /// Returns the 13 neighbors of the canonical force loop, ordered like [`NeighborDirection::canonical`]
    #[inline(always)]
    pub fn force_neighbors(&self) -> &[CellRef; NeighborDirection::CANONICAL_COUNT] {
        &self.force_neighbors
    }

    /// Copies the canonical subset of the neighbor table into the force loop table
    fn refresh_force_loop(&mut self) {
        for (slot, direction) in self
            .force_neighbors
            .iter_mut()
            .zip(NeighborDirection::canonical())
        {
            *slot = self.neighbors[direction.index()];
        }
    }
}

/// All cells of a subdomain
#[derive(Clone, Debug)]
pub struct CellGrid<R: Real> {
    process: ProcessCoordinate,
    n_cells: [usize; 3],
    cells: Vec<Cell<R>>,
    /// Location of every resident bead as (cell index, position in cell), rebuilt after migration
    bead_index: MapType<BeadId, (usize, usize)>,
}

impl<R: Real> CellGrid<R> {
    /// Creates the cells of the subdomain of the given process and wires all neighbors that are local
    pub fn new(geometry: &SimulationGeometry<R>, process: ProcessCoordinate) -> Self {
        let n_cells = *geometry.subdomain_cells();
        let mut cells: Vec<_> = (0..geometry.num_subdomain_cells())
            .map(|index| Cell::new(geometry.unflatten_local_cell(index)))
            .collect();

        let mut n_unresolved = 0;
        for cell in cells.iter_mut() {
            let ijk = cell.ijk;
            let signed = [ijk[0] as i64, ijk[1] as i64, ijk[2] as i64];
            for direction in NeighborDirection::all() {
                cell.neighbors[direction.index()] =
                    match geometry.resolve_local(direction.apply(signed)) {
                        Ok(neighbor) => CellRef::Local(geometry.flatten_local_cell(&neighbor)),
                        Err(_) => {
                            n_unresolved += 1;
                            CellRef::Unresolved
                        }
                    };
            }
            cell.refresh_force_loop();
        }

        trace!(
            "Created {} cells for process {:?}, {} neighbor slots left for ghost wiring",
            cells.len(),
            process,
            n_unresolved
        );

        Self {
            process,
            n_cells,
            cells,
            bead_index: new_map(),
        }
    }

    /// Returns the coordinate of the process owning this subdomain
    #[inline(always)]
    pub fn process(&self) -> &ProcessCoordinate {
        &self.process
    }

    /// Returns the number of cells along each axis
    #[inline(always)]
    pub fn n_cells(&self) -> &[usize; 3] {
        &self.n_cells
    }

    /// Returns the number of cells
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the grid has no cells
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the flat index of the cell with the given local coordinate
    #[inline(always)]
    pub fn flatten(&self, ijk: &[usize; 3]) -> usize {
        let nc = &self.n_cells;
        ijk[0] * nc[1] * nc[2] + ijk[1] * nc[2] + ijk[2]
    }

    #[inline(always)]
    pub fn cell(&self, index: usize) -> &Cell<R> {
        &self.cells[index]
    }

    #[inline(always)]
    pub fn cell_mut(&mut self, index: usize) -> &mut Cell<R> {
        &mut self.cells[index]
    }

    /// Returns all cells in flat index order
    #[inline(always)]
    pub fn cells(&self) -> &[Cell<R>] {
        self.cells.as_slice()
    }

    /// Returns mutable references to two distinct cells at the same time
    pub fn get_pair_mut(&mut self, a: usize, b: usize) -> (&mut Cell<R>, &mut Cell<R>) {
        assert_ne!(a, b, "cannot borrow the same cell twice");
        if a < b {
            let (lower, upper) = self.cells.split_at_mut(b);
            (&mut lower[a], &mut upper[0])
        } else {
            let (lower, upper) = self.cells.split_at_mut(a);
            (&mut upper[0], &mut lower[b])
        }
    }

    /// Points the neighbor slot of a cell to a ghost proxy
    pub fn wire_ghost(&mut self, cell: usize, direction: NeighborDirection, proxy: ProxyIndex) {
        self.cells[cell].neighbors[direction.index()] = CellRef::Ghost(proxy);
    }

    /// Recomputes the 13-slot force loop table of the given cells from their neighbor tables
    pub fn refresh_force_loops(&mut self, cells: &[usize]) {
        for &index in cells {
            self.cells[index].refresh_force_loop();
        }
    }

    /// Checks that every neighbor slot of every cell resolves to a local cell or a proxy
    pub fn validate_wiring(&self) -> Result<(), GeometryInvariantViolation> {
        for cell in &self.cells {
            if let Some(direction) = cell
                .neighbors
                .iter()
                .position(|slot| *slot == CellRef::Unresolved)
            {
                return Err(GeometryInvariantViolation::UnwiredNeighbor {
                    cell: cell.ijk,
                    direction,
                });
            }
        }
        Ok(())
    }

    /// Inserts a bead into the cell with the given flat index
    pub fn insert(&mut self, cell: usize, bead: Bead<R>) {
        self.cells[cell].beads.push(bead);
    }

    /// Queues a bead for insertion into the given cell at the end of the position update
    pub fn push_arrival(&mut self, cell: usize, bead: Bead<R>) {
        self.cells[cell].arrivals.push(bead);
    }

    /// Records a bead that left the subdomain from the given cell
    pub fn push_lost(&mut self, cell: usize, bead: Bead<R>) {
        self.cells[cell].lost.push(bead);
    }

    /// Moves all queued arrivals into their cells
    pub fn commit_arrivals(&mut self) {
        for cell in self.cells.iter_mut() {
            let Cell {
                beads, arrivals, ..
            } = cell;
            beads.append(arrivals);
        }
    }

    /// Removes and returns all beads that left the subdomain in the current step
    pub fn drain_lost(&mut self) -> Vec<Bead<R>> {
        let mut lost = Vec::new();
        for cell in self.cells.iter_mut() {
            lost.append(&mut cell.lost);
        }
        lost
    }

    /// Resets total and staged forces of all beads
    pub fn reset_forces(&mut self) {
        for bead in self.cells.iter_mut().flat_map(|c| c.beads.iter_mut()) {
            bead.reset_forces();
        }
    }

    /// Rebuilds the index from bead id to its location
    pub fn rebuild_bead_index(&mut self) {
        self.bead_index.clear();
        for (cell_index, cell) in self.cells.iter().enumerate() {
            for (slot, bead) in cell.beads.iter().enumerate() {
                self.bead_index.insert(bead.id, (cell_index, slot));
            }
        }
    }

    /// Returns the location (cell index, position in cell) of a local bead, valid after the last index rebuild
    #[inline(always)]
    pub fn locate(&self, id: BeadId) -> Option<(usize, usize)> {
        self.bead_index.get(&id).copied()
    }

    /// Returns the position of a local bead by id
    pub fn position_of(&self, id: BeadId) -> Option<Vector3<R>> {
        let (cell, slot) = self.locate(id)?;
        self.cells[cell].beads.get(slot).map(|b| b.position)
    }

    /// Returns the number of resident beads
    pub fn num_beads(&self) -> usize {
        self.cells.iter().map(|c| c.beads.len()).sum()
    }

    /// Iterates over all resident beads
    pub fn beads(&self) -> impl Iterator<Item = &Bead<R>> {
        self.cells.iter().flat_map(|c| c.beads.iter())
    }
}
