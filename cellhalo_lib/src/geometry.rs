//! Simulation geometry: the process grid, the cell grid of each subdomain and the periodic box
//!
//! The periodic simulation box is partitioned into `Px×Py×Pz` subdomains, one per process. Every
//! subdomain consists of `Lx×Ly×Lz` cubic-ish cells with fixed widths per axis. Cells are the atomic
//! unit of the neighbor search, so the pair interaction cutoff may not exceed the smallest cell width.

use std::time::Duration;

use itertools::Itertools;
use log::{info, trace};
use nalgebra::Vector3;
use thiserror::Error as ThisError;

use crate::topology::{Axis, AxisFlags, NeighborDirection};
use crate::Real;

/// Integer coordinate of a process in the process grid
pub type ProcessCoordinate = [usize; 3];

/// Minimum number of cells of a subdomain along each axis
///
/// With fewer cells a cell could reach the same neighbor cell through two different offsets
/// (periodic wrap-around) and the border regions would overlap.
pub const MIN_CELLS_PER_AXIS: usize = 3;

/// Parameters of the domain decomposition, supplied by the simulation setup
#[derive(Clone, Debug)]
pub struct HaloParameters<R: Real> {
    /// Number of processes along each axis (`Px, Py, Pz`)
    pub process_grid: [usize; 3],
    /// Number of cells of every subdomain along each axis (`Lx, Ly, Lz`)
    pub subdomain_cells: [usize; 3],
    /// Width of a cell along each axis (in simulation units)
    pub cell_width: [R; 3],
    /// Cutoff radius of the non-bonded pair interaction, has to be at most the smallest cell width
    pub cutoff: R,
    /// Time step used by the position update
    pub time_step: R,
    /// Optional timeout for blocking receives, a stalled neighbor results in an error instead of a hang
    pub comm_timeout: Option<Duration>,
}

impl<R: Real> HaloParameters<R> {
    /// Parameters with cubic cells of the given width and a cutoff equal to the cell width
    pub fn new_cubic(process_grid: [usize; 3], subdomain_cells: [usize; 3], cell_width: R) -> Self {
        Self {
            process_grid,
            subdomain_cells,
            cell_width: [cell_width; 3],
            cutoff: cell_width,
            time_step: R::from_float(0.01),
            comm_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Tries to convert the parameters from one [Real] type to another [Real] type, returns None if conversion fails
    pub fn try_convert<T: Real>(&self) -> Option<HaloParameters<T>> {
        Some(HaloParameters {
            process_grid: self.process_grid,
            subdomain_cells: self.subdomain_cells,
            cell_width: [
                self.cell_width[0].try_convert()?,
                self.cell_width[1].try_convert()?,
                self.cell_width[2].try_convert()?,
            ],
            cutoff: self.cutoff.try_convert()?,
            time_step: self.time_step.try_convert()?,
            comm_timeout: self.comm_timeout,
        })
    }

    /// Returns the same parameters with a single process covering the whole box, i.e. the non-decomposed reference setup
    pub fn single_process_equivalent(&self) -> Self {
        let mut params = self.clone();
        for dim in 0..3 {
            params.subdomain_cells[dim] = self.subdomain_cells[dim] * self.process_grid[dim];
        }
        params.process_grid = [1, 1, 1];
        params
    }
}

/// Error type for invalid decomposition parameters, always fatal and reported before the first time step
#[rustfmt::skip]
#[derive(Clone, PartialEq, Debug, ThisError)]
pub enum ConfigurationError {
    /// The process grid has to contain at least one process along each axis
    #[error("invalid process grid {0:?}, every axis needs at least one process")]
    InvalidProcessGrid([usize; 3]),
    /// A subdomain is too thin along some axis
    #[error("subdomains need at least {MIN_CELLS_PER_AXIS} cells along each axis, got {cells} along {axis:?}")]
    TooFewCells { axis: Axis, cells: usize },
    /// A cell width is not strictly positive (or not finite)
    #[error("invalid cell width `{width}` along {axis:?}, has to be larger than zero")]
    InvalidCellWidth { axis: Axis, width: f64 },
    /// The cutoff is not positive or exceeds a cell width
    #[error("invalid cutoff `{cutoff}`, has to be positive and at most the smallest cell width `{min_cell_width}`")]
    InvalidCutoff { cutoff: f64, min_cell_width: f64 },
    /// The time step is not strictly positive
    #[error("invalid time step `{0}`, has to be larger than zero")]
    InvalidTimeStep(f64),
    /// The communicator does not provide one rank per subdomain
    #[error("the process grid needs {expected} processes but the communicator has {actual} ranks")]
    ProcessCountMismatch { expected: usize, actual: usize },
    /// The number of cells or processes cannot be indexed
    #[error("the total number of {0} overflows the index type")]
    IndexOverflow(&'static str),
}

/// Error type for violations of geometric preconditions of the halo layer detected during a step
#[non_exhaustive]
#[derive(Clone, PartialEq, Debug, ThisError)]
pub enum GeometryInvariantViolation {
    /// A bond is longer than the smallest cell width, its partner may not be in an adjacent cell
    #[error("bond {bead} <-> {partner} has length {length}, bonds may not exceed the smallest cell width {max_length}")]
    BondTooLong {
        bead: i64,
        partner: i64,
        length: f64,
        max_length: f64,
    },
    /// A bond partner is neither a local bead nor in a ghost cell adjacent to the bead
    #[error("bond partner {partner} of bead {bead} is neither local nor in an adjacent ghost cell")]
    MissingBondPartner { bead: i64, partner: i64 },
    /// A bead moved by more than one cell during a single step
    #[error("bead {bead} moved from global cell {from:?} to {to:?}, beads may move by at most one cell per step")]
    ExcessiveDisplacement {
        bead: i64,
        from: [usize; 3],
        to: [usize; 3],
    },
    /// A bead left the subdomain through a border without neighbor processes
    #[error("bead {bead} left the subdomain from cell {cell:?} which does not border another process")]
    LeftSubdomain { bead: i64, cell: [usize; 3] },
    /// A migrated bead was received by a process that does not own its position
    #[error("bead {bead} was migrated to rank {rank} which does not own its position")]
    MigrantNotOwned { bead: i64, rank: usize },
    /// A ghost record addresses a region, anchor cell or neighbor slot that does not exist
    #[error("ghost record addresses a non-existent slot (region {region}, cell {cell}, direction {direction})")]
    InvalidGhostAddress {
        region: u32,
        cell: u32,
        direction: u32,
    },
    /// A neighbor slot of a cell was never wired to a local cell or a ghost proxy
    #[error("neighbor slot {direction} of cell {cell:?} is not wired")]
    UnwiredNeighbor { cell: [usize; 3], direction: usize },
    /// A neighbor slot resolves to a different kind of cell than the interaction plan of its region expects
    #[error("neighbor slot {direction} of cell {cell:?} is expected to be a {expected} cell")]
    UnexpectedNeighbor {
        cell: [usize; 3],
        direction: usize,
        expected: &'static str,
    },
    /// A region references a ghost proxy that was not created (regions built out of order)
    #[error("no ghost proxy for extended cell {key:?}, the owning region was not built yet")]
    MissingProxy { key: [i64; 3] },
}

/// Validated geometry of the decomposed simulation box, identical on every process
#[derive(Clone, PartialEq, Debug)]
pub struct SimulationGeometry<R: Real> {
    process_grid: [usize; 3],
    subdomain_cells: [usize; 3],
    cell_width: Vector3<R>,
    box_lengths: Vector3<R>,
    cutoff: R,
    time_step: R,
}

impl<R: Real> SimulationGeometry<R> {
    /// Validates the parameters and constructs the geometry
    pub fn new(parameters: &HaloParameters<R>) -> Result<Self, ConfigurationError> {
        let HaloParameters {
            process_grid,
            subdomain_cells,
            cell_width,
            cutoff,
            time_step,
            ..
        } = parameters.clone();

        if process_grid.iter().any(|&p| p == 0) {
            return Err(ConfigurationError::InvalidProcessGrid(process_grid));
        }
        process_grid
            .iter()
            .try_fold(1usize, |acc, &p| acc.checked_mul(p))
            .ok_or(ConfigurationError::IndexOverflow("processes"))?;

        for axis in Axis::all_possible() {
            let dim = axis.dim();
            if subdomain_cells[dim] < MIN_CELLS_PER_AXIS {
                return Err(ConfigurationError::TooFewCells {
                    axis: *axis,
                    cells: subdomain_cells[dim],
                });
            }
            let width = cell_width[dim];
            if !(width > R::zero()) || !width.is_finite() {
                return Err(ConfigurationError::InvalidCellWidth {
                    axis: *axis,
                    width: width.to_f64().unwrap_or(f64::NAN),
                });
            }
        }

        subdomain_cells
            .iter()
            .zip(process_grid.iter())
            .try_fold(1usize, |acc, (&l, &p)| acc.checked_mul(l)?.checked_mul(p))
            .ok_or(ConfigurationError::IndexOverflow("cells"))?;

        let cell_width = Vector3::new(cell_width[0], cell_width[1], cell_width[2]);
        let min_cell_width = cell_width.min();
        if !(cutoff > R::zero()) || cutoff > min_cell_width {
            return Err(ConfigurationError::InvalidCutoff {
                cutoff: cutoff.to_f64().unwrap_or(f64::NAN),
                min_cell_width: min_cell_width.to_f64().unwrap_or(f64::NAN),
            });
        }

        if !(time_step > R::zero()) {
            return Err(ConfigurationError::InvalidTimeStep(
                time_step.to_f64().unwrap_or(f64::NAN),
            ));
        }

        let box_lengths = Vector3::new(
            cell_width.x * R::from_count(subdomain_cells[0] * process_grid[0]),
            cell_width.y * R::from_count(subdomain_cells[1] * process_grid[1]),
            cell_width.z * R::from_count(subdomain_cells[2] * process_grid[2]),
        );

        let geometry = Self {
            process_grid,
            subdomain_cells,
            cell_width,
            box_lengths,
            cutoff,
            time_step,
        };
        trace!("Simulation geometry: {:?}", geometry);
        Ok(geometry)
    }

    /// Logs a short summary of the decomposition
    pub fn log_info(&self) {
        let [px, py, pz] = self.process_grid;
        let [lx, ly, lz] = self.subdomain_cells;
        let [gx, gy, gz] = self.global_cells();
        info!(
            "Process grid: {}x{}x{} ({} processes), external axes: {:?}",
            px,
            py,
            pz,
            self.num_processes(),
            self.external_axes()
        );
        info!("Cells per subdomain: {lx}x{ly}x{lz}, cells globally: {gx}x{gy}x{gz}");
        info!(
            "Box lengths: [{:.4}, {:.4}, {:.4}], cutoff: {:.4}",
            self.box_lengths.x, self.box_lengths.y, self.box_lengths.z, self.cutoff
        );
    }

    /// Returns the number of processes along each axis
    #[inline(always)]
    pub fn process_grid(&self) -> &[usize; 3] {
        &self.process_grid
    }

    /// Returns the number of cells of each subdomain along each axis
    #[inline(always)]
    pub fn subdomain_cells(&self) -> &[usize; 3] {
        &self.subdomain_cells
    }

    /// Returns the total number of cells of a subdomain
    #[inline(always)]
    pub fn num_subdomain_cells(&self) -> usize {
        self.subdomain_cells.iter().product()
    }

    /// Returns the number of cells of the whole box along each axis
    #[inline(always)]
    pub fn global_cells(&self) -> [usize; 3] {
        [
            self.subdomain_cells[0] * self.process_grid[0],
            self.subdomain_cells[1] * self.process_grid[1],
            self.subdomain_cells[2] * self.process_grid[2],
        ]
    }

    /// Returns the cell widths along each axis
    #[inline(always)]
    pub fn cell_width(&self) -> &Vector3<R> {
        &self.cell_width
    }

    /// Returns the smallest cell width, the upper bound for interaction and bond lengths
    #[inline(always)]
    pub fn min_cell_width(&self) -> R {
        self.cell_width.min()
    }

    /// Returns the edge lengths of the periodic box
    #[inline(always)]
    pub fn box_lengths(&self) -> &Vector3<R> {
        &self.box_lengths
    }

    /// Returns the pair interaction cutoff
    #[inline(always)]
    pub fn cutoff(&self) -> R {
        self.cutoff
    }

    /// Returns the time step
    #[inline(always)]
    pub fn time_step(&self) -> R {
        self.time_step
    }

    /// Returns the total number of processes
    #[inline(always)]
    pub fn num_processes(&self) -> usize {
        self.process_grid.iter().product()
    }

    /// Returns the axes along which the box is split between processes
    ///
    /// Along the remaining axes a subdomain is its own periodic image.
    pub fn external_axes(&self) -> AxisFlags {
        Axis::all_possible()
            .iter()
            .filter(|axis| self.process_grid[axis.dim()] > 1)
            .fold(AxisFlags::empty(), |flags, axis| flags | axis.flag())
    }

    /// Flattens a process coordinate to its rank
    #[inline(always)]
    pub fn rank_of(&self, coord: &ProcessCoordinate) -> usize {
        let np = &self.process_grid;
        coord[0] * np[1] * np[2] + coord[1] * np[2] + coord[2]
    }

    /// Converts a rank back to the process coordinate, does not check if the rank exists
    #[inline(always)]
    pub fn coord_of(&self, rank: usize) -> ProcessCoordinate {
        let np = &self.process_grid;
        let i = rank / (np[1] * np[2]);
        let j = (rank - i * np[1] * np[2]) / np[2];
        let k = rank - i * np[1] * np[2] - j * np[2];
        [i, j, k]
    }

    /// Returns the rank of the neighbor process in the given direction (periodic)
    pub fn neighbor_rank(&self, coord: &ProcessCoordinate, direction: NeighborDirection) -> usize {
        let offset = direction.offset();
        let mut neighbor = [0; 3];
        for dim in 0..3 {
            neighbor[dim] = wrap_index(
                coord[dim] as i64 + offset[dim] as i64,
                self.process_grid[dim],
            );
        }
        self.rank_of(&neighbor)
    }

    /// Returns the ranks of all distinct neighbor processes (excluding the process itself), sorted ascending
    pub fn neighbor_ranks(&self, coord: &ProcessCoordinate) -> Vec<usize> {
        let own_rank = self.rank_of(coord);
        NeighborDirection::all()
            .iter()
            .filter(|d| d.support().difference(self.external_axes()).is_empty())
            .map(|d| self.neighbor_rank(coord, *d))
            .filter(|&r| r != own_rank)
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Returns the lower corner of the subdomain of the given process
    pub fn subdomain_origin(&self, coord: &ProcessCoordinate) -> Vector3<R> {
        Vector3::new(
            self.cell_width.x * R::from_count(coord[0] * self.subdomain_cells[0]),
            self.cell_width.y * R::from_count(coord[1] * self.subdomain_cells[1]),
            self.cell_width.z * R::from_count(coord[2] * self.subdomain_cells[2]),
        )
    }

    /// Maps a position into the primary periodic image `[0, L)` of the box
    pub fn wrap_position(&self, position: &Vector3<R>) -> Vector3<R> {
        let mut wrapped = *position;
        for dim in 0..3 {
            let length = self.box_lengths[dim];
            let mut x = wrapped[dim] % length;
            if x < R::zero() {
                x += length;
            }
            // Rounding of negative values close to zero may land exactly on the upper bound
            if x >= length {
                x = R::zero();
            }
            wrapped[dim] = x;
        }
        wrapped
    }

    /// Returns the minimum image of a displacement vector in the periodic box
    pub fn minimum_image(&self, delta: &Vector3<R>) -> Vector3<R> {
        let mut image = *delta;
        let half = R::from_float(0.5);
        for dim in 0..3 {
            let length = self.box_lengths[dim];
            let x = image[dim];
            image[dim] = x - length * (x / length + half).floor();
        }
        image
    }

    /// Returns the global cell containing the given position (the position is wrapped into the box first)
    pub fn global_cell_of(&self, position: &Vector3<R>) -> [usize; 3] {
        let wrapped = self.wrap_position(position);
        let global_cells = self.global_cells();
        let mut cell = [0; 3];
        for dim in 0..3 {
            let index = (wrapped[dim] / self.cell_width[dim])
                .floor()
                .to_usize()
                .unwrap_or(0);
            cell[dim] = index.min(global_cells[dim] - 1);
        }
        cell
    }

    /// Returns the process owning the given global cell and the cell's local coordinate on that process
    pub fn owner_of_global_cell(&self, global_cell: &[usize; 3]) -> (ProcessCoordinate, [usize; 3]) {
        let mut coord = [0; 3];
        let mut local = [0; 3];
        for dim in 0..3 {
            coord[dim] = global_cell[dim] / self.subdomain_cells[dim];
            local[dim] = global_cell[dim] % self.subdomain_cells[dim];
        }
        (coord, local)
    }

    /// Returns the global cell of a local cell of the given process
    pub fn global_cell_of_local(&self, process: &ProcessCoordinate, ijk: &[usize; 3]) -> [usize; 3] {
        [
            process[0] * self.subdomain_cells[0] + ijk[0],
            process[1] * self.subdomain_cells[1] + ijk[1],
            process[2] * self.subdomain_cells[2] + ijk[2],
        ]
    }

    /// Returns whether two global cells are identical or adjacent (including diagonals) in the periodic box
    pub fn are_adjacent_global_cells(&self, a: &[usize; 3], b: &[usize; 3]) -> bool {
        let global_cells = self.global_cells();
        (0..3).all(|dim| {
            let n = global_cells[dim];
            let diff = (b[dim] + n - a[dim]) % n;
            diff <= 1 || diff == n - 1
        })
    }

    /// Returns the process owning the given position and the local coordinate of the enclosing cell
    pub fn owner_of_position(&self, position: &Vector3<R>) -> (ProcessCoordinate, [usize; 3]) {
        self.owner_of_global_cell(&self.global_cell_of(position))
    }

    /// Flattens a local cell coordinate of a subdomain
    #[inline(always)]
    pub fn flatten_local_cell(&self, ijk: &[usize; 3]) -> usize {
        let nc = &self.subdomain_cells;
        ijk[0] * nc[1] * nc[2] + ijk[1] * nc[2] + ijk[2]
    }

    /// Converts a flat local cell index back to the local cell coordinate
    #[inline(always)]
    pub fn unflatten_local_cell(&self, index: usize) -> [usize; 3] {
        let nc = &self.subdomain_cells;
        let i = index / (nc[1] * nc[2]);
        let j = (index - i * nc[1] * nc[2]) / nc[2];
        let k = index - i * nc[1] * nc[2] - j * nc[2];
        [i, j, k]
    }

    /// Resolves a signed, possibly out of range local coordinate to a local cell
    ///
    /// Coordinates outside of the subdomain along axes without neighbor processes wrap around
    /// periodically. Returns `Err` with the wrapped coordinate if the cell lies outside of the
    /// subdomain along an external axis, i.e. it belongs to a neighbor process.
    pub fn resolve_local(&self, ijk: [i64; 3]) -> Result<[usize; 3], [i64; 3]> {
        let external = self.external_axes();
        let mut wrapped = ijk;
        let mut is_local = true;
        for axis in Axis::all_possible() {
            let dim = axis.dim();
            let n = self.subdomain_cells[dim] as i64;
            if external.contains(axis.flag()) {
                if wrapped[dim] < 0 || wrapped[dim] >= n {
                    is_local = false;
                }
            } else {
                wrapped[dim] = wrapped[dim].rem_euclid(n);
            }
        }
        if is_local {
            Ok([wrapped[0] as usize, wrapped[1] as usize, wrapped[2] as usize])
        } else {
            Err(wrapped)
        }
    }

    /// Returns the direction of the neighbor process owning a cell at the given (wrapped) extended coordinate
    ///
    /// The direction's components are the sign of the coordinate's overhang along each axis.
    pub fn overhang_direction(&self, ijk: &[i64; 3]) -> Option<NeighborDirection> {
        let mut offset = [0i8; 3];
        for dim in 0..3 {
            let n = self.subdomain_cells[dim] as i64;
            offset[dim] = if ijk[dim] < 0 {
                -1
            } else if ijk[dim] >= n {
                1
            } else {
                0
            };
        }
        NeighborDirection::new(offset)
    }

    /// Maps an extended coordinate that overhangs into a neighbor process to the local coordinate of the cell on that process
    pub fn remote_local_cell(&self, ijk: &[i64; 3]) -> [usize; 3] {
        let mut local = [0; 3];
        for dim in 0..3 {
            local[dim] = ijk[dim].rem_euclid(self.subdomain_cells[dim] as i64) as usize;
        }
        local
    }
}

/// Wraps a signed index periodically into `0..n`
#[inline(always)]
pub(crate) fn wrap_index(index: i64, n: usize) -> usize {
    index.rem_euclid(n as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(process_grid: [usize; 3]) -> SimulationGeometry<f64> {
        SimulationGeometry::new(&HaloParameters::new_cubic(process_grid, [4, 3, 5], 1.0)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let mut params = HaloParameters::<f64>::new_cubic([1, 0, 1], [4, 4, 4], 1.0);
        assert_eq!(
            SimulationGeometry::new(&params),
            Err(ConfigurationError::InvalidProcessGrid([1, 0, 1]))
        );

        params.process_grid = [1, 1, 1];
        params.subdomain_cells = [4, 2, 4];
        assert_eq!(
            SimulationGeometry::new(&params),
            Err(ConfigurationError::TooFewCells {
                axis: Axis::Y,
                cells: 2
            })
        );

        params.subdomain_cells = [4, 4, 4];
        params.cutoff = 1.5;
        assert!(matches!(
            SimulationGeometry::new(&params),
            Err(ConfigurationError::InvalidCutoff { .. })
        ));

        params.cutoff = 1.0;
        params.cell_width[2] = -1.0;
        assert!(matches!(
            SimulationGeometry::new(&params),
            Err(ConfigurationError::InvalidCellWidth { axis: Axis::Z, .. })
        ));

        params.cell_width[2] = 1.0;
        params.time_step = 0.0;
        assert_eq!(
            SimulationGeometry::new(&params),
            Err(ConfigurationError::InvalidTimeStep(0.0))
        );
    }

    #[test]
    fn test_rank_coord_roundtrip() {
        let geometry = geometry([2, 3, 4]);
        for rank in 0..geometry.num_processes() {
            assert_eq!(geometry.rank_of(&geometry.coord_of(rank)), rank);
        }
    }

    #[test]
    fn test_neighbor_ranks() {
        assert!(geometry([1, 1, 1]).neighbor_ranks(&[0, 0, 0]).is_empty());
        assert_eq!(geometry([2, 1, 1]).neighbor_ranks(&[0, 0, 0]), vec![1]);
        assert_eq!(geometry([2, 2, 2]).neighbor_ranks(&[0, 0, 0]).len(), 7);
        assert_eq!(geometry([3, 3, 3]).neighbor_ranks(&[1, 1, 1]).len(), 26);
    }

    #[test]
    fn test_external_axes() {
        assert_eq!(geometry([1, 1, 1]).external_axes(), AxisFlags::empty());
        assert_eq!(geometry([1, 2, 1]).external_axes(), AxisFlags::Y);
        assert_eq!(geometry([2, 2, 2]).external_axes(), AxisFlags::all());
    }

    #[test]
    fn test_wrap_and_minimum_image() {
        let geometry = geometry([2, 1, 1]);
        let lengths = *geometry.box_lengths();
        assert_eq!(lengths, Vector3::new(8.0, 3.0, 5.0));

        let wrapped = geometry.wrap_position(&Vector3::new(-0.5, 3.25, 10.0));
        assert!((wrapped - Vector3::new(7.5, 0.25, 0.0)).norm() < 1e-12);

        let image = geometry.minimum_image(&Vector3::new(7.5, -2.75, 0.5));
        assert!((image - Vector3::new(-0.5, 0.25, 0.5)).norm() < 1e-12);

        // Displacements spanning several box lengths fold back into half a box on each axis
        let image = geometry.minimum_image(&Vector3::new(-20.5, 7.0, 12.25));
        assert!((image - Vector3::new(3.5, 1.0, 2.25)).norm() < 1e-12);
        for dim in 0..3 {
            assert!(image[dim].abs() <= 0.5 * lengths[dim]);
        }
    }

    #[test]
    fn test_owner_of_position() {
        let geometry = geometry([2, 1, 1]);
        let (coord, local) = geometry.owner_of_position(&Vector3::new(5.5, 1.2, 4.9));
        assert_eq!(coord, [1, 0, 0]);
        assert_eq!(local, [1, 1, 4]);
    }

    #[test]
    fn test_resolve_local() {
        let geometry = geometry([2, 1, 1]);
        // y and z wrap, x belongs to the neighbor
        assert_eq!(geometry.resolve_local([0, -1, 5]), Ok([0, 2, 0]));
        assert_eq!(geometry.resolve_local([4, -1, 0]), Err([4, 2, 0]));
        assert_eq!(
            geometry.overhang_direction(&[4, 2, 0]),
            NeighborDirection::new([1, 0, 0])
        );
        assert_eq!(geometry.remote_local_cell(&[4, 2, 0]), [0, 2, 0]);
        assert_eq!(geometry.remote_local_cell(&[-1, 2, 0]), [3, 2, 0]);
    }
}
