//!
//! Library for the domain decomposition and halo synchronization of cell-list based mesoscale
//! particle simulations (DPD). Entry points are [`Subdomain`] for driving one process of a
//! decomposed simulation and [`world::run_world`] for running all ranks as threads of one process.
//!
//! Every subdomain is a block of cubic cells. Its boundary is partitioned into 26 border regions
//! ([`border::Face`], [`border::Edge`], [`border::Corner`]) that own the ghost proxies standing in
//! for the cells of neighboring processes. A time step runs through the phases of
//! [`protocol::Phase`] so that every pair interaction inside the cutoff is counted exactly once.
//!

/// Re-export the version of nalgebra used by this crate
pub use nalgebra;

#[macro_use]
mod profiling_macro;
#[cfg(feature = "profiling")]
/// Coarse grained, multi-threaded profiling of the library (requires the `profiling` feature)
pub mod profiling;

/// Border regions of a subdomain and their force and exchange operations
pub mod border;
/// The local cell grid with its neighbor tables
pub mod cell_grid;
/// Message passing between the ranks of a decomposed simulation
pub mod comm;
/// Global box, process grid and cell geometry
pub mod geometry;
/// Ghost cell proxies mirroring remote boundary cells
pub mod ghost;
/// Pair and bond force laws
pub mod interaction;
/// Bead representation and wire snapshots
pub mod particle;
/// Ordering of the phases of a time step
pub mod protocol;
/// Driver of the subdomain owned by one process
pub mod subdomain;
/// Helper types for cartesian coordinate system topology and the 26 neighbor directions
pub mod topology;
mod traits;
/// Running all ranks of a decomposition as threads and reference force evaluation
pub mod world;

use thiserror::Error as ThisError;

pub use border::{BorderBuilder, BorderRegion, BorderSet, Corner, Edge, Face, RegionId, RegionKind};
pub use cell_grid::{Cell, CellGrid, CellRef};
pub use comm::{ChannelCommunicator, CommError, Communicator, MessageTag};
pub use geometry::{
    ConfigurationError, GeometryInvariantViolation, HaloParameters, SimulationGeometry,
};
pub use ghost::{GhostCellProxy, ProxyIndex, ProxyRegistry};
pub use interaction::{BondForce, BondTable, DpdConservative, ForceField, HarmonicBond, PairForce};
pub use particle::{Bead, BeadId, ParticleSnapshot};
pub use protocol::{Phase, PhaseTracker, ProtocolOrderingViolation};
pub use subdomain::{StepStatistics, Subdomain};
pub use topology::{Axis, AxisFlags, DirectedAxis, Direction, NeighborDirection};
pub use traits::{Real, RealConvert, ThreadSafe};

pub(crate) type HashState = fxhash::FxBuildHasher;
pub(crate) type MapType<K, V> = std::collections::HashMap<K, V, HashState>;
pub(crate) fn new_map<K, V>() -> MapType<K, V> {
    MapType::with_hasher(HashState::default())
}

/// Error type returned when setting up or stepping a decomposed simulation fails
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum HaloError {
    /// The decomposition parameters are inconsistent
    #[error("configuration: {0}")]
    Configuration(ConfigurationError),
    /// A geometric invariant of the decomposition was violated at runtime
    #[error("geometry: {0}")]
    Geometry(GeometryInvariantViolation),
    /// An operation was called outside of the phase it belongs to
    #[error("protocol: {0}")]
    Protocol(ProtocolOrderingViolation),
    /// The message transport failed
    #[error("communication: {0}")]
    Comm(CommError),
    /// Any error that is not represented by some other explicit variant
    #[error("unknown error: {0}")]
    Unknown(anyhow::Error),
}

impl From<ConfigurationError> for HaloError {
    /// Allows automatic conversion of a [`ConfigurationError`] to a [`HaloError`]
    fn from(error: ConfigurationError) -> Self {
        HaloError::Configuration(error)
    }
}

impl From<GeometryInvariantViolation> for HaloError {
    /// Allows automatic conversion of a [`GeometryInvariantViolation`] to a [`HaloError`]
    fn from(error: GeometryInvariantViolation) -> Self {
        HaloError::Geometry(error)
    }
}

impl From<ProtocolOrderingViolation> for HaloError {
    /// Allows automatic conversion of a [`ProtocolOrderingViolation`] to a [`HaloError`]
    fn from(error: ProtocolOrderingViolation) -> Self {
        HaloError::Protocol(error)
    }
}

impl From<CommError> for HaloError {
    /// Allows automatic conversion of a [`CommError`] to a [`HaloError`]
    fn from(error: CommError) -> Self {
        HaloError::Comm(error)
    }
}

impl From<anyhow::Error> for HaloError {
    /// Allows automatic conversion of an anyhow::Error to a [`HaloError`]
    fn from(error: anyhow::Error) -> Self {
        HaloError::Unknown(error)
    }
}

/// Initializes the global thread pool used by this library with the given parameters.
///
/// Initialization of the global thread pool happens exactly once.
/// Therefore, if you call `initialize_thread_pool` a second time, it will return an error.
/// An `Ok` result indicates that this is the first initialization of the thread pool.
pub fn initialize_thread_pool(num_threads: usize) -> Result<(), anyhow::Error> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;
    Ok(())
}
