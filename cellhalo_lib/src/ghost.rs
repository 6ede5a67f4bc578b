//! Ghost cell proxies mirroring boundary cells of neighbor processes
//!
//! All proxies of a process are owned by a single [`ProxyRegistry`]. Border regions and neighbor
//! slots only store [`ProxyIndex`] values. A proxy is identified by its *extended* local coordinate:
//! the coordinate of the remote cell as seen from this subdomain, i.e. `-1` or `L` along the axes
//! where it overhangs into a neighbor process.

use log::trace;

use crate::border::RegionId;
use crate::geometry::{GeometryInvariantViolation, ProcessCoordinate, SimulationGeometry};
use crate::particle::Bead;
use crate::topology::NeighborDirection;
use crate::{MapType, Real, new_map};

/// Stable index of a ghost proxy in the [`ProxyRegistry`] of a process
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProxyIndex(usize);

impl ProxyIndex {
    #[inline(always)]
    pub fn get(self) -> usize {
        self.0
    }
}

/// Local mirror of a cell owned by a neighbor process
#[derive(Clone, Debug)]
pub struct GhostCellProxy<R: Real> {
    key: [i64; 3],
    owner: RegionId,
    source_rank: usize,
    remote_cell: [usize; 3],
    beads: Vec<Bead<R>>,
}

impl<R: Real> GhostCellProxy<R> {
    /// Returns the extended local coordinate of the mirrored cell
    #[inline(always)]
    pub fn key(&self) -> &[i64; 3] {
        &self.key
    }

    /// Returns the region that created this proxy and is responsible for clearing it
    #[inline(always)]
    pub fn owner(&self) -> RegionId {
        self.owner
    }

    /// Returns the rank of the process owning the mirrored cell
    #[inline(always)]
    pub fn source_rank(&self) -> usize {
        self.source_rank
    }

    /// Returns the local coordinate of the mirrored cell on its owning process
    #[inline(always)]
    pub fn remote_cell(&self) -> &[usize; 3] {
        &self.remote_cell
    }

    /// Returns the mirrored beads received in the current step
    #[inline(always)]
    pub fn beads(&self) -> &[Bead<R>] {
        self.beads.as_slice()
    }
}

/// Owner of all ghost proxies of a process
#[derive(Clone, Debug)]
pub struct ProxyRegistry<R: Real> {
    proxies: Vec<GhostCellProxy<R>>,
    by_key: MapType<[i64; 3], ProxyIndex>,
}

impl<R: Real> Default for ProxyRegistry<R> {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            by_key: new_map(),
        }
    }
}

impl<R: Real> ProxyRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of proxies
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Returns the proxy with the given index
    #[inline(always)]
    pub fn get(&self, index: ProxyIndex) -> &GhostCellProxy<R> {
        &self.proxies[index.0]
    }

    /// Returns the index of the proxy for the given extended coordinate, if it exists
    #[inline(always)]
    pub fn find(&self, key: &[i64; 3]) -> Option<ProxyIndex> {
        self.by_key.get(key).copied()
    }

    /// Iterates over all proxies with their indices
    pub fn iter(&self) -> impl Iterator<Item = (ProxyIndex, &GhostCellProxy<R>)> {
        self.proxies
            .iter()
            .enumerate()
            .map(|(i, proxy)| (ProxyIndex(i), proxy))
    }

    /// Returns the proxy for the given extended coordinate, creating it on behalf of `owner` if it does not exist yet
    ///
    /// Fails if the coordinate does not overhang into a neighbor process.
    pub fn get_or_create(
        &mut self,
        geometry: &SimulationGeometry<R>,
        process: &ProcessCoordinate,
        key: [i64; 3],
        owner: RegionId,
    ) -> Result<ProxyIndex, GeometryInvariantViolation> {
        if let Some(index) = self.find(&key) {
            return Ok(index);
        }

        let overhang: NeighborDirection = geometry
            .overhang_direction(&key)
            .ok_or(GeometryInvariantViolation::MissingProxy { key })?;
        let index = ProxyIndex(self.proxies.len());
        let proxy = GhostCellProxy {
            key,
            owner,
            source_rank: geometry.neighbor_rank(process, overhang),
            remote_cell: geometry.remote_local_cell(&key),
            beads: Vec::new(),
        };
        trace!(
            "Created ghost proxy {:?} for extended cell {:?} (owner region {:?}, source rank {})",
            index, key, owner, proxy.source_rank
        );

        self.proxies.push(proxy);
        self.by_key.insert(key, index);
        Ok(index)
    }

    /// Appends a received bead to the proxy
    pub fn push_bead(&mut self, index: ProxyIndex, bead: Bead<R>) {
        self.proxies[index.0].beads.push(bead);
    }

    /// Clears the contents of all proxies created by the given region, returns the number of cleared proxies
    pub fn clear_owned_by(&mut self, region: RegionId) -> usize {
        let mut n_cleared = 0;
        for proxy in self.proxies.iter_mut().filter(|p| p.owner == region) {
            proxy.beads.clear();
            n_cleared += 1;
        }
        n_cleared
    }

    /// Returns the indices of all proxies created by the given region
    pub fn owned_by(&self, region: RegionId) -> Vec<ProxyIndex> {
        self.iter()
            .filter(|(_, p)| p.owner == region)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the total number of mirrored beads
    pub fn num_beads(&self) -> usize {
        self.proxies.iter().map(|p| p.beads.len()).sum()
    }
}
