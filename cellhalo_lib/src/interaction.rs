//! Pair and bond force laws used by the force loops
//!
//! The halo layer only needs to know the cutoff of the pair interaction and how to evaluate the
//! force between two beads. Both laws are traits so that simulation codes can plug in their own
//! potentials; the implementations below are the simplest ones that exercise the layer.

use std::sync::Arc;

use nalgebra::Vector3;

use crate::particle::BeadId;
use crate::{MapType, Real, new_map};

/// A short ranged, central pair force
pub trait PairForce<R: Real>: Send + Sync {
    /// Radius beyond which the force vanishes
    fn cutoff(&self) -> R;

    /// Force acting on bead `i` due to bead `j`, where `r_ij = x_i - x_j` (minimum image)
    ///
    /// Has to return zero for `|r_ij| >= cutoff` and has to be antisymmetric in `r_ij`.
    fn force(&self, r_ij: &Vector3<R>, kind_i: i32, kind_j: i32) -> Vector3<R>;
}

/// A force between two bonded beads
pub trait BondForce<R: Real>: Send + Sync {
    /// Force acting on bead `i` due to its bond partner `j`, where `r_ij = x_i - x_j` (minimum image)
    fn force(&self, r_ij: &Vector3<R>) -> Vector3<R>;
}

/// The conservative part of the DPD interaction: `F = a_ij (1 - r/r_c) r̂`
#[derive(Clone, Debug)]
pub struct DpdConservative<R: Real> {
    cutoff: R,
    default_repulsion: R,
    repulsion: MapType<(i32, i32), R>,
}

impl<R: Real> DpdConservative<R> {
    /// Creates the force with the same repulsion parameter for all bead type pairs
    pub fn new(cutoff: R, repulsion: R) -> Self {
        Self {
            cutoff,
            default_repulsion: repulsion,
            repulsion: new_map(),
        }
    }

    /// Overrides the repulsion parameter for a pair of bead types (symmetric)
    pub fn with_type_pair(mut self, kind_a: i32, kind_b: i32, repulsion: R) -> Self {
        self.repulsion.insert(Self::type_key(kind_a, kind_b), repulsion);
        self
    }

    /// Returns the repulsion parameter for a pair of bead types
    pub fn repulsion(&self, kind_a: i32, kind_b: i32) -> R {
        self.repulsion
            .get(&Self::type_key(kind_a, kind_b))
            .copied()
            .unwrap_or(self.default_repulsion)
    }

    #[inline(always)]
    fn type_key(kind_a: i32, kind_b: i32) -> (i32, i32) {
        (kind_a.min(kind_b), kind_a.max(kind_b))
    }
}

impl<R: Real> PairForce<R> for DpdConservative<R> {
    #[inline(always)]
    fn cutoff(&self) -> R {
        self.cutoff
    }

    #[inline(always)]
    fn force(&self, r_ij: &Vector3<R>, kind_i: i32, kind_j: i32) -> Vector3<R> {
        let r = r_ij.norm();
        if r >= self.cutoff || r <= R::default_epsilon() {
            return Vector3::zeros();
        }
        let magnitude = self.repulsion(kind_i, kind_j) * (R::one() - r / self.cutoff);
        r_ij * (magnitude / r)
    }
}

/// Harmonic spring with rest length: `F = -k (r - r_0) r̂`
#[derive(Clone, Debug)]
pub struct HarmonicBond<R: Real> {
    pub stiffness: R,
    pub rest_length: R,
}

impl<R: Real> HarmonicBond<R> {
    pub fn new(stiffness: R, rest_length: R) -> Self {
        Self {
            stiffness,
            rest_length,
        }
    }
}

impl<R: Real> BondForce<R> for HarmonicBond<R> {
    #[inline(always)]
    fn force(&self, r_ij: &Vector3<R>) -> Vector3<R> {
        let r = r_ij.norm();
        if r <= R::default_epsilon() {
            return Vector3::zeros();
        }
        let magnitude = -self.stiffness * (r - self.rest_length);
        r_ij * (magnitude / r)
    }
}

/// Bond topology, replicated on every process and addressed by bead id
#[derive(Clone, Debug)]
pub struct BondTable {
    partners: MapType<BeadId, Vec<BeadId>>,
    n_bonds: usize,
}

impl Default for BondTable {
    fn default() -> Self {
        Self {
            partners: new_map(),
            n_bonds: 0,
        }
    }
}

impl BondTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from a list of bonded pairs, duplicates and self-bonds are ignored
    pub fn from_pairs(pairs: impl IntoIterator<Item = (BeadId, BeadId)>) -> Self {
        let mut table = Self::new();
        for (a, b) in pairs {
            table.add(a, b);
        }
        table
    }

    /// Adds a bond between two beads, returns `false` if it already exists or connects a bead with itself
    pub fn add(&mut self, a: BeadId, b: BeadId) -> bool {
        if a == b || self.are_bonded(a, b) {
            return false;
        }
        self.partners.entry(a).or_default().push(b);
        self.partners.entry(b).or_default().push(a);
        self.n_bonds += 1;
        true
    }

    /// Returns the bond partners of a bead
    pub fn partners(&self, id: BeadId) -> &[BeadId] {
        self.partners.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn are_bonded(&self, a: BeadId, b: BeadId) -> bool {
        self.partners(a).contains(&b)
    }

    /// Returns the number of bonds
    pub fn len(&self) -> usize {
        self.n_bonds
    }

    pub fn is_empty(&self) -> bool {
        self.n_bonds == 0
    }

    /// Iterates over all bonds once, as pairs with the smaller id first
    pub fn iter(&self) -> impl Iterator<Item = (BeadId, BeadId)> + '_ {
        self.partners.iter().flat_map(|(&a, partners)| {
            partners
                .iter()
                .filter(move |&&b| a < b)
                .map(move |&b| (a, b))
        })
    }
}

/// The force laws and the bond topology shared by all processes
#[derive(Clone)]
pub struct ForceField<R: Real> {
    pub pair: Arc<dyn PairForce<R>>,
    pub bond: Arc<dyn BondForce<R>>,
    pub bonds: Arc<BondTable>,
}

impl<R: Real> ForceField<R> {
    pub fn new(
        pair: impl PairForce<R> + 'static,
        bond: impl BondForce<R> + 'static,
        bonds: BondTable,
    ) -> Self {
        Self {
            pair: Arc::new(pair),
            bond: Arc::new(bond),
            bonds: Arc::new(bonds),
        }
    }

    /// Conservative DPD repulsion (`a = 25`) and harmonic bonds resting at half the cutoff
    pub fn dpd(cutoff: R, bonds: BondTable) -> Self {
        Self::new(
            DpdConservative::new(cutoff, R::from_float(25.0)),
            HarmonicBond::new(R::from_float(128.0), cutoff * R::from_float(0.5)),
            bonds,
        )
    }
}

impl<R: Real> std::fmt::Debug for ForceField<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceField")
            .field("cutoff", &self.pair.cutoff())
            .field("n_bonds", &self.bonds.len())
            .finish()
    }
}
