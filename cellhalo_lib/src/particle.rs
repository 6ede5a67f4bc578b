//! Beads and their wire representation

use bytemuck::{Pod, Zeroable};
use nalgebra::Vector3;

use crate::{Real, RealConvert};

/// Globally unique identifier of a bead
pub type BeadId = i64;

/// A bead (coarse-grained particle) resident in a cell of a subdomain
#[derive(Clone, PartialEq, Debug)]
pub struct Bead<R: Real> {
    /// Globally unique id, stable over migrations
    pub id: BeadId,
    /// Bead type used to select interaction parameters
    pub kind: i32,
    pub position: Vector3<R>,
    pub velocity: Vector3<R>,
    /// Total force acting on the bead in the current step
    pub force: Vector3<R>,
    /// Staging accumulator for forces from pairs with beads of other processes
    pub shared_force: Vector3<R>,
}

impl<R: Real> Bead<R> {
    /// Creates a bead at rest
    pub fn new(id: BeadId, kind: i32, position: Vector3<R>) -> Self {
        Self::with_velocity(id, kind, position, Vector3::zeros())
    }

    /// Creates a bead with the given velocity
    pub fn with_velocity(
        id: BeadId,
        kind: i32,
        position: Vector3<R>,
        velocity: Vector3<R>,
    ) -> Self {
        Self {
            id,
            kind,
            position,
            velocity,
            force: Vector3::zeros(),
            shared_force: Vector3::zeros(),
        }
    }

    /// Sets the total and the staged force to zero
    #[inline(always)]
    pub fn reset_forces(&mut self) {
        self.force = Vector3::zeros();
        self.shared_force = Vector3::zeros();
    }

    /// Adds the staged force to the total force and clears the staging accumulator
    #[inline(always)]
    pub fn commit_shared_force(&mut self) {
        self.force += self.shared_force;
        self.shared_force = Vector3::zeros();
    }

    /// Returns the wire representation of the bead (forces are not transferred)
    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            id: self.id,
            kind: self.kind,
            _padding: 0,
            position: self.position.to_f64_array(),
            velocity: self.velocity.to_f64_array(),
        }
    }

    /// Reconstructs a bead from its wire representation, returns `None` if a value cannot be represented by `R`
    pub fn from_snapshot(snapshot: &ParticleSnapshot) -> Option<Self> {
        Some(Self::with_velocity(
            snapshot.id,
            snapshot.kind,
            <Vector3<R> as RealConvert<R>>::try_from_f64_array(snapshot.position)?,
            <Vector3<R> as RealConvert<R>>::try_from_f64_array(snapshot.velocity)?,
        ))
    }
}

/// Fixed size wire record of a bead: id, type, position and velocity
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Debug, Default, Pod, Zeroable)]
pub struct ParticleSnapshot {
    pub id: BeadId,
    pub kind: i32,
    _padding: i32,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl ParticleSnapshot {
    /// Size of a single record on the wire
    pub const SIZE: usize = std::mem::size_of::<ParticleSnapshot>();
}
