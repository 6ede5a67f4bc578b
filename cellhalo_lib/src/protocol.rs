//! Phases of a time step and the guard enforcing their order

use std::fmt;

use thiserror::Error as ThisError;

/// Phases of the synchronization protocol, in the order they are run in every time step
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
    /// Integration of velocities and positions, beads leaving their cell are relocated or marked as lost
    PositionUpdate,
    /// Lost beads are sent to and received from their new owners
    Migration,
    /// Ghost proxies are cleared and refilled with the boundary beads of neighbor processes
    GhostExchange,
    /// Non-bonded forces between local beads
    LocalForce,
    /// Non-bonded forces with ghost beads, staged in the shared accumulators
    SharedForce,
    /// Staged forces are committed to the total forces
    ForceCompletion,
    /// Bonded forces, including bonds across process boundaries
    BondedForce,
    /// The step is finished
    Complete,
}

impl Phase {
    /// Returns all phases in protocol order
    pub const fn all() -> &'static [Phase; 8] {
        &[
            Phase::PositionUpdate,
            Phase::Migration,
            Phase::GhostExchange,
            Phase::LocalForce,
            Phase::SharedForce,
            Phase::ForceCompletion,
            Phase::BondedForce,
            Phase::Complete,
        ]
    }

    /// Returns the phase that follows this phase, `Complete` is followed by the next step's `PositionUpdate`
    pub const fn next(self) -> Phase {
        match self {
            Phase::PositionUpdate => Phase::Migration,
            Phase::Migration => Phase::GhostExchange,
            Phase::GhostExchange => Phase::LocalForce,
            Phase::LocalForce => Phase::SharedForce,
            Phase::SharedForce => Phase::ForceCompletion,
            Phase::ForceCompletion => Phase::BondedForce,
            Phase::BondedForce => Phase::Complete,
            Phase::Complete => Phase::PositionUpdate,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error returned when an operation is invoked in the wrong phase
#[derive(Clone, PartialEq, Eq, Debug, ThisError)]
#[error("`{operation}` called in phase {actual}, expected phase {expected}")]
pub struct ProtocolOrderingViolation {
    pub operation: &'static str,
    pub expected: Phase,
    pub actual: Phase,
}

/// Tracks the current phase of a process and rejects out of order transitions and operations
#[derive(Clone, Debug)]
pub struct PhaseTracker {
    current: Phase,
    step: u64,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::Complete,
            step: 0,
        }
    }
}

impl PhaseTracker {
    /// Creates a tracker waiting for the first step
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current phase
    #[inline(always)]
    pub fn current(&self) -> Phase {
        self.current
    }

    /// Returns the number of started steps
    #[inline(always)]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Advances to the given phase, which has to be the successor of the current phase
    pub fn advance(&mut self, phase: Phase) -> Result<(), ProtocolOrderingViolation> {
        let expected = self.current.next();
        if phase != expected {
            return Err(ProtocolOrderingViolation {
                operation: "advance",
                expected,
                actual: phase,
            });
        }
        if phase == Phase::PositionUpdate {
            self.step += 1;
        }
        self.current = phase;
        Ok(())
    }

    /// Checks that the operation is invoked in the expected phase
    #[inline(always)]
    pub fn require(
        &self,
        operation: &'static str,
        expected: Phase,
    ) -> Result<(), ProtocolOrderingViolation> {
        if self.current == expected {
            Ok(())
        } else {
            Err(ProtocolOrderingViolation {
                operation,
                expected,
                actual: self.current,
            })
        }
    }
}
