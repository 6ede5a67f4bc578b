//! Running all ranks of a decomposed simulation as threads of one process
//!
//! Also provides deterministic random bead configurations and a brute-force force evaluation used
//! to check that the decomposed force loops count every interaction exactly once.

use std::thread;

use anyhow::{Context, anyhow};
use log::{debug, info};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::comm::{ChannelCommunicator, CommError, Communicator};
use crate::geometry::{HaloParameters, SimulationGeometry};
use crate::interaction::{BondTable, ForceField};
use crate::particle::{Bead, BeadId};
use crate::profile;
use crate::subdomain::{StepStatistics, Subdomain};
use crate::{HaloError, MapType, Real, new_map};

/// Beads gathered from all ranks after a run
#[derive(Clone, Debug)]
pub struct WorldResult<R: Real> {
    /// All beads sorted by id
    pub beads: Vec<Bead<R>>,
    /// Statistics of the last step of every rank, indexed by rank
    pub statistics: Vec<StepStatistics>,
}

impl<R: Real> WorldResult<R> {
    /// Returns the total number of ghost beads received in the last step over all ranks
    pub fn total_ghost_beads(&self) -> usize {
        self.statistics.iter().map(|s| s.n_ghost_beads).sum()
    }
}

/// Runs the given number of steps on all ranks of the process grid and gathers the resulting beads
pub fn run_world<R: Real>(
    parameters: &HaloParameters<R>,
    forces: &ForceField<R>,
    beads: &[Bead<R>],
    steps: usize,
) -> Result<WorldResult<R>, anyhow::Error> {
    run_world_with_progress(parameters, forces, beads, steps, &|_| {})
}

/// Same as [`run_world`], calls `progress` with the number of finished steps of rank 0
pub fn run_world_with_progress<R: Real>(
    parameters: &HaloParameters<R>,
    forces: &ForceField<R>,
    beads: &[Bead<R>],
    steps: usize,
    progress: &(dyn Fn(usize) + Sync),
) -> Result<WorldResult<R>, anyhow::Error> {
    profile!("run_world");
    let geometry = SimulationGeometry::new(parameters).context("invalid decomposition parameters")?;
    let communicators =
        ChannelCommunicator::create_world(geometry.num_processes(), parameters.comm_timeout);

    let per_rank = thread::scope(|scope| {
        let handles = communicators
            .into_iter()
            .map(|comm| {
                let geometry = &geometry;
                thread::Builder::new()
                    .name(format!("rank-{}", comm.rank()))
                    .spawn_scoped(scope, move || -> Result<_, anyhow::Error> {
                        let rank = comm.rank();
                        let mut subdomain = Subdomain::new(geometry, forces.clone(), comm)
                            .with_context(|| format!("failed to set up rank {}", rank))?;
                        subdomain.insert_owned_beads(beads);

                        let mut stats = StepStatistics::default();
                        for step in 0..steps {
                            stats = subdomain
                                .step()
                                .with_context(|| format!("rank {} failed in step {}", rank, step + 1))?;
                            if rank == 0 {
                                progress(step + 1);
                            }
                        }
                        Ok((subdomain.beads().cloned().collect::<Vec<_>>(), stats))
                    })
                    .context("failed to spawn a rank thread")
            })
            .collect::<Result<Vec<_>, anyhow::Error>>()?;

        // Join all ranks before reporting so that a failing rank is not hidden by its neighbors
        let joined: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .map_err(|_| anyhow!("thread of rank {} panicked", rank))?
            })
            .collect();
        collect_rank_results(joined)
    })?;

    let mut beads = Vec::new();
    let mut statistics = Vec::with_capacity(per_rank.len());
    for (rank_beads, stats) in per_rank {
        beads.extend(rank_beads);
        statistics.push(stats);
    }
    beads.sort_unstable_by_key(|b| b.id);

    info!(
        "Finished {} steps on {} ranks with {} beads",
        steps,
        statistics.len(),
        beads.len()
    );
    Ok(WorldResult { beads, statistics })
}

/// Returns the results of all ranks or the error that caused the run to fail
///
/// Ranks waiting on a failed neighbor fail with a communication error themselves, so the first error
/// that is not caused by the transport is reported. The remaining errors are logged.
fn collect_rank_results<T>(
    results: Vec<Result<T, anyhow::Error>>,
) -> Result<Vec<T>, anyhow::Error> {
    if results.iter().all(|r| r.is_ok()) {
        return results.into_iter().collect();
    }

    let mut errors: Vec<_> = results.into_iter().filter_map(|r| r.err()).collect();
    let root = errors.iter().position(|e| !is_comm_error(e)).unwrap_or(0);
    let error = errors.swap_remove(root);
    for other in &errors {
        debug!("Secondary failure: {:#}", other);
    }
    Err(error)
}

fn is_comm_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<CommError>().is_some()
            || matches!(cause.downcast_ref::<HaloError>(), Some(HaloError::Comm(_)))
    })
}

/// Generates beads at uniformly random positions in the box with small random velocities
pub fn random_beads<R: Real>(
    geometry: &SimulationGeometry<R>,
    n_beads: usize,
    max_speed: R,
    seed: u64,
) -> Vec<Bead<R>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let lengths = geometry.box_lengths().map(|l| l.to_f64_unchecked());
    let max_speed = max_speed.to_f64_unchecked();

    (0..n_beads)
        .map(|i| {
            let position = Vector3::from_fn(|d, _| rng.random_range(0.0..lengths[d]));
            let velocity = Vector3::from_fn(|_, _| rng.random_range(-max_speed..=max_speed));
            Bead::with_velocity(
                i as BeadId,
                rng.random_range(0..2),
                position.map(R::from_float),
                velocity.map(R::from_float),
            )
        })
        .collect()
}

/// Generates linear chains of bonded beads as random walks with the given bond length
///
/// Bead ids continue after `first_id`, consecutive beads of a chain are bonded.
pub fn random_chains<R: Real>(
    geometry: &SimulationGeometry<R>,
    n_chains: usize,
    chain_length: usize,
    bond_length: R,
    first_id: BeadId,
    seed: u64,
) -> (Vec<Bead<R>>, BondTable) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let lengths = geometry.box_lengths().map(|l| l.to_f64_unchecked());
    let bond_length = bond_length.to_f64_unchecked();

    let mut beads = Vec::with_capacity(n_chains * chain_length);
    let mut bonds = BondTable::new();
    let mut id = first_id;
    for _ in 0..n_chains {
        let mut position = Vector3::<f64>::from_fn(|d, _| rng.random_range(0.0..lengths[d]));
        for k in 0..chain_length {
            if k > 0 {
                let step = loop {
                    let v = Vector3::<f64>::from_fn(|_, _| rng.random_range(-1.0..1.0));
                    let norm = v.norm();
                    if norm > 1e-3 && norm <= 1.0 {
                        break v / norm;
                    }
                };
                position += step * bond_length;
                bonds.add(id - 1, id);
            }
            let wrapped = geometry.wrap_position(&position.map(R::from_float));
            beads.push(Bead::new(id, 2, wrapped));
            id += 1;
        }
    }
    (beads, bonds)
}

/// Evaluates the force on every bead by looping over all pairs (minimum image) and all bonds
///
/// Returns the forces in the order of the given beads.
pub fn reference_forces<R: Real>(
    geometry: &SimulationGeometry<R>,
    forces: &ForceField<R>,
    beads: &[Bead<R>],
) -> Vec<Vector3<R>> {
    profile!("reference_forces");
    let mut index_of: MapType<BeadId, usize> = new_map();
    index_of.extend(beads.iter().enumerate().map(|(i, b)| (b.id, i)));

    beads
        .par_iter()
        .map(|bead_i| {
            let mut f = Vector3::zeros();
            for bead_j in beads {
                if bead_j.id == bead_i.id {
                    continue;
                }
                let r_ij = geometry.minimum_image(&(bead_i.position - bead_j.position));
                f += forces.pair.force(&r_ij, bead_i.kind, bead_j.kind);
            }
            for partner in forces.bonds.partners(bead_i.id) {
                if let Some(&j) = index_of.get(partner) {
                    let r_ij = geometry.minimum_image(&(bead_i.position - beads[j].position));
                    f += forces.bond.force(&r_ij);
                }
            }
            f
        })
        .collect()
}

/// Largest deviation between two force sets
#[derive(Copy, Clone, Debug, Default)]
pub struct ForceDeviation {
    /// Maximum of `|f_a - f_b|` over all beads
    pub max_abs: f64,
    /// Maximum of `|f_a - f_b| / max(|f_b|, 1)` over all beads
    pub max_rel: f64,
    /// Id of the bead with the largest absolute deviation
    pub worst_bead: Option<BeadId>,
}

/// Compares the forces of the beads with the given reference forces (same order)
pub fn force_deviation<R: Real>(beads: &[Bead<R>], reference: &[Vector3<R>]) -> ForceDeviation {
    let mut deviation = ForceDeviation::default();
    for (bead, f_ref) in beads.iter().zip(reference.iter()) {
        let abs = (bead.force - f_ref).norm().to_f64_unchecked();
        let rel = abs / f_ref.norm().to_f64_unchecked().max(1.0);
        if abs > deviation.max_abs || deviation.worst_bead.is_none() {
            deviation.max_abs = abs.max(deviation.max_abs);
            deviation.worst_bead = Some(bead.id);
        }
        deviation.max_rel = deviation.max_rel.max(rel);
    }
    deviation
}

/// Compares the forces of two runs bead by bead, both have to contain the same ids in sorted order
pub fn compare_runs<R: Real>(
    a: &[Bead<R>],
    b: &[Bead<R>],
) -> Result<ForceDeviation, anyhow::Error> {
    if a.len() != b.len() {
        return Err(anyhow!(
            "runs have different numbers of beads ({} and {})",
            a.len(),
            b.len()
        ));
    }
    if let Some((x, y)) = a.iter().zip(b.iter()).find(|(x, y)| x.id != y.id) {
        return Err(anyhow!("bead ids differ: {} and {}", x.id, y.id));
    }
    let reference: Vec<_> = b.iter().map(|bead| bead.force).collect();
    Ok(force_deviation(a, &reference))
}
