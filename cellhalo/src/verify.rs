//! The `verify` subcommand: checks that a decomposed run counts every interaction exactly once
//!
//! The forces of the decomposed run are compared against a brute force evaluation over all bead
//! pairs at the final positions and, optionally, against the same system run on a single process.

use anyhow::{Context, anyhow};
use cellhalo_lib::nalgebra::Vector3;
use cellhalo_lib::world::{ForceDeviation, compare_runs, force_deviation, reference_forces};
use log::{info, warn};

use crate::cli::Switch;
use crate::run::{initialize_thread_pool, run_pipeline};
use crate::setup::{SimulationSetup, SystemArgs};

/// Command line arguments for the `verify` subcommand
#[derive(Clone, Debug, clap::Parser)]
pub struct VerifySubcommandArgs {
    #[command(flatten)]
    pub system: SystemArgs,
    /// Number of time steps to run before comparing
    #[arg(short = 's', long, default_value = "1")]
    pub steps: usize,
    /// Largest accepted relative force deviation
    #[arg(long, default_value = "1e-9")]
    pub tolerance: f64,
    /// Also compare the trajectory against the same system on a single process
    #[arg(
        long,
        default_value = "on",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub single_process: Switch,
}

/// Outcome of a verification run
#[derive(Copy, Clone, Debug)]
pub struct VerifyReport {
    /// Deviation of the decomposed forces from the brute force reference
    pub reference: ForceDeviation,
    /// Deviation of the decomposed forces from the single process run, if it was performed
    pub single_process: Option<ForceDeviation>,
    /// Norm of the sum of all forces, vanishes if every pair is counted once from both sides
    pub net_force: f64,
}

impl VerifyReport {
    /// Returns whether all deviations are within the given relative tolerance
    pub fn is_within(&self, tolerance: f64) -> bool {
        self.reference.max_rel <= tolerance
            && self
                .single_process
                .is_none_or(|deviation| deviation.max_rel <= tolerance)
    }
}

/// Runs the decomposed system and compares its forces after `steps` steps
pub fn verify_pipeline(
    setup: &SimulationSetup,
    steps: usize,
    compare_single_process: bool,
) -> Result<VerifyReport, anyhow::Error> {
    let geometry = setup.geometry()?;
    let decomposed = run_pipeline(setup, steps, false)?;

    let reference = reference_forces(&geometry, &setup.forces, &decomposed.beads);
    let reference = force_deviation(&decomposed.beads, &reference);
    let net_force = decomposed
        .beads
        .iter()
        .fold(Vector3::zeros(), |sum, bead| sum + bead.force)
        .norm();

    let single_process = if compare_single_process {
        let single = run_pipeline(&setup.single_process_equivalent(), steps, false)
            .context("Single process run failed")?;
        Some(compare_runs(&decomposed.beads, &single.beads)?)
    } else {
        None
    };

    Ok(VerifyReport {
        reference,
        single_process,
        net_force,
    })
}

/// Executes the `verify` subcommand, fails if a deviation exceeds the tolerance
pub fn verify_subcommand(cmd_args: &VerifySubcommandArgs) -> Result<(), anyhow::Error> {
    initialize_thread_pool(&cmd_args.system)?;
    let setup = SimulationSetup::try_from(&cmd_args.system)
        .context("Failed processing parameters from command line")?;
    if setup.parameters.process_grid == [1, 1, 1] {
        warn!("The process grid has a single process, only the brute force comparison is meaningful.");
    }

    let report = verify_pipeline(&setup, cmd_args.steps, cmd_args.single_process.into_bool())?;

    info!(
        "Brute force reference: max. abs. deviation {:.3e}, max. rel. deviation {:.3e} (bead {:?})",
        report.reference.max_abs, report.reference.max_rel, report.reference.worst_bead
    );
    if let Some(single) = &report.single_process {
        info!(
            "Single process run: max. abs. deviation {:.3e}, max. rel. deviation {:.3e} (bead {:?})",
            single.max_abs, single.max_rel, single.worst_bead
        );
    }
    info!("Net force over all beads: {:.3e}", report.net_force);

    if report.is_within(cmd_args.tolerance) {
        info!("Verification passed with tolerance {:.1e}.", cmd_args.tolerance);
        Ok(())
    } else {
        Err(anyhow!(
            "Force deviation exceeds the tolerance of {:.1e}",
            cmd_args.tolerance
        ))
    }
}
