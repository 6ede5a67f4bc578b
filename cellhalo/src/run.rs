//! The `run` subcommand: steps a decomposed bead system and reports the halo traffic

use anyhow::Context;
use cellhalo_lib::nalgebra::Vector3;
use cellhalo_lib::world::{WorldResult, run_world_with_progress};
use log::info;

use crate::cli::Switch;
use crate::logging::StepProgress;
use crate::setup::{SimulationSetup, SystemArgs};

/// Command line arguments for the `run` subcommand
#[derive(Clone, Debug, clap::Parser)]
pub struct RunSubcommandArgs {
    #[command(flatten)]
    pub system: SystemArgs,
    /// Number of time steps to run
    #[arg(short = 's', long, default_value = "10")]
    pub steps: usize,
    /// Show a progress bar over the time steps
    #[arg(
        long,
        default_value = "on",
        value_name = "off|on",
        ignore_case = true,
        require_equals = true
    )]
    pub progress: Switch,
}

/// Executes the `run` subcommand
pub fn run_subcommand(cmd_args: &RunSubcommandArgs) -> Result<(), anyhow::Error> {
    initialize_thread_pool(&cmd_args.system)?;
    let setup = SimulationSetup::try_from(&cmd_args.system)
        .context("Failed processing parameters from command line")?;

    let result = run_pipeline(&setup, cmd_args.steps, cmd_args.progress.into_bool())?;
    log_statistics(&result);
    Ok(())
}

/// Runs the decomposed world of the setup for the given number of steps
pub fn run_pipeline(
    setup: &SimulationSetup,
    steps: usize,
    show_progress: bool,
) -> Result<WorldResult<f64>, anyhow::Error> {
    let progress = show_progress.then(|| StepProgress::new(steps)).transpose()?;
    let report = |finished: usize| {
        if let Some(progress) = &progress {
            progress.set_finished(finished);
        }
    };

    run_world_with_progress(&setup.parameters, &setup.forces, &setup.beads, steps, &report)
        .context("Decomposed run failed")
}

pub(crate) fn initialize_thread_pool(args: &SystemArgs) -> Result<(), anyhow::Error> {
    if let Some(num_threads) = args.num_threads {
        cellhalo_lib::initialize_thread_pool(num_threads)
            .context("Failed to initialize the worker thread pool")?;
    }
    Ok(())
}

fn log_statistics(result: &WorldResult<f64>) {
    for (rank, stats) in result.statistics.iter().enumerate() {
        info!(
            "Rank {}: {} beads, {} ghost beads, {} emigrants, {} immigrants in the last step",
            rank, stats.n_beads, stats.n_ghost_beads, stats.n_emigrants, stats.n_immigrants
        );
    }
    let (momentum, kinetic) = result.beads.iter().fold(
        (Vector3::zeros(), 0.0),
        |(momentum, kinetic), bead| {
            (
                momentum + bead.velocity,
                kinetic + 0.5 * bead.velocity.norm_squared(),
            )
        },
    );
    info!(
        "{} beads, total momentum |p| = {:.3e}, kinetic energy {:.6}",
        result.beads.len(),
        momentum.norm(),
        kinetic
    );
}
