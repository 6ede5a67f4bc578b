//! Command line description of the simulated system and its conversion into library types

use std::time::Duration;

use anyhow::{Context, anyhow};
use cellhalo_lib::world::{random_beads, random_chains};
use cellhalo_lib::{
    Bead, BeadId, DpdConservative, ForceField, HaloParameters, HarmonicBond, SimulationGeometry,
};
use log::info;

// Help headings
static ARGS_DECOMP: &str = "Decomposition parameters";
static ARGS_SYSTEM: &str = "Bead system";
static ARGS_FORCES: &str = "Force field";
static ARGS_ADV: &str = "Advanced parameters";

/// Decomposition, bead system and force field shared by all subcommands
#[derive(Clone, Debug, clap::Args)]
pub struct SystemArgs {
    /// Number of processes (ranks) along each axis, every rank runs on its own thread
    #[arg(
        help_heading = ARGS_DECOMP,
        short = 'p',
        long,
        num_args = 3,
        value_names = ["PX", "PY", "PZ"],
        default_values_t = vec![2usize, 2, 2],
    )]
    pub process_grid: Vec<usize>,
    /// Number of cells of every subdomain along each axis (at least 3)
    #[arg(
        help_heading = ARGS_DECOMP,
        short = 'c',
        long,
        num_args = 3,
        value_names = ["LX", "LY", "LZ"],
        default_values_t = vec![4usize, 4, 4],
    )]
    pub subdomain_cells: Vec<usize>,
    /// Edge length of the cubic cells
    #[arg(help_heading = ARGS_DECOMP, short = 'w', long, default_value = "1.0")]
    pub cell_width: f64,
    /// Interaction cutoff radius, has to be at most the cell width (default: cell width)
    #[arg(help_heading = ARGS_DECOMP, long)]
    pub cutoff: Option<f64>,

    /// Number of free beads (default: three beads per unit volume of the box)
    #[arg(help_heading = ARGS_SYSTEM, short = 'b', long)]
    pub beads: Option<usize>,
    /// Number of bonded linear chains
    #[arg(help_heading = ARGS_SYSTEM, long, default_value = "0")]
    pub chains: usize,
    /// Number of beads per chain
    #[arg(help_heading = ARGS_SYSTEM, long, default_value = "8")]
    pub chain_length: usize,
    /// Initial distance of bonded beads in multiples of the cutoff
    #[arg(help_heading = ARGS_SYSTEM, long, default_value = "0.5")]
    pub bond_length: f64,
    /// Maximum initial speed of the free beads along each axis
    #[arg(help_heading = ARGS_SYSTEM, long, default_value = "1.0")]
    pub max_speed: f64,
    /// Seed of the random initial configuration
    #[arg(help_heading = ARGS_SYSTEM, long, default_value = "42")]
    pub seed: u64,

    /// Conservative DPD repulsion parameter between all bead types
    #[arg(help_heading = ARGS_FORCES, long, default_value = "25.0")]
    pub repulsion: f64,
    /// Stiffness of the harmonic bonds
    #[arg(help_heading = ARGS_FORCES, long, default_value = "128.0")]
    pub bond_stiffness: f64,
    /// Rest length of the harmonic bonds in multiples of the cutoff
    #[arg(help_heading = ARGS_FORCES, long, default_value = "0.5")]
    pub bond_rest_length: f64,

    /// Integration time step
    #[arg(help_heading = ARGS_ADV, long, default_value = "0.01")]
    pub time_step: f64,
    /// Seconds a rank waits for a message of a neighbor before giving up, 0 waits forever
    #[arg(help_heading = ARGS_ADV, long, default_value = "30")]
    pub comm_timeout: f64,
    /// Set the number of threads of the worker thread pool used by the brute force reference
    #[arg(help_heading = ARGS_ADV, long, short = 'n')]
    pub num_threads: Option<usize>,
}

/// Everything needed to start a decomposed run
#[derive(Clone)]
pub struct SimulationSetup {
    pub parameters: HaloParameters<f64>,
    pub forces: ForceField<f64>,
    pub beads: Vec<Bead<f64>>,
}

impl SimulationSetup {
    /// Returns the geometry of the decomposition
    pub fn geometry(&self) -> Result<SimulationGeometry<f64>, anyhow::Error> {
        SimulationGeometry::new(&self.parameters).context("Invalid decomposition parameters")
    }

    /// Returns the same system on a single process covering the whole box
    pub fn single_process_equivalent(&self) -> Self {
        Self {
            parameters: self.parameters.single_process_equivalent(),
            forces: self.forces.clone(),
            beads: self.beads.clone(),
        }
    }
}

fn to_triple(values: &[usize], name: &str) -> Result<[usize; 3], anyhow::Error> {
    <[usize; 3]>::try_from(values)
        .map_err(|_| anyhow!("{} needs exactly three values, got {}", name, values.len()))
}

impl TryFrom<&SystemArgs> for SimulationSetup {
    type Error = anyhow::Error;

    fn try_from(args: &SystemArgs) -> Result<Self, Self::Error> {
        let process_grid = to_triple(&args.process_grid, "process-grid")?;
        let subdomain_cells = to_triple(&args.subdomain_cells, "subdomain-cells")?;

        let mut parameters = HaloParameters::new_cubic(process_grid, subdomain_cells, args.cell_width);
        if let Some(cutoff) = args.cutoff {
            parameters.cutoff = cutoff;
        }
        parameters.time_step = args.time_step;
        parameters.comm_timeout = if args.comm_timeout > 0.0 {
            Some(
                Duration::try_from_secs_f64(args.comm_timeout)
                    .context("Invalid communication timeout")?,
            )
        } else {
            None
        };

        let geometry =
            SimulationGeometry::new(&parameters).context("Invalid decomposition parameters")?;
        let cutoff = parameters.cutoff;

        let (mut beads, bonds) = random_chains(
            &geometry,
            args.chains,
            args.chain_length,
            args.bond_length * cutoff,
            0,
            args.seed,
        );
        let n_chain_beads = beads.len();
        let n_free_beads = args
            .beads
            .unwrap_or_else(|| (3.0 * geometry.box_lengths().product()).round() as usize);
        beads.extend(
            random_beads(&geometry, n_free_beads, args.max_speed, args.seed.wrapping_add(1))
                .into_iter()
                .map(|mut bead| {
                    bead.id += n_chain_beads as BeadId;
                    bead
                }),
        );

        info!(
            "Box of {:?} cells split over a {:?} process grid, {} beads ({} in {} chains)",
            geometry.global_cells(),
            process_grid,
            beads.len(),
            n_chain_beads,
            args.chains
        );

        let forces = ForceField::new(
            DpdConservative::new(cutoff, args.repulsion),
            HarmonicBond::new(args.bond_stiffness, args.bond_rest_length * cutoff),
            bonds,
        );

        Ok(Self {
            parameters,
            forces,
            beads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, clap::Parser)]
    struct Wrapper {
        #[command(flatten)]
        system: SystemArgs,
    }

    fn parse(args: &[&str]) -> SystemArgs {
        Wrapper::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .expect("arguments should parse")
            .system
    }

    #[test]
    fn test_default_setup() {
        let setup = SimulationSetup::try_from(&parse(&[])).unwrap();
        assert_eq!(setup.parameters.process_grid, [2, 2, 2]);
        assert_eq!(setup.parameters.cutoff, 1.0);
        // 8x8x8 box at three beads per unit volume
        assert_eq!(setup.beads.len(), 3 * 512);
        assert!(setup.forces.bonds.is_empty());
    }

    #[test]
    fn test_chains_come_first() {
        let setup = SimulationSetup::try_from(&parse(&[
            "--beads=10",
            "--chains=2",
            "--chain-length=4",
            "--subdomain-cells",
            "3",
            "3",
            "3",
        ]))
        .unwrap();
        assert_eq!(setup.beads.len(), 18);
        let ids: Vec<_> = setup.beads.iter().map(|b| b.id).collect();
        assert_eq!(ids, (0..18).collect::<Vec<_>>());
        assert!(setup.forces.bonds.are_bonded(0, 1));
        assert!(!setup.forces.bonds.are_bonded(3, 4));
    }

    #[test]
    fn test_invalid_cutoff_is_rejected() {
        let result = SimulationSetup::try_from(&parse(&["--cutoff=1.5"]));
        assert!(result.is_err());

        let result = SimulationSetup::try_from(&parse(&["--process-grid", "0", "1", "1"]));
        assert!(result.is_err());
    }
}
