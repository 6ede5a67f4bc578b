//! The `cellhalo` command line tool.
//!
//! Runs a domain-decomposed bead simulation on an in-process world of ranks (`run`) or checks that
//! the decomposed force loop counts every interaction exactly once (`verify`).
//! The decomposition and halo exchange are provided by the [`cellhalo_lib`] crate.

use crate::{logging, run, verify};
use anyhow::Context;
use clap::Parser;
use log::info;

static HELP_TEMPLATE: &str = "{before-help}{name} (v{version}) - {author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}";

#[derive(Clone, Debug, clap::Parser)]
#[command(
    name = "cellhalo",
    author = "The cellhalo developers",
    about = "Domain-decomposed DPD bead simulations with halo exchange between cell-list subdomains",
    version,
    propagate_version = true,
    help_template = HELP_TEMPLATE,
)]
struct CommandlineArgs {
    /// Enable quiet mode (no output except for severe panic messages), overrides verbosity level
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
    /// Print more verbose output, use multiple "v"s for even more verbose output (-v, -vv, -vvv)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,
    /// Subcommands
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Clone, Debug, clap::Parser)]
enum Subcommand {
    /// Run a decomposed simulation of random beads and chains
    #[command(help_template = HELP_TEMPLATE)]
    Run(run::RunSubcommandArgs),
    /// Compare the forces of a decomposed run against a single process run and a brute force reference
    #[command(help_template = HELP_TEMPLATE)]
    Verify(verify::VerifySubcommandArgs),
}

/// A simple on/off switch for command line arguments.
///
/// Used in the CLI as `--progress=on` or `--progress=off`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Switch {
    Off,
    On,
}

impl Switch {
    pub(crate) fn into_bool(self) -> bool {
        match self {
            Switch::Off => false,
            Switch::On => true,
        }
    }
}

/// Runs the cellhalo CLI with the provided command line arguments.
///
/// This function behaves like the binary `cellhalo` command line tool including output to stdout
/// and stderr. It installs the global logger, so it can only be called once per process.
/// Note that the first argument is always ignored, this is typically the binary name when called using
/// `std::env::args()` from the terminal:
/// ```
/// cellhalo::cli::run_cellhalo(["cellhalo", "--version"]);
/// ```
pub fn run_cellhalo<I, T>(args: I) -> Result<(), anyhow::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    run_cellhalo_impl(args).inspect_err(logging::log_error)
}

fn run_cellhalo_impl<I, T>(args: I) -> Result<(), anyhow::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cmd_args = CommandlineArgs::parse_from(args);

    let verbosity = VerbosityLevel::from(cmd_args.verbosity);
    let is_quiet = cmd_args.quiet;

    logging::initialize_logging(verbosity, is_quiet).context("Failed to initialize logging")?;
    logging::log_program_info();

    let result = match &cmd_args.subcommand {
        Subcommand::Run(cmd_args) => run::run_subcommand(cmd_args),
        Subcommand::Verify(cmd_args) => verify::verify_subcommand(cmd_args),
    };

    // Timings are merged over all rank threads
    info!("Timings:");
    let mut buffer = Vec::new();
    cellhalo_lib::profiling::write(&mut buffer).context("Failed to collect timings")?;
    String::from_utf8_lossy(&buffer)
        .split('\n')
        .filter(|l| !l.is_empty())
        .for_each(|l| info!("{}", l));

    info!(
        "Finished at {}.",
        chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
    );

    result
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum VerbosityLevel {
    None,
    Verbose,
    VeryVerbose,
    VeryVeryVerbose,
}

impl From<u8> for VerbosityLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => VerbosityLevel::None,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::VeryVerbose,
            _ => VerbosityLevel::VeryVeryVerbose,
        }
    }
}

impl VerbosityLevel {
    /// Maps this verbosity level to a log filter
    pub fn into_filter(self) -> Option<log::LevelFilter> {
        match self {
            VerbosityLevel::None => None,
            VerbosityLevel::Verbose => Some(log::LevelFilter::Info),
            VerbosityLevel::VeryVerbose => Some(log::LevelFilter::Debug),
            VerbosityLevel::VeryVeryVerbose => Some(log::LevelFilter::Trace),
        }
    }
}
