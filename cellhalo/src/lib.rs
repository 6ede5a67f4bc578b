pub mod cli;
mod logging;
pub mod run;
pub mod setup;
pub mod verify;

pub use run::run_pipeline;
pub use setup::SimulationSetup;
pub use verify::{VerifyReport, verify_pipeline};
