mod test_bonds;
mod test_exactly_once;
mod test_ghosts;
mod test_migration;
mod test_protocol;

use cellhalo_lib::HaloParameters;
use std::time::Duration;

/// Cubic unit cells with cutoff 1 and a short receive timeout so that failing tests do not hang
pub fn unit_params(process_grid: [usize; 3], subdomain_cells: [usize; 3]) -> HaloParameters<f64> {
    let mut params = HaloParameters::new_cubic(process_grid, subdomain_cells, 1.0);
    params.comm_timeout = Some(Duration::from_secs(5));
    params
}
