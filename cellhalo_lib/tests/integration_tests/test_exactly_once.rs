use all_asserts::assert_range;
use cellhalo_lib::world::{compare_runs, force_deviation, random_beads, reference_forces, run_world};
use cellhalo_lib::{BondTable, ForceField, SimulationGeometry};
use nalgebra::Vector3;

use super::unit_params;

/// Checks that the forces of a decomposed run match a brute-force evaluation and the undecomposed run
macro_rules! generate_exactly_once_test {
    ($test_name:ident, process_grid = $process_grid:expr, cells = $cells:expr, steps = $steps:literal) => {
        #[test]
        fn $test_name() -> Result<(), anyhow::Error> {
            let params = unit_params($process_grid, $cells);
            let geometry = SimulationGeometry::new(&params)?;
            let volume = geometry.box_lengths().iter().product::<f64>();
            let n_beads = (3.0 * volume) as usize;

            let beads = random_beads(&geometry, n_beads, 0.5, 4711);
            let forces = ForceField::dpd(1.0, BondTable::new());

            let decomposed = run_world(&params, &forces, &beads, $steps)?;
            assert_eq!(decomposed.beads.len(), n_beads, "no bead may be lost or duplicated");

            // Brute-force forces at the final positions
            let reference = reference_forces(&geometry, &forces, &decomposed.beads);
            let deviation = force_deviation(&decomposed.beads, &reference);
            assert_range!(
                0.0..1e-9,
                deviation.max_rel,
                "decomposed forces deviate from the all-pairs reference"
            );

            // Pair forces cancel over the whole box
            let total: Vector3<f64> = decomposed.beads.iter().map(|b| b.force).sum();
            assert_range!(0.0..1e-8, total.norm(), "total force has to vanish");

            // Same trajectory as a single process covering the whole box
            let single = run_world(
                &params.single_process_equivalent(),
                &forces,
                &beads,
                $steps,
            )?;
            let deviation = compare_runs(&decomposed.beads, &single.beads)?;
            assert_range!(
                0.0..1e-6,
                deviation.max_rel,
                "decomposed run diverges from the single process run"
            );

            Ok(())
        }
    };
}

generate_exactly_once_test!(test_exactly_once_1x1x1, process_grid = [1, 1, 1], cells = [4, 4, 4], steps = 1);
generate_exactly_once_test!(test_exactly_once_2x1x1, process_grid = [2, 1, 1], cells = [3, 3, 3], steps = 1);
generate_exactly_once_test!(test_exactly_once_1x2x1, process_grid = [1, 2, 1], cells = [3, 4, 3], steps = 1);
generate_exactly_once_test!(test_exactly_once_2x2x1, process_grid = [2, 2, 1], cells = [3, 3, 3], steps = 1);
generate_exactly_once_test!(test_exactly_once_2x2x2, process_grid = [2, 2, 2], cells = [3, 3, 3], steps = 1);
generate_exactly_once_test!(test_exactly_once_3x1x2, process_grid = [3, 1, 2], cells = [3, 4, 3], steps = 1);
generate_exactly_once_test!(test_exactly_once_3x3x3, process_grid = [3, 3, 3], cells = [3, 3, 3], steps = 1);
generate_exactly_once_test!(test_trajectory_2x2x2, process_grid = [2, 2, 2], cells = [3, 3, 3], steps = 5);
generate_exactly_once_test!(test_trajectory_3x1x2, process_grid = [3, 1, 2], cells = [4, 3, 3], steps = 5);

#[test]
fn test_two_beads_across_corner() -> Result<(), anyhow::Error> {
    // Two beads in diagonally opposite corner cells of the box interact through the periodic corner
    let params = unit_params([2, 2, 2], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = vec![
        cellhalo_lib::Bead::new(0, 0, Vector3::new(0.1, 0.1, 0.1)),
        cellhalo_lib::Bead::new(1, 0, Vector3::new(5.9, 5.9, 5.9)),
    ];
    let forces = ForceField::dpd(1.0, BondTable::new());

    let result = run_world(&params, &forces, &beads, 1)?;
    let reference = reference_forces(&geometry, &forces, &result.beads);

    let f0 = result.beads[0].force;
    let f1 = result.beads[1].force;
    assert!(f0.norm() > 1.0, "beads should repel each other");
    assert!(f0.iter().all(|&c| c > 0.0));
    assert_range!(0.0..1e-12, (f0 + f1).norm());
    assert_range!(0.0..1e-12, (f0 - reference[0]).norm());
    Ok(())
}
