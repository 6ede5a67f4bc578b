use cellhalo_lib::world::{random_beads, run_world};
use cellhalo_lib::{
    Bead, BondTable, ForceField, GeometryInvariantViolation, HaloError, SimulationGeometry,
};
use nalgebra::Vector3;
use std::time::Duration;

use super::unit_params;

#[test]
fn test_bead_moves_to_neighbor_process() -> Result<(), anyhow::Error> {
    let params = unit_params([2, 1, 1], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = vec![
        // Crosses from rank 0 into rank 1
        Bead::with_velocity(0, 0, Vector3::new(2.995, 1.5, 1.5), Vector3::new(1.0, 0.0, 0.0)),
        // Crosses the periodic boundary from rank 1 into rank 0
        Bead::with_velocity(1, 0, Vector3::new(5.995, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0)),
        // Stays in rank 0 but changes the cell
        Bead::with_velocity(2, 0, Vector3::new(1.995, 2.5, 2.5), Vector3::new(1.0, 0.0, 0.0)),
    ];
    let forces = ForceField::dpd(1.0, BondTable::new());

    let result = run_world(&params, &forces, &beads, 1)?;
    assert_eq!(result.beads.len(), 3);

    let owners: Vec<_> = result
        .beads
        .iter()
        .map(|b| geometry.rank_of(&geometry.owner_of_position(&b.position).0))
        .collect();
    assert_eq!(owners, vec![1, 0, 0]);
    assert!((result.beads[0].position.x - 3.005).abs() < 1e-12);
    assert!((result.beads[1].position.x - 0.005).abs() < 1e-12);

    assert_eq!(result.statistics[0].n_emigrants, 1);
    assert_eq!(result.statistics[0].n_immigrants, 1);
    assert_eq!(result.statistics[1].n_emigrants, 1);
    assert_eq!(result.statistics[1].n_immigrants, 1);
    assert_eq!(result.statistics[0].n_beads, 2);
    assert_eq!(result.statistics[1].n_beads, 1);
    Ok(())
}

#[test]
fn test_migration_through_corner() -> Result<(), anyhow::Error> {
    let params = unit_params([2, 2, 2], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = vec![Bead::with_velocity(
        7,
        0,
        Vector3::new(2.99, 2.99, 2.99),
        Vector3::new(2.0, 2.0, 2.0),
    )];
    let forces = ForceField::dpd(1.0, BondTable::new());

    let result = run_world(&params, &forces, &beads, 1)?;
    assert_eq!(result.beads.len(), 1);
    let (owner, local) = geometry.owner_of_position(&result.beads[0].position);
    assert_eq!(owner, [1, 1, 1]);
    assert_eq!(local, [0, 0, 0]);
    assert_eq!(result.statistics[0].n_emigrants, 1);
    assert_eq!(result.statistics[7].n_immigrants, 1);
    Ok(())
}

#[test]
fn test_bead_count_is_conserved() -> Result<(), anyhow::Error> {
    let params = unit_params([3, 1, 2], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = random_beads(&geometry, 500, 1.5, 99);
    let forces = ForceField::dpd(1.0, BondTable::new());

    let result = run_world(&params, &forces, &beads, 10)?;
    let ids: Vec<_> = result.beads.iter().map(|b| b.id).collect();
    assert_eq!(ids, (0..500).collect::<Vec<_>>());
    assert_eq!(
        result.statistics.iter().map(|s| s.n_beads).sum::<usize>(),
        500
    );
    assert_eq!(
        result.statistics.iter().map(|s| s.n_emigrants).sum::<usize>(),
        result.statistics.iter().map(|s| s.n_immigrants).sum::<usize>()
    );
    Ok(())
}

#[test]
fn test_excessive_displacement_is_reported() {
    let mut params = unit_params([2, 1, 1], [3, 3, 3]);
    params.comm_timeout = Some(Duration::from_millis(500));
    let beads = vec![Bead::with_velocity(
        3,
        0,
        Vector3::new(1.5, 1.5, 1.5),
        Vector3::new(250.0, 0.0, 0.0),
    )];
    let forces = ForceField::dpd(1.0, BondTable::new());

    let error = run_world(&params, &forces, &beads, 1).expect_err("the bead skips a cell");
    let halo_error = error
        .downcast_ref::<HaloError>()
        .expect("the root cause should be a halo error");
    assert!(matches!(
        halo_error,
        HaloError::Geometry(GeometryInvariantViolation::ExcessiveDisplacement { bead: 3, .. })
    ));
}
