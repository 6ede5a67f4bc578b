use all_asserts::assert_range;
use cellhalo_lib::world::{force_deviation, random_beads, random_chains, reference_forces, run_world};
use cellhalo_lib::{
    Bead, BondTable, ChannelCommunicator, ForceField, GeometryInvariantViolation, HaloError,
    SimulationGeometry, Subdomain,
};
use nalgebra::Vector3;
use std::time::Duration;

use super::unit_params;

#[test]
fn test_bond_across_process_boundary() -> Result<(), anyhow::Error> {
    let params = unit_params([2, 1, 1], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = vec![
        Bead::new(0, 0, Vector3::new(2.9, 1.5, 1.5)),
        Bead::new(1, 0, Vector3::new(3.6, 1.6, 1.5)),
    ];
    let forces = ForceField::dpd(1.0, BondTable::from_pairs([(0, 1)]));

    let result = run_world(&params, &forces, &beads, 1)?;
    let reference = reference_forces(&geometry, &forces, &result.beads);

    let f0 = result.beads[0].force;
    let f1 = result.beads[1].force;
    assert_range!(0.0..1e-12, (f0 + f1).norm(), "bond and pair forces are antisymmetric");
    assert_range!(0.0..1e-12, (f0 - reference[0]).norm());
    assert_range!(0.0..1e-12, (f1 - reference[1]).norm());
    // Stretched bond beyond the pair cutoff: bead 0 is pulled towards +x
    assert!(f0.x > 0.0);
    Ok(())
}

#[test]
fn test_bond_across_periodic_boundary_of_single_process() -> Result<(), anyhow::Error> {
    let params = unit_params([1, 1, 1], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params)?;
    let beads = vec![
        Bead::new(0, 0, Vector3::new(0.2, 0.5, 2.9)),
        Bead::new(1, 0, Vector3::new(0.2, 0.5, 0.3)),
    ];
    let forces = ForceField::dpd(1.0, BondTable::from_pairs([(0, 1)]));

    let result = run_world(&params, &forces, &beads, 1)?;
    let reference = reference_forces(&geometry, &forces, &result.beads);
    let deviation = force_deviation(&result.beads, &reference);
    assert_range!(0.0..1e-12, deviation.max_abs);
    assert!(result.beads[0].force.z != 0.0);
    Ok(())
}

#[test]
fn test_chains_on_decomposed_box() -> Result<(), anyhow::Error> {
    for process_grid in [[2, 1, 1], [2, 2, 2], [1, 3, 2]] {
        let params = unit_params(process_grid, [3, 3, 3]);
        let geometry = SimulationGeometry::new(&params)?;

        let (mut beads, bonds) = random_chains(&geometry, 20, 8, 0.5, 0, 5);
        let n_chain_beads = beads.len() as i64;
        beads.extend(
            random_beads(&geometry, 100, 0.1, 6)
                .into_iter()
                .map(|mut b| {
                    b.id += n_chain_beads;
                    b
                }),
        );
        let forces = ForceField::dpd(1.0, bonds);

        let result = run_world(&params, &forces, &beads, 3)?;
        assert_eq!(result.beads.len(), beads.len());

        let reference = reference_forces(&geometry, &forces, &result.beads);
        let deviation = force_deviation(&result.beads, &reference);
        assert_range!(
            0.0..1e-9,
            deviation.max_rel,
            "forces of grid {:?} deviate from the reference",
            process_grid
        );
    }
    Ok(())
}

#[test]
fn test_overlong_bond_is_rejected() {
    let params = unit_params([1, 1, 1], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params).unwrap();
    let comm = ChannelCommunicator::create_world(1, None).pop().unwrap();
    let mut subdomain = Subdomain::new(
        &geometry,
        ForceField::dpd(1.0, BondTable::from_pairs([(0, 1)])),
        comm,
    )
    .unwrap();

    let beads = [
        Bead::new(0, 0, Vector3::new(0.5, 0.5, 0.5)),
        Bead::new(1, 0, Vector3::new(2.0, 0.5, 0.5)),
    ];
    subdomain.insert_owned_beads(&beads);

    assert!(matches!(
        subdomain.step(),
        Err(HaloError::Geometry(GeometryInvariantViolation::BondTooLong {
            bead: 0,
            partner: 1,
            ..
        }))
    ));
}

#[test]
fn test_overlong_bond_on_second_rank_is_reported() {
    let mut params = unit_params([2, 1, 1], [3, 3, 3]);
    params.comm_timeout = Some(Duration::from_secs(1));
    // Both beads are owned by rank 1, rank 0 only sees the failure through the transport
    let beads = vec![
        Bead::new(0, 0, Vector3::new(3.5, 1.5, 1.5)),
        Bead::new(1, 0, Vector3::new(5.0, 1.5, 1.5)),
    ];
    let forces = ForceField::dpd(1.0, BondTable::from_pairs([(0, 1)]));

    let error = run_world(&params, &forces, &beads, 2).unwrap_err();
    let message = format!("{:#}", error);
    assert!(message.contains("rank 1"), "unexpected error: {}", message);
    assert!(
        matches!(
            error.downcast_ref::<HaloError>(),
            Some(HaloError::Geometry(GeometryInvariantViolation::BondTooLong { .. }))
        ),
        "unexpected error: {}",
        message
    );
}
