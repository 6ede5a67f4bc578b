use all_asserts::assert_range;
use cellhalo::{SimulationSetup, run_pipeline, verify_pipeline};
use cellhalo_lib::world::{random_beads, random_chains};
use cellhalo_lib::{BeadId, ForceField, HaloParameters, SimulationGeometry};

fn setup(process_grid: [usize; 3], n_chains: usize, n_beads: usize) -> SimulationSetup {
    let parameters = HaloParameters::new_cubic(process_grid, [3, 3, 3], 1.0);
    let geometry = SimulationGeometry::new(&parameters).unwrap();
    let (mut beads, bonds) = random_chains(&geometry, n_chains, 6, 0.5, 0, 11);
    let offset = beads.len() as BeadId;
    beads.extend(random_beads(&geometry, n_beads, 0.5, 12).into_iter().map(|mut b| {
        b.id += offset;
        b
    }));
    SimulationSetup {
        parameters,
        forces: ForceField::dpd(1.0, bonds),
        beads,
    }
}

#[test]
fn test_run_pipeline() -> Result<(), anyhow::Error> {
    let setup = setup([2, 1, 2], 5, 200);
    let result = run_pipeline(&setup, 4, false)?;

    assert_eq!(result.beads.len(), 230);
    assert_eq!(result.statistics.len(), 4);
    assert_eq!(
        result.statistics.iter().map(|s| s.n_beads).sum::<usize>(),
        230,
        "every bead should be owned by exactly one rank"
    );
    assert!(result.total_ghost_beads() > 0);
    Ok(())
}

#[test]
fn test_verify_pipeline() -> Result<(), anyhow::Error> {
    let setup = setup([2, 2, 2], 10, 600);
    let report = verify_pipeline(&setup, 1, true)?;

    assert_range!(0.0..1e-9, report.reference.max_rel);
    let single = report
        .single_process
        .expect("the single process run was requested");
    assert_range!(0.0..1e-9, single.max_rel);
    assert_range!(0.0..1e-8, report.net_force, "forces should cancel over all beads");
    assert!(report.is_within(1e-9));
    Ok(())
}

#[test]
fn test_verify_single_process_only_against_reference() -> Result<(), anyhow::Error> {
    let setup = setup([1, 1, 1], 0, 50);
    let report = verify_pipeline(&setup, 2, false)?;
    assert!(report.single_process.is_none());
    assert_range!(0.0..1e-9, report.reference.max_rel);
    Ok(())
}
