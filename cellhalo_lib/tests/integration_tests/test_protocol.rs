use cellhalo_lib::border::HaloContext;
use cellhalo_lib::{
    BondTable, BorderRegion, BorderSet, CellGrid, ForceField, HaloError, NeighborDirection, Phase,
    PhaseTracker, ProtocolOrderingViolation, ProxyRegistry, RegionId, SimulationGeometry,
};

use super::unit_params;

#[test]
fn test_operations_are_guarded_by_phase() {
    let geometry = SimulationGeometry::new(&unit_params([2, 1, 1], [3, 3, 3])).unwrap();
    let mut grid = CellGrid::new(&geometry, [0, 0, 0]);
    let mut registry = ProxyRegistry::new();
    let borders = BorderSet::build(&geometry, &mut grid, &mut registry).unwrap();
    let forces = ForceField::dpd(1.0, BondTable::new());
    let mut phase = PhaseTracker::new();
    assert_eq!(phase.current(), Phase::Complete);

    let lower_x = NeighborDirection::new([-1, 0, 0]).unwrap();
    let region = borders.region(RegionId::from_direction(lower_x));
    {
        let mut ctx = HaloContext {
            geometry: &geometry,
            grid: &mut grid,
            registry: &registry,
            phase: &phase,
            pair_force: forces.pair.as_ref(),
            bond_force: forces.bond.as_ref(),
            bonds: forces.bonds.as_ref(),
        };

        match region.update_force(&mut ctx) {
            Err(HaloError::Protocol(ProtocolOrderingViolation {
                operation,
                expected,
                actual,
            })) => {
                assert_eq!(operation, "update_force");
                assert_eq!(expected, Phase::LocalForce);
                assert_eq!(actual, Phase::Complete);
            }
            other => panic!("expected an ordering violation, got {:?}", other),
        }
        assert!(region.update_pos(&mut ctx).is_err());
        assert!(region.calculate_shared_force(&mut ctx).is_err());
        assert!(region.update_shared_force(&mut ctx).is_err());
        assert!(region.calculate_shared_bond_force(&mut ctx).is_err());
    }
    assert!(region.clear_external_cells(&mut registry, &phase).is_err());

    phase.advance(Phase::PositionUpdate).unwrap();
    phase.advance(Phase::Migration).unwrap();
    phase.advance(Phase::GhostExchange).unwrap();
    assert!(region.is_external());
    assert_eq!(region.clear_external_cells(&mut registry, &phase).unwrap(), 9);

    phase.advance(Phase::LocalForce).unwrap();
    let mut ctx = HaloContext {
        geometry: &geometry,
        grid: &mut grid,
        registry: &registry,
        phase: &phase,
        pair_force: forces.pair.as_ref(),
        bond_force: forces.bond.as_ref(),
        bonds: forces.bonds.as_ref(),
    };
    assert!(region.update_force(&mut ctx).is_ok());
    assert!(region.calculate_correction_force(&mut ctx).is_err());
}

#[test]
fn test_phases_cannot_be_skipped() {
    let mut phase = PhaseTracker::new();
    assert!(phase.advance(Phase::LocalForce).is_err());
    assert_eq!(phase.step(), 0);

    for &p in Phase::all() {
        phase.advance(p).unwrap();
    }
    assert_eq!(phase.current(), Phase::Complete);
    assert_eq!(phase.step(), 1);

    let error = phase.advance(Phase::SharedForce).unwrap_err();
    assert_eq!(error.expected, Phase::PositionUpdate);
    assert_eq!(error.actual, Phase::SharedForce);
}
