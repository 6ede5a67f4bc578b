use cellhalo_lib::world::{random_beads, run_world};
use cellhalo_lib::{
    BorderRegion, BorderSet, BondTable, CellGrid, CellRef, ChannelCommunicator, ForceField,
    NeighborDirection, ProxyRegistry, RegionKind, SimulationGeometry, Subdomain,
};

use super::unit_params;

fn build_borders(
    process_grid: [usize; 3],
    cells: [usize; 3],
    process: [usize; 3],
) -> (SimulationGeometry<f64>, CellGrid<f64>, ProxyRegistry<f64>, BorderSet<f64>) {
    let geometry = SimulationGeometry::new(&unit_params(process_grid, cells)).unwrap();
    let mut grid = CellGrid::new(&geometry, process);
    let mut registry = ProxyRegistry::new();
    let borders = BorderSet::build(&geometry, &mut grid, &mut registry).unwrap();
    (geometry, grid, registry, borders)
}

#[test]
fn test_single_process_has_no_proxies() {
    let (_, grid, registry, borders) = build_borders([1, 1, 1], [3, 4, 5], [0, 0, 0]);
    assert!(registry.is_empty());
    assert_eq!(borders.external_regions().count(), 0);
    assert_eq!(borders.regions().len(), 26);
    for cell in grid.cells() {
        assert!(cell.neighbors().iter().all(|n| matches!(n, CellRef::Local(_))));
    }
    // Interior of a 3x4x5 block
    assert_eq!(borders.bulk_cells().len(), 6);
}

#[test]
fn test_regions_partition_the_boundary() {
    let (geometry, _, _, borders) = build_borders([2, 2, 2], [4, 3, 5], [1, 0, 1]);
    let mut owner_count = vec![0; geometry.num_subdomain_cells()];
    for region in borders.regions() {
        for &cell in region.cells() {
            owner_count[cell] += 1;
        }
    }
    for &cell in borders.bulk_cells() {
        owner_count[cell] += 1;
    }
    assert!(owner_count.iter().all(|&c| c == 1), "every cell needs exactly one owner");

    for face in borders.faces() {
        assert_eq!(RegionKind::of(face.layout().offset()), RegionKind::Face);
    }
    assert_eq!(borders.faces().len(), 6);
    assert_eq!(borders.edges().len(), 12);
    assert_eq!(borders.corners().len(), 8);
}

#[test]
fn test_corner_cardinality() {
    let (_, _, _, borders) = build_borders([2, 2, 2], [3, 3, 3], [0, 0, 0]);
    for corner in borders.corners() {
        let layout = corner.layout();
        assert_eq!(layout.cells(), &[corner.cell()]);
        assert_eq!(layout.anchors().len(), 1);
        assert_eq!(layout.ghosts().len(), 1);
        assert_eq!(corner.ghost(), Some(layout.ghosts()[0]));
        assert_eq!(layout.plan().ghost_directions().count(), 19);
    }
    for edge in borders.edges() {
        assert_eq!(edge.layout().cells().len(), 1);
        assert_eq!(edge.layout().anchors().len(), 3);
        assert_eq!(edge.layout().ghosts().len(), 3);
    }
    for face in borders.faces() {
        assert_eq!(face.layout().cells().len(), 1);
        assert_eq!(face.layout().anchors().len(), 9);
        assert_eq!(face.layout().ghosts().len(), 9);
    }

    // Operations through the trait see the same layout
    for region in borders.regions() {
        assert_eq!(region.ghost_cells().len(), region.anchor_cells().len());
        let expected = match region.kind() {
            RegionKind::Face => 9,
            RegionKind::Edge => 15,
            RegionKind::Corner => 19,
        };
        assert_eq!(region.plan().ghost_directions().count(), expected);
    }
}

#[test]
fn test_externality_law() {
    for process_grid in [[2, 1, 1], [1, 3, 1], [2, 1, 2], [1, 1, 1], [2, 2, 2]] {
        let (geometry, _, _, borders) = build_borders(process_grid, [3, 3, 3], [0, 0, 0]);
        let external_axes = geometry.external_axes();
        for region in borders.regions() {
            let expected = region.offset().support().intersects(external_axes);
            assert_eq!(
                region.is_external(),
                expected,
                "region {:?} on grid {:?}",
                region.id(),
                process_grid
            );
        }
        for edge in borders.edges() {
            assert_eq!(
                edge.is_external(),
                edge.faces().iter().any(|f| f.is_external())
            );
        }
    }
}

#[test]
fn test_proxy_counts() {
    // All axes split: the full shell around the block
    let (_, _, registry, _) = build_borders([2, 2, 2], [3, 3, 3], [1, 1, 1]);
    assert_eq!(registry.len(), 5 * 5 * 5 - 3 * 3 * 3);

    // Only x split: two layers, y and z wrap locally
    let (geometry, grid, registry, _) = build_borders([2, 1, 1], [3, 3, 3], [0, 0, 0]);
    assert_eq!(registry.len(), 2 * 3 * 3);
    for (_, proxy) in registry.iter() {
        assert_eq!(proxy.source_rank(), 1);
        assert!(proxy.key()[0] == -1 || proxy.key()[0] == 3);
        assert_eq!(
            geometry.overhang_direction(proxy.key()),
            Some(proxy.owner().direction())
        );
    }
    grid.validate_wiring().unwrap();
}

#[test]
fn test_ghost_slots_resolve_to_remote_cells() {
    let (geometry, grid, registry, _) = build_borders([2, 2, 1], [3, 3, 3], [0, 1, 0]);
    for cell in grid.cells() {
        let ijk = cell.ijk();
        for &direction in NeighborDirection::all() {
            let target = direction.apply([ijk[0] as i64, ijk[1] as i64, ijk[2] as i64]);
            match (cell.neighbor(direction), geometry.resolve_local(target)) {
                (CellRef::Local(index), Ok(local)) => assert_eq!(index, grid.flatten(&local)),
                (CellRef::Ghost(proxy), Err(key)) => {
                    let proxy = registry.get(proxy);
                    assert_eq!(proxy.key(), &key);
                    assert_eq!(proxy.remote_cell(), &geometry.remote_local_cell(&key));
                }
                (slot, resolved) => panic!("slot {:?} does not match {:?}", slot, resolved),
            }
        }
    }
}

/// Number of ghost copies every bead should produce: one per neighbor direction across which its cell lies on the boundary
fn expected_ghost_copies(geometry: &SimulationGeometry<f64>, beads: &[cellhalo_lib::Bead<f64>]) -> usize {
    let n = geometry.subdomain_cells();
    let external_axes = geometry.external_axes();
    beads
        .iter()
        .map(|bead| {
            let (_, ijk) = geometry.owner_of_position(&bead.position);
            NeighborDirection::all()
                .iter()
                .filter(|d| external_axes.contains(d.support()))
                .filter(|d| {
                    (0..3).all(|dim| match d.offset()[dim] {
                        1 => ijk[dim] == n[dim] - 1,
                        -1 => ijk[dim] == 0,
                        _ => true,
                    })
                })
                .count()
        })
        .sum()
}

#[test]
fn test_ghost_round_trip() -> Result<(), anyhow::Error> {
    for process_grid in [[2, 1, 1], [2, 2, 1], [2, 2, 2], [3, 1, 2]] {
        let params = unit_params(process_grid, [3, 3, 3]);
        let geometry = SimulationGeometry::new(&params)?;
        let beads = random_beads(&geometry, 400, 0.2, 17);
        let forces = ForceField::dpd(1.0, BondTable::new());

        let result = run_world(&params, &forces, &beads, 2)?;
        assert_eq!(
            result.total_ghost_beads(),
            expected_ghost_copies(&geometry, &result.beads),
            "ghost count mismatch on grid {:?}",
            process_grid
        );
    }
    Ok(())
}

#[test]
fn test_subdomain_accessors() {
    let params = unit_params([2, 1, 1], [3, 3, 3]);
    let geometry = SimulationGeometry::new(&params).unwrap();
    let mut world = ChannelCommunicator::create_world(2, params.comm_timeout);
    let comm = world.remove(1);
    let subdomain = Subdomain::new(&geometry, ForceField::dpd(1.0, BondTable::new()), comm).unwrap();

    assert_eq!(subdomain.rank(), 1);
    assert_eq!(subdomain.process(), &[1, 0, 0]);
    assert_eq!(subdomain.neighbor_ranks(), &[0]);
    assert_eq!(subdomain.registry().len(), 18);
    assert_eq!(subdomain.num_beads(), 0);
    assert_eq!(subdomain.borders().external_regions().count(), 2 + 8 + 8);
}
