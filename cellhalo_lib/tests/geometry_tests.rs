use cellhalo_lib::topology::Axis;
use cellhalo_lib::{ConfigurationError, HaloParameters, NeighborDirection, SimulationGeometry};

use nalgebra::Vector3;

fn geometry(process_grid: [usize; 3], cells: [usize; 3]) -> SimulationGeometry<f64> {
    SimulationGeometry::new(&HaloParameters::new_cubic(process_grid, cells, 1.0)).unwrap()
}

#[test]
fn test_invalid_parameters() {
    let params = HaloParameters::new_cubic([2, 0, 1], [3, 3, 3], 1.0f64);
    assert_eq!(
        SimulationGeometry::new(&params).unwrap_err(),
        ConfigurationError::InvalidProcessGrid([2, 0, 1])
    );

    let params = HaloParameters::new_cubic([1, 1, 1], [3, 2, 3], 1.0f64);
    assert_eq!(
        SimulationGeometry::new(&params).unwrap_err(),
        ConfigurationError::TooFewCells {
            axis: Axis::Y,
            cells: 2
        }
    );

    let mut params = HaloParameters::new_cubic([1, 1, 1], [3, 3, 3], 1.0f64);
    params.cell_width[2] = 0.5;
    assert!(matches!(
        SimulationGeometry::new(&params),
        Err(ConfigurationError::InvalidCutoff { .. })
    ));

    let mut params = HaloParameters::new_cubic([1, 1, 1], [3, 3, 3], 1.0f64);
    params.cell_width[0] = -1.0;
    assert!(matches!(
        SimulationGeometry::new(&params),
        Err(ConfigurationError::InvalidCellWidth { axis: Axis::X, .. })
    ));

    let mut params = HaloParameters::new_cubic([1, 1, 1], [3, 3, 3], 1.0f64);
    params.time_step = 0.0;
    assert_eq!(
        SimulationGeometry::new(&params).unwrap_err(),
        ConfigurationError::InvalidTimeStep(0.0)
    );
}

#[test]
fn test_ranks_and_neighbors() {
    let geometry = geometry([3, 1, 2], [3, 3, 3]);
    assert_eq!(geometry.num_processes(), 6);
    for rank in 0..6 {
        assert_eq!(geometry.rank_of(&geometry.coord_of(rank)), rank);
    }

    // Along x the two neighbors differ, along z both directions reach the same process
    assert_eq!(geometry.neighbor_ranks(&[0, 0, 0]), vec![1, 2, 3, 4, 5]);
    let px = NeighborDirection::new([1, 0, 0]).unwrap();
    let nz = NeighborDirection::new([0, 0, -1]).unwrap();
    assert_eq!(geometry.neighbor_rank(&[2, 0, 1], px), geometry.rank_of(&[0, 0, 1]));
    assert_eq!(geometry.neighbor_rank(&[0, 0, 0], nz), geometry.rank_of(&[0, 0, 1]));

    let geometry = geometry_single();
    assert!(geometry.neighbor_ranks(&[0, 0, 0]).is_empty());
}

fn geometry_single() -> SimulationGeometry<f64> {
    geometry([1, 1, 1], [3, 3, 3])
}

#[test]
fn test_periodic_box() {
    let geometry = geometry([2, 1, 1], [3, 4, 3]);
    assert_eq!(geometry.box_lengths(), &Vector3::new(6.0, 4.0, 3.0));
    assert_eq!(geometry.global_cells(), [6, 4, 3]);

    let wrapped = geometry.wrap_position(&Vector3::new(-0.5, 4.25, 7.0));
    assert!((wrapped - Vector3::new(5.5, 0.25, 1.0)).norm() < 1e-12);

    let image = geometry.minimum_image(&Vector3::new(5.5, -3.5, 1.0));
    assert!((image - Vector3::new(-0.5, 0.5, 1.0)).norm() < 1e-12);

    let (owner, local) = geometry.owner_of_position(&Vector3::new(3.5, 0.5, 2.5));
    assert_eq!(owner, [1, 0, 0]);
    assert_eq!(local, [0, 0, 2]);

    assert!(geometry.are_adjacent_global_cells(&[0, 0, 0], &[5, 3, 2]));
    assert!(!geometry.are_adjacent_global_cells(&[0, 0, 0], &[2, 0, 0]));
}

#[test]
fn test_resolve_local() {
    let geometry = geometry([2, 1, 1], [3, 3, 3]);
    assert_eq!(geometry.resolve_local([1, 2, 0]), Ok([1, 2, 0]));
    // y and z wrap locally
    assert_eq!(geometry.resolve_local([1, 3, -1]), Ok([1, 0, 2]));
    // x belongs to the neighbor
    assert_eq!(geometry.resolve_local([3, -1, 1]), Err([3, 2, 1]));
    assert_eq!(
        geometry.overhang_direction(&[3, 2, 1]),
        NeighborDirection::new([1, 0, 0])
    );
    assert_eq!(geometry.remote_local_cell(&[-1, 2, 1]), [2, 2, 1]);
}

#[test]
fn test_single_process_equivalent() {
    let params = HaloParameters::new_cubic([2, 3, 1], [3, 4, 5], 0.5f64);
    let single = params.single_process_equivalent();
    assert_eq!(single.process_grid, [1, 1, 1]);
    assert_eq!(single.subdomain_cells, [6, 12, 5]);

    let a = SimulationGeometry::new(&params).unwrap();
    let b = SimulationGeometry::new(&single).unwrap();
    assert_eq!(a.box_lengths(), b.box_lengths());

    let converted = params.try_convert::<f32>().unwrap();
    assert_eq!(converted.cutoff, 0.5f32);
}
