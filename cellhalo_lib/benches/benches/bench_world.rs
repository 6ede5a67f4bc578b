use cellhalo_lib::world::{random_beads, reference_forces, run_world};
use cellhalo_lib::{BondTable, ForceField, HaloParameters, SimulationGeometry};
use criterion::{Criterion, criterion_group};
use std::time::Duration;

static DENSITY: f64 = 3.0;
static STEPS: usize = 10;

pub fn decomposed_world(c: &mut Criterion) {
    let mut group = c.benchmark_group("decomposed world");
    group.sample_size(10);
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(20));

    // The same 12x12x12 box split in different ways
    for (process_grid, cells) in [
        ([1, 1, 1], [12, 12, 12]),
        ([2, 1, 1], [6, 12, 12]),
        ([2, 2, 2], [6, 6, 6]),
        ([4, 2, 2], [3, 6, 6]),
    ] {
        let params = HaloParameters::new_cubic(process_grid, cells, 1.0f64);
        let geometry = SimulationGeometry::new(&params).unwrap();
        let n_beads = (DENSITY * 12.0 * 12.0 * 12.0) as usize;
        let beads = random_beads(&geometry, n_beads, 0.5, 2);
        let forces = ForceField::dpd(1.0, BondTable::new());

        let name = format!(
            "run_world_{}x{}x{}",
            process_grid[0], process_grid[1], process_grid[2]
        );
        group.bench_function(name, |b| {
            b.iter(|| run_world(&params, &forces, &beads, STEPS).unwrap())
        });
    }

    group.finish();
}

pub fn brute_force_reference(c: &mut Criterion) {
    let params = HaloParameters::new_cubic([1, 1, 1], [6, 6, 6], 1.0f64);
    let geometry = SimulationGeometry::new(&params).unwrap();
    let beads = random_beads(&geometry, (DENSITY * 216.0) as usize, 0.5, 3);
    let forces = ForceField::dpd(1.0, BondTable::new());

    let mut group = c.benchmark_group("reference forces");
    group.sample_size(20);
    group.bench_function("reference_forces_648_beads", |b| {
        b.iter(|| reference_forces(&geometry, &forces, &beads))
    });
    group.finish();
}

criterion_group!(bench_world, decomposed_world, brute_force_reference);
