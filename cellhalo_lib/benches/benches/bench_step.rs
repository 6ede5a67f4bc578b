use cellhalo_lib::world::random_beads;
use cellhalo_lib::{
    BondTable, ChannelCommunicator, ForceField, HaloParameters, SimulationGeometry, Subdomain,
};
use criterion::{Criterion, criterion_group};
use std::time::Duration;

static DENSITY: f64 = 3.0;

pub fn single_process_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("single process step");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(10));

    for cells in [8, 16] {
        let params = HaloParameters::new_cubic([1, 1, 1], [cells; 3], 1.0f64);
        let geometry = SimulationGeometry::new(&params).unwrap();
        let n_beads = (DENSITY * (cells * cells * cells) as f64) as usize;
        let beads = random_beads(&geometry, n_beads, 0.5, 1);

        let comm = ChannelCommunicator::create_world(1, None).pop().unwrap();
        let mut subdomain =
            Subdomain::new(&geometry, ForceField::dpd(1.0, BondTable::new()), comm).unwrap();
        subdomain.insert_owned_beads(&beads);

        group.bench_function(format!("step_{}_cells", cells), |b| {
            b.iter(|| subdomain.step().unwrap())
        });
    }

    group.finish();
}

criterion_group!(bench_step, single_process_step);
