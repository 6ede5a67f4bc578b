pub mod bench_step;
pub mod bench_world;
