use bevy_verlet_particles::cpu::verlet::*;
use criterion::{criterion_group, criterion_main, Criterion};
use glam::{Vec3, Vec4};

fn bench_step(c: &mut Criterion) {
    let mut sim = ParticleSim::from_grid(128, Vec4::ONE, SimConfig::default())
        .expect("grid seed is never empty");

    let input = FrameInput {
        pointer_down: true,
        pointer_pos: Vec3::new(64.0, 64.0, 0.0),
        force: 150.0,
        blend: 0.0,
    };

    c.bench_function("step_16k", |b| b.iter(|| sim.step(&input)));
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
