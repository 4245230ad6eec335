use bevy_sph_pour::backend::{BackendKind, ComputeCapability};
use bevy_sph_pour::params::SimulationParameters;
use bevy_sph_pour::particles::ParticleBuffers;
use bevy_sph_pour::shapes::{Collider, CollisionShapes};
use bevy_sph_pour::solver::SphSolver;
use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Quat, Vec3};

fn block(n: usize, spacing: f32) -> ParticleBuffers {
    let mut positions = Vec::with_capacity(n * n * n);
    for x in 0..n {
        for y in 0..n {
            for z in 0..n {
                positions.push(Vec3::new(x as f32, y as f32 + 0.5, z as f32) * spacing - Vec3::new(0.5, 0.0, 0.5));
            }
        }
    }
    let velocities = vec![Vec3::ZERO; positions.len()];
    ParticleBuffers::from_particles(positions, velocities).unwrap()
}

fn bench_step(c: &mut Criterion) {
    let h = 0.1;
    let spacing = 0.05; // spacing < h for overlap
    let rho_0 = 1000.0;
    let k = 4.0;
    let mu = 0.005;
    let params = SimulationParameters::new(h, rho_0, k, mu).unwrap();

    let mut shapes = CollisionShapes::new();
    shapes.add_bounding_box(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
    shapes.add(Collider::sphere(0.2).unwrap().with_transform(Vec3::new(0.0, 0.2, 0.0), Quat::IDENTITY));

    for (name, backend, n) in [
        ("sequential_step_8k", BackendKind::Sequential, 20),
        ("parallel_step_1k", BackendKind::Parallel, 10),
    ] {
        let capability = ComputeCapability { parallel_compute: true };
        let mut solver = SphSolver::new(params, 1.0, backend, capability).unwrap();
        let mut particles = block(n, spacing);
        c.bench_function(name, |b| b.iter(|| solver.step(&mut particles, 0.001, 0.02, shapes.as_slice())));
    }
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
