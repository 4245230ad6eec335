// Compute passes: one invocation per particle, grouped in workgroups of
// WORKGROUP_SIZE. Neighbors are found by scanning every active particle,
// since no hash grid lives on the device.
use glam::Vec3;
use rayon::prelude::*;

use crate::gpu::buffers::DeviceBuffers;
use crate::gpu::device::{Dispatch, WORKGROUP_SIZE};
use crate::gpu::ffi::{CollisionParams, ComputeParams, GPUParticle, GPUShape, GPUVec4, UpdateParams, from_gpu, to_gpu};
use crate::kernels::{self, PairSample};

pub(crate) fn run(dispatch: &Dispatch, buffers: &mut DeviceBuffers) {
    match dispatch {
        Dispatch::DensityPressure(params) => density_pressure_pass(params, buffers),
        Dispatch::Acceleration(params) => acceleration_pass(params, buffers),
        Dispatch::Integrate(params) => integrate_pass(params, buffers),
        Dispatch::Collide(params, shape) => collide_pass(params, shape, buffers),
    }
}

fn density_pressure_pass(params: &ComputeParams, buffers: &mut DeviceBuffers) {
    let n = params.num_particles as usize;
    let positions = &buffers.positions.as_slice()[..n];
    let particles = &mut buffers.particles.as_mut_slice()[..n];

    particles
        .par_chunks_mut(WORKGROUP_SIZE)
        .enumerate()
        .for_each(|(group, chunk)| {
            for (local, particle) in chunk.iter_mut().enumerate() {
                let index = group * WORKGROUP_SIZE + local;
                density_pressure_main(index, params, positions, particle);
            }
        });
}

fn density_pressure_main(index: usize, params: &ComputeParams, positions: &[GPUVec4], particle: &mut GPUParticle) {
    let pa = from_gpu(positions[index]);
    let mut rho = 0.0;
    for pb in positions {
        let r2 = (pa - from_gpu(*pb)).length_squared();
        rho += kernels::density_weight(&params.kernel, r2);
    }
    let (density, pressure) = kernels::equation_of_state(rho, params.density_reference, params.pressure_constant);
    particle.density = density;
    particle.pressure = pressure;
}

fn acceleration_pass(params: &ComputeParams, buffers: &mut DeviceBuffers) {
    let n = params.num_particles as usize;
    let positions = &buffers.positions.as_slice()[..n];
    let velocities = &buffers.velocities.as_slice()[..n];
    let particles = &buffers.particles.as_slice()[..n];
    let accelerations = &mut buffers.accelerations.as_mut_slice()[..n];

    let sample = |i: usize| PairSample {
        position: from_gpu(positions[i]),
        velocity: from_gpu(velocities[i]),
        mass: particles[i].mass,
        density: particles[i].density,
        pressure: particles[i].pressure,
    };

    accelerations
        .par_chunks_mut(WORKGROUP_SIZE)
        .enumerate()
        .for_each(|(group, chunk)| {
            for (local, out) in chunk.iter_mut().enumerate() {
                let a = sample(group * WORKGROUP_SIZE + local);
                let mut pressure_acc = Vec3::ZERO;
                let mut viscosity_acc = Vec3::ZERO;
                for b in 0..n {
                    if let Some((ap, av)) = kernels::pair_acceleration(&params.kernel, params.viscosity, &a, &sample(b)) {
                        pressure_acc += ap;
                        viscosity_acc += av;
                    }
                }
                let acc = kernels::finish_acceleration(
                    pressure_acc,
                    viscosity_acc,
                    from_gpu(params.gravity),
                    params.max_acceleration,
                );
                *out = to_gpu(acc, 0.0);
            }
        });
}

fn integrate_pass(params: &UpdateParams, buffers: &mut DeviceBuffers) {
    let n = params.num_particles as usize;
    let accelerations = &buffers.accelerations.as_slice()[..n];
    let positions = &mut buffers.positions.as_mut_slice()[..n];
    let velocities = &mut buffers.velocities.as_mut_slice()[..n];

    positions
        .par_chunks_mut(WORKGROUP_SIZE)
        .zip(velocities.par_chunks_mut(WORKGROUP_SIZE))
        .enumerate()
        .for_each(|(group, (pos_chunk, vel_chunk))| {
            for (local, (pos, vel)) in pos_chunk.iter_mut().zip(vel_chunk.iter_mut()).enumerate() {
                let acc = from_gpu(accelerations[group * WORKGROUP_SIZE + local]);
                let (p, v) = kernels::integrate_particle(from_gpu(*pos), from_gpu(*vel), acc, params.delta_time, params.max_velocity);
                *pos = to_gpu(p, 1.0);
                *vel = to_gpu(v, 0.0);
            }
        });
}

fn collide_pass(params: &CollisionParams, shape: &GPUShape, buffers: &mut DeviceBuffers) {
    // validated before submission
    let Some(collider) = shape.to_collider() else {
        return;
    };
    let n = params.num_particles as usize;
    let positions = &mut buffers.positions.as_mut_slice()[..n];
    let velocities = &mut buffers.velocities.as_mut_slice()[..n];

    positions
        .par_chunks_mut(WORKGROUP_SIZE)
        .zip(velocities.par_chunks_mut(WORKGROUP_SIZE))
        .for_each(|(pos_chunk, vel_chunk)| {
            for (pos, vel) in pos_chunk.iter_mut().zip(vel_chunk.iter_mut()) {
                if let Some((p, v)) = collider.resolve(from_gpu(*pos), from_gpu(*vel), params.particle_radius, shape.restitution) {
                    *pos = to_gpu(p, 1.0);
                    *vel = to_gpu(v, 0.0);
                }
            }
        });
}
