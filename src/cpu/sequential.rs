// SPH in 3D on the host: scalar loops, hash-grid neighbor pruning.
use glam::Vec3;

use crate::backend::{BackendKind, ComputeBackend, StepContext};
use crate::cpu::spatial_hash::SpatialHashGrid;
use crate::error::FluidResult;
use crate::kernels::{self, PairSample};
use crate::particles::{FieldView, ParticleState};
use crate::shapes::Collider;

pub struct SequentialBackend {
    grid: SpatialHashGrid,
    particles: Vec<ParticleState>,
    neighbors: Vec<usize>, // reused query output
    acc_scratch: Vec<Vec3>,
}

impl SequentialBackend {
    pub fn new(smoothing_radius: f32, capacity: usize, mass: f32) -> Self {
        Self {
            grid: SpatialHashGrid::new(smoothing_radius, capacity),
            particles: vec![ParticleState::new(mass); capacity],
            neighbors: Vec::new(),
            acc_scratch: Vec::with_capacity(capacity),
        }
    }
}

impl ComputeBackend for SequentialBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn reserve(&mut self, capacity: usize, mass: f32) {
        if capacity > self.particles.len() {
            self.particles.resize(capacity, ParticleState::new(mass));
        }
        if capacity > self.grid.max_particles() {
            self.grid = SpatialHashGrid::new(self.grid.spacing(), capacity);
        }
    }

    fn set_mass(&mut self, mass: f32) {
        for p in &mut self.particles {
            p.mass = mass;
        }
    }

    fn set_smoothing_radius(&mut self, h: f32) {
        self.grid = SpatialHashGrid::new(h, self.grid.max_particles());
    }

    fn begin_frame(&mut self, field: &FieldView<'_>, _ctx: &StepContext) {
        self.grid.rebuild(&*field.positions, field.len());
    }

    fn compute_density_pressure(&mut self, field: &mut FieldView<'_>, ctx: &StepContext) {
        let k = &ctx.kernel;
        let positions = &*field.positions;

        for a in 0..field.len() {
            let pos_a = positions[a];
            self.grid.query(positions, a, k.h, &mut self.neighbors);

            let mut rho = 0.0;
            for &b in &self.neighbors {
                let r2 = (pos_a - positions[b]).length_squared();
                rho += kernels::density_weight(k, r2);
            }

            let (density, pressure) = kernels::equation_of_state(rho, ctx.density_reference, ctx.pressure_constant);
            let particle = &mut self.particles[a];
            particle.density = density;
            particle.pressure = pressure;
        }
    }

    fn compute_acceleration(&mut self, field: &mut FieldView<'_>, ctx: &StepContext) {
        let k = &ctx.kernel;
        let positions = &*field.positions;
        let velocities = &*field.velocities;
        let sample = |i: usize| {
            let p = &self.particles[i];
            PairSample {
                position: positions[i],
                velocity: velocities[i],
                mass: p.mass,
                density: p.density,
                pressure: p.pressure,
            }
        };

        self.acc_scratch.clear();
        for a in 0..positions.len() {
            let sample_a = sample(a);
            self.grid.query(positions, a, k.h, &mut self.neighbors);

            let mut pressure_acc = Vec3::ZERO;
            let mut viscosity_acc = Vec3::ZERO;
            for &b in &self.neighbors {
                if let Some((ap, av)) = kernels::pair_acceleration(k, ctx.viscosity, &sample_a, &sample(b)) {
                    pressure_acc += ap;
                    viscosity_acc += av;
                }
            }

            self.acc_scratch.push(kernels::finish_acceleration(
                pressure_acc,
                viscosity_acc,
                ctx.gravity,
                ctx.max_acceleration,
            ));
        }

        for (particle, acc) in self.particles.iter_mut().zip(&self.acc_scratch) {
            particle.acceleration = *acc;
        }
    }

    fn integrate(&mut self, field: &mut FieldView<'_>, ctx: &StepContext) {
        for ((pos, vel), particle) in field.positions.iter_mut().zip(field.velocities.iter_mut()).zip(&self.particles) {
            (*pos, *vel) = kernels::integrate_particle(*pos, *vel, particle.acceleration, ctx.dt, ctx.max_velocity);
        }
    }

    fn resolve_collisions(&mut self, field: &mut FieldView<'_>, ctx: &StepContext, shapes: &[Collider]) {
        for shape in shapes {
            for (pos, vel) in field.positions.iter_mut().zip(field.velocities.iter_mut()) {
                if let Some((p, v)) = shape.resolve(*pos, *vel, ctx.particle_radius, ctx.restitution) {
                    *pos = p;
                    *vel = v;
                }
            }
        }
    }

    fn end_frame(&mut self, _field: &mut FieldView<'_>) -> FluidResult<()> {
        Ok(())
    }

    fn states(&self) -> &[ParticleState] {
        &self.particles
    }

    fn neighbor_grid(&self) -> Option<&SpatialHashGrid> {
        Some(&self.grid)
    }
}
