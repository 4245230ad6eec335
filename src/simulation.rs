use bevy::log::info;
use bevy::prelude::Resource;
use glam::Vec3;

use crate::backend::{BackendKind, ComputeCapability};
use crate::error::FluidResult;
use crate::generator::ParticleStreamGenerator;
use crate::params::SimulationParameters;
use crate::particles::ParticleBuffers;
use crate::shapes::{Collider, CollisionShapes, ShapeId};
use crate::solver::{DEFAULT_PARTICLE_MASS, SphSolver};

/// A pouring fluid: the particle stream, the solver that moves it and the
/// colliders it hits.
#[derive(Resource)]
pub struct FluidSimulation {
    solver: SphSolver,
    generator: ParticleStreamGenerator,
    shapes: CollisionShapes,
    paused: bool,
}

impl FluidSimulation {
    pub fn new(solver: SphSolver, generator: ParticleStreamGenerator) -> Self {
        Self {
            solver,
            generator,
            shapes: CollisionShapes::new(),
            paused: false,
        }
    }

    /// Default parameters and stream; `particle_count` particles queued for release.
    pub fn with_particles(
        particle_count: usize,
        backend: BackendKind,
        capability: ComputeCapability,
    ) -> FluidResult<Self> {
        let solver = SphSolver::new(SimulationParameters::default(), DEFAULT_PARTICLE_MASS, backend, capability)?;
        let mut generator = ParticleStreamGenerator::default();
        generator.generate(particle_count, true)?;
        Ok(Self::new(solver, generator))
    }

    /// Advances one rendered frame of length `dt` seconds; the step actually
    /// taken is capped at the minimum time step. Does nothing while paused.
    pub fn frame(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.generator.tick();
        let dt = dt.min(self.solver.params().min_time_step());
        let radius = self.generator.particle_radius();
        self.solver
            .step(self.generator.buffers_mut(), dt, radius, self.shapes.as_slice());
    }

    pub fn solver(&self) -> &SphSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut SphSolver {
        &mut self.solver
    }

    pub fn generator(&self) -> &ParticleStreamGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut ParticleStreamGenerator {
        &mut self.generator
    }

    pub fn particles(&self) -> &ParticleBuffers {
        self.generator.buffers()
    }

    pub fn shapes(&self) -> &CollisionShapes {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut CollisionShapes {
        &mut self.shapes
    }

    pub fn add_shape(&mut self, collider: Collider) -> ShapeId {
        self.shapes.add(collider)
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Collider> {
        self.shapes.remove(id)
    }

    pub fn add_bounding_box(&mut self, min: Vec3, max: Vec3) -> [ShapeId; 6] {
        self.shapes.add_bounding_box(min, max)
    }

    pub fn set_check_bounds(&mut self, check: bool) -> bool {
        self.shapes.set_check_bounds(check)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if paused != self.paused {
            info!("fluid simulation {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    /// Changes how many particles the stream pours, keeping those already released.
    pub fn set_target_count(&mut self, total: usize) -> FluidResult<()> {
        self.generator.generate(total, false)
    }

    /// Drops every particle and pours `total` from scratch.
    pub fn regenerate(&mut self, total: usize) -> FluidResult<()> {
        self.generator.generate(total, true)
    }
}
