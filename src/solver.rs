use bevy::log::{error, warn};
use glam::Vec3;

use crate::backend::{BackendKind, ComputeBackend, ComputeCapability, StepContext, select_backend};
use crate::cpu::sequential::SequentialBackend;
use crate::error::{FluidResult, require_positive};
use crate::kernels::KernelConstants;
use crate::params::{SimulationParameters, logged};
use crate::particles::{FieldView, ParticleBuffers, ParticleState};
use crate::shapes::Collider;

pub const DEFAULT_PARTICLE_MASS: f32 = 1.0;

/// Advances a particle field by one step at a time.
///
/// Owns the parameters, the kernel constants derived from them and the
/// execution strategy. Positions and velocities stay with the caller.
pub struct SphSolver {
    params: SimulationParameters,
    kernel: KernelConstants,
    mass: f32,
    backend: Box<dyn ComputeBackend>,
    // uniform inputs of the frame in flight
    frame_dt: f32,
    frame_radius: f32,
    shape_snapshot: Vec<Collider>,
}

impl SphSolver {
    pub fn new(
        params: SimulationParameters,
        mass: f32,
        backend: BackendKind,
        capability: ComputeCapability,
    ) -> FluidResult<Self> {
        params.validate()?;
        let mass = logged(require_positive("particle mass", mass))?;
        let kernel = KernelConstants::new(params.smoothing_radius());
        Ok(Self {
            backend: select_backend(backend, capability, params.smoothing_radius(), 0, mass),
            params,
            kernel,
            mass,
            frame_dt: 0.0,
            frame_radius: 0.0,
            shape_snapshot: Vec::new(),
        })
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn kernel_constants(&self) -> &KernelConstants {
        &self.kernel
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Density, pressure and acceleration of every slot, as of the last frame.
    pub fn particle_states(&self) -> &[ParticleState] {
        self.backend.states()
    }

    // ---- configuration ----

    /// Swaps in a whole parameter set. Rejected sets leave the current one in place.
    pub fn set_parameters(&mut self, params: SimulationParameters) -> FluidResult<()> {
        logged(params.validate())?;
        let radius_changed = params.smoothing_radius() != self.params.smoothing_radius();
        self.params = params;
        if radius_changed {
            self.smoothing_radius_changed();
        }
        Ok(())
    }

    pub fn set_smoothing_radius(&mut self, h: f32) -> FluidResult<()> {
        self.params.set_smoothing_radius(h)?;
        self.smoothing_radius_changed();
        Ok(())
    }

    fn smoothing_radius_changed(&mut self) {
        let h = self.params.smoothing_radius();
        self.kernel = KernelConstants::new(h);
        self.backend.set_smoothing_radius(h);
    }

    pub fn set_density_reference(&mut self, rho_0: f32) -> FluidResult<()> {
        self.params.set_density_reference(rho_0)
    }

    pub fn set_pressure_constant(&mut self, k: f32) -> FluidResult<()> {
        self.params.set_pressure_constant(k)
    }

    pub fn set_viscosity(&mut self, mu: f32) -> FluidResult<()> {
        self.params.set_viscosity(mu)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) -> FluidResult<()> {
        self.params.set_gravity(gravity)
    }

    pub fn set_max_velocity(&mut self, v: f32) -> FluidResult<()> {
        self.params.set_max_velocity(v)
    }

    pub fn set_max_acceleration(&mut self, a: f32) -> FluidResult<()> {
        self.params.set_max_acceleration(a)
    }

    pub fn set_min_time_step(&mut self, dt: f32) -> FluidResult<()> {
        self.params.set_min_time_step(dt)
    }

    pub fn set_collision_restitution(&mut self, e: f32) -> FluidResult<()> {
        self.params.set_collision_restitution(e)
    }

    /// Rewrites the mass of every particle, active or not.
    pub fn set_mass(&mut self, mass: f32) -> FluidResult<()> {
        self.mass = logged(require_positive("particle mass", mass))?;
        self.backend.set_mass(self.mass);
        Ok(())
    }

    // ---- phases ----

    fn context(&self) -> StepContext {
        StepContext::new(&self.params, self.kernel, self.frame_dt, self.frame_radius)
    }

    /// Opens a frame: rebuilds the neighbor index (or uploads the field).
    pub fn begin_frame(&mut self, field: &FieldView<'_>, dt: f32, particle_radius: f32) {
        self.frame_dt = dt;
        self.frame_radius = particle_radius;
        self.backend.reserve(field.len(), self.mass);
        let ctx = self.context();
        self.backend.begin_frame(field, &ctx);
    }

    pub fn compute_density_pressure(&mut self, field: &mut FieldView<'_>) {
        let ctx = self.context();
        self.backend.compute_density_pressure(field, &ctx);
    }

    pub fn compute_acceleration(&mut self, field: &mut FieldView<'_>) {
        let ctx = self.context();
        self.backend.compute_acceleration(field, &ctx);
    }

    pub fn integrate(&mut self, field: &mut FieldView<'_>, dt: f32) {
        self.frame_dt = dt;
        let ctx = self.context();
        self.backend.integrate(field, &ctx);
    }

    /// Snapshots the enabled shapes once, then resolves every particle against them.
    pub fn resolve_collisions(&mut self, field: &mut FieldView<'_>, particle_radius: f32, shapes: &[Collider]) {
        self.frame_radius = particle_radius;
        let ctx = self.context();
        self.shape_snapshot.clear();
        self.shape_snapshot.extend(shapes.iter().filter(|s| !s.disabled).copied());
        self.backend.resolve_collisions(field, &ctx, &self.shape_snapshot);
    }

    pub fn end_frame(&mut self, field: &mut FieldView<'_>) -> FluidResult<()> {
        self.backend.end_frame(field)
    }

    /// One full frame over the active particles. A frame the backend fails to
    /// complete is dropped (the buffers keep their previous values) and the
    /// solver continues on the sequential strategy.
    pub fn step(&mut self, particles: &mut ParticleBuffers, dt: f32, particle_radius: f32, shapes: &[Collider]) {
        let usable = dt.is_finite() && dt > 0.0 && particle_radius.is_finite() && particle_radius >= 0.0;
        if !usable {
            warn!("skipping step with dt {dt} and particle radius {particle_radius}");
            return;
        }

        let capacity = particles.capacity();
        self.backend.reserve(capacity, self.mass);
        let mut field = particles.view_mut();
        if field.is_empty() {
            return;
        }

        self.begin_frame(&field, dt, particle_radius);
        self.compute_density_pressure(&mut field);
        self.compute_acceleration(&mut field);
        self.integrate(&mut field, dt);
        self.resolve_collisions(&mut field, particle_radius, shapes);

        if let Err(err) = self.end_frame(&mut field) {
            error!("{:?} backend failed, frame dropped: {err}", self.backend.kind());
            self.fall_back_to_sequential(capacity);
        }
    }

    fn fall_back_to_sequential(&mut self, capacity: usize) {
        if self.backend.kind() == BackendKind::Sequential {
            return;
        }
        warn!("switching to the sequential backend");
        self.backend = Box::new(SequentialBackend::new(self.params.smoothing_radius(), capacity, self.mass));
    }
}
