use bevy::log::debug;

use crate::backend::{BackendKind, ComputeBackend, StepContext};
use crate::error::{FluidError, FluidResult};
use crate::gpu::buffers::DeviceBuffers;
use crate::gpu::device::{ComputeDevice, Dispatch, workgroup_count};
use crate::gpu::ffi::{CollisionParams, ComputeParams, GPUShape, UpdateParams, from_gpu, to_gpu};
use crate::particles::{FieldView, ParticleState};
use crate::shapes::Collider;

/// Data-parallel strategy: state is uploaded at `begin_frame`, every phase
/// records a dispatch, and results come back at `end_frame`.
pub struct ParallelBackend {
    device: ComputeDevice,
    buffers: DeviceBuffers,
    host_states: Vec<ParticleState>,
    num_particles: u32,
    // upload failure, reported at the next synchronization point
    fault: Option<FluidError>,
}

impl ParallelBackend {
    pub fn new(capacity: usize, mass: f32) -> FluidResult<Self> {
        Ok(Self {
            device: ComputeDevice::new()?,
            buffers: DeviceBuffers::new(capacity, mass),
            host_states: vec![ParticleState::new(mass); capacity],
            num_particles: 0,
            fault: None,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.device.worker_count()
    }

    /// Dispatches recorded but not yet submitted.
    pub fn pending_dispatches(&self) -> usize {
        self.device.pending()
    }

    fn upload(&mut self, field: &FieldView<'_>) -> FluidResult<()> {
        let n = field.len();
        let positions = self.buffers.positions.range_mut(0, n)?;
        for (dst, p) in positions.iter_mut().zip(field.positions.iter()) {
            *dst = to_gpu(*p, 1.0);
        }
        let velocities = self.buffers.velocities.range_mut(0, n)?;
        for (dst, v) in velocities.iter_mut().zip(field.velocities.iter()) {
            *dst = to_gpu(*v, 0.0);
        }
        Ok(())
    }

    fn read_back(&mut self, field: &mut FieldView<'_>) {
        let n = field.len();
        let positions = &self.buffers.positions.as_slice()[..n];
        let velocities = &self.buffers.velocities.as_slice()[..n];
        for (dst, src) in field.positions.iter_mut().zip(positions) {
            *dst = from_gpu(*src);
        }
        for (dst, src) in field.velocities.iter_mut().zip(velocities) {
            *dst = from_gpu(*src);
        }

        let particles = self.buffers.particles.as_slice();
        let accelerations = self.buffers.accelerations.as_slice();
        for ((state, gpu), acc) in self.host_states.iter_mut().zip(particles).zip(accelerations).take(n) {
            state.mass = gpu.mass;
            state.density = gpu.density;
            state.pressure = gpu.pressure;
            state.acceleration = from_gpu(*acc);
        }
    }
}

impl ComputeBackend for ParallelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Parallel
    }

    fn reserve(&mut self, capacity: usize, mass: f32) {
        if capacity > self.buffers.capacity() {
            debug!("device buffers grown {} -> {capacity}", self.buffers.capacity());
            self.buffers.grow(capacity, mass);
        }
        if capacity > self.host_states.len() {
            self.host_states.resize(capacity, ParticleState::new(mass));
        }
    }

    fn set_mass(&mut self, mass: f32) {
        self.buffers.set_mass(mass);
        for state in &mut self.host_states {
            state.mass = mass;
        }
    }

    // kernel constants travel in every dispatch's uniform block
    fn set_smoothing_radius(&mut self, _h: f32) {}

    fn begin_frame(&mut self, field: &FieldView<'_>, _ctx: &StepContext) {
        self.device.discard();
        self.num_particles = field.len() as u32;
        if let Err(err) = self.upload(field) {
            self.fault = Some(err);
        }
    }

    fn compute_density_pressure(&mut self, _field: &mut FieldView<'_>, ctx: &StepContext) {
        self.device.enqueue(Dispatch::DensityPressure(ComputeParams::new(ctx, self.num_particles)));
    }

    fn compute_acceleration(&mut self, _field: &mut FieldView<'_>, ctx: &StepContext) {
        self.device.enqueue(Dispatch::Acceleration(ComputeParams::new(ctx, self.num_particles)));
    }

    fn integrate(&mut self, _field: &mut FieldView<'_>, ctx: &StepContext) {
        self.device.enqueue(Dispatch::Integrate(UpdateParams {
            delta_time: ctx.dt,
            max_velocity: ctx.max_velocity,
            num_particles: self.num_particles,
            _pad: 0,
        }));
    }

    fn resolve_collisions(&mut self, _field: &mut FieldView<'_>, ctx: &StepContext, shapes: &[Collider]) {
        let params = CollisionParams {
            particle_radius: ctx.particle_radius,
            num_particles: self.num_particles,
            _pad: [0; 2],
        };
        for shape in shapes {
            self.device.enqueue(Dispatch::Collide(params, GPUShape::from_collider(shape, ctx.restitution)));
        }
    }

    fn end_frame(&mut self, field: &mut FieldView<'_>) -> FluidResult<()> {
        if let Some(err) = self.fault.take() {
            self.device.discard();
            return Err(err);
        }
        debug!(
            "submitting {} dispatches, {} workgroups each",
            self.device.pending(),
            workgroup_count(self.num_particles as usize)
        );
        self.device.submit(&mut self.buffers)?;
        self.read_back(field);
        Ok(())
    }

    fn states(&self) -> &[ParticleState] {
        &self.host_states
    }
}
