// One solver contract, two execution strategies.
use bevy::log::{info, warn};
use bevy::prelude::Resource;
use glam::Vec3;

use crate::cpu::sequential::SequentialBackend;
use crate::cpu::spatial_hash::SpatialHashGrid;
use crate::error::FluidResult;
use crate::gpu::parallel::ParallelBackend;
use crate::kernels::KernelConstants;
use crate::particles::{FieldView, ParticleState};
use crate::params::SimulationParameters;
use crate::shapes::Collider;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Scalar loops over host arrays with hash-grid neighbor pruning.
    #[default]
    Sequential,
    /// Per-particle compute dispatches over device buffers.
    Parallel,
}

/// What the host environment can run; provided by the rendering side.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputeCapability {
    pub parallel_compute: bool,
}

/// Uniform inputs of one frame, shared by every phase.
#[derive(Clone, Copy, Debug)]
pub struct StepContext {
    pub kernel: KernelConstants,
    pub density_reference: f32,
    pub pressure_constant: f32,
    pub viscosity: f32,
    pub gravity: Vec3,
    pub max_velocity: f32,
    pub max_acceleration: f32,
    pub restitution: f32,
    pub dt: f32,
    pub particle_radius: f32,
}

impl StepContext {
    pub fn new(params: &SimulationParameters, kernel: KernelConstants, dt: f32, particle_radius: f32) -> Self {
        Self {
            kernel,
            density_reference: params.density_reference(),
            pressure_constant: params.pressure_constant(),
            viscosity: params.viscosity(),
            gravity: params.gravity(),
            max_velocity: params.max_velocity(),
            max_acceleration: params.max_acceleration(),
            restitution: params.collision_restitution(),
            dt,
            particle_radius,
        }
    }
}

/// The three solver phases plus the collision pass.
///
/// Phases must be called in order between `begin_frame` and `end_frame`:
/// density/pressure, acceleration, integrate, collisions. A strategy may defer
/// work until `end_frame`; only after it returns `Ok` are `field` and
/// `states()` guaranteed to hold the frame's results.
pub trait ComputeBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Makes room for `capacity` particles; new slots get `mass`.
    fn reserve(&mut self, capacity: usize, mass: f32);

    /// Rewrites the mass of every particle.
    fn set_mass(&mut self, mass: f32);

    /// New neighbor cell spacing after the smoothing radius changed.
    fn set_smoothing_radius(&mut self, h: f32);

    fn begin_frame(&mut self, field: &FieldView<'_>, ctx: &StepContext);

    fn compute_density_pressure(&mut self, field: &mut FieldView<'_>, ctx: &StepContext);

    fn compute_acceleration(&mut self, field: &mut FieldView<'_>, ctx: &StepContext);

    fn integrate(&mut self, field: &mut FieldView<'_>, ctx: &StepContext);

    /// `shapes` is a snapshot taken at the start of the pass; disabled colliders are already removed.
    fn resolve_collisions(&mut self, field: &mut FieldView<'_>, ctx: &StepContext, shapes: &[Collider]);

    /// Synchronization point. On error the host field keeps its previous contents.
    fn end_frame(&mut self, field: &mut FieldView<'_>) -> FluidResult<()>;

    /// Per-particle derived state as of the last completed phase or frame.
    fn states(&self) -> &[ParticleState];

    /// The neighbor grid, for strategies that keep one.
    fn neighbor_grid(&self) -> Option<&SpatialHashGrid> {
        None
    }
}

/// Picks the strategy to run. A parallel request on a host without parallel
/// compute, or whose device cannot be created, gets the sequential one.
pub fn select_backend(
    requested: BackendKind,
    capability: ComputeCapability,
    smoothing_radius: f32,
    capacity: usize,
    mass: f32,
) -> Box<dyn ComputeBackend> {
    let sequential = || -> Box<dyn ComputeBackend> {
        Box::new(SequentialBackend::new(smoothing_radius, capacity, mass))
    };

    match requested {
        BackendKind::Sequential => {
            info!("SPH backend: sequential");
            sequential()
        }
        BackendKind::Parallel if !capability.parallel_compute => {
            warn!("parallel compute requested but not available; using sequential backend");
            sequential()
        }
        BackendKind::Parallel => match ParallelBackend::new(capacity, mass) {
            Ok(backend) => {
                info!("SPH backend: parallel ({} workers)", backend.worker_count());
                Box::new(backend)
            }
            Err(err) => {
                warn!("{err}; using sequential backend");
                sequential()
            }
        },
    }
}
