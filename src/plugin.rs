use bevy::log::{error, info};
use bevy::prelude::{App, Commands, IntoScheduleConfigs, Plugin, Res, ResMut, Resource, Startup, SystemSet, Time, Update};
use glam::Vec3;

use crate::backend::{BackendKind, ComputeCapability};
use crate::error::FluidResult;
use crate::generator::{DEFAULT_PARTICLE_RADIUS, DEFAULT_SEED, ParticleStreamGenerator};
use crate::params::SimulationParameters;
use crate::simulation::FluidSimulation;
use crate::solver::{DEFAULT_PARTICLE_MASS, SphSolver};

// ==================== resources ======================================

/// Startup configuration of the fluid. Kept as a resource so the simulation
/// can be built once the rendering side has reported its `ComputeCapability`.
#[derive(Resource, Clone, Debug)]
pub struct FluidPlugin {
    pub backend: BackendKind,
    pub params: SimulationParameters,
    pub particle_count: usize,
    pub particle_radius: f32,
    pub mass: f32,
    pub origin: Vec3,
    pub seed: u64,
    /// Inward-facing container walls, as (min, max) corners.
    pub bounds: Option<(Vec3, Vec3)>,
}

impl Default for FluidPlugin {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sequential,
            params: SimulationParameters::default(),
            particle_count: 5_000,
            particle_radius: DEFAULT_PARTICLE_RADIUS,
            mass: DEFAULT_PARTICLE_MASS,
            origin: Vec3::ZERO,
            seed: DEFAULT_SEED,
            bounds: Some((Vec3::splat(-1.0), Vec3::splat(1.0))),
        }
    }
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FluidSet {
    /// Every particle write of the frame happens in here; read positions after it.
    Simulate,
}

// =====================================================================

// ========================== systems ==================================

fn init_fluid_simulation(
    mut commands: Commands,
    settings: Res<FluidPlugin>,
    capability: Option<Res<ComputeCapability>>,
) {
    // no report from the renderer means no parallel compute
    let capability = capability.map(|c| *c).unwrap_or_default();
    match build_simulation(&settings, capability) {
        Ok(simulation) => {
            info!(
                "fluid simulation ready: {} particles, {:?} backend",
                settings.particle_count,
                simulation.solver().backend_kind()
            );
            commands.insert_resource(simulation);
        }
        Err(err) => error!("fluid simulation not created: {err}"),
    }
}

fn build_simulation(settings: &FluidPlugin, capability: ComputeCapability) -> FluidResult<FluidSimulation> {
    let solver = SphSolver::new(settings.params, settings.mass, settings.backend, capability)?;
    let mut generator = ParticleStreamGenerator::new(settings.particle_radius)?;
    generator.reseed(settings.seed);
    generator.set_origin(settings.origin);
    generator.generate(settings.particle_count, true)?;

    let mut simulation = FluidSimulation::new(solver, generator);
    if let Some((min, max)) = settings.bounds {
        simulation.add_bounding_box(min, max);
    }
    Ok(simulation)
}

fn step_fluid_simulation(time: Res<Time>, simulation: Option<ResMut<FluidSimulation>>) {
    let Some(mut simulation) = simulation else {
        return;
    };
    simulation.frame(time.delta_secs());
}

// =====================================================================

impl Plugin for FluidPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.clone())
            .configure_sets(Update, FluidSet::Simulate)
            .add_systems(Startup, init_fluid_simulation)
            .add_systems(Update, step_fluid_simulation.in_set(FluidSet::Simulate));
    }
}
