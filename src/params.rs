use bevy::log::warn;
use bevy::prelude::Resource;
use glam::Vec3;

use crate::error::{FluidError, FluidResult, require_non_negative, require_positive};

pub const DEFAULT_SMOOTHING_RADIUS: f32 = 0.2;
pub const DEFAULT_DENSITY_REFERENCE: f32 = 20_000.0;
pub const DEFAULT_PRESSURE_CONSTANT: f32 = 4.0;
pub const DEFAULT_VISCOSITY: f32 = 0.005;
pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);
pub const MAX_VELOCITY: f32 = 75.0;
pub const MAX_ACCELERATION: f32 = 2000.0;
pub const MIN_TIME_STEP: f32 = 1.0 / 100.0;
pub const SHAPE_COLLISION_RESTITUTION: f32 = 0.6;

/// Runtime configuration of the solver. Every setter validates and leaves the
/// old value in place on rejection.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct SimulationParameters {
    smoothing_radius: f32,
    density_reference: f32,
    pressure_constant: f32,
    viscosity: f32,
    gravity: Vec3,
    max_velocity: f32,
    max_acceleration: f32,
    min_time_step: f32, // caps the step taken per frame
    collision_restitution: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            smoothing_radius: DEFAULT_SMOOTHING_RADIUS,
            density_reference: DEFAULT_DENSITY_REFERENCE,
            pressure_constant: DEFAULT_PRESSURE_CONSTANT,
            viscosity: DEFAULT_VISCOSITY,
            gravity: GRAVITY,
            max_velocity: MAX_VELOCITY,
            max_acceleration: MAX_ACCELERATION,
            min_time_step: MIN_TIME_STEP,
            collision_restitution: SHAPE_COLLISION_RESTITUTION,
        }
    }
}

impl SimulationParameters {
    /// The four values that shape the fluid itself; the rest keep their defaults.
    pub fn new(smoothing_radius: f32, density_reference: f32, pressure_constant: f32, viscosity: f32) -> FluidResult<Self> {
        let mut params = Self::default();
        params.set_smoothing_radius(smoothing_radius)?;
        params.set_density_reference(density_reference)?;
        params.set_pressure_constant(pressure_constant)?;
        params.set_viscosity(viscosity)?;
        Ok(params)
    }

    /// Re-runs every setter rule; used when a whole parameter set is swapped in.
    pub fn validate(&self) -> FluidResult<()> {
        let mut probe = Self::default();
        probe.set_smoothing_radius(self.smoothing_radius)?;
        probe.set_density_reference(self.density_reference)?;
        probe.set_pressure_constant(self.pressure_constant)?;
        probe.set_viscosity(self.viscosity)?;
        probe.set_gravity(self.gravity)?;
        probe.set_max_velocity(self.max_velocity)?;
        probe.set_max_acceleration(self.max_acceleration)?;
        probe.set_min_time_step(self.min_time_step)?;
        probe.set_collision_restitution(self.collision_restitution)?;
        Ok(())
    }

    pub fn smoothing_radius(&self) -> f32 {
        self.smoothing_radius
    }

    pub fn density_reference(&self) -> f32 {
        self.density_reference
    }

    pub fn pressure_constant(&self) -> f32 {
        self.pressure_constant
    }

    pub fn viscosity(&self) -> f32 {
        self.viscosity
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn max_velocity(&self) -> f32 {
        self.max_velocity
    }

    pub fn max_acceleration(&self) -> f32 {
        self.max_acceleration
    }

    pub fn min_time_step(&self) -> f32 {
        self.min_time_step
    }

    pub fn collision_restitution(&self) -> f32 {
        self.collision_restitution
    }

    pub fn set_smoothing_radius(&mut self, h: f32) -> FluidResult<()> {
        self.smoothing_radius = logged(require_positive("smoothing radius", h))?;
        Ok(())
    }

    /// Zero would divide by density in the acceleration pass, so it is refused.
    pub fn set_density_reference(&mut self, rho_0: f32) -> FluidResult<()> {
        self.density_reference = logged(require_positive("density reference", rho_0))?;
        Ok(())
    }

    pub fn set_pressure_constant(&mut self, k: f32) -> FluidResult<()> {
        self.pressure_constant = logged(require_non_negative("pressure constant", k))?;
        Ok(())
    }

    pub fn set_viscosity(&mut self, mu: f32) -> FluidResult<()> {
        self.viscosity = logged(require_non_negative("viscosity", mu))?;
        Ok(())
    }

    pub fn set_gravity(&mut self, gravity: Vec3) -> FluidResult<()> {
        if !gravity.is_finite() {
            return logged(Err(FluidError::invalid("gravity", format!("{gravity} is not finite"))));
        }
        self.gravity = gravity;
        Ok(())
    }

    pub fn set_max_velocity(&mut self, v: f32) -> FluidResult<()> {
        self.max_velocity = logged(require_positive("max velocity", v))?;
        Ok(())
    }

    pub fn set_max_acceleration(&mut self, a: f32) -> FluidResult<()> {
        self.max_acceleration = logged(require_positive("max acceleration", a))?;
        Ok(())
    }

    pub fn set_min_time_step(&mut self, dt: f32) -> FluidResult<()> {
        self.min_time_step = logged(require_positive("min time step", dt))?;
        Ok(())
    }

    pub fn set_collision_restitution(&mut self, e: f32) -> FluidResult<()> {
        self.collision_restitution = logged(validate_restitution(e))?;
        Ok(())
    }
}

pub(crate) fn validate_restitution(e: f32) -> FluidResult<f32> {
    let e = require_non_negative("restitution", e)?;
    if e > 1.0 {
        return Err(FluidError::invalid("restitution", format!("{e} must be <= 1")));
    }
    Ok(e)
}

pub(crate) fn logged<T>(result: FluidResult<T>) -> FluidResult<T> {
    if let Err(err) = &result {
        warn!("rejected configuration change: {err}");
    }
    result
}
