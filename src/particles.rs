use bevy::log::debug;
use glam::Vec3;

use crate::error::{FluidError, FluidResult};

/// Per-particle values derived each frame, plus the (uniform) mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleState {
    pub mass: f32,
    pub density: f32,
    pub pressure: f32,
    pub acceleration: Vec3,
}

impl ParticleState {
    pub fn new(mass: f32) -> Self {
        Self { mass, density: 0.0, pressure: 0.0, acceleration: Vec3::ZERO }
    }
}

/// Backing position/velocity storage.
///
/// `capacity` slots are allocated, of which the first `active` are simulated.
/// Storage only grows; growth copies the old contents forward.
#[derive(Clone, Debug, Default)]
pub struct ParticleBuffers {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    active: usize,
}

/// Mutable window over the active particles handed to the solver phases.
pub struct FieldView<'a> {
    pub positions: &'a mut [Vec3],
    pub velocities: &'a mut [Vec3],
}

impl FieldView<'_> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl ParticleBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers with every slot active; handy for hand-placed particles.
    pub fn from_particles(positions: Vec<Vec3>, velocities: Vec<Vec3>) -> FluidResult<Self> {
        if positions.len() != velocities.len() {
            return Err(FluidError::invalid(
                "particle data",
                format!("{} positions but {} velocities", positions.len(), velocities.len()),
            ));
        }
        let active = positions.len();
        Ok(Self { positions, velocities, active })
    }

    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions[..self.active]
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities[..self.active]
    }

    /// The full backing arrays, inactive tail included.
    pub fn all_positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn all_velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn view_mut(&mut self) -> FieldView<'_> {
        FieldView {
            positions: &mut self.positions[..self.active],
            velocities: &mut self.velocities[..self.active],
        }
    }

    /// Grows storage to hold at least `capacity` particles. On failure nothing changes.
    pub fn ensure_capacity(&mut self, capacity: usize) -> FluidResult<()> {
        let current = self.positions.len();
        if capacity <= current {
            return Ok(());
        }
        let extra = capacity - current;
        let err = || FluidError::Capacity { requested: capacity };
        capacity.checked_mul(std::mem::size_of::<Vec3>()).filter(|b| *b <= isize::MAX as usize).ok_or_else(err)?;

        // reserve both before touching either, so a failure leaves them in step
        self.positions.try_reserve_exact(extra).map_err(|_| err())?;
        self.velocities.try_reserve_exact(extra).map_err(|_| err())?;
        self.positions.resize(capacity, Vec3::ZERO);
        self.velocities.resize(capacity, Vec3::ZERO);
        debug!("particle storage grown {current} -> {capacity}");
        Ok(())
    }

    pub(crate) fn set_active(&mut self, active: usize) {
        debug_assert!(active <= self.capacity());
        self.active = active.min(self.capacity());
    }

    /// Overwrites slots starting at `start`; callers grow storage first.
    pub(crate) fn write(&mut self, start: usize, positions: &[Vec3], velocities: &[Vec3]) {
        self.positions[start..start + positions.len()].copy_from_slice(positions);
        self.velocities[start..start + velocities.len()].copy_from_slice(velocities);
    }
}
