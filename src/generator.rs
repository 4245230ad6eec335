// Gradual "pour" of particles: whole cross-sections of a round stream are
// released one at a time, each once the previous one has moved clear.
use std::f32::consts::PI;

use bevy::log::debug;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{FluidResult, require_positive};
use crate::params::logged;
use crate::particles::ParticleBuffers;

pub const DEFAULT_PARTICLE_RADIUS: f32 = 0.02;
pub const DEFAULT_SEED: u64 = 0x5eed;

// rows of the cross-section lattice; rows 1..ROWS-1 are populated
const ROWS: usize = 12;
const COLUMNS: f32 = 12.0;
const STREAM_DEPTH: f32 = 0.49;
const JITTER_FRACTION: f32 = 0.1;
const VELOCITY_NOISE: f32 = 0.03;
const POUR_SPEED: f32 = 1.5;

/// One lattice point of the cross-section, relative to the generator origin.
#[derive(Clone, Copy, Debug)]
struct Slot {
    offset: Vec3,
    edge: bool,
}

fn cross_section(spacing: f32) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut y = (ROWS / 2) as f32 * spacing;
    for row in 1..ROWS - 1 {
        let angle = row as f32 * PI / (ROWS - 1) as f32;
        let half_width = (angle.sin() * COLUMNS / 2.0 * spacing).max(0.0);
        let count = (2.0 * half_width / spacing).floor() as usize + 1;
        for col in 0..count {
            let x = -half_width + col as f32 * spacing;
            slots.push(Slot {
                offset: Vec3::new(x, y, STREAM_DEPTH),
                edge: col == 0 || x + spacing > half_width,
            });
        }
        y += spacing;
    }
    slots
}

pub struct ParticleStreamGenerator {
    buffers: ParticleBuffers,
    target: usize,
    cross_section: usize,
    particle_radius: f32,
    // radius the unreleased candidates were laid out with
    layout_radius: f32,
    origin: Vec3,
    rng: StdRng,
}

impl Default for ParticleStreamGenerator {
    fn default() -> Self {
        Self::with_seed(DEFAULT_PARTICLE_RADIUS, DEFAULT_SEED)
    }
}

impl ParticleStreamGenerator {
    pub fn new(particle_radius: f32) -> FluidResult<Self> {
        let radius = logged(require_positive("particle radius", particle_radius))?;
        Ok(Self::with_seed(radius, DEFAULT_SEED))
    }

    fn with_seed(particle_radius: f32, seed: u64) -> Self {
        Self {
            buffers: ParticleBuffers::new(),
            target: 0,
            cross_section: cross_section(2.0 * particle_radius).len(),
            particle_radius,
            layout_radius: particle_radius,
            origin: Vec3::ZERO,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restarts the jitter stream; equal seeds give identical particles.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn buffers(&self) -> &ParticleBuffers {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut ParticleBuffers {
        &mut self.buffers
    }

    pub fn active_count(&self) -> usize {
        self.buffers.active()
    }

    pub fn target_count(&self) -> usize {
        self.target
    }

    pub fn cross_section_count(&self) -> usize {
        self.cross_section
    }

    pub fn particle_radius(&self) -> f32 {
        self.particle_radius
    }

    /// Collisions use the new radius right away. The stream spacing and the
    /// release distance keep the old one until the next `generate` lays out
    /// fresh candidates.
    pub fn set_particle_radius(&mut self, radius: f32) -> FluidResult<()> {
        self.particle_radius = logged(require_positive("particle radius", radius))?;
        Ok(())
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Where the stream enters; takes effect at the next `generate`.
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// Prepares `total` particles for release.
    ///
    /// Without `regenerate_all`, lowering the total only trims the target, and
    /// raising it appends fresh candidates after the particles already flowing.
    /// With it, every particle is produced again and the release restarts
    /// from zero. Fails without changing any count when storage cannot grow.
    pub fn generate(&mut self, total: usize, regenerate_all: bool) -> FluidResult<()> {
        if !regenerate_all && total <= self.target {
            self.target = total;
            let active = self.buffers.active().min(total);
            self.buffers.set_active(active);
            return Ok(());
        }

        let start = if regenerate_all { 0 } else { self.buffers.active() };
        self.buffers.ensure_capacity(total)?;

        let (positions, velocities) = self.candidates(total - start);
        self.buffers.write(start, &positions, &velocities);
        self.layout_radius = self.particle_radius;
        self.cross_section = cross_section(2.0 * self.layout_radius).len();
        self.buffers.set_active(start);
        self.target = total;
        debug!("generated {} particles, release restarts at {start}", total - start);
        Ok(())
    }

    fn candidates(&mut self, count: usize) -> (Vec<Vec3>, Vec<Vec3>) {
        let spacing = 2.0 * self.particle_radius;
        let half_jitter = spacing * JITTER_FRACTION / 2.0;
        let noise = VELOCITY_NOISE / 2.0;
        let layout = cross_section(spacing);

        let mut positions = Vec::with_capacity(count);
        let mut velocities = Vec::with_capacity(count);
        // the last lap may stop partway through the cross-section
        for slot in layout.iter().cycle().take(count) {
            let jitter = if slot.edge {
                Vec3::ZERO
            } else {
                Vec3::new(
                    self.rng.gen_range(-half_jitter..half_jitter),
                    self.rng.gen_range(-half_jitter..half_jitter),
                    self.rng.gen_range(-half_jitter..half_jitter),
                )
            };
            positions.push(self.origin + slot.offset + jitter);
            velocities.push(Vec3::new(
                self.rng.gen_range(-noise..noise),
                self.rng.gen_range(-noise..noise),
                self.rng.gen_range(-VELOCITY_NOISE..0.0) - POUR_SPEED,
            ));
        }
        (positions, velocities)
    }

    /// Per-frame release. Returns the active count, which never decreases here.
    pub fn tick(&mut self) -> usize {
        let active = self.buffers.active();
        if active >= self.target || self.cross_section == 0 {
            return active;
        }

        let ready = if active == 0 {
            true
        } else {
            // the next batch still sits at the spawn point
            let positions = self.buffers.all_positions();
            let spawn = positions[active];
            let latest = positions[active.saturating_sub(self.cross_section)];
            spawn.distance(latest) > 2.0 * self.layout_radius
        };

        if ready {
            let released = (active + self.cross_section).min(self.target);
            self.buffers.set_active(released);
            released
        } else {
            active
        }
    }
}
