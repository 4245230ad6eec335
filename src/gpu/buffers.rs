use bytemuck::Pod;

use crate::error::{FluidError, FluidResult};
use crate::gpu::ffi::{GPUParticle, GPUVec4};

/// Typed device storage. The pool's workers share host memory with the
/// caller, so uploads and readbacks go straight through typed slices with no
/// staging copy; only the bounds a queue write would enforce are checked.
pub struct StorageBuffer<T: Pod> {
    label: &'static str,
    data: Vec<T>,
}

impl<T: Pod> StorageBuffer<T> {
    pub fn zeroed(label: &'static str, len: usize) -> Self {
        Self { label, data: vec![T::zeroed(); len] }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows to `len` elements, keeping the contents; new elements are `fill`.
    pub fn grow(&mut self, len: usize, fill: T) {
        if len > self.data.len() {
            self.data.resize(len, fill);
        }
    }

    /// The `len` elements starting at `offset`, for a host-side write.
    pub fn range_mut(&mut self, offset: usize, len: usize) -> FluidResult<&mut [T]> {
        let size = self.data.len();
        offset
            .checked_add(len)
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or_else(|| {
                FluidError::Dispatch(format!(
                    "{}: write of {len} elements at {offset} overruns {size} elements",
                    self.label
                ))
            })
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    // compute passes bind the whole buffer
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Everything one frame of compute passes reads or writes.
pub struct DeviceBuffers {
    pub positions: StorageBuffer<GPUVec4>,
    pub velocities: StorageBuffer<GPUVec4>,
    pub particles: StorageBuffer<GPUParticle>,
    // separate from `particles` so the acceleration pass never writes what it reads
    pub accelerations: StorageBuffer<GPUVec4>,
}

impl DeviceBuffers {
    pub fn new(capacity: usize, mass: f32) -> Self {
        let mut particles = StorageBuffer::zeroed("particles", 0);
        particles.grow(capacity, GPUParticle::new(mass));
        Self {
            positions: StorageBuffer::zeroed("positions", capacity),
            velocities: StorageBuffer::zeroed("velocities", capacity),
            particles,
            accelerations: StorageBuffer::zeroed("accelerations", capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    pub fn grow(&mut self, capacity: usize, mass: f32) {
        self.positions.grow(capacity, [0.0; 4]);
        self.velocities.grow(capacity, [0.0; 4]);
        self.particles.grow(capacity, GPUParticle::new(mass));
        self.accelerations.grow(capacity, [0.0; 4]);
    }

    pub fn set_mass(&mut self, mass: f32) {
        for p in self.particles.as_mut_slice() {
            p.mass = mass;
        }
    }
}
