use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{FluidError, FluidResult};
use crate::gpu::buffers::DeviceBuffers;
use crate::gpu::ffi::{CollisionParams, ComputeParams, GPUShape, UpdateParams};
use crate::gpu::pipeline;

pub const WORKGROUP_SIZE: usize = 64;

// how many workgroups do we actually need?
#[inline]
pub fn workgroup_count(n: usize) -> usize {
    n.div_ceil(WORKGROUP_SIZE)
}

/// One recorded compute pass and its uniform block.
#[derive(Clone, Copy, Debug)]
pub enum Dispatch {
    DensityPressure(ComputeParams),
    Acceleration(ComputeParams),
    Integrate(UpdateParams),
    Collide(CollisionParams, GPUShape),
}

impl Dispatch {
    pub fn label(&self) -> &'static str {
        match self {
            Dispatch::DensityPressure(_) => "sph_density_pressure",
            Dispatch::Acceleration(_) => "sph_acceleration",
            Dispatch::Integrate(_) => "sph_integrate",
            Dispatch::Collide(..) => "sph_collide",
        }
    }

    pub fn num_particles(&self) -> usize {
        let n = match self {
            Dispatch::DensityPressure(p) | Dispatch::Acceleration(p) => p.num_particles,
            Dispatch::Integrate(p) => p.num_particles,
            Dispatch::Collide(p, _) => p.num_particles,
        };
        n as usize
    }

    fn validate(&self, buffers: &DeviceBuffers) -> FluidResult<()> {
        let n = self.num_particles();
        if n > buffers.capacity() {
            return Err(FluidError::Dispatch(format!(
                "{} over {n} particles but buffers hold {}",
                self.label(),
                buffers.capacity()
            )));
        }
        if let Dispatch::Collide(_, shape) = self {
            if shape.to_collider().is_none() {
                return Err(FluidError::Dispatch(format!("unknown shape kind {}", shape.kind)));
            }
        }
        Ok(())
    }
}

/// A compute queue in front of a dedicated worker pool.
///
/// `enqueue` only records; work runs at `submit`, in recording order, one
/// pass at a time. Each pass spreads its workgroups across the pool.
pub struct ComputeDevice {
    pool: ThreadPool,
    queue: Vec<Dispatch>,
}

impl ComputeDevice {
    pub fn new() -> FluidResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .thread_name(|i| format!("sph-compute-{i}"))
            .build()
            .map_err(|e| FluidError::DeviceUnavailable(e.to_string()))?;
        Ok(Self { pool, queue: Vec::new() })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn enqueue(&mut self, dispatch: Dispatch) {
        self.queue.push(dispatch);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drops recorded work without running it.
    pub fn discard(&mut self) {
        self.queue.clear();
    }

    /// Runs every recorded dispatch. The whole queue is validated up front:
    /// either all passes run or none does.
    pub fn submit(&mut self, buffers: &mut DeviceBuffers) -> FluidResult<()> {
        let queue = std::mem::take(&mut self.queue);
        for dispatch in &queue {
            dispatch.validate(buffers)?;
        }
        self.pool.install(|| {
            for dispatch in &queue {
                pipeline::run(dispatch, buffers);
            }
        });
        Ok(())
    }
}
