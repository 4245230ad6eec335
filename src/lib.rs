pub mod backend;
pub mod error;
pub mod generator;
pub mod kernels;
pub mod params;
pub mod particles;
pub mod plugin;
pub mod shapes;
pub mod simulation;
pub mod solver;

pub mod cpu {
    pub mod sequential;
    pub mod spatial_hash;
}

pub mod gpu {
    pub mod ffi;
    pub mod buffers;
    pub mod device;
    pub mod pipeline;
    pub mod parallel;
}

pub use backend::{BackendKind, ComputeBackend, ComputeCapability};
pub use error::{FluidError, FluidResult};
pub use generator::ParticleStreamGenerator;
pub use params::SimulationParameters;
pub use particles::ParticleBuffers;
pub use plugin::{FluidPlugin, FluidSet};
pub use shapes::{Collider, CollisionShape, CollisionShapes, ShapeId};
pub use simulation::FluidSimulation;
pub use solver::SphSolver;
