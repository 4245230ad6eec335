use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::backend::StepContext;
use crate::kernels::KernelConstants;
use crate::shapes::{Collider, CollisionShape};

// not using glam to keep the layouts WGSL compatible (vec3 padded to vec4)
pub type GPUVec4 = [f32; 4];

#[inline]
pub fn to_gpu(v: Vec3, w: f32) -> GPUVec4 {
    [v.x, v.y, v.z, w]
}

#[inline]
pub fn from_gpu(v: GPUVec4) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GPUParticle {
    pub mass: f32,
    pub density: f32,
    pub pressure: f32,
    pub _pad: f32,
}

impl GPUParticle {
    pub fn new(mass: f32) -> Self {
        Self { mass, density: 0.0, pressure: 0.0, _pad: 0.0 }
    }
}

// uniform block of the density/pressure and acceleration passes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ComputeParams {
    pub kernel: KernelConstants,
    pub gravity: GPUVec4,
    pub pressure_constant: f32,
    pub density_reference: f32,
    pub max_acceleration: f32,
    pub viscosity: f32,
    pub num_particles: u32,
    pub _pad: [u32; 3],
}

impl ComputeParams {
    pub fn new(ctx: &StepContext, num_particles: u32) -> Self {
        Self {
            kernel: ctx.kernel,
            gravity: to_gpu(ctx.gravity, 0.0),
            pressure_constant: ctx.pressure_constant,
            density_reference: ctx.density_reference,
            max_acceleration: ctx.max_acceleration,
            viscosity: ctx.viscosity,
            num_particles,
            _pad: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct UpdateParams {
    pub delta_time: f32,
    pub max_velocity: f32,
    pub num_particles: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CollisionParams {
    pub particle_radius: f32,
    pub num_particles: u32,
    pub _pad: [u32; 2],
}

pub const SHAPE_PLANE: u32 = 0;
pub const SHAPE_BOX: u32 = 1;
pub const SHAPE_SPHERE: u32 = 2;
pub const SHAPE_CYLINDER: u32 = 3;

/// One collider as a uniform block; restitution is already resolved against the default.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GPUShape {
    pub transform: [[f32; 4]; 4],
    pub inverse: [[f32; 4]; 4],
    // plane: normal.xyz + offset | box: half extents | sphere: radius | cylinder: radius, height
    pub params: [f32; 4],
    pub kind: u32,
    pub scale: f32,
    pub restitution: f32,
    pub _pad: f32,
}

impl GPUShape {
    pub fn from_collider(collider: &Collider, default_restitution: f32) -> Self {
        let (kind, params) = match collider.shape {
            CollisionShape::Plane { normal, offset } => (SHAPE_PLANE, to_gpu(normal, offset)),
            CollisionShape::Box { half_extents } => (SHAPE_BOX, to_gpu(half_extents, 0.0)),
            CollisionShape::Sphere { radius } => (SHAPE_SPHERE, [radius, 0.0, 0.0, 0.0]),
            CollisionShape::Cylinder { radius, height } => (SHAPE_CYLINDER, [radius, height, 0.0, 0.0]),
        };
        Self {
            transform: collider.transform().to_cols_array_2d(),
            inverse: collider.inverse_transform().to_cols_array_2d(),
            params,
            kind,
            scale: collider.scale(),
            restitution: collider.restitution.unwrap_or(default_restitution),
            _pad: 0.0,
        }
    }

    /// Rebuilds the collider a compute invocation evaluates. `None` for an unknown kind tag.
    pub fn to_collider(&self) -> Option<Collider> {
        let p = self.params;
        let shape = match self.kind {
            SHAPE_PLANE => CollisionShape::Plane { normal: from_gpu(p), offset: p[3] },
            SHAPE_BOX => CollisionShape::Box { half_extents: from_gpu(p) },
            SHAPE_SPHERE => CollisionShape::Sphere { radius: p[0] },
            SHAPE_CYLINDER => CollisionShape::Cylinder { radius: p[0], height: p[1] },
            _ => return None,
        };
        Some(Collider::from_parts(
            shape,
            Mat4::from_cols_array_2d(&self.transform),
            Mat4::from_cols_array_2d(&self.inverse),
            self.scale,
            self.restitution,
        ))
    }
}
