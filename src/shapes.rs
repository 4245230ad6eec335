// Collision volumes as signed distance functions, and the contact response.
use glam::{Mat4, Quat, Vec3};

use crate::error::{FluidError, FluidResult, require_positive};
use crate::params::{logged, validate_restitution};

// tetrahedral probe directions for the finite-difference normal
const NORMAL_EPS: f32 = 0.0001;
const PROBES: [Vec3; 4] = [
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

// clearance left between a pushed-out particle and the surface
const CONTACT_SKIN: f32 = 1e-5;
const MAX_PUSH_STEPS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionShape {
    /// `dot(p, normal) + offset`, evaluated in world space.
    Plane { normal: Vec3, offset: f32 },
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Axis along local +Y; `height` is the full height.
    Cylinder { radius: f32, height: f32 },
}

impl CollisionShape {
    pub fn sdf(&self, p: Vec3) -> f32 {
        match *self {
            CollisionShape::Plane { normal, offset } => p.dot(normal) + offset,
            CollisionShape::Box { half_extents } => {
                let q = p.abs() - half_extents;
                q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
            }
            CollisionShape::Sphere { radius } => p.length() - radius,
            CollisionShape::Cylinder { radius, height } => {
                let dx = (p.x * p.x + p.z * p.z).sqrt() - radius;
                let dy = p.y.abs() - height / 2.0;
                let (ox, oy) = (dx.max(0.0), dy.max(0.0));
                dx.max(dy).min(0.0) + (ox * ox + oy * oy).sqrt()
            }
        }
    }

    /// Unnormalized gradient estimate: the SDF sampled at four tetrahedral
    /// offsets, each weighted by its probe direction.
    pub fn sdf_gradient(&self, p: Vec3) -> Vec3 {
        PROBES
            .iter()
            .fold(Vec3::ZERO, |acc, dir| acc + *dir * self.sdf(p + *dir * NORMAL_EPS))
    }

    /// Rejects geometry with no volume or no direction; plane normals come back unit length.
    pub fn validated(self) -> FluidResult<Self> {
        match self {
            CollisionShape::Plane { normal, offset } => {
                let Some(unit) = normal.try_normalize() else {
                    return Err(FluidError::invalid("plane normal", format!("{normal} has no direction")));
                };
                if !offset.is_finite() {
                    return Err(FluidError::invalid("plane offset", format!("{offset} is not finite")));
                }
                Ok(CollisionShape::Plane { normal: unit, offset })
            }
            CollisionShape::Box { half_extents } => {
                for extent in half_extents.to_array() {
                    require_positive("box half extent", extent)?;
                }
                Ok(self)
            }
            CollisionShape::Sphere { radius } => {
                require_positive("sphere radius", radius)?;
                Ok(self)
            }
            CollisionShape::Cylinder { radius, height } => {
                require_positive("cylinder radius", radius)?;
                require_positive("cylinder height", height)?;
                Ok(self)
            }
        }
    }

    fn is_plane(&self) -> bool {
        matches!(self, CollisionShape::Plane { .. })
    }
}

/// A shape placed in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    pub(crate) shape: CollisionShape,
    transform: Mat4,
    inverse: Mat4,
    scale: f32,
    /// `None` falls back to the solver-wide restitution.
    pub restitution: Option<f32>,
    pub disabled: bool,
}

impl Collider {
    pub fn new(shape: CollisionShape) -> FluidResult<Self> {
        Ok(Self::unplaced(logged(shape.validated())?))
    }

    fn unplaced(shape: CollisionShape) -> Self {
        Self {
            shape,
            transform: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            scale: 1.0,
            restitution: None,
            disabled: false,
        }
    }

    pub fn plane(normal: Vec3, offset: f32) -> FluidResult<Self> {
        Self::new(CollisionShape::Plane { normal, offset })
    }

    pub fn cuboid(half_extents: Vec3) -> FluidResult<Self> {
        Self::new(CollisionShape::Box { half_extents })
    }

    pub fn sphere(radius: f32) -> FluidResult<Self> {
        Self::new(CollisionShape::Sphere { radius })
    }

    pub fn cylinder(radius: f32, height: f32) -> FluidResult<Self> {
        Self::new(CollisionShape::Cylinder { radius, height })
    }

    // axis-aligned wall; `normal` is already unit length
    fn wall(normal: Vec3, offset: f32) -> Self {
        Self::unplaced(CollisionShape::Plane { normal, offset })
    }

    pub fn shape(&self) -> &CollisionShape {
        &self.shape
    }

    pub(crate) fn from_parts(shape: CollisionShape, transform: Mat4, inverse: Mat4, scale: f32, restitution: f32) -> Self {
        Self {
            shape,
            transform,
            inverse,
            scale,
            restitution: Some(restitution),
            disabled: false,
        }
    }

    pub fn with_transform(mut self, translation: Vec3, rotation: Quat) -> Self {
        self.set_transform(translation, rotation);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> FluidResult<Self> {
        self.restitution = Some(validate_restitution(restitution)?);
        Ok(self)
    }

    /// Rigid placement (unit scale); the inverse is recomputed here, never per particle.
    pub fn set_transform(&mut self, translation: Vec3, rotation: Quat) {
        self.transform = Mat4::from_rotation_translation(rotation, translation);
        self.inverse = self.transform.inverse();
    }

    pub fn set_scale(&mut self, scale: f32) -> FluidResult<()> {
        self.scale = require_positive("shape scale", scale)?;
        Ok(())
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn inverse_transform(&self) -> Mat4 {
        self.inverse
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    fn to_local(&self, p: Vec3) -> Vec3 {
        if self.shape.is_plane() {
            p
        } else {
            self.inverse.transform_point3(p) / self.scale
        }
    }

    /// Signed distance from a world-space point to the surface.
    pub fn distance(&self, p: Vec3) -> f32 {
        self.distance_local(self.to_local(p))
    }

    fn distance_local(&self, local: Vec3) -> f32 {
        if self.shape.is_plane() {
            self.shape.sdf(local)
        } else {
            self.scale * self.shape.sdf(local)
        }
    }

    /// Outward unit normal in world space near `p`; zero when the estimate degenerates.
    pub fn normal(&self, p: Vec3) -> Vec3 {
        self.normal_at_local(self.to_local(p))
    }

    fn normal_at_local(&self, local: Vec3) -> Vec3 {
        let gradient = self.shape.sdf_gradient(local);
        let world = if self.shape.is_plane() {
            gradient
        } else {
            self.transform.transform_vector3(gradient)
        };
        world.normalize_or_zero()
    }

    /// Resolves a particle of radius `particle_radius` against this shape.
    /// Returns the corrected (position, velocity) when it penetrates.
    ///
    /// Velocity is reflected about the normal and scaled by restitution, and
    /// the position is pushed back out along the normal by the penetration,
    /// plus a small skin, so the returned position reads as clear of the shape
    /// (unless the normal estimate vanishes, as at the exact center of a ball).
    pub fn resolve(&self, position: Vec3, velocity: Vec3, particle_radius: f32, default_restitution: f32) -> Option<(Vec3, Vec3)> {
        let local = self.to_local(position);
        let mut dist = self.distance_local(local) - particle_radius;
        if dist >= 0.0 {
            return None;
        }
        let n = self.normal_at_local(local);
        let restitution = self.restitution.unwrap_or(default_restitution);
        let reflected = (velocity - 2.0 * velocity.dot(n) * n) * restitution;

        // one step is exact for flat faces; creases and curved faces need a few more
        let mut pushed = position;
        let mut normal = n;
        for _ in 0..MAX_PUSH_STEPS {
            if normal == Vec3::ZERO {
                break;
            }
            pushed -= normal * (dist - CONTACT_SKIN);
            let local = self.to_local(pushed);
            dist = self.distance_local(local) - particle_radius;
            if dist >= 0.0 {
                break;
            }
            normal = self.normal_at_local(local);
        }
        Some((pushed, reflected))
    }
}

/// Stable handle returned when a collider is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(u32);

/// Registered colliders in insertion order; that order is the per-particle
/// test order of the collision pass.
#[derive(Clone, Debug, Default)]
pub struct CollisionShapes {
    ids: Vec<ShapeId>,
    colliders: Vec<Collider>,
    next_id: u32,
    bounds: Option<BoundingBox>,
}

#[derive(Clone, Debug)]
struct BoundingBox {
    walls: [ShapeId; 6],
    floor: ShapeId,
}

impl CollisionShapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, collider: Collider) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.ids.push(id);
        self.colliders.push(collider);
        id
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<Collider> {
        let index = self.ids.iter().position(|&i| i == id)?;
        self.ids.remove(index);
        let part_of_bounds = self
            .bounds
            .as_ref()
            .is_some_and(|b| b.floor == id || b.walls.contains(&id));
        if part_of_bounds {
            self.bounds = None;
        }
        Some(self.colliders.remove(index))
    }

    pub fn get(&self, id: ShapeId) -> Option<&Collider> {
        let index = self.ids.iter().position(|&i| i == id)?;
        self.colliders.get(index)
    }

    pub fn get_mut(&mut self, id: ShapeId) -> Option<&mut Collider> {
        let index = self.ids.iter().position(|&i| i == id)?;
        self.colliders.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn as_slice(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Collider)> {
        self.ids.iter().copied().zip(self.colliders.iter())
    }

    /// Registers the six inward-facing walls of an axis-aligned box plus a
    /// standalone floor plane at `min.y`. Walls start enabled, the floor disabled.
    pub fn add_bounding_box(&mut self, min: Vec3, max: Vec3) -> [ShapeId; 6] {
        let walls = [
            Collider::wall(Vec3::NEG_Z, max.z),
            Collider::wall(Vec3::Z, -min.z),
            Collider::wall(Vec3::X, -min.x),
            Collider::wall(Vec3::NEG_X, max.x),
            Collider::wall(Vec3::NEG_Y, max.y),
            Collider::wall(Vec3::Y, -min.y),
        ]
        .map(|wall| self.add(wall));
        let mut floor = Collider::wall(Vec3::Y, -min.y);
        floor.disabled = true;
        let floor = self.add(floor);
        self.bounds = Some(BoundingBox { walls, floor });
        walls
    }

    /// With bounds checked the walls contain the fluid; without, only the
    /// floor catches it. Returns false when no bounding box is registered.
    pub fn set_check_bounds(&mut self, check: bool) -> bool {
        let Some(bounds) = self.bounds.clone() else {
            return false;
        };
        for wall in bounds.walls {
            if let Some(collider) = self.get_mut(wall) {
                collider.disabled = !check;
            }
        }
        if let Some(floor) = self.get_mut(bounds.floor) {
            floor.disabled = check;
        }
        true
    }
}
