// SPH kernel family and every formula both execution strategies evaluate.
// Sequential and parallel passes call into here so the math cannot drift apart.
use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Normalization factors derived from the smoothing radius `h`.
///
/// Laid out `#[repr(C)]` so the same value is embedded verbatim in the
/// compute uniform block (`gpu::ffi::ComputeParams`).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelConstants {
    pub h: f32,
    pub h2: f32,
    pub poly6: f32,  // 315 / (64 pi h^9)
    pub spiky: f32,  // -45 / (pi h^6)
    pub visc: f32,   // 45 / (pi h^6)
    pub _pad: [f32; 3],
}

impl KernelConstants {
    pub fn new(h: f32) -> Self {
        Self {
            h,
            h2: h * h,
            poly6: 315.0 / (64.0 * PI * h.powi(9)),
            spiky: -45.0 / (PI * h.powi(6)),
            visc: 45.0 / (PI * h.powi(6)),
            _pad: [0.0; 3],
        }
    }
}

/// Poly6 contribution of one neighbor at squared distance `r2`, self included.
#[inline]
pub fn density_weight(k: &KernelConstants, r2: f32) -> f32 {
    if r2 < k.h2 {
        k.poly6 * (k.h2 - r2).powi(3)
    } else {
        0.0
    }
}

/// Linear equation of state. The raw kernel sum is floored at the reference
/// density, so the returned density is never zero and pressure never negative
/// for a non-negative pressure constant.
#[inline]
pub fn equation_of_state(raw_density: f32, density_reference: f32, pressure_constant: f32) -> (f32, f32) {
    let density = raw_density.max(density_reference);
    (density, pressure_constant * (density - density_reference))
}

/// What the acceleration pass needs to know about either side of a pair.
#[derive(Clone, Copy, Debug)]
pub struct PairSample {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub density: f32,
    pub pressure: f32,
}

/// Pressure and viscosity acceleration exerted on `a` by `b`.
///
/// Returns `None` outside the smoothing radius and for coincident particles
/// (`r == 0`), which covers the self term and avoids dividing by `r`.
#[inline]
pub fn pair_acceleration(
    k: &KernelConstants,
    viscosity: f32,
    a: &PairSample,
    b: &PairSample,
) -> Option<(Vec3, Vec3)> {
    let diff = a.position - b.position;
    let r2 = diff.length_squared();
    let r = r2.sqrt();
    let in_range = r > 0.0 && r2 < k.h2;
    if !in_range {
        return None;
    }
    let dir = diff / r;
    let mass_ratio = b.mass / a.mass;

    let w = k.spiky * (k.h - r) * (k.h - r);
    let fp = w * ((a.pressure + b.pressure) / (2.0 * a.density * b.density)) * mass_ratio;
    let pressure = -fp * dir;

    let w2 = k.visc * (k.h - r);
    let fv = w2 * (1.0 / b.density) * mass_ratio * viscosity;
    let visc = fv * (b.velocity - a.velocity);

    Some((pressure, visc))
}

/// pressure + viscosity, then gravity, then the magnitude clamp. Both
/// strategies must finish in exactly this order.
#[inline]
pub fn finish_acceleration(pressure: Vec3, viscosity: Vec3, gravity: Vec3, max_acceleration: f32) -> Vec3 {
    let acc = pressure + viscosity + gravity;
    clamp_magnitude(acc, max_acceleration)
}

/// Uniformly rescales `v` down to `max` length, keeping its direction.
#[inline]
pub fn clamp_magnitude(v: Vec3, max: f32) -> Vec3 {
    let mag = v.length();
    if mag > max { v / mag * max } else { v }
}

/// Semi-implicit Euler with a velocity cap. Returns (position, velocity).
#[inline]
pub fn integrate_particle(position: Vec3, velocity: Vec3, acceleration: Vec3, dt: f32, max_velocity: f32) -> (Vec3, Vec3) {
    let velocity = clamp_magnitude(velocity + acceleration * dt, max_velocity);
    (position + velocity * dt, velocity)
}
