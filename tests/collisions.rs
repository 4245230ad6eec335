use std::f32::consts::FRAC_PI_2;

use bevy_sph_pour::backend::{BackendKind, ComputeCapability};
use bevy_sph_pour::error::FluidError;
use bevy_sph_pour::params::SimulationParameters;
use bevy_sph_pour::particles::ParticleBuffers;
use bevy_sph_pour::shapes::{Collider, CollisionShape, CollisionShapes};
use bevy_sph_pour::solver::SphSolver;
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EPS: f32 = 1e-4;

fn near(a: f32, b: f32) -> bool {
    (a - b).abs() < EPS
}

#[test]
fn primitive_distances() {
    let plane = Collider::plane(Vec3::Y, 0.0).unwrap();
    assert!(near(plane.distance(Vec3::new(3.0, 0.5, -2.0)), 0.5));
    assert!(near(plane.distance(Vec3::new(0.0, -0.25, 0.0)), -0.25));

    let cube = Collider::cuboid(Vec3::ONE).unwrap();
    assert!(near(cube.distance(Vec3::new(2.0, 0.0, 0.0)), 1.0));
    assert!(near(cube.distance(Vec3::new(0.5, 0.0, 0.0)), -0.5));
    assert!(near(cube.distance(Vec3::new(2.0, 2.0, 1.0)), 2.0f32.sqrt()));

    let ball = Collider::sphere(1.0).unwrap();
    assert!(near(ball.distance(Vec3::new(0.0, 3.0, 0.0)), 2.0));
    assert!(near(ball.distance(Vec3::ZERO), -1.0));

    let can = Collider::cylinder(1.0, 2.0).unwrap();
    assert!(near(can.distance(Vec3::new(2.0, 0.0, 0.0)), 1.0));
    assert!(near(can.distance(Vec3::new(0.0, 2.0, 0.0)), 1.0));
    assert!(near(can.distance(Vec3::ZERO), -1.0));
}

#[test]
fn placed_and_scaled_shapes() {
    let mut ball = Collider::sphere(1.0).unwrap().with_transform(Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);
    assert!(near(ball.distance(Vec3::new(4.0, 0.0, 0.0)), 1.0));

    ball.set_scale(2.0).unwrap();
    assert!(near(ball.distance(Vec3::new(5.0, 0.0, 0.0)), 1.0));
    assert!(ball.set_scale(0.0).is_err());
    assert_eq!(ball.scale(), 2.0);

    // planes ignore the transform
    let plane = Collider::plane(Vec3::Y, -1.0).unwrap().with_transform(Vec3::splat(10.0), Quat::IDENTITY);
    assert!(near(plane.distance(Vec3::new(0.0, 1.5, 0.0)), 0.5));
}

#[test]
fn normals_point_outward_in_world_space() {
    let ball = Collider::sphere(1.0).unwrap();
    assert!(ball.normal(Vec3::new(0.0, 0.0, 1.02)).abs_diff_eq(Vec3::Z, EPS));

    let cube = Collider::cuboid(Vec3::ONE).unwrap();
    assert!(cube.normal(Vec3::new(0.0, 1.02, 0.0)).abs_diff_eq(Vec3::Y, EPS));

    // a box turned a quarter turn about Z: its local +Y face now faces -X
    let turned = Collider::cuboid(Vec3::new(0.5, 2.0, 0.5)).unwrap().with_transform(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2));
    assert!(turned.normal(Vec3::new(-2.02, 0.0, 0.0)).abs_diff_eq(Vec3::NEG_X, EPS));
    assert!(near(turned.distance(Vec3::new(-2.02, 0.0, 0.0)), 0.02));

    let plane = Collider::plane(Vec3::new(0.0, 2.0, 0.0), 0.0).unwrap();
    assert!(plane.normal(Vec3::new(1.0, 0.01, 1.0)).abs_diff_eq(Vec3::Y, EPS));
}

#[test]
fn penetrating_particle_is_reflected_and_pushed_out() {
    let floor = Collider::plane(Vec3::Y, 0.0).unwrap();
    let (p, v) = floor
        .resolve(Vec3::new(0.3, -0.01, 0.0), Vec3::new(1.0, -2.0, 0.0), 0.02, 0.6)
        .unwrap();
    assert!(near(p.y, 0.02));
    assert!(near(p.x, 0.3));
    assert!(v.abs_diff_eq(Vec3::new(0.6, 1.2, 0.0), EPS));

    // a shape's own restitution wins over the default
    let bouncy = Collider::plane(Vec3::Y, 0.0).unwrap().with_restitution(1.0).unwrap();
    let (_, v) = bouncy.resolve(Vec3::ZERO, Vec3::new(0.0, -1.0, 0.0), 0.02, 0.6).unwrap();
    assert!(v.abs_diff_eq(Vec3::Y, EPS));

    assert!(floor.resolve(Vec3::new(0.0, 0.5, 0.0), Vec3::NEG_Y, 0.02, 0.6).is_none());
    assert!(Collider::sphere(1.0).unwrap().with_restitution(1.5).is_err());
}

#[test]
fn collision_energy_never_grows() {
    let mut rng = StdRng::seed_from_u64(11);
    let shapes = [
        Collider::plane(Vec3::new(0.3, 1.0, -0.2), 0.1).unwrap(),
        Collider::sphere(0.5).unwrap(),
        Collider::cuboid(Vec3::splat(0.4)).unwrap(),
        Collider::cylinder(0.3, 1.0).unwrap().with_transform(Vec3::X * 0.2, Quat::from_rotation_x(0.7)),
    ];
    for restitution in [0.0, 0.6, 1.0] {
        for _ in 0..500 {
            let p = Vec3::new(rng.gen_range(-0.6..0.6), rng.gen_range(-0.6..0.6), rng.gen_range(-0.6..0.6));
            let v = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
            for shape in &shapes {
                if let Some((_, v_out)) = shape.resolve(p, v, 0.02, restitution) {
                    assert!(v_out.length_squared() <= v.length_squared() * (1.0 + EPS));
                }
            }
        }
    }
}

#[test]
fn second_collision_pass_changes_nothing() {
    let mut solver =
        SphSolver::new(SimulationParameters::default(), 1.0, BackendKind::Sequential, ComputeCapability::default()).unwrap();
    let shapes = [Collider::plane(Vec3::Y, 0.0).unwrap(), Collider::sphere(0.25).unwrap().with_transform(Vec3::new(1.0, 0.5, 0.0), Quat::IDENTITY)];

    // clear of both shapes, with one particle sitting exactly on the floor
    let positions = vec![Vec3::new(0.0, 0.5, 0.0), Vec3::new(-0.3, 0.02, 0.1), Vec3::new(1.0, 1.0, 0.0)];
    let velocities = vec![Vec3::new(0.0, -1.0, 0.0), Vec3::X, Vec3::NEG_Y];
    let mut particles = ParticleBuffers::from_particles(positions.clone(), velocities.clone()).unwrap();

    for _ in 0..2 {
        let mut field = particles.view_mut();
        solver.resolve_collisions(&mut field, 0.02, &shapes);
        solver.end_frame(&mut field).unwrap();
    }
    assert_eq!(particles.positions(), &positions[..]);
    assert_eq!(particles.velocities(), &velocities[..]);
}

#[test]
fn resolved_particles_stay_resolved() {
    let mut rng = StdRng::seed_from_u64(23);
    let mut scaled = Collider::sphere(0.2).unwrap().with_transform(Vec3::new(0.1, 0.0, -0.1), Quat::IDENTITY);
    scaled.set_scale(1.5).unwrap();
    let shapes = [
        Collider::plane(Vec3::Y, 0.0).unwrap(),
        Collider::plane(Vec3::new(0.3, 1.0, -0.2), 0.1).unwrap(),
        Collider::cuboid(Vec3::new(0.4, 0.2, 0.3)).unwrap().with_transform(Vec3::new(0.05, 0.1, 0.0), Quat::from_rotation_y(0.6)),
        Collider::sphere(0.5).unwrap().with_transform(Vec3::new(0.0, 0.2, 0.1), Quat::IDENTITY),
        Collider::cylinder(0.3, 1.0).unwrap().with_transform(Vec3::X * 0.2, Quat::from_rotation_x(0.7)),
        scaled,
    ];

    for shape in &shapes {
        let mut resolved = 0;
        for _ in 0..2000 {
            let p = Vec3::new(rng.gen_range(-0.7..0.7), rng.gen_range(-0.7..0.7), rng.gen_range(-0.7..0.7));
            let v = Vec3::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            let Some((p_out, v_out)) = shape.resolve(p, v, 0.02, 0.6) else {
                continue;
            };
            resolved += 1;
            assert!(shape.distance(p_out) >= 0.02, "{:?} left {p} at {p_out}", shape.shape());
            assert_eq!(shape.resolve(p_out, v_out, 0.02, 0.6), None, "{:?} resolved {p} twice", shape.shape());
        }
        assert!(resolved > 40, "{:?}: only {resolved} penetrations sampled", shape.shape());
    }
}

#[test]
fn collision_pass_is_idempotent_after_penetrations() {
    let mut solver =
        SphSolver::new(SimulationParameters::default(), 1.0, BackendKind::Sequential, ComputeCapability::default()).unwrap();
    // the floor, a ball and a crate, none touching each other
    let shapes = [
        Collider::plane(Vec3::Y, 0.0).unwrap(),
        Collider::sphere(0.25).unwrap().with_transform(Vec3::new(1.0, 0.5, 0.0), Quat::IDENTITY),
        Collider::cuboid(Vec3::splat(0.2)).unwrap().with_transform(Vec3::new(-1.0, 0.5, 0.0), Quat::from_rotation_y(0.3)),
    ];

    let mut rng = StdRng::seed_from_u64(31);
    let positions: Vec<Vec3> = (0..3000)
        .map(|_| Vec3::new(rng.gen_range(-1.4..1.4), rng.gen_range(-0.2..0.9), rng.gen_range(-0.3..0.3)))
        .collect();
    let velocities: Vec<Vec3> = (0..3000)
        .map(|_| Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let mut particles = ParticleBuffers::from_particles(positions.clone(), velocities).unwrap();

    let mut field = particles.view_mut();
    solver.resolve_collisions(&mut field, 0.02, &shapes);
    solver.end_frame(&mut field).unwrap();
    let moved = particles.positions().iter().zip(&positions).filter(|(a, b)| a != b).count();
    assert!(moved > 300, "only {moved} particles penetrated");

    let resolved_positions = particles.positions().to_vec();
    let resolved_velocities = particles.velocities().to_vec();
    let mut field = particles.view_mut();
    solver.resolve_collisions(&mut field, 0.02, &shapes);
    solver.end_frame(&mut field).unwrap();
    assert_eq!(particles.positions(), &resolved_positions[..]);
    assert_eq!(particles.velocities(), &resolved_velocities[..]);
}

#[test]
fn degenerate_geometry_is_rejected() {
    assert!(matches!(Collider::plane(Vec3::ZERO, 0.0), Err(FluidError::InvalidConfig { parameter: "plane normal", .. })));
    assert!(Collider::plane(Vec3::new(f32::NAN, 1.0, 0.0), 0.0).is_err());
    assert!(Collider::plane(Vec3::Y, f32::INFINITY).is_err());
    assert!(Collider::sphere(-1.0).is_err());
    assert!(Collider::sphere(0.0).is_err());
    assert!(Collider::cuboid(Vec3::new(1.0, 0.0, 1.0)).is_err());
    assert!(Collider::cuboid(Vec3::new(1.0, 1.0, -2.0)).is_err());
    assert!(Collider::cylinder(0.0, 1.0).is_err());
    assert!(Collider::cylinder(1.0, f32::NAN).is_err());
    assert!(Collider::new(CollisionShape::Sphere { radius: f32::INFINITY }).is_err());

    // a plane normal is stored unit length
    let plane = Collider::plane(Vec3::new(0.0, 3.0, 0.0), -1.0).unwrap();
    assert_eq!(*plane.shape(), CollisionShape::Plane { normal: Vec3::Y, offset: -1.0 });
    assert!(near(plane.distance(Vec3::new(0.0, 1.5, 0.0)), 0.5));
}

#[test]
fn disabled_shapes_are_skipped() {
    let mut solver =
        SphSolver::new(SimulationParameters::default(), 1.0, BackendKind::Sequential, ComputeCapability::default()).unwrap();
    let mut floor = Collider::plane(Vec3::Y, 0.0).unwrap();
    floor.disabled = true;

    let mut particles = ParticleBuffers::from_particles(vec![Vec3::new(0.0, -0.5, 0.0)], vec![Vec3::NEG_Y]).unwrap();
    let mut field = particles.view_mut();
    solver.resolve_collisions(&mut field, 0.02, &[floor]);
    assert_eq!(field.positions[0], Vec3::new(0.0, -0.5, 0.0));
}

#[test]
fn bounding_box_toggles_walls_and_floor() {
    let mut shapes = CollisionShapes::new();
    assert!(!shapes.set_check_bounds(true));

    let walls = shapes.add_bounding_box(Vec3::splat(-1.0), Vec3::splat(1.0));
    assert_eq!(shapes.len(), 7);

    // walls face inward: the center is a unit away from each
    for id in walls {
        let wall = shapes.get(id).unwrap();
        assert!(!wall.disabled);
        assert!(near(wall.distance(Vec3::ZERO), 1.0));
    }
    let floor = shapes.iter().find(|(id, _)| !walls.contains(id)).map(|(id, _)| id).unwrap();
    assert!(shapes.get(floor).unwrap().disabled);
    assert!(near(shapes.get(floor).unwrap().distance(Vec3::new(0.0, -1.0, 0.0)), 0.0));

    assert!(shapes.set_check_bounds(false));
    assert!(walls.iter().all(|id| shapes.get(*id).unwrap().disabled));
    assert!(!shapes.get(floor).unwrap().disabled);

    assert!(shapes.set_check_bounds(true));
    assert!(walls.iter().all(|id| !shapes.get(*id).unwrap().disabled));

    // removing a wall forgets the box, the other shapes stay
    assert!(shapes.remove(walls[0]).is_some());
    assert!(shapes.remove(walls[0]).is_none());
    assert!(!shapes.set_check_bounds(false));
    assert_eq!(shapes.len(), 6);
}

#[test]
fn shape_handles_survive_removals() {
    let mut shapes = CollisionShapes::new();
    let a = shapes.add(Collider::sphere(1.0).unwrap());
    let b = shapes.add(Collider::cuboid(Vec3::ONE).unwrap());
    let c = shapes.add(Collider::cylinder(1.0, 1.0).unwrap());
    shapes.remove(b);

    assert!(matches!(shapes.get(a).unwrap().shape(), CollisionShape::Sphere { .. }));
    assert!(matches!(shapes.get(c).unwrap().shape(), CollisionShape::Cylinder { .. }));
    assert!(shapes.get(b).is_none());
    assert_eq!(shapes.as_slice().len(), 2);
}
