use bevy_sph_pour::cpu::spatial_hash::SpatialHashGrid;
use glam::{IVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_cloud(n: usize, extent: f32, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            )
        })
        .collect()
}

#[test]
fn query_is_a_superset_of_true_neighbors() {
    let positions = random_cloud(600, 1.0, 7);
    let mut grid = SpatialHashGrid::new(0.2, positions.len());
    grid.rebuild(&positions, positions.len());

    let mut out = Vec::new();
    for radius in [0.05, 0.2, 0.35] {
        for i in 0..positions.len() {
            grid.query(&positions, i, radius, &mut out);
            for (j, p) in positions.iter().enumerate() {
                if positions[i].distance(*p) <= radius {
                    assert!(out.contains(&j), "particle {j} missing from query of {i} at r={radius}");
                }
            }
        }
    }
}

#[test]
fn query_lists_each_particle_once() {
    // a tiny table makes many cells of the query cube share a bucket
    let positions = random_cloud(4, 0.5, 3);
    let mut grid = SpatialHashGrid::new(0.1, positions.len());
    grid.rebuild(&positions, positions.len());

    let mut out = Vec::new();
    grid.query(&positions, 0, 0.3, &mut out);
    let mut deduped = out.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), out.len());
}

#[test]
fn query_resets_output() {
    let positions = vec![Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0)];
    let mut grid = SpatialHashGrid::new(0.2, 2);
    grid.rebuild(&positions, 2);

    let mut out = vec![42, 43, 44];
    grid.query(&positions, 0, 0.2, &mut out);
    assert!(out.contains(&0));
    assert!(!out.contains(&42));
}

#[test]
fn rebuild_only_indexes_the_first_count_particles() {
    let positions = vec![Vec3::ZERO; 10];
    let mut grid = SpatialHashGrid::new(0.2, 10);
    grid.rebuild(&positions, 4);

    let mut out = Vec::new();
    grid.query(&positions, 0, 0.2, &mut out);
    out.sort_unstable();
    assert_eq!(out, vec![0, 1, 2, 3]);
}

#[test]
fn empty_grid_answers_nothing() {
    let positions = vec![Vec3::ZERO];
    let mut grid = SpatialHashGrid::new(0.2, 0);
    assert_eq!(grid.table_size(), 0);
    grid.rebuild(&positions, 1);

    let mut out = vec![1];
    grid.query(&positions, 0, 0.2, &mut out);
    assert!(out.is_empty());
}

#[test]
fn hash_stays_in_table() {
    let grid = SpatialHashGrid::new(0.2, 50);
    assert_eq!(grid.table_size(), 100);
    for c in [IVec3::ZERO, IVec3::new(-1, 2, -3), IVec3::splat(i32::MAX), IVec3::splat(i32::MIN)] {
        assert!(grid.hash_coords(c) < 100);
        assert_eq!(grid.hash_coords(c), grid.hash_coords(c));
    }
}
