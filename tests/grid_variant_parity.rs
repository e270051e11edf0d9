use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilenav::nav::grid::NeighborList;
use tilenav::nav::{
    CollisionGrid, Connectivity, GridConfig, GridRect, MortonTileGrid, PathRequest, Pathfinder, PathfinderConfig,
    Position, Tile, TileGrid,
};

/// Both layouts filled with the same random terrain. Tile types vary so the
/// snapshot-visible bytes differ between cells, not just the blocked bit.
fn random_pair(width: i32, height: i32, layers: i32, density: f64, seed: u64) -> (TileGrid, MortonTileGrid) {
    let config = GridConfig::new(width, height, layers, seed % 2 == 0).unwrap();
    let mut simple = TileGrid::new(config).unwrap();
    let mut morton = MortonTileGrid::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);

    for z in 0..layers {
        for y in 0..height {
            for x in 0..width {
                let tile = if rng.random_bool(density) {
                    Tile::WALL
                } else {
                    Tile::new(rng.random_range(0..4u8), 0)
                };
                let pos = Position::new(x, y, z);
                assert!(simple.set_tile(pos, tile));
                assert!(morton.set_tile(pos, tile));
            }
        }
    }
    (simple, morton)
}

fn random_pos(rng: &mut StdRng, width: i32, height: i32, layers: i32, margin: i32) -> Position {
    Position::new(
        rng.random_range(-margin..width + margin),
        rng.random_range(-margin..height + margin),
        rng.random_range(0..layers),
    )
}

fn run_query_parity(width: i32, height: i32, layers: i32, density: f64, seed: u64) {
    let (simple, morton) = random_pair(width, height, layers, density, seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    for z in -1..=layers {
        for y in -2..height + 2 {
            for x in -2..width + 2 {
                let pos = Position::new(x, y, z);
                assert_eq!(simple.tile(pos), morton.tile(pos), "tile mismatch at {pos} (seed {seed})");
                assert_eq!(simple.is_blocked(pos), morton.is_blocked(pos), "blocked mismatch at {pos} (seed {seed})");
            }
        }
    }

    for _ in 0..200 {
        let a = random_pos(&mut rng, width, height, layers, 4);
        let b = random_pos(&mut rng, width, height, layers, 4);
        let rect = GridRect::from_corners(a, Position::new(b.x, b.y, a.z));
        assert_eq!(
            simple.count_blocked_in_area(rect),
            morton.count_blocked_in_area(rect),
            "count mismatch for {rect:?} (seed {seed})"
        );
        assert_eq!(
            simple.any_blocked_in_area(rect),
            morton.any_blocked_in_area(rect),
            "any mismatch for {rect:?} (seed {seed})"
        );
        assert_eq!(
            simple.has_line_of_sight(a, b),
            morton.has_line_of_sight(a, b),
            "line of sight mismatch {a} -> {b} (seed {seed})"
        );
    }

    let mut simple_neighbors = NeighborList::new();
    let mut morton_neighbors = NeighborList::new();
    for _ in 0..200 {
        let pos = random_pos(&mut rng, width, height, layers, 0);
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            simple.walkable_neighbors(pos, connectivity, &mut simple_neighbors);
            morton.walkable_neighbors(pos, connectivity, &mut morton_neighbors);
            assert_eq!(simple_neighbors, morton_neighbors, "neighbors mismatch at {pos} (seed {seed})");
        }
    }
}

#[test]
fn test_query_parity_across_densities() {
    run_query_parity(64, 64, 1, 0.05, 0xA1);
    run_query_parity(64, 64, 1, 0.35, 0xB2);
    run_query_parity(37, 91, 2, 0.20, 0xC3);
}

#[test]
fn test_query_parity_odd_shapes() {
    run_query_parity(1, 50, 1, 0.30, 0xD4);
    run_query_parity(129, 3, 3, 0.25, 0xE5);
}

#[test]
fn test_pathfinding_parity() {
    let (simple, morton) = random_pair(48, 48, 1, 0.25, 0xF6);
    let finder = Pathfinder::new(PathfinderConfig::default());
    let mut rng = StdRng::seed_from_u64(0xF7);
    let mut simple_out = vec![Position::default(); 512];
    let mut morton_out = vec![Position::default(); 512];

    for _ in 0..100 {
        let request = PathRequest {
            start: random_pos(&mut rng, 48, 48, 1, 0),
            goal: random_pos(&mut rng, 48, 48, 1, 0),
            mover: Entity::from_bits(1),
        };
        let a = finder.find_path(&simple, None, &request, &mut simple_out);
        let b = finder.find_path(&morton, None, &request, &mut morton_out);
        assert_eq!(a, b, "result mismatch for {request:?}");
        assert_eq!(simple_out[..a.len], morton_out[..b.len], "path mismatch for {request:?}");
    }
}
