use super::context::PathfindingContext;
use super::*;
use crate::nav::grid::{CollisionGrid, MortonTileGrid, TileGrid};
use crate::nav::spatial_index::{SpatialIndex, SpatialIndexConfig};
use crate::nav::types::{Connectivity, GridConfig, Position, Tile};

fn open_grid(width: i32, height: i32) -> TileGrid {
    TileGrid::new(GridConfig::new(width, height, 1, true).unwrap()).unwrap()
}

fn request(start: (i32, i32), goal: (i32, i32)) -> PathRequest {
    PathRequest {
        start: Position::new(start.0, start.1, 0),
        goal: Position::new(goal.0, goal.1, 0),
        mover: Entity::from_bits(1),
    }
}

fn diag(n: i64) -> FixedNum {
    DIAGONAL_COST * FixedNum::from_num(n)
}

/// Every step adjacent, legal and corner-cut free; returns the summed cost.
fn assert_legal_path(grid: &dyn CollisionGrid, path: &[Position]) -> FixedNum {
    let mut cost = FixedNum::ZERO;
    for pair in path.windows(2) {
        let direction = pair[0]
            .direction_to(pair[1])
            .unwrap_or_else(|| panic!("{} -> {} is not a single step", pair[0], pair[1]));
        assert!(grid.can_step(pair[0], direction), "illegal step {} -> {}", pair[0], pair[1]);
        cost += if direction.is_diagonal() { DIAGONAL_COST } else { CARDINAL_COST };
    }
    cost
}

#[test]
fn test_open_diagonal_is_nine_steps() {
    let grid = open_grid(10, 10);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 64];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 9)), &mut out);
    assert_eq!(result.status, PathStatus::Found);
    assert_eq!(result.len, 10, "start plus 9 diagonal steps");
    assert_eq!(result.cost, diag(9));
    for (i, p) in out[..result.len].iter().enumerate() {
        assert_eq!(*p, Position::new(i as i32, i as i32, 0));
    }
}

#[test]
fn test_four_connectivity_uses_cardinal_steps() {
    let grid = open_grid(10, 10);
    let finder = Pathfinder::new(PathfinderConfig { connectivity: Connectivity::Four, ..Default::default() });
    let mut out = [Position::default(); 64];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 9)), &mut out);
    assert_eq!(result.status, PathStatus::Found);
    assert_eq!(result.len, 19);
    assert_eq!(result.cost, FixedNum::from_num(18));
    assert!(out[..result.len].windows(2).all(|w| w[0].direction_to(w[1]).is_some_and(|d| !d.is_diagonal())));
}

fn walled_grid(gap: bool) -> TileGrid {
    let mut grid = open_grid(10, 10);
    for y in 0..10 {
        if gap && y == 5 {
            continue;
        }
        grid.set_tile(Position::new(5, y, 0), Tile::WALL);
    }
    grid
}

#[test]
fn test_route_through_wall_gap() {
    let grid = walled_grid(true);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 64];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 0)), &mut out);
    assert_eq!(result.status, PathStatus::Found);
    let path = &out[..result.len];
    assert!(path.contains(&Position::new(5, 5, 0)), "path must use the gap");
    assert_eq!(assert_legal_path(&grid, path), result.cost);
}

#[test]
fn test_sealed_wall_is_no_path() {
    let grid = walled_grid(false);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 64];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 0)), &mut out);
    assert_eq!(result.status, PathStatus::NoPath);
    assert_eq!(result.len, 0);
    assert_eq!(result.expanded, 50, "whole left half explored");
}

#[test]
fn test_unreachable_goal_beyond_budget() {
    let mut grid = open_grid(64, 64);
    // Box the goal in.
    for (x, y) in [(59, 59), (60, 59), (61, 59), (59, 60), (61, 60), (59, 61), (60, 61), (61, 61)] {
        grid.set_tile(Position::new(x, y, 0), Tile::WALL);
    }
    let mut out = [Position::default(); 256];

    let tight = Pathfinder::new(PathfinderConfig { node_budget: 100, ..Default::default() });
    let result = tight.find_path(&grid, None, &request((0, 0), (60, 60)), &mut out);
    assert_eq!(result.status, PathStatus::BudgetExceeded);
    assert_eq!(result.expanded, 100);

    let roomy = Pathfinder::default();
    let result = roomy.find_path(&grid, None, &request((0, 0), (60, 60)), &mut out);
    assert_eq!(result.status, PathStatus::NoPath);
}

#[test]
fn test_short_buffer_truncates() {
    let grid = open_grid(10, 10);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 4];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 9)), &mut out);
    assert_eq!(result.status, PathStatus::Truncated);
    assert_eq!(result.len, 4);
    assert_eq!(out[0], Position::new(0, 0, 0), "leading part is written");
    assert_eq!(out[3], Position::new(3, 3, 0));
    assert_eq!(result.cost, diag(9), "cost covers the full path");
}

#[test]
fn test_max_path_len_caps_output() {
    let grid = open_grid(10, 10);
    let finder = Pathfinder::new(PathfinderConfig { max_path_len: 5, ..Default::default() });
    let mut out = [Position::default(); 64];

    let result = finder.find_path(&grid, None, &request((0, 0), (9, 9)), &mut out);
    assert_eq!(result.status, PathStatus::Truncated);
    assert_eq!(result.len, 5);
}

#[test]
fn test_endpoint_failures() {
    let mut grid = TileGrid::new(GridConfig::new(8, 8, 2, false).unwrap()).unwrap();
    grid.set_tile(Position::new(4, 4, 0), Tile::WALL);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 16];
    let mover = Entity::from_bits(1);

    let oob = PathRequest { start: Position::new(0, 0, 0), goal: Position::new(8, 0, 0), mover };
    assert_eq!(finder.find_path(&grid, None, &oob, &mut out).status, PathStatus::OutOfBounds);

    let cross = PathRequest { start: Position::new(0, 0, 0), goal: Position::new(1, 1, 1), mover };
    assert_eq!(finder.find_path(&grid, None, &cross, &mut out).status, PathStatus::NoPath);

    let walled = request((0, 0), (4, 4));
    assert_eq!(finder.find_path(&grid, None, &walled, &mut out).status, PathStatus::BlockedByTerrain);

    let same = request((2, 2), (2, 2));
    let result = finder.find_path(&grid, None, &same, &mut out);
    assert_eq!(result.status, PathStatus::Found);
    assert_eq!(result.len, 1);
}

#[test]
fn test_blocked_start_may_leave() {
    let mut grid = open_grid(5, 5);
    grid.set_tile(Position::new(0, 0, 0), Tile::WALL);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 16];

    let result = finder.find_path(&grid, None, &request((0, 0), (4, 0)), &mut out);
    assert_eq!(result.status, PathStatus::Found);
    assert_eq!(result.len, 5);
}

#[test]
fn test_occupied_cells_are_dynamic_obstacles() {
    // 5x3 with only the middle row walkable.
    let mut grid = open_grid(5, 3);
    for x in 0..5 {
        grid.set_tile(Position::new(x, 0, 0), Tile::WALL);
        grid.set_tile(Position::new(x, 2, 0), Tile::WALL);
    }
    let mut index = SpatialIndex::new(*grid.config(), &SpatialIndexConfig::default());
    let mover = Entity::from_bits(1);
    let other = Entity::from_bits(2);
    index.insert(Position::new(0, 1, 0), mover);
    index.insert(Position::new(2, 1, 0), other);

    let mut out = [Position::default(); 16];
    let avoid = Pathfinder::default();
    let req = request((0, 1), (4, 1));
    assert_eq!(avoid.find_path(&grid, Some(&index), &req, &mut out).status, PathStatus::NoPath);

    let to_other = request((0, 1), (2, 1));
    assert_eq!(
        avoid.find_path(&grid, Some(&index), &to_other, &mut out).status,
        PathStatus::BlockedByEntity
    );

    let ignore = Pathfinder::new(PathfinderConfig { avoid_occupied: false, ..Default::default() });
    assert_eq!(ignore.find_path(&grid, Some(&index), &req, &mut out).status, PathStatus::Found);
}

#[test]
fn test_random_maps_paths_are_legal_and_deterministic() {
    let mut rng = fastrand::Rng::with_seed(1234);
    let finder = Pathfinder::default();
    let mut a = vec![Position::default(); 1024];
    let mut b = vec![Position::default(); 1024];

    for _ in 0..20 {
        let mut grid = MortonTileGrid::new(GridConfig::new(32, 32, 1, true).unwrap()).unwrap();
        for _ in 0..250 {
            grid.set_tile(Position::new(rng.i32(0..32), rng.i32(0..32), 0), Tile::WALL);
        }
        let req = request((rng.i32(0..32), rng.i32(0..32)), (rng.i32(0..32), rng.i32(0..32)));
        if grid.is_blocked(req.start) {
            continue;
        }

        let first = finder.find_path(&grid, None, &req, &mut a);
        let second = finder.find_path(&grid, None, &req, &mut b);
        assert_eq!(first, second);
        assert_eq!(a[..first.len], b[..second.len]);

        if first.status == PathStatus::Found {
            let path = &a[..first.len];
            assert_eq!(path[0], req.start);
            assert_eq!(path[first.len - 1], req.goal);
            assert_eq!(assert_legal_path(&grid, path), first.cost);
            assert!(first.cost >= heuristic(req.start, req.goal, Connectivity::Eight));
        }
    }
}

#[test]
fn test_contexts_are_pooled() {
    let grid = open_grid(16, 16);
    let finder = Pathfinder::default();
    let mut out = [Position::default(); 64];

    for _ in 0..5 {
        finder.find_path(&grid, None, &request((0, 0), (15, 7)), &mut out);
    }
    assert_eq!(finder.pool().created(), 1, "one context reused across searches");
    assert_eq!(finder.pool().available(), 1, "context returned after each search");
}

#[test]
fn test_generation_wrap_resets_stamps() {
    let mut ctx = PathfindingContext::default();
    ctx.begin_search(16);
    ctx.nodes[3].generation = 7;
    ctx.nodes[3].closed_generation = 7;

    ctx.force_generation(u32::MAX);
    let generation = ctx.begin_search(16);
    assert_eq!(generation, 1);
    assert!(ctx.nodes.iter().all(|n| n.generation == 0 && n.closed_generation == 0));
}

#[test]
fn test_batch_matches_single_queries() {
    let grid = walled_grid(true);
    let finder = Pathfinder::default();
    let requests = vec![
        request((0, 0), (9, 9)),
        request((0, 9), (9, 0)),
        request((1, 1), (1, 1)),
        request((0, 0), (5, 0)),
    ];

    let outcomes = finder.find_paths_batch(&grid, None, &requests);
    assert_eq!(outcomes.len(), requests.len());

    let mut out = vec![Position::default(); finder.config().max_path_len];
    for (req, outcome) in requests.iter().zip(&outcomes) {
        let single = finder.find_path(&grid, None, req, &mut out);
        assert_eq!(outcome.result, single);
        assert_eq!(outcome.path, out[..single.len].to_vec());
    }
    assert_eq!(outcomes[3].result.status, PathStatus::BlockedByTerrain);
}
