use bevy::prelude::*;

use super::context::{OpenEntry, PathNode, PathfindingContext, NO_PARENT};
use super::types::{heuristic, step_cost, FixedNum, PathRequest, PathResult, PathStatus};
use super::Pathfinder;
use crate::nav::grid::{CollisionGrid, NeighborList};
use crate::nav::spatial_index::SpatialIndex;
use crate::nav::types::Position;

impl Pathfinder {
    /// Plan a path and write it into `out`, start included.
    ///
    /// `index`, when given and `avoid_occupied` is set, makes cells occupied
    /// by entities other than `request.mover` impassable. Writes at most
    /// `min(out.len(), max_path_len)` waypoints; a longer path reports
    /// `Truncated` with the leading part written.
    pub fn find_path(
        &self,
        grid: &dyn CollisionGrid,
        index: Option<&SpatialIndex>,
        request: &PathRequest,
        out: &mut [Position],
    ) -> PathResult {
        let PathRequest { start, goal, mover } = *request;

        if !grid.in_bounds(start) || !grid.in_bounds(goal) {
            return PathResult::failed(PathStatus::OutOfBounds, 0);
        }
        if start.z != goal.z {
            return PathResult::failed(PathStatus::NoPath, 0);
        }
        if grid.is_blocked(goal) {
            return PathResult::failed(PathStatus::BlockedByTerrain, 0);
        }
        let obstacles = index.filter(|_| self.config.avoid_occupied);
        if obstacles.is_some_and(|idx| idx.is_occupied_by_other(goal, mover)) {
            return PathResult::failed(PathStatus::BlockedByEntity, 0);
        }

        let limit = out.len().min(self.config.max_path_len);
        if start == goal {
            if limit == 0 {
                return PathResult { status: PathStatus::Truncated, len: 0, cost: FixedNum::ZERO, expanded: 0 };
            }
            out[0] = start;
            return PathResult { status: PathStatus::Found, len: 1, cost: FixedNum::ZERO, expanded: 0 };
        }

        let mut context = self.pool.rent();
        self.search(&mut context, grid, obstacles, request, &mut out[..limit])
    }

    fn search(
        &self,
        ctx: &mut PathfindingContext,
        grid: &dyn CollisionGrid,
        obstacles: Option<&SpatialIndex>,
        request: &PathRequest,
        out: &mut [Position],
    ) -> PathResult {
        let PathRequest { start, goal, mover } = *request;
        let width = grid.width();
        let layer = start.z;
        let connectivity = self.config.connectivity;
        let generation = ctx.begin_search(grid.config().layer_area());

        let local = |p: Position| (p.y * width + p.x) as u32;
        let start_idx = local(start);
        let goal_idx = local(goal);

        let h = heuristic(start, goal, connectivity);
        ctx.nodes[start_idx as usize] = PathNode {
            x: start.x,
            y: start.y,
            g_cost: FixedNum::ZERO,
            h_cost: h,
            parent_index: NO_PARENT,
            generation,
            closed_generation: 0,
        };
        ctx.open.push(OpenEntry { f: h, h, index: start_idx });

        let mut neighbors = NeighborList::new();
        let mut expanded = 0usize;

        while let Some(OpenEntry { index, .. }) = ctx.open.pop() {
            let node = ctx.nodes[index as usize];
            if node.closed_generation == generation {
                continue;
            }
            ctx.nodes[index as usize].closed_generation = generation;

            if index == goal_idx {
                return reconstruct(ctx, goal_idx, node.g_cost, expanded, layer, out);
            }

            if expanded >= self.config.node_budget {
                debug!(
                    "[PATHFINDING] Budget {} exhausted: {} -> {}",
                    self.config.node_budget, start, goal
                );
                return PathResult::failed(PathStatus::BudgetExceeded, expanded);
            }
            expanded += 1;

            let current = Position::new(node.x, node.y, layer);
            grid.walkable_neighbors(current, connectivity, &mut neighbors);

            for &(next, direction) in &neighbors {
                if next != goal && obstacles.is_some_and(|idx| idx.is_occupied_by_other(next, mover)) {
                    continue;
                }
                let next_idx = local(next);
                let slot = &mut ctx.nodes[next_idx as usize];
                if slot.generation != generation {
                    *slot = PathNode {
                        x: next.x,
                        y: next.y,
                        g_cost: FixedNum::MAX,
                        h_cost: heuristic(next, goal, connectivity),
                        parent_index: NO_PARENT,
                        generation,
                        closed_generation: 0,
                    };
                } else if slot.closed_generation == generation {
                    continue;
                }

                let tentative = node.g_cost + step_cost(direction.is_diagonal());
                if tentative < slot.g_cost {
                    slot.g_cost = tentative;
                    slot.parent_index = index;
                    let entry = OpenEntry { f: tentative + slot.h_cost, h: slot.h_cost, index: next_idx };
                    ctx.open.push(entry);
                }
            }
        }

        PathResult::failed(PathStatus::NoPath, expanded)
    }
}

/// Walk parents back from the goal and write the leading `out.len()` cells
/// of the path.
fn reconstruct(
    ctx: &PathfindingContext,
    goal_idx: u32,
    cost: FixedNum,
    expanded: usize,
    layer: i32,
    out: &mut [Position],
) -> PathResult {
    let mut total = 0usize;
    let mut cursor = goal_idx;
    while cursor != NO_PARENT {
        total += 1;
        cursor = ctx.nodes[cursor as usize].parent_index;
    }

    let mut cursor = goal_idx;
    for slot in (0..total).rev() {
        let node = &ctx.nodes[cursor as usize];
        if slot < out.len() {
            out[slot] = Position::new(node.x, node.y, layer);
        }
        cursor = node.parent_index;
    }

    if total > out.len() {
        PathResult { status: PathStatus::Truncated, len: out.len(), cost, expanded }
    } else {
        PathResult { status: PathStatus::Found, len: total, cost, expanded }
    }
}
