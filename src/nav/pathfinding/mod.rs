//! Grid A* with pooled, generation-stamped search contexts.
//!
//! # Algorithm
//!
//! 8-directional A* (cardinal cost 1, diagonal sqrt 2, no corner cutting)
//! with the octile heuristic, or 4-directional with Manhattan. Costs are
//! fixed-point ([`FixedNum`]) so every replica expands nodes in the same
//! order and returns the same path.
//!
//! # Memory
//!
//! Searches allocate nothing in steady state. A [`PathfindingContext`]
//! holds a node array sized to one layer; each search bumps the context's
//! generation instead of clearing it. Contexts live in a [`ContextPool`]
//! and are rented through a guard that returns them on drop.
//!
//! # Dynamic obstacles
//!
//! With `avoid_occupied`, cells holding entities other than the mover are
//! impassable. A goal occupied by another entity fails fast with
//! `BlockedByEntity`.

use bevy::prelude::*;

mod astar;
mod batch;
mod context;
mod types;

#[cfg(test)]
mod tests;

pub use context::{ContextPool, PathfindingContext, RentedContext};
pub use types::{
    heuristic, FixedNum, PathOutcome, PathRequest, PathResult, PathStatus, PathfinderConfig, CARDINAL_COST,
    DIAGONAL_COST,
};

/// Pathfinding service shared by the navigation tick and batch workers.
pub struct Pathfinder {
    config: PathfinderConfig,
    pool: ContextPool,
}

impl Pathfinder {
    pub fn new(config: PathfinderConfig) -> Self {
        info!(
            "[PATHFINDING] {:?} connectivity, budget {} nodes, max path {}",
            config.connectivity, config.node_budget, config.max_path_len
        );
        let pool = ContextPool::new(config.max_pooled_contexts);
        Self { config, pool }
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(PathfinderConfig::default())
    }
}
