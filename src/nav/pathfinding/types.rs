use bevy::prelude::*;
use fixed::types::I48F16;
use serde::{Deserialize, Serialize};

use crate::nav::error::NavError;
use crate::nav::types::{Connectivity, Position};

/// Deterministic fixed-point scalar for path costs.
///
/// I48F16: 48 integer bits, 16 fractional bits. Identical results on every
/// platform, which keeps replicated simulations in lockstep.
pub type FixedNum = I48F16;

/// Cost of a cardinal step.
pub const CARDINAL_COST: FixedNum = FixedNum::from_bits(1 << 16);

/// Cost of a diagonal step: sqrt(2) rounded to 16 fractional bits.
pub const DIAGONAL_COST: FixedNum = FixedNum::from_bits(92_682);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Maximum node expansions per search.
    pub node_budget: usize,
    /// `Eight` uses the octile heuristic, `Four` Manhattan.
    pub connectivity: Connectivity,
    /// Treat cells occupied by other entities as obstacles.
    pub avoid_occupied: bool,
    /// Longest path written out, start included. Longer paths are truncated.
    pub max_path_len: usize,
    /// Idle search contexts kept for reuse.
    pub max_pooled_contexts: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            node_budget: 65_536,
            connectivity: Connectivity::Eight,
            avoid_occupied: true,
            max_path_len: 1024,
            max_pooled_contexts: 8,
        }
    }
}

/// One path query. `mover` is excluded from dynamic-obstacle checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    pub start: Position,
    pub goal: Position,
    pub mover: Entity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStatus {
    Found,
    /// Path found but longer than the output buffer; the leading part was written.
    Truncated,
    NoPath,
    BudgetExceeded,
    OutOfBounds,
    BlockedByTerrain,
    BlockedByEntity,
}

impl PathStatus {
    /// Whether waypoints were written.
    pub fn has_path(self) -> bool {
        matches!(self, PathStatus::Found | PathStatus::Truncated)
    }

    /// Failure reason, `None` on a complete path.
    pub fn error(self) -> Option<NavError> {
        match self {
            PathStatus::Found => None,
            PathStatus::Truncated => Some(NavError::Truncated),
            PathStatus::NoPath => Some(NavError::NoPath),
            PathStatus::BudgetExceeded => Some(NavError::BudgetExceeded),
            PathStatus::OutOfBounds => Some(NavError::OutOfBounds),
            PathStatus::BlockedByTerrain => Some(NavError::BlockedByTerrain),
            PathStatus::BlockedByEntity => Some(NavError::BlockedByEntity),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathResult {
    pub status: PathStatus,
    /// Waypoints written, start included.
    pub len: usize,
    /// Cost of the full path (not just the written part).
    pub cost: FixedNum,
    /// Nodes expanded by the search.
    pub expanded: usize,
}

impl PathResult {
    pub(crate) fn failed(status: PathStatus, expanded: usize) -> Self {
        Self { status, len: 0, cost: FixedNum::ZERO, expanded }
    }
}

/// Owned result of a batch query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathOutcome {
    pub result: PathResult,
    pub path: Vec<Position>,
}

/// Admissible, consistent estimate from `a` to `b` on one layer.
#[inline]
pub fn heuristic(a: Position, b: Position, connectivity: Connectivity) -> FixedNum {
    let dx = (a.x as i64 - b.x as i64).abs();
    let dy = (a.y as i64 - b.y as i64).abs();
    match connectivity {
        Connectivity::Four => CARDINAL_COST * FixedNum::from_num(dx + dy),
        Connectivity::Eight => {
            let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
            CARDINAL_COST * FixedNum::from_num(hi - lo) + DIAGONAL_COST * FixedNum::from_num(lo)
        }
    }
}

/// Cost of a single cardinal or diagonal step.
#[inline]
pub fn step_cost(diagonal: bool) -> FixedNum {
    if diagonal {
        DIAGONAL_COST
    } else {
        CARDINAL_COST
    }
}
