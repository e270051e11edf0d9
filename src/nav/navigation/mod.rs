//! Tick-driven navigation: path requests, waypoint following and occupancy
//! hand-off for every agent on one map.
//!
//! [`NavigationSystem`] is the single writer of its map's grid and spatial
//! index. Each tick it services up to `max_paths_per_tick` queued path
//! requests (FIFO), then walks every agent in entity order:
//!
//! 1. an in-flight step advances one tick and commits when its duration is up;
//! 2. a `Ready` agent starts `Following`;
//! 3. a following agent tries to move into its next waypoint. Occupancy in the
//!    spatial index transfers when the step *starts*; the agent's queryable
//!    position changes when it *completes*.
//!
//! Everything is integer ticks and ordered maps, so two systems fed the same
//! calls produce the same states and events.

use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::nav::config::NavConfig;
use crate::nav::error::{GridError, NavError, SnapshotError};
use crate::nav::grid::snapshot::{apply_snapshot, GridSnapshot};
use crate::nav::grid::{create_grid, CollisionGrid, GridSelection};
use crate::nav::pathfinding::{FixedNum, PathRequest, PathResult, Pathfinder};
use crate::nav::spatial_index::{ReservationToken, SpatialIndex};
use crate::nav::types::{GridConfig, Position, Tile};

mod agent;
mod systems;
mod tick;


pub use agent::{ActiveStep, AgentState, NavAgent, NavStatus};
pub use systems::{advance_navigation, apply_destination_requests, publish_nav_events, DestinationRequest};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Path computations serviced per tick; the rest stay queued.
    pub max_paths_per_tick: usize,
    /// Destination changes within this Chebyshev distance keep the current path.
    pub replan_threshold: i32,
    /// Ticks for a cardinal step at speed 1.
    pub cardinal_step_ticks: u32,
    /// Ticks for a diagonal step at speed 1.
    pub diagonal_step_ticks: u32,
    /// Speed of agents added without one. Non-positive values mean 1.
    pub default_speed: f32,
    /// Re-plan after waiting this many ticks on a blocked cell. `None` waits forever.
    pub repath_after_wait_ticks: Option<u32>,
    /// Service each tick's path requests as one rayon batch.
    pub parallel_planning: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_paths_per_tick: 8,
            replan_threshold: 2,
            cardinal_step_ticks: 10,
            diagonal_step_ticks: 14,
            default_speed: 1.0,
            repath_after_wait_ticks: None,
            parallel_planning: false,
        }
    }
}

/// Diagnostics counters, cumulative since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavStats {
    pub paths_requested: u64,
    /// Requests taken off the queue by the tick (stale entries excluded).
    pub paths_serviced: u64,
    pub paths_found: u64,
    pub paths_truncated: u64,
    pub paths_failed: u64,
    pub stale_results: u64,
    pub replans: u64,
    pub steps_started: u64,
    pub steps_completed: u64,
    pub blocked_attempts: u64,
    pub arrivals: u64,
}

/// Agent status transition, published once per occurrence.
#[derive(Message, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEvent {
    pub entity: Entity,
    pub tick: u64,
    pub kind: NavEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavEventKind {
    PathReady { waypoints: usize, truncated: bool },
    PathFailed { reason: NavError },
    /// Next cell taken. `by` is its occupant or reserver (`NO_ENTITY` if unknown).
    Blocked { by: Entity },
    Replanning,
    Completed,
}

/// Path computation handed to an external worker. Results are matched back
/// by `request_id`; a result for an older request is discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathJob {
    pub request_id: u64,
    pub entity: Entity,
    pub request: PathRequest,
}

/// FIFO of `(agent, request id)`. Entries whose id no longer matches the
/// agent's latest request are skipped when popped.
#[derive(Debug, Default)]
pub(crate) struct PathQueue {
    pending: VecDeque<(Entity, u64)>,
    next_request_id: u64,
}

impl PathQueue {
    /// Put `agent` into `Computing` with a fresh request id.
    pub(crate) fn request(&mut self, agent: &mut NavAgent) {
        self.next_request_id += 1;
        agent.status = NavStatus::Computing;
        agent.request_id = self.next_request_id;
        agent.waypoints.clear();
        agent.next_index = 0;
        agent.failure = None;
        agent.blocked_by = crate::nav::types::NO_ENTITY;
        agent.wait_ticks = 0;
        agent.path_complete = false;
        agent.destination_moved = false;
        self.pending.push_back((agent.entity, agent.request_id));
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Navigation engine for one map. See the module docs for the tick order.
#[derive(Resource)]
pub struct NavigationSystem {
    grid: Box<dyn CollisionGrid>,
    selection: GridSelection,
    index: SpatialIndex,
    pathfinder: Pathfinder,
    agents: BTreeMap<Entity, NavAgent>,
    queue: PathQueue,
    config: NavigationConfig,
    default_speed: FixedNum,
    tick: u64,
    path_buffer: Vec<Position>,
    stats: NavStats,
    events: Vec<NavEvent>,
}

impl NavigationSystem {
    /// Build the grid through the layout heuristic and an empty map around it.
    pub fn new(grid_config: GridConfig, config: &NavConfig) -> Result<Self, GridError> {
        let (grid, selection) = create_grid(grid_config, &config.grid)?;
        Ok(Self::with_grid(grid, selection, config))
    }

    pub fn with_grid(grid: Box<dyn CollisionGrid>, selection: GridSelection, config: &NavConfig) -> Self {
        let index = SpatialIndex::new(*grid.config(), &config.spatial);
        let pathfinder = Pathfinder::new(config.pathfinding.clone());
        let default_speed = if config.navigation.default_speed > 0.0 {
            FixedNum::from_num(config.navigation.default_speed)
        } else {
            FixedNum::ONE
        };
        info!(
            "[NAV] Navigation ready on {} grid {}x{}x{}",
            grid.variant(),
            grid.width(),
            grid.height(),
            grid.layers()
        );
        Self {
            path_buffer: vec![Position::default(); config.pathfinding.max_path_len.max(1)],
            grid,
            selection,
            index,
            pathfinder,
            agents: BTreeMap::new(),
            queue: PathQueue::default(),
            config: config.navigation.clone(),
            default_speed,
            tick: 0,
            stats: NavStats::default(),
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn grid(&self) -> &dyn CollisionGrid {
        self.grid.as_ref()
    }

    pub fn selection(&self) -> &GridSelection {
        &self.selection
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &NavStats {
        &self.stats
    }

    pub fn agent(&self, entity: Entity) -> Option<&NavAgent> {
        self.agents.get(&entity)
    }

    /// Agents in entity order.
    pub fn agents(&self) -> impl Iterator<Item = &NavAgent> {
        self.agents.values()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Queued path requests, stale entries included.
    pub fn pending_paths(&self) -> usize {
        self.queue.len()
    }

    // ------------------------------------------------------------------------
    // Terrain
    // ------------------------------------------------------------------------

    /// Tile edit event. Agents whose next step becomes illegal re-plan when
    /// they reach it.
    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        self.grid.set_tile(pos, tile)
    }

    /// Overwrite the terrain from a snapshot of the same shape.
    pub fn load_terrain(&mut self, snapshot: &GridSnapshot) -> Result<(), SnapshotError> {
        apply_snapshot(self.grid.as_mut(), snapshot)?;
        info!("[NAV] Terrain replaced from snapshot at tick {}", self.tick);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------------

    /// Place an agent on `position`. Re-adding an existing agent moves it.
    pub fn add_agent(&mut self, entity: Entity, position: Position, speed: Option<FixedNum>) -> Result<(), NavError> {
        if !self.grid.in_bounds(position) {
            return Err(NavError::OutOfBounds);
        }
        if self.grid.is_blocked(position) {
            return Err(NavError::BlockedByTerrain);
        }
        if self.index.is_occupied_by_other(position, entity) {
            return Err(NavError::BlockedByEntity);
        }
        self.remove_agent(entity);

        self.index.insert(position, entity);
        let speed = speed.filter(|s| *s > FixedNum::ZERO).unwrap_or(self.default_speed);
        self.agents.insert(entity, NavAgent::new(entity, position, speed));
        Ok(())
    }

    /// Remove an agent, its occupancy and every reservation it holds.
    pub fn remove_agent(&mut self, entity: Entity) -> bool {
        let Some(agent) = self.agents.remove(&entity) else {
            return false;
        };
        if !self.index.remove(agent.occupied_cell(), entity) {
            warn!("[NAV] {:?} missing from its cell {}, resynchronizing", entity, agent.occupied_cell());
            self.index.purge(entity);
        }
        self.index.release_all_for(entity);
        true
    }

    /// Give an agent a destination. Returns false for unknown agents.
    ///
    /// A destination within `replan_threshold` of the current one keeps the
    /// current path; the agent re-plans once that path runs out.
    pub fn set_destination(&mut self, entity: Entity, goal: Position) -> bool {
        let Some(agent) = self.agents.get_mut(&entity) else {
            return false;
        };
        if agent.is_active() {
            if let Some(current) = agent.destination {
                if current.chebyshev_distance(goal) <= self.config.replan_threshold {
                    if current != goal {
                        agent.destination = Some(goal);
                        agent.destination_moved = true;
                    }
                    return true;
                }
            }
        }
        agent.destination = Some(goal);
        self.queue.request(agent);
        self.stats.paths_requested += 1;
        true
    }

    /// Claim `pos` for `holder` (agent or not). Agents other than the holder
    /// wait in front of a reserved cell.
    pub fn reserve_cell(&mut self, holder: Entity, pos: Position) -> Result<ReservationToken, NavError> {
        self.index.try_reserve(pos, holder)
    }

    pub fn release_reservation(&mut self, token: &ReservationToken) -> bool {
        self.index.release_reservation(token)
    }

    pub fn query_agent_state(&self, entity: Entity) -> Option<AgentState> {
        self.agents.get(&entity).map(NavAgent::state)
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, NavEvent> {
        self.events.drain(..)
    }

    // ------------------------------------------------------------------------
    // External planning
    // ------------------------------------------------------------------------

    /// Pop up to `max` live path requests for an external worker. The agents
    /// stay `Computing` until [`NavigationSystem::apply_path_result`].
    pub fn take_path_jobs(&mut self, max: usize) -> Vec<PathJob> {
        let mut jobs = Vec::new();
        while jobs.len() < max {
            match self.next_job() {
                Some(job) => jobs.push(job),
                None => break,
            }
        }
        jobs
    }

    /// Deliver a computed path. Returns false (and discards it) when the
    /// agent is gone or has issued a newer request.
    pub fn apply_path_result(&mut self, job: &PathJob, result: &PathResult, path: &[Position]) -> bool {
        let live = self
            .agents
            .get(&job.entity)
            .is_some_and(|agent| agent.request_id == job.request_id && agent.status == NavStatus::Computing);
        if !live {
            self.stats.stale_results += 1;
            debug!("[NAV] Discarding stale path result {} for {:?}", job.request_id, job.entity);
            return false;
        }
        if let Some(agent) = self.agents.get_mut(&job.entity) {
            tick::apply_path(agent, job, result, path, self.tick, &mut self.stats, &mut self.events);
        }
        true
    }

    pub(crate) fn next_job(&mut self) -> Option<PathJob> {
        while let Some((entity, request_id)) = self.queue.pending.pop_front() {
            let Some(agent) = self.agents.get(&entity) else {
                continue;
            };
            if agent.request_id != request_id || agent.status != NavStatus::Computing {
                continue;
            }
            let Some(goal) = agent.destination else {
                continue;
            };
            let request = PathRequest { start: agent.occupied_cell(), goal, mover: entity };
            return Some(PathJob { request_id, entity, request });
        }
        None
    }
}
