use bevy::prelude::*;
use tilenav_macros::profile;

use super::{ActiveStep, NavAgent, NavEvent, NavEventKind, NavStats, NavStatus, NavigationConfig, NavigationSystem, PathJob, PathQueue};
use crate::nav::grid::CollisionGrid;
use crate::nav::pathfinding::{FixedNum, PathRequest, PathResult, PathStatus};
use crate::nav::spatial_index::SpatialIndex;
use crate::nav::types::{Position, NO_ENTITY};
use crate::profile_log;

/// Borrowed state one agent update needs. Split out of the system so the
/// agent map can be iterated mutably alongside it.
struct StepContext<'a> {
    tick: u64,
    grid: &'a dyn CollisionGrid,
    index: &'a mut SpatialIndex,
    config: &'a NavigationConfig,
    queue: &'a mut PathQueue,
    stats: &'a mut NavStats,
    events: &'a mut Vec<NavEvent>,
}

impl StepContext<'_> {
    fn emit(&mut self, entity: Entity, kind: NavEventKind) {
        self.events.push(NavEvent { entity, tick: self.tick, kind });
    }

    fn replan(&mut self, agent: &mut NavAgent) {
        self.queue.request(agent);
        self.stats.paths_requested += 1;
        self.stats.replans += 1;
        self.emit(agent.entity, NavEventKind::Replanning);
    }
}

impl NavigationSystem {
    /// Run `delta_ticks` simulation ticks.
    pub fn advance(&mut self, delta_ticks: u32) {
        for _ in 0..delta_ticks {
            let next = self.tick + 1;
            self.run_tick(next);
        }
    }

    /// One simulation tick: service queued paths, then update every agent
    /// in entity order.
    #[profile]
    pub fn run_tick(&mut self, tick: u64) {
        self.tick = tick;

        let serviced = if self.config.parallel_planning {
            self.service_paths_batched()
        } else {
            self.service_paths()
        };
        self.stats.paths_serviced += serviced as u64;

        let mut ctx = StepContext {
            tick,
            grid: self.grid.as_ref(),
            index: &mut self.index,
            config: &self.config,
            queue: &mut self.queue,
            stats: &mut self.stats,
            events: &mut self.events,
        };
        for agent in self.agents.values_mut() {
            step_agent(agent, &mut ctx);
        }

        profile_log!(
            tick,
            "[NAV] tick {}: {} agents, {} paths serviced, {} queued",
            tick,
            self.agents.len(),
            serviced,
            self.queue.len()
        );
    }

    /// Plan up to `max_paths_per_tick` requests in FIFO order on this thread.
    fn service_paths(&mut self) -> usize {
        let mut serviced = 0;
        while serviced < self.config.max_paths_per_tick {
            let Some(job) = self.next_job() else {
                break;
            };
            let result = self
                .pathfinder
                .find_path(self.grid.as_ref(), Some(&self.index), &job.request, &mut self.path_buffer);
            if let Some(agent) = self.agents.get_mut(&job.entity) {
                let path = &self.path_buffer[..result.len];
                apply_path(agent, &job, &result, path, self.tick, &mut self.stats, &mut self.events);
            }
            serviced += 1;
        }
        serviced
    }

    /// Same contract as [`Self::service_paths`], planned as one rayon batch.
    fn service_paths_batched(&mut self) -> usize {
        let jobs = self.take_path_jobs(self.config.max_paths_per_tick);
        if jobs.is_empty() {
            return 0;
        }
        let requests: Vec<PathRequest> = jobs.iter().map(|job| job.request).collect();
        let outcomes = self
            .pathfinder
            .find_paths_batch(self.grid.as_ref(), Some(&self.index), &requests);
        for (job, outcome) in jobs.iter().zip(&outcomes) {
            self.apply_path_result(job, &outcome.result, &outcome.path);
        }
        jobs.len()
    }
}

/// Store a planning result on a `Computing` agent.
pub(super) fn apply_path(
    agent: &mut NavAgent,
    job: &PathJob,
    result: &PathResult,
    path: &[Position],
    tick: u64,
    stats: &mut NavStats,
    events: &mut Vec<NavEvent>,
) {
    if result.status.has_path() && !path.is_empty() {
        let truncated = result.status == PathStatus::Truncated;
        agent.waypoints.clear();
        agent.waypoints.extend_from_slice(path);
        agent.next_index = 0;
        agent.path_complete = !truncated;
        agent.destination_moved = agent.destination != Some(job.request.goal);
        agent.status = NavStatus::Ready;
        agent.failure = None;

        stats.paths_found += 1;
        if truncated {
            stats.paths_truncated += 1;
        }
        events.push(NavEvent {
            entity: agent.entity,
            tick,
            kind: NavEventKind::PathReady { waypoints: path.len(), truncated },
        });
        return;
    }

    let reason = result.status.error().unwrap_or(crate::nav::error::NavError::NoPath);
    agent.status = NavStatus::Failed;
    agent.failure = Some(reason);
    stats.paths_failed += 1;
    debug!(
        "[NAV] Path {} -> {} for {:?} failed: {}",
        job.request.start, job.request.goal, agent.entity, reason
    );
    events.push(NavEvent { entity: agent.entity, tick, kind: NavEventKind::PathFailed { reason } });
}

/// Ticks for one step: `ceil(base / speed)`, at least 1.
pub(super) fn step_duration(base_ticks: u32, speed: FixedNum) -> u32 {
    (FixedNum::from_num(base_ticks) / speed).ceil().saturating_to_num::<u32>().max(1)
}

fn step_agent(agent: &mut NavAgent, ctx: &mut StepContext<'_>) {
    if let Some(step) = agent.step.as_mut() {
        step.elapsed += 1;
        if step.elapsed < step.duration {
            return;
        }
        agent.position = step.to;
        agent.step = None;
        ctx.stats.steps_completed += 1;
    }

    if agent.status == NavStatus::Ready {
        agent.status = NavStatus::Following;
    }
    if !matches!(agent.status, NavStatus::Following | NavStatus::Waiting) {
        return;
    }

    loop {
        let Some(&next) = agent.waypoints.get(agent.next_index) else {
            if agent.path_complete && !agent.destination_moved {
                agent.status = NavStatus::Completed;
                agent.blocked_by = NO_ENTITY;
                ctx.stats.arrivals += 1;
                ctx.emit(agent.entity, NavEventKind::Completed);
            } else {
                ctx.replan(agent);
            }
            return;
        };

        if next == agent.position {
            agent.next_index += 1;
            continue;
        }

        // Terrain changed under the path, or the path no longer starts here.
        let Some(direction) = agent.position.direction_to(next) else {
            ctx.replan(agent);
            return;
        };
        if !ctx.grid.can_step(agent.position, direction) {
            ctx.replan(agent);
            return;
        }

        if ctx.index.try_move(agent.position, next, agent.entity) {
            let base = if direction.is_diagonal() {
                ctx.config.diagonal_step_ticks
            } else {
                ctx.config.cardinal_step_ticks
            };
            agent.step = Some(ActiveStep {
                from: agent.position,
                to: next,
                elapsed: 0,
                duration: step_duration(base, agent.speed),
            });
            agent.next_index += 1;
            agent.status = NavStatus::Following;
            agent.blocked_by = NO_ENTITY;
            agent.wait_ticks = 0;
            ctx.stats.steps_started += 1;
            return;
        }

        let blocker = ctx
            .index
            .try_get_first(next)
            .or_else(|| ctx.index.reservation_holder(next))
            .unwrap_or(NO_ENTITY);
        ctx.stats.blocked_attempts += 1;
        agent.wait_ticks += 1;
        if agent.status != NavStatus::Waiting || agent.blocked_by != blocker {
            ctx.emit(agent.entity, NavEventKind::Blocked { by: blocker });
        }
        agent.status = NavStatus::Waiting;
        agent.blocked_by = blocker;

        if let Some(limit) = ctx.config.repath_after_wait_ticks {
            if agent.wait_ticks >= limit {
                ctx.replan(agent);
            }
        }
        return;
    }
}
