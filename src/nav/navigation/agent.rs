use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::nav::error::NavError;
use crate::nav::pathfinding::FixedNum;
use crate::nav::types::{Position, NO_ENTITY};

/// Navigation state of one agent.
///
/// ```text
/// Idle ──set_destination──> Computing ──path──> Ready ──> Following ──> Completed
///                              │                            │    ^
///                              └──no path──> Failed         v    │
///                                                          Waiting
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavStatus {
    #[default]
    Idle,
    /// Queued for (or waiting on) a path computation.
    Computing,
    /// Path received, first step not attempted yet.
    Ready,
    Following,
    /// Next cell is occupied or reserved; retried every tick.
    Waiting,
    Completed,
    /// Planning failed; see [`NavAgent::failure`]. Not retried automatically.
    Failed,
}

/// Tick-counted move between two adjacent cells. The target cell is
/// already occupied in the spatial index; the agent's queryable position
/// switches to `to` once `elapsed >= duration`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStep {
    pub from: Position,
    pub to: Position,
    pub elapsed: u32,
    pub duration: u32,
}

#[derive(Clone, Debug)]
pub struct NavAgent {
    pub entity: Entity,
    /// Committed position. Lags the occupied cell while a step is in flight.
    pub position: Position,
    pub destination: Option<Position>,
    pub waypoints: Vec<Position>,
    pub next_index: usize,
    pub status: NavStatus,
    pub failure: Option<NavError>,
    /// Occupant of the cell this agent is waiting for, or `NO_ENTITY`.
    pub blocked_by: Entity,
    pub step: Option<ActiveStep>,
    /// Cells per base step duration. Higher is faster.
    pub speed: FixedNum,
    /// Id of the most recent path request; older results are stale.
    pub request_id: u64,
    /// False when the current path was truncated and ends short of the destination.
    pub path_complete: bool,
    /// Destination moved within the replan threshold since the path was planned.
    pub destination_moved: bool,
    pub wait_ticks: u32,
}

impl NavAgent {
    pub fn new(entity: Entity, position: Position, speed: FixedNum) -> Self {
        Self {
            entity,
            position,
            destination: None,
            waypoints: Vec::new(),
            next_index: 0,
            status: NavStatus::Idle,
            failure: None,
            blocked_by: NO_ENTITY,
            step: None,
            speed,
            request_id: 0,
            path_complete: false,
            destination_moved: false,
            wait_ticks: 0,
        }
    }

    /// Cell this agent holds in the spatial index: the step target while
    /// moving, otherwise the committed position.
    #[inline]
    pub fn occupied_cell(&self) -> Position {
        self.step.map_or(self.position, |step| step.to)
    }

    pub fn is_moving(&self) -> bool {
        self.step.is_some()
    }

    pub fn remaining_waypoints(&self) -> &[Position] {
        self.waypoints.get(self.next_index..).unwrap_or(&[])
    }

    /// Whether the agent is working towards its destination.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            NavStatus::Computing | NavStatus::Ready | NavStatus::Following | NavStatus::Waiting
        )
    }

    pub fn state(&self) -> AgentState {
        AgentState {
            position: self.position,
            occupied_cell: self.occupied_cell(),
            destination: self.destination,
            status: self.status,
            failure: self.failure,
            blocked_by: (self.blocked_by != NO_ENTITY).then_some(self.blocked_by),
            moving: self.is_moving(),
            remaining_waypoints: self.remaining_waypoints().len(),
        }
    }
}

/// Read-only view of an agent for collaborators (AI, networking, UI).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    pub occupied_cell: Position,
    pub destination: Option<Position>,
    pub status: NavStatus,
    pub failure: Option<NavError>,
    pub blocked_by: Option<Entity>,
    pub moving: bool,
    pub remaining_waypoints: usize,
}
