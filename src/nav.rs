//! Tile-grid spatial navigation.
//!
//! One engine instance per map: a terrain [`CollisionGrid`] (layout picked by
//! [`select_grid_variant`]), an entity-occupancy [`SpatialIndex`], a pooled A*
//! [`Pathfinder`], and the tick-driven [`NavigationSystem`] that ties them
//! together. [`NavigationPlugin`] wires the system into a bevy `App`.

use bevy::prelude::*;

pub mod config;
pub mod error;
pub mod grid;
pub mod navigation;
pub mod pathfinding;
pub mod spatial_index;
pub mod types;

pub use config::{load_nav_config, NavConfig, DEFAULT_CONFIG_PATH};
pub use error::{GridError, NavError, SnapshotError};
pub use grid::snapshot::{CompressionMode, GridSnapshot};
pub use grid::{
    create_grid, select_grid_variant, CollisionGrid, GridSelection, GridSelectionOptions, GridVariant, MortonTileGrid,
    TileGrid,
};
pub use navigation::{
    AgentState, DestinationRequest, NavAgent, NavEvent, NavEventKind, NavStats, NavStatus, NavigationConfig,
    NavigationSystem, PathJob,
};
pub use pathfinding::{FixedNum, PathOutcome, PathRequest, PathResult, PathStatus, Pathfinder, PathfinderConfig};
pub use spatial_index::{ReservationToken, SpatialIndex, SpatialIndexConfig};
pub use types::{Connectivity, Direction, GridConfig, GridRect, Position, Tile, NO_ENTITY};

/// Runs one map's [`NavigationSystem`] in `FixedUpdate`:
/// `apply_destination_requests -> advance_navigation -> publish_nav_events`.
///
/// Collaborators write [`DestinationRequest`] messages and read [`NavEvent`]
/// messages; agents are added and removed through the resource directly.
pub struct NavigationPlugin {
    pub grid: GridConfig,
    pub config: NavConfig,
}

impl NavigationPlugin {
    /// Plugin for `grid` with configuration loaded from [`DEFAULT_CONFIG_PATH`].
    pub fn new(grid: GridConfig) -> Self {
        Self { grid, config: load_nav_config(DEFAULT_CONFIG_PATH) }
    }

    pub fn with_config(grid: GridConfig, config: NavConfig) -> Self {
        Self { grid, config }
    }
}

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<DestinationRequest>();
        app.add_message::<NavEvent>();
        app.insert_resource(self.config.clone());

        let nav = match NavigationSystem::new(self.grid, &self.config) {
            Ok(nav) => nav,
            Err(e) => {
                error!("[NAV] Cannot build navigation for {:?}: {}", self.grid, e);
                return;
            }
        };
        app.insert_resource(nav);

        app.add_systems(
            FixedUpdate,
            (
                navigation::apply_destination_requests,
                navigation::advance_navigation,
                navigation::publish_nav_events,
            )
                .chain(),
        );
    }
}
