use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::grid::GridSelectionOptions;
use super::navigation::NavigationConfig;
use super::pathfinding::PathfinderConfig;
use super::spatial_index::SpatialIndexConfig;

/// Default location of the engine configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "assets/nav_config.ron";

/// Engine configuration, loaded once when a map is brought up.
///
/// These values are part of the deterministic simulation contract: every
/// replica of a shard must load the same file, and nothing here should change
/// while the map is running. Grid selection options only affect which storage
/// layout is built, never query results.
///
/// Every section is `#[serde(default)]`, so a file may override a single field:
///
/// ```ron
/// (
///     navigation: (max_paths_per_tick: 16),
/// )
/// ```
#[derive(Resource, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct NavConfig {
    pub grid: GridSelectionOptions,
    pub pathfinding: PathfinderConfig,
    pub navigation: NavigationConfig,
    pub spatial: SpatialIndexConfig,
}

impl NavConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str::<NavConfig>(contents)
    }
}

/// Load configuration from `path`, falling back to defaults (with an error
/// logged) when the file is missing or malformed.
pub fn load_nav_config(path: &str) -> NavConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match NavConfig::from_ron_str(&contents) {
            Ok(config) => {
                info!("[CONFIG] Loaded navigation config from {}", path);
                config
            }
            Err(e) => {
                error!("[CONFIG] Failed to parse {}: {}", path, e);
                error!("[CONFIG] Using default NavConfig");
                NavConfig::default()
            }
        },
        Err(e) => {
            error!("[CONFIG] Failed to read {}: {}", path, e);
            error!("[CONFIG] Using default NavConfig");
            NavConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::types::Connectivity;

    #[test]
    fn test_partial_ron_overrides_single_field() {
        let config = NavConfig::from_ron_str("(navigation: (max_paths_per_tick: 3))")
            .expect("partial config should parse");

        assert_eq!(config.navigation.max_paths_per_tick, 3);
        assert_eq!(config.pathfinding, PathfinderConfig::default());
        assert_eq!(config.grid, GridSelectionOptions::default());
    }

    #[test]
    fn test_bundled_config_file_parses() {
        let contents = include_str!("../../assets/nav_config.ron");
        let config = NavConfig::from_ron_str(contents).expect("bundled config should parse");
        assert_eq!(config.pathfinding.connectivity, Connectivity::Eight);
        assert_eq!(config.grid.area_threshold, 10_000);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = NavConfig::default();
        config.navigation.replan_threshold = 4;
        config.spatial.max_pooled_overflow_lists = 7;

        let json = serde_json::to_string(&config).unwrap();
        let back: NavConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_nav_config("does/not/exist.ron");
        assert_eq!(config, NavConfig::default());
    }
}
