use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::morton::MAX_MORTON_SIDE;
use super::{CollisionGrid, GridVariant, MortonTileGrid, TileGrid};
use crate::nav::error::GridError;
use crate::nav::types::{GridConfig, Tile};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Inputs to the grid layout heuristic.
///
/// Passed explicitly to [`select_grid_variant`]; there is no process-wide
/// default to mutate. The options only change which layout is built, never
/// what any query returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSelectionOptions {
    /// Always build this variant.
    pub force_variant: Option<GridVariant>,
    /// Never build this variant.
    pub disable_variant: Option<GridVariant>,
    /// Layers smaller than this many cells stay row-major.
    pub area_threshold: usize,
    /// Below this estimated Morton footprint the locality gain is not worth
    /// the build cost.
    pub memory_threshold_mb: f64,
    /// Expected share of range / line-of-sight queries in the workload (0..1).
    pub range_query_weight: f32,
    /// `range_query_weight` at or above this favors Morton.
    pub range_query_weight_threshold: f32,
    /// `layers / sqrt(area)` at or above this favors Morton.
    pub layer_density_threshold: f64,
    /// Areas at or above this always favor Morton.
    pub very_large_area: usize,
    /// `min(w, h) / max(w, h)` at or above this counts as near-square.
    pub square_aspect_threshold: f64,
    /// Near-square maps need at least this many cells to favor Morton.
    pub square_min_area: usize,
}

impl Default for GridSelectionOptions {
    fn default() -> Self {
        Self {
            force_variant: None,
            disable_variant: None,
            area_threshold: 10_000,
            memory_threshold_mb: 0.25,
            range_query_weight: 0.5,
            range_query_weight_threshold: 0.7,
            layer_density_threshold: 0.05,
            very_large_area: 1_000_000,
            square_aspect_threshold: 0.5,
            square_min_area: 16_384,
        }
    }
}

/// Derived sizing figures the heuristic decides on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridEstimates {
    pub area: usize,
    pub simple_bytes: usize,
    pub morton_bytes: usize,
    pub layer_density: f64,
    pub aspect_ratio: f64,
}

impl GridEstimates {
    pub fn compute(width: i32, height: i32, layers: i32) -> Self {
        let w = width.max(0) as usize;
        let h = height.max(0) as usize;
        let layers_n = layers.max(0) as usize;
        let area = w * h;
        let cells = area * layers_n;
        let tile = std::mem::size_of::<Tile>();

        let simple_bytes = cells * tile;
        // Tiles + one cache byte per cell + both rank tables (shared by all layers).
        let morton_bytes = cells * tile + cells + area * (4 + 4);

        let layer_density = if area == 0 { 0.0 } else { layers_n as f64 / (area as f64).sqrt() };
        let aspect_ratio = if w == 0 || h == 0 { 0.0 } else { w.min(h) as f64 / w.max(h) as f64 };

        Self { area, simple_bytes, morton_bytes, layer_density, aspect_ratio }
    }

    pub fn morton_mb(&self) -> f64 {
        self.morton_bytes as f64 / BYTES_PER_MB
    }
}

/// Outcome of [`select_grid_variant`].
#[derive(Clone, Debug, PartialEq)]
pub struct GridSelection {
    pub variant: GridVariant,
    /// Human-readable reason, for logs and tests.
    pub justification: String,
    pub estimates: GridEstimates,
}

/// Pick a grid layout for a map. Pure: same inputs, same answer.
///
/// Decision order:
/// 1. `force_variant`, then `disable_variant`
/// 2. Morton cannot address sides above 65535 => simple
/// 3. area below `area_threshold` => simple
/// 4. estimated Morton memory below `memory_threshold_mb` => simple
/// 5. high layer density, high range-query weight, very large area, or a
///    near-square map with enough area => Morton
/// 6. otherwise simple
pub fn select_grid_variant(
    width: i32,
    height: i32,
    layers: i32,
    border_blocked: bool,
    options: &GridSelectionOptions,
) -> GridSelection {
    let estimates = GridEstimates::compute(width, height, layers);
    let border = if border_blocked { "blocked" } else { "open" };
    let sizing = format!(
        "{}x{}x{} border {} (est. simple {:.1} KiB, morton {:.1} KiB)",
        width,
        height,
        layers,
        border,
        estimates.simple_bytes as f64 / 1024.0,
        estimates.morton_bytes as f64 / 1024.0,
    );
    let pick = |variant: GridVariant, reason: String| GridSelection {
        variant,
        justification: format!("{variant}: {reason}; {sizing}"),
        estimates,
    };

    if let Some(forced) = options.force_variant {
        return pick(forced, "forced by options".to_string());
    }

    match options.disable_variant {
        Some(GridVariant::Morton) => {
            return pick(GridVariant::Simple, "morton variant disabled by options".to_string());
        }
        Some(GridVariant::Simple) if width <= MAX_MORTON_SIDE && height <= MAX_MORTON_SIDE => {
            return pick(GridVariant::Morton, "simple variant disabled by options".to_string());
        }
        _ => {}
    }

    if width > MAX_MORTON_SIDE || height > MAX_MORTON_SIDE {
        return pick(GridVariant::Simple, format!("side exceeds morton limit {MAX_MORTON_SIDE}"));
    }

    if estimates.area < options.area_threshold {
        return pick(
            GridVariant::Simple,
            format!("area {} below threshold {}", estimates.area, options.area_threshold),
        );
    }

    if estimates.morton_mb() < options.memory_threshold_mb {
        return pick(
            GridVariant::Simple,
            format!(
                "morton footprint {:.3} MB below floor {:.3} MB",
                estimates.morton_mb(),
                options.memory_threshold_mb
            ),
        );
    }

    if estimates.layer_density >= options.layer_density_threshold {
        return pick(
            GridVariant::Morton,
            format!(
                "layer density {:.4} >= {:.4}",
                estimates.layer_density, options.layer_density_threshold
            ),
        );
    }

    if options.range_query_weight >= options.range_query_weight_threshold {
        return pick(
            GridVariant::Morton,
            format!(
                "range query weight {:.2} >= {:.2}",
                options.range_query_weight, options.range_query_weight_threshold
            ),
        );
    }

    if estimates.area >= options.very_large_area {
        return pick(
            GridVariant::Morton,
            format!("area {} >= very large area {}", estimates.area, options.very_large_area),
        );
    }

    if estimates.aspect_ratio >= options.square_aspect_threshold && estimates.area >= options.square_min_area {
        return pick(
            GridVariant::Morton,
            format!(
                "area {} >= square minimum {}, aspect {:.2} near-square",
                estimates.area, options.square_min_area, estimates.aspect_ratio
            ),
        );
    }

    pick(
        GridVariant::Simple,
        format!(
            "no locality signal (density {:.4}, range weight {:.2}, aspect {:.2})",
            estimates.layer_density, options.range_query_weight, estimates.aspect_ratio
        ),
    )
}

/// Build the grid layout chosen by [`select_grid_variant`].
pub fn create_grid(
    config: GridConfig,
    options: &GridSelectionOptions,
) -> Result<(Box<dyn CollisionGrid>, GridSelection), GridError> {
    config.validate()?;
    let selection = select_grid_variant(config.width, config.height, config.layers, config.border_blocked, options);

    let grid: Box<dyn CollisionGrid> = match selection.variant {
        GridVariant::Simple => Box::new(TileGrid::new(config)?),
        GridVariant::Morton => Box::new(MortonTileGrid::new(config)?),
    };

    info!("[GRID] Built {}", selection.justification);
    Ok((grid, selection))
}

/// Build the chosen layout from tiles in canonical order.
pub(crate) fn create_grid_from_tiles(
    config: GridConfig,
    tiles: Vec<Tile>,
    options: &GridSelectionOptions,
) -> Result<(Box<dyn CollisionGrid>, GridSelection), GridError> {
    config.validate()?;
    let selection = select_grid_variant(config.width, config.height, config.layers, config.border_blocked, options);

    let grid: Box<dyn CollisionGrid> = match selection.variant {
        GridVariant::Simple => Box::new(TileGrid::from_tiles(config, tiles)?),
        GridVariant::Morton => Box::new(MortonTileGrid::from_tiles(config, &tiles)?),
    };

    info!("[GRID] Restored {}", selection.justification);
    Ok((grid, selection))
}
