//! Terrain collision grids.
//!
//! Two storage layouts implement the same [`CollisionGrid`] contract:
//!
//! - [`TileGrid`]: row-major tiles, cheapest to build, best for small maps.
//! - [`MortonTileGrid`]: tiles and a per-layer collision cache stored in
//!   Z-order rank, trading build time and memory for locality on range and
//!   line-of-sight queries.
//!
//! Callers never pick a layout directly; [`select_grid_variant`] decides from
//! the map shape and [`create_grid`] builds the chosen one. Query results are
//! identical across layouts (see `tests/grid_variant_parity.rs`).
//!
//! # Border policy
//!
//! Nothing here fails for out-of-range coordinates. A point outside
//! `[0, width) x [0, height) x [0, layers)` reads as blocked exactly when
//! `border_blocked` is set, and rectangle queries count the out-of-bounds
//! part of a rectangle as `area - clipped_area`, so no cell is counted twice.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::types::{Connectivity, Direction, GridConfig, GridRect, Position, Tile};

mod factory;
mod morton;
mod morton_grid;
pub mod snapshot;
mod tile_grid;


pub use factory::{create_grid, select_grid_variant, GridEstimates, GridSelection, GridSelectionOptions};
pub use morton::MortonMapping;
pub use morton_grid::MortonTileGrid;
pub use tile_grid::TileGrid;

/// Storage layout of a [`CollisionGrid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridVariant {
    /// Row-major [`TileGrid`].
    Simple,
    /// Z-order [`MortonTileGrid`].
    Morton,
}

impl std::fmt::Display for GridVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridVariant::Simple => f.write_str("simple"),
            GridVariant::Morton => f.write_str("morton"),
        }
    }
}

/// Walkable neighbor: the cell and the direction taken to reach it.
pub type NeighborList = SmallVec<[(Position, Direction); 8]>;

/// Terrain collision contract shared by both grid layouts.
///
/// Implementors supply tile storage and the blocked-cell primitives; bounds
/// handling, line of sight and neighbor enumeration are provided on top of
/// them so both layouts answer identically.
pub trait CollisionGrid: Send + Sync {
    fn config(&self) -> &GridConfig;

    fn variant(&self) -> GridVariant;

    /// Tile at `pos`, or `None` out of bounds.
    fn tile(&self, pos: Position) -> Option<Tile>;

    /// Tile edit event (door opened, wall built). Updates every derived
    /// cache. Returns false out of bounds.
    fn set_tile(&mut self, pos: Position, tile: Tile) -> bool;

    /// Blocked test for an in-bounds cell. Callers guarantee bounds.
    fn is_blocked_in_bounds(&self, pos: Position) -> bool;

    /// Number of blocked cells inside an already clipped rectangle.
    fn count_blocked_clipped(&self, rect: GridRect) -> usize;

    /// Whether any cell inside an already clipped rectangle is blocked.
    fn any_blocked_clipped(&self, rect: GridRect) -> bool;

    /// Approximate heap footprint of the storage in bytes.
    fn memory_bytes(&self) -> usize;

    // ------------------------------------------------------------------------
    // Provided
    // ------------------------------------------------------------------------

    #[inline]
    fn width(&self) -> i32 {
        self.config().width
    }

    #[inline]
    fn height(&self) -> i32 {
        self.config().height
    }

    #[inline]
    fn layers(&self) -> i32 {
        self.config().layers
    }

    #[inline]
    fn border_blocked(&self) -> bool {
        self.config().border_blocked
    }

    #[inline]
    fn in_bounds(&self, pos: Position) -> bool {
        self.config().in_bounds(pos)
    }

    fn clamp_to_bounds(&self, pos: Position) -> Position {
        self.config().clamp(pos)
    }

    #[inline]
    fn is_blocked(&self, pos: Position) -> bool {
        if !self.in_bounds(pos) {
            return self.border_blocked();
        }
        self.is_blocked_in_bounds(pos)
    }

    #[inline]
    fn is_walkable(&self, pos: Position) -> bool {
        !self.is_blocked(pos)
    }

    fn any_blocked_in_area(&self, rect: GridRect) -> bool {
        let layer_ok = rect.z >= 0 && rect.z < self.layers();
        let clipped = if layer_ok { rect.clip(self.width(), self.height()) } else { None };

        let clipped_area = clipped.map(|c| c.area()).unwrap_or(0);
        if self.border_blocked() && clipped_area < rect.area() {
            return true;
        }
        match clipped {
            Some(c) => self.any_blocked_clipped(c),
            None => false,
        }
    }

    fn count_blocked_in_area(&self, rect: GridRect) -> usize {
        let layer_ok = rect.z >= 0 && rect.z < self.layers();
        let clipped = if layer_ok { rect.clip(self.width(), self.height()) } else { None };

        let (inside, clipped_area) = match clipped {
            Some(c) => (self.count_blocked_clipped(c), c.area()),
            None => (0, 0),
        };
        let outside = if self.border_blocked() {
            usize::try_from(rect.area() - clipped_area).unwrap_or(usize::MAX)
        } else {
            0
        };
        inside.saturating_add(outside)
    }

    /// Integer Bresenham line of sight between two cells on the same layer.
    ///
    /// Every cell on the line, endpoints included, must be unblocked. Stops at
    /// the first blocked cell. Different layers never see each other.
    fn has_line_of_sight(&self, a: Position, b: Position) -> bool {
        if a.z != b.z {
            return false;
        }

        // i64 keeps `2 * err` from overflowing on far out-of-bounds endpoints.
        let dx = (b.x as i64 - a.x as i64).abs();
        let dy = -(b.y as i64 - a.y as i64).abs();
        let sx: i32 = if a.x < b.x { 1 } else { -1 };
        let sy: i32 = if a.y < b.y { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (a.x, a.y);

        loop {
            if self.is_blocked(Position::new(x, y, a.z)) {
                return false;
            }
            if x == b.x && y == b.y {
                return true;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Whether a single step from `from` in `direction` is legal terrain-wise:
    /// the target is unblocked and, for diagonals, neither flanking cardinal
    /// cell is blocked (no corner cutting).
    ///
    /// Cells past the `i32` range are out of bounds and follow the border policy.
    fn can_step(&self, from: Position, direction: Direction) -> bool {
        let (dx, dy) = direction.delta();
        let blocked = |dx: i32, dy: i32| match from.checked_offset(dx, dy) {
            Some(pos) => self.is_blocked(pos),
            None => self.border_blocked(),
        };
        if blocked(dx, dy) {
            return false;
        }
        if direction.is_diagonal() && (blocked(dx, 0) || blocked(0, dy)) {
            return false;
        }
        true
    }

    /// Collect in-bounds walkable neighbors of `pos` into `out` (cleared first).
    fn walkable_neighbors(&self, pos: Position, connectivity: Connectivity, out: &mut NeighborList) {
        out.clear();
        for &direction in connectivity.directions() {
            let Some(next) = pos.checked_step(direction) else {
                continue;
            };
            if self.in_bounds(next) && self.can_step(pos, direction) {
                out.push((next, direction));
            }
        }
    }
}
