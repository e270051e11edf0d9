//! Core value types shared by every navigation component.
//!
//! Everything here is plain data: grid-integer positions, rectangles, the
//! packed two-byte tile, and the immutable grid configuration.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::GridError;

/// Null sentinel for entity handles (no blocker, no holder).
pub const NO_ENTITY: Entity = Entity::PLACEHOLDER;

// ============================================================================
// Positions & Directions
// ============================================================================

/// Grid-integer coordinates. `z` is the layer (floor) index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Same-layer position shifted by `(dx, dy)`. `None` past the `i32` range.
    #[inline]
    pub fn checked_offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self { x: self.x.checked_add(dx)?, y: self.y.checked_add(dy)?, z: self.z })
    }

    #[inline]
    pub fn checked_step(self, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.delta();
        self.checked_offset(dx, dy)
    }

    /// Chebyshev (king-move) distance on the same layer. Positions on
    /// different layers are `i32::MAX` apart.
    pub fn chebyshev_distance(self, other: Position) -> i32 {
        if self.z != other.z {
            return i32::MAX;
        }
        let d = self.x.abs_diff(other.x).max(self.y.abs_diff(other.y));
        i32::try_from(d).unwrap_or(i32::MAX)
    }

    /// True when `other` is one of the 8 same-layer neighbors.
    pub fn is_adjacent(self, other: Position) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// Direction of a single step from `self` to an adjacent `other`.
    pub fn direction_to(self, other: Position) -> Option<Direction> {
        if !self.is_adjacent(other) {
            return None;
        }
        Direction::from_delta(other.x - self.x, other.y - self.y)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Eight grid directions. +y is North.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
    NorthEast = 4,
    NorthWest = 5,
    SouthEast = 6,
    SouthWest = 7,
}

impl Direction {
    pub const CARDINAL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::SouthEast,
        Direction::SouthWest,
    ];

    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, 1),
            Direction::NorthWest => (-1, 1),
            Direction::SouthEast => (1, -1),
            Direction::SouthWest => (-1, -1),
        }
    }

    #[inline]
    pub const fn is_diagonal(self) -> bool {
        (self as u8) >= 4
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.delta() == (dx, dy))
    }
}

/// Neighbor enumeration mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

impl Connectivity {
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Connectivity::Four => &Direction::CARDINAL,
            Connectivity::Eight => &Direction::ALL,
        }
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// Inclusive, same-layer rectangle of cells. Always normalized (min <= max).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub z: i32,
}

impl GridRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32, z: i32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
            z,
        }
    }

    /// Rectangle spanning two corner positions (layer taken from `a`).
    pub fn from_corners(a: Position, b: Position) -> Self {
        Self::new(a.x, a.y, b.x, b.y, a.z)
    }

    /// Square of side `2 * radius + 1` centered on `center`.
    pub fn around(center: Position, radius: i32) -> Self {
        let r = radius.max(0);
        Self::new(
            center.x.saturating_sub(r),
            center.y.saturating_sub(r),
            center.x.saturating_add(r),
            center.y.saturating_add(r),
            center.z,
        )
    }

    pub fn width(&self) -> i64 {
        self.max_x as i64 - self.min_x as i64 + 1
    }

    pub fn height(&self) -> i64 {
        self.max_y as i64 - self.min_y as i64 + 1
    }

    /// Cell count, saturating at `i64::MAX`.
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.z == self.z
            && pos.x >= self.min_x
            && pos.x <= self.max_x
            && pos.y >= self.min_y
            && pos.y <= self.max_y
    }

    /// Intersection with `[0, width) x [0, height)`, or `None` when disjoint.
    pub fn clip(&self, width: i32, height: i32) -> Option<GridRect> {
        let min_x = self.min_x.max(0);
        let min_y = self.min_y.max(0);
        let max_x = self.max_x.min(width - 1);
        let max_y = self.max_y.min(height - 1);
        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some(GridRect { min_x, min_y, max_x, max_y, z: self.z })
    }
}

// ============================================================================
// Tiles
// ============================================================================

/// Tile type ordinals used by the bundled map tooling. The grid itself
/// treats the type byte as opaque.
pub mod tile_types {
    pub const FLOOR: u8 = 0;
    pub const WALL: u8 = 1;
    pub const WATER: u8 = 2;
    pub const DOOR: u8 = 3;
}

/// Collision mask bits. Any set bit blocks movement.
pub mod collision {
    pub const NONE: u8 = 0;
    pub const SOLID: u8 = 1 << 0;
    pub const WATER: u8 = 1 << 1;
    pub const DOOR_CLOSED: u8 = 1 << 2;
}

/// Two-byte terrain cell: type ordinal plus collision bitmask.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub tile_type: u8,
    pub collision_mask: u8,
}

impl Tile {
    pub const EMPTY: Tile = Tile { tile_type: tile_types::FLOOR, collision_mask: collision::NONE };
    pub const WALL: Tile = Tile { tile_type: tile_types::WALL, collision_mask: collision::SOLID };

    pub const fn new(tile_type: u8, collision_mask: u8) -> Self {
        Self { tile_type, collision_mask }
    }

    #[inline]
    pub const fn is_blocked(self) -> bool {
        self.collision_mask != 0
    }

    /// Wire encoding: `[type, mask]`.
    #[inline]
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.tile_type, self.collision_mask]
    }

    #[inline]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self { tile_type: bytes[0], collision_mask: bytes[1] }
    }
}

// ============================================================================
// Grid Configuration
// ============================================================================

/// Immutable grid bounds plus the out-of-bounds policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
    pub layers: i32,
    /// When true, coordinates outside the grid read as blocked.
    pub border_blocked: bool,
}

impl GridConfig {
    /// Validated constructor. Non-positive dimensions are a programming error.
    pub fn new(width: i32, height: i32, layers: i32, border_blocked: bool) -> Result<Self, GridError> {
        let config = Self { width, height, layers, border_blocked };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.width <= 0 || self.height <= 0 || self.layers <= 0 {
            return Err(GridError::InvalidDimensions {
                width: self.width,
                height: self.height,
                layers: self.layers,
            });
        }
        Ok(())
    }

    /// Cells in one layer.
    #[inline]
    pub fn layer_area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Cells across all layers.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.layer_area() * self.layers as usize
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && pos.x < self.width
            && pos.y < self.height
            && pos.z < self.layers
    }

    /// Canonical flat index: layer-outer, then row-major. Caller checks bounds.
    #[inline]
    pub fn index_of(&self, pos: Position) -> usize {
        pos.z as usize * self.layer_area() + pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Flat index when `pos` is in bounds.
    #[inline]
    pub fn checked_index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos).then(|| self.index_of(pos))
    }

    /// Inverse of [`GridConfig::index_of`].
    pub fn position_of(&self, index: usize) -> Position {
        let area = self.layer_area();
        let z = index / area;
        let rem = index % area;
        Position::new((rem % self.width as usize) as i32, (rem / self.width as usize) as i32, z as i32)
    }

    pub fn clamp(&self, pos: Position) -> Position {
        Position::new(
            pos.x.clamp(0, self.width - 1),
            pos.y.clamp(0, self.height - 1),
            pos.z.clamp(0, self.layers - 1),
        )
    }
}
