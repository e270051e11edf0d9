use super::{CollisionGrid, GridVariant};
use crate::nav::error::GridError;
use crate::nav::types::{GridConfig, GridRect, Position, Tile};

/// Row-major terrain grid.
///
/// Tiles are stored layer-outer, then `y * width + x`, which is also the
/// canonical wire order, so snapshots copy straight out of `tiles`.
///
/// # Performance
///
/// - **Build:** O(cells), one allocation
/// - **Point query:** O(1)
/// - **Rect query:** O(area), row by row
#[derive(Clone, Debug)]
pub struct TileGrid {
    config: GridConfig,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        Ok(Self {
            config,
            tiles: vec![Tile::EMPTY; config.cell_count()],
        })
    }

    /// Build from tiles in canonical order. Length must equal the cell count.
    pub fn from_tiles(config: GridConfig, tiles: Vec<Tile>) -> Result<Self, GridError> {
        config.validate()?;
        if tiles.len() != config.cell_count() {
            return Err(GridError::InvalidDimensions {
                width: config.width,
                height: config.height,
                layers: config.layers,
            });
        }
        Ok(Self { config, tiles })
    }

    /// Tiles in canonical (layer, y, x) order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[inline]
    fn row_range(&self, y: i32, rect: &GridRect) -> std::ops::Range<usize> {
        let base = self.config.index_of(Position::new(0, y, rect.z));
        base + rect.min_x as usize..base + rect.max_x as usize + 1
    }
}

impl CollisionGrid for TileGrid {
    fn config(&self) -> &GridConfig {
        &self.config
    }

    fn variant(&self) -> GridVariant {
        GridVariant::Simple
    }

    fn tile(&self, pos: Position) -> Option<Tile> {
        self.config.checked_index(pos).map(|idx| self.tiles[idx])
    }

    fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        match self.config.checked_index(pos) {
            Some(idx) => {
                self.tiles[idx] = tile;
                true
            }
            None => false,
        }
    }

    #[inline]
    fn is_blocked_in_bounds(&self, pos: Position) -> bool {
        self.tiles[self.config.index_of(pos)].is_blocked()
    }

    fn count_blocked_clipped(&self, rect: GridRect) -> usize {
        (rect.min_y..=rect.max_y)
            .map(|y| {
                self.tiles[self.row_range(y, &rect)]
                    .iter()
                    .filter(|t| t.is_blocked())
                    .count()
            })
            .sum()
    }

    fn any_blocked_clipped(&self, rect: GridRect) -> bool {
        (rect.min_y..=rect.max_y)
            .any(|y| self.tiles[self.row_range(y, &rect)].iter().any(|t| t.is_blocked()))
    }

    fn memory_bytes(&self) -> usize {
        self.tiles.len() * std::mem::size_of::<Tile>()
    }
}
