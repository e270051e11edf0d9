use std::cell::RefCell;

use super::morton::MortonMapping;
use super::{CollisionGrid, GridVariant};
use crate::nav::error::GridError;
use crate::nav::types::{GridConfig, GridRect, Position, Tile};

/// Rectangles at or below this many cells are scanned point by point.
/// Larger ones collect their ranks, sort, and sweep the cache in order.
pub const DIRECT_SCAN_MAX_AREA: i64 = 64;

thread_local! {
    /// Per-thread rank buffer for large rectangle sweeps.
    static RANK_SCRATCH: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

/// Terrain grid stored in Morton (Z-order) rank order.
///
/// Same contract as [`super::TileGrid`]. Each layer keeps its tiles and a
/// flattened collision byte cache in rank order, so spatially close cells
/// sit close in memory. The mapping is shared by all layers and built once.
///
/// Tile edits write both the tile store and the cache.
#[derive(Clone, Debug)]
pub struct MortonTileGrid {
    config: GridConfig,
    mapping: MortonMapping,
    /// `z * layer_area + rank`.
    tiles: Vec<Tile>,
    /// One collision-mask byte per cell, per layer, indexed by rank.
    collision_cache: Vec<Vec<u8>>,
}

impl MortonTileGrid {
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        let mapping = MortonMapping::new(config.width, config.height)?;
        let area = config.layer_area();
        Ok(Self {
            config,
            mapping,
            tiles: vec![Tile::EMPTY; config.cell_count()],
            collision_cache: vec![vec![0u8; area]; config.layers as usize],
        })
    }

    /// Build from tiles in canonical (layer, y, x) order.
    pub fn from_tiles(config: GridConfig, canonical: &[Tile]) -> Result<Self, GridError> {
        let mut grid = Self::new(config)?;
        if canonical.len() != config.cell_count() {
            return Err(GridError::InvalidDimensions {
                width: config.width,
                height: config.height,
                layers: config.layers,
            });
        }

        let area = config.layer_area();
        let mut ordered = Vec::with_capacity(area);
        for z in 0..config.layers as usize {
            let layer = &canonical[z * area..(z + 1) * area];
            grid.mapping.to_rank_order(layer, &mut ordered);
            grid.tiles[z * area..(z + 1) * area].copy_from_slice(&ordered);
        }
        grid.rebuild_collision_cache();
        Ok(grid)
    }

    pub fn mapping(&self) -> &MortonMapping {
        &self.mapping
    }

    /// Collision cache of one layer in rank order.
    pub fn layer_cache(&self, z: i32) -> Option<&[u8]> {
        self.collision_cache.get(z as usize).map(|layer| layer.as_slice())
    }

    fn rebuild_collision_cache(&mut self) {
        let area = self.config.layer_area();
        for (z, cache) in self.collision_cache.iter_mut().enumerate() {
            for (rank, byte) in cache.iter_mut().enumerate() {
                *byte = self.tiles[z * area + rank].collision_mask;
            }
        }
    }

    #[inline]
    fn rank_of(&self, pos: Position) -> usize {
        self.mapping.pos_to_rank(pos.x, pos.y) as usize
    }

    /// Run `sweep` over the sorted ranks of a clipped rectangle.
    fn with_sorted_ranks<R>(&self, rect: &GridRect, sweep: impl FnOnce(&[u32]) -> R) -> R {
        RANK_SCRATCH.with(|scratch| {
            let mut ranks = scratch.borrow_mut();
            ranks.clear();
            for y in rect.min_y..=rect.max_y {
                for x in rect.min_x..=rect.max_x {
                    ranks.push(self.mapping.pos_to_rank(x, y));
                }
            }
            ranks.sort_unstable();
            sweep(&ranks)
        })
    }
}

impl CollisionGrid for MortonTileGrid {
    fn config(&self) -> &GridConfig {
        &self.config
    }

    fn variant(&self) -> GridVariant {
        GridVariant::Morton
    }

    fn tile(&self, pos: Position) -> Option<Tile> {
        if !self.config.in_bounds(pos) {
            return None;
        }
        Some(self.tiles[pos.z as usize * self.config.layer_area() + self.rank_of(pos)])
    }

    fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        if !self.config.in_bounds(pos) {
            return false;
        }
        let rank = self.rank_of(pos);
        self.tiles[pos.z as usize * self.config.layer_area() + rank] = tile;
        self.collision_cache[pos.z as usize][rank] = tile.collision_mask;
        true
    }

    #[inline]
    fn is_blocked_in_bounds(&self, pos: Position) -> bool {
        self.collision_cache[pos.z as usize][self.rank_of(pos)] != 0
    }

    fn count_blocked_clipped(&self, rect: GridRect) -> usize {
        let cache = &self.collision_cache[rect.z as usize];
        if rect.area() <= DIRECT_SCAN_MAX_AREA {
            let mut count = 0;
            for y in rect.min_y..=rect.max_y {
                for x in rect.min_x..=rect.max_x {
                    if cache[self.mapping.pos_to_rank(x, y) as usize] != 0 {
                        count += 1;
                    }
                }
            }
            return count;
        }
        self.with_sorted_ranks(&rect, |ranks| {
            ranks.iter().filter(|&&rank| cache[rank as usize] != 0).count()
        })
    }

    fn any_blocked_clipped(&self, rect: GridRect) -> bool {
        let cache = &self.collision_cache[rect.z as usize];
        if rect.area() <= DIRECT_SCAN_MAX_AREA {
            return (rect.min_y..=rect.max_y).any(|y| {
                (rect.min_x..=rect.max_x).any(|x| cache[self.mapping.pos_to_rank(x, y) as usize] != 0)
            });
        }
        self.with_sorted_ranks(&rect, |ranks| ranks.iter().any(|&rank| cache[rank as usize] != 0))
    }

    fn memory_bytes(&self) -> usize {
        self.tiles.len() * std::mem::size_of::<Tile>()
            + self.collision_cache.iter().map(|layer| layer.len()).sum::<usize>()
            + self.mapping.memory_bytes()
    }
}
