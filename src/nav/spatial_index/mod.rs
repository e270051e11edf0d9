use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::nav::types::{GridConfig, Position, NO_ENTITY};

mod cell;
mod ops;
mod query;
mod reservation;

pub use cell::{OverflowPool, SpatialCell, INLINE_CAPACITY};
pub use reservation::ReservationToken;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialIndexConfig {
    /// Idle overflow lists kept for reuse.
    pub max_pooled_overflow_lists: usize,
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self { max_pooled_overflow_lists: 64 }
    }
}

/// Reservation state of one cell. The version survives release so that
/// a later reservation always gets a higher one.
#[derive(Clone, Copy, Debug)]
struct ReservationSlot {
    holder: Entity,
    version: u32,
}

/// Per-cell registry of the entities standing on each grid cell.
///
/// Cells are addressed by the grid's canonical index, so the index covers
/// exactly the grid's bounds; every operation on an out-of-bounds position
/// is a no-op that reports failure.
///
/// # Occupancy
///
/// A cell holds any number of distinct entities, four inline and the rest
/// in a pooled overflow list. An `occupied` bitset mirrors "cell is non-empty"
/// so range queries can skip empty rows without touching the cells.
///
/// # Reservations
///
/// Independently of occupancy, one entity at a time may hold a cell
/// reservation (see [`SpatialIndex::try_reserve`]). Reserved cells refuse
/// [`SpatialIndex::try_move`] from anyone but the holder.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::Entity;
/// use tilenav::nav::{GridConfig, Position, SpatialIndex, SpatialIndexConfig};
///
/// let config = GridConfig::new(8, 8, 1, false).unwrap();
/// let mut index = SpatialIndex::new(config, &SpatialIndexConfig::default());
///
/// let unit = Entity::from_bits(1);
/// assert!(index.insert(Position::new(2, 3, 0), unit));
/// assert!(index.try_move(Position::new(2, 3, 0), Position::new(3, 3, 0), unit));
/// assert_eq!(index.try_get_first(Position::new(3, 3, 0)), Some(unit));
/// ```
pub struct SpatialIndex {
    config: GridConfig,
    cells: Vec<SpatialCell>,
    occupied: FixedBitSet,
    pool: OverflowPool,
    reservations: FxHashMap<usize, ReservationSlot>,
    entries: usize,
}

impl SpatialIndex {
    pub fn new(config: GridConfig, options: &SpatialIndexConfig) -> Self {
        let cell_count = config.cell_count();
        debug!(
            "[SPATIAL] Index for {}x{}x{} ({} cells), overflow pool {}",
            config.width, config.height, config.layers, cell_count, options.max_pooled_overflow_lists
        );
        Self {
            config,
            cells: vec![SpatialCell::EMPTY; cell_count],
            occupied: FixedBitSet::with_capacity(cell_count),
            pool: OverflowPool::new(options.max_pooled_overflow_lists),
            reservations: FxHashMap::default(),
            entries: 0,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Remove every occupant and reservation. Reservation versions are kept.
    pub fn clear(&mut self) {
        for cell in self.cells.iter_mut().filter(|cell| !cell.is_empty()) {
            cell.clear(&mut self.pool);
        }
        self.occupied.clear();
        for slot in self.reservations.values_mut() {
            slot.holder = NO_ENTITY;
        }
        self.entries = 0;
    }

    /// Total (entity, cell) entries.
    pub fn total_entries(&self) -> usize {
        self.entries
    }

    pub fn non_empty_cells(&self) -> usize {
        self.occupied.count_ones(..)
    }

    /// Cells currently holding more than [`INLINE_CAPACITY`] entities.
    pub fn overflow_cells(&self) -> usize {
        self.occupied.ones().filter(|&idx| self.cells[idx].is_overflow()).count()
    }

    pub fn pooled_overflow_lists(&self) -> usize {
        self.pool.pooled()
    }

    #[inline]
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.config.checked_index(pos).is_some_and(|idx| self.occupied.contains(idx))
    }

    /// True when any entity other than `entity` stands on `pos`.
    pub fn is_occupied_by_other(&self, pos: Position, entity: Entity) -> bool {
        self.cell(pos).is_some_and(|cell| cell.as_slice().iter().any(|&e| e != entity))
    }

    pub fn occupant_count(&self, pos: Position) -> usize {
        self.cell(pos).map_or(0, SpatialCell::len)
    }

    #[inline]
    pub(crate) fn cell(&self, pos: Position) -> Option<&SpatialCell> {
        self.config.checked_index(pos).map(|idx| &self.cells[idx])
    }
}
