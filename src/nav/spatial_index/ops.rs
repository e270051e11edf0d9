use bevy::prelude::*;

use super::SpatialIndex;
use crate::nav::types::Position;

impl SpatialIndex {
    /// Register `entity` at `pos`. False when out of bounds or already there.
    pub fn insert(&mut self, pos: Position, entity: Entity) -> bool {
        let Some(idx) = self.config.checked_index(pos) else {
            return false;
        };
        if !self.cells[idx].push(entity, &mut self.pool) {
            return false;
        }
        self.occupied.insert(idx);
        self.entries += 1;
        true
    }

    /// Unregister `entity` from `pos`. False when it was not there; callers
    /// should resynchronize rather than treat that as fatal.
    pub fn remove(&mut self, pos: Position, entity: Entity) -> bool {
        let Some(idx) = self.config.checked_index(pos) else {
            return false;
        };
        self.remove_at(idx, entity)
    }

    /// Relocate `entity` from `old` to `new` as one step: either both cells
    /// change or neither does.
    pub fn update(&mut self, old: Position, new: Position, entity: Entity) -> bool {
        let (Some(from), Some(to)) = (self.config.checked_index(old), self.config.checked_index(new)) else {
            return false;
        };
        if !self.cells[from].contains(entity) {
            return false;
        }
        if from == to {
            return true;
        }
        if self.cells[to].contains(entity) {
            return false;
        }
        self.relocate(from, to, entity);
        true
    }

    /// Relocate `entity` only when `to` is empty and not reserved by another
    /// entity. Never leaves two occupants in `to` or the mover in `from`.
    pub fn try_move(&mut self, from: Position, to: Position, entity: Entity) -> bool {
        let (Some(src), Some(dst)) = (self.config.checked_index(from), self.config.checked_index(to)) else {
            return false;
        };
        if src == dst || !self.cells[src].contains(entity) || !self.cells[dst].is_empty() {
            return false;
        }
        if self.is_reserved_by_other_idx(dst, entity) {
            return false;
        }
        self.relocate(src, dst, entity);
        true
    }

    /// Remove `entity` from every cell it occupies. Returns the number of
    /// cells it was found in. Linear in occupied cells; for resync only.
    pub fn purge(&mut self, entity: Entity) -> usize {
        let hits: Vec<usize> = self
            .occupied
            .ones()
            .filter(|&idx| self.cells[idx].contains(entity))
            .collect();
        for &idx in &hits {
            self.remove_at(idx, entity);
        }
        if !hits.is_empty() {
            warn!("[SPATIAL] Purged {:?} from {} stale cell(s)", entity, hits.len());
        }
        hits.len()
    }

    fn remove_at(&mut self, idx: usize, entity: Entity) -> bool {
        if !self.cells[idx].remove(entity, &mut self.pool) {
            return false;
        }
        if self.cells[idx].is_empty() {
            self.occupied.set(idx, false);
        }
        self.entries -= 1;
        true
    }

    /// Caller guarantees `entity` is in `from` and absent from `to`.
    fn relocate(&mut self, from: usize, to: usize, entity: Entity) {
        self.remove_at(from, entity);
        self.cells[to].push(entity, &mut self.pool);
        self.occupied.insert(to);
        self.entries += 1;
    }
}
