use bevy::prelude::*;

use crate::nav::types::NO_ENTITY;

/// Occupants stored without a heap allocation.
pub const INLINE_CAPACITY: usize = 4;

/// Occupants of one cell: a short inline list, or a pooled `Vec` once a
/// fifth entity arrives. Falls back to inline when occupancy drops to
/// [`INLINE_CAPACITY`] or below. Insertion order is preserved in both forms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpatialCell {
    Inline { slots: [Entity; INLINE_CAPACITY], len: u8 },
    Overflow(Vec<Entity>),
}

impl Default for SpatialCell {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl SpatialCell {
    pub const EMPTY: SpatialCell = SpatialCell::Inline { slots: [NO_ENTITY; INLINE_CAPACITY], len: 0 };

    #[inline]
    pub fn as_slice(&self) -> &[Entity] {
        match self {
            SpatialCell::Inline { slots, len } => &slots[..*len as usize],
            SpatialCell::Overflow(list) => list,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.as_slice().contains(&entity)
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, SpatialCell::Overflow(_))
    }

    /// Add `entity`. Returns false if it is already present.
    pub fn push(&mut self, entity: Entity, pool: &mut OverflowPool) -> bool {
        if self.contains(entity) {
            return false;
        }
        match self {
            SpatialCell::Inline { slots, len } if (*len as usize) < INLINE_CAPACITY => {
                slots[*len as usize] = entity;
                *len += 1;
            }
            SpatialCell::Inline { slots, .. } => {
                let mut list = pool.take();
                list.extend_from_slice(&slots[..]);
                list.push(entity);
                *self = SpatialCell::Overflow(list);
            }
            SpatialCell::Overflow(list) => list.push(entity),
        }
        true
    }

    /// Remove `entity`. Returns false if it is not present.
    pub fn remove(&mut self, entity: Entity, pool: &mut OverflowPool) -> bool {
        match self {
            SpatialCell::Inline { slots, len } => {
                let n = *len as usize;
                let Some(idx) = slots[..n].iter().position(|&e| e == entity) else {
                    return false;
                };
                slots.copy_within(idx + 1..n, idx);
                slots[n - 1] = NO_ENTITY;
                *len -= 1;
                true
            }
            SpatialCell::Overflow(list) => {
                let Some(idx) = list.iter().position(|&e| e == entity) else {
                    return false;
                };
                list.remove(idx);
                if list.len() <= INLINE_CAPACITY {
                    let mut slots = [NO_ENTITY; INLINE_CAPACITY];
                    slots[..list.len()].copy_from_slice(list);
                    let len = list.len() as u8;
                    let old = std::mem::replace(self, SpatialCell::Inline { slots, len });
                    if let SpatialCell::Overflow(list) = old {
                        pool.give_back(list);
                    }
                }
                true
            }
        }
    }

    /// Drop every occupant, returning any overflow list to the pool.
    pub fn clear(&mut self, pool: &mut OverflowPool) {
        if let SpatialCell::Overflow(list) = std::mem::take(self) {
            pool.give_back(list);
        }
    }
}

/// Recycled overflow lists. Keeps at most `max_pooled` idle lists.
#[derive(Debug, Default)]
pub struct OverflowPool {
    free: Vec<Vec<Entity>>,
    max_pooled: usize,
}

impl OverflowPool {
    pub fn new(max_pooled: usize) -> Self {
        Self { free: Vec::with_capacity(max_pooled), max_pooled }
    }

    pub fn take(&mut self) -> Vec<Entity> {
        self.free.pop().unwrap_or_else(|| Vec::with_capacity(INLINE_CAPACITY * 2))
    }

    pub fn give_back(&mut self, mut list: Vec<Entity>) {
        if self.free.len() < self.max_pooled {
            list.clear();
            self.free.push(list);
        }
    }

    /// Idle lists currently held.
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}
