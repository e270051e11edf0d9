use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ReservationSlot, SpatialIndex};
use crate::nav::error::NavError;
use crate::nav::types::{Position, NO_ENTITY};

/// Proof of a cell reservation. Only the exact `(reserver, version)` pair
/// handed out by [`SpatialIndex::try_reserve`] can release it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationToken {
    pub position: Position,
    pub reserver: Entity,
    pub version: u32,
}

impl SpatialIndex {
    /// Reserve `pos` for `reserver`.
    ///
    /// Fails with `BlockedByEntity` while another entity holds the cell. The
    /// current holder may re-reserve; every grant bumps the cell's version,
    /// which invalidates tokens from earlier grants.
    pub fn try_reserve(&mut self, pos: Position, reserver: Entity) -> Result<ReservationToken, NavError> {
        let idx = self.config.checked_index(pos).ok_or(NavError::OutOfBounds)?;
        let slot = self
            .reservations
            .entry(idx)
            .or_insert(ReservationSlot { holder: NO_ENTITY, version: 0 });

        if slot.holder != NO_ENTITY && slot.holder != reserver {
            return Err(NavError::BlockedByEntity);
        }
        slot.holder = reserver;
        slot.version = slot.version.wrapping_add(1);
        Ok(ReservationToken { position: pos, reserver, version: slot.version })
    }

    /// Release a reservation. False unless `token` matches the live grant.
    pub fn release_reservation(&mut self, token: &ReservationToken) -> bool {
        if self.validate_reservation(token).is_err() {
            return false;
        }
        if let Some(idx) = self.config.checked_index(token.position) {
            if let Some(slot) = self.reservations.get_mut(&idx) {
                slot.holder = NO_ENTITY;
                return true;
            }
        }
        false
    }

    /// `Ok` when `token` is the live grant for its cell.
    pub fn validate_reservation(&self, token: &ReservationToken) -> Result<(), NavError> {
        let idx = self
            .config
            .checked_index(token.position)
            .ok_or(NavError::InvalidReservation)?;
        match self.reservations.get(&idx) {
            Some(slot) if slot.holder == token.reserver && slot.version == token.version => Ok(()),
            _ => Err(NavError::InvalidReservation),
        }
    }

    /// Current holder of the reservation on `pos`.
    pub fn reservation_holder(&self, pos: Position) -> Option<Entity> {
        let idx = self.config.checked_index(pos)?;
        self.reservations
            .get(&idx)
            .map(|slot| slot.holder)
            .filter(|&holder| holder != NO_ENTITY)
    }

    /// Drop every reservation held by `entity`. Returns how many were released.
    pub fn release_all_for(&mut self, entity: Entity) -> usize {
        let mut released = 0;
        for slot in self.reservations.values_mut() {
            if slot.holder == entity {
                slot.holder = NO_ENTITY;
                released += 1;
            }
        }
        released
    }

    pub fn active_reservations(&self) -> usize {
        self.reservations.values().filter(|slot| slot.holder != NO_ENTITY).count()
    }

    pub(crate) fn is_reserved_by_other_idx(&self, idx: usize, entity: Entity) -> bool {
        self.reservations
            .get(&idx)
            .is_some_and(|slot| slot.holder != NO_ENTITY && slot.holder != entity)
    }
}
