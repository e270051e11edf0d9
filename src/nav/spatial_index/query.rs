use std::ops::ControlFlow;

use bevy::prelude::*;

use super::SpatialIndex;
use crate::nav::types::{GridRect, Position};

impl SpatialIndex {
    /// First occupant of `pos` in insertion order.
    pub fn try_get_first(&self, pos: Position) -> Option<Entity> {
        self.cell(pos).and_then(|cell| cell.as_slice().first().copied())
    }

    /// Occupants of `pos` written into `out` (cleared first). Returns the count.
    pub fn query_point(&self, pos: Position, out: &mut Vec<Entity>) -> usize {
        out.clear();
        if let Some(cell) = self.cell(pos) {
            out.extend_from_slice(cell.as_slice());
        }
        out.len()
    }

    /// Occupants of every cell in `rect`, row-major, written into `out`.
    pub fn query_rect(&self, rect: GridRect, out: &mut Vec<Entity>) -> usize {
        out.clear();
        let _ = self.for_each_in_rect(rect, |_, entity| {
            out.push(entity);
            ControlFlow::Continue(())
        });
        out.len()
    }

    /// Occupants of every cell within Euclidean `radius` of `center`.
    pub fn query_circle(&self, center: Position, radius: i32, out: &mut Vec<Entity>) -> usize {
        out.clear();
        let _ = self.for_each_in_circle(center, radius, |_, entity| {
            out.push(entity);
            ControlFlow::Continue(())
        });
        out.len()
    }

    pub fn for_each_in_point<F>(&self, pos: Position, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(Position, Entity) -> ControlFlow<()>,
    {
        if let Some(cell) = self.cell(pos) {
            for &entity in cell.as_slice() {
                f(pos, entity)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Visit occupants of `rect` row by row until `f` breaks.
    pub fn for_each_in_rect<F>(&self, rect: GridRect, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(Position, Entity) -> ControlFlow<()>,
    {
        let Some(clipped) = self.clip(rect) else {
            return ControlFlow::Continue(());
        };
        for y in clipped.min_y..=clipped.max_y {
            let row_start = self.config.index_of(Position::new(clipped.min_x, y, clipped.z));
            let row_end = row_start + (clipped.max_x - clipped.min_x) as usize + 1;
            if self.occupied.count_ones(row_start..row_end) == 0 {
                continue;
            }
            for idx in row_start..row_end {
                if !self.occupied.contains(idx) {
                    continue;
                }
                let pos = Position::new(clipped.min_x + (idx - row_start) as i32, y, clipped.z);
                for &entity in self.cells[idx].as_slice() {
                    f(pos, entity)?;
                }
            }
        }
        ControlFlow::Continue(())
    }

    pub fn for_each_in_circle<F>(&self, center: Position, radius: i32, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(Position, Entity) -> ControlFlow<()>,
    {
        if radius < 0 {
            return ControlFlow::Continue(());
        }
        let r2 = radius as i64 * radius as i64;
        self.for_each_in_rect(GridRect::around(center, radius), |pos, entity| {
            let dx = (pos.x - center.x) as i64;
            let dy = (pos.y - center.y) as i64;
            if dx * dx + dy * dy <= r2 {
                f(pos, entity)
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    fn clip(&self, rect: GridRect) -> Option<GridRect> {
        if rect.z < 0 || rect.z >= self.config.layers {
            return None;
        }
        rect.clip(self.config.width, self.config.height)
    }
}
