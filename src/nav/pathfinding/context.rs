use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use super::types::FixedNum;

pub(crate) const NO_PARENT: u32 = u32::MAX;

/// Search state for one cell. Valid for the current search only when
/// `generation` equals the context generation; anything else reads as
/// unvisited, so a new search never has to clear the array.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathNode {
    pub x: i32,
    pub y: i32,
    pub g_cost: FixedNum,
    pub h_cost: FixedNum,
    pub parent_index: u32,
    pub generation: u32,
    pub closed_generation: u32,
}

impl Default for PathNode {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            g_cost: FixedNum::MAX,
            h_cost: FixedNum::ZERO,
            parent_index: NO_PARENT,
            generation: 0,
            closed_generation: 0,
        }
    }
}

/// Open-set entry. Ordered so the max-heap pops the lowest `f`, then the
/// lowest `h`, then the lowest index, which makes expansion order (and so
/// the returned path) deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenEntry {
    pub f: FixedNum,
    pub h: FixedNum,
    pub index: u32,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable A* scratch space: a flat node array sized to one layer plus the
/// open heap. Rented from a [`ContextPool`] per search.
#[derive(Debug, Default)]
pub struct PathfindingContext {
    pub(crate) nodes: Vec<PathNode>,
    pub(crate) open: BinaryHeap<OpenEntry>,
    generation: u32,
}

impl PathfindingContext {
    /// Start a new search over `area` cells. O(1) unless the array grows or
    /// the generation counter wraps.
    pub(crate) fn begin_search(&mut self, area: usize) -> u32 {
        if self.nodes.len() < area {
            self.nodes.resize(area, PathNode::default());
        }
        self.open.clear();

        if self.generation == u32::MAX {
            for node in &mut self.nodes {
                node.generation = 0;
                node.closed_generation = 0;
            }
            self.generation = 0;
        }
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(crate) fn force_generation(&mut self, generation: u32) {
        self.generation = generation;
    }
}

/// Mutex-guarded free list of search contexts.
///
/// Contexts go back to the pool when their [`RentedContext`] guard drops,
/// on every exit path of the search.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<PathfindingContext>>,
    max_pooled: usize,
    created: AtomicUsize,
}

impl ContextPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            created: AtomicUsize::new(0),
        }
    }

    pub fn rent(&self) -> RentedContext<'_> {
        let pooled = self.lock().pop();
        let context = pooled.unwrap_or_else(|| {
            self.created.fetch_add(1, AtomicOrdering::Relaxed);
            PathfindingContext::default()
        });
        RentedContext { pool: self, context: Some(context) }
    }

    /// Idle contexts waiting in the pool.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Contexts allocated since the pool was built.
    pub fn created(&self) -> usize {
        self.created.load(AtomicOrdering::Relaxed)
    }

    fn give_back(&self, context: PathfindingContext) {
        let mut free = self.lock();
        if free.len() < self.max_pooled {
            free.push(context);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PathfindingContext>> {
        // A panic while holding the lock cannot leave a context half-pushed.
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped rental. Returns the context to its pool on drop.
pub struct RentedContext<'a> {
    pool: &'a ContextPool,
    context: Option<PathfindingContext>,
}

impl Deref for RentedContext<'_> {
    type Target = PathfindingContext;

    fn deref(&self) -> &PathfindingContext {
        self.context.as_ref().unwrap_or_else(|| unreachable!("context taken before drop"))
    }
}

impl DerefMut for RentedContext<'_> {
    fn deref_mut(&mut self) -> &mut PathfindingContext {
        self.context.as_mut().unwrap_or_else(|| unreachable!("context taken before drop"))
    }
}

impl Drop for RentedContext<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.give_back(context);
        }
    }
}
