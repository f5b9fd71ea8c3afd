//! Bounded reorder buffer for ordered fork-join.
//!
//! Workers complete out of order; the buffer holds each result in a slot
//! indexed by dispatch order and releases results only once every slot up to
//! the join frontier is filled. At most `capacity` results are ever pending,
//! which matches the number of samples that can be in flight at once.

use std::collections::VecDeque;

/// Fixed-capacity slot ring keyed by dispatch index.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    /// Slot `i` holds the result for index `frontier + i`.
    slots: VecDeque<Option<T>>,
    capacity: usize,
    frontier: usize,
}

impl<T> ReorderBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            frontier: 0,
        }
    }

    /// Next index the frontier is waiting for.
    pub fn frontier(&self) -> usize {
        self.frontier
    }

    /// Results stored but not yet released.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Store the result for `index`.
    ///
    /// Returns the value back when `index` is behind the frontier, already
    /// filled, or beyond the buffer's window.
    pub fn insert(&mut self, index: usize, value: T) -> Result<(), T> {
        if index < self.frontier {
            return Err(value);
        }
        let offset = index - self.frontier;
        if offset >= self.capacity {
            return Err(value);
        }
        while self.slots.len() <= offset {
            self.slots.push_back(None);
        }
        let slot = &mut self.slots[offset];
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        Ok(())
    }

    /// Release the contiguous run of results starting at the frontier.
    pub fn drain_ready(&mut self) -> Vec<(usize, T)> {
        let mut ready = Vec::new();
        while let Some(Some(_)) = self.slots.front() {
            if let Some(Some(value)) = self.slots.pop_front() {
                ready.push((self.frontier, value));
                self.frontier += 1;
            }
        }
        ready
    }

    /// Release everything still stored, in index order, skipping gaps.
    pub fn drain_all(&mut self) -> Vec<(usize, T)> {
        let frontier = self.frontier;
        let drained = self
            .slots
            .drain(..)
            .enumerate()
            .filter_map(|(offset, slot)| slot.map(|value| (frontier + offset, value)))
            .collect::<Vec<_>>();
        if let Some((last, _)) = drained.last() {
            self.frontier = last + 1;
        }
        drained
    }
}
