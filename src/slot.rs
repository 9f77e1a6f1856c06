// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::VecDeque;

use crate::time;
use crate::time::TimePoint;

/// Stable identifier of one cell in a [`SlotArena`].
///
/// Ids are only ever freed through the handle that reserved them, so a live
/// handle can never observe its id being reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotId(usize);

/// The in-pool record of an idle resource.
///
/// The value is optional: recycling a handle that was never reset yields an
/// available cell without a value, and the next caller is expected to reset
/// one in. `drop_time` defaults to "never"; an expired record is discarded
/// on allocation instead of being handed out.
pub(crate) struct Idle<T> {
    pub(crate) value: Option<T>,
    pub(crate) drop_time: TimePoint,
}

impl<T> Idle<T> {
    fn new(value: Option<T>) -> Self {
        Self {
            value,
            drop_time: TimePoint::MAX,
        }
    }
}

enum Cell<T> {
    /// No record, unreserved; the id sits on the vacancy list.
    Vacant,
    /// An idle record, ready to be handed out.
    Available(Idle<T>),
    /// Reserved by a handle. The value travels with the handle, so the cell
    /// itself holds nothing.
    InUse,
}

/// The bounded container of slots shared by both pool flavors.
///
/// `available` is a FIFO over cell ids so that slots are handed out in
/// recycle order; `vacant` is the free-list of holes left by wasted slots.
/// `available.len() + used` never exceeds `capacity`.
pub(crate) struct SlotArena<T> {
    cells: Vec<Cell<T>>,
    vacant: Vec<usize>,
    available: VecDeque<usize>,
    used: usize,
    capacity: usize,
}

impl<T> SlotArena<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be positive");
        Self {
            cells: Vec::with_capacity(capacity),
            vacant: Vec::new(),
            available: VecDeque::with_capacity(capacity),
            used: 0,
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn size(&self) -> usize {
        self.available.len() + self.used
    }

    pub(crate) fn available(&self) -> usize {
        self.available.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn fit_capacity(&self) -> bool {
        self.size() < self.capacity
    }

    /// Reserves the oldest available cell, taking its value out for the
    /// caller. Records whose drop time has passed are discarded along the
    /// way. Returns `None` when no available cell remains.
    pub(crate) fn alloc_available(&mut self) -> Option<(SlotId, Option<T>)> {
        while let Some(index) = self.available.pop_front() {
            let cell = std::mem::replace(&mut self.cells[index], Cell::InUse);
            let idle = match cell {
                Cell::Available(idle) => idle,
                _ => unreachable!("available id must reference an available cell"),
            };
            if idle.drop_time <= time::now() {
                self.cells[index] = Cell::Vacant;
                self.vacant.push(index);
                continue;
            }
            self.used += 1;
            self.assert_invariant();
            return Some((SlotId(index), idle.value));
        }
        None
    }

    /// Materializes an empty reserved cell. The caller must have checked
    /// [`SlotArena::fit_capacity`] under the same lock.
    pub(crate) fn reserve(&mut self) -> SlotId {
        debug_assert!(self.fit_capacity());
        let index = match self.vacant.pop() {
            Some(index) => {
                self.cells[index] = Cell::InUse;
                index
            }
            None => {
                self.cells.push(Cell::InUse);
                self.cells.len() - 1
            }
        };
        self.used += 1;
        self.assert_invariant();
        SlotId(index)
    }

    /// Returns a reserved cell to the available set, storing `value` back in
    /// its idle record.
    pub(crate) fn recycle(&mut self, id: SlotId, value: Option<T>) {
        debug_assert!(matches!(self.cells[id.0], Cell::InUse));
        self.cells[id.0] = Cell::Available(Idle::new(value));
        self.used -= 1;
        self.available.push_back(id.0);
        self.assert_invariant();
    }

    /// Empties a reserved cell, leaving a hole that may be re-materialized
    /// later.
    pub(crate) fn waste(&mut self, id: SlotId) {
        debug_assert!(matches!(self.cells[id.0], Cell::InUse));
        self.cells[id.0] = Cell::Vacant;
        self.used -= 1;
        self.vacant.push(id.0);
        self.assert_invariant();
    }

    fn assert_invariant(&self) {
        assert!(
            self.size() <= self.capacity,
            "invariant broken: size <= capacity (actual: {} <= {})",
            self.size(),
            self.capacity,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "pool capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = SlotArena::<u32>::new(0);
    }

    #[test]
    fn test_new_arena_is_empty() {
        let arena = SlotArena::<u32>::new(2);
        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.size(), 0);
        assert_eq!(arena.available(), 0);
        assert_eq!(arena.used(), 0);
        assert!(arena.fit_capacity());
    }

    #[test]
    fn test_reserve_then_recycle_makes_available() {
        let mut arena = SlotArena::new(1);
        assert!(arena.alloc_available().is_none());

        let id = arena.reserve();
        assert_eq!(arena.used(), 1);
        assert!(!arena.fit_capacity());

        arena.recycle(id, Some(7));
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.available(), 1);

        let (_, value) = arena.alloc_available().unwrap();
        assert_eq!(value, Some(7));
    }

    #[test]
    fn test_waste_leaves_a_hole() {
        let mut arena = SlotArena::<u32>::new(1);
        let id = arena.reserve();
        arena.waste(id);
        assert_eq!(arena.size(), 0);
        assert!(arena.fit_capacity());

        // The hole is re-materialized by the next reserve.
        let _ = arena.reserve();
        assert_eq!(arena.size(), 1);
    }

    #[test]
    fn test_available_ids_are_fifo() {
        let mut arena = SlotArena::new(2);
        let first = arena.reserve();
        let second = arena.reserve();
        arena.recycle(first, Some("a"));
        arena.recycle(second, Some("b"));

        let (id, value) = arena.alloc_available().unwrap();
        assert_eq!(id, first);
        assert_eq!(value, Some("a"));
        let (id, value) = arena.alloc_available().unwrap();
        assert_eq!(id, second);
        assert_eq!(value, Some("b"));
    }

    #[test]
    fn test_expired_record_is_discarded() {
        let mut arena = SlotArena::new(1);
        let id = arena.reserve();
        arena.recycle(id, Some(1));
        match &mut arena.cells[0] {
            Cell::Available(idle) => idle.drop_time = TimePoint::MIN,
            _ => unreachable!(),
        }
        assert!(arena.alloc_available().is_none());
        assert_eq!(arena.size(), 0);
    }

    #[test]
    fn test_recycled_empty_value_stays_empty() {
        let mut arena = SlotArena::<u32>::new(1);
        let id = arena.reserve();
        arena.recycle(id, None);
        let (_, value) = arena.alloc_available().unwrap();
        assert_eq!(value, None);
    }
}
