// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Slot arena with typed indices and a free list.
//!
//! Nodes of the tree-indexed state map live here and refer to each other by
//! index, so relinking a subtree never leaves a dangling back-reference: a
//! freed slot is dead until it is handed out again, and reading a dead slot
//! fails fast.

use std::fmt;
use std::marker::PhantomData;

/// Typed index into an [`Arena`].
///
/// The type parameter only tags which arena the index belongs to; it does not
/// own a `T`.
pub(crate) struct Idx<T> {
    slot: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    fn new(slot: usize) -> Self {
        let slot = u32::try_from(slot).unwrap_or(u32::MAX);
        assert!(slot != u32::MAX, "arena index space exhausted");
        Self {
            slot,
            _marker: PhantomData,
        }
    }

    fn slot(self) -> usize {
        self.slot as usize
    }
}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Idx<T> {}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Eq for Idx<T> {}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot)
    }
}

/// Slot storage keyed by `Idx<K>`. `None` marks a free slot.
///
/// `K` defaults to the stored type; a separate tag type lets indices be named
/// without mentioning the value's own type parameters.
pub(crate) struct Arena<T, K = T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    _key: PhantomData<fn() -> K>,
}

impl<T, K> Default for Arena<T, K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _key: PhantomData,
        }
    }
}

impl<T: Clone, K> Clone for Arena<T, K> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            free: self.free.clone(),
            _key: PhantomData,
        }
    }
}

impl<T, K> Arena<T, K> {
    /// Stores `value`, reusing a freed slot when one is available.
    pub(crate) fn alloc(&mut self, value: T) -> Idx<K> {
        if let Some(slot) = self.free.pop() {
            let idx = Idx::new(slot as usize);
            self.slots[idx.slot()] = Some(value);
            idx
        } else {
            self.slots.push(Some(value));
            Idx::new(self.slots.len() - 1)
        }
    }

    /// Releases the slot and returns its contents.
    pub(crate) fn free(&mut self, idx: Idx<K>) -> T {
        let Some(value) = self.slots.get_mut(idx.slot()).and_then(Option::take) else {
            dead_slot(idx.slot())
        };
        self.free.push(idx.slot);
        value
    }

    pub(crate) fn get(&self, idx: Idx<K>) -> &T {
        match self.slots.get(idx.slot()) {
            Some(Some(value)) => value,
            _ => dead_slot(idx.slot()),
        }
    }

    pub(crate) fn get_mut(&mut self, idx: Idx<K>) -> &mut T {
        match self.slots.get_mut(idx.slot()) {
            Some(Some(value)) => value,
            _ => dead_slot(idx.slot()),
        }
    }

    /// Number of live slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T, K> std::ops::Index<Idx<K>> for Arena<T, K> {
    type Output = T;

    fn index(&self, idx: Idx<K>) -> &T {
        self.get(idx)
    }
}

impl<T, K> std::ops::IndexMut<Idx<K>> for Arena<T, K> {
    fn index_mut(&mut self, idx: Idx<K>) -> &mut T {
        self.get_mut(idx)
    }
}

// A stale index means a node was freed while still linked somewhere.
#[cold]
#[track_caller]
#[allow(clippy::panic)]
fn dead_slot(slot: usize) -> ! {
    panic!("arena slot {slot} is not live")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_slots_are_recycled() {
        let mut arena: Arena<i32> = Arena::default();
        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_eq!(arena.free(a), 1);
        assert_eq!(arena.len(), 1);
        let c = arena.alloc(3);
        assert_eq!(c, a);
        assert_eq!(arena[b], 2);
        assert_eq!(arena[c], 3);
    }

    #[test]
    #[should_panic(expected = "not live")]
    fn reading_a_freed_slot_panics() {
        let mut arena: Arena<&str> = Arena::default();
        let a = arena.alloc("x");
        arena.free(a);
        let _ = arena.get(a);
    }
}
