// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Flat sorted-vector stack summary.
//!
//! This is the reference model for [`crate::TreeStateMap`]: every operation
//! rewrites the affected entries' stack vectors directly, which is easy to
//! audit but costs `O(entries)` per layer. Use it as an oracle in tests, not
//! on real inputs.

use std::fmt;

use crate::summary::{Entry, ForkSource, StackSummary, StateId};

#[derive(Clone)]
struct FlatEntry<V> {
    start: Vec<StateId>,
    finish: Vec<StateId>,
    value: V,
}

impl<V> FlatEntry<V> {
    fn view(&self) -> Entry<'_, V> {
        Entry {
            start_stack: self.start.clone(),
            finish_stack: self.finish.clone(),
            value: &self.value,
        }
    }

    fn canonical_key(&self) -> (&[StateId], &[StateId]) {
        (&self.finish, &self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexOrder {
    Finish,
    Start,
}

/// Contiguous run of entries in the current generation sharing a
/// `finish_stack` prefix through `depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatLayer {
    depth: usize,
    state: StateId,
    begin: usize,
    children_begin: usize,
    end: usize,
    generation: u64,
}

/// Reference stack summary backed by a vector sorted by
/// `(finish_stack, start_stack)`.
///
/// Slots of the current generation become `None` once an operation has moved
/// their entry into the next generation.
#[derive(Clone)]
pub struct FlatStateMap<V> {
    current: Vec<Option<FlatEntry<V>>>,
    next: Vec<FlatEntry<V>>,
    order: IndexOrder,
    generation: u64,
}

impl<V> Default for FlatStateMap<V> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            next: Vec::new(),
            order: IndexOrder::Finish,
            generation: 0,
        }
    }
}

impl<V: Clone> FlatStateMap<V> {
    fn check(&self, layer: FlatLayer) {
        assert_eq!(
            layer.generation, self.generation,
            "layer handle used after the summary was restructured"
        );
        assert_eq!(
            self.order,
            IndexOrder::Finish,
            "summary is indexed by start stack; call finalise first"
        );
    }

    fn group(&self, depth: usize, begin: usize, end: usize) -> Vec<FlatLayer> {
        let mut layers = Vec::new();
        let mut i = begin;
        while i < end {
            let Some(first) = &self.current[i] else {
                i += 1;
                continue;
            };
            assert!(first.finish.len() > depth, "entry too shallow for layer");
            let state = first.finish[depth];
            let mut children_begin = (first.finish.len() != depth + 1).then_some(i);
            let mut j = i + 1;
            while j < end {
                match &self.current[j] {
                    None => {}
                    Some(e) if e.finish.len() > depth && e.finish[depth] == state => {
                        if children_begin.is_none() && e.finish.len() != depth + 1 {
                            children_begin = Some(j);
                        }
                    }
                    Some(_) => break,
                }
                j += 1;
            }
            layers.push(FlatLayer {
                depth,
                state,
                begin: i,
                children_begin: children_begin.unwrap_or(j),
                end: j,
                generation: self.generation,
            });
            i = j;
        }
        layers
    }

    fn take_range<F>(&mut self, begin: usize, end: usize, mut rewrite: F)
    where
        F: FnMut(&mut FlatEntry<V>),
    {
        for slot in &mut self.current[begin..end] {
            if let Some(mut entry) = slot.take() {
                rewrite(&mut entry);
                self.next.push(entry);
            }
        }
    }

    fn drop_range(&mut self, begin: usize, end: usize) {
        for slot in &mut self.current[begin..end] {
            *slot = None;
        }
    }

    fn start_at(&self, i: usize) -> &[StateId] {
        self.current[i].as_ref().map_or(&[][..], |e| e.start.as_slice())
    }
}

impl<V: Clone> StackSummary<V> for FlatStateMap<V> {
    type Layer = FlatLayer;

    fn add_entry(&mut self, start_stack: &[StateId], finish_stack: &[StateId], value: V) {
        assert!(!start_stack.is_empty(), "start stack must not be empty");
        assert!(!finish_stack.is_empty(), "finish stack must not be empty");
        assert_eq!(self.order, IndexOrder::Finish, "cannot seed a start-indexed summary");
        self.current.retain(Option::is_some);
        assert!(
            !self.current.iter().flatten().any(|e| e.start == start_stack),
            "start stack {start_stack:?} already present"
        );
        let entry = FlatEntry {
            start: start_stack.to_vec(),
            finish: finish_stack.to_vec(),
            value,
        };
        let at = self.current.partition_point(|slot| {
            slot.as_ref()
                .is_some_and(|e| e.canonical_key() < entry.canonical_key())
        });
        self.current.insert(at, Some(entry));
        self.generation += 1;
    }

    fn clear(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
    }

    fn len(&self) -> usize {
        self.current.iter().flatten().count()
    }

    fn entries(&self) -> Vec<Entry<'_, V>> {
        self.current.iter().flatten().map(FlatEntry::view).collect()
    }

    fn layers(&self) -> Vec<FlatLayer> {
        assert_eq!(self.order, IndexOrder::Finish, "summary is indexed by start stack");
        self.group(0, 0, self.current.len())
    }

    fn layer_state(&self, layer: FlatLayer) -> StateId {
        self.check(layer);
        layer.state
    }

    fn layer_depth(&self, layer: FlatLayer) -> usize {
        self.check(layer);
        layer.depth
    }

    fn has_values(&self, layer: FlatLayer) -> bool {
        self.check(layer);
        self.current[layer.begin..layer.children_begin]
            .iter()
            .any(Option::is_some)
    }

    fn values(&self, layer: FlatLayer) -> Vec<&V> {
        self.check(layer);
        self.current[layer.begin..layer.children_begin]
            .iter()
            .flatten()
            .map(|e| &e.value)
            .collect()
    }

    fn children(&self, layer: FlatLayer) -> Vec<FlatLayer> {
        self.check(layer);
        self.group(layer.depth + 1, layer.children_begin, layer.end)
    }

    fn find_child(&self, layer: FlatLayer, state: StateId) -> Option<FlatLayer> {
        self.children(layer).into_iter().find(|c| c.state == state)
    }

    fn transition_state<F>(&mut self, layer: FlatLayer, new_state: StateId, mut update: F)
    where
        F: FnMut(&mut V),
    {
        self.check(layer);
        assert_eq!(layer.depth, 0, "transition needs a top-level layer");
        self.take_range(layer.begin, layer.end, |e| {
            e.finish[0] = new_state;
            update(&mut e.value);
        });
    }

    fn push_state<F>(
        &mut self,
        layer: FlatLayer,
        new_state: StateId,
        pushed_state: StateId,
        mut update: F,
    ) where
        F: FnMut(&mut V),
    {
        self.check(layer);
        assert_eq!(layer.depth, 0, "push needs a top-level layer");
        self.take_range(layer.begin, layer.end, |e| {
            e.finish[0] = pushed_state;
            e.finish.insert(0, new_state);
            update(&mut e.value);
        });
    }

    fn pop_state<F>(&mut self, child: FlatLayer, new_state: StateId, mut update: F)
    where
        F: FnMut(&mut V),
    {
        self.check(child);
        assert_eq!(child.depth, 1, "pop needs a child of a top-level layer");
        self.take_range(child.begin, child.end, |e| {
            e.finish.remove(0);
            e.finish[0] = new_state;
            update(&mut e.value);
        });
    }

    fn pop_unknown_state<F>(
        &mut self,
        layer: FlatLayer,
        assumed_incoming_state: StateId,
        new_state: StateId,
        source: ForkSource,
        mut update: F,
    ) where
        F: FnMut(&mut V),
    {
        self.check(layer);
        assert_eq!(layer.depth, 0, "unknown pop needs a top-level layer");
        for slot in &mut self.current[layer.begin..layer.children_begin] {
            let Some(original) = slot else { continue };
            let mut forked = original.clone();
            forked.finish[0] = new_state;
            forked.start.push(assumed_incoming_state);
            update(&mut forked.value);
            self.next.push(forked);
            if source == ForkSource::Consume {
                *slot = None;
            }
        }
    }

    fn clear_values(&mut self, layer: FlatLayer) {
        self.check(layer);
        self.drop_range(layer.begin, layer.children_begin);
    }

    fn erase(&mut self, layer: FlatLayer) {
        self.check(layer);
        self.drop_range(layer.begin, layer.end);
    }

    fn finalise(&mut self, keep_unmodified: bool) {
        let mut committed = std::mem::take(&mut self.next);
        if keep_unmodified {
            committed.extend(self.current.drain(..).flatten());
        }
        committed.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
        for pair in committed.windows(2) {
            assert!(
                pair[0].canonical_key() != pair[1].canonical_key(),
                "duplicate summary entry {:?} -> {:?}",
                pair[0].start,
                pair[0].finish
            );
        }
        self.current = committed.into_iter().map(Some).collect();
        self.order = IndexOrder::Finish;
        self.generation += 1;
    }

    fn start_stack_finalise(&mut self) {
        assert!(self.next.is_empty(), "uncommitted changes; call finalise first");
        self.current.retain(Option::is_some);
        self.current.sort_by(|a, b| match (a, b) {
            (Some(a), Some(b)) => (&a.start, &a.finish).cmp(&(&b.start, &b.finish)),
            _ => std::cmp::Ordering::Equal,
        });
        self.order = IndexOrder::Start;
        self.generation += 1;
    }

    fn matching_entries(&self, stack: &[StateId]) -> Vec<Entry<'_, V>> {
        assert_eq!(
            self.order,
            IndexOrder::Start,
            "matching_entries needs start_stack_finalise"
        );
        let n = self.current.len();
        let mut found = Vec::new();
        for k in 1..stack.len() {
            let prefix = &stack[..k];
            let mut i = self.current.partition_point(|slot| {
                slot.as_ref().is_some_and(|e| e.start.as_slice() < prefix)
            });
            while i < n && self.start_at(i) == prefix {
                found.extend(self.current[i].as_ref().map(FlatEntry::view));
                i += 1;
            }
        }
        let mut i = self
            .current
            .partition_point(|slot| slot.as_ref().is_some_and(|e| e.start.as_slice() < stack));
        while i < n && self.start_at(i).starts_with(stack) {
            found.extend(self.current[i].as_ref().map(FlatEntry::view));
            i += 1;
        }
        found
    }
}

impl<V: Clone + PartialEq> PartialEq for FlatStateMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_entries() == other.sorted_entries()
    }
}

impl<V: Clone + Eq> Eq for FlatStateMap<V> {}

impl<V: Clone + fmt::Debug> fmt::Debug for FlatStateMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sorted_entries()).finish()
    }
}
