// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared contract for stack-summary stores.
//!
//! A summary is the set of `(start_stack, finish_stack, value)` entries a block
//! produces: for every hypothesised incoming stack prefix (`start_stack`) the
//! stack the block leaves behind (`finish_stack`) and the continuation value
//! accumulated along that path.
//!
//! Both stacks are stored top-first. Element 0 of `finish_stack` is the current
//! automaton state; each later element is one frame deeper. Element 0 of
//! `start_stack` is the state the block was entered in; later elements are
//! frames the block popped without having pushed them first.
//!
//! # Generations
//!
//! Mutating operations never touch the entries being read. Each one moves or
//! copies the affected entries into a *next* generation; [`StackSummary::finalise`]
//! commits it. Layer handles record the generation they were produced in and
//! every structural change (`add_entry`, `finalise`, `start_stack_finalise`,
//! `clear`) bumps it, so a stale handle is rejected instead of silently
//! addressing the wrong entries.

use std::cmp::Ordering;

/// Automaton state (and stack frame label) identifier.
pub type StateId = u32;

/// Input or output symbol identifier.
pub type Symbol = u32;

/// A borrowed view of one summary entry with its stacks materialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a, V> {
    /// Frames the block requires on entry, top-first.
    pub start_stack: Vec<StateId>,
    /// Frames the block leaves on exit, top-first.
    pub finish_stack: Vec<StateId>,
    /// Continuation value accumulated along this path.
    pub value: &'a V,
}

impl<V> Entry<'_, V> {
    /// Canonical summary order: `finish_stack`, then `start_stack`.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.finish_stack
            .cmp(&other.finish_stack)
            .then_with(|| self.start_stack.cmp(&other.start_stack))
    }
}

/// What [`StackSummary::pop_unknown_state`] does with the entries it forks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkSource {
    /// Leave the originals in place; another fork or operation still needs them.
    Retain,
    /// Remove the originals once the fork has been made.
    Consume,
}

/// Capability set shared by the flat reference store and the tree-indexed store.
///
/// Layer handles are cheap cursors. `transition_state`, `push_state` and
/// `pop_unknown_state` take a top-level layer (from [`StackSummary::layers`]);
/// `pop_state` takes one of its children (from [`StackSummary::children`] or
/// [`StackSummary::find_child`]).
pub trait StackSummary<V: Clone>: Default + Clone {
    /// Cursor over all entries sharing a `finish_stack` prefix.
    type Layer: Copy + std::fmt::Debug;

    /// Seeds the current generation with one entry.
    ///
    /// Both stacks must be non-empty and `start_stack` must not already be
    /// present.
    fn add_entry(&mut self, start_stack: &[StateId], finish_stack: &[StateId], value: V);

    /// Drops every entry in both generations.
    fn clear(&mut self);

    /// Number of live entries in the current generation.
    fn len(&self) -> usize;

    /// Returns `true` when the current generation has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of the current generation in the store's index order.
    fn entries(&self) -> Vec<Entry<'_, V>>;

    /// Entries ordered by `finish_stack`, then `start_stack`.
    fn sorted_entries(&self) -> Vec<Entry<'_, V>> {
        let mut entries = self.entries();
        entries.sort_by(Entry::canonical_cmp);
        entries
    }

    /// Snapshot of the top-level layers, ordered by state.
    fn layers(&self) -> Vec<Self::Layer>;

    /// State shared by every entry of the layer at the layer's depth.
    fn layer_state(&self, layer: Self::Layer) -> StateId;

    /// Depth of the layer; top-level layers are at depth 0.
    fn layer_depth(&self, layer: Self::Layer) -> usize;

    /// Whether any entry's `finish_stack` ends exactly at this layer.
    fn has_values(&self, layer: Self::Layer) -> bool;

    /// Values of the entries whose `finish_stack` ends exactly at this layer.
    fn values(&self, layer: Self::Layer) -> Vec<&V>;

    /// Snapshot of the layers one frame deeper, ordered by state.
    fn children(&self, layer: Self::Layer) -> Vec<Self::Layer>;

    /// The child layer whose frame is `state`, if any.
    fn find_child(&self, layer: Self::Layer, state: StateId) -> Option<Self::Layer>;

    /// Replaces the top frame of every entry under `layer` with `new_state`.
    fn transition_state<F>(&mut self, layer: Self::Layer, new_state: StateId, update: F)
    where
        F: FnMut(&mut V);

    /// Replaces the top frame with `pushed_state` and pushes `new_state` above it.
    fn push_state<F>(
        &mut self,
        layer: Self::Layer,
        new_state: StateId,
        pushed_state: StateId,
        update: F,
    ) where
        F: FnMut(&mut V);

    /// Drops the top frame above `child` and sets the exposed frame to `new_state`.
    fn pop_state<F>(&mut self, child: Self::Layer, new_state: StateId, update: F)
    where
        F: FnMut(&mut V);

    /// Forks every entry ending exactly at `layer` into one that additionally
    /// requires an incoming frame `assumed_incoming_state` and now finishes in
    /// `new_state`.
    fn pop_unknown_state<F>(
        &mut self,
        layer: Self::Layer,
        assumed_incoming_state: StateId,
        new_state: StateId,
        source: ForkSource,
        update: F,
    ) where
        F: FnMut(&mut V);

    /// Removes the entries ending exactly at `layer`.
    fn clear_values(&mut self, layer: Self::Layer);

    /// Removes every entry under `layer`.
    fn erase(&mut self, layer: Self::Layer);

    /// Commits the next generation.
    ///
    /// With `keep_unmodified`, entries of the current generation that no
    /// operation touched are carried forward; otherwise they are dropped.
    fn finalise(&mut self, keep_unmodified: bool);

    /// Re-indexes by `start_stack`; required before [`StackSummary::matching_entries`].
    fn start_stack_finalise(&mut self);

    /// Entries whose `start_stack` is a prefix of `stack` or extends it,
    /// ordered by `start_stack`.
    fn matching_entries(&self, stack: &[StateId]) -> Vec<Entry<'_, V>>;
}

/// `true` when one of the two stacks is a prefix of the other.
pub fn shares_prefix(a: &[StateId], b: &[StateId]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}
