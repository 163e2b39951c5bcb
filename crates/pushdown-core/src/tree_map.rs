// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tree-indexed stack summary.
//!
//! Entries live on two tries over the same state alphabet:
//!
//! - the **start trie** holds one path per `start_stack`; the node at the end
//!   of a path (a *start leaf*) owns the entry's value and links to the finish
//!   node it currently maps to;
//! - the **finish trie** holds one path per distinct `finish_stack`; every node
//!   lists the start leaves whose `finish_stack` ends there.
//!
//! Entries that share a `finish_stack` prefix share finish nodes, so a
//! transition, push or pop relinks a single subtree no matter how many entries
//! hang below it. When two subtrees land on the same state they are merged
//! node by node, which keeps the finish trie bounded by the number of distinct
//! stack prefixes rather than by the number of entries.
//!
//! The finish trie is double-buffered: operations read from `finish_root` and
//! relink into `next_root`; [`StackSummary::finalise`] swaps the two.

use std::collections::BTreeMap;
use std::fmt;

use crate::arena::{Arena, Idx};
use crate::summary::{Entry, ForkSource, StackSummary, StateId};

pub(crate) enum StartTag {}
pub(crate) enum FinishTag {}

type StartId = Idx<StartTag>;
type FinishId = Idx<FinishTag>;

#[derive(Clone)]
struct StartNode<V> {
    state: StateId,
    parent: Option<StartId>,
    children: BTreeMap<StateId, StartId>,
    /// Set only on start leaves.
    finish: Option<FinishId>,
    value: Option<V>,
}

impl<V> StartNode<V> {
    fn new(state: StateId, parent: Option<StartId>) -> Self {
        Self {
            state,
            parent,
            children: BTreeMap::new(),
            finish: None,
            value: None,
        }
    }
}

#[derive(Clone)]
struct FinishNode {
    state: StateId,
    parent: Option<FinishId>,
    children: BTreeMap<StateId, FinishId>,
    leaves: Vec<StartId>,
}

impl FinishNode {
    fn new(state: StateId, parent: Option<FinishId>) -> Self {
        Self {
            state,
            parent,
            children: BTreeMap::new(),
            leaves: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.leaves.is_empty()
    }
}

/// Handle to one finish-trie node of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLayer {
    node: FinishId,
    depth: usize,
    generation: u64,
}

/// Production stack summary: two cross-linked tries in slot arenas.
#[derive(Clone)]
pub struct TreeStateMap<V> {
    starts: Arena<StartNode<V>, StartTag>,
    finishes: Arena<FinishNode, FinishTag>,
    start_root: StartId,
    finish_root: FinishId,
    next_root: FinishId,
    generation: u64,
}

impl<V> Default for TreeStateMap<V> {
    fn default() -> Self {
        let mut starts = Arena::default();
        let mut finishes = Arena::default();
        let start_root = starts.alloc(StartNode::new(0, None));
        let finish_root = finishes.alloc(FinishNode::new(0, None));
        let next_root = finishes.alloc(FinishNode::new(0, None));
        Self {
            starts,
            finishes,
            start_root,
            finish_root,
            next_root,
            generation: 0,
        }
    }
}

impl<V: Clone> TreeStateMap<V> {
    /// Live nodes across both tries, sentinels included.
    pub fn node_count(&self) -> usize {
        self.starts.len() + self.finishes.len()
    }

    /// Asserts that both tries link back consistently.
    ///
    /// Every finish node reachable from the current root is its children's
    /// parent and lists exactly the start leaves that point at it; every start
    /// leaf points at a finish node whose root is the current one.
    ///
    /// # Panics
    /// On the first broken link, or while a round is still uncommitted.
    pub fn validate(&self) {
        assert!(
            self.finishes[self.next_root].is_empty(),
            "next generation holds uncommitted nodes"
        );

        let mut linked = 0usize;
        let mut pending = vec![self.finish_root];
        while let Some(node) = pending.pop() {
            let finish = &self.finishes[node];
            for (&state, &child) in &finish.children {
                assert_eq!(self.finishes[child].parent, Some(node), "finish child lost its parent");
                assert_eq!(self.finishes[child].state, state, "finish child keyed by wrong state");
                pending.push(child);
            }
            for &leaf in &finish.leaves {
                assert_eq!(
                    self.starts[leaf].finish,
                    Some(node),
                    "finish node lists a foreign leaf"
                );
                linked += 1;
            }
        }

        let mut leaves = 0usize;
        let mut pending = vec![self.start_root];
        while let Some(node) = pending.pop() {
            let start = &self.starts[node];
            for (&state, &child) in &start.children {
                assert_eq!(self.starts[child].parent, Some(node), "start child lost its parent");
                assert_eq!(self.starts[child].state, state, "start child keyed by wrong state");
                pending.push(child);
            }
            let Some(mut cursor) = start.finish else {
                assert!(start.value.is_none(), "unlinked start node holds a value");
                continue;
            };
            assert!(start.value.is_some(), "start leaf without a value");
            assert!(
                self.finishes[cursor].leaves.contains(&node),
                "start leaf missing from its finish node"
            );
            while let Some(parent) = self.finishes[cursor].parent {
                cursor = parent;
            }
            assert_eq!(cursor, self.finish_root, "start leaf links outside the current trie");
            leaves += 1;
        }
        assert_eq!(leaves, linked, "finish trie and start trie disagree on entry count");
    }

    fn check(&self, layer: TreeLayer) {
        assert_eq!(
            layer.generation, self.generation,
            "layer handle used after the summary was restructured"
        );
    }

    fn check_top_level(&self, layer: TreeLayer) {
        self.check(layer);
        assert_eq!(layer.depth, 0, "operation needs a top-level layer");
        assert_eq!(
            self.finishes[layer.node].parent,
            Some(self.finish_root),
            "layer was already moved this round"
        );
    }

    fn start_child(&mut self, parent: StartId, state: StateId) -> StartId {
        if let Some(&child) = self.starts[parent].children.get(&state) {
            return child;
        }
        let child = self.starts.alloc(StartNode::new(state, Some(parent)));
        self.starts[parent].children.insert(state, child);
        child
    }

    fn finish_child(&mut self, parent: FinishId, state: StateId) -> FinishId {
        if let Some(&child) = self.finishes[parent].children.get(&state) {
            return child;
        }
        let child = self.finishes.alloc(FinishNode::new(state, Some(parent)));
        self.finishes[parent].children.insert(state, child);
        child
    }

    fn connect(&mut self, leaf: StartId, node: FinishId) {
        self.starts[leaf].finish = Some(node);
        self.finishes[node].leaves.push(leaf);
    }

    /// Unlinks `node` from its parent. Must run before the node's state changes.
    fn detach_finish(&mut self, node: FinishId) {
        if let Some(parent) = self.finishes[node].parent.take() {
            let state = self.finishes[node].state;
            self.finishes[parent].children.remove(&state);
        }
    }

    /// Attaches a detached `child` under `parent`, folding it into an existing
    /// sibling with the same state.
    fn merge_child(&mut self, parent: FinishId, child: FinishId) {
        let state = self.finishes[child].state;
        let Some(existing) = self.finishes[parent].children.get(&state).copied() else {
            self.finishes[child].parent = Some(parent);
            self.finishes[parent].children.insert(state, child);
            return;
        };
        let duplicate = self.finishes.free(child);
        for grandchild in duplicate.children.into_values() {
            self.finishes[grandchild].parent = None;
            self.merge_child(existing, grandchild);
        }
        for leaf in duplicate.leaves {
            self.connect(leaf, existing);
        }
    }

    fn update_values<F>(&mut self, node: FinishId, update: &mut F)
    where
        F: FnMut(&mut V),
    {
        let mut pending = vec![node];
        while let Some(n) = pending.pop() {
            let finish = &self.finishes[n];
            pending.extend(finish.children.values().copied());
            for &leaf in &finish.leaves {
                if let Some(value) = self.starts[leaf].value.as_mut() {
                    update(value);
                }
            }
        }
    }

    /// Frees `node` and its subtree, releasing every start leaf attached to it.
    fn erase_finish(&mut self, node: FinishId) {
        self.detach_finish(node);
        let mut pending = vec![node];
        while let Some(n) = pending.pop() {
            let freed = self.finishes.free(n);
            pending.extend(freed.children.into_values());
            for leaf in freed.leaves {
                self.release_leaf(leaf);
            }
        }
    }

    fn release_leaf(&mut self, leaf: StartId) {
        let start = &mut self.starts[leaf];
        start.finish = None;
        start.value = None;
        self.prune_start(leaf);
    }

    /// Frees start nodes that no longer lead to any entry, walking rootwards.
    fn prune_start(&mut self, mut node: StartId) {
        while node != self.start_root {
            let start = &self.starts[node];
            if start.finish.is_some() || !start.children.is_empty() {
                return;
            }
            let Some(parent) = start.parent else { return };
            let state = start.state;
            self.starts.free(node);
            self.starts[parent].children.remove(&state);
            node = parent;
        }
    }

    /// Frees finish nodes without entries below them. Returns whether `node`
    /// itself ended up empty.
    fn prune_finish(&mut self, node: FinishId) -> bool {
        let children: Vec<FinishId> = self.finishes[node].children.values().copied().collect();
        for child in children {
            if self.prune_finish(child) {
                self.detach_finish(child);
                self.finishes.free(child);
            }
        }
        self.finishes[node].is_empty()
    }

    /// Start leaves under `from` (inclusive) in `start_stack` order.
    fn leaves_under(&self, from: StartId) -> Vec<StartId> {
        let mut leaves = Vec::new();
        let mut pending = vec![from];
        while let Some(n) = pending.pop() {
            let start = &self.starts[n];
            if start.finish.is_some() {
                leaves.push(n);
            }
            pending.extend(start.children.values().rev().copied());
        }
        leaves
    }

    fn view(&self, leaf: StartId) -> Option<Entry<'_, V>> {
        let start = &self.starts[leaf];
        let value = start.value.as_ref()?;

        let mut start_stack = Vec::new();
        let mut cursor = leaf;
        while let Some(parent) = self.starts[cursor].parent {
            start_stack.push(self.starts[cursor].state);
            cursor = parent;
        }
        start_stack.reverse();

        let mut finish_stack = Vec::new();
        let mut cursor = start.finish?;
        while let Some(parent) = self.finishes[cursor].parent {
            finish_stack.push(self.finishes[cursor].state);
            cursor = parent;
        }
        finish_stack.reverse();

        Some(Entry {
            start_stack,
            finish_stack,
            value,
        })
    }

    fn layer_at(&self, node: FinishId, depth: usize) -> TreeLayer {
        TreeLayer {
            node,
            depth,
            generation: self.generation,
        }
    }
}

impl<V: Clone> StackSummary<V> for TreeStateMap<V> {
    type Layer = TreeLayer;

    fn add_entry(&mut self, start_stack: &[StateId], finish_stack: &[StateId], value: V) {
        assert!(!start_stack.is_empty(), "start stack must not be empty");
        assert!(!finish_stack.is_empty(), "finish stack must not be empty");
        let mut leaf = self.start_root;
        for &state in start_stack {
            leaf = self.start_child(leaf, state);
        }
        assert!(
            self.starts[leaf].finish.is_none(),
            "start stack {start_stack:?} already present"
        );
        let mut node = self.finish_root;
        for &state in finish_stack {
            node = self.finish_child(node, state);
        }
        self.starts[leaf].value = Some(value);
        self.connect(leaf, node);
        self.generation += 1;
    }

    fn clear(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
    }

    fn len(&self) -> usize {
        self.leaves_under(self.start_root).len()
    }

    fn entries(&self) -> Vec<Entry<'_, V>> {
        self.leaves_under(self.start_root)
            .into_iter()
            .filter_map(|leaf| self.view(leaf))
            .collect()
    }

    fn layers(&self) -> Vec<TreeLayer> {
        self.finishes[self.finish_root]
            .children
            .values()
            .map(|&node| self.layer_at(node, 0))
            .collect()
    }

    fn layer_state(&self, layer: TreeLayer) -> StateId {
        self.check(layer);
        self.finishes[layer.node].state
    }

    fn layer_depth(&self, layer: TreeLayer) -> usize {
        self.check(layer);
        layer.depth
    }

    fn has_values(&self, layer: TreeLayer) -> bool {
        self.check(layer);
        !self.finishes[layer.node].leaves.is_empty()
    }

    fn values(&self, layer: TreeLayer) -> Vec<&V> {
        self.check(layer);
        self.finishes[layer.node]
            .leaves
            .iter()
            .filter_map(|&leaf| self.starts[leaf].value.as_ref())
            .collect()
    }

    fn children(&self, layer: TreeLayer) -> Vec<TreeLayer> {
        self.check(layer);
        self.finishes[layer.node]
            .children
            .values()
            .map(|&node| self.layer_at(node, layer.depth + 1))
            .collect()
    }

    fn find_child(&self, layer: TreeLayer, state: StateId) -> Option<TreeLayer> {
        self.check(layer);
        self.finishes[layer.node]
            .children
            .get(&state)
            .map(|&node| self.layer_at(node, layer.depth + 1))
    }

    fn transition_state<F>(&mut self, layer: TreeLayer, new_state: StateId, mut update: F)
    where
        F: FnMut(&mut V),
    {
        self.check_top_level(layer);
        let node = layer.node;
        self.detach_finish(node);
        self.finishes[node].state = new_state;
        self.update_values(node, &mut update);
        self.merge_child(self.next_root, node);
    }

    fn push_state<F>(
        &mut self,
        layer: TreeLayer,
        new_state: StateId,
        pushed_state: StateId,
        mut update: F,
    ) where
        F: FnMut(&mut V),
    {
        self.check_top_level(layer);
        let node = layer.node;
        self.detach_finish(node);
        let top = self.finish_child(self.next_root, new_state);
        self.finishes[node].state = pushed_state;
        self.update_values(node, &mut update);
        self.merge_child(top, node);
    }

    fn pop_state<F>(&mut self, child: TreeLayer, new_state: StateId, mut update: F)
    where
        F: FnMut(&mut V),
    {
        self.check(child);
        assert_eq!(child.depth, 1, "pop needs a child of a top-level layer");
        let node = child.node;
        let parent = self.finishes[node].parent;
        assert!(
            parent.is_some_and(|p| self.finishes[p].parent == Some(self.finish_root)),
            "layer was already moved this round"
        );
        self.detach_finish(node);
        self.finishes[node].state = new_state;
        self.update_values(node, &mut update);
        self.merge_child(self.next_root, node);
    }

    fn pop_unknown_state<F>(
        &mut self,
        layer: TreeLayer,
        assumed_incoming_state: StateId,
        new_state: StateId,
        source: ForkSource,
        mut update: F,
    ) where
        F: FnMut(&mut V),
    {
        self.check_top_level(layer);
        let leaves = self.finishes[layer.node].leaves.clone();
        if leaves.is_empty() {
            return;
        }
        let target = self.finish_child(self.next_root, new_state);
        for leaf in leaves {
            let forked = self.start_child(leaf, assumed_incoming_state);
            assert!(
                self.starts[forked].finish.is_none(),
                "forked start stack already present"
            );
            let mut value = self.starts[leaf].value.clone();
            if let Some(value) = value.as_mut() {
                update(value);
            }
            self.starts[forked].value = value;
            self.connect(forked, target);
        }
        if source == ForkSource::Consume {
            self.clear_values(layer);
        }
    }

    fn clear_values(&mut self, layer: TreeLayer) {
        self.check(layer);
        let leaves = std::mem::take(&mut self.finishes[layer.node].leaves);
        for leaf in leaves {
            self.release_leaf(leaf);
        }
    }

    fn erase(&mut self, layer: TreeLayer) {
        self.check(layer);
        self.erase_finish(layer.node);
    }

    fn finalise(&mut self, keep_unmodified: bool) {
        let tops = std::mem::take(&mut self.finishes[self.finish_root].children);
        for top in tops.into_values() {
            self.finishes[top].parent = None;
            if keep_unmodified {
                self.merge_child(self.next_root, top);
            } else {
                self.erase_finish(top);
            }
        }
        self.prune_finish(self.next_root);
        std::mem::swap(&mut self.finish_root, &mut self.next_root);
        self.generation += 1;
    }

    fn start_stack_finalise(&mut self) {
        assert!(
            self.finishes[self.next_root].children.is_empty(),
            "uncommitted changes; call finalise first"
        );
        // The start trie is always indexed; only outstanding layer handles
        // need invalidating.
        self.generation += 1;
    }

    fn matching_entries(&self, stack: &[StateId]) -> Vec<Entry<'_, V>> {
        let mut found = Vec::new();
        let mut node = self.start_root;
        for (k, state) in stack.iter().enumerate() {
            let Some(&child) = self.starts[node].children.get(state) else {
                return found;
            };
            node = child;
            if k + 1 < stack.len() {
                found.extend(self.view(node));
            }
        }
        found.extend(
            self.leaves_under(node)
                .into_iter()
                .filter_map(|leaf| self.view(leaf)),
        );
        found
    }
}

impl<V: Clone + PartialEq> PartialEq for TreeStateMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_entries() == other.sorted_entries()
    }
}

impl<V: Clone + Eq> Eq for TreeStateMap<V> {}

impl<V: Clone + fmt::Debug> fmt::Debug for TreeStateMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sorted_entries()).finish()
    }
}
