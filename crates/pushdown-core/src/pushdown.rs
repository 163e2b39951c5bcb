// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pushdown transducer driven over a stack summary.
//!
//! A block is scanned without knowing the stack it starts on, so its partial
//! result is a whole [`StackSummary`]: every incoming-stack hypothesis that is
//! still alive, the stack it leads to, and the continuation's value along that
//! path. Adjacent summaries compose by joining the left finish stacks against
//! the right start stacks.

use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::flat_map::FlatStateMap;
use crate::summary::{Entry, ForkSource, StackSummary, StateId, Symbol};
use crate::table::{PopTarget, TransitionTable};
use crate::transducer::Transducer;
use crate::tree_map::TreeStateMap;

/// Partial result of a [`PushdownTransducer`]: one stack summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushdownResult<M> {
    map: M,
}

impl<M> PushdownResult<M> {
    /// The underlying summary.
    pub fn map(&self) -> &M {
        &self.map
    }

    /// Consumes the result, returning the summary.
    pub fn into_map(self) -> M {
        self.map
    }
}

/// Deterministic pushdown stage feeding its outputs into the continuation `N`,
/// with summaries stored in `M`.
pub struct PushdownTransducer<N, M> {
    next: N,
    table: TransitionTable,
    _map: PhantomData<fn() -> M>,
}

/// Production engine over the tree-indexed summary.
pub type TreePushdownTransducer<N> =
    PushdownTransducer<N, TreeStateMap<<N as Transducer>::PartialResult>>;

/// Reference engine over the flat summary.
pub type FlatPushdownTransducer<N> =
    PushdownTransducer<N, FlatStateMap<<N as Transducer>::PartialResult>>;

impl<N, M> PushdownTransducer<N, M>
where
    N: Transducer,
    N::Input: From<Symbol>,
    M: StackSummary<N::PartialResult>,
{
    /// Wraps the continuation `next` behind `table`.
    pub fn new(next: N, table: TransitionTable) -> Self {
        Self {
            next,
            table,
            _map: PhantomData,
        }
    }

    /// The compiled transition table.
    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// The continuation stage.
    pub fn next_stage(&self) -> &N {
        &self.next
    }

    /// Wraps an arbitrary summary as a result, e.g. to resume from a known
    /// configuration.
    pub fn result_from_map(&self, map: M) -> PushdownResult<M> {
        PushdownResult { map }
    }

    fn emitter(
        &self,
        output: Option<Symbol>,
        offset: usize,
    ) -> impl Fn(&mut N::PartialResult) + '_ {
        move |value| {
            if let Some(symbol) = output {
                self.next.process_symbol(value, N::Input::from(symbol), offset);
            }
        }
    }

    fn pop(&self, map: &mut M, layer: M::Layer, pops: &[PopTarget], offset: usize) {
        // Entries ending here have no frame below the current state inside this
        // block, so each alternative forks on the frame the block must have
        // been entered with.
        if map.has_values(layer) {
            let last = pops.len() - 1;
            for (i, pop) in pops.iter().enumerate() {
                let source = if i == last {
                    ForkSource::Consume
                } else {
                    ForkSource::Retain
                };
                map.pop_unknown_state(
                    layer,
                    pop.label,
                    pop.state,
                    source,
                    self.emitter(pop.output, offset),
                );
            }
        }
        for pop in pops {
            if let Some(child) = map.find_child(layer, pop.label) {
                map.pop_state(child, pop.state, self.emitter(pop.output, offset));
            }
        }
    }
}

/// Stacks of the entry joining `left` (earlier block) with `right`.
///
/// `right.start_stack` and `left.finish_stack` agree on their common length;
/// whichever is longer contributes its remaining frames.
fn join_stacks<V>(left: &Entry<'_, V>, right: &Entry<'_, V>) -> (Vec<StateId>, Vec<StateId>) {
    let consumed = right.start_stack.len();
    if left.finish_stack.len() > consumed {
        let mut finish = right.finish_stack.clone();
        finish.extend_from_slice(&left.finish_stack[consumed..]);
        (left.start_stack.clone(), finish)
    } else {
        let mut start = left.start_stack.clone();
        start.extend_from_slice(&right.start_stack[left.finish_stack.len()..]);
        (start, right.finish_stack.clone())
    }
}

impl<N, M> Transducer for PushdownTransducer<N, M>
where
    N: Transducer,
    N::Input: From<Symbol>,
    N::PartialResult: 'static,
    M: StackSummary<N::PartialResult>,
{
    type Input = Symbol;
    type PartialResult = PushdownResult<M>;
    type TerminalResult = N::TerminalResult;

    fn initial_result(&self) -> PushdownResult<M> {
        let mut map = M::default();
        let start = [self.table.start_state()];
        map.add_entry(&start, &start, self.next.initial_result());
        PushdownResult { map }
    }

    fn identity_result(&self) -> PushdownResult<M> {
        let mut map = M::default();
        for &state in self.table.states() {
            map.add_entry(&[state], &[state], self.next.identity_result());
        }
        PushdownResult { map }
    }

    fn process_symbol(&self, result: &mut PushdownResult<M>, symbol: Symbol, offset: usize) {
        let map = &mut result.map;
        let layers = map.layers();
        trace!(symbol, offset, layers = layers.len(), "pushdown step");
        for layer in layers {
            let state = map.layer_state(layer);
            let Some(rule) = self.table.lookup(state, symbol) else {
                continue;
            };
            if !rule.pops.is_empty() {
                self.pop(map, layer, &rule.pops, offset);
            } else if let Some(next_state) = rule.next {
                let emit = self.emitter(rule.output, offset);
                match rule.push {
                    Some(label) => map.push_state(layer, next_state, label, emit),
                    None => map.transition_state(layer, next_state, emit),
                }
            }
        }
        // Paths no rule matched are dead.
        map.finalise(false);
    }

    fn merge_results(&self, left: &mut PushdownResult<M>, mut right: PushdownResult<M>) {
        right.map.start_stack_finalise();
        let earlier = std::mem::take(&mut left.map);
        let mut merged = M::default();
        for e1 in earlier.entries() {
            for e2 in right.map.matching_entries(&e1.finish_stack) {
                let (start, finish) = join_stacks(&e1, &e2);
                let mut value = e1.value.clone();
                self.next.merge_results(&mut value, e2.value.clone());
                merged.add_entry(&start, &finish, value);
            }
        }
        merged.finalise(true);
        debug!(
            left = earlier.len(),
            right = right.map.len(),
            merged = merged.len(),
            "merged summaries"
        );
        left.map = merged;
    }

    fn last_stage_result<'a>(&self, result: &'a PushdownResult<M>) -> &'a N::TerminalResult {
        let entries = result.map.entries();
        assert_eq!(
            entries.len(),
            1,
            "final result must hold exactly one summary entry"
        );
        self.next.last_stage_result(entries[0].value)
    }
}
