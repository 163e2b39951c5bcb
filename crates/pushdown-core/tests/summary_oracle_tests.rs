// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
//! Randomised rounds of layer operations, applied to the flat reference store
//! and the tree store side by side.

use std::collections::BTreeMap;

use proptest::prelude::*;
use pushdown_core::{FlatStateMap, ForkSource, StackSummary, StateId, TreeStateMap};
use pushdown_dry_tests::rows;

#[derive(Debug, Clone)]
enum Op {
    Keep,
    Transition(StateId),
    Push(StateId, StateId),
    PopChild(usize, StateId),
    Fork(StateId, StateId),
    ForkTwice(StateId, StateId, StateId),
    ClearValues,
    Erase,
}

#[derive(Debug, Clone)]
struct Round {
    ops: Vec<Op>,
    keep_unmodified: bool,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Keep),
        (0u32..5).prop_map(Op::Transition),
        (0u32..5, 0u32..5).prop_map(|(s, p)| Op::Push(s, p)),
        (0usize..3, 0u32..5).prop_map(|(j, s)| Op::PopChild(j, s)),
        (0u32..5, 0u32..5).prop_map(|(x, s)| Op::Fork(x, s)),
        (0u32..4, 0u32..5, 0u32..5).prop_map(|(x, s1, s2)| Op::ForkTwice(x, s1, s2)),
        Just(Op::ClearValues),
        Just(Op::Erase),
    ]
}

fn round() -> impl Strategy<Value = Round> {
    (prop::collection::vec(op(), 0..6), any::<bool>()).prop_map(|(ops, keep_unmodified)| Round {
        ops,
        keep_unmodified,
    })
}

fn seeds() -> impl Strategy<Value = BTreeMap<StateId, Vec<StateId>>> {
    prop::collection::btree_map(0u32..8, prop::collection::vec(0u32..5, 1..4), 1..6)
}

fn seeded<M: StackSummary<u32>>(seeds: &BTreeMap<StateId, Vec<StateId>>) -> M {
    let mut m = M::default();
    for (&start, finish) in seeds {
        m.add_entry(&[start], finish, start);
    }
    m
}

fn apply<M: StackSummary<u32>>(m: &mut M, round: &Round) {
    let layers = m.layers();
    for (k, (layer, op)) in layers.into_iter().zip(&round.ops).enumerate() {
        let tag = u32::try_from(k).unwrap_or(u32::MAX);
        let bump = move |v: &mut u32| *v = v.wrapping_mul(31).wrapping_add(tag);
        match *op {
            Op::Keep => {}
            Op::Transition(s) => m.transition_state(layer, s, bump),
            Op::Push(s, p) => m.push_state(layer, s, p, bump),
            Op::PopChild(j, s) => {
                let children = m.children(layer);
                if !children.is_empty() {
                    m.pop_state(children[j % children.len()], s, bump);
                }
            }
            Op::Fork(x, s) => m.pop_unknown_state(layer, x, s, ForkSource::Consume, bump),
            Op::ForkTwice(x, s1, s2) => {
                m.pop_unknown_state(layer, x, s1, ForkSource::Retain, bump);
                m.pop_unknown_state(layer, x + 1, s2, ForkSource::Consume, bump);
            }
            Op::ClearValues => m.clear_values(layer),
            Op::Erase => m.erase(layer),
        }
    }
    m.finalise(round.keep_unmodified);
}

/// Entries reachable from `layer`, counted through its children.
fn count_under<M: StackSummary<u32>>(m: &M, layer: M::Layer) -> usize {
    m.values(layer).len()
        + m.children(layer)
            .into_iter()
            .map(|child| count_under(m, child))
            .sum::<usize>()
}

fn check_layers<M: StackSummary<u32>>(m: &M) -> Result<(), TestCaseError> {
    let layers = m.layers();
    let states: Vec<StateId> = layers.iter().map(|&l| m.layer_state(l)).collect();
    prop_assert!(states.windows(2).all(|w| w[0] < w[1]), "layers {:?}", states);
    let counted: usize = layers.iter().map(|&l| count_under(m, l)).sum();
    prop_assert_eq!(counted, m.len());
    for entry in m.entries() {
        prop_assert!(states.contains(&entry.finish_stack[0]));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn tree_store_matches_flat_store(
        seeds in seeds(),
        rounds in prop::collection::vec(round(), 1..6),
        queries in prop::collection::vec(prop::collection::vec(0u32..8, 0..4), 1..5),
    ) {
        let mut flat: FlatStateMap<u32> = seeded(&seeds);
        let mut tree: TreeStateMap<u32> = seeded(&seeds);
        for round in &rounds {
            apply(&mut flat, round);
            apply(&mut tree, round);
            prop_assert_eq!(rows(&flat), rows(&tree));
            check_layers(&flat)?;
            check_layers(&tree)?;
            tree.validate();
        }

        flat.start_stack_finalise();
        tree.start_stack_finalise();
        tree.validate();
        for query in &queries {
            let expected: Vec<_> = flat
                .matching_entries(query)
                .into_iter()
                .map(|e| (e.start_stack, e.finish_stack, *e.value))
                .collect();
            let actual: Vec<_> = tree
                .matching_entries(query)
                .into_iter()
                .map(|e| (e.start_stack, e.finish_stack, *e.value))
                .collect();
            prop_assert_eq!(&expected, &actual);
            for (start, _, _) in &expected {
                prop_assert!(pushdown_core::shares_prefix(start, query));
            }
        }
    }
}
