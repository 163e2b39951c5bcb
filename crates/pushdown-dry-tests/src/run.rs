// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Helpers for scanning an input in caller-chosen blocks.

use pushdown_core::{StackSummary, StateId, Transducer};

/// `(start_stack, finish_stack, value)` of one summary entry.
pub type Row<V> = (Vec<StateId>, Vec<StateId>, V);

/// Feeds `block` into `result`; the block's first symbol sits at `base`.
pub fn feed<T>(transducer: &T, result: &mut T::PartialResult, block: &[T::Input], base: usize)
where
    T: Transducer,
    T::Input: Copy,
{
    for (i, &symbol) in block.iter().enumerate() {
        transducer.process_symbol(result, symbol, base + i);
    }
}

/// Scans `input` cut at the ascending positions in `cuts`.
///
/// The first block starts from `initial_result`, the others from
/// `identity_result`. Returns one result per block, in input order.
///
/// # Panics
/// If `cuts` is not ascending or points past the end of `input`.
pub fn scan_blocks<T>(
    transducer: &T,
    input: &[T::Input],
    cuts: &[usize],
) -> Vec<T::PartialResult>
where
    T: Transducer,
    T::Input: Copy,
{
    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(0);
    bounds.extend_from_slice(cuts);
    bounds.push(input.len());
    bounds
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (begin, end) = (w[0], w[1]);
            assert!(begin <= end && end <= input.len(), "cuts out of order: {cuts:?}");
            let mut result = if i == 0 {
                transducer.initial_result()
            } else {
                transducer.identity_result()
            };
            feed(transducer, &mut result, &input[begin..end], begin);
            result
        })
        .collect()
}

/// Merges block results as `((r0 · r1) · r2) · …`; `None` for no blocks.
pub fn merge_left<T>(transducer: &T, results: Vec<T::PartialResult>) -> Option<T::PartialResult>
where
    T: Transducer,
{
    results.into_iter().reduce(|mut acc, next| {
        transducer.merge_results(&mut acc, next);
        acc
    })
}

/// Merges block results as `r0 · (r1 · (r2 · …))`; `None` for no blocks.
pub fn merge_right<T>(transducer: &T, results: Vec<T::PartialResult>) -> Option<T::PartialResult>
where
    T: Transducer,
{
    results.into_iter().rev().reduce(|acc, mut earlier| {
        transducer.merge_results(&mut earlier, acc);
        earlier
    })
}

/// Entries of `summary` in canonical order with owned values.
pub fn rows<M, V>(summary: &M) -> Vec<Row<V>>
where
    M: StackSummary<V>,
    V: Clone,
{
    summary
        .sorted_entries()
        .into_iter()
        .map(|e| (e.start_stack, e.finish_stack, e.value.clone()))
        .collect()
}

/// Owned row from borrowed stacks.
pub fn row<V>(start_stack: &[StateId], finish_stack: &[StateId], value: V) -> Row<V> {
    (start_stack.to_vec(), finish_stack.to_vec(), value)
}

/// Builds a summary holding exactly `rows`.
pub fn summary_of<M, V>(rows: &[Row<V>]) -> M
where
    M: StackSummary<V>,
    V: Clone,
{
    let mut summary = M::default();
    for (start, finish, value) in rows {
        summary.add_entry(start, finish, value.clone());
    }
    summary
}
