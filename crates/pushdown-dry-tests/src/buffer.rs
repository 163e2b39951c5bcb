// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Symbol-collecting sink stage.

use std::marker::PhantomData;

use pushdown_core::Transducer;

/// Terminal stage that appends every symbol it receives.
///
/// Merging concatenates, so the collected output of a block-parallel scan
/// must equal that of a sequential one.
///
/// # Example
///
/// ```
/// use pushdown_core::Transducer;
/// use pushdown_dry_tests::SymbolBuffer;
///
/// let sink = SymbolBuffer::<u32>::new();
/// let mut left = sink.initial_result();
/// sink.process_symbol(&mut left, 7, 0);
/// let mut right = sink.identity_result();
/// sink.process_symbol(&mut right, 8, 1);
/// sink.merge_results(&mut left, right);
/// assert_eq!(sink.last_stage_result(&left), &vec![7, 8]);
/// ```
pub struct SymbolBuffer<S> {
    _symbol: PhantomData<fn(S)>,
}

impl<S> SymbolBuffer<S> {
    /// Creates the sink.
    pub fn new() -> Self {
        Self {
            _symbol: PhantomData,
        }
    }
}

impl<S> Default for SymbolBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> Transducer for SymbolBuffer<S> {
    type Input = S;
    type PartialResult = Vec<S>;
    type TerminalResult = Vec<S>;

    fn initial_result(&self) -> Vec<S> {
        Vec::new()
    }

    fn identity_result(&self) -> Vec<S> {
        Vec::new()
    }

    fn process_symbol(&self, result: &mut Vec<S>, symbol: S, _offset: usize) {
        result.push(symbol);
    }

    fn merge_results(&self, left: &mut Vec<S>, mut right: Vec<S>) {
        left.append(&mut right);
    }

    fn last_stage_result<'a>(&self, result: &'a Vec<S>) -> &'a Vec<S> {
        result
    }
}
