// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Worker-count and block-size invariance of the parallel driver.

use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};
use pushdown_core::{
    scan_parallel, scan_sequential, ConfigError, PushdownTransducer, ScanConfig, StackSummary,
    Symbol, Transducer, TreePushdownTransducer,
};
use pushdown_dry_tests::{bracket_table, init_test_tracing, sym, symbols, SymbolBuffer};

type Engine = TreePushdownTransducer<SymbolBuffer<Symbol>>;

fn engine() -> Engine {
    PushdownTransducer::new(SymbolBuffer::new(), bracket_table().expect("bracket table"))
}

/// Deepest nesting `pinned_input` produces.
const MAX_DEPTH: usize = 6;

/// Random bracket text with `x` noise, balanced and nested at most
/// [`MAX_DEPTH`] deep.
///
/// A block scanned from the identity forks on both bracket kinds for every
/// closer it cannot match, so its summary grows with `2^depth`; bounding the
/// depth bounds the summaries. Same bytes on every run so failures reproduce.
fn pinned_input(len: usize) -> Vec<Symbol> {
    const SEED_BYTES: [u8; 32] = [
        0x5a, 0x17, 0xc3, 0x08, 0x9e, 0x61, 0xf2, 0x4b, 0x30, 0xad, 0x76, 0x1c, 0xe5, 0x82, 0x09,
        0xd4, 0x3b, 0x6f, 0xa0, 0x55, 0x1e, 0xc9, 0x87, 0x24, 0xfb, 0x40, 0x93, 0x6a, 0x0f, 0xb8,
        0x2d, 0x71,
    ];
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);
    let strategy = prop::collection::vec(0u8..4, len..=len);
    let moves = strategy.new_tree(&mut runner).expect("input tree").current();

    let mut open = Vec::new();
    let mut text = Vec::with_capacity(len + MAX_DEPTH);
    for m in moves {
        match m {
            0 if open.len() < MAX_DEPTH => {
                open.push(')');
                text.push('(');
            }
            1 if open.len() < MAX_DEPTH => {
                open.push(']');
                text.push('[');
            }
            3 => text.push(open.pop().unwrap_or('x')),
            _ => text.push('x'),
        }
    }
    text.extend(open.into_iter().rev());
    text.into_iter().map(sym).collect()
}

#[test]
fn any_schedule_matches_sequential_scan() {
    init_test_tracing();
    let t = engine();
    let input = pinned_input(600);
    let expected = scan_sequential(&t, &input);
    assert_eq!(expected.map().len(), 1);
    assert_eq!(t.last_stage_result(&expected), &input);

    for workers in [1, 2, 3, 8] {
        for block_size in [1, 7, 64, 599, 600, 4096] {
            let config = ScanConfig::new(workers, block_size);
            let actual = scan_parallel(&t, &input, &config).unwrap();
            assert_eq!(actual, expected, "workers={workers} block_size={block_size}");
        }
    }
}

#[test]
fn balanced_input_echoes_through_the_sink() {
    init_test_tracing();
    let t = engine();
    let input = symbols(&"([x]x(x))[]".repeat(150));

    let result = scan_parallel(&t, &input, &ScanConfig::new(4, 13)).unwrap();
    assert_eq!(result.map().len(), 1);
    assert_eq!(t.last_stage_result(&result), &input);
}

#[test]
fn empty_input_yields_initial_result() {
    let t = engine();
    let result = scan_parallel(&t, &[], &ScanConfig::new(4, 16)).unwrap();
    assert_eq!(result, t.initial_result());
    assert!(t.last_stage_result(&result).is_empty());
}

#[test]
fn invalid_config_is_rejected_before_scanning() {
    let t = engine();
    let input = symbols("(x)");
    assert!(matches!(
        scan_parallel(&t, &input, &ScanConfig::new(0, 16)),
        Err(ConfigError::ZeroWorkers)
    ));
    assert!(matches!(
        scan_parallel(&t, &input, &ScanConfig::new(2, 0)),
        Err(ConfigError::ZeroBlockSize)
    ));
}

/// Sink that refuses one symbol.
struct Tripwire(Symbol);

impl Transducer for Tripwire {
    type Input = Symbol;
    type PartialResult = usize;
    type TerminalResult = usize;

    fn initial_result(&self) -> usize {
        0
    }

    fn identity_result(&self) -> usize {
        0
    }

    fn process_symbol(&self, result: &mut usize, symbol: Symbol, offset: usize) {
        assert_ne!(symbol, self.0, "tripwire hit at offset {offset}");
        *result += 1;
    }

    fn merge_results(&self, left: &mut usize, right: usize) {
        *left += right;
    }

    fn last_stage_result<'a>(&self, result: &'a usize) -> &'a usize {
        result
    }
}

#[test]
fn counting_sink_sees_every_symbol_once() {
    let t = Tripwire(Symbol::from('!'));
    let input = symbols(&"abcdefg".repeat(40));
    let total = scan_parallel(&t, &input, &ScanConfig::new(3, 9)).unwrap();
    assert_eq!(total, input.len());
}

#[test]
#[should_panic(expected = "tripwire hit at offset 123")]
fn worker_panic_reaches_the_caller() {
    let t = Tripwire(Symbol::from('!'));
    let mut input = symbols(&"x".repeat(200));
    input[123] = Symbol::from('!');
    let _ = scan_parallel(&t, &input, &ScanConfig::new(4, 10));
}
