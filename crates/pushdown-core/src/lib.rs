// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! pushdown-core: block-parallel pushdown transducers.
//!
//! An input is cut into blocks that are scanned independently. Because a block
//! cannot know the stack it starts on, its result is a stack summary: every
//! live `(start_stack, finish_stack)` hypothesis with the continuation value
//! accumulated along it. Summaries of adjacent blocks merge associatively, so
//! blocks can be reduced in any grouping and still agree with a sequential
//! scan.
//!
//! Two summary stores implement [`StackSummary`]: [`TreeStateMap`] for real
//! inputs and [`FlatStateMap`] as an easy-to-audit reference model.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod arena;
mod config;
mod flat_map;
mod parallel;
mod pushdown;
mod summary;
mod table;
mod transducer;
mod tree_map;

// Re-exports for stable public API
/// Scan configuration and its validation errors.
pub use config::{ConfigError, ScanConfig, DEFAULT_BLOCK_SIZE};
/// Flat reference summary store.
pub use flat_map::{FlatLayer, FlatStateMap};
/// Sequential and block-parallel drivers.
pub use parallel::{scan_parallel, scan_sequential};
/// Pushdown engine and its result type.
pub use pushdown::{
    FlatPushdownTransducer, PushdownResult, PushdownTransducer, TreePushdownTransducer,
};
/// Summary store contract and entry views.
pub use summary::{shares_prefix, Entry, ForkSource, StackSummary, StateId, Symbol};
/// Transition tables: raw descriptions, compiled rules and the CBOR envelope.
pub use table::{
    Edge, PopEdge, PopTarget, TableDescription, TableError, TransitionRule, TransitionTable,
    TransitionTableBuilder, TABLE_KIND, TABLE_VERSION,
};
/// Stage composition protocol.
pub use transducer::Transducer;
/// Tree-indexed production summary store.
pub use tree_map::{TreeLayer, TreeStateMap};
