// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for pushdown crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`buffer`] - Symbol-collecting sink stage
//! - [`logging`] - `tracing` capture for test output
//! - [`run`] - Block-wise scanning and merge helpers, summary row builders
//! - [`tables`] - Fixture transition tables and symbol helpers

pub mod buffer;
pub mod logging;
pub mod run;
pub mod tables;

// Re-export commonly used items at crate root for convenience
pub use buffer::SymbolBuffer;
pub use logging::init_test_tracing;
pub use run::{feed, merge_left, merge_right, row, rows, scan_blocks, summary_of, Row};
pub use tables::{
    bracket_table, reference_builder, reference_table, sym, symbols, BRACKET_ALPHABET,
    REFERENCE_ALPHABET,
};
