// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixture transition tables.

use std::ops::RangeInclusive;

use pushdown_core::{Symbol, TableError, TransitionTable, TransitionTableBuilder};

/// Input alphabet of [`reference_table`].
pub const REFERENCE_ALPHABET: RangeInclusive<char> = 'a'..='g';

/// Input alphabet of [`bracket_table`].
pub const BRACKET_ALPHABET: [char; 5] = ['(', ')', '[', ']', 'x'];

/// Symbol for a character.
pub fn sym(c: char) -> Symbol {
    Symbol::from(c)
}

/// Symbols of a string, one per character.
pub fn symbols(text: &str) -> Vec<Symbol> {
    text.chars().map(sym).collect()
}

/// Small table covering every rule shape: states `1..=4`, start state `1`.
///
/// | key          | rule                                   |
/// |--------------|----------------------------------------|
/// | `(1, 'a')`   | `-> 2`                                 |
/// | `(1, 'b')`   | `-> 3`, push `4`, output `1`           |
/// | `(2, 'b')`   | `-> 3`, push `2`, output `1`           |
/// | `(3, 'c')`   | `-> 4`                                 |
/// | `(2, 'e')`   | `-> 1`                                 |
/// | `(3, 'e')`   | `-> 1`                                 |
/// | `(1, 'f')`   | `-> 2`                                 |
/// | `(2, 'g')`   | `-> 4`                                 |
/// | `(4, 'f')`   | pop `1 -> 1` or `2 -> 2`, output `2`   |
pub fn reference_builder() -> TransitionTableBuilder {
    TransitionTableBuilder::new(1)
        .pop(4, sym('f'), 1, 1)
        .pop(4, sym('f'), 2, 2)
        .push(1, sym('b'), 4)
        .push(2, sym('b'), 2)
        .transition(1, sym('a'), 2)
        .transition(1, sym('b'), 3)
        .transition(2, sym('b'), 3)
        .transition(3, sym('c'), 4)
        .transition(2, sym('e'), 1)
        .transition(3, sym('e'), 1)
        .transition(1, sym('f'), 2)
        .transition(2, sym('g'), 4)
        .output(1, sym('b'), 1)
        .output(2, sym('b'), 1)
        .output(4, sym('f'), 2)
}

/// Compiled [`reference_builder`] table.
pub fn reference_table() -> Result<TransitionTable, TableError> {
    reference_builder().build()
}

/// Two bracket kinds over states `1` (after a bracket) and `2` (after text).
///
/// Every symbol echoes itself. Opening brackets push `10` for `(` and `11`
/// for `[`; a closing bracket pops either label, landing in `2` when the
/// kinds match and in `1` when they do not.
pub fn bracket_table() -> Result<TransitionTable, TableError> {
    let mut builder = TransitionTableBuilder::new(1);
    for state in [1, 2] {
        builder = builder
            .transition(state, sym('('), 1)
            .push(state, sym('('), 10)
            .output(state, sym('('), sym('('))
            .transition(state, sym('['), 1)
            .push(state, sym('['), 11)
            .output(state, sym('['), sym('['))
            .pop(state, sym(')'), 10, 2)
            .pop(state, sym(')'), 11, 1)
            .output(state, sym(')'), sym(')'))
            .pop(state, sym(']'), 11, 2)
            .pop(state, sym(']'), 10, 1)
            .output(state, sym(']'), sym(']'))
            .transition(state, sym('x'), 2)
            .output(state, sym('x'), sym('x'));
    }
    builder.build()
}
