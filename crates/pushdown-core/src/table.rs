// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic pushdown transition tables.
//!
//! A [`TableDescription`] is the raw, serialisable form: independent lists of
//! plain transitions, pushes, pops and outputs, each keyed by
//! `(state, symbol)`. [`TransitionTable::from_description`] validates it and
//! folds the lists into one [`TransitionRule`] per key for O(1) lookup.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::summary::{StateId, Symbol};

/// `kind` tag written into every persisted table envelope.
pub const TABLE_KIND: &str = "pushdown-transition-table";
/// Envelope version understood by [`TableDescription::from_cbor`].
pub const TABLE_VERSION: u32 = 1;

/// Errors produced while compiling or loading a transition table.
#[derive(Debug, Error)]
pub enum TableError {
    /// A push was declared for a key that has no plain transition to move to.
    #[error("push on ({state}, {symbol}) has no target state")]
    PushWithoutTarget {
        /// Source state.
        state: StateId,
        /// Input symbol.
        symbol: Symbol,
    },
    /// Pops were combined with a plain transition or push on one key.
    #[error("({state}, {symbol}) combines pops with a transition or push")]
    ConflictingRule {
        /// Source state.
        state: StateId,
        /// Input symbol.
        symbol: Symbol,
    },
    /// The same frame label appears twice among one key's pops.
    #[error("pop label {label} listed twice for ({state}, {symbol})")]
    DuplicatePopLabel {
        /// Source state.
        state: StateId,
        /// Input symbol.
        symbol: Symbol,
        /// Repeated frame label.
        label: StateId,
    },
    /// A transition, push or output was declared twice for one key.
    #[error("{section} for ({state}, {symbol}) declared twice")]
    DuplicateKey {
        /// Description section holding the duplicate.
        section: &'static str,
        /// Source state.
        state: StateId,
        /// Input symbol.
        symbol: Symbol,
    },
    /// The envelope carries a different record type.
    #[error("expected a pushdown-transition-table record, found {0:?}")]
    WrongKind(String),
    /// The envelope version is not understood.
    #[error("unsupported table version {0}")]
    UnsupportedVersion(u32),
    /// The bytes are not a valid CBOR table envelope.
    #[error("failed to decode table: {0}")]
    Decode(String),
    /// Serialisation failed.
    #[error("failed to encode table: {0}")]
    Encode(String),
}

/// A `(state, symbol) -> value` item of a description section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source state.
    pub state: StateId,
    /// Input symbol.
    pub symbol: Symbol,
    /// Target state, pushed label or output symbol, depending on the section.
    pub value: u32,
}

/// A `(state, symbol) -> (label, target)` pop alternative of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopEdge {
    /// Source state.
    pub state: StateId,
    /// Input symbol.
    pub symbol: Symbol,
    /// Frame label that must sit directly below the current state.
    pub label: StateId,
    /// State the automaton is in once the frame is popped.
    pub target: StateId,
}

/// Raw table description, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    /// State the automaton starts in.
    pub start_state: StateId,
    /// Plain transitions: `value` is the next state.
    #[serde(default)]
    pub transitions: Vec<Edge>,
    /// Pushes: `value` is the frame label left below the next state.
    #[serde(default)]
    pub pushes: Vec<Edge>,
    /// Pop alternatives.
    #[serde(default)]
    pub pops: Vec<PopEdge>,
    /// Outputs: `value` is the symbol handed to the continuation.
    #[serde(default)]
    pub outputs: Vec<Edge>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    kind: String,
    version: u32,
    table: T,
}

impl TableDescription {
    /// Encodes the description inside a versioned CBOR envelope.
    ///
    /// # Errors
    /// Returns [`TableError::Encode`] if serialisation fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, TableError> {
        let envelope = Envelope {
            kind: TABLE_KIND.to_owned(),
            version: TABLE_VERSION,
            table: self,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes)
            .map_err(|e| TableError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a description written by [`TableDescription::to_cbor`].
    ///
    /// The envelope header is checked before the table body is interpreted.
    ///
    /// # Errors
    /// [`TableError::Decode`] for malformed bytes, [`TableError::WrongKind`]
    /// and [`TableError::UnsupportedVersion`] for a foreign envelope.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TableError> {
        let envelope: Envelope<ciborium::value::Value> =
            ciborium::from_reader(bytes).map_err(|e| TableError::Decode(e.to_string()))?;
        if envelope.kind != TABLE_KIND {
            return Err(TableError::WrongKind(envelope.kind));
        }
        if envelope.version != TABLE_VERSION {
            return Err(TableError::UnsupportedVersion(envelope.version));
        }
        envelope
            .table
            .deserialized()
            .map_err(|e| TableError::Decode(e.to_string()))
    }
}

/// One alternative of a popping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopTarget {
    /// Frame label expected directly below the current state.
    pub label: StateId,
    /// State after the pop.
    pub state: StateId,
    /// Symbol emitted when this alternative fires.
    pub output: Option<Symbol>,
}

/// Everything the automaton does on one `(state, symbol)` key.
///
/// A rule either pops (`pops` non-empty, no `next`/`push`) or moves to `next`,
/// optionally leaving `push` below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionRule {
    /// Next state for a plain transition or push.
    pub next: Option<StateId>,
    /// Frame label left below `next`.
    pub push: Option<StateId>,
    /// Pop alternatives, keyed by distinct labels.
    pub pops: Vec<PopTarget>,
    /// Symbol emitted by a plain transition or push.
    pub output: Option<Symbol>,
}

/// Compiled, validated transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rules: FxHashMap<(StateId, Symbol), TransitionRule>,
    start_state: StateId,
    states: BTreeSet<StateId>,
}

impl TransitionTable {
    /// Validates `description` and compiles it.
    ///
    /// Keys are validated in `(state, symbol)` order, so the first error
    /// reported is deterministic.
    ///
    /// # Errors
    /// Returns the first [`TableError`] found.
    pub fn from_description(description: &TableDescription) -> Result<Self, TableError> {
        let mut rules: BTreeMap<(StateId, Symbol), TransitionRule> = BTreeMap::new();
        let mut states = BTreeSet::from([description.start_state]);

        for edge in &description.transitions {
            let rule = rules.entry((edge.state, edge.symbol)).or_default();
            if rule.next.replace(edge.value).is_some() {
                return Err(duplicate("transition", edge));
            }
            states.extend([edge.state, edge.value]);
        }
        for edge in &description.pushes {
            let rule = rules.entry((edge.state, edge.symbol)).or_default();
            if rule.push.replace(edge.value).is_some() {
                return Err(duplicate("push", edge));
            }
            states.insert(edge.state);
        }
        for pop in &description.pops {
            let rule = rules.entry((pop.state, pop.symbol)).or_default();
            if rule.pops.iter().any(|p| p.label == pop.label) {
                return Err(TableError::DuplicatePopLabel {
                    state: pop.state,
                    symbol: pop.symbol,
                    label: pop.label,
                });
            }
            rule.pops.push(PopTarget {
                label: pop.label,
                state: pop.target,
                output: None,
            });
            states.extend([pop.state, pop.target]);
        }
        for edge in &description.outputs {
            let rule = rules.entry((edge.state, edge.symbol)).or_default();
            if rule.output.replace(edge.value).is_some() {
                return Err(duplicate("output", edge));
            }
        }

        for (&(state, symbol), rule) in &mut rules {
            if rule.push.is_some() && rule.next.is_none() {
                return Err(TableError::PushWithoutTarget { state, symbol });
            }
            if !rule.pops.is_empty() && rule.next.is_some() {
                return Err(TableError::ConflictingRule { state, symbol });
            }
            for pop in &mut rule.pops {
                pop.output = rule.output;
            }
        }

        Ok(Self {
            rules: rules.into_iter().collect(),
            start_state: description.start_state,
            states,
        })
    }

    /// Decodes and compiles a persisted table.
    ///
    /// # Errors
    /// Any decoding or validation [`TableError`].
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TableError> {
        Self::from_description(&TableDescription::from_cbor(bytes)?)
    }

    /// Rebuilds a description with every section sorted by key.
    pub fn to_description(&self) -> TableDescription {
        let mut keys: Vec<&(StateId, Symbol)> = self.rules.keys().collect();
        keys.sort_unstable();
        let mut description = TableDescription {
            start_state: self.start_state,
            ..TableDescription::default()
        };
        for &(state, symbol) in keys {
            let Some(rule) = self.rules.get(&(state, symbol)) else {
                continue;
            };
            let edge = |value| Edge {
                state,
                symbol,
                value,
            };
            description.transitions.extend(rule.next.map(edge));
            description.pushes.extend(rule.push.map(edge));
            description.outputs.extend(rule.output.map(edge));
            description.pops.extend(rule.pops.iter().map(|p| PopEdge {
                state,
                symbol,
                label: p.label,
                target: p.state,
            }));
        }
        description
    }

    /// Rule for `(state, symbol)`; `None` means the path dies on this symbol.
    pub fn lookup(&self, state: StateId, symbol: Symbol) -> Option<&TransitionRule> {
        self.rules.get(&(state, symbol))
    }

    /// The designated start state.
    pub fn start_state(&self) -> StateId {
        self.start_state
    }

    /// Every state mentioned by the table, ascending.
    pub fn states(&self) -> &BTreeSet<StateId> {
        &self.states
    }

    /// Number of `(state, symbol)` keys with a rule.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when no key has a rule.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn duplicate(section: &'static str, edge: &Edge) -> TableError {
    TableError::DuplicateKey {
        section,
        state: edge.state,
        symbol: edge.symbol,
    }
}

/// Fluent construction of a [`TransitionTable`].
#[derive(Debug, Clone, Default)]
pub struct TransitionTableBuilder {
    description: TableDescription,
}

impl TransitionTableBuilder {
    /// Starts a table whose automaton begins in `start_state`.
    pub fn new(start_state: StateId) -> Self {
        Self {
            description: TableDescription {
                start_state,
                ..TableDescription::default()
            },
        }
    }

    /// `state --symbol--> next`.
    #[must_use]
    pub fn transition(mut self, state: StateId, symbol: Symbol, next: StateId) -> Self {
        self.description.transitions.push(Edge {
            state,
            symbol,
            value: next,
        });
        self
    }

    /// Leaves `label` below the next state of `(state, symbol)`.
    #[must_use]
    pub fn push(mut self, state: StateId, symbol: Symbol, label: StateId) -> Self {
        self.description.pushes.push(Edge {
            state,
            symbol,
            value: label,
        });
        self
    }

    /// Pops a `label` frame and continues in `target`.
    #[must_use]
    pub fn pop(mut self, state: StateId, symbol: Symbol, label: StateId, target: StateId) -> Self {
        self.description.pops.push(PopEdge {
            state,
            symbol,
            label,
            target,
        });
        self
    }

    /// Emits `output` whenever `(state, symbol)` fires.
    #[must_use]
    pub fn output(mut self, state: StateId, symbol: Symbol, output: Symbol) -> Self {
        self.description.outputs.push(Edge {
            state,
            symbol,
            value: output,
        });
        self
    }

    /// The description accumulated so far.
    pub fn description(&self) -> &TableDescription {
        &self.description
    }

    /// Validates and compiles the table.
    ///
    /// # Errors
    /// See [`TransitionTable::from_description`].
    pub fn build(self) -> Result<TransitionTable, TableError> {
        TransitionTable::from_description(&self.description)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn sym(c: char) -> Symbol {
        c as Symbol
    }

    fn bracket_builder() -> TransitionTableBuilder {
        TransitionTableBuilder::new(1)
            .transition(1, sym('('), 1)
            .push(1, sym('('), 7)
            .transition(1, sym('x'), 2)
            .transition(2, sym('x'), 2)
            .pop(1, sym(')'), 7, 1)
            .pop(2, sym(')'), 7, 1)
            .output(2, sym(')'), 9)
    }

    #[test]
    fn compiles_rules_per_key() {
        let table = bracket_builder().build().unwrap();
        assert_eq!(table.start_state(), 1);
        assert_eq!(table.states().iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(table.len(), 5);

        let open = table.lookup(1, sym('(')).unwrap();
        assert_eq!((open.next, open.push, open.output), (Some(1), Some(7), None));
        assert!(open.pops.is_empty());

        let close = table.lookup(2, sym(')')).unwrap();
        assert_eq!(
            close.pops,
            vec![PopTarget {
                label: 7,
                state: 1,
                output: Some(9)
            }]
        );
        assert!(table.lookup(2, sym('(')).is_none());
    }

    #[test]
    fn push_without_target_is_rejected() {
        let err = TransitionTableBuilder::new(0).push(0, 1, 5).build().unwrap_err();
        assert!(matches!(
            err,
            TableError::PushWithoutTarget {
                state: 0,
                symbol: 1
            }
        ));
    }

    #[test]
    fn pop_with_transition_is_rejected() {
        let err = TransitionTableBuilder::new(0)
            .transition(0, 1, 0)
            .pop(0, 1, 3, 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, TableError::ConflictingRule { .. }));
    }

    #[test]
    fn duplicate_pop_label_is_rejected() {
        let err = TransitionTableBuilder::new(0)
            .pop(0, 1, 3, 0)
            .pop(0, 1, 3, 2)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::DuplicatePopLabel { label: 3, .. }
        ));
    }

    #[test]
    fn duplicate_transition_is_rejected() {
        let err = TransitionTableBuilder::new(0)
            .transition(0, 1, 1)
            .transition(0, 1, 2)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "transition for (0, 1) declared twice");
    }

    #[test]
    fn first_invalid_key_wins() {
        let err = TransitionTableBuilder::new(0)
            .push(5, 0, 1)
            .push(2, 0, 1)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::PushWithoutTarget { state: 2, .. }
        ));
    }

    #[test]
    fn cbor_round_trip_preserves_the_table() {
        let table = bracket_builder().build().unwrap();
        let bytes = table.to_description().to_cbor().unwrap();
        let loaded = TransitionTable::from_cbor(&bytes).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn foreign_envelope_is_rejected() {
        let envelope = Envelope {
            kind: "graph".to_owned(),
            version: TABLE_VERSION,
            table: TableDescription::default(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes).unwrap();
        let err = TableDescription::from_cbor(&bytes).unwrap_err();
        assert!(matches!(err, TableError::WrongKind(kind) if kind == "graph"));
    }

    #[test]
    fn future_version_is_rejected() {
        let envelope = Envelope {
            kind: TABLE_KIND.to_owned(),
            version: TABLE_VERSION + 1,
            table: TableDescription::default(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes).unwrap();
        let err = TableDescription::from_cbor(&bytes).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedVersion(v) if v == TABLE_VERSION + 1));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = TableDescription::from_cbor(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, TableError::Decode(_)));
    }

    #[test]
    fn description_parses_from_json() {
        let description: TableDescription = serde_json::from_str(
            r#"{"start_state": 3, "transitions": [{"state": 3, "symbol": 97, "value": 4}]}"#,
        )
        .unwrap();
        let table = TransitionTable::from_description(&description).unwrap();
        assert_eq!(table.lookup(3, 97).and_then(|r| r.next), Some(4));
        assert!(description.pops.is_empty());
    }
}
