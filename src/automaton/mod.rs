//! Automaton-based pattern matching engine
//!
//! Patterns compile into byte-level automata that live in a `StateArena`.
//! Independently compiled automata are merged into one for their union,
//! optionally determinized, and walked one value at a time.
//!
//! # Module Organization
//!
//! - `small_table`: byte transition table (`SmallTable`)
//! - `arena`: state storage and `StateId` handles
//! - `epsilon`: epsilon closures and their per-automaton cache
//! - `fa_builders`: FA construction for string-like patterns (`make_*_fa`)
//! - `shell`: reusable fragment templates and their cache
//! - `merge`: union of two automata (`merge_fas`)
//! - `dfa`: subset construction (`determinize`)
//! - `traverse`: NFA/DFA traversal
//! - `value_matcher`: thread-safe copy-and-publish matcher

mod arena;
mod dfa;
mod epsilon;
mod fa_builders;
mod merge;
mod shell;
mod small_table;
mod sparse_set;
mod traverse;
mod value_matcher;

pub use arena::{FaState, StateArena, StateId};
pub use dfa::{determinize, determinize_bounded, StateSetKey};
pub use epsilon::{epsilon_closure, Closure, EpsilonClosures};
pub use fa_builders::{
    make_anything_but_fa, make_monocase_fa, make_prefix_fa, make_shellstyle_fa, make_string_fa,
    make_wildcard_fa,
};
pub use merge::merge_fas;
pub use shell::{CompileContext, ShellCache, Template};
pub use small_table::{SmallTable, BYTE_CEILING, VALUE_TERMINATOR};
pub use sparse_set::{SparseSet, SparseSets};
pub use traverse::{traverse_dfa, traverse_nfa, NfaBuffers};
pub use value_matcher::{Automaton, Pattern, ValueMatcher};

#[cfg(test)]
mod tests;
