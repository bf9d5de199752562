//! Regexp parsing and NFA building for I-Regexp (RFC 9485 subset).
//!
//! A regexp is parsed into a `RegexpRoot` tree, then compiled into an
//! automaton fragment that shares an arena with every other pattern:
//! - `.` matches any character
//! - `[...]` character classes with ranges, `[^...]` negated classes
//! - `~d ~D ~w ~W ~s ~S` class escapes
//! - `~p{..}` / `~P{..}` Unicode categories and blocks
//! - `|` alternation, `(...)` and `(?:...)` grouping
//! - `?`, `+`, `*` and `{m}`, `{m,}`, `{m,n}` quantifiers
//!
//! The escape character is `~` (not `\`) to avoid JSON escaping issues.

mod nfa;
mod parser;
mod properties;
mod runes;

pub use nfa::{compile_named_rune_range, compile_rune_range, make_regexp_fa};
pub use parser::{
    parse_regexp, Atom, Property, QuantifiedAtom, RegexpBranch, RegexpFeature, RegexpRoot,
};
pub use properties::property_ranges;
pub use runes::{
    canonical_name, invert_rune_range, make_dot_fa, make_rune_range_fa, rune_count,
    simplify_rune_range, validate_rune_range, RunePair, RuneRange, RUNE_MAX,
};
