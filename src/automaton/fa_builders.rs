//! FA (Finite Automaton) construction functions.
//!
//! Every builder writes a fragment into an arena and returns its entry. The
//! fragment accepts exactly the values it describes: after the value's last
//! byte it steps on `VALUE_TERMINATOR` into the caller's `next` state.
//!
//! - `make_string_fa`: Exact string matching
//! - `make_prefix_fa`: Prefix matching
//! - `make_shellstyle_fa`: Shell-style patterns with a single `*`
//! - `make_wildcard_fa`: Wildcard patterns with escaping
//! - `make_anything_but_fa`: Negative matching
//! - `make_monocase_fa`: Case-insensitive matching
//!
//! Values are raw bytes as they appear in the document, so a JSON string
//! keeps its quotes: the pattern `"a*"` is the four bytes `"`, `a`, `*`, `"`.

use std::collections::BTreeMap;

use regex_syntax::hir::{ClassUnicode, ClassUnicodeRange};
use smallvec::SmallVec;

use super::arena::{StateArena, StateId};
use super::small_table::{SmallTable, VALUE_TERMINATOR};
use crate::error::{CompileError, Result};

/// Pattern bytes must be UTF-8, which also keeps them below `BYTE_CEILING`.
fn require_utf8(val: &[u8]) -> Result<&str> {
    std::str::from_utf8(val).map_err(|_| CompileError::InvalidUtf8)
}

/// Chain `bytes` from a fresh entry state into `end`.
fn byte_chain<X>(arena: &mut StateArena<X>, bytes: &[u8], end: StateId) -> StateId {
    let mut next = end;
    for &byte in bytes.iter().rev() {
        next = arena.alloc_with_table(SmallTable::with_mappings(StateId::NONE, &[byte], &[next]));
    }
    next
}

/// Build a string-matching FA from a byte sequence.
///
/// Each byte steps to the next state; the last state steps to `next` on
/// `VALUE_TERMINATOR`.
pub fn make_string_fa<X>(arena: &mut StateArena<X>, val: &[u8], next: StateId) -> Result<StateId> {
    require_utf8(val)?;
    let last = arena.alloc_with_table(SmallTable::with_mappings(
        StateId::NONE,
        &[VALUE_TERMINATOR],
        &[next],
    ));
    Ok(byte_chain(arena, val, last))
}

/// Build a prefix-matching FA.
///
/// Once the prefix is consumed, any byte (the terminator included) reaches
/// `next`.
pub fn make_prefix_fa<X>(
    arena: &mut StateArena<X>,
    prefix: &[u8],
    next: StateId,
) -> Result<StateId> {
    require_utf8(prefix)?;
    let rest = arena.alloc_with_table(SmallTable::with_default(next));
    Ok(byte_chain(arena, prefix, rest))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobToken {
    Literal(u8),
    Glob,
}

/// Build a shell-style pattern FA.
///
/// `*` matches any run of bytes, including none. At most one `*` is allowed.
pub fn make_shellstyle_fa<X>(
    arena: &mut StateArena<X>,
    pattern: &[u8],
    next: StateId,
) -> Result<StateId> {
    require_utf8(pattern)?;
    if pattern.iter().filter(|&&b| b == b'*').count() > 1 {
        return Err(CompileError::MultipleGlobs);
    }
    let tokens: Vec<GlobToken> = pattern
        .iter()
        .map(|&b| {
            if b == b'*' {
                GlobToken::Glob
            } else {
                GlobToken::Literal(b)
            }
        })
        .collect();
    Ok(build_glob_fa(arena, &tokens, next))
}

/// Build a wildcard pattern FA (like shellstyle but with escape sequences).
///
/// Wildcard patterns support:
/// - `*` as a wildcard matching zero or more characters, any number of times
///   but never two in a row
/// - `\*` as a literal asterisk
/// - `\\` as a literal backslash
pub fn make_wildcard_fa<X>(
    arena: &mut StateArena<X>,
    pattern: &[u8],
    next: StateId,
) -> Result<StateId> {
    let text = require_utf8(pattern)?;
    let tokens = tokenize_wildcard(text)?;
    Ok(build_glob_fa(arena, &tokens, next))
}

fn tokenize_wildcard(pattern: &str) -> Result<Vec<GlobToken>> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let escaped = bytes.get(i + 1).copied();
                match escaped {
                    Some(b'*') | Some(b'\\') => {
                        tokens.push(GlobToken::Literal(bytes[i + 1]));
                        i += 2;
                    }
                    None => return Err(CompileError::TrailingEscape),
                    Some(b'"') if i + 2 == bytes.len() => return Err(CompileError::TrailingEscape),
                    Some(_) => {
                        // The escaped rune may be multi-byte
                        let escaped = pattern[i + 1..].chars().next().unwrap_or('\u{FFFD}');
                        return Err(CompileError::InvalidEscape { escaped, offset: i });
                    }
                }
            }
            b'*' => {
                if tokens.last() == Some(&GlobToken::Glob) {
                    return Err(CompileError::AdjacentGlobs { offset: i });
                }
                tokens.push(GlobToken::Glob);
                i += 1;
            }
            b => {
                tokens.push(GlobToken::Literal(b));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

/// Shared construction for shell-style and wildcard patterns.
///
/// A glob turns the current state into a spinout state: it loops on every
/// byte but the terminator, and the literal after the glob is its exit. A
/// glob right before the closing quote is just a prefix match.
fn build_glob_fa<X>(arena: &mut StateArena<X>, tokens: &[GlobToken], next: StateId) -> StateId {
    let start = arena.alloc();
    let mut current = start;
    for (i, token) in tokens.iter().enumerate() {
        match *token {
            GlobToken::Glob => {
                if i + 2 == tokens.len() && tokens[i + 1] == GlobToken::Literal(b'"') {
                    arena[current].table.set_default(next);
                    return start;
                }
                arena[current].table.spinout = current;
            }
            GlobToken::Literal(byte) => {
                let step = arena.alloc();
                arena[current].table.set_step(byte, step);
                current = step;
            }
        }
    }
    arena[current].table.set_step(VALUE_TERMINATOR, next);
    start
}

/// Build an anything-but FA that matches any value NOT in the excluded list.
///
/// Every byte defaults to `next`, except bytes that continue one of the
/// excluded values. Reaching the end of an excluded value leaves the
/// terminator with nowhere to go.
pub fn make_anything_but_fa<X>(
    arena: &mut StateArena<X>,
    excluded: &[Vec<u8>],
    next: StateId,
) -> Result<StateId> {
    for val in excluded {
        require_utf8(val)?;
    }
    let vals: Vec<&[u8]> = excluded
        .iter()
        .map(Vec::as_slice)
        .filter(|v| !v.is_empty())
        .collect();
    Ok(anything_but_step(arena, &vals, 0, next))
}

fn anything_but_step<X>(
    arena: &mut StateArena<X>,
    vals: &[&[u8]],
    index: usize,
    success: StateId,
) -> StateId {
    // byte -> (values continuing past it, some value ends at it)
    let mut by_byte: BTreeMap<u8, (Vec<&[u8]>, bool)> = BTreeMap::new();
    for &val in vals {
        if let Some(&byte) = val.get(index) {
            let entry = by_byte.entry(byte).or_default();
            if index + 1 < val.len() {
                entry.0.push(val);
            } else {
                entry.1 = true;
            }
        }
    }

    let mut unpacked = SmallTable::with_default(success).unpack();
    for (byte, (continuing, ends_here)) in by_byte {
        let child = if continuing.is_empty() {
            arena.alloc_with_table(SmallTable::with_default(success))
        } else {
            anything_but_step(arena, &continuing, index + 1, success)
        };
        if ends_here {
            arena[child].table.set_step(VALUE_TERMINATOR, StateId::NONE);
        }
        unpacked[byte as usize] = child;
    }

    let mut table = SmallTable::new();
    table.pack(&unpacked);
    arena.alloc_with_table(table)
}

/// Every rune that simple case folding makes equivalent to `c`, `c`
/// included, in code-point order.
pub(crate) fn case_variants(c: char) -> SmallVec<[char; 4]> {
    let mut class = ClassUnicode::new([ClassUnicodeRange::new(c, c)]);
    class.case_fold_simple();
    class
        .iter()
        .flat_map(|range| range.start()..=range.end())
        .collect()
}

/// Build an equals-ignore-case (monocase) FA.
///
/// For each rune, every case variant is threaded through a small byte trie
/// that rejoins at one state, so variants sharing leading bytes share states
/// and variants of different UTF-8 lengths still line up.
pub fn make_monocase_fa<X>(
    arena: &mut StateArena<X>,
    val: &[u8],
    next: StateId,
) -> Result<StateId> {
    let text = require_utf8(val)?;
    let start = arena.alloc();
    let mut current = start;

    for c in text.chars() {
        let after = arena.alloc();
        for variant in case_variants(c) {
            let mut buf = [0u8; 4];
            let bytes = variant.encode_utf8(&mut buf).as_bytes();
            let (last, leading) = match bytes.split_last() {
                Some(split) => split,
                None => continue,
            };
            let mut node = current;
            for &byte in leading {
                let existing = arena[node].table.step(byte);
                node = if existing.is_some() {
                    existing
                } else {
                    let child = arena.alloc();
                    arena[node].table.set_step(byte, child);
                    child
                };
            }
            arena[node].table.set_step(*last, after);
        }
        current = after;
    }

    arena[current].table.set_step(VALUE_TERMINATOR, next);
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(c: char) -> Vec<char> {
        case_variants(c).into_vec()
    }

    #[test]
    fn test_case_variants() {
        assert_eq!(chars('a'), vec!['A', 'a']);
        assert_eq!(chars('7'), vec!['7']);
        // Long s folds to s, so all three are one class from any member
        assert_eq!(chars('\u{17F}'), vec!['S', 's', '\u{17F}']);
        assert_eq!(chars('s'), vec!['S', 's', '\u{17F}']);
        // Kelvin sign folds to k
        assert_eq!(chars('k'), vec!['K', 'k', '\u{212A}']);
        assert_eq!(chars('\u{212A}'), vec!['K', 'k', '\u{212A}']);
        // Dotless i has no simple folding; dotted capital I only a Turkic one
        assert_eq!(chars('\u{131}'), vec!['\u{131}']);
        assert_eq!(chars('i'), vec!['I', 'i']);
        // Variants with different UTF-8 lengths
        assert_eq!(chars('\u{23F}'), vec!['\u{23F}', '\u{2C7E}']);
    }

    #[test]
    fn test_tokenize_wildcard_escapes() {
        let tokens = tokenize_wildcard(r#""a\*b\\""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                GlobToken::Literal(b'"'),
                GlobToken::Literal(b'a'),
                GlobToken::Literal(b'*'),
                GlobToken::Literal(b'b'),
                GlobToken::Literal(b'\\'),
                GlobToken::Literal(b'"'),
            ]
        );
    }

    #[test]
    fn test_tokenize_wildcard_errors() {
        assert_eq!(
            tokenize_wildcard(r#""a**""#),
            Err(CompileError::AdjacentGlobs { offset: 3 })
        );
        assert_eq!(tokenize_wildcard(r#""abc\""#), Err(CompileError::TrailingEscape));
        assert_eq!(tokenize_wildcard("abc\\"), Err(CompileError::TrailingEscape));
        assert_eq!(
            tokenize_wildcard(r#""a\b""#),
            Err(CompileError::InvalidEscape {
                escaped: 'b',
                offset: 2
            })
        );
    }

    #[test]
    fn test_shellstyle_rejects_two_globs() {
        let mut arena: StateArena<u8> = StateArena::new();
        let next = arena.alloc_match(1);
        assert_eq!(
            make_shellstyle_fa(&mut arena, br#""*a*""#, next),
            Err(CompileError::MultipleGlobs)
        );
        // Nothing was allocated for the failed pattern
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_trailing_glob_is_prefix() {
        let mut arena: StateArena<u8> = StateArena::new();
        let next = arena.alloc_match(1);
        let start = make_shellstyle_fa(&mut arena, br#""ab*""#, next).unwrap();
        assert!(arena.is_deterministic(start));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut arena: StateArena<u8> = StateArena::new();
        let next = arena.alloc_match(1);
        assert_eq!(
            make_string_fa(&mut arena, &[b'"', 0xFF, b'"'], next),
            Err(CompileError::InvalidUtf8)
        );
        assert_eq!(
            make_monocase_fa(&mut arena, &[0xC3], next),
            Err(CompileError::InvalidUtf8)
        );
    }
}
