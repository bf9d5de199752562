//! NFA/DFA traversal functions.
//!
//! - `traverse_dfa`: one active state, byte by byte
//! - `traverse_nfa`: a frontier of active states with epsilon expansion
//!
//! Both feed the value's bytes followed by `VALUE_TERMINATOR`, append the
//! continuations they reach to `out` without duplicates, and never modify
//! the automaton they walk, so any number of threads can share one.

use std::hash::Hash;

use rustc_hash::FxHashSet;

use super::arena::{StateArena, StateId};
use super::epsilon::EpsilonClosures;
use super::small_table::VALUE_TERMINATOR;
use super::sparse_set::SparseSets;

/// Traverse a DFA on a value.
///
/// Collects the continuations of the start state and of every state entered,
/// and stops as soon as a byte has no destination.
#[inline]
pub fn traverse_dfa<X: Clone + PartialEq>(
    arena: &StateArena<X>,
    start: StateId,
    val: &[u8],
    out: &mut Vec<X>,
) {
    if start.is_none() {
        return;
    }
    let mut current = start;
    collect_unique(&arena[current].field_transitions, out);

    for i in 0..=val.len() {
        let byte = if i < val.len() {
            val[i]
        } else {
            VALUE_TERMINATOR
        };

        let next = arena[current].table.step(byte);
        if next.is_none() {
            break;
        }
        collect_unique(&arena[next].field_transitions, out);
        current = next;
    }
}

fn collect_unique<X: Clone + PartialEq>(found: &[X], out: &mut Vec<X>) {
    for x in found {
        if !out.contains(x) {
            out.push(x.clone());
        }
    }
}

/// Reusable scratch space for `traverse_nfa`.
#[derive(Debug)]
pub struct NfaBuffers<X> {
    frontiers: SparseSets,
    seen: FxHashSet<X>,
}

impl<X> Default for NfaBuffers<X> {
    fn default() -> Self {
        Self {
            frontiers: SparseSets::default(),
            seen: FxHashSet::default(),
        }
    }
}

impl<X> NfaBuffers<X> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Traverse an NFA on a value.
///
/// For each byte (terminator included) every frontier state is expanded by
/// its epsilon closure; each closure member contributes its continuations,
/// its byte step, its spinout (not on the terminator) and itself again if it
/// carries a self-epsilon. The closures of the final frontier are consulted
/// once more after the terminator.
pub fn traverse_nfa<X: Clone + Eq + Hash>(
    arena: &StateArena<X>,
    closures: &EpsilonClosures,
    start: StateId,
    val: &[u8],
    bufs: &mut NfaBuffers<X>,
    out: &mut Vec<X>,
) {
    if start.is_none() {
        return;
    }
    bufs.frontiers.ensure_capacity(arena.len());
    bufs.frontiers.clear();
    bufs.seen.clear();
    bufs.seen.extend(out.iter().cloned());
    bufs.frontiers.current.insert(start);

    for i in 0..=val.len() {
        if bufs.frontiers.current.is_empty() {
            break;
        }
        let byte = if i < val.len() {
            val[i]
        } else {
            VALUE_TERMINATOR
        };

        for &state in bufs.frontiers.current.as_slice() {
            for &member in closures.get(arena, state) {
                let fa_state = &arena[member];
                for x in &fa_state.field_transitions {
                    if bufs.seen.insert(x.clone()) {
                        out.push(x.clone());
                    }
                }

                let table = &fa_state.table;
                let next = table.step(byte);
                if next.is_some() {
                    bufs.frontiers.next.insert(next);
                }
                if byte != VALUE_TERMINATOR && table.spinout.is_some() {
                    bufs.frontiers.next.insert(table.spinout);
                }
                if table.epsilons.contains(&member) {
                    bufs.frontiers.next.insert(member);
                }
            }
        }
        bufs.frontiers.advance();
    }

    for &state in bufs.frontiers.current.as_slice() {
        for &member in closures.get(arena, state) {
            for x in &arena[member].field_transitions {
                if bufs.seen.insert(x.clone()) {
                    out.push(x.clone());
                }
            }
        }
    }
}
