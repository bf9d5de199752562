//! Subset construction: NFA to DFA.
//!
//! Every DFA state stands for a canonical set of NFA states, the State-Set
//! Key: sorted, deduplicated arena indices. Keys are interned before their
//! transitions are explored, which is what makes the construction terminate
//! on cyclic NFAs and keeps its output reproducible across runs.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::arena::{FaState, StateArena, StateId};
use super::epsilon::EpsilonClosures;
use super::small_table::{SmallTable, BYTE_CEILING, VALUE_TERMINATOR};

/// Canonical identity of a set of NFA states.
pub type StateSetKey = Box<[StateId]>;

/// Determinize the automaton at `start` into a fresh arena.
///
/// The result has no epsilons and no spinouts, so it can be walked with
/// `traverse_dfa`. Returns `(empty arena, NONE)` for an empty automaton.
pub fn determinize<X: Clone + Eq>(
    nfa: &StateArena<X>,
    start: StateId,
) -> (StateArena<X>, StateId) {
    let Some(dfa) = determinize_bounded(nfa, start, usize::MAX) else {
        unreachable!("unbounded determinization gave up");
    };
    dfa
}

/// Like `determinize`, but gives up and returns `None` once the DFA would
/// need more than `max_states` states.
pub fn determinize_bounded<X: Clone + Eq>(
    nfa: &StateArena<X>,
    start: StateId,
    max_states: usize,
) -> Option<(StateArena<X>, StateId)> {
    let mut dfa = StateArena::new();
    if start.is_none() {
        return Some((dfa, StateId::NONE));
    }

    let closures = EpsilonClosures::new(nfa.len());
    let mut intern: FxHashMap<StateSetKey, StateId> = FxHashMap::default();
    let mut work: Vec<(StateId, StateSetKey)> = Vec::new();

    let start_key = canonical(closures.get(nfa, start).to_vec());
    let dfa_start = dfa.alloc();
    intern.insert(start_key.clone(), dfa_start);
    work.push((dfa_start, start_key));

    while let Some((dfa_id, key)) = work.pop() {
        let mut field_transitions: Vec<X> = Vec::new();
        let mut bounds: SmallVec<[usize; 32]> = SmallVec::new();
        for &member in key.iter() {
            let state = &nfa[member];
            for x in &state.field_transitions {
                if !field_transitions.contains(x) {
                    field_transitions.push(x.clone());
                }
            }
            bounds.extend(state.table.ceilings.iter().map(|&c| c as usize));
        }
        // The terminator never takes a spinout, so it is always its own segment
        bounds.push(VALUE_TERMINATOR as usize);
        bounds.push(BYTE_CEILING);
        bounds.sort_unstable();
        bounds.dedup();

        let mut table = SmallTable {
            ceilings: Vec::with_capacity(bounds.len()),
            steps: Vec::with_capacity(bounds.len()),
            epsilons: Vec::new(),
            spinout: StateId::NONE,
        };
        let mut floor = 0usize;
        for &ceiling in &bounds {
            let target_key = aggregate(nfa, &closures, &key, floor as u8);
            let target = if target_key.is_empty() {
                StateId::NONE
            } else if let Some(&existing) = intern.get(&target_key) {
                existing
            } else {
                if dfa.len() >= max_states {
                    tracing::debug!(max_states, "determinization exceeded its state budget");
                    return None;
                }
                let id = dfa.alloc();
                intern.insert(target_key.clone(), id);
                work.push((id, target_key));
                id
            };

            if table.steps.last() == Some(&target) {
                if let Some(last) = table.ceilings.last_mut() {
                    *last = ceiling as u8;
                }
            } else {
                table.ceilings.push(ceiling as u8);
                table.steps.push(target);
            }
            floor = ceiling;
        }

        dfa[dfa_id] = FaState {
            table,
            field_transitions,
        };
    }

    tracing::trace!(nfa_states = nfa.len(), dfa_states = dfa.len(), "determinized");
    Some((dfa, dfa_start))
}

/// The closed set of NFA states reached from `key` on `byte`.
fn aggregate<X>(
    nfa: &StateArena<X>,
    closures: &EpsilonClosures,
    key: &[StateId],
    byte: u8,
) -> StateSetKey {
    let mut reached: SmallVec<[StateId; 8]> = SmallVec::new();
    for &member in key {
        let table = &nfa[member].table;
        let step = table.step(byte);
        if step.is_some() {
            reached.push(step);
        }
        if byte != VALUE_TERMINATOR && table.spinout.is_some() {
            reached.push(table.spinout);
        }
        if nfa.has_self_epsilon(member) {
            reached.push(member);
        }
    }

    let mut closed = Vec::with_capacity(reached.len());
    for id in reached {
        closed.extend_from_slice(closures.get(nfa, id));
    }
    canonical(closed)
}

fn canonical(mut states: Vec<StateId>) -> StateSetKey {
    states.sort_unstable();
    states.dedup();
    states.into_boxed_slice()
}
