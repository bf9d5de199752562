//! Epsilon closures.
//!
//! The closure of a state is every state reachable through epsilon edges
//! alone that can actually do something: take a byte step, spin out, loop
//! back on itself or hand back continuations. Pure splice states are
//! skipped since they contribute nothing once their targets are known.

use std::sync::OnceLock;

use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use super::arena::{StateArena, StateId};

/// Closures are usually a handful of states.
pub type Closure = SmallVec<[StateId; 4]>;

/// Compute the epsilon closure of `start`.
///
/// A state with no epsilons is its own closure.
pub fn epsilon_closure<X>(arena: &StateArena<X>, start: StateId) -> Closure {
    if arena[start].table.epsilons.is_empty() {
        return smallvec![start];
    }

    let mut closure = Closure::new();
    let mut seen = FxHashSet::default();
    let mut stack: SmallVec<[StateId; 16]> = smallvec![start];
    seen.insert(start);

    while let Some(id) = stack.pop() {
        let state = &arena[id];
        let table = &state.table;
        if !table.has_no_byte_steps()
            || table.spinout.is_some()
            || !state.field_transitions.is_empty()
            || table.epsilons.contains(&id)
        {
            closure.push(id);
        }
        // Reverse so the first epsilon is explored first
        for &eps in table.epsilons.iter().rev() {
            if seen.insert(eps) {
                stack.push(eps);
            }
        }
    }
    closure
}

/// Lazily computed closures for every state of one automaton.
///
/// Published automata never change, so a closure computed once stays valid
/// for the automaton's lifetime. The cache belongs to exactly one automaton.
#[derive(Debug, Default)]
pub struct EpsilonClosures {
    slots: Vec<OnceLock<Closure>>,
}

impl EpsilonClosures {
    pub fn new(state_count: usize) -> Self {
        Self {
            slots: (0..state_count).map(|_| OnceLock::new()).collect(),
        }
    }

    /// The closure of `id`, computing it on first use.
    #[inline]
    pub fn get<X>(&self, arena: &StateArena<X>, id: StateId) -> &[StateId] {
        self.slots[id.index()]
            .get_or_init(|| epsilon_closure(arena, id))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Clone for EpsilonClosures {
    fn clone(&self) -> Self {
        // Cached entries are cheap to recompute; a clone starts cold.
        Self::new(self.slots.len())
    }
}
