//! Union of two automata.
//!
//! `merge_fas` builds a state for every pair of states the two automata can
//! occupy at the same time. Pairs are memoized before their transitions are
//! explored, so cyclic inputs terminate and shared sub-automata are merged
//! once. Exploration runs off an explicit worklist rather than recursion.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::arena::{FaState, StateArena, StateId};
use super::small_table::SmallTable;

/// Merge the automata starting at `a` and `b` (both in `arena`) into one
/// accepting the union of their languages. Returns the merged start state.
///
/// Neither input is modified; the result may share states with both.
pub fn merge_fas<X: Clone + Eq>(arena: &mut StateArena<X>, a: StateId, b: StateId) -> StateId {
    let before = arena.len();
    let mut merger = Merger::default();
    let start = merger.resolve(arena, a, b);
    while let Some((merged, a, b)) = merger.work.pop() {
        merger.fill(arena, merged, a, b);
    }
    tracing::trace!(
        pairs = merger.memo.len(),
        new_states = arena.len() - before,
        "merged automata"
    );
    start
}

#[derive(Default)]
struct Merger {
    /// Normalized `(min, max)` pair to the state standing for both.
    memo: FxHashMap<(StateId, StateId), StateId>,
    /// Merged states whose tables still need to be filled in.
    work: Vec<(StateId, StateId, StateId)>,
}

impl Merger {
    /// The state reached when the first automaton is in `a` and the second in `b`.
    fn resolve<X>(&mut self, arena: &mut StateArena<X>, a: StateId, b: StateId) -> StateId {
        if a == b || b.is_none() {
            return a;
        }
        if a.is_none() {
            return b;
        }

        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&merged) = self.memo.get(&key) {
            return merged;
        }

        // Epsilon-bearing states are joined with a splice rather than combined
        if !arena[a].table.epsilons.is_empty() || !arena[b].table.epsilons.is_empty() {
            let splice = arena.alloc_splice(&[a, b]);
            self.memo.insert(key, splice);
            return splice;
        }

        let merged = arena.alloc();
        self.memo.insert(key, merged);
        self.work.push((merged, a, b));
        merged
    }

    fn fill<X: Clone + Eq>(
        &mut self,
        arena: &mut StateArena<X>,
        merged: StateId,
        a: StateId,
        b: StateId,
    ) {
        let (spin_a, spin_b) = (arena[a].table.spinout, arena[b].table.spinout);
        let spinout = self.resolve(arena, spin_a, spin_b);

        let ranges_a: SmallVec<[(usize, usize, StateId); 8]> = arena[a].table.ranges().collect();
        let ranges_b: SmallVec<[(usize, usize, StateId); 8]> = arena[b].table.ranges().collect();

        let mut ceilings = Vec::with_capacity(ranges_a.len() + ranges_b.len());
        let mut steps: Vec<StateId> = Vec::with_capacity(ranges_a.len() + ranges_b.len());
        let (mut i, mut j) = (0, 0);
        while i < ranges_a.len() && j < ranges_b.len() {
            let (_, ceiling_a, step_a) = ranges_a[i];
            let (_, ceiling_b, step_b) = ranges_b[j];
            let ceiling = ceiling_a.min(ceiling_b);
            let step = self.resolve(arena, step_a, step_b);

            if steps.last() == Some(&step) {
                if let Some(last) = ceilings.last_mut() {
                    *last = ceiling as u8;
                }
            } else {
                ceilings.push(ceiling as u8);
                steps.push(step);
            }

            if ceiling_a == ceiling {
                i += 1;
            }
            if ceiling_b == ceiling {
                j += 1;
            }
        }

        let mut field_transitions = arena[a].field_transitions.clone();
        for x in &arena[b].field_transitions {
            if !field_transitions.contains(x) {
                field_transitions.push(x.clone());
            }
        }

        arena[merged] = FaState {
            table: SmallTable {
                ceilings,
                steps,
                epsilons: Vec::new(),
                spinout,
            },
            field_transitions,
        };
    }
}
