//! Arena-based state allocation for cyclic NFA structures.
//!
//! States are referenced by `StateId`, a plain index, so `*` and `+` loops,
//! glob spinouts and epsilon cycles are ordinary index references with no
//! ownership cycles. Every memoized operation (merge, determinize, closure)
//! keys on these indices, which keeps results independent of allocator
//! behavior.
//!
//! ```text
//! [a-z]* as a true cycle:
//!
//!   loop ──ε──> entry ──[a-z]──> loop
//!     │
//!     └──ε──> exit
//! ```

use std::collections::VecDeque;
use std::fmt;

use super::small_table::SmallTable;

/// A state identifier - just an index into the arena.
///
/// This can be freely copied and allows cyclic references.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    /// Special sentinel value for "no state" / null reference.
    pub const NONE: StateId = StateId(u32::MAX);

    #[inline]
    pub fn from_index(index: usize) -> StateId {
        assert!(index < u32::MAX as usize, "state arena overflow");
        StateId(index as u32)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "S-")
        } else {
            write!(f, "S{}", self.0)
        }
    }
}

/// A state in the finite automaton.
///
/// `field_transitions` holds the opaque continuations reached when this state
/// completes a value; the automaton only collects and deduplicates them.
#[derive(Clone, PartialEq, Eq)]
pub struct FaState<X> {
    /// The transition table for this state
    pub table: SmallTable,
    /// Continuations to hand back when this state is reached
    pub field_transitions: Vec<X>,
}

impl<X> Default for FaState<X> {
    fn default() -> Self {
        Self {
            table: SmallTable::new(),
            field_transitions: Vec::new(),
        }
    }
}

impl<X> fmt::Debug for FaState<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaState")
            .field("table", &self.table)
            .field("field_transitions_count", &self.field_transitions.len())
            .finish()
    }
}

impl<X> FaState<X> {
    pub fn with_table(table: SmallTable) -> Self {
        Self {
            table,
            field_transitions: Vec::new(),
        }
    }
}

/// Arena for allocating NFA states.
///
/// States are allocated contiguously and referenced by `StateId`.
/// The arena owns all state memory and frees it when dropped.
#[derive(Clone)]
pub struct StateArena<X> {
    states: Vec<FaState<X>>,
}

impl<X> Default for StateArena<X> {
    fn default() -> Self {
        Self { states: Vec::new() }
    }
}

impl<X> fmt::Debug for StateArena<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateArena")
            .field("states_count", &self.states.len())
            .finish()
    }
}

impl<X> StateArena<X> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
        }
    }

    /// Allocate a new empty state, returning its ID.
    pub fn alloc(&mut self) -> StateId {
        self.alloc_state(FaState::default())
    }

    /// Allocate a new state with the given table, returning its ID.
    pub fn alloc_with_table(&mut self, table: SmallTable) -> StateId {
        self.alloc_state(FaState::with_table(table))
    }

    /// Allocate a state that matches a value: it carries `x` and goes nowhere.
    pub fn alloc_match(&mut self, x: X) -> StateId {
        self.alloc_state(FaState {
            table: SmallTable::new(),
            field_transitions: vec![x],
        })
    }

    /// Allocate a pure epsilon "splice" state pointing at `targets`.
    pub fn alloc_splice(&mut self, targets: &[StateId]) -> StateId {
        let mut table = SmallTable::new();
        table.epsilons.extend_from_slice(targets);
        self.alloc_with_table(table)
    }

    pub fn alloc_state(&mut self, state: FaState<X>) -> StateId {
        let id = StateId::from_index(self.states.len());
        self.states.push(state);
        id
    }

    /// Get a reference to a state by ID.
    #[inline]
    pub fn get(&self, id: StateId) -> Option<&FaState<X>> {
        if id.is_none() {
            None
        } else {
            self.states.get(id.index())
        }
    }

    /// Number of states in the arena.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop every state allocated at or after `len`.
    ///
    /// Used to roll back a failed compile; nothing below `len` may point past it.
    pub fn truncate(&mut self, len: usize) {
        self.states.truncate(len);
    }

    /// True if `id` lists itself among its epsilon successors.
    #[inline]
    pub fn has_self_epsilon(&self, id: StateId) -> bool {
        self[id].table.epsilons.contains(&id)
    }

    /// True if the state only forwards through epsilons: no byte steps, no
    /// spinout, no self-loop and no continuations of its own.
    pub fn is_epsilon_only(&self, id: StateId) -> bool {
        let state = &self[id];
        !state.table.epsilons.is_empty()
            && state.table.has_no_byte_steps()
            && state.table.spinout.is_none()
            && state.field_transitions.is_empty()
            && !state.table.epsilons.contains(&id)
    }

    /// All states reachable from `start`, in breadth-first discovery order.
    pub fn reachable(&self, start: StateId) -> Vec<StateId> {
        let mut seen = vec![false; self.states.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        if start.is_some() {
            seen[start.index()] = true;
            queue.push_back(start);
        }
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let table = &self[id].table;
            let successors = table
                .steps
                .iter()
                .chain(table.epsilons.iter())
                .chain(std::iter::once(&table.spinout));
            for &next in successors {
                if next.is_some() && !seen[next.index()] {
                    seen[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// True if no state reachable from `start` has epsilons or a spinout, so
    /// the automaton can be walked with a single active state.
    pub fn is_deterministic(&self, start: StateId) -> bool {
        self.reachable(start).into_iter().all(|id| {
            let table = &self[id].table;
            table.epsilons.is_empty() && table.spinout.is_none()
        })
    }
}

impl<X: Clone> StateArena<X> {
    /// Copy the subgraph reachable from `start` into a fresh, compact arena.
    ///
    /// Returns the new arena and the start's ID within it (always index 0
    /// unless `start` is `NONE`).
    pub fn extract_reachable(&self, start: StateId) -> (StateArena<X>, StateId) {
        let order = self.reachable(start);
        let mut remap = vec![StateId::NONE; self.states.len()];
        for (new_index, old) in order.iter().enumerate() {
            remap[old.index()] = StateId::from_index(new_index);
        }

        let mut out = StateArena::with_capacity(order.len());
        for old in &order {
            let state = &self[*old];
            out.alloc_state(FaState {
                table: state.table.remap(|s| {
                    if s.is_none() {
                        s
                    } else {
                        remap[s.index()]
                    }
                }),
                field_transitions: state.field_transitions.clone(),
            });
        }

        let new_start = if start.is_none() {
            StateId::NONE
        } else {
            remap[start.index()]
        };
        (out, new_start)
    }
}

impl<X> std::ops::Index<StateId> for StateArena<X> {
    type Output = FaState<X>;

    #[inline]
    fn index(&self, id: StateId) -> &Self::Output {
        &self.states[id.index()]
    }
}

impl<X> std::ops::IndexMut<StateId> for StateArena<X> {
    #[inline]
    fn index_mut(&mut self, id: StateId) -> &mut Self::Output {
        &mut self.states[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::small_table::VALUE_TERMINATOR;

    #[test]
    fn test_state_id_none() {
        assert!(StateId::NONE.is_none());
        assert!(!StateId::from_index(0).is_none());
        assert!(StateId::from_index(100).is_some());
    }

    #[test]
    fn test_arena_alloc() {
        let mut arena: StateArena<u32> = StateArena::new();
        let id1 = arena.alloc();
        let id2 = arena.alloc();

        assert_eq!(id1.index(), 0);
        assert_eq!(id2.index(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_arena_cyclic_reference() {
        let mut arena: StateArena<u32> = StateArena::new();

        // Create two states that reference each other (cycle!)
        let state_a = arena.alloc();
        let state_b = arena.alloc();
        arena[state_a].table.epsilons.push(state_b);
        arena[state_b].table.epsilons.push(state_a);

        assert_eq!(arena[state_a].table.epsilons[0], state_b);
        assert_eq!(arena[state_b].table.epsilons[0], state_a);
        assert_eq!(arena.reachable(state_a), vec![state_a, state_b]);
    }

    #[test]
    fn test_epsilon_only_and_self_epsilon() {
        let mut arena: StateArena<u32> = StateArena::new();
        let target = arena.alloc_match(1);
        let splice = arena.alloc_splice(&[target]);
        assert!(arena.is_epsilon_only(splice));
        assert!(!arena.is_epsilon_only(target));

        let spinner = arena.alloc();
        arena[spinner].table.epsilons.push(spinner);
        assert!(arena.has_self_epsilon(spinner));
        assert!(!arena.is_epsilon_only(spinner));
    }

    #[test]
    fn test_is_deterministic() {
        let mut arena: StateArena<u32> = StateArena::new();
        let done = arena.alloc_match(7);
        let last = arena.alloc_with_table(SmallTable::with_mappings(
            StateId::NONE,
            &[VALUE_TERMINATOR],
            &[done],
        ));
        let start =
            arena.alloc_with_table(SmallTable::with_mappings(StateId::NONE, b"a", &[last]));
        assert!(arena.is_deterministic(start));

        let splice = arena.alloc_splice(&[start]);
        assert!(!arena.is_deterministic(splice));
    }

    #[test]
    fn test_extract_reachable_drops_garbage() {
        let mut arena: StateArena<u32> = StateArena::new();
        let _garbage = arena.alloc_match(99);
        let done = arena.alloc_match(1);
        let looping = arena.alloc();
        arena[looping].table = SmallTable::with_mappings(
            StateId::NONE,
            &[b'a', VALUE_TERMINATOR],
            &[looping, done],
        );

        let (compact, start) = arena.extract_reachable(looping);
        assert_eq!(compact.len(), 2);
        assert_eq!(start.index(), 0);
        // The self-loop survives the renumbering
        assert_eq!(compact[start].table.step(b'a'), start);
        let done_id = compact[start].table.step(VALUE_TERMINATOR);
        assert_eq!(compact[done_id].field_transitions, vec![1]);
    }

    #[test]
    fn test_truncate_rolls_back() {
        let mut arena: StateArena<u32> = StateArena::new();
        arena.alloc();
        let mark = arena.len();
        arena.alloc();
        arena.alloc();
        arena.truncate(mark);
        assert_eq!(arena.len(), 1);
    }
}
