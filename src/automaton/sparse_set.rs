//! Frontier sets for NFA traversal.
//!
//! A sparse set over arena indices (see https://research.swtch.com/sparse):
//! insertion order is preserved, membership and insertion are O(1), and
//! clearing just resets the length so a frontier can be reused per byte.

use super::arena::StateId;

/// A set of `StateId`s drawn from an arena of known size.
#[derive(Clone, Debug, Default)]
pub struct SparseSet {
    len: usize,
    /// IDs in insertion order.
    dense: Vec<StateId>,
    /// `sparse[id]` is the position of `id` in `dense` when present.
    sparse: Vec<u32>,
}

impl SparseSet {
    pub fn new(capacity: usize) -> Self {
        SparseSet {
            len: 0,
            dense: vec![StateId::NONE; capacity],
            sparse: vec![0; capacity],
        }
    }

    /// Make room for IDs below `capacity`. Clears the set when it grows.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity > self.dense.len() {
            self.clear();
            self.dense.resize(capacity, StateId::NONE);
            self.sparse.resize(capacity, 0);
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.dense.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a state. Returns false if it was already present.
    ///
    /// Panics if the ID is outside the set's capacity.
    #[inline]
    pub fn insert(&mut self, id: StateId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.dense[self.len] = id;
        self.sparse[id.index()] = self.len as u32;
        self.len += 1;
        true
    }

    #[inline]
    pub fn contains(&self, id: StateId) -> bool {
        let pos = self.sparse[id.index()] as usize;
        pos < self.len && self.dense[pos] == id
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[StateId] {
        &self.dense[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.as_slice().iter().copied()
    }
}

/// The current and next frontiers of an NFA walk.
#[derive(Clone, Debug, Default)]
pub struct SparseSets {
    pub current: SparseSet,
    pub next: SparseSet,
}

impl SparseSets {
    pub fn new(capacity: usize) -> Self {
        SparseSets {
            current: SparseSet::new(capacity),
            next: SparseSet::new(capacity),
        }
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        self.current.ensure_capacity(capacity);
        self.next.ensure_capacity(capacity);
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.next.clear();
    }

    /// Promote `next` to `current` and empty the new `next`.
    #[inline]
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.clear();
    }
}
