//! Reusable automaton fragments.
//!
//! Large rune ranges (think `[^a]`, over a million code points) and
//! repeated regexp atoms are expensive to rebuild. A `Template` is such a
//! fragment compiled once with a placeholder exit; grafting copies its
//! states into an arena and points the exit at a real state.
//!
//! The `ShellCache` keeps templates by name. It belongs to whoever compiles
//! patterns (normally a `ValueMatcher`) and is shared with `Arc`, never
//! stored in a process global.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::arena::{StateArena, StateId};
use super::small_table::SmallTable;
use crate::config::EngineConfig;
use crate::error::Result;

/// A fragment with its exit left open.
///
/// States are stored with local indices `0..len`; index `len` stands for the
/// exit.
#[derive(Debug, Clone)]
pub struct Template {
    tables: Vec<SmallTable>,
    entry: StateId,
}

impl Template {
    /// Allocate a placeholder exit for a fragment that will become a template.
    ///
    /// The placeholder carries a self-epsilon so that a merge touching it
    /// splices rather than copying its (empty) transitions.
    pub fn placeholder<X>(scratch: &mut StateArena<X>) -> StateId {
        let exit = scratch.alloc();
        scratch[exit].table.epsilons.push(exit);
        exit
    }

    /// Capture the fragment reachable from `entry` without passing through
    /// `exit`.
    pub fn from_arena<X>(arena: &StateArena<X>, entry: StateId, exit: StateId) -> Template {
        let mut local: FxHashMap<StateId, StateId> = FxHashMap::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        if entry != exit {
            local.insert(entry, StateId::from_index(0));
            order.push(entry);
            queue.push_back(entry);
        }
        while let Some(id) = queue.pop_front() {
            let table = &arena[id].table;
            let successors = table
                .steps
                .iter()
                .chain(table.epsilons.iter())
                .chain(std::iter::once(&table.spinout));
            for &next in successors {
                if next.is_some() && next != exit && !local.contains_key(&next) {
                    local.insert(next, StateId::from_index(order.len()));
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }

        let exit_local = StateId::from_index(order.len());
        let relabel = |s: StateId| {
            if s.is_none() {
                s
            } else if s == exit {
                exit_local
            } else {
                local[&s]
            }
        };
        let tables = order
            .iter()
            .map(|&id| arena[id].table.remap(&relabel))
            .collect();
        Template {
            tables,
            entry: relabel(entry),
        }
    }

    /// Number of states a graft allocates.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Copy the template into `arena` with its exit bound to `next`.
    /// Returns the entry of the copy.
    pub fn graft<X>(&self, arena: &mut StateArena<X>, next: StateId) -> StateId {
        let base = arena.len();
        let exit = self.tables.len();
        let rebind = |s: StateId| {
            if s.is_none() {
                s
            } else if s.index() == exit {
                next
            } else {
                StateId::from_index(base + s.index())
            }
        };
        for table in &self.tables {
            arena.alloc_with_table(table.remap(&rebind));
        }
        rebind(self.entry)
    }
}

/// Named templates, built at most once each.
#[derive(Debug, Default)]
pub struct ShellCache {
    templates: Mutex<FxHashMap<String, Arc<Template>>>,
}

impl ShellCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the template named `key`, building it with `build` on a miss.
    ///
    /// The lock is held while building, so concurrent misses on one key
    /// build it once. A failed build caches nothing.
    pub fn get_or_build(
        &self,
        key: &str,
        build: impl FnOnce() -> Result<Template>,
    ) -> Result<Arc<Template>> {
        let mut templates = self.templates.lock();
        if let Some(template) = templates.get(key) {
            tracing::trace!(key, "shell cache hit");
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(build()?);
        tracing::debug!(key, states = template.len(), "built shell template");
        templates.insert(key.to_owned(), Arc::clone(&template));
        Ok(template)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.templates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.lock().is_empty()
    }
}

/// What fragment compilers need beyond the arena they write into.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub config: &'a EngineConfig,
    pub shells: &'a ShellCache,
}
