//! Thread-safe value matcher.
//!
//! A `ValueMatcher` owns the merged NFA of every pattern added so far. Each
//! `add_pattern` compiles one fragment into that NFA under a mutex, then
//! publishes a fresh immutable `Automaton` (a DFA when determinization stays
//! within budget) through an `ArcSwap`. Matching only loads the current
//! snapshot, so it never waits on a writer.

use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::arena::{StateArena, StateId};
use super::dfa::determinize_bounded;
use super::epsilon::EpsilonClosures;
use super::fa_builders::{
    make_anything_but_fa, make_monocase_fa, make_prefix_fa, make_shellstyle_fa, make_string_fa,
    make_wildcard_fa,
};
use super::merge::merge_fas;
use super::shell::{CompileContext, ShellCache};
use super::traverse::{traverse_dfa, traverse_nfa, NfaBuffers};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::regexp::{make_regexp_fa, parse_regexp, Atom, QuantifiedAtom, RegexpRoot, RuneRange};

/// A value pattern. Byte-valued patterns are raw document bytes, so JSON
/// strings keep their quotes (`b"\"foo\""`). `RuneRange` and `Regexp`
/// describe the contents of a JSON string and match it with its quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(Vec<u8>),
    Prefix(Vec<u8>),
    /// At most one `*`
    ShellStyle(Vec<u8>),
    /// Any number of non-adjacent `*`, with `\*` and `\\` escapes
    Wildcard(Vec<u8>),
    EqualsIgnoreCase(Vec<u8>),
    /// Any value except the listed ones
    AnythingBut(Vec<Vec<u8>>),
    /// Exactly one rune from the range
    RuneRange(RuneRange),
    Regexp(RegexpRoot),
}

impl Pattern {
    /// Parse `re` into a `Pattern::Regexp`.
    pub fn regexp(re: &str) -> Result<Pattern> {
        Ok(Pattern::Regexp(parse_regexp(re)?))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::Exact(_) => "exact",
            Pattern::Prefix(_) => "prefix",
            Pattern::ShellStyle(_) => "shellstyle",
            Pattern::Wildcard(_) => "wildcard",
            Pattern::EqualsIgnoreCase(_) => "equals-ignore-case",
            Pattern::AnythingBut(_) => "anything-but",
            Pattern::RuneRange(_) => "rune-range",
            Pattern::Regexp(_) => "regexp",
        }
    }
}

/// Compile `pattern` into `arena`, ending in `next`.
fn compile_pattern<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    pattern: &Pattern,
    next: StateId,
) -> Result<StateId> {
    match pattern {
        Pattern::Exact(val) => make_string_fa(arena, val, next),
        Pattern::Prefix(val) => make_prefix_fa(arena, val, next),
        Pattern::ShellStyle(val) => make_shellstyle_fa(arena, val, next),
        Pattern::Wildcard(val) => make_wildcard_fa(arena, val, next),
        Pattern::EqualsIgnoreCase(val) => make_monocase_fa(arena, val, next),
        Pattern::AnythingBut(vals) => make_anything_but_fa(arena, vals, next),
        Pattern::RuneRange(rr) => {
            let root = vec![vec![QuantifiedAtom::once(Atom::Runes(rr.clone()))]];
            make_regexp_fa(ctx, arena, &root, true, next)
        }
        Pattern::Regexp(root) => make_regexp_fa(ctx, arena, root, true, next),
    }
}

/// An immutable, published automaton.
#[derive(Debug, Clone)]
pub struct Automaton<X> {
    arena: StateArena<X>,
    start: StateId,
    deterministic: bool,
    closures: EpsilonClosures,
}

impl<X> Default for Automaton<X> {
    fn default() -> Self {
        Self::dfa(StateArena::new(), StateId::NONE)
    }
}

impl<X> Automaton<X> {
    fn dfa(arena: StateArena<X>, start: StateId) -> Self {
        Self {
            arena,
            start,
            deterministic: true,
            closures: EpsilonClosures::default(),
        }
    }

    fn nfa(arena: StateArena<X>, start: StateId) -> Self {
        let closures = EpsilonClosures::new(arena.len());
        Self {
            arena,
            start,
            deterministic: false,
            closures,
        }
    }

    pub fn state_count(&self) -> usize {
        self.arena.len()
    }

    /// True if this snapshot is a DFA.
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }
}

impl<X: Clone + Eq + Hash> Automaton<X> {
    /// Append the continuations `val` reaches to `out`, reusing `bufs`.
    pub fn matches_into(&self, val: &[u8], bufs: &mut NfaBuffers<X>, out: &mut Vec<X>) {
        if self.deterministic {
            traverse_dfa(&self.arena, self.start, val, out);
        } else {
            traverse_nfa(&self.arena, &self.closures, self.start, val, bufs, out);
        }
    }

    pub fn matches(&self, val: &[u8]) -> Vec<X> {
        let mut out = Vec::new();
        self.matches_into(val, &mut NfaBuffers::new(), &mut out);
        out
    }
}

/// Writer-side state: the merged NFA of every pattern added so far.
struct Builder<X> {
    arena: StateArena<X>,
    start: StateId,
    patterns: usize,
}

/// Matches values against a growing set of patterns.
///
/// `ValueMatcher` is `Send + Sync` whenever `X` is. Pattern addition is
/// serialized; matching is lock-free and always sees a complete snapshot.
pub struct ValueMatcher<X> {
    published: ArcSwap<Automaton<X>>,
    writer: Mutex<Builder<X>>,
    shells: Arc<ShellCache>,
    config: EngineConfig,
}

impl<X: Clone + Eq + Hash> Default for ValueMatcher<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<X: Clone + Eq + Hash> ValueMatcher<X> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_shell_cache(config, Arc::new(ShellCache::new()))
    }

    /// Share rune-range templates with other matchers through `shells`.
    pub fn with_shell_cache(config: EngineConfig, shells: Arc<ShellCache>) -> Self {
        Self {
            published: ArcSwap::from_pointee(Automaton::default()),
            writer: Mutex::new(Builder {
                arena: StateArena::new(),
                start: StateId::NONE,
                patterns: 0,
            }),
            shells,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a pattern whose matches report `x`.
    ///
    /// On error nothing changes: the published automaton and the builder
    /// are exactly as they were.
    pub fn add_pattern(&self, pattern: &Pattern, x: X) -> Result<()> {
        let mut builder = self.writer.lock();
        let mark = builder.arena.len();
        let ctx = CompileContext {
            config: &self.config,
            shells: &self.shells,
        };

        let next = builder.arena.alloc_match(x);
        let entry = match compile_pattern(ctx, &mut builder.arena, pattern, next) {
            Ok(entry) => entry,
            Err(err) => {
                builder.arena.truncate(mark);
                tracing::debug!(kind = pattern.kind(), error = %err, "pattern rejected");
                return Err(err);
            }
        };

        let start = builder.start;
        let merged = merge_fas(&mut builder.arena, start, entry);
        let (arena, start) = builder.arena.extract_reachable(merged);
        builder.arena = arena;
        builder.start = start;
        builder.patterns += 1;

        let automaton = self.publishable(&builder.arena, builder.start);
        tracing::debug!(
            kind = pattern.kind(),
            patterns = builder.patterns,
            nfa_states = builder.arena.len(),
            published_states = automaton.state_count(),
            deterministic = automaton.is_deterministic(),
            "added pattern"
        );
        self.published.store(Arc::new(automaton));
        Ok(())
    }

    /// A DFA if the config asks for one and it fits the budget, else the NFA.
    fn publishable(&self, nfa: &StateArena<X>, start: StateId) -> Automaton<X> {
        if self.config.determinize {
            let budget = self.config.max_dfa_states;
            if let Some((dfa, dfa_start)) = determinize_bounded(nfa, start, budget) {
                return Automaton::dfa(dfa, dfa_start);
            }
        }
        Automaton::nfa(nfa.clone(), start)
    }

    /// Every pattern's `x` that `val` matches, without duplicates.
    pub fn matches(&self, val: &[u8]) -> Vec<X> {
        self.published.load().matches(val)
    }

    /// The current snapshot, for repeated matching with reused buffers.
    pub fn automaton(&self) -> Arc<Automaton<X>> {
        self.published.load_full()
    }

    pub fn pattern_count(&self) -> usize {
        self.writer.lock().patterns
    }

    /// The rune-range template cache this matcher compiles with.
    pub fn shell_cache(&self) -> &Arc<ShellCache> {
        &self.shells
    }
}
