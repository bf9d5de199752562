//! Rune ranges and their UTF-8 byte automata.
//!
//! A rune range is a set of inclusive code-point intervals. It compiles into
//! a byte trie: each interval is split by UTF-8 encoding length and around
//! the surrogate gap, then inserted byte by byte. Runs of "any continuation
//! byte" share one chain of tail states instead of getting a subtree each.

use std::fmt::Write as _;

use crate::automaton::{SmallTable, StateArena, StateId, BYTE_CEILING};
use crate::error::{CompileError, Result};

/// An inclusive range of runes `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunePair {
    pub lo: char,
    pub hi: char,
}

impl RunePair {
    pub fn new(lo: char, hi: char) -> Self {
        Self { lo, hi }
    }

    pub fn single(c: char) -> Self {
        Self { lo: c, hi: c }
    }
}

/// A set of rune intervals, as found in a character class.
pub type RuneRange = Vec<RunePair>;

pub const RUNE_MAX: char = char::MAX;

const SURROGATE_START: u32 = 0xD800;
const SURROGATE_END: u32 = 0xDFFF;

/// Reject intervals whose low end is above their high end.
pub fn validate_rune_range(rr: &[RunePair]) -> Result<()> {
    for pair in rr {
        if pair.lo > pair.hi {
            return Err(CompileError::InvalidRuneRange {
                lo: pair.lo as u32,
                hi: pair.hi as u32,
            });
        }
    }
    Ok(())
}

/// Sort and merge overlapping or adjacent intervals.
pub fn simplify_rune_range(mut rr: RuneRange) -> RuneRange {
    rr.sort_by_key(|pair| pair.lo);
    let mut out: RuneRange = Vec::with_capacity(rr.len());
    for pair in rr {
        if let Some(last) = out.last_mut() {
            if pair.lo as u32 <= last.hi as u32 + 1 {
                if pair.hi > last.hi {
                    last.hi = pair.hi;
                }
                continue;
            }
        }
        out.push(pair);
    }
    out
}

/// Every rune not in `rr`. Surrogates are never runes, so they never appear.
pub fn invert_rune_range(rr: RuneRange) -> RuneRange {
    let mut inverted = Vec::new();
    let mut point: u32 = 0;
    for pair in simplify_rune_range(rr) {
        let lo = pair.lo as u32;
        if lo > point {
            push_gap(&mut inverted, point, lo - 1);
        }
        point = pair.hi as u32 + 1;
    }
    if point <= RUNE_MAX as u32 {
        push_gap(&mut inverted, point, RUNE_MAX as u32);
    }
    inverted
}

fn push_gap(out: &mut RuneRange, start: u32, end: u32) {
    for (lo, hi) in split_surrogates(start, end) {
        if let (Some(lo), Some(hi)) = (char::from_u32(lo), char::from_u32(hi)) {
            out.push(RunePair { lo, hi });
        }
    }
}

/// The parts of `[start, end]` outside the surrogate block.
fn split_surrogates(start: u32, end: u32) -> impl Iterator<Item = (u32, u32)> {
    let below = (start < SURROGATE_START).then(|| (start, end.min(SURROGATE_START - 1)));
    let above = (end > SURROGATE_END).then(|| (start.max(SURROGATE_END + 1), end));
    below.into_iter().chain(above).filter(|(lo, hi)| lo <= hi)
}

/// Number of code points covered, not counting surrogates.
pub fn rune_count(rr: &[RunePair]) -> u32 {
    rr.iter()
        .flat_map(|pair| split_surrogates(pair.lo as u32, pair.hi as u32))
        .map(|(lo, hi)| hi - lo + 1)
        .sum()
}

/// Stable name for a range: `"0000-0060,0062-10FFFF"`.
pub fn canonical_name(rr: &[RunePair]) -> String {
    let mut name = String::with_capacity(rr.len() * 12);
    for (i, pair) in rr.iter().enumerate() {
        if i > 0 {
            name.push(',');
        }
        let _ = write!(name, "{:04X}-{:04X}", pair.lo as u32, pair.hi as u32);
    }
    name
}

/// Build the byte trie for `rr`, with every complete rune stepping to `next`.
///
/// An empty range yields a state with no transitions.
pub fn make_rune_range_fa<X>(arena: &mut StateArena<X>, rr: &[RunePair], next: StateId) -> StateId {
    let mut builder = RuneTrieBuilder {
        root: arena.alloc(),
        arena,
        dest: next,
        tails: [StateId::NONE; 3],
    };
    for pair in simplify_rune_range(rr.to_vec()) {
        builder.add_pair(pair.lo as u32, pair.hi as u32);
    }
    builder.root
}

// UTF-8 encoding boundaries
const UTF8_BOUNDARIES: [u32; 4] = [0x7F, 0x7FF, 0xFFFF, RUNE_MAX as u32];

struct RuneTrieBuilder<'a, X> {
    arena: &'a mut StateArena<X>,
    root: StateId,
    dest: StateId,
    /// `tails[k - 1]` accepts exactly `k` continuation bytes and steps to `dest`.
    tails: [StateId; 3],
}

impl<X> RuneTrieBuilder<'_, X> {
    fn add_pair(&mut self, lo: u32, hi: u32) {
        for (lo, hi) in split_surrogates(lo, hi) {
            let mut current = lo;
            for &boundary in &UTF8_BOUNDARIES {
                if current > hi {
                    break;
                }
                if boundary < current {
                    continue;
                }
                let segment_end = hi.min(boundary);
                if let (Some(start), Some(end)) =
                    (char::from_u32(current), char::from_u32(segment_end))
                {
                    self.add_same_length(start, end);
                }
                current = segment_end + 1;
            }
        }
    }

    /// Add `[lo, hi]`, two runes with the same UTF-8 length.
    fn add_same_length(&mut self, lo: char, hi: char) {
        let (mut lo_buf, mut hi_buf) = ([0u8; 4], [0u8; 4]);
        let lo_bytes = lo.encode_utf8(&mut lo_buf).as_bytes();
        let hi_bytes = hi.encode_utf8(&mut hi_buf).as_bytes();
        debug_assert_eq!(lo_bytes.len(), hi_bytes.len());
        let root = self.root;
        self.add_bytes(root, lo_bytes, hi_bytes, 0);
    }

    fn add_bytes(&mut self, node: StateId, lo: &[u8], hi: &[u8], idx: usize) {
        let last = idx + 1 == lo.len();
        if lo[idx] == hi[idx] {
            if last {
                self.set_range(node, lo[idx], lo[idx], self.dest);
            } else {
                let child = self.child(node, lo[idx]);
                self.add_bytes(child, lo, hi, idx + 1);
            }
            return;
        }

        // Split into lo's lead byte, full middle lead bytes and hi's lead byte
        self.add_lo(node, lo, idx);
        if hi[idx] > lo[idx] + 1 {
            let tail = self.tail(lo.len() - idx - 1);
            self.set_range(node, lo[idx] + 1, hi[idx] - 1, tail);
        }
        self.add_hi(node, hi, idx);
    }

    /// `lo[idx..]` and everything above it with the same lead bytes.
    fn add_lo(&mut self, node: StateId, lo: &[u8], idx: usize) {
        if idx + 1 == lo.len() {
            self.set_range(node, lo[idx], lo[idx], self.dest);
            return;
        }
        let child = self.child(node, lo[idx]);
        self.add_lo(child, lo, idx + 1);
        if lo[idx + 1] < 0xBF {
            let tail = self.tail(lo.len() - idx - 2);
            self.set_range(child, lo[idx + 1] + 1, 0xBF, tail);
        }
    }

    /// `hi[idx..]` and everything below it with the same lead bytes.
    fn add_hi(&mut self, node: StateId, hi: &[u8], idx: usize) {
        if idx + 1 == hi.len() {
            self.set_range(node, hi[idx], hi[idx], self.dest);
            return;
        }
        let child = self.child(node, hi[idx]);
        if hi[idx + 1] > 0x80 {
            let tail = self.tail(hi.len() - idx - 2);
            self.set_range(child, 0x80, hi[idx + 1] - 1, tail);
        }
        self.add_hi(child, hi, idx + 1);
    }

    /// State accepting `depth` continuation bytes, then `dest`.
    fn tail(&mut self, depth: usize) -> StateId {
        if depth == 0 {
            return self.dest;
        }
        if self.tails[depth - 1].is_none() {
            let below = self.tail(depth - 1);
            let id = self.arena.alloc();
            self.set_range(id, 0x80, 0xBF, below);
            self.tails[depth - 1] = id;
        }
        self.tails[depth - 1]
    }

    /// The trie node under `node` for `byte`, creating it if needed.
    ///
    /// Shared tail states are copied before being extended.
    fn child(&mut self, node: StateId, byte: u8) -> StateId {
        let existing = self.arena[node].table.step(byte);
        if existing.is_some() && !self.tails.contains(&existing) && existing != self.dest {
            return existing;
        }
        let fresh = if existing.is_some() {
            let table = self.arena[existing].table.clone();
            self.arena.alloc_with_table(table)
        } else {
            self.arena.alloc()
        };
        self.arena[node].table.set_step(byte, fresh);
        fresh
    }

    fn set_range(&mut self, node: StateId, lo: u8, hi: u8, target: StateId) {
        let table = &mut self.arena[node].table;
        let mut unpacked = table.unpack();
        unpacked[lo as usize..=hi as usize].fill(target);
        table.pack(&unpacked);
    }
}

/// Build a dot FA that matches any single valid UTF-8 encoded rune.
///
/// Overlong encodings, surrogates and code points past U+10FFFF are
/// rejected byte by byte.
pub fn make_dot_fa<X>(arena: &mut StateArena<X>, dest: StateId) -> StateId {
    let ranged = |arena: &mut StateArena<X>, lo: usize, hi: usize, target: StateId| {
        let mut unpacked = [StateId::NONE; BYTE_CEILING];
        unpacked[lo..hi].fill(target);
        let mut table = SmallTable::new();
        table.pack(&unpacked);
        arena.alloc_with_table(table)
    };

    // Continuation bytes: one, two or three left before `dest`
    let last = ranged(arena, 0x80, 0xC0, dest);
    let last_inter = ranged(arena, 0x80, 0xC0, last);
    let first_inter = ranged(arena, 0x80, 0xC0, last_inter);

    // Lead bytes with a narrower second byte
    let after_e0 = ranged(arena, 0xA0, 0xC0, last);
    let after_ed = ranged(arena, 0x80, 0xA0, last);
    let after_f0 = ranged(arena, 0x90, 0xC0, last_inter);
    let after_f4 = ranged(arena, 0x80, 0x90, last_inter);

    let mut unpacked = [StateId::NONE; BYTE_CEILING];
    unpacked[..0x80].fill(dest);
    unpacked[0xC2..0xE0].fill(last);
    unpacked[0xE0] = after_e0;
    unpacked[0xE1..0xED].fill(last_inter);
    unpacked[0xED] = after_ed;
    unpacked[0xEE..0xF0].fill(last_inter);
    unpacked[0xF0] = after_f0;
    unpacked[0xF1..0xF4].fill(first_inter);
    unpacked[0xF4] = after_f4;

    let mut table = SmallTable::new();
    table.pack(&unpacked);
    arena.alloc_with_table(table)
}
