//! The byte transition table every automaton state is built on.
//!
//! A `SmallTable` maps a byte in `[0, BYTE_CEILING)` to at most one
//! destination state. Besides byte steps it carries the state's epsilon
//! edges and its optional spinout, so a table fully describes how a state
//! moves.

use super::arena::StateId;

/// Maximum byte value we handle. UTF-8 bytes 0xF5-0xFF can't appear in valid strings.
/// We use 0xF5 as a value terminator.
pub const BYTE_CEILING: usize = 0xF6;

/// Marks the end of a value being matched. This simplifies handling of exact matches
/// vs prefix matches - we always add this terminator to both the pattern and the value.
pub const VALUE_TERMINATOR: u8 = 0xF5;

/// A compact lookup table encoding byte value ranges to state transitions.
///
/// The table uses a ceilings/steps representation where each ceiling marks the
/// upper bound (exclusive) of a byte range that maps to the corresponding step.
/// This is more memory-efficient than a 246-element array when there are ranges.
///
/// Example: To map bytes 3-4 to state S1 and byte 0x34 to state S2:
/// ```text
/// ceilings: [3, 5, 0x34, 0x35, BYTE_CEILING]
/// steps:    [NONE, S1, NONE, S2, NONE]
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmallTable {
    /// Upper bounds (exclusive) for each byte range
    pub ceilings: Vec<u8>,
    /// State to transition to for each range (`StateId::NONE` = no transition)
    pub steps: Vec<StateId>,
    /// Epsilon transitions (taken without consuming a byte)
    pub epsilons: Vec<StateId>,
    /// Extra destination on every byte except the value terminator.
    /// A glob state points this at itself.
    pub spinout: StateId,
}

impl Default for SmallTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SmallTable {
    /// Create a new empty table with the required final ceiling entry.
    pub fn new() -> Self {
        Self::with_default(StateId::NONE)
    }

    /// Create a table that steps to `default` on every byte.
    pub fn with_default(default: StateId) -> Self {
        Self {
            ceilings: vec![BYTE_CEILING as u8],
            steps: vec![default],
            epsilons: Vec::new(),
            spinout: StateId::NONE,
        }
    }

    /// Create a table with a default step and specific byte-to-state mappings.
    ///
    /// `bytes` must be in ascending order; `targets[i]` is the destination for `bytes[i]`.
    pub fn with_mappings(default: StateId, bytes: &[u8], targets: &[StateId]) -> Self {
        debug_assert_eq!(bytes.len(), targets.len());
        debug_assert!(bytes.windows(2).all(|w| w[0] < w[1]), "bytes must ascend");

        let mut ceilings = Vec::with_capacity(bytes.len() * 2 + 1);
        let mut steps = Vec::with_capacity(bytes.len() * 2 + 1);

        let mut last_index: usize = 0;
        for (&byte, &target) in bytes.iter().zip(targets) {
            let index = byte as usize;
            assert!(index < BYTE_CEILING, "byte {index:#x} is outside the table");
            // Default range before this byte if there's a gap
            if index > last_index {
                ceilings.push(byte);
                steps.push(default);
            }
            ceilings.push((index + 1) as u8);
            steps.push(target);
            last_index = index + 1;
        }

        if last_index < BYTE_CEILING {
            ceilings.push(BYTE_CEILING as u8);
            steps.push(default);
        }

        let mut table = Self {
            ceilings,
            steps,
            epsilons: Vec::new(),
            spinout: StateId::NONE,
        };
        // Adjacent equal steps (e.g. a mapping equal to the default) collapse
        let unpacked = table.unpack();
        table.pack(&unpacked);
        table
    }

    /// Look up the destination for one byte.
    ///
    /// Bytes at or above `BYTE_CEILING` never occur in valid UTF-8 and have no
    /// destination.
    #[inline]
    pub fn step(&self, utf8_byte: u8) -> StateId {
        for (i, &ceiling) in self.ceilings.iter().enumerate() {
            if utf8_byte < ceiling {
                return self.steps[i];
            }
        }
        if (utf8_byte as usize) < BYTE_CEILING {
            panic!("small table lost its final ceiling: {:?}", self.ceilings);
        }
        StateId::NONE
    }

    /// Add a transition for a specific byte value.
    pub fn set_step(&mut self, utf8_byte: u8, step: StateId) {
        assert!(
            (utf8_byte as usize) < BYTE_CEILING,
            "byte {utf8_byte:#x} is at or above the byte ceiling"
        );
        let mut unpacked = self.unpack();
        unpacked[utf8_byte as usize] = step;
        self.pack(&unpacked);
    }

    /// Collapse the whole byte range onto one destination.
    pub fn set_default(&mut self, step: StateId) {
        self.ceilings = vec![BYTE_CEILING as u8];
        self.steps = vec![step];
    }

    /// True if no byte leads anywhere.
    pub fn has_no_byte_steps(&self) -> bool {
        self.steps.iter().all(|s| s.is_none())
    }

    /// Unpack the compact representation into a full array.
    pub fn unpack(&self) -> [StateId; BYTE_CEILING] {
        let mut result = [StateId::NONE; BYTE_CEILING];
        let mut unpacked_index = 0;
        for (packed_index, &ceiling) in self.ceilings.iter().enumerate() {
            let ceiling = ceiling as usize;
            while unpacked_index < ceiling && unpacked_index < BYTE_CEILING {
                result[unpacked_index] = self.steps[packed_index];
                unpacked_index += 1;
            }
        }
        result
    }

    /// Pack an unpacked array back into compact form.
    pub fn pack(&mut self, unpacked: &[StateId; BYTE_CEILING]) {
        self.ceilings.clear();
        self.steps.clear();

        let mut last_step = unpacked[0];
        for (i, &step) in unpacked.iter().enumerate() {
            if step != last_step {
                self.ceilings.push(i as u8);
                self.steps.push(last_step);
            }
            last_step = step;
        }
        self.ceilings.push(BYTE_CEILING as u8);
        self.steps.push(last_step);
    }

    /// Iterate over `(floor, ceiling, step)` for each packed range.
    pub fn ranges(&self) -> impl Iterator<Item = (usize, usize, StateId)> + '_ {
        let mut floor = 0usize;
        self.ceilings
            .iter()
            .zip(self.steps.iter())
            .map(move |(&ceiling, &step)| {
                let range = (floor, ceiling as usize, step);
                floor = ceiling as usize;
                range
            })
    }

    /// Copy this table with every state reference passed through `map`.
    pub fn remap(&self, map: impl Fn(StateId) -> StateId) -> SmallTable {
        let mut table = SmallTable {
            ceilings: self.ceilings.clone(),
            steps: self.steps.iter().map(|&s| map(s)).collect(),
            epsilons: self.epsilons.iter().map(|&s| map(s)).collect(),
            spinout: map(self.spinout),
        };
        // Distinct steps may have mapped onto the same state
        if table.steps.windows(2).any(|w| w[0] == w[1]) {
            let unpacked = table.unpack();
            table.pack(&unpacked);
        }
        table
    }

    /// Check the ceilings/steps invariants.
    pub fn is_well_formed(&self) -> bool {
        !self.ceilings.is_empty()
            && self.ceilings.len() == self.steps.len()
            && self.ceilings.windows(2).all(|w| w[0] < w[1])
            && self.ceilings.last().copied() == Some(BYTE_CEILING as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> StateId {
        StateId::from_index(n as usize)
    }

    #[test]
    fn test_new_table_goes_nowhere() {
        let table = SmallTable::new();
        assert!(table.step(b'a').is_none());
        assert!(table.step(VALUE_TERMINATOR).is_none());
        assert!(table.is_well_formed());
        assert!(table.has_no_byte_steps());
    }

    #[test]
    fn test_with_mappings() {
        let table = SmallTable::with_mappings(StateId::NONE, &[b'a', b'c'], &[id(1), id(2)]);
        assert_eq!(table.step(b'a'), id(1));
        assert!(table.step(b'b').is_none());
        assert_eq!(table.step(b'c'), id(2));
        assert!(table.step(0).is_none());
        assert!(table.is_well_formed());
    }

    #[test]
    fn test_with_mappings_at_edges() {
        let table =
            SmallTable::with_mappings(id(9), &[0, VALUE_TERMINATOR], &[id(1), id(2)]);
        assert_eq!(table.step(0), id(1));
        assert_eq!(table.step(1), id(9));
        assert_eq!(table.step(VALUE_TERMINATOR), id(2));
        assert_eq!(*table.ceilings.last().unwrap() as usize, BYTE_CEILING);
    }

    #[test]
    fn test_with_mappings_same_as_default_collapses() {
        let table = SmallTable::with_mappings(id(3), &[b'x'], &[id(3)]);
        assert_eq!(table.ceilings, vec![BYTE_CEILING as u8]);
    }

    #[test]
    fn test_set_step_and_default() {
        let mut table = SmallTable::new();
        table.set_step(b'q', id(4));
        assert_eq!(table.step(b'q'), id(4));
        assert!(table.step(b'r').is_none());

        table.set_default(id(5));
        assert_eq!(table.step(b'q'), id(5));
        assert_eq!(table.ceilings.len(), 1);

        table.set_step(b'q', id(6));
        assert_eq!(table.step(b'p'), id(5));
        assert_eq!(table.step(b'q'), id(6));
        assert_eq!(table.step(b'r'), id(5));
    }

    #[test]
    fn test_bytes_above_ceiling_go_nowhere() {
        let table = SmallTable::with_default(id(1));
        assert!(table.step(0xF6).is_none());
        assert!(table.step(0xFF).is_none());
    }

    #[test]
    #[should_panic(expected = "byte ceiling")]
    fn test_set_step_above_ceiling_panics() {
        let mut table = SmallTable::new();
        table.set_step(0xF7, id(1));
    }

    #[test]
    #[should_panic(expected = "final ceiling")]
    fn test_missing_final_ceiling_panics() {
        let table = SmallTable {
            ceilings: vec![0x10],
            steps: vec![StateId::NONE],
            epsilons: Vec::new(),
            spinout: StateId::NONE,
        };
        table.step(b'a');
    }

    #[test]
    fn test_unpack_pack_preserves_lookups() {
        let table = SmallTable::with_mappings(
            StateId::NONE,
            &[b'0', b'1', b'2', b'z'],
            &[id(1), id(1), id(2), id(3)],
        );
        let mut repacked = SmallTable::new();
        repacked.pack(&table.unpack());
        for byte in 0..BYTE_CEILING as u8 {
            assert_eq!(table.step(byte), repacked.step(byte));
        }
        // '0' and '1' share a range
        assert_eq!(repacked.ceilings.len(), table.ceilings.len());
    }

    #[test]
    fn test_ranges_cover_table() {
        let table = SmallTable::with_mappings(StateId::NONE, &[b'm'], &[id(7)]);
        let ranges: Vec<_> = table.ranges().collect();
        assert_eq!(
            ranges,
            vec![
                (0, b'm' as usize, StateId::NONE),
                (b'm' as usize, b'm' as usize + 1, id(7)),
                (b'm' as usize + 1, BYTE_CEILING, StateId::NONE),
            ]
        );
    }

    #[test]
    fn test_remap_coalesces() {
        let table = SmallTable::with_mappings(StateId::NONE, &[b'a', b'b'], &[id(1), id(2)]);
        let remapped = table.remap(|s| if s.is_none() { s } else { id(8) });
        assert_eq!(remapped.step(b'a'), id(8));
        assert_eq!(remapped.step(b'b'), id(8));
        assert_eq!(remapped.ceilings.len(), 3);
    }
}
