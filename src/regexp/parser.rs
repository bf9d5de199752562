//! Regexp parsing for I-Regexp (RFC 9485 subset).
//!
//! Parses a regexp string into a tree for NFA construction. Supported:
//! - `.` matches any character
//! - `[...]` character classes with ranges, `[^...]` negated classes
//! - `|` alternation, `(...)` and `(?:...)` grouping
//! - `?`, `+`, `*` and `{m}`, `{m,}`, `{m,n}` quantifiers
//!
//! - `~p{..}` and `~P{..}` Unicode categories and blocks
//!
//! The escape character is `~` (not `\`) to avoid JSON escaping issues.
//! Lookarounds are recognized so they can be reported, but they are not
//! implemented.

use std::fmt;

use super::properties::property_ranges;
use super::runes::{invert_rune_range, simplify_rune_range, RunePair, RuneRange};
use crate::error::{CompileError, RegexpError};

/// The escape character (~ instead of \ to avoid JSON escaping).
const ESCAPE: char = '~';

/// What a single quantified piece matches once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// `.`: any one rune
    Dot,
    /// One rune from the set
    Runes(RuneRange),
    /// A parenthesized subexpression
    Group(RegexpRoot),
    /// One rune with (or, for `~P`, without) a Unicode property
    Property(Property),
}

/// A resolved `~p{..}` or `~P{..}` escape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// The escape as written, e.g. `~P{Nd}`. Stable, so it keys the shell cache.
    pub name: String,
    pub runes: RuneRange,
}

impl Atom {
    /// True if the atom can match without consuming a rune.
    pub fn is_nullable(&self) -> bool {
        match self {
            Atom::Dot | Atom::Runes(_) | Atom::Property(_) => false,
            Atom::Group(root) => root.is_empty() || root.iter().any(branch_is_nullable),
        }
    }
}

/// An atom with its repetition bounds. `max == None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantifiedAtom {
    pub atom: Atom,
    pub min: u32,
    pub max: Option<u32>,
}

impl QuantifiedAtom {
    pub fn once(atom: Atom) -> Self {
        Self {
            atom,
            min: 1,
            max: Some(1),
        }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.min == 1 && self.max == Some(1)
    }

    /// `?`
    #[inline]
    pub fn is_optional(&self) -> bool {
        self.min == 0 && self.max == Some(1)
    }

    /// `*`
    #[inline]
    pub fn is_star(&self) -> bool {
        self.min == 0 && self.max.is_none()
    }

    /// `+`
    #[inline]
    pub fn is_plus(&self) -> bool {
        self.min == 1 && self.max.is_none()
    }

    pub fn is_nullable(&self) -> bool {
        self.min == 0 || self.atom.is_nullable()
    }
}

/// A sequence of pieces.
pub type RegexpBranch = Vec<QuantifiedAtom>;

/// Alternatives separated by `|`. An empty root matches the empty string.
pub type RegexpRoot = Vec<RegexpBranch>;

fn branch_is_nullable(branch: &RegexpBranch) -> bool {
    branch.iter().all(QuantifiedAtom::is_nullable)
}

/// Syntax the parser understands but the automaton builder does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexpFeature {
    Lookahead,
    NegativeLookahead,
    Lookbehind,
    NegativeLookbehind,
}

impl fmt::Display for RegexpFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegexpFeature::Lookahead => "(?=...)",
            RegexpFeature::NegativeLookahead => "(?!...)",
            RegexpFeature::Lookbehind => "(?<=...)",
            RegexpFeature::NegativeLookbehind => "(?<!...)",
        };
        f.write_str(name)
    }
}

/// Parser state.
struct RegexpParse<'a> {
    src: &'a str,
    index: usize,
    last_index: usize,
    found_features: Vec<RegexpFeature>,
}

impl<'a> RegexpParse<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            index: 0,
            last_index: 0,
            found_features: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.index..].chars().next()
    }

    fn next_rune(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.last_index = self.index;
        self.index += c.len_utf8();
        Some(c)
    }

    /// Next rune, with running out reported as `context`.
    fn require_rune(&mut self, context: &str) -> Result<char, RegexpError> {
        self.next_rune()
            .ok_or_else(|| RegexpError::new(context, self.index))
    }

    fn require(&mut self, wanted: char) -> Result<(), RegexpError> {
        match self.next_rune() {
            Some(got) if got == wanted => Ok(()),
            Some(got) => Err(RegexpError::new(
                format!("expected '{}', got '{}'", wanted, got),
                self.last_index,
            )),
            None => Err(RegexpError::new(
                format!("expected '{}', got end of string", wanted),
                self.index,
            )),
        }
    }

    fn bypass_optional(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.next_rune();
            true
        } else {
            false
        }
    }

    fn bypass_str(&mut self, s: &str) -> bool {
        if self.src[self.index..].starts_with(s) {
            self.last_index = self.index;
            self.index += s.len();
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.index >= self.src.len()
    }

    fn record_feature(&mut self, feature: RegexpFeature) {
        if !self.found_features.contains(&feature) {
            self.found_features.push(feature);
        }
    }
}

/// Parse a regexp string into a tree.
///
/// Syntax errors come back as `CompileError::Regexp`; well-formed uses of
/// unimplemented features as `CompileError::Unsupported`.
pub fn parse_regexp(re: &str) -> Result<RegexpRoot, CompileError> {
    let mut parse = RegexpParse::new(re);
    if parse.is_empty() {
        return Ok(Vec::new());
    }

    let tree = read_branches(&mut parse)?;
    if let Some(c) = parse.next_rune() {
        // Only a stray ')' stops the top level early
        return Err(RegexpError::new(format!("unbalanced '{}'", c), parse.last_index).into());
    }

    if !parse.found_features.is_empty() {
        let names: Vec<String> = parse.found_features.iter().map(|f| f.to_string()).collect();
        return Err(CompileError::Unsupported(names.join(", ")));
    }
    Ok(tree)
}

/// Read branches separated by `|`, up to a `)` or the end.
fn read_branches(parse: &mut RegexpParse<'_>) -> Result<RegexpRoot, RegexpError> {
    let mut tree = Vec::new();
    loop {
        tree.push(read_branch(parse)?);
        if !parse.bypass_optional('|') {
            return Ok(tree);
        }
    }
}

/// Read pieces until something that cannot start an atom.
fn read_branch(parse: &mut RegexpParse<'_>) -> Result<RegexpBranch, RegexpError> {
    let mut branch = Vec::new();
    while let Some(atom) = read_atom(parse)? {
        branch.push(read_quantifier(parse, atom)?);
    }
    Ok(branch)
}

/// Check if a character is a "normal" character (not special).
fn is_normal_char(c: char) -> bool {
    matches!(c as u32,
        0x00..=0x27 | 0x2C | 0x2D | 0x2F..=0x3E | 0x40..=0x5A | 0x5C | 0x5E..=0x7A
        | 0x7F..=0xD7FF | 0xE000..=0x10FFFF)
}

/// Single-rune escapes: `~n`, `~r`, `~t` and escaped metacharacters.
fn check_single_char_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '(' | ')' | '*' | '+' | '-' | '.' | '?' | '[' | '\\' | ']' | '^' | '{' | '|' | '}' => {
            Some(c)
        }
        ESCAPE => Some(ESCAPE),
        _ => None,
    }
}

const DIGITS: [RunePair; 1] = [RunePair { lo: '0', hi: '9' }];
const WORD: [RunePair; 4] = [
    RunePair { lo: '0', hi: '9' },
    RunePair { lo: 'A', hi: 'Z' },
    RunePair { lo: '_', hi: '_' },
    RunePair { lo: 'a', hi: 'z' },
];
const SPACE: [RunePair; 3] = [
    RunePair { lo: '\t', hi: '\n' },
    RunePair { lo: '\r', hi: '\r' },
    RunePair { lo: ' ', hi: ' ' },
];

/// Class escapes: `~d ~D ~w ~W ~s ~S`.
fn check_multi_char_escape(c: char) -> Option<RuneRange> {
    match c {
        'd' => Some(DIGITS.to_vec()),
        'D' => Some(invert_rune_range(DIGITS.to_vec())),
        'w' => Some(WORD.to_vec()),
        'W' => Some(invert_rune_range(WORD.to_vec())),
        's' => Some(SPACE.to_vec()),
        'S' => Some(invert_rune_range(SPACE.to_vec())),
        _ => None,
    }
}

/// Read an atom. `None` means the branch ends here.
fn read_atom(parse: &mut RegexpParse<'_>) -> Result<Option<Atom>, RegexpError> {
    let Some(b) = parse.peek() else {
        return Ok(None);
    };
    if b == '|' || b == ')' {
        return Ok(None);
    }
    parse.next_rune();

    let atom = match b {
        c if is_normal_char(c) => Atom::Runes(vec![RunePair::single(c)]),
        '.' => Atom::Dot,
        '(' => read_group(parse)?,
        '[' => Atom::Runes(read_char_class_expr(parse)?),
        ']' => return Err(RegexpError::new("invalid ']'", parse.last_index)),
        ESCAPE => {
            let next = parse.require_rune("'~' at end of regular expression")?;
            if let Some(escaped) = check_single_char_escape(next) {
                Atom::Runes(vec![RunePair::single(escaped)])
            } else if let Some(runes) = check_multi_char_escape(next) {
                Atom::Runes(runes)
            } else if next == 'p' || next == 'P' {
                Atom::Property(read_property(parse, next == 'P')?)
            } else {
                return Err(RegexpError::new(
                    format!("invalid character '{}' after '{}'", next, ESCAPE),
                    parse.last_index,
                ));
            }
        }
        _ => {
            // '?', '+', '*', '{' with nothing to quantify
            return Err(RegexpError::new(
                format!("invalid character '{}' (quantifier without atom)", b),
                parse.last_index,
            ));
        }
    };
    Ok(Some(atom))
}

/// Read the rest of a group after its `(`.
fn read_group(parse: &mut RegexpParse<'_>) -> Result<Atom, RegexpError> {
    let open = parse.last_index;
    if parse.bypass_str("?:") {
        // non-capturing; groups never capture here anyway
    } else if parse.bypass_str("?=") {
        parse.record_feature(RegexpFeature::Lookahead);
    } else if parse.bypass_str("?!") {
        parse.record_feature(RegexpFeature::NegativeLookahead);
    } else if parse.bypass_str("?<=") {
        parse.record_feature(RegexpFeature::Lookbehind);
    } else if parse.bypass_str("?<!") {
        parse.record_feature(RegexpFeature::NegativeLookbehind);
    }

    let subtree = read_branches(parse)?;
    if !parse.bypass_optional(')') {
        return Err(RegexpError::new("unclosed '('", open));
    }
    Ok(Atom::Group(subtree))
}

/// Read `{Name}` after `~p` or `~P` and resolve it.
fn read_property(parse: &mut RegexpParse<'_>, negated: bool) -> Result<Property, RegexpError> {
    parse.require('{')?;
    let start = parse.index;
    loop {
        match parse.require_rune("unclosed property name")? {
            '}' => break,
            c if c.is_ascii_alphanumeric() || c == '-' => {}
            c => {
                return Err(RegexpError::new(
                    format!("invalid character '{}' in property name", c),
                    parse.last_index,
                ))
            }
        }
    }
    if parse.last_index == start {
        return Err(RegexpError::new("empty property name", start));
    }

    let name = &parse.src[start..parse.last_index];
    let runes = property_ranges(name).ok_or_else(|| {
        RegexpError::new(format!("unknown Unicode property '{}'", name), start)
    })?;
    let marker = if negated { 'P' } else { 'p' };
    Ok(Property {
        name: format!("{}{}{{{}}}", ESCAPE, marker, name),
        runes: if negated { invert_rune_range(runes) } else { runes },
    })
}

/// Read a character class expression after its `[`.
fn read_char_class_expr(parse: &mut RegexpParse<'_>) -> Result<RuneRange, RegexpError> {
    let is_negated = parse.bypass_optional('^');
    let mut rr = read_cce1s(parse)?;

    // Trailing '-' before ']'
    if parse.bypass_optional('-') {
        rr.push(RunePair::single('-'));
    }
    parse.require(']')?;

    let rr = simplify_rune_range(rr);
    Ok(if is_negated { invert_rune_range(rr) } else { rr })
}

fn read_cce1s(parse: &mut RegexpParse<'_>) -> Result<RuneRange, RegexpError> {
    let mut rr = Vec::new();
    let mut first = true;
    loop {
        rr.extend(read_cce1(parse, first)?);
        first = false;
        match parse.peek() {
            Some('-') | Some(']') => return Ok(rr),
            Some(_) => {}
            None => return Err(RegexpError::new("unclosed character class", parse.index)),
        }
    }
}

/// Check if a character may appear unescaped in a character class.
fn is_cc_char(r: char) -> bool {
    matches!(r as u32, 0x00..=0x2C | 0x2E..=0x5A | 0x5C | 0x5E..=0xD7FF | 0xE000..=0x10FFFF)
}

/// Read one class element: a rune, a range or a class escape.
fn read_cce1(parse: &mut RegexpParse<'_>, first: bool) -> Result<RuneRange, RegexpError> {
    const UNCLOSED: &str = "unclosed character class";
    let r = parse.require_rune(UNCLOSED)?;

    let lo = if first && r == '-' {
        return Ok(vec![RunePair::single('-')]);
    } else if r == ESCAPE {
        let next = parse.require_rune(UNCLOSED)?;
        if next == 'p' || next == 'P' {
            return Ok(read_property(parse, next == 'P')?.runes);
        }
        // Class escapes can't be range endpoints
        if let Some(runes) = check_multi_char_escape(next) {
            return Ok(runes);
        }
        check_single_char_escape(next).ok_or_else(|| {
            RegexpError::new(
                format!("invalid character '{}' after {} in character class", next, ESCAPE),
                parse.last_index,
            )
        })?
    } else if is_cc_char(r) {
        r
    } else {
        return Err(RegexpError::new(
            format!("invalid character '{}' in character class", r),
            parse.last_index,
        ));
    };

    if parse.peek() != Some('-') {
        return Ok(vec![RunePair::single(lo)]);
    }
    parse.next_rune();

    // "x-]" is x and a literal '-'
    let range_end = parse.require_rune(UNCLOSED)?;
    if range_end == ']' {
        parse.index = parse.last_index;
        return Ok(vec![RunePair::single(lo), RunePair::single('-')]);
    }

    let hi = if range_end == ESCAPE {
        let escaped = parse.require_rune(UNCLOSED)?;
        check_single_char_escape(escaped).ok_or_else(|| {
            RegexpError::new(
                format!("invalid char '{}' after - in character class", escaped),
                parse.last_index,
            )
        })?
    } else if is_cc_char(range_end) {
        range_end
    } else {
        return Err(RegexpError::new(
            format!("invalid char '{}' in range", range_end),
            parse.last_index,
        ));
    };

    if lo > hi {
        return Err(RegexpError::new(
            format!("invalid range {}-{}", lo, hi),
            parse.last_index,
        ));
    }
    Ok(vec![RunePair::new(lo, hi)])
}

/// Read an optional quantifier (`?`, `*`, `+`, `{m,n}`) and a lazy `?`.
fn read_quantifier(parse: &mut RegexpParse<'_>, atom: Atom) -> Result<QuantifiedAtom, RegexpError> {
    let mut qa = QuantifiedAtom::once(atom);
    match parse.peek() {
        Some('*') => {
            qa.min = 0;
            qa.max = None;
        }
        Some('+') => qa.max = None,
        Some('?') => qa.min = 0,
        Some('{') => {}
        _ => return Ok(qa),
    }
    if parse.next_rune() == Some('{') {
        read_range_quantifier(parse, &mut qa)?;
    }
    // Laziness doesn't change which values match
    parse.bypass_optional('?');
    Ok(qa)
}

/// Read `m}`, `m,}` or `m,n}` after a `{`.
fn read_range_quantifier(
    parse: &mut RegexpParse<'_>,
    qa: &mut QuantifiedAtom,
) -> Result<(), RegexpError> {
    const UNEXPECTED_END: &str = "unexpected end of string in quantifier";

    let min = read_number(parse)?.ok_or_else(|| {
        RegexpError::new("invalid range quantifier, expecting digits", parse.index)
    })?;
    qa.min = min;
    qa.max = Some(min);

    match parse.require_rune(UNEXPECTED_END)? {
        '}' => return Ok(()),
        ',' => {}
        b => {
            return Err(RegexpError::new(
                format!("unexpected character '{}' in quantifier", b),
                parse.last_index,
            ))
        }
    }

    let max = read_number(parse)?;
    match parse.require_rune(UNEXPECTED_END)? {
        '}' => {}
        b => {
            return Err(RegexpError::new(
                format!("invalid character '{}', expected '}}'", b),
                parse.last_index,
            ))
        }
    }
    if let Some(max) = max {
        if max < min {
            return Err(RegexpError::new(
                "invalid range quantifier, top must be greater than bottom",
                parse.last_index,
            ));
        }
    }
    qa.max = max;
    Ok(())
}

fn read_number(parse: &mut RegexpParse<'_>) -> Result<Option<u32>, RegexpError> {
    let start = parse.index;
    while parse.peek().is_some_and(|c| c.is_ascii_digit()) {
        parse.next_rune();
    }
    if start == parse.index {
        return Ok(None);
    }
    parse.src[start..parse.index]
        .parse()
        .map(Some)
        .map_err(|_| RegexpError::new("number in quantifier is too large", start))
}
