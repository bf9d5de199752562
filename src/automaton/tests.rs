use super::*;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{CompileError, Result};
use crate::regexp::{compile_rune_range, make_regexp_fa, parse_regexp, RunePair};

/// Route engine logs to the test harness; `RUST_LOG=quamina_core=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Builder = fn(&mut StateArena<u32>, StateId) -> Result<StateId>;

/// Compile one fragment ending in a match state carrying `1`.
fn single(
    build: impl FnOnce(&mut StateArena<u32>, StateId) -> Result<StateId>,
) -> (StateArena<u32>, StateId) {
    let mut arena = StateArena::new();
    let done = arena.alloc_match(1);
    let start = build(&mut arena, done).unwrap();
    (arena, start)
}

fn nfa_matches(arena: &StateArena<u32>, start: StateId, val: &[u8]) -> Vec<u32> {
    let closures = EpsilonClosures::new(arena.len());
    let mut out = Vec::new();
    traverse_nfa(arena, &closures, start, val, &mut NfaBuffers::new(), &mut out);
    out.sort();
    out
}

fn dfa_matches(arena: &StateArena<u32>, start: StateId, val: &[u8]) -> Vec<u32> {
    let mut out = Vec::new();
    traverse_dfa(arena, start, val, &mut out);
    out.sort();
    out
}

/// Check a fragment against expected outcomes through both engines.
fn check(arena: &StateArena<u32>, start: StateId, cases: &[(&str, bool)]) {
    let (dfa, dfa_start) = determinize(arena, start);
    for &(val, expected) in cases {
        let want: Vec<u32> = if expected { vec![1] } else { vec![] };
        assert_eq!(nfa_matches(arena, start, val.as_bytes()), want, "nfa on {}", val);
        assert_eq!(dfa_matches(&dfa, dfa_start, val.as_bytes()), want, "dfa on {}", val);
    }
}

fn regexp_fa(arena: &mut StateArena<u32>, re: &str, next: StateId) -> Result<StateId> {
    let config = EngineConfig::default();
    let shells = ShellCache::new();
    let ctx = CompileContext {
        config: &config,
        shells: &shells,
    };
    make_regexp_fa(ctx, arena, &parse_regexp(re)?, true, next)
}

#[test]
fn test_string_fa() {
    let (arena, start) = single(|a, next| make_string_fa(a, br#""abc""#, next));
    assert!(arena.is_deterministic(start));
    check(
        &arena,
        start,
        &[(r#""abc""#, true), (r#""abd""#, false), (r#""ab""#, false), (r#""abcd""#, false)],
    );
}

#[test]
fn test_prefix_fa() {
    let (arena, start) = single(|a, next| make_prefix_fa(a, br#""ab"#, next));
    check(
        &arena,
        start,
        &[(r#""ab""#, true), (r#""abc""#, true), (r#""a""#, false), (r#""ac""#, false)],
    );
}

#[test]
fn test_shellstyle_positions() {
    let (arena, start) = single(|a, next| make_shellstyle_fa(a, br#""*bc""#, next));
    check(
        &arena,
        start,
        &[(r#""abc""#, true), (r#""bc""#, true), (r#""bcbc""#, true), (r#""bcd""#, false)],
    );

    let (arena, start) = single(|a, next| make_shellstyle_fa(a, br#""a*c""#, next));
    check(
        &arena,
        start,
        &[(r#""ac""#, true), (r#""abbbc""#, true), (r#""acac""#, true), (r#""acb""#, false)],
    );

    let (arena, start) = single(|a, next| make_shellstyle_fa(a, br#""ab*""#, next));
    check(&arena, start, &[(r#""ab""#, true), (r#""abxyz""#, true), (r#""a""#, false)]);
}

#[test]
fn test_shellstyle_middle_glob_nfa_and_dfa() {
    let (arena, start) = single(|a, next| make_shellstyle_fa(a, br#""a*bc""#, next));
    check(
        &arena,
        start,
        &[
            (r#""abc""#, true),
            (r#""axybc""#, true),
            (r#""abcbc""#, true),
            (r#""abd""#, false),
            (r#""fooac""#, false),
        ],
    );
}

/// Whether `val` matches a glob with at most one `*`.
fn glob_reference(glob: &str, val: &str) -> bool {
    match glob.split_once('*') {
        Some((prefix, suffix)) => {
            val.len() >= prefix.len() + suffix.len()
                && val.starts_with(prefix)
                && val.ends_with(suffix)
        }
        None => glob == val,
    }
}

#[test]
fn test_union_of_globs_matches_reference() {
    let globs = ["a*b", "ab*", "*ab"];
    let mut arena: StateArena<u32> = StateArena::new();
    let mut start = StateId::NONE;
    for (x, glob) in (1..).zip(globs) {
        let done = arena.alloc_match(x);
        let quoted = format!("\"{}\"", glob);
        let entry = make_shellstyle_fa(&mut arena, quoted.as_bytes(), done).unwrap();
        start = merge_fas(&mut arena, start, entry);
    }
    let (dfa, dfa_start) = determinize(&arena, start);

    for val in [
        "", "a", "b", "ab", "ba", "aab", "abb", "abab", "bab", "xab", "abx", "axb", "aaxbb", "bba",
        "abba", "xyz",
    ] {
        let expected: Vec<u32> = (1..)
            .zip(globs)
            .filter(|(_, glob)| glob_reference(glob, val))
            .map(|(x, _)| x)
            .collect();
        let quoted = format!("\"{}\"", val);
        assert_eq!(nfa_matches(&arena, start, quoted.as_bytes()), expected, "nfa on {}", val);
        assert_eq!(dfa_matches(&dfa, dfa_start, quoted.as_bytes()), expected, "dfa on {}", val);
    }
}

#[test]
fn test_wildcard_fa() {
    let (arena, start) = single(|a, next| make_wildcard_fa(a, br#""a*b*c""#, next));
    check(
        &arena,
        start,
        &[(r#""abc""#, true), (r#""axxbyyc""#, true), (r#""acb""#, false), (r#""abcx""#, false)],
    );

    // Escaped star is a literal
    let (arena, start) = single(|a, next| make_wildcard_fa(a, br#""a\*b*""#, next));
    check(
        &arena,
        start,
        &[(r#""a*b""#, true), (r#""a*bxyz""#, true), (r#""axbxyz""#, false)],
    );
}

#[test]
fn test_monocase_fa() {
    let (arena, start) = single(|a, next| make_monocase_fa(a, r#""Hello""#.as_bytes(), next));
    check(
        &arena,
        start,
        &[(r#""hello""#, true), (r#""HELLO""#, true), (r#""hElLo""#, true), (r#""help""#, false)],
    );
}

#[test]
fn test_monocase_different_byte_lengths() {
    // U+023F is two bytes, its uppercase U+2C7E is three
    let (arena, start) = single(|a, next| make_monocase_fa(a, "\"x\u{23F}\"".as_bytes(), next));
    check(
        &arena,
        start,
        &[
            ("\"x\u{23F}\"", true),
            ("\"X\u{23F}\"", true),
            ("\"x\u{2C7E}\"", true),
            ("\"X\u{2C7E}\"", true),
            ("\"x\u{23E}\"", false),
            ("\"x\"", false),
        ],
    );

    let (arena, start) = single(|a, next| make_monocase_fa(a, "\"ſ\"".as_bytes(), next));
    check(&arena, start, &[("\"ſ\"", true), ("\"s\"", true), ("\"S\"", true), ("\"t\"", false)]);
}

#[test]
fn test_monocase_follows_simple_folding() {
    // Kelvin sign and k fold together
    let (arena, start) = single(|a, next| make_monocase_fa(a, "\"k\"".as_bytes(), next));
    check(
        &arena,
        start,
        &[("\"k\"", true), ("\"K\"", true), ("\"\u{212A}\"", true), ("\"x\"", false)],
    );

    // Dotless i only matches itself
    let (arena, start) = single(|a, next| make_monocase_fa(a, "\"\u{131}\"".as_bytes(), next));
    check(
        &arena,
        start,
        &[("\"\u{131}\"", true), ("\"i\"", false), ("\"I\"", false)],
    );

    let vm = ValueMatcher::new();
    vm.add_pattern(&Pattern::EqualsIgnoreCase(b"\"i\"".to_vec()), 1)
        .unwrap();
    assert_eq!(vm.matches("\"I\"".as_bytes()), vec![1]);
    assert!(vm.matches("\"\u{131}\"".as_bytes()).is_empty());
    assert!(vm.matches("\"\u{130}\"".as_bytes()).is_empty());
}

#[test]
fn test_anything_but_fa() {
    let excluded = vec![br#""foo""#.to_vec(), br#""bar""#.to_vec()];
    let (arena, start) = single(|a, next| make_anything_but_fa(a, &excluded, next));
    check(
        &arena,
        start,
        &[
            (r#""foo""#, false),
            (r#""bar""#, false),
            (r#""baz""#, true),
            (r#""fo""#, true),
            (r#""fooo""#, true),
            (r#""x""#, true),
        ],
    );
}

#[test]
fn test_union_reports_every_matching_pattern() {
    let mut arena: StateArena<u32> = StateArena::new();
    let builders: [(u32, Builder); 4] = [
        (1, |a, n| make_string_fa(a, br#""cat""#, n)),
        (2, |a, n| make_shellstyle_fa(a, br#""c*""#, n)),
        (3, |a, n| make_monocase_fa(a, br#""CAT""#, n)),
        (4, |a, n| regexp_fa(a, "c[a-z]t", n)),
    ];
    let mut start = StateId::NONE;
    for (x, build) in builders {
        let done = arena.alloc_match(x);
        let entry = build(&mut arena, done).unwrap();
        start = merge_fas(&mut arena, start, entry);
    }

    let (dfa, dfa_start) = determinize(&arena, start);
    for (val, expected) in [
        (r#""cat""#, vec![1, 2, 3, 4]),
        (r#""cot""#, vec![2, 4]),
        (r#""Cat""#, vec![3]),
        (r#""c""#, vec![2]),
        (r#""dog""#, vec![]),
    ] {
        assert_eq!(nfa_matches(&arena, start, val.as_bytes()), expected, "nfa on {}", val);
        assert_eq!(dfa_matches(&dfa, dfa_start, val.as_bytes()), expected, "dfa on {}", val);
    }
}

#[test]
fn test_regexp_dot_over_every_encoding_length() {
    let (arena, start) = single(|a, next| regexp_fa(a, "a.b", next));
    check(
        &arena,
        start,
        &[
            ("\"axb\"", true),
            ("\"aéb\"", true),
            ("\"a中b\"", true),
            ("\"a😀b\"", true),
            ("\"ab\"", false),
            ("\"axxb\"", false),
            ("\"a中中b\"", false),
        ],
    );
}

#[test]
fn test_regexp_quantifiers_end_to_end() {
    let (arena, start) = single(|a, next| regexp_fa(a, "(ab)+c?~d{2,3}", next));
    check(
        &arena,
        start,
        &[
            ("\"ab12\"", true),
            ("\"ababc123\"", true),
            ("\"c12\"", false),
            ("\"ab1\"", false),
            ("\"ab1234\"", false),
        ],
    );
}

#[test]
fn test_rune_range_fa() {
    let config = EngineConfig::default();
    let shells = ShellCache::new();
    let ctx = CompileContext {
        config: &config,
        shells: &shells,
    };
    let rr = vec![RunePair::new('a', 'c'), RunePair::new('é', 'ê'), RunePair::single('😀')];
    let (arena, start) = single(|a, next| {
        let term = a.alloc_with_table(SmallTable::with_mappings(
            StateId::NONE,
            &[VALUE_TERMINATOR],
            &[next],
        ));
        compile_rune_range(ctx, a, &rr, term)
    });
    check(
        &arena,
        start,
        &[("b", true), ("ê", true), ("😀", true), ("d", false), ("ë", false), ("bb", false)],
    );
}

#[test]
fn test_cyclic_automata_terminate_with_bounded_states() {
    let mut arena: StateArena<u32> = StateArena::new();
    let mut start = StateId::NONE;
    for (x, re) in [(1, "(ab)*"), (2, "(a|b)*c"), (3, "a+b+")] {
        let done = arena.alloc_match(x);
        let entry = regexp_fa(&mut arena, re, done).unwrap();
        start = merge_fas(&mut arena, start, entry);
    }

    let (dfa, dfa_start) = determinize(&arena, start);
    assert!(dfa.len() < 40, "{} DFA states", dfa.len());
    assert!(dfa.is_deterministic(dfa_start));

    for (val, expected) in [
        (r#""""#, vec![1]),
        (r#""abab""#, vec![1]),
        (r#""abc""#, vec![2]),
        (r#""aabb""#, vec![3]),
        (r#""ab""#, vec![1, 3]),
        (r#""ba""#, vec![]),
    ] {
        assert_eq!(nfa_matches(&arena, start, val.as_bytes()), expected, "nfa on {}", val);
        assert_eq!(dfa_matches(&dfa, dfa_start, val.as_bytes()), expected, "dfa on {}", val);
    }

    // Determinizing again gives the same shape
    let (again, _) = determinize(&arena, start);
    assert_eq!(again.len(), dfa.len());
}

#[test]
fn test_closure_properties() {
    let mut arena: StateArena<u32> = StateArena::new();
    let done = arena.alloc_match(1);
    let start = regexp_fa(&mut arena, "(a?b*|c+){1,3}d", done).unwrap();
    let closures = EpsilonClosures::new(arena.len());

    for id in arena.reachable(start) {
        let closure = closures.get(&arena, id);
        // Cached closures match a fresh computation
        assert_eq!(closure, epsilon_closure(&arena, id).as_slice());
        for &member in closure {
            // Members never point outside the closure they came from
            for inner in closures.get(&arena, member) {
                assert!(closure.contains(inner), "{:?} -> {:?} -> {:?}", id, member, inner);
            }
            assert!(!arena.is_epsilon_only(member));
        }
    }
}

#[test]
fn test_value_matcher_rejects_without_publishing() {
    init_tracing();
    let vm: ValueMatcher<u32> = ValueMatcher::new();
    vm.add_pattern(&Pattern::Exact(br#""ok""#.to_vec()), 1)
        .unwrap();
    let before = vm.automaton();

    for bad in [
        Pattern::Wildcard(br#""a**""#.to_vec()),
        Pattern::RuneRange(vec![RunePair::new('z', 'a')]),
        Pattern::Exact(vec![b'"', 0xFE, b'"']),
    ] {
        assert!(vm.add_pattern(&bad, 2).is_err(), "{:?}", bad);
    }
    assert!(matches!(
        Pattern::regexp("(?=x)"),
        Err(CompileError::Unsupported(_))
    ));
    assert!(matches!(Pattern::regexp("(x"), Err(CompileError::Regexp(_))));

    assert!(Arc::ptr_eq(&before, &vm.automaton()));
    assert_eq!(vm.matches(br#""ok""#), vec![1]);
}

#[test]
fn test_value_matcher_rune_range_and_anything_but() {
    let vm = ValueMatcher::new();
    vm.add_pattern(&Pattern::RuneRange(vec![RunePair::new('0', '9')]), "digit")
        .unwrap();
    vm.add_pattern(&Pattern::AnythingBut(vec![br#""5""#.to_vec()]), "not-five")
        .unwrap();

    let mut got = vm.matches(br#""4""#);
    got.sort();
    assert_eq!(got, vec!["digit", "not-five"]);
    assert_eq!(vm.matches(br#""5""#), vec!["digit"]);
    assert_eq!(vm.matches(br#""x""#), vec!["not-five"]);
}

#[test]
fn test_value_matcher_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ValueMatcher<String>>();
    assert_send_sync::<Automaton<u64>>();
    assert_send_sync::<ShellCache>();
}

#[test]
fn test_concurrent_readers_see_complete_snapshots() {
    let vm: ValueMatcher<u32> = ValueMatcher::new();
    vm.add_pattern(&Pattern::Exact(br#""v0""#.to_vec()), 0)
        .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut bufs = NfaBuffers::new();
                let mut out = Vec::new();
                for _ in 0..200 {
                    let snapshot = vm.automaton();
                    out.clear();
                    snapshot.matches_into(br#""v0""#, &mut bufs, &mut out);
                    // The first pattern is in every snapshot
                    assert_eq!(out, vec![0]);
                }
            });
        }
        scope.spawn(|| {
            for i in 1..50u32 {
                let val = format!(r#""v{}""#, i).into_bytes();
                vm.add_pattern(&Pattern::Exact(val), i).unwrap();
            }
        });
    });

    assert_eq!(vm.pattern_count(), 50);
    assert_eq!(vm.matches(br#""v49""#), vec![49]);
}

#[test]
fn test_nfa_and_dfa_agree_on_mixed_patterns() {
    let mut arena: StateArena<u32> = StateArena::new();
    let builders: [(u32, Builder); 6] = [
        (1, |a, n| make_shellstyle_fa(a, br#""*.txt""#, n)),
        (2, |a, n| make_wildcard_fa(a, br#""*a*""#, n)),
        (3, |a, n| make_prefix_fa(a, br#""re"#, n)),
        (4, |a, n| regexp_fa(a, "[^a]*~.txt", n)),
        (5, |a, n| regexp_fa(a, "(re|ab)+.?", n)),
        (6, |a, n| make_monocase_fa(a, "\"README.TXT\"".as_bytes(), n)),
    ];
    let mut start = StateId::NONE;
    for (x, build) in builders {
        let done = arena.alloc_match(x);
        let entry = build(&mut arena, done).unwrap();
        start = merge_fas(&mut arena, start, entry);
    }

    let (dfa, dfa_start) = determinize(&arena, start);
    for val in [
        "\"readme.txt\"",
        "\"README.TXT\"",
        "\"notes.txt\"",
        "\"rerere\"",
        "\"abab!\"",
        "\"a\"",
        "\"\"",
        "\"中.txt\"",
        "\"re\"",
        "\"xyz\"",
    ] {
        assert_eq!(
            nfa_matches(&arena, start, val.as_bytes()),
            dfa_matches(&dfa, dfa_start, val.as_bytes()),
            "value {}",
            val
        );
    }
    assert_eq!(dfa_matches(&dfa, dfa_start, "\"readme.txt\"".as_bytes()), vec![1, 2, 3, 6]);
}
