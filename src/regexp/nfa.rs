//! NFA construction from a parsed regexp tree.
//!
//! Thompson-style: the tree is compiled back to front, every piece writing
//! its states into the arena ahead of the state that follows it.
//!
//! - `?`: a splice state with epsilons to the atom and past it
//! - `*`: a loop state with epsilons to the atom (which returns to the loop)
//!   and to the exit
//! - `+`: the atom, then a loopback state with epsilons to the exit and back
//!   to the atom
//! - `{m,n}`, `{m,}`: the atom is compiled once into a `Template` and grafted
//!   per repetition
//! - `a|b`: branches compiled separately and unioned with `merge_fas`
//!
//! States that are still being wired up when other fragments are compiled
//! against them (loop states, template exits) always carry epsilons, so a
//! merge reaching them splices instead of copying a half-built table.

use super::parser::{Atom, QuantifiedAtom, RegexpBranch, RegexpRoot};
use super::runes::{
    canonical_name, make_dot_fa, make_rune_range_fa, rune_count, simplify_rune_range,
    validate_rune_range, RunePair,
};
use crate::automaton::{
    merge_fas, CompileContext, SmallTable, StateArena, StateId, Template, VALUE_TERMINATOR,
};
use crate::error::{CompileError, Result};

/// Build the fragment for a regexp.
///
/// With `for_field` the regexp describes the inside of a JSON string, so the
/// fragment is wrapped in quote bytes. Either way it ends with a step on
/// `VALUE_TERMINATOR` into `next`. On error the arena may hold unreachable
/// states; callers roll back with `StateArena::truncate`.
pub fn make_regexp_fa<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    root: &RegexpRoot,
    for_field: bool,
    next: StateId,
) -> Result<StateId> {
    let copies = expansion(root);
    let max = ctx.config.max_expansion;
    if copies > u64::from(max) {
        return Err(CompileError::ExpansionTooLarge { copies, max });
    }

    let terminator = arena.alloc_with_table(SmallTable::with_mappings(
        StateId::NONE,
        &[VALUE_TERMINATOR],
        &[next],
    ));
    if !for_field {
        return compile_root(ctx, arena, root, terminator);
    }

    let close_quote =
        arena.alloc_with_table(SmallTable::with_mappings(StateId::NONE, b"\"", &[terminator]));
    let body = compile_root(ctx, arena, root, close_quote)?;
    Ok(arena.alloc_with_table(SmallTable::with_mappings(StateId::NONE, b"\"", &[body])))
}

/// Build the fragment for a rune range: one rune from `rr`, then `next`.
///
/// Ranges of at least `shell_cache_min_runes` code points are built once per
/// distinct range and grafted from the shell cache.
pub fn compile_rune_range<X>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    rr: &[RunePair],
    next: StateId,
) -> Result<StateId> {
    compile_cached_range(ctx, arena, None, rr, next)
}

/// Like `compile_rune_range`, but a cached template is keyed by `name`
/// (a property escape such as `~P{Nd}`) rather than by its intervals.
pub fn compile_named_rune_range<X>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    name: &str,
    rr: &[RunePair],
    next: StateId,
) -> Result<StateId> {
    compile_cached_range(ctx, arena, Some(name), rr, next)
}

fn compile_cached_range<X>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    name: Option<&str>,
    rr: &[RunePair],
    next: StateId,
) -> Result<StateId> {
    validate_rune_range(rr)?;
    let simplified = simplify_rune_range(rr.to_vec());
    if rune_count(&simplified) < ctx.config.shell_cache_min_runes {
        return Ok(make_rune_range_fa(arena, &simplified, next));
    }

    let key = match name {
        Some(name) => name.to_string(),
        None => canonical_name(&simplified),
    };
    let template = ctx.shells.get_or_build(&key, || {
        let mut scratch: StateArena<()> = StateArena::new();
        let exit = Template::placeholder(&mut scratch);
        let entry = make_rune_range_fa(&mut scratch, &simplified, exit);
        Ok(Template::from_arena(&scratch, entry, exit))
    })?;
    Ok(template.graft(arena, next))
}

fn compile_root<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    root: &RegexpRoot,
    next: StateId,
) -> Result<StateId> {
    // The empty regexp matches the empty string
    let Some((first, rest)) = root.split_first() else {
        return Ok(next);
    };
    let mut union = compile_branch(ctx, arena, first, next)?;
    for branch in rest {
        let entry = compile_branch(ctx, arena, branch, next)?;
        union = merge_fas(arena, union, entry);
    }
    Ok(union)
}

fn compile_branch<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    branch: &RegexpBranch,
    next: StateId,
) -> Result<StateId> {
    let mut current = next;
    for qa in branch.iter().rev() {
        current = compile_piece(ctx, arena, qa, current)?;
    }
    Ok(current)
}

fn compile_atom<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    atom: &Atom,
    next: StateId,
) -> Result<StateId> {
    match atom {
        Atom::Dot => Ok(make_dot_fa(arena, next)),
        Atom::Runes(rr) => compile_rune_range(ctx, arena, rr, next),
        Atom::Group(root) => compile_root(ctx, arena, root, next),
        Atom::Property(prop) => {
            compile_named_rune_range(ctx, arena, &prop.name, &prop.runes, next)
        }
    }
}

fn compile_piece<X: Clone + Eq>(
    ctx: CompileContext<'_>,
    arena: &mut StateArena<X>,
    qa: &QuantifiedAtom,
    next: StateId,
) -> Result<StateId> {
    if qa.is_singleton() {
        return compile_atom(ctx, arena, &qa.atom, next);
    }
    if qa.max == Some(0) {
        return Ok(next);
    }
    check_bounds(ctx, qa)?;

    if qa.is_optional() {
        let entry = compile_atom(ctx, arena, &qa.atom, next)?;
        return Ok(arena.alloc_splice(&[entry, next]));
    }
    if qa.is_star() {
        let looping = arena.alloc_splice(&[next]);
        let entry = compile_atom(ctx, arena, &qa.atom, looping)?;
        arena[looping].table.epsilons = vec![entry, next];
        return Ok(looping);
    }
    if qa.is_plus() {
        let loopback = arena.alloc_splice(&[next]);
        let entry = compile_atom(ctx, arena, &qa.atom, loopback)?;
        arena[loopback].table.epsilons = vec![next, entry];
        return Ok(entry);
    }

    let template = atom_template(ctx, &qa.atom)?;
    let mut current = next;
    match qa.max {
        Some(max) => {
            for _ in qa.min..max {
                let entry = template.graft(arena, current);
                current = arena.alloc_splice(&[entry, next]);
            }
        }
        None => {
            let looping = arena.alloc_splice(&[next]);
            let entry = template.graft(arena, looping);
            arena[looping].table.epsilons = vec![entry, next];
            current = looping;
        }
    }
    for _ in 0..qa.min {
        current = template.graft(arena, current);
    }
    Ok(current)
}

/// Atom copies a tree unrolls to once every bounded repetition is grafted.
/// Nested repetitions multiply; the count saturates instead of overflowing.
fn expansion(root: &RegexpRoot) -> u64 {
    root.iter()
        .flatten()
        .fold(0u64, |total, qa| total.saturating_add(piece_expansion(qa)))
}

fn piece_expansion(qa: &QuantifiedAtom) -> u64 {
    let atom = match &qa.atom {
        Atom::Group(root) => expansion(root).max(1),
        _ => 1,
    };
    let copies = match qa.max {
        Some(max) => u64::from(max),
        None => u64::from(qa.min) + 1,
    };
    atom.saturating_mul(copies)
}

fn check_bounds(ctx: CompileContext<'_>, qa: &QuantifiedAtom) -> Result<()> {
    let limit = ctx.config.max_quantifier;
    for bound in std::iter::once(qa.min).chain(qa.max) {
        if bound > limit {
            return Err(CompileError::QuantifierTooLarge { bound, max: limit });
        }
    }
    if let Some(max) = qa.max {
        if max < qa.min {
            return Err(CompileError::Unsupported(format!(
                "quantifier {{{},{}}} with max below min",
                qa.min, max
            )));
        }
    }
    // A closure over something that matches nothing would loop without consuming
    if qa.max.is_none() && qa.atom.is_nullable() {
        return Err(CompileError::DegenerateClosure);
    }
    Ok(())
}

/// Compile `atom` once into a template for repeated grafting.
fn atom_template(ctx: CompileContext<'_>, atom: &Atom) -> Result<Template> {
    let mut scratch: StateArena<()> = StateArena::new();
    let exit = Template::placeholder(&mut scratch);
    let entry = compile_atom(ctx, &mut scratch, atom, exit)?;
    Ok(Template::from_arena(&scratch, entry, exit))
}
