//! Term representation and structural unification.
//!
//! A runtime [`Term`] is either a structural value (atom, integer, float,
//! compound) or a logical variable — a reference-counted binding cell.
//! Compiled database nodes never embed a live variable directly: a clause's
//! head and body reference their local variables as [`Term::Slot`] indices
//! into that clause's frame, a template that is untouched by any particular
//! activation. [`instantiate_slots`] turns a template into a live term by
//! substituting each slot with the matching fresh cell from a newly minted
//! frame (one `Vec<Var>` of `varcount` fresh cells per clause activation,
//! mirroring the original engine's `_create_context([None]*varcount)`).
//! Because every activation gets its own frame, a failed unification inside
//! it never needs to be undone — the cells it bound are simply dropped along
//! with the frame that owns them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A logical variable: a shared, mutable binding cell.
pub type Var = Rc<RefCell<Option<Term>>>;

/// A clause's local frame: one fresh cell per head/body variable, minted
/// once per activation.
pub type Frame = Vec<Var>;

/// Allocates a fresh, unbound variable cell.
pub fn fresh_var() -> Var {
    Rc::new(RefCell::new(None))
}

/// Allocates a fresh frame of `varcount` unbound cells.
pub fn fresh_frame(varcount: usize) -> Frame {
    (0..varcount).map(|_| fresh_var()).collect()
}

/// A term. `Slot` only ever appears inside a compiled database node's
/// argument templates — [`instantiate_slots`] must be applied before a
/// template reaches unification or any other runtime operation.
#[derive(Clone, Debug)]
pub enum Term {
    Atom(Rc<str>),
    Int(i64),
    Float(f64),
    Compound(Rc<str>, Rc<Vec<Term>>),
    Var(Var),
    Slot(usize),
}

/// Replaces every `Slot(i)` in `template` with `Var(frame[i].clone())`,
/// recursing into compound arguments. Leaves everything else unchanged.
pub fn instantiate_slots(template: &Term, frame: &Frame) -> Term {
    match template {
        Term::Slot(i) => Term::Var(frame[*i].clone()),
        Term::Compound(functor, args) => {
            let args = args.iter().map(|a| instantiate_slots(a, frame)).collect();
            Term::Compound(functor.clone(), Rc::new(args))
        }
        other => other.clone(),
    }
}

pub fn instantiate_slots_all(templates: &[Term], frame: &Frame) -> Vec<Term> {
    templates.iter().map(|t| instantiate_slots(t, frame)).collect()
}

impl Term {
    pub fn atom(name: impl Into<Rc<str>>) -> Term {
        Term::Atom(name.into())
    }

    pub fn compound(functor: impl Into<Rc<str>>, args: Vec<Term>) -> Term {
        Term::Compound(functor.into(), Rc::new(args))
    }

    pub fn var() -> Term {
        Term::Var(fresh_var())
    }

    /// Functor/arity signature, used for indexing and cache keys. Variables
    /// and numbers have no functor.
    pub fn functor_arity(&self) -> Option<(Rc<str>, usize)> {
        match self.walk() {
            Term::Atom(name) => Some((name, 0)),
            Term::Compound(name, args) => Some((name, args.len())),
            _ => None,
        }
    }

    /// Follows a chain of bound variables to the first non-variable term (or
    /// the innermost still-unbound variable). Does not recurse into compound
    /// arguments.
    pub fn walk(&self) -> Term {
        let mut current = self.clone();
        loop {
            match current {
                Term::Var(cell) => {
                    let bound = cell.borrow().clone();
                    match bound {
                        Some(next) => current = next,
                        None => return Term::Var(cell),
                    }
                }
                other => return other,
            }
        }
    }

    /// True if this term contains no unbound variables, after resolving
    /// bound ones.
    pub fn is_ground(&self) -> bool {
        match self.walk() {
            Term::Var(_) => false,
            Term::Slot(_) => unreachable!("Slot must be instantiated before is_ground is checked"),
            Term::Compound(_, args) => args.iter().all(Term::is_ground),
            _ => true,
        }
    }

    /// A hashable, structurally comparable key for this term. Bound variables
    /// resolve to their value; unbound variables compare and hash by the
    /// identity of their cell, matching the "local frame" semantics where two
    /// distinct unbound variables are never mistaken for each other.
    pub fn key(&self) -> TermKey {
        match self.walk() {
            Term::Atom(name) => TermKey::Atom(name),
            Term::Int(i) => TermKey::Int(i),
            Term::Float(f) => TermKey::Float(f.to_bits()),
            Term::Compound(name, args) => {
                TermKey::Compound(name, args.iter().map(Term::key).collect())
            }
            Term::Var(cell) => TermKey::Var(Rc::as_ptr(&cell) as usize),
            Term::Slot(_) => unreachable!("Slot must be instantiated before it is used as a key"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.walk() {
            Term::Atom(name) => write!(f, "{name}"),
            Term::Int(i) => write!(f, "{i}"),
            Term::Float(x) => write!(f, "{x}"),
            Term::Var(_) => write!(f, "_"),
            Term::Slot(i) => write!(f, "_S{i}"),
            Term::Compound(name, args) => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Structural key used by result sets and the definition cache. Produced by
/// [`Term::key`]; never constructed by hand.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TermKey {
    Atom(Rc<str>),
    Int(i64),
    Float(u64),
    Var(usize),
    Compound(Rc<str>, Vec<TermKey>),
}

/// A vector of terms forming a call or clause context. Once handed from a
/// callee to a parent as part of a result, the engine never rebinds it —
/// further unification only ever touches variables owned by a still-active
/// clause attempt.
pub type Context = Vec<Term>;

pub fn context_key(ctx: &[Term]) -> Vec<TermKey> {
    ctx.iter().map(Term::key).collect()
}

pub fn context_is_ground(ctx: &[Term]) -> bool {
    ctx.iter().all(Term::is_ground)
}

/// Freezes a context into an independent snapshot: every bound variable
/// resolves to its concrete value, and every still-unbound variable is
/// replaced with a brand-new cell of its own — shared within this one
/// snapshot (two positions that pointed at the same source cell still point
/// at the same fresh cell), but never shared with the source context or any
/// other snapshot taken from it.
///
/// This is how a result becomes safe to publish to a parent that may
/// receive several such results over time from the same in-flight call: the
/// original frame keeps evolving as sibling clause attempts run, but a
/// frozen context never changes under the caller.
pub fn freeze_context(ctx: &[Term]) -> Context {
    freeze_context_with_map(ctx).0
}

/// As [`freeze_context`], but also returns the source-cell-pointer → fresh
/// variable translation table, so a caller can translate other terms that
/// share variables with `ctx` into the same fresh cells.
pub fn freeze_context_with_map(ctx: &[Term]) -> (Context, HashMap<usize, Var>) {
    let mut map = HashMap::new();
    let frozen = ctx.iter().map(|t| freeze_term(t, &mut map)).collect();
    (frozen, map)
}

fn freeze_term(t: &Term, map: &mut HashMap<usize, Var>) -> Term {
    match t.walk() {
        Term::Var(cell) => {
            let ptr = Rc::as_ptr(&cell) as usize;
            let fresh = map.entry(ptr).or_insert_with(fresh_var).clone();
            Term::Var(fresh)
        }
        Term::Compound(f, args) => {
            let args2 = args.iter().map(|a| freeze_term(a, map)).collect();
            Term::Compound(f, Rc::new(args2))
        }
        other => other,
    }
}

/// Forks a clause frame: every already-bound cell is copied (recursively, so
/// nested variables shared within the frame stay shared in the fork) into a
/// fresh cell holding the same value, and every still-unbound cell gets a
/// brand new, independent cell. Used whenever the engine tries more than one
/// continuation from the same frame state — the frame itself has no trail to
/// undo bindings on backtracking, so each alternative continuation instead
/// gets its own fork and is free to bind the forked copies of the
/// still-unresolved variables without disturbing sibling alternatives.
pub fn fork_frame(frame: &Frame) -> Frame {
    let mut map = HashMap::new();
    frame
        .iter()
        .map(|cell| {
            let bound = cell.borrow().clone();
            match bound {
                None => fresh_var(),
                Some(value) => {
                    let frozen = freeze_term(&value, &mut map);
                    Rc::new(RefCell::new(Some(frozen)))
                }
            }
        })
        .collect()
}

/// Rewrites every variable in `t` that appears in `map` to the fresh cell it
/// was translated to by a prior [`freeze_context_with_map`] call, leaving
/// variables outside the map (local to some other frame) untouched.
pub fn translate_through_map(t: &Term, map: &HashMap<usize, Var>) -> Term {
    match t.walk() {
        Term::Var(cell) => {
            let ptr = Rc::as_ptr(&cell) as usize;
            match map.get(&ptr) {
                Some(fresh) => Term::Var(fresh.clone()),
                None => Term::Var(cell),
            }
        }
        Term::Compound(f, args) => {
            let args2 = args.iter().map(|a| translate_through_map(a, map)).collect();
            Term::Compound(f, Rc::new(args2))
        }
        other => other,
    }
}

/// Raised when two terms cannot be made structurally equal. Deliberately a
/// distinct type from `EngineError`: it never crosses an `execute` boundary,
/// it is always caught at the point of unification and converted into a
/// `complete` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnifyError;

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terms do not unify")
    }
}

impl std::error::Error for UnifyError {}

/// Binds `a` and `b` so that they become structurally identical, or returns
/// [`UnifyError`] leaving only the unbound variables touched so far (which
/// is safe: they belong to the still-failing activation and are never
/// observed again).
pub fn unify(a: &Term, b: &Term) -> Result<(), UnifyError> {
    let a = a.walk();
    let b = b.walk();
    match (&a, &b) {
        (Term::Var(va), Term::Var(vb)) => {
            if !Rc::ptr_eq(va, vb) {
                *va.borrow_mut() = Some(b.clone());
            }
            Ok(())
        }
        (Term::Var(v), _) => {
            *v.borrow_mut() = Some(b.clone());
            Ok(())
        }
        (_, Term::Var(v)) => {
            *v.borrow_mut() = Some(a.clone());
            Ok(())
        }
        (Term::Atom(x), Term::Atom(y)) if x == y => Ok(()),
        (Term::Int(x), Term::Int(y)) if x == y => Ok(()),
        (Term::Float(x), Term::Float(y)) if x.to_bits() == y.to_bits() => Ok(()),
        (Term::Compound(fx, ax), Term::Compound(fy, ay)) if fx == fy && ax.len() == ay.len() => {
            for (x, y) in ax.iter().zip(ay.iter()) {
                unify(x, y)?;
            }
            Ok(())
        }
        _ => Err(UnifyError),
    }
}

/// Unifies a call's arguments against a clause head's arguments, writing
/// bindings into `new_context` — the clause's freshly minted local frame.
/// Mirrors the original engine's `unify_call_head`.
pub fn unify_call_head(call_args: &[Term], head_args: &[Term]) -> Result<(), UnifyError> {
    if call_args.len() != head_args.len() {
        return Err(UnifyError);
    }
    for (c, h) in call_args.iter().zip(head_args.iter()) {
        unify(c, h)?;
    }
    Ok(())
}

/// A small closed arithmetic AST used for `Choice` probabilities that are
/// not literal constants (e.g. derived from earlier clause arguments).
#[derive(Clone, Debug)]
pub enum ProbExpr {
    Const(f64),
    Arg(usize),
    Add(Box<ProbExpr>, Box<ProbExpr>),
    Sub(Box<ProbExpr>, Box<ProbExpr>),
    Mul(Box<ProbExpr>, Box<ProbExpr>),
    Div(Box<ProbExpr>, Box<ProbExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticError;

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arithmetic error evaluating a probability expression")
    }
}

impl std::error::Error for ArithmeticError {}

fn term_to_f64(t: &Term) -> Result<f64, ArithmeticError> {
    match t.walk() {
        Term::Int(i) => Ok(i as f64),
        Term::Float(f) => Ok(f),
        _ => Err(ArithmeticError),
    }
}

/// Evaluates a probability expression against a grounded result tuple.
pub fn instantiate(expr: &ProbExpr, result: &[Term]) -> Result<f64, ArithmeticError> {
    match expr {
        ProbExpr::Const(c) => Ok(*c),
        ProbExpr::Arg(i) => result.get(*i).ok_or(ArithmeticError).and_then(term_to_f64),
        ProbExpr::Add(a, b) => Ok(instantiate(a, result)? + instantiate(b, result)?),
        ProbExpr::Sub(a, b) => Ok(instantiate(a, result)? - instantiate(b, result)?),
        ProbExpr::Mul(a, b) => Ok(instantiate(a, result)? * instantiate(b, result)?),
        ProbExpr::Div(a, b) => {
            let denom = instantiate(b, result)?;
            if denom == 0.0 {
                return Err(ArithmeticError);
            }
            Ok(instantiate(a, result)? / denom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_atoms() {
        assert!(unify(&Term::atom("a"), &Term::atom("a")).is_ok());
        assert!(unify(&Term::atom("a"), &Term::atom("b")).is_err());
    }

    #[test]
    fn unify_binds_variable() {
        let x = Term::var();
        unify(&x, &Term::Int(3)).unwrap();
        assert_eq!(x.walk().to_string(), "3");
    }

    #[test]
    fn unify_compound_recurses() {
        let x = Term::var();
        let a = Term::compound("f", vec![Term::Int(1), x.clone()]);
        let b = Term::compound("f", vec![Term::Int(1), Term::Int(2)]);
        unify(&a, &b).unwrap();
        assert_eq!(x.walk().to_string(), "2");
    }

    #[test]
    fn ground_check() {
        let x = Term::var();
        let t = Term::compound("f", vec![x.clone()]);
        assert!(!t.is_ground());
        unify(&x, &Term::Int(1)).unwrap();
        assert!(t.is_ground());
    }

    #[test]
    fn fork_frame_preserves_bound_and_isolates_unbound() {
        let frame = fresh_frame(2);
        unify(&Term::Var(frame[0].clone()), &Term::Int(7)).unwrap();
        let fork_a = fork_frame(&frame);
        let fork_b = fork_frame(&frame);
        assert_eq!(Term::Var(fork_a[0].clone()).to_string(), "7");
        unify(&Term::Var(fork_a[1].clone()), &Term::Int(1)).unwrap();
        unify(&Term::Var(fork_b[1].clone()), &Term::Int(2)).unwrap();
        assert_eq!(Term::Var(fork_a[1].clone()).to_string(), "1");
        assert_eq!(Term::Var(fork_b[1].clone()).to_string(), "2");
        assert!(frame[1].borrow().is_none());
    }

    #[test]
    fn instantiate_division_by_zero() {
        let e = ProbExpr::Div(Box::new(ProbExpr::Const(1.0)), Box::new(ProbExpr::Const(0.0)));
        assert!(instantiate(&e, &[]).is_err());
    }
}
