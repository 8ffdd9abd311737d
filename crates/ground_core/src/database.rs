//! Compiled clause-database node types.
//!
//! The database is produced upstream (by a parser/compiler — out of scope
//! here) and handed to the engine as an immutable, indexable graph of
//! [`DbNode`]s. This module only defines the node shapes and the
//! [`Database`] access trait; building one is `ground_io`'s job.

use std::fmt;
use std::rc::Rc;

use crate::term::{ProbExpr, Term};

/// Index of a node in a compiled [`Database`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifies a registered built-in predicate by functor/arity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u32);

/// Identifies the probabilistic-choice group a `Choice` node belongs to
/// (mutually exclusive alternatives share a group).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// What a `Call` node's compiled target resolves to. The original engine
/// encodes these as small negative integers (`-1` true, `-2`/`-3`
/// fail/false, `-5` `\=`, `-6` `findall`); we give each its own variant so
/// the dispatch is exhaustive and cannot silently mis-decode a sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallTarget {
    /// Ordinary call: jump to another compiled node (a `define`, `clause`,
    /// or nested control node).
    Goto(NodeId),
    /// A meta-call (`call/N`): jumps to `NodeId` exactly like `Goto`, but the
    /// resulting call site cannot be folded into a tabled cycle. A cycle
    /// walk that has to cross one fails with `IndirectCallCycleError`
    /// instead of parking a waiter, since the call's target is computed
    /// rather than a static clause reference the tabling protocol can
    /// re-enter safely.
    Indirect(NodeId),
    /// Dispatch to a registered built-in.
    BuiltIn(BuiltinId),
    /// Always succeeds with the call's own arguments.
    True,
    /// Always fails.
    Fail,
    /// `\=`: succeeds iff the two arguments do *not* unify.
    NotEqual,
}

/// A single node of the compiled program.
#[derive(Clone, Debug)]
pub enum DbNode {
    /// A deterministic or probabilistic fact: `node.args` must unify with
    /// the call context; `probability` is `None` for a plain (certain) fact.
    Fact {
        args: Vec<Term>,
        probability: Option<ProbExpr>,
    },
    /// Binary conjunction; larger conjunctions are compiled as a chain.
    Conjunction { left: NodeId, right: NodeId },
    /// N-ary disjunction.
    Disjunction { children: Vec<NodeId> },
    /// Negation-as-failure over a single child.
    Negation { child: NodeId },
    /// A predicate definition: the set of candidate clauses for a given
    /// functor/arity, indexed by their first argument.
    Define {
        functor: Rc<str>,
        arity: usize,
        clauses: ClauseIndex,
    },
    /// A call site: arguments as written by the caller, plus the compiled
    /// target it resolves to.
    Call {
        functor: Rc<str>,
        args: Vec<Term>,
        target: CallTarget,
    },
    /// A clause body, reached via a `Define`'s clause index. `varcount`
    /// fresh variables are minted for each activation before the head is
    /// unified against the caller's arguments.
    Clause {
        head_args: Vec<Term>,
        child: NodeId,
        varcount: usize,
    },
    /// One alternative of a probabilistic choice.
    Choice {
        group: GroupId,
        choice: usize,
        probability: ProbExpr,
        /// Indices into the result tuple that are local to this choice
        /// (exempt from the "every non-choice argument must be ground"
        /// check).
        locvars: Vec<usize>,
    },
}

/// First-argument indexing over a `Define`'s clauses. Clauses are always
/// returned in source order; the index only prunes candidates that provably
/// cannot unify, it never reorders.
#[derive(Clone, Debug, Default)]
pub struct ClauseIndex {
    clauses: Vec<NodeId>,
    /// Parallel to `clauses`: a first-argument discriminant, or `None` if
    /// the clause's first argument is a variable (always a candidate).
    keys: Vec<Option<FirstArgKey>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum FirstArgKey {
    Atom(Rc<str>),
    Int(i64),
    FloatBits(u64),
    Functor(Rc<str>, usize),
}

fn first_arg_key(t: &Term) -> Option<FirstArgKey> {
    match t.walk() {
        Term::Atom(a) => Some(FirstArgKey::Atom(a)),
        Term::Int(i) => Some(FirstArgKey::Int(i)),
        Term::Float(f) => Some(FirstArgKey::FloatBits(f.to_bits())),
        Term::Compound(f, args) => Some(FirstArgKey::Functor(f, args.len())),
        Term::Var(_) => None,
        Term::Slot(_) => None,
    }
}

impl ClauseIndex {
    pub fn push(&mut self, node: NodeId, head_first_arg: Option<&Term>) {
        self.clauses.push(node);
        self.keys.push(head_first_arg.and_then(first_arg_key));
    }

    /// Returns the clauses that might unify with `call_args`, in source
    /// order. If the call's first argument is unbound, every clause is a
    /// candidate.
    pub fn find(&self, call_args: &[Term]) -> Vec<NodeId> {
        let call_key = call_args.first().and_then(first_arg_key);
        match call_key {
            None => self.clauses.clone(),
            Some(k) => self
                .clauses
                .iter()
                .zip(self.keys.iter())
                .filter(|(_, ck)| ck.as_ref().map_or(true, |ck| *ck == k))
                .map(|(n, _)| *n)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Read-only access to a compiled program. Implemented by `ground_io`'s
/// in-memory builder; this crate only defines the contract.
pub trait Database {
    fn get_node(&self, id: NodeId) -> &DbNode;
    /// Looks up the `Define` node for a functor/arity, if one was compiled.
    fn find_define(&self, functor: &str, arity: usize) -> Option<NodeId>;
    fn get_builtin(&self, id: BuiltinId) -> &dyn crate::builtin::BuiltIn;
}
