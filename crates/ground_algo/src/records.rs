//! Evaluation-record variants.
//!
//! Each variant is the live state of one in-flight node on the engine's
//! stack (the Python original's `EvalOr`/`EvalDefine`/`EvalNot`/`EvalAnd`
//! class hierarchy). These structs hold only data: the `newResult`/
//! `complete`/cycle-closing behaviour that reads and mutates engine-wide
//! state (the stack, the definition cache, the ground target) lives in
//! `ground_pipeline`'s executor, which is the only thing that holds all the
//! records at once.

use std::rc::Rc;

use ground_core::{Context, Frame, GroundNodeId, NodeId, TermKey};

use crate::result_set::ResultSet;
use crate::transforms::Transformations;

/// Fields shared by every record kind.
pub struct NodeBase {
    pub db_node: NodeId,
    pub context: Context,
    pub parent: Option<usize>,
    pub identifier: Option<usize>,
    pub transform: Transformations,
    pub pointer: usize,
    /// Set by a cycle walk (`createCycle` in the original engine) that
    /// passed through this record on its way from a re-entrant caller up to
    /// the `Define` it re-entered. An on-cycle `Or`/`Define` streams each
    /// result to its parent as soon as it arrives rather than buffering
    /// until `to_complete` reaches zero, since the record it is waiting on
    /// may itself never finish through the ordinary route.
    pub on_cycle: bool,
}

/// A conjunction in progress. Holds one outstanding unit for the left
/// conjunct itself, plus one more for every left result that has spawned a
/// [`JoinRecord`] to evaluate the right conjunct against it; reaches zero
/// (and forwards `complete` to `base.parent`) only once the left conjunct is
/// done *and* every join it spawned has finished.
pub struct AndRecord {
    pub base: NodeBase,
    pub right_child: NodeId,
    pub frame: Option<Rc<Frame>>,
    pub to_complete: usize,
}

/// Evaluates the right conjunct for one specific result of the left
/// conjunct. A fresh join is spawned per left result because the left
/// conjunct's frame may still have unresolved variables the right conjunct
/// goes on to bind differently for each one.
///
/// `base.parent` points back at the owning [`AndRecord`] — a join's
/// `complete` decrements the conjunction's outstanding-unit count, it does
/// not itself reach the conjunction's consumer. Combined results instead go
/// straight to `real_parent`, skipping the `AndRecord` entirely.
pub struct JoinRecord {
    pub base: NodeBase,
    pub real_parent: Option<usize>,
    pub left_node: GroundNodeId,
}

/// A dispatched predicate call, parked on the stack so each result the
/// callee produces (arriving in the callee's own argument shape, with cells
/// independent of the caller's) can be unified back against this call's
/// arguments in the *caller's* frame before the caller's full surrounding
/// context is republished upward. Mirrors the original engine's
/// `result_transform` closure built in `eval_call`.
pub struct CallRecord {
    pub base: NodeBase,
    pub call_args: Context,
    /// True for a `call/N`-style meta-call dispatch. A cycle walk that
    /// crosses an indirect call can never be safely re-entered, so it is
    /// reported as `IndirectCallCycleError` rather than folded into tabling.
    pub indirect: bool,
}

pub struct OrRecord {
    pub base: NodeBase,
    pub results: ResultSet<GroundNodeId>,
    pub to_complete: usize,
}

pub struct NotRecord {
    pub base: NodeBase,
    pub nodes: std::collections::HashSet<GroundNodeId>,
}

/// A caller parked on a still-active `Define` it tried to re-enter (the
/// original engine's `is_cycle_child` relay node, collapsed here into a
/// plain record rather than a second stack slot). `notified` is set once
/// this waiter has received its one-and-only result-and-complete (a ground
/// goal can prove at most one distinct answer) or has been force-completed
/// by [`crate::DefineRecord::is_cycle_root`]'s `closeCycle`.
pub struct Waiter {
    pub parent: Option<usize>,
    pub transform: Transformations,
    pub identifier: Option<usize>,
    pub notified: bool,
}

/// A tabled predicate evaluation. `is_cycle_root` is set the first time some
/// other in-flight call re-enters this same functor/args while it is still
/// active; such callers are parked in `waiters` rather than re-evaluating
/// the clauses. From that point on every result this definition produces is
/// collapsed into a mutable `Or` node immediately (rather than buffered
/// until `to_complete` reaches zero) and streamed straight to each waiter —
/// the original engine's `cycleDetected`/`newResult`-on-cycle protocol.
/// Waiters still pending once this record's own clauses are exhausted (or
/// once the whole action queue drains with this record still the open
/// cycle, for a clause that can never complete on its own) are
/// force-completed — `closeCycle` in the original.
pub struct DefineRecord {
    pub base: NodeBase,
    pub functor: Rc<str>,
    pub args_key: Vec<TermKey>,
    pub results: ResultSet<GroundNodeId>,
    pub to_complete: usize,
    pub is_cycle_root: bool,
    pub waiters: Vec<Waiter>,
    /// Frozen at activation from the call's own arguments. A ground goal
    /// can have at most one distinct answer, so a waiter on a ground
    /// definition is completed as soon as its first (only) result arrives
    /// instead of waiting for the whole cycle to close.
    pub is_ground: bool,
}

pub enum EvalRecord {
    And(AndRecord),
    Join(JoinRecord),
    Call(CallRecord),
    Or(OrRecord),
    Not(NotRecord),
    Define(DefineRecord),
}

impl EvalRecord {
    pub fn base(&self) -> &NodeBase {
        match self {
            EvalRecord::And(r) => &r.base,
            EvalRecord::Join(r) => &r.base,
            EvalRecord::Call(r) => &r.base,
            EvalRecord::Or(r) => &r.base,
            EvalRecord::Not(r) => &r.base,
            EvalRecord::Define(r) => &r.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            EvalRecord::And(r) => &mut r.base,
            EvalRecord::Join(r) => &mut r.base,
            EvalRecord::Call(r) => &mut r.base,
            EvalRecord::Or(r) => &mut r.base,
            EvalRecord::Not(r) => &mut r.base,
            EvalRecord::Define(r) => &mut r.base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EvalRecord::And(_) => "And",
            EvalRecord::Join(_) => "Join",
            EvalRecord::Call(_) => "Call",
            EvalRecord::Or(_) => "Or",
            EvalRecord::Not(_) => "Not",
            EvalRecord::Define(_) => "Define",
        }
    }
}
