//! The trampoline's message protocol: `eval`, `result` (`r`), and
//! `complete` (`c`) from the original stack-based engine, typed instead of
//! passed as `(tag, target, args, kwargs)` tuples.

use std::rc::Rc;

use ground_algo::Transformations;
use ground_core::{Context, Frame, GroundNodeId, NodeId};

pub struct EvalRequest {
    pub node_id: NodeId,
    pub context: Context,
    pub parent: Option<usize>,
    pub identifier: Option<usize>,
    pub transform: Transformations,
    /// Human-readable `functor/arity` for error messages, set on the way
    /// into a `Call` node.
    pub call_origin: Option<String>,
    /// The enclosing clause activation's local frame, needed to instantiate
    /// any `Term::Slot` placeholders in `Fact`/`Call` argument templates
    /// reached while still walking that clause's body. `None` outside any
    /// clause body (a top-level query, or right after a `Define` dispatches
    /// into a fresh clause).
    pub frame: Option<Rc<Frame>>,
}

pub struct ResultMsg {
    /// `None` means this is a top-level solution.
    pub target: Option<usize>,
    pub result: Context,
    pub node: Option<GroundNodeId>,
    pub source: Option<usize>,
    pub is_last: bool,
}

pub struct CompleteMsg {
    pub target: Option<usize>,
    pub source: Option<usize>,
}

pub enum Action {
    Eval(EvalRequest),
    Result(ResultMsg),
    Complete(CompleteMsg),
}

impl Action {
    pub fn result(target: Option<usize>, result: Context, node: Option<GroundNodeId>, source: Option<usize>, is_last: bool) -> Action {
        Action::Result(ResultMsg { target, result, node, source, is_last })
    }

    pub fn complete(target: Option<usize>, source: Option<usize>) -> Action {
        Action::Complete(CompleteMsg { target, source })
    }
}
