//! Term representation, unification, and compiled clause-database node
//! types shared by the grounding engine's algorithm and pipeline layers.

pub mod builtin;
pub mod database;
pub mod error;
pub mod target;
pub mod term;

pub use builtin::{BuiltIn, BuiltinOutcome, FnBuiltIn};
pub use database::{BuiltinId, CallTarget, ClauseIndex, Database, DbNode, GroupId, NodeId};
pub use error::NonGroundProbabilisticClause;
pub use target::{AtomSource, GroundNodeId, GroundTarget, NameLabel, NODE_FALSE, NODE_TRUE};
pub use term::{
    context_is_ground, context_key, fork_frame, fresh_frame, fresh_var, freeze_context,
    freeze_context_with_map, instantiate, instantiate_slots, instantiate_slots_all,
    translate_through_map, unify, unify_call_head, ArithmeticError, Context, Frame, ProbExpr,
    Term, TermKey, UnifyError, Var,
};
