//! Algorithm layer for the grounding engine: the goal-keyed dictionary, the
//! result-deduplication set, the evaluation-record variants, and the
//! transform chain. Depends only on `ground_core` — no engine orchestration
//! or I/O lives here.

pub mod nested_dict;
pub mod records;
pub mod result_set;
pub mod transforms;

pub use nested_dict::NestedDict;
pub use records::{
    AndRecord, CallRecord, DefineRecord, EvalRecord, JoinRecord, NodeBase, NotRecord, OrRecord, Waiter,
};
pub use result_set::ResultSet;
pub use transforms::Transformations;
