//! Orchestration-level errors: everything that can unwind an `execute`
//! call. Deliberately does not include [`ground_core::UnifyError`] — that
//! failure is always caught at the point of unification and turned into a
//! `complete` message before it could ever reach here.

use ground_core::{ArithmeticError, NonGroundProbabilisticClause};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("negative cycle through negation-as-failure (in {functor})")]
    NegativeCycle { functor: String },

    #[error("cycle through an indirect call (call/N) is not supported (in {functor})")]
    IndirectCallCycleError { functor: String },

    #[error("no clause for {functor}/{arity}")]
    UnknownClause { functor: String, arity: usize },

    #[error(transparent)]
    NonGroundProbabilisticClause(#[from] NonGroundProbabilisticClause),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error("invalid engine state: {0}")]
    InvalidEngineState(String),
}
