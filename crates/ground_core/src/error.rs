//! Error leaves owned by the core crate. Orchestration-level errors
//! (`EngineError`) live in `ground_pipeline`; this module only holds the
//! failures that can occur while manipulating terms and compiled nodes in
//! isolation, so that `ground_algo` and `ground_pipeline` can both depend on
//! them without a cycle.

pub use crate::term::{ArithmeticError, UnifyError};

/// Raised when a probabilistic clause's ground-ness precondition is
/// violated: a `Choice` node was reached with a non-`locvars` argument that
/// is still unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonGroundProbabilisticClause;

impl std::fmt::Display for NonGroundProbabilisticClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "probabilistic clause has a non-ground argument outside its choice variables")
    }
}

impl std::error::Error for NonGroundProbabilisticClause {}
