//! The built-in predicate integration contract.
//!
//! Implementing the standard built-in library (arithmetic comparisons,
//! `findall`, `call/N`, type tests, ...) is out of scope here — this module
//! only defines the seam a caller plugs such predicates into: a built-in is
//! a deterministic function from arguments to zero or more result tuples.
//! Probabilistic and cycle-aware built-ins (the original engine's
//! `SimpleProbabilisticBuiltIn`, and `call/N`'s cycle support) are not
//! representable through this minimal contract; see `DESIGN.md`.

use crate::term::{ArithmeticError, Context, Term};

pub enum BuiltinOutcome {
    /// Zero or more result tuples, one per solution, each the same arity as
    /// the call.
    Results(Vec<Context>),
    Fail,
}

pub trait BuiltIn {
    fn call(&self, args: &[Term]) -> Result<BuiltinOutcome, ArithmeticError>;
}

/// A built-in backed by a plain Rust closure, for the common case of a
/// function with no state of its own.
pub struct FnBuiltIn<F>(pub F)
where
    F: Fn(&[Term]) -> Result<BuiltinOutcome, ArithmeticError>;

impl<F> BuiltIn for FnBuiltIn<F>
where
    F: Fn(&[Term]) -> Result<BuiltinOutcome, ArithmeticError>,
{
    fn call(&self, args: &[Term]) -> Result<BuiltinOutcome, ArithmeticError> {
        (self.0)(args)
    }
}
