//! Engine-wide configuration.

/// What to do when a call references a functor/arity with no compiled
/// definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Raise [`crate::EngineError::UnknownClause`].
    Error,
    /// Treat the call as failing silently (zero solutions).
    Fail,
}

impl Default for UnknownPolicy {
    fn default() -> Self {
        UnknownPolicy::Error
    }
}

/// Knobs threaded through every `execute`/`call` invocation.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub unknown: UnknownPolicy,
    /// Label every derived ground node with its functor/arity term, not
    /// just nodes reachable from the top-level query.
    pub label_all: bool,
    /// Emit `tracing::trace!` spans for cycle establishment/root swaps in
    /// addition to the `debug!` span around the whole trampoline loop.
    pub trace: bool,
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            unknown: UnknownPolicy::default(),
            label_all: false,
            trace: false,
            debug: false,
        }
    }
}
