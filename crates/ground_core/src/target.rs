//! The ground-formula sink contract.
//!
//! `ground_pipeline` only ever talks to a `dyn GroundTarget`; the concrete
//! in-memory sink (and anything downstream, such as a CNF writer) lives in
//! `ground_io`. Keeping the trait and its node id here — rather than in
//! `ground_io` — lets the pipeline crate depend on the contract without
//! depending on any particular sink implementation.

use std::fmt;

use crate::database::GroupId;

/// A node in the *output* ground formula (as opposed to [`crate::NodeId`],
/// which indexes the *input* compiled database).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroundNodeId(pub u32);

impl fmt::Display for GroundNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The constant "true" ground node: every target is expected to reserve it.
pub const NODE_TRUE: GroundNodeId = GroundNodeId(0);
/// The constant "false" ground node.
pub const NODE_FALSE: GroundNodeId = GroundNodeId(u32::MAX);

/// Sink for the propositional ground program the engine builds. Every
/// method returns `None` exactly when the produced node is trivially false
/// and the caller should treat the branch as failed rather than chase a
/// node id for it. Probabilities arrive already instantiated to a concrete
/// value — [`crate::instantiate`] resolves a `Choice`'s or probabilistic
/// `Fact`'s [`crate::ProbExpr`] against the grounded result before it ever
/// reaches a target.
pub trait GroundTarget {
    fn add_atom(&mut self, source: AtomSource, probability: Option<f64>) -> Option<GroundNodeId>;
    fn add_and(&mut self, children: &[GroundNodeId]) -> Option<GroundNodeId>;
    fn add_or(&mut self, children: &[GroundNodeId], readonly: bool) -> Option<GroundNodeId>;
    /// Adds `node` as an additional disjunct of an already-created `addOr`
    /// node (only valid while that node is not `readonly`).
    fn add_disjunct(&mut self, or_node: GroundNodeId, node: GroundNodeId);
    fn add_not(&mut self, child: GroundNodeId) -> GroundNodeId;
    fn add_name(&mut self, name: String, node: GroundNodeId, label: NameLabel);
}

/// Where an atom node originates, so a target can tell a plain fact from a
/// probabilistic-choice alternative (and group the latter for exclusivity).
#[derive(Clone, Debug)]
pub enum AtomSource {
    Fact { db_node: crate::NodeId },
    Choice { group: GroupId, choice: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameLabel {
    Named,
    Query,
    Evidence,
}
