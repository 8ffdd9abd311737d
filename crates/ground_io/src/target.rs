//! An in-memory [`GroundTarget`] sink: the propositional ground formula the
//! engine builds, represented as a simple node DAG (no on-disk format; a CNF
//! or ProbLog-source writer would consume this structure, but producing one
//! is out of scope here).

use std::collections::HashSet;

use ground_core::{AtomSource, GroundNodeId, GroundTarget, NameLabel, NODE_FALSE, NODE_TRUE};

#[derive(Debug)]
enum Node {
    True,
    Atom { source: AtomSource, probability: Option<f64> },
    And(Vec<GroundNodeId>),
    Or { children: Vec<GroundNodeId>, readonly: bool },
    Not(GroundNodeId),
}

/// The ground formula produced by a completed query: every atom, gate, and
/// named node the engine derived.
#[derive(Default)]
pub struct GroundFormula {
    nodes: Vec<Node>,
    names: Vec<(String, GroundNodeId, NameLabel)>,
}

impl GroundFormula {
    pub fn new() -> Self {
        GroundFormula { nodes: vec![Node::True], names: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, GroundNodeId, NameLabel)> {
        self.names.iter().map(|(n, id, l)| (n.as_str(), *id, *l))
    }

    /// The atom's probability, if `node` is a probabilistic atom.
    pub fn probability(&self, node: GroundNodeId) -> Option<f64> {
        match self.nodes.get(node.0 as usize)? {
            Node::Atom { probability, .. } => *probability,
            _ => None,
        }
    }

    fn push(&mut self, node: Node) -> GroundNodeId {
        let id = GroundNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// A compact s-expression rendering of `node`, for debug output. A
    /// tabled positive cycle grounds to a genuinely self-referential `Or`
    /// (one that lists itself among its own children, however many `Or`s
    /// removed); revisiting a node already open further up the same walk
    /// prints a back-reference (`@<id>`) instead of recursing into it.
    pub fn describe(&self, node: GroundNodeId) -> String {
        let mut open = HashSet::new();
        self.describe_inner(node, &mut open)
    }

    fn describe_inner(&self, node: GroundNodeId, open: &mut HashSet<GroundNodeId>) -> String {
        if node == NODE_FALSE {
            return "false".to_string();
        }
        if !open.insert(node) {
            return format!("@{}", node.0);
        }
        let rendered = match &self.nodes[node.0 as usize] {
            Node::True => "true".to_string(),
            Node::Atom { source, probability } => match (source, probability) {
                (AtomSource::Fact { db_node }, Some(p)) => format!("{p}::fact#{}", db_node.0),
                (AtomSource::Fact { db_node }, None) => format!("fact#{}", db_node.0),
                (AtomSource::Choice { group, choice }, Some(p)) => {
                    format!("{p}::choice({},{})", group.0, choice)
                }
                (AtomSource::Choice { group, choice }, None) => format!("choice({},{})", group.0, choice),
            },
            Node::And(children) => {
                let parts: Vec<_> = children.iter().map(|c| self.describe_inner(*c, open)).collect();
                format!("and({})", parts.join(","))
            }
            Node::Or { children, .. } => {
                let parts: Vec<_> = children.iter().map(|c| self.describe_inner(*c, open)).collect();
                format!("or({})", parts.join(","))
            }
            Node::Not(child) => format!("not({})", self.describe_inner(*child, open)),
        };
        open.remove(&node);
        rendered
    }

    /// The direct children of an `Or` node, or `None` if `node` is not one.
    /// Used to check self-reference without walking into a cycle the way
    /// [`Self::describe`] guards against.
    pub fn or_children(&self, node: GroundNodeId) -> Option<&[GroundNodeId]> {
        match self.nodes.get(node.0 as usize)? {
            Node::Or { children, .. } => Some(children),
            _ => None,
        }
    }
}

impl GroundTarget for GroundFormula {
    fn add_atom(&mut self, source: AtomSource, probability: Option<f64>) -> Option<GroundNodeId> {
        if probability == Some(0.0) {
            return None;
        }
        Some(self.push(Node::Atom { source, probability }))
    }

    fn add_and(&mut self, children: &[GroundNodeId]) -> Option<GroundNodeId> {
        if children.iter().any(|c| *c == NODE_FALSE) {
            return None;
        }
        let kept: Vec<_> = children.iter().copied().filter(|c| *c != NODE_TRUE).collect();
        match kept.len() {
            0 => Some(NODE_TRUE),
            1 => Some(kept[0]),
            _ => Some(self.push(Node::And(kept))),
        }
    }

    fn add_or(&mut self, children: &[GroundNodeId], readonly: bool) -> Option<GroundNodeId> {
        if children.iter().any(|c| *c == NODE_TRUE) {
            return Some(NODE_TRUE);
        }
        let kept: Vec<_> = children.iter().copied().filter(|c| *c != NODE_FALSE).collect();
        if readonly {
            match kept.len() {
                0 => None,
                1 => Some(kept[0]),
                _ => Some(self.push(Node::Or { children: kept, readonly: true })),
            }
        } else {
            Some(self.push(Node::Or { children: kept, readonly: false }))
        }
    }

    fn add_disjunct(&mut self, or_node: GroundNodeId, node: GroundNodeId) {
        if node == NODE_FALSE {
            return;
        }
        if let Some(Node::Or { children, readonly }) = self.nodes.get_mut(or_node.0 as usize) {
            if !*readonly {
                children.push(node);
            }
        }
    }

    fn add_not(&mut self, child: GroundNodeId) -> GroundNodeId {
        if child == NODE_TRUE {
            return NODE_FALSE;
        }
        if child == NODE_FALSE {
            return NODE_TRUE;
        }
        if let Node::Not(inner) = &self.nodes[child.0 as usize] {
            return *inner;
        }
        self.push(Node::Not(child))
    }

    fn add_name(&mut self, name: String, node: GroundNodeId, label: NameLabel) {
        self.names.push((name, node, label));
    }
}

/// Looks up a name's node by exact string match; `ground_cli` uses this to
/// report the query's answer after a run.
pub fn find_named<'a>(formula: &'a GroundFormula, name: &str) -> Option<(GroundNodeId, NameLabel)> {
    formula.names.iter().find(|(n, _, _)| n == name).map(|(_, id, l)| (*id, *l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_core::NodeId;

    #[test]
    fn zero_probability_atom_is_trivially_false() {
        let mut f = GroundFormula::new();
        let node = f.add_atom(AtomSource::Fact { db_node: NodeId(0) }, Some(0.0));
        assert_eq!(node, None);
    }

    #[test]
    fn and_with_false_child_is_trivially_false() {
        let mut f = GroundFormula::new();
        let a = f.add_atom(AtomSource::Fact { db_node: NodeId(0) }, None).unwrap();
        assert_eq!(f.add_and(&[a, NODE_FALSE]), None);
    }

    #[test]
    fn or_collapses_single_readonly_child() {
        let mut f = GroundFormula::new();
        let a = f.add_atom(AtomSource::Fact { db_node: NodeId(0) }, None).unwrap();
        assert_eq!(f.add_or(&[a], true), Some(a));
    }

    #[test]
    fn double_negation_cancels() {
        let mut f = GroundFormula::new();
        let a = f.add_atom(AtomSource::Fact { db_node: NodeId(0) }, None).unwrap();
        let not_a = f.add_not(a);
        assert_eq!(f.add_not(not_a), a);
    }

    #[test]
    fn add_disjunct_extends_a_live_or_node() {
        let mut f = GroundFormula::new();
        let a = f.add_atom(AtomSource::Fact { db_node: NodeId(0) }, None).unwrap();
        let b = f.add_atom(AtomSource::Fact { db_node: NodeId(1) }, None).unwrap();
        let or_node = f.add_or(&[a], false).unwrap();
        f.add_disjunct(or_node, b);
        assert!(f.describe(or_node).contains("or("));
    }
}
