//! Programmatic construction of a compiled [`Database`].
//!
//! There is no parser here — callers build a program node by node, the way
//! a compiler's back end would. `ground_cli`'s demo program and this crate's
//! own tests both go through this API.

use std::rc::Rc;

use ground_core::{
    BuiltIn, BuiltinId, CallTarget, ClauseIndex, Database, DbNode, GroupId, NodeId, ProbExpr, Term,
};

#[derive(Default)]
pub struct DatabaseBuilder {
    nodes: Vec<DbNode>,
    defines: Vec<(Rc<str>, usize, NodeId)>,
    builtins: Vec<Box<dyn BuiltIn>>,
    next_group: u32,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        DatabaseBuilder::default()
    }

    fn push(&mut self, node: DbNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn add_fact(&mut self, args: Vec<Term>, probability: Option<ProbExpr>) -> NodeId {
        self.push(DbNode::Fact { args, probability })
    }

    pub fn add_conjunction(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.push(DbNode::Conjunction { left, right })
    }

    pub fn add_disjunction(&mut self, children: Vec<NodeId>) -> NodeId {
        self.push(DbNode::Disjunction { children })
    }

    pub fn add_negation(&mut self, child: NodeId) -> NodeId {
        self.push(DbNode::Negation { child })
    }

    pub fn add_clause(&mut self, head_args: Vec<Term>, child: NodeId, varcount: usize) -> NodeId {
        self.push(DbNode::Clause { head_args, child, varcount })
    }

    pub fn add_call(&mut self, functor: impl Into<Rc<str>>, args: Vec<Term>, target: CallTarget) -> NodeId {
        self.push(DbNode::Call { functor: functor.into(), args, target })
    }

    /// Allocates a fresh mutual-exclusion group for a probabilistic choice
    /// construct (ProbLog's annotated disjunction).
    pub fn new_choice_group(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        id
    }

    pub fn add_choice(
        &mut self,
        group: GroupId,
        choice: usize,
        probability: ProbExpr,
        locvars: Vec<usize>,
    ) -> NodeId {
        self.push(DbNode::Choice { group, choice, probability, locvars })
    }

    /// Registers a built-in under `functor/arity`, returning the
    /// [`CallTarget`] a [`Self::add_call`] site should use to dispatch to it.
    pub fn add_builtin(&mut self, builtin: Box<dyn BuiltIn>) -> CallTarget {
        let id = BuiltinId(self.builtins.len() as u32);
        self.builtins.push(builtin);
        CallTarget::BuiltIn(id)
    }

    /// Declares a predicate's clause set. `clauses` lists the already-built
    /// `Fact`/`Clause`/`Choice` node ids, each with the first argument of its
    /// head (for indexing), or `None` when it has no discriminating head
    /// argument (a 0-arity predicate, or one whose head starts with a
    /// variable).
    pub fn define(&mut self, functor: impl Into<Rc<str>>, arity: usize, clauses: Vec<(NodeId, Option<Term>)>) -> NodeId {
        let id = self.reserve_define(functor, arity);
        self.finalize_define(id, clauses);
        id
    }

    /// Allocates a `Define` node's id up front, before its clause set is
    /// known, and registers it under `functor`/`arity` immediately. A
    /// recursive predicate's own clauses reference this id (via
    /// [`Self::add_call`]'s `CallTarget::Goto`) before [`Self::finalize_define`]
    /// fills in the real clause index.
    pub fn reserve_define(&mut self, functor: impl Into<Rc<str>>, arity: usize) -> NodeId {
        let functor: Rc<str> = functor.into();
        let id = self.push(DbNode::Define { functor: functor.clone(), arity, clauses: ClauseIndex::default() });
        self.defines.push((functor, arity, id));
        id
    }

    /// Fills in the clause set for a `Define` node previously allocated by
    /// [`Self::reserve_define`].
    pub fn finalize_define(&mut self, id: NodeId, clauses: Vec<(NodeId, Option<Term>)>) {
        let mut index = ClauseIndex::default();
        for (node, first_arg) in clauses {
            index.push(node, first_arg.as_ref());
        }
        let (functor, arity) = match &self.nodes[id.0 as usize] {
            DbNode::Define { functor, arity, .. } => (functor.clone(), *arity),
            _ => unreachable!("finalize_define called on a non-Define node"),
        };
        self.nodes[id.0 as usize] = DbNode::Define { functor, arity, clauses: index };
    }

    /// Looks up a previously reserved or defined predicate's node id, for
    /// wiring up a recursive or mutually-recursive `CallTarget::Goto` before
    /// the database is built.
    pub fn find_define(&self, functor: &str, arity: usize) -> Option<NodeId> {
        self.defines
            .iter()
            .find(|(f, a, _)| f.as_ref() == functor && *a == arity)
            .map(|(_, _, id)| *id)
    }

    pub fn build(self) -> CompiledDatabase {
        CompiledDatabase { nodes: self.nodes, defines: self.defines, builtins: self.builtins }
    }
}

pub struct CompiledDatabase {
    nodes: Vec<DbNode>,
    defines: Vec<(Rc<str>, usize, NodeId)>,
    builtins: Vec<Box<dyn BuiltIn>>,
}

impl Database for CompiledDatabase {
    fn get_node(&self, id: NodeId) -> &DbNode {
        &self.nodes[id.0 as usize]
    }

    fn find_define(&self, functor: &str, arity: usize) -> Option<NodeId> {
        self.defines
            .iter()
            .find(|(f, a, _)| f.as_ref() == functor && *a == arity)
            .map(|(_, _, id)| *id)
    }

    fn get_builtin(&self, id: BuiltinId) -> &dyn BuiltIn {
        self.builtins[id.0 as usize].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_define_matches_functor_and_arity() {
        let mut b = DatabaseBuilder::new();
        let fact = b.add_fact(vec![Term::Int(1)], None);
        b.define("p", 1, vec![(fact, Some(Term::Int(1)))]);
        let db = b.build();
        assert!(db.find_define("p", 1).is_some());
        assert!(db.find_define("p", 2).is_none());
        assert!(db.find_define("q", 1).is_none());
    }
}
