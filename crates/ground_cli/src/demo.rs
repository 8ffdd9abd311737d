//! A small hard-coded probabilistic-logic program, built directly through
//! [`DatabaseBuilder`] rather than parsed from source. Exercises every
//! construct the engine supports: facts, a probabilistic choice, a plain
//! conjunctive rule, a disjunction, negation-as-failure, and a recursive
//! (tabled) predicate.
//!
//! ```text
//! parent(ann, bob).
//! parent(bob, cid).
//! parent(bob, dee).
//! 0.5::sibling_guess(bob, cid) ; 0.5::sibling_guess(bob, dee).
//! grandparent(X, Z) :- parent(X, Y), parent(Y, Z).
//! ancestor(X, X).
//! ancestor(X, Z) :- parent(X, Y), ancestor(Y, Z).
//! childless(X) :- \+ parent(X, _).
//! ```

use ground_core::{CallTarget, ProbExpr, Term};
use ground_io::{CompiledDatabase, DatabaseBuilder};

pub fn build() -> CompiledDatabase {
    let mut b = DatabaseBuilder::new();

    let p_ann_bob = b.add_fact(vec![Term::atom("ann"), Term::atom("bob")], None);
    let p_bob_cid = b.add_fact(vec![Term::atom("bob"), Term::atom("cid")], None);
    let p_bob_dee = b.add_fact(vec![Term::atom("bob"), Term::atom("dee")], None);
    b.define(
        "parent",
        2,
        vec![
            (p_ann_bob, Some(Term::atom("ann"))),
            (p_bob_cid, Some(Term::atom("bob"))),
            (p_bob_dee, Some(Term::atom("bob"))),
        ],
    );
    let parent_node = b.find_define("parent", 2).unwrap();

    // 0.5::sibling_guess(bob, cid) ; 0.5::sibling_guess(bob, dee).
    let group = b.new_choice_group();
    let guess_cid = b.add_choice(group, 0, ProbExpr::Const(0.5), vec![]);
    let guess_dee = b.add_choice(group, 1, ProbExpr::Const(0.5), vec![]);
    b.define(
        "sibling_guess",
        2,
        vec![(guess_cid, Some(Term::atom("bob"))), (guess_dee, Some(Term::atom("bob")))],
    );

    // grandparent(X, Z) :- parent(X, Y), parent(Y, Z).
    let gp_left = b.add_call("parent", vec![Term::Slot(0), Term::Slot(1)], CallTarget::Goto(parent_node));
    let gp_right = b.add_call("parent", vec![Term::Slot(1), Term::Slot(2)], CallTarget::Goto(parent_node));
    let gp_body = b.add_conjunction(gp_left, gp_right);
    let gp_clause = b.add_clause(vec![Term::Slot(0), Term::Slot(2)], gp_body, 3);
    b.define("grandparent", 2, vec![(gp_clause, None)]);

    // ancestor(X, X). / ancestor(X, Z) :- parent(X, Y), ancestor(Y, Z).
    let ancestor_node = b.reserve_define("ancestor", 2);
    let anc_base_body = b.add_call("true", Vec::new(), CallTarget::True);
    let anc_base = b.add_clause(vec![Term::Slot(0), Term::Slot(0)], anc_base_body, 1);
    let anc_left = b.add_call("parent", vec![Term::Slot(0), Term::Slot(1)], CallTarget::Goto(parent_node));
    let anc_right = b.add_call("ancestor", vec![Term::Slot(1), Term::Slot(2)], CallTarget::Goto(ancestor_node));
    let anc_body = b.add_conjunction(anc_left, anc_right);
    let anc_rec = b.add_clause(vec![Term::Slot(0), Term::Slot(2)], anc_body, 3);
    b.finalize_define(ancestor_node, vec![(anc_base, None), (anc_rec, None)]);

    // childless(X) :- \+ parent(X, _). Clause frame: slot 0 = X, slot 1 = _.
    let has_child = b.add_call("parent", vec![Term::Slot(0), Term::Slot(1)], CallTarget::Goto(parent_node));
    let no_child = b.add_negation(has_child);
    let childless_clause = b.add_clause(vec![Term::Slot(0)], no_child, 2);
    b.define("childless", 1, vec![(childless_clause, None)]);

    b.build()
}
