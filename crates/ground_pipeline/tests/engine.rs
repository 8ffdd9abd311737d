//! End-to-end grounding tests against small hand-built programs.

use ground_core::{BuiltinOutcome, CallTarget, Database, FnBuiltIn, ProbExpr, Term};
use ground_io::{CompiledDatabase, DatabaseBuilder, GroundFormula};
use ground_pipeline::{EngineConfig, EngineError, Executor, QueryResult};

fn query(db: &CompiledDatabase, functor: &str, arity: usize, args: Vec<Term>) -> (GroundFormula, Vec<QueryResult>) {
    let mut formula = GroundFormula::new();
    let node = db
        .find_define(functor, arity)
        .unwrap_or_else(|| panic!("no definition for {functor}/{arity}"));
    let results = {
        let mut exec = Executor::new(db, &mut formula, EngineConfig::default());
        exec.query(node, args).expect("query should succeed")
    };
    (formula, results)
}

#[test]
fn fact_with_matching_argument_succeeds() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("rain")], None);
    b.define("weather", 1, vec![(fact, Some(Term::atom("rain")))]);
    let db = b.build();

    let (formula, results) = query(&db, "weather", 1, vec![Term::atom("rain")]);
    assert_eq!(results.len(), 1);
    assert!(formula.probability(results[0].1).is_none());
}

#[test]
fn fact_with_mismatched_argument_fails() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("rain")], None);
    b.define("weather", 1, vec![(fact, Some(Term::atom("rain")))]);
    let db = b.build();

    let (_formula, results) = query(&db, "weather", 1, vec![Term::atom("snow")]);
    assert!(results.is_empty());
}

#[test]
fn unbound_query_argument_binds_to_fact_value() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("rain")], None);
    b.define("weather", 1, vec![(fact, Some(Term::atom("rain")))]);
    let db = b.build();

    let x = Term::var();
    let (_formula, results) = query(&db, "weather", 1, vec![x]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0[0].to_string(), "rain");
}

#[test]
fn probabilistic_fact_attaches_its_probability() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("heads")], Some(ProbExpr::Const(0.5)));
    b.define("coin", 1, vec![(fact, Some(Term::atom("heads")))]);
    let db = b.build();

    let (formula, results) = query(&db, "coin", 1, vec![Term::atom("heads")]);
    assert_eq!(results.len(), 1);
    assert_eq!(formula.probability(results[0].1), Some(0.5));
}

#[test]
fn conjunction_requires_both_conjuncts() {
    // grandparent(X, Z) :- parent(X, Y), parent(Y, Z).
    let mut b = DatabaseBuilder::new();
    let p_ab = b.add_fact(vec![Term::atom("a"), Term::atom("b")], None);
    let p_bc = b.add_fact(vec![Term::atom("b"), Term::atom("c")], None);
    b.define(
        "parent",
        2,
        vec![(p_ab, Some(Term::atom("a"))), (p_bc, Some(Term::atom("b")))],
    );
    let parent_node = b.find_define("parent", 2).unwrap();

    // grandparent's clause frame: slot 0 = X, slot 1 = Y, slot 2 = Z.
    let call_left = b.add_call("parent", vec![Term::Slot(0), Term::Slot(1)], CallTarget::Goto(parent_node));
    let call_right = b.add_call("parent", vec![Term::Slot(1), Term::Slot(2)], CallTarget::Goto(parent_node));
    let conj = b.add_conjunction(call_left, call_right);
    let clause = b.add_clause(vec![Term::Slot(0), Term::Slot(2)], conj, 3);
    b.define("grandparent", 2, vec![(clause, None)]);
    let db = b.build();

    let (_formula, results) = query(&db, "grandparent", 2, vec![Term::atom("a"), Term::var()]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0[1].to_string(), "c");

    let (_formula, none) = query(&db, "grandparent", 2, vec![Term::atom("b"), Term::var()]);
    assert!(none.is_empty());
}

#[test]
fn negation_succeeds_only_when_the_goal_fails() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("a")], None);
    b.define("p", 1, vec![(fact, Some(Term::atom("a")))]);
    let p_node = b.find_define("p", 1).unwrap();
    let call = b.add_call("p", vec![Term::atom("b")], CallTarget::Goto(p_node));
    let neg = b.add_negation(call);
    b.define("not_p_of_b", 0, vec![(neg, None)]);
    let db = b.build();

    let (_formula, results) = query(&db, "not_p_of_b", 0, vec![]);
    assert_eq!(results.len(), 1);
}

#[test]
fn negation_fails_when_the_goal_succeeds() {
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::atom("a")], None);
    b.define("p", 1, vec![(fact, Some(Term::atom("a")))]);
    let p_node = b.find_define("p", 1).unwrap();
    let call = b.add_call("p", vec![Term::atom("a")], CallTarget::Goto(p_node));
    let neg = b.add_negation(call);
    b.define("not_p_of_a", 0, vec![(neg, None)]);
    let db = b.build();

    let (_formula, results) = query(&db, "not_p_of_a", 0, vec![]);
    assert!(results.is_empty());
}

#[test]
fn disjunction_collapses_repeated_results_into_one_node() {
    let mut b = DatabaseBuilder::new();
    let f1 = b.add_fact(vec![Term::atom("x")], None);
    let f2 = b.add_fact(vec![Term::atom("x")], None);
    let disj = b.add_disjunction(vec![f1, f2]);
    b.define("dup", 1, vec![(disj, Some(Term::atom("x")))]);
    let db = b.build();

    let (_formula, results) = query(&db, "dup", 1, vec![Term::var()]);
    assert_eq!(results.len(), 1, "two proofs of the same answer collapse to one result");
}

#[test]
fn recursive_tabled_predicate_terminates_and_caches() {
    // reach(X, X).
    // reach(X, Z) :- edge(X, Y), reach(Y, Z).
    let mut b = DatabaseBuilder::new();
    let e_ab = b.add_fact(vec![Term::atom("a"), Term::atom("b")], None);
    let e_bc = b.add_fact(vec![Term::atom("b"), Term::atom("c")], None);
    b.define("edge", 2, vec![(e_ab, Some(Term::atom("a"))), (e_bc, Some(Term::atom("b")))]);
    let edge_node = b.find_define("edge", 2).unwrap();

    let reach_node = b.reserve_define("reach", 2);

    // reach(X, X) :- true. Clause frame: slot 0 = X.
    let always_true = b.add_call("true", Vec::new(), CallTarget::True);
    let base_clause = b.add_clause(vec![Term::Slot(0), Term::Slot(0)], always_true, 1);

    // reach(X, Z) :- edge(X, Y), reach(Y, Z). Clause frame: 0 = X, 1 = Y, 2 = Z.
    let edge_call = b.add_call("edge", vec![Term::Slot(0), Term::Slot(1)], CallTarget::Goto(edge_node));
    let reach_call = b.add_call("reach", vec![Term::Slot(1), Term::Slot(2)], CallTarget::Goto(reach_node));
    let conj = b.add_conjunction(edge_call, reach_call);
    let rec_clause = b.add_clause(vec![Term::Slot(0), Term::Slot(2)], conj, 3);

    b.finalize_define(reach_node, vec![(base_clause, None), (rec_clause, None)]);
    let db = b.build();

    let (_formula, results) = query(&db, "reach", 2, vec![Term::atom("a"), Term::var()]);
    let mut answers: Vec<String> = results.iter().map(|(ctx, _)| ctx[1].to_string()).collect();
    answers.sort();
    assert_eq!(answers, vec!["a", "b", "c"]);
}

#[test]
fn builtin_call_target_runs_the_registered_closure() {
    // same_atom(X, X) via a built-in instead of unification in the head.
    let mut b = DatabaseBuilder::new();
    let target = b.add_builtin(Box::new(FnBuiltIn(|args: &[Term]| {
        if args[0].to_string() == args[1].to_string() {
            Ok(BuiltinOutcome::Results(vec![args.to_vec()]))
        } else {
            Ok(BuiltinOutcome::Fail)
        }
    })));
    let call = b.add_call("same_atom", vec![Term::Slot(0), Term::Slot(1)], target);
    let clause = b.add_clause(vec![Term::Slot(0), Term::Slot(1)], call, 2);
    b.define("same_atom", 2, vec![(clause, None)]);
    let db = b.build();

    let (_formula, yes) = query(&db, "same_atom", 2, vec![Term::atom("x"), Term::atom("x")]);
    assert_eq!(yes.len(), 1);

    let (_formula, no) = query(&db, "same_atom", 2, vec![Term::atom("x"), Term::atom("y")]);
    assert!(no.is_empty());
}

#[test]
fn not_equal_builtin_rejects_identical_atoms() {
    let mut b = DatabaseBuilder::new();
    let call = b.add_call("\\=", vec![Term::Slot(0), Term::Slot(1)], CallTarget::NotEqual);
    let clause = b.add_clause(vec![Term::Slot(0), Term::Slot(1)], call, 2);
    b.define("distinct", 2, vec![(clause, None)]);
    let db = b.build();

    let (_formula, distinct) = query(&db, "distinct", 2, vec![Term::atom("a"), Term::atom("b")]);
    assert_eq!(distinct.len(), 1);

    let (_formula, same) = query(&db, "distinct", 2, vec![Term::atom("a"), Term::atom("a")]);
    assert!(same.is_empty());
}

#[test]
fn positive_self_cycle_grounds_a_self_referential_or() {
    // 0.4::p. p :- p.
    //
    // Calling p/0 re-enters its own still-active definition. Rather than
    // deadlocking, the cycle closes with exactly one answer whose ground
    // node is a mutable `Or` that lists itself among its own children — the
    // recursive clause's own proof routes straight back to the definition
    // it started from.
    let mut b = DatabaseBuilder::new();
    let p_node = b.reserve_define("p", 0);
    let fact = b.add_fact(vec![], Some(ProbExpr::Const(0.4)));
    let self_call = b.add_call("p", vec![], CallTarget::Goto(p_node));
    let rec_clause = b.add_clause(vec![], self_call, 0);
    b.finalize_define(p_node, vec![(fact, None), (rec_clause, None)]);
    let db = b.build();

    let (formula, results) = query(&db, "p", 0, vec![]);
    assert_eq!(results.len(), 1, "a direct positive cycle still grounds exactly one answer");
    let node = results[0].1;
    let children = formula
        .or_children(node)
        .expect("p/0 with a recursive clause grounds to an Or node");
    assert!(children.contains(&node), "the recursive proof must route back into its own Or node");
}

#[test]
fn mutual_recursion_with_no_base_case_terminates_with_no_answers() {
    // p :- q. q :- p. Neither side has a base case; the cycle must still
    // close (via the queue-drain force-close, not the natural per-waiter
    // route) instead of deadlocking the trampoline.
    let mut b = DatabaseBuilder::new();
    let p_node = b.reserve_define("p", 0);
    let q_node = b.reserve_define("q", 0);
    let call_q = b.add_call("q", vec![], CallTarget::Goto(q_node));
    let p_clause = b.add_clause(vec![], call_q, 0);
    b.finalize_define(p_node, vec![(p_clause, None)]);
    let call_p = b.add_call("p", vec![], CallTarget::Goto(p_node));
    let q_clause = b.add_clause(vec![], call_p, 0);
    b.finalize_define(q_node, vec![(q_clause, None)]);
    let db = b.build();

    let (_formula, results) = query(&db, "p", 0, vec![]);
    assert!(results.is_empty(), "a cycle with no base case proves nothing, but must still terminate");
}

#[test]
fn indirect_call_through_an_active_definition_is_rejected() {
    // p :- call(p). A `call/N`-style indirect dispatch can never be folded
    // into the tabling protocol — its target was computed, not a static
    // clause reference the cycle walk can safely re-enter.
    let mut b = DatabaseBuilder::new();
    let p_node = b.reserve_define("p", 0);
    let indirect_call = b.add_call("p", vec![], CallTarget::Indirect(p_node));
    let clause = b.add_clause(vec![], indirect_call, 0);
    b.finalize_define(p_node, vec![(clause, None)]);
    let db = b.build();

    let mut formula = GroundFormula::new();
    let node = db.find_define("p", 0).unwrap();
    let mut exec = Executor::new(&db, &mut formula, EngineConfig::default());
    let err = exec.query(node, vec![]).unwrap_err();
    assert!(matches!(err, EngineError::IndirectCallCycleError { .. }));
}

#[test]
fn nocache_goal_is_re_derived_on_every_call() {
    // A `_nocache_`-prefixed definition's results are never stored, so
    // calling it twice against the same Executor (whose definition cache
    // would otherwise serve the second call from the first) derives its
    // proof twice rather than reusing the first call's ground node.
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![], Some(ProbExpr::Const(0.3)));
    b.define("_nocache_count", 0, vec![(fact, None)]);
    let count_node = b.find_define("_nocache_count", 0).unwrap();
    let db = b.build();

    let mut formula = GroundFormula::new();
    let mut exec = Executor::new(&db, &mut formula, EngineConfig::default());
    let first = exec.query(count_node, vec![]).expect("first call should succeed");
    let nodes_after_first = formula.len();
    let second = exec.query(count_node, vec![]).expect("second call should succeed");

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].1, second[0].1, "a _nocache_ goal must not reuse a prior ground node");
    assert!(formula.len() > nodes_after_first, "a _nocache_ goal grounds a fresh proof on every call");
}

#[test]
fn repeated_call_reuses_the_cached_ground_node() {
    // 0.5::f(1). g(X) :- f(X). Calling g(1) twice against the same
    // Executor (its definition cache spans the whole query session, the
    // same way it spans one recursive descent) must return the identical
    // ground node both times rather than re-deriving the proof.
    let mut b = DatabaseBuilder::new();
    let fact = b.add_fact(vec![Term::Int(1)], Some(ProbExpr::Const(0.5)));
    b.define("f", 1, vec![(fact, Some(Term::Int(1)))]);
    let f_node = b.find_define("f", 1).unwrap();
    let call_f = b.add_call("f", vec![Term::Slot(0)], CallTarget::Goto(f_node));
    let g_clause = b.add_clause(vec![Term::Slot(0)], call_f, 1);
    b.define("g", 1, vec![(g_clause, None)]);
    let g_node = b.find_define("g", 1).unwrap();
    let db = b.build();

    let mut formula = GroundFormula::new();
    let mut exec = Executor::new(&db, &mut formula, EngineConfig::default());
    let first = exec.query(g_node, vec![Term::Int(1)]).expect("first call should succeed");
    let nodes_after_first = formula.len();
    let second = exec.query(g_node, vec![Term::Int(1)]).expect("second call should succeed");

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].1, second[0].1, "a repeated call reuses the cached ground node");
    assert_eq!(formula.len(), nodes_after_first, "the cache hit must not ground any new nodes");
}

#[test]
fn recursion_through_negation_is_a_fatal_negative_cycle() {
    // p(X) :- \+ p(X). Calling p(a) must re-enter the still-active p/1
    // definition underneath a negation, which is rejected rather than
    // silently treated as failure or success.
    let mut b = DatabaseBuilder::new();
    let p_node = b.reserve_define("p", 1);
    let self_call = b.add_call("p", vec![Term::Slot(0)], CallTarget::Goto(p_node));
    let neg = b.add_negation(self_call);
    let clause = b.add_clause(vec![Term::Slot(0)], neg, 1);
    b.finalize_define(p_node, vec![(clause, None)]);
    let db = b.build();

    let mut formula = GroundFormula::new();
    let node = db.find_define("p", 1).unwrap();
    let mut exec = Executor::new(&db, &mut formula, EngineConfig::default());
    let err = exec.query(node, vec![Term::atom("a")]).unwrap_err();
    assert!(matches!(err, EngineError::NegativeCycle { .. }));
}
