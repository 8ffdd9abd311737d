//! End-to-end tests driving the built binary, not the library crates
//! directly — catches argument-parsing and output-formatting regressions
//! the unit tests underneath can't see.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn grandparent_query_finds_both_hard_coded_solutions() {
    Command::cargo_bin("ground")
        .unwrap()
        .args(["--functor", "grandparent", "--arg", "ann", "--arg", "_"])
        .assert()
        .success()
        .stdout(contains("2 solution(s)"))
        .stdout(contains("cid"))
        .stdout(contains("dee"));
}

#[test]
fn childless_query_excludes_parents() {
    Command::cargo_bin("ground")
        .unwrap()
        .args(["--functor", "childless", "--arg", "bob"])
        .assert()
        .success()
        .stdout(contains("no solutions"));
}

#[test]
fn unknown_predicate_errors_by_default() {
    Command::cargo_bin("ground")
        .unwrap()
        .args(["--functor", "not_a_real_predicate"])
        .assert()
        .failure()
        .stderr(contains("no clause for"));
}

#[test]
fn unknown_predicate_fails_silently_when_requested() {
    Command::cargo_bin("ground")
        .unwrap()
        .args(["--functor", "not_a_real_predicate", "--unknown-fails"])
        .assert()
        .success()
        .stdout(contains("no solutions"));
}
