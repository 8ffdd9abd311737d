//! The definition cache: tabled results for `Define` goals, plus the set of
//! goals currently being computed (needed to detect a cycle before it
//! becomes infinite recursion).
//!
//! Simplification versus the original `DefineCache`: we key strictly by a
//! goal's own structural key (`functor` + [`TermKey`] arguments) rather than
//! additionally sharing ground sub-results discovered while computing a
//! still-open non-ground goal across *other* differently-bound calls to the
//! same predicate. That cross-call sharing is a performance optimization
//! over repeated partially-ground calls, not a correctness requirement of
//! tabling itself (each goal is still computed at most once, and its own
//! exact repeat calls are still served from cache) — see `DESIGN.md`.

use std::rc::Rc;

use ground_algo::NestedDict;
use ground_core::{Context, GroundNodeId, TermKey};

fn is_dont_cache(functor: &str) -> bool {
    functor.starts_with("_nocache_")
}

#[derive(Default)]
pub struct DefineCache {
    results: NestedDict<Vec<(Context, GroundNodeId)>>,
    active: NestedDict<usize>,
}

impl DefineCache {
    pub fn new() -> Self {
        DefineCache::default()
    }

    pub fn get(&self, functor: &Rc<str>, args_key: &[TermKey]) -> Option<&Vec<(Context, GroundNodeId)>> {
        self.results.get(functor, args_key)
    }

    pub fn store(&mut self, functor: &Rc<str>, args_key: &[TermKey], results: Vec<(Context, GroundNodeId)>) {
        if is_dont_cache(functor) {
            return;
        }
        self.results.insert(functor, args_key, results);
    }

    pub fn activate(&mut self, functor: &Rc<str>, args_key: &[TermKey], pointer: usize) {
        self.active.insert(functor, args_key, pointer);
    }

    pub fn deactivate(&mut self, functor: &Rc<str>, args_key: &[TermKey]) {
        self.active.remove(functor, args_key);
    }

    pub fn active_pointer(&self, functor: &Rc<str>, args_key: &[TermKey]) -> Option<usize> {
        self.active.get(functor, args_key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_core::Term;

    #[test]
    fn nocache_goals_are_never_stored() {
        let mut cache = DefineCache::new();
        let f: Rc<str> = Rc::from("_nocache_flip");
        let key = vec![TermKey::Int(1)];
        cache.store(&f, &key, vec![(vec![Term::Int(1)], GroundNodeId(1))]);
        assert!(cache.get(&f, &key).is_none());
    }

    #[test]
    fn ordinary_goals_round_trip() {
        let mut cache = DefineCache::new();
        let f: Rc<str> = Rc::from("p");
        let key = vec![TermKey::Int(1)];
        cache.store(&f, &key, vec![(vec![Term::Int(1)], GroundNodeId(7))]);
        assert_eq!(cache.get(&f, &key).unwrap()[0].1, GroundNodeId(7));
    }
}
