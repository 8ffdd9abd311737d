//! A dictionary keyed by a predicate signature (functor, arity) plus a
//! ground or variable-identity argument key. Used for both the active-call
//! map and the per-goal result cache.
//!
//! The original engine nests one `dict` per argument position to share
//! prefixes across goals of the same functor. Rust's `HashMap` hashes the
//! whole key in one pass, so a single flat map over `(functor, arity, arg
//! keys)` gives the same lookup semantics without the per-level nesting.

use std::collections::HashMap;
use std::rc::Rc;

use ground_core::TermKey;

#[derive(Clone, PartialEq, Eq, Hash)]
struct Key {
    functor: Rc<str>,
    arity: usize,
    args: Vec<TermKey>,
}

fn make_key(functor: &Rc<str>, args: &[TermKey]) -> Key {
    Key {
        functor: functor.clone(),
        arity: args.len(),
        args: args.to_vec(),
    }
}

#[derive(Default)]
pub struct NestedDict<V> {
    inner: HashMap<Key, V>,
}

impl<V> NestedDict<V> {
    pub fn new() -> Self {
        NestedDict { inner: HashMap::new() }
    }

    pub fn get(&self, functor: &Rc<str>, args: &[TermKey]) -> Option<&V> {
        self.inner.get(&make_key(functor, args))
    }

    pub fn contains(&self, functor: &Rc<str>, args: &[TermKey]) -> bool {
        self.inner.contains_key(&make_key(functor, args))
    }

    pub fn insert(&mut self, functor: &Rc<str>, args: &[TermKey], value: V) {
        self.inner.insert(make_key(functor, args), value);
    }

    pub fn remove(&mut self, functor: &Rc<str>, args: &[TermKey]) -> Option<V> {
        self.inner.remove(&make_key(functor, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut d: NestedDict<i32> = NestedDict::new();
        let f: Rc<str> = Rc::from("p");
        let args = vec![TermKey::Int(1), TermKey::Int(2)];
        assert!(d.get(&f, &args).is_none());
        d.insert(&f, &args, 42);
        assert_eq!(d.get(&f, &args), Some(&42));
        assert_eq!(d.remove(&f, &args), Some(42));
        assert!(d.get(&f, &args).is_none());
    }

    #[test]
    fn distinguishes_by_functor_and_args() {
        let mut d: NestedDict<i32> = NestedDict::new();
        let f: Rc<str> = Rc::from("p");
        let g: Rc<str> = Rc::from("q");
        d.insert(&f, &[TermKey::Int(1)], 1);
        d.insert(&g, &[TermKey::Int(1)], 2);
        assert_eq!(d.get(&f, &[TermKey::Int(1)]), Some(&1));
        assert_eq!(d.get(&g, &[TermKey::Int(1)]), Some(&2));
    }
}
