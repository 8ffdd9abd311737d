//! An insertion-ordered, deduplicating set of `(result, node)` pairs.
//!
//! Before collapsing, several ground nodes can accumulate under the same
//! result (multiple clauses proving the same goal); [`ResultSet::collapse`]
//! folds each group into a single node with a caller-supplied function (an
//! `addOr` call against the ground formula, in practice) and the set becomes
//! read-only from then on — a result set is collapsed at most once.

use std::collections::HashMap;

use ground_core::{Context, TermKey};

enum Slot<V> {
    Pending(Vec<V>),
    Collapsed(V),
}

pub struct ResultSet<V> {
    entries: Vec<(Context, Slot<V>)>,
    index: HashMap<TermKey, usize>,
    collapsed: bool,
}

impl<V: Clone> Default for ResultSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResultSet<V> {
    pub fn new() -> Self {
        ResultSet {
            entries: Vec::new(),
            index: HashMap::new(),
            collapsed: false,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key_of(ctx: &Context) -> TermKey {
        // A context is keyed as a whole compound so existing TermKey
        // equality/hash (which already resolves bound variables and uses
        // cell identity for unbound ones) applies uniformly.
        TermKey::Compound(
            std::rc::Rc::from("$result"),
            ctx.iter().map(|t| t.key()).collect(),
        )
    }

    /// Inserts a result/node pair. Before collapsing, inserting an
    /// already-seen result appends to its pending node list; after
    /// collapsing every result is unique and this replaces the node.
    pub fn insert(&mut self, result: Context, node: V) {
        let key = Self::key_of(&result);
        match self.index.get(&key) {
            Some(&idx) => match &mut self.entries[idx].1 {
                Slot::Pending(nodes) => nodes.push(node),
                Slot::Collapsed(existing) => *existing = node,
            },
            None => {
                let idx = self.entries.len();
                self.index.insert(key, idx);
                let slot = if self.collapsed {
                    Slot::Collapsed(node)
                } else {
                    Slot::Pending(vec![node])
                };
                self.entries.push((result, slot));
            }
        }
    }

    pub fn contains(&self, result: &Context) -> bool {
        self.index.contains_key(&Self::key_of(result))
    }

    /// The collapsed node for a result, once collapsed.
    pub fn get_collapsed(&self, result: &Context) -> Option<&V> {
        let idx = *self.index.get(&Self::key_of(result))?;
        match &self.entries[idx].1 {
            Slot::Collapsed(v) => Some(v),
            Slot::Pending(_) => None,
        }
    }

    /// Folds every pending group of nodes into one via `f`. A no-op once
    /// already collapsed.
    pub fn collapse(&mut self, mut f: impl FnMut(&Context, &[V]) -> V) {
        if self.collapsed {
            return;
        }
        for (result, slot) in self.entries.iter_mut() {
            if let Slot::Pending(nodes) = slot {
                let collapsed = f(result, nodes);
                *slot = Slot::Collapsed(collapsed);
            }
        }
        self.collapsed = true;
    }

    /// Iterates `(result, node)` pairs. Only meaningful after collapsing for
    /// callers that need exactly one node per result (as the original
    /// engine's `items()` is used post-collapse).
    pub fn iter_collapsed(&self) -> impl Iterator<Item = (&Context, &V)> {
        self.entries.iter().filter_map(|(r, s)| match s {
            Slot::Collapsed(v) => Some((r, v)),
            Slot::Pending(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_core::Term;

    #[test]
    fn dedups_identical_results_before_collapse() {
        let mut rs: ResultSet<i32> = ResultSet::new();
        rs.insert(vec![Term::Int(1)], 10);
        rs.insert(vec![Term::Int(1)], 20);
        assert_eq!(rs.len(), 1);
        rs.collapse(|_, nodes| nodes.iter().sum());
        assert_eq!(rs.get_collapsed(&vec![Term::Int(1)]), Some(&30));
    }

    #[test]
    fn distinct_results_stay_distinct() {
        let mut rs: ResultSet<i32> = ResultSet::new();
        rs.insert(vec![Term::Int(1)], 10);
        rs.insert(vec![Term::Int(2)], 20);
        assert_eq!(rs.len(), 2);
    }
}
