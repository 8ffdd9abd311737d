//! A chain of result transformations threaded through nested calls (clause
//! head substitution, call-argument substitution, `findall`'s
//! last-argument-only variant).

use std::rc::Rc;

use ground_core::Context;

type TransformFn = Rc<dyn Fn(Context) -> Option<Context>>;

/// Applies its functions most-recently-added-first, short-circuiting to
/// `None` as soon as one of them does (a failed substitution downstream of a
/// cycle, typically).
#[derive(Clone, Default)]
pub struct Transformations {
    functions: Vec<TransformFn>,
}

impl Transformations {
    pub fn new() -> Self {
        Transformations { functions: Vec::new() }
    }

    pub fn push(&mut self, f: impl Fn(Context) -> Option<Context> + 'static) {
        self.functions.push(Rc::new(f));
    }

    /// Reserved for interface parity with the original transform chain's
    /// constant-folding fast path. Never populated: the engine here always
    /// threads individual substitution functions instead.
    pub fn add_constant(&mut self, _constant: Context) {}

    pub fn apply(&self, mut result: Context) -> Option<Context> {
        for f in self.functions.iter().rev() {
            result = f(result)?;
        }
        Some(result)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_core::Term;

    #[test]
    fn applies_in_reverse_order() {
        let mut t = Transformations::new();
        t.push(|mut ctx: Context| {
            ctx.push(Term::Int(1));
            Some(ctx)
        });
        t.push(|mut ctx: Context| {
            ctx.push(Term::Int(2));
            Some(ctx)
        });
        let out = t.apply(vec![]).unwrap();
        // Most recently pushed runs first.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to_string(), "2");
        assert_eq!(out[1].to_string(), "1");
    }

    #[test]
    fn short_circuits_on_none() {
        let mut t = Transformations::new();
        t.push(|_ctx: Context| None);
        t.push(|mut ctx: Context| {
            ctx.push(Term::Int(1));
            Some(ctx)
        });
        assert!(t.apply(vec![]).is_none());
    }
}
