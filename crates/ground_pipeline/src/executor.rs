//! The trampoline: a LIFO queue of [`Action`]s drained until empty, driving
//! evaluation of a compiled [`Database`] against a [`GroundTarget`] sink.
//!
//! Every in-flight node with more than one pending child lives on `stack` as
//! an [`EvalRecord`]; nodes with exactly one immediate outcome (a fact, a
//! clause head unification, a deterministic call) are evaluated inline and
//! never occupy a slot. Processing a queued action can push more actions and
//! at most one new stack record — never fewer than zero, since the queue
//! only ever shrinks by the one action just popped.

use std::collections::HashSet;
use std::rc::Rc;

use ground_algo::{
    AndRecord, CallRecord, DefineRecord, EvalRecord, JoinRecord, NodeBase, NotRecord, OrRecord, Waiter,
};
use ground_algo::{ResultSet, Transformations};
use ground_core::{
    fork_frame, freeze_context, freeze_context_with_map, instantiate, instantiate_slots_all,
    translate_through_map, unify, unify_call_head, AtomSource, BuiltinOutcome, CallTarget, Context,
    Database, DbNode, GroundNodeId, GroundTarget, NameLabel, NodeId, Term, NODE_FALSE, NODE_TRUE,
};
use tracing::{debug, trace};

use crate::action::{Action, CompleteMsg, EvalRequest, ResultMsg};
use crate::cache::DefineCache;
use crate::config::{EngineConfig, UnknownPolicy};
use crate::error::EngineError;

/// Drives one top-level query (or `call/N`-style sub-query) to completion
/// against `database`, feeding every proof it finds into `target`.
pub struct Executor<'d, 't> {
    database: &'d dyn Database,
    target: &'t mut dyn GroundTarget,
    config: EngineConfig,
    stack: Vec<Option<EvalRecord>>,
    queue: Vec<Action>,
    cache: DefineCache,
}

/// One grounded proof of the query: its answer substitution and the ground
/// node representing it.
pub type QueryResult = (Context, GroundNodeId);

impl<'d, 't> Executor<'d, 't> {
    pub fn new(database: &'d dyn Database, target: &'t mut dyn GroundTarget, config: EngineConfig) -> Self {
        Executor {
            database,
            target,
            config,
            stack: Vec::new(),
            queue: Vec::new(),
            cache: DefineCache::new(),
        }
    }

    /// Grounds a single top-level goal: `node` evaluated against `args`, with
    /// no parent and no enclosing clause frame.
    pub fn query(&mut self, node: NodeId, args: Context) -> Result<Vec<QueryResult>, EngineError> {
        debug!(?node, "starting query");
        let mut top_results = Vec::new();
        self.queue.push(Action::Eval(EvalRequest {
            node_id: node,
            context: args,
            parent: None,
            identifier: None,
            transform: Transformations::new(),
            call_origin: None,
            frame: None,
        }));
        while let Some(action) = self.queue.pop() {
            match action {
                Action::Eval(req) => self.eval(req)?,
                // A result with no target is a query-level answer reached
                // without ever pushing a stack record for it (a cache hit on
                // the top-level goal itself, skipping the Define record a
                // fresh evaluation would have parked it against).
                Action::Result(msg) if msg.target.is_none() => {
                    if let Some(node) = msg.node {
                        if node != NODE_FALSE {
                            top_results.push((msg.result, node));
                        }
                    }
                }
                Action::Result(msg) => self.deliver_result(msg)?,
                Action::Complete(msg) => self.deliver_complete(msg, &mut top_results)?,
            }
            if self.queue.is_empty() {
                self.force_close_open_cycles();
            }
        }
        Ok(top_results)
    }

    /// Called whenever the action queue would otherwise go idle. A waiter
    /// parked on a still-active `Define` only ever resumes through a result
    /// or complete message that record sends it; a genuine cycle with no
    /// base case (or a non-ground cycle whose last answer already arrived)
    /// never sends one on its own, so the queue draining with such a waiter
    /// still outstanding is exactly the signal the original engine's
    /// `closeCycle` answers: force the waiter complete so the clause chain
    /// that is blocked on it can unwind.
    fn force_close_open_cycles(&mut self) {
        for slot in self.stack.iter_mut() {
            if let Some(EvalRecord::Define(def)) = slot {
                if !def.is_cycle_root {
                    continue;
                }
                for waiter in def.waiters.iter_mut().filter(|w| !w.notified) {
                    waiter.notified = true;
                    self.queue.push(Action::complete(waiter.parent, None));
                }
            }
        }
    }

    fn push_result(&mut self, target: Option<usize>, result: Context, node: Option<GroundNodeId>, source: Option<usize>) {
        self.queue.push(Action::result(target, result, node, source, false));
    }

    fn push_complete(&mut self, target: Option<usize>, source: Option<usize>) {
        self.queue.push(Action::complete(target, source));
    }

    // --- eval: dispatch on the compiled node kind ---------------------

    fn eval(&mut self, req: EvalRequest) -> Result<(), EngineError> {
        match self.database.get_node(req.node_id).clone() {
            DbNode::Fact { args, probability } => self.eval_fact(req, &args, probability.as_ref()),
            DbNode::Choice { group, choice, probability, locvars } => {
                self.eval_choice(req, group.0, choice, &probability, &locvars)
            }
            DbNode::Conjunction { left, right } => {
                self.eval_conjunction(req, left, right);
                Ok(())
            }
            DbNode::Disjunction { children } => {
                self.eval_disjunction(req, &children);
                Ok(())
            }
            DbNode::Negation { child } => {
                self.eval_negation(req, child);
                Ok(())
            }
            DbNode::Define { functor, arity, clauses } => {
                let candidates = clauses.find(&req.context);
                self.eval_define(req, functor, arity, candidates)
            }
            DbNode::Call { functor, args, target } => self.eval_call(req, &functor, &args, target),
            DbNode::Clause { head_args, child, varcount } => {
                self.eval_clause(req, &head_args, child, varcount)
            }
        }
    }

    fn eval_fact(
        &mut self,
        req: EvalRequest,
        args: &[Term],
        probability: Option<&ground_core::ProbExpr>,
    ) -> Result<(), EngineError> {
        let pattern = match &req.frame {
            Some(frame) => instantiate_slots_all(args, frame),
            None => args.to_vec(),
        };
        let mut to_push = None;
        if unify_call_head(&req.context, &pattern).is_ok() {
            let result = freeze_context(&req.context);
            let p = probability.map(|e| instantiate(e, &result)).transpose()?;
            if let Some(node) = self.target.add_atom(AtomSource::Fact { db_node: req.node_id }, p) {
                to_push = Some((result, node));
            }
        }
        // A complete message destined for the same target as a result must
        // be queued before it: the queue pops LIFO, so pushing complete
        // first puts it underneath the result, and the result is delivered
        // first. Pushing them the other way round risks the target
        // finishing (and freeing its slot) before its own result arrives.
        self.push_complete(req.parent, None);
        if let Some((result, node)) = to_push {
            self.push_result(req.parent, result, Some(node), None);
        }
        Ok(())
    }

    fn eval_choice(
        &mut self,
        req: EvalRequest,
        group: u32,
        choice: usize,
        probability: &ground_core::ProbExpr,
        locvars: &[usize],
    ) -> Result<(), EngineError> {
        for (i, arg) in req.context.iter().enumerate() {
            if !locvars.contains(&i) && !arg.is_ground() {
                return Err(ground_core::NonGroundProbabilisticClause.into());
            }
        }
        let result = freeze_context(&req.context);
        let p = instantiate(probability, &result)?;
        let node = self.target.add_atom(
            AtomSource::Choice { group: ground_core::GroupId(group), choice },
            Some(p),
        );
        self.push_complete(req.parent, None);
        if let Some(node) = node {
            self.push_result(req.parent, result, Some(node), None);
        }
        Ok(())
    }

    fn eval_conjunction(&mut self, req: EvalRequest, left: NodeId, right: NodeId) {
        let pointer = self.stack.len();
        self.stack.push(Some(EvalRecord::And(AndRecord {
            base: NodeBase {
                db_node: req.node_id,
                context: req.context.clone(),
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                pointer,
                on_cycle: false,
            },
            right_child: right,
            frame: req.frame.clone(),
            to_complete: 1,
        })));
        self.queue.push(Action::Eval(EvalRequest {
            node_id: left,
            context: req.context,
            parent: Some(pointer),
            identifier: req.identifier,
            transform: Transformations::new(),
            call_origin: None,
            frame: req.frame,
        }));
    }

    fn eval_disjunction(&mut self, req: EvalRequest, children: &[NodeId]) {
        let pointer = self.stack.len();
        self.stack.push(Some(EvalRecord::Or(OrRecord {
            base: NodeBase {
                db_node: req.node_id,
                context: req.context.clone(),
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                pointer,
                on_cycle: false,
            },
            results: ResultSet::new(),
            to_complete: children.len(),
        })));
        if children.is_empty() {
            self.push_complete(req.parent, Some(pointer));
            self.stack[pointer] = None;
            return;
        }
        for &child in children {
            let frame = req.frame.as_ref().map(|f| Rc::new(fork_frame(f)));
            // Every branch shares the same incoming context cells; fork it
            // per branch for the same reason each candidate clause gets its
            // own copy in `eval_define`.
            self.queue.push(Action::Eval(EvalRequest {
                node_id: child,
                context: freeze_context(&req.context),
                parent: Some(pointer),
                identifier: req.identifier,
                transform: Transformations::new(),
                call_origin: None,
                frame,
            }));
        }
    }

    fn eval_negation(&mut self, req: EvalRequest, child: NodeId) {
        let pointer = self.stack.len();
        self.stack.push(Some(EvalRecord::Not(NotRecord {
            base: NodeBase {
                db_node: req.node_id,
                context: req.context.clone(),
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                pointer,
                on_cycle: false,
            },
            nodes: HashSet::new(),
        })));
        self.queue.push(Action::Eval(EvalRequest {
            node_id: child,
            context: req.context,
            parent: Some(pointer),
            identifier: req.identifier,
            transform: Transformations::new(),
            call_origin: None,
            frame: req.frame,
        }));
    }

    fn eval_define(
        &mut self,
        req: EvalRequest,
        functor: Rc<str>,
        arity: usize,
        candidates: Vec<NodeId>,
    ) -> Result<(), EngineError> {
        let args_key = ground_core::context_key(&req.context);

        if let Some(cached) = self.cache.get(&functor, &args_key) {
            let cached = cached.clone();
            self.push_complete(req.parent, None);
            for (ctx, node) in cached {
                if let Some(tctx) = req.transform.apply(ctx) {
                    self.push_result(req.parent, tctx, Some(node), None);
                }
            }
            return Ok(());
        }

        if let Some(active_ptr) = self.cache.active_pointer(&functor, &args_key) {
            self.walk_cycle_path(req.parent, active_ptr, &functor, arity)?;
            trace!(%functor, arity, active_ptr, "cycle: parking caller on active definition");
            let mut waiter = Waiter { parent: req.parent, transform: req.transform, identifier: req.identifier, notified: false };
            let mut rec = self.stack[active_ptr]
                .take()
                .ok_or_else(|| EngineError::InvalidEngineState(format!("cycle target {active_ptr} is dead")))?;
            let EvalRecord::Define(def) = &mut rec else {
                return Err(EngineError::InvalidEngineState("cycle target is not a Define".into()));
            };
            // Flush whatever this definition already knows into mutable `Or`
            // nodes now (the original engine's `cycle_parent.flushBuffer
            // (True)`), then replay them to the new waiter immediately — it
            // does not wait for a future result to learn about answers that
            // already exist.
            let target = &mut *self.target;
            def.results.collapse(|_ctx, nodes| target.add_or(nodes, false).unwrap_or(NODE_FALSE));
            let was_root = def.is_cycle_root;
            def.is_cycle_root = true;
            if !was_root {
                debug!(%functor, arity, active_ptr, "cycle: establishing cycle root");
            }
            let existing: Vec<(Context, GroundNodeId)> =
                def.results.iter_collapsed().map(|(ctx, node)| (ctx.clone(), *node)).collect();
            for (ctx, node) in existing {
                if node == NODE_FALSE {
                    continue;
                }
                if def.is_ground {
                    self.queue.push(Action::complete(waiter.parent, None));
                    waiter.notified = true;
                }
                if let Some(tctx) = waiter.transform.apply(ctx) {
                    self.queue.push(Action::result(waiter.parent, tctx, Some(node), None, false));
                }
            }
            if !waiter.notified {
                def.waiters.push(waiter);
            }
            self.stack[active_ptr] = Some(rec);
            return Ok(());
        }

        let pointer = self.stack.len();
        self.cache.activate(&functor, &args_key, pointer);
        let is_ground = req.context.iter().all(|t| t.is_ground());
        self.stack.push(Some(EvalRecord::Define(DefineRecord {
            base: NodeBase {
                db_node: req.node_id,
                context: req.context.clone(),
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                pointer,
                on_cycle: false,
            },
            functor: functor.clone(),
            args_key,
            results: ResultSet::new(),
            to_complete: candidates.len(),
            is_cycle_root: false,
            waiters: Vec::new(),
            is_ground,
        })));

        if candidates.is_empty() {
            self.finish_define(pointer)?;
            return Ok(());
        }
        for clause in candidates {
            // Each candidate clause gets its own frozen copy of the call's
            // argument context: `unify_call_head` may bind a still-unbound
            // argument cell, and with no binding trail a clause that fails
            // after binding one would otherwise leak that binding into the
            // next candidate's attempt.
            self.queue.push(Action::Eval(EvalRequest {
                node_id: clause,
                context: freeze_context(&req.context),
                parent: Some(pointer),
                identifier: req.identifier,
                transform: Transformations::new(),
                call_origin: Some(format!("{functor}/{arity}")),
                frame: None,
            }));
        }
        Ok(())
    }

    fn eval_call(
        &mut self,
        req: EvalRequest,
        functor: &str,
        args: &[Term],
        target: CallTarget,
    ) -> Result<(), EngineError> {
        let inst_args = match &req.frame {
            Some(frame) => instantiate_slots_all(args, frame),
            None => args.to_vec(),
        };
        match target {
            CallTarget::Goto(node) => self.dispatch_call(req, node, inst_args, functor, false),
            CallTarget::Indirect(node) => self.dispatch_call(req, node, inst_args, functor, true),
            CallTarget::BuiltIn(id) => {
                let outcome = self.database.get_builtin(id).call(&inst_args)?;
                let mut to_push = Vec::new();
                match outcome {
                    BuiltinOutcome::Results(results) => {
                        for r in results {
                            let raw = freeze_context(&r);
                            if let Some(joined) =
                                self.join_call_result(&req.context, &inst_args, &raw)
                            {
                                if let Some(tctx) = req.transform.apply(joined) {
                                    to_push.push(tctx);
                                }
                            }
                        }
                    }
                    BuiltinOutcome::Fail => {}
                }
                self.push_complete(req.parent, None);
                for tctx in to_push {
                    self.push_result(req.parent, tctx, Some(NODE_TRUE), None);
                }
            }
            CallTarget::True => {
                let tctx = req.transform.apply(freeze_context(&req.context));
                self.push_complete(req.parent, None);
                if let Some(tctx) = tctx {
                    self.push_result(req.parent, tctx, Some(NODE_TRUE), None);
                }
            }
            CallTarget::Fail => {
                self.push_complete(req.parent, None);
            }
            CallTarget::NotEqual => {
                if inst_args.len() != 2 {
                    return Err(EngineError::InvalidEngineState("\\= needs two arguments".into()));
                }
                let snapshot = freeze_context(&inst_args);
                let distinct = unify(&snapshot[0], &snapshot[1]).is_err();
                let tctx = if distinct { req.transform.apply(freeze_context(&req.context)) } else { None };
                self.push_complete(req.parent, None);
                if let Some(tctx) = tctx {
                    self.push_result(req.parent, tctx, Some(NODE_TRUE), None);
                }
            }
        }
        Ok(())
    }

    /// Shared by `Goto` and `Indirect` call targets: pushes a `CallRecord`
    /// parked on `node`'s evaluation. `indirect` marks the record so a cycle
    /// walk that has to cross it reports `IndirectCallCycleError` instead of
    /// parking a waiter — an indirect call's target was computed, not a
    /// static clause reference the tabling protocol can safely re-enter.
    fn dispatch_call(&mut self, req: EvalRequest, node: NodeId, inst_args: Context, functor: &str, indirect: bool) {
        let pointer = self.stack.len();
        self.stack.push(Some(EvalRecord::Call(CallRecord {
            base: NodeBase {
                db_node: req.node_id,
                context: req.context,
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                pointer,
                on_cycle: false,
            },
            call_args: inst_args.clone(),
            indirect,
        })));
        self.queue.push(Action::Eval(EvalRequest {
            node_id: node,
            context: inst_args,
            parent: Some(pointer),
            identifier: req.identifier,
            transform: Transformations::new(),
            call_origin: Some(functor.to_string()),
            frame: None,
        }));
    }

    /// Unifies `call_args` (this call site's own arguments, in the shape the
    /// callee returned `raw_result` against) back into a fresh fork of
    /// `context` (the caller's full surrounding context), returning the
    /// forked-and-now-bound context on success. `None` means the callee's
    /// result does not actually satisfy the call (e.g. a built-in's answer
    /// conflicts with a binding already made elsewhere in `call_args`).
    fn join_call_result(
        &self,
        context: &Context,
        call_args: &Context,
        raw_result: &Context,
    ) -> Option<Context> {
        let (forked_ctx, map) = freeze_context_with_map(context);
        let translated_args: Vec<Term> =
            call_args.iter().map(|t| translate_through_map(t, &map)).collect();
        unify_call_head(&translated_args, raw_result).ok()?;
        Some(freeze_context(&forked_ctx))
    }

    fn eval_clause(
        &mut self,
        req: EvalRequest,
        head_args: &[Term],
        child: NodeId,
        varcount: usize,
    ) -> Result<(), EngineError> {
        let frame = Rc::new(ground_core::fresh_frame(varcount));
        let inst_head = instantiate_slots_all(head_args, &frame);
        if unify_call_head(&req.context, &inst_head).is_ok() {
            self.queue.push(Action::Eval(EvalRequest {
                node_id: child,
                context: req.context,
                parent: req.parent,
                identifier: req.identifier,
                transform: req.transform,
                call_origin: None,
                frame: Some(frame),
            }));
        } else {
            self.push_complete(req.parent, None);
        }
        Ok(())
    }

    // --- result/complete delivery --------------------------------------

    fn deliver_result(&mut self, msg: ResultMsg) -> Result<(), EngineError> {
        let Some(target) = msg.target else {
            return Err(EngineError::InvalidEngineState("result with no target reached deliver_result".into()));
        };
        let mut rec = self.stack[target]
            .take()
            .ok_or_else(|| EngineError::InvalidEngineState(format!("result for dead record {target}")))?;
        match &mut rec {
            EvalRecord::And(and) => {
                and.to_complete += 1;
                let join_pointer = self.stack.len();
                let frame = and.frame.as_ref().map(|f| Rc::new(fork_frame(f)));
                self.stack.push(Some(EvalRecord::Join(JoinRecord {
                    base: NodeBase {
                        db_node: and.base.db_node,
                        context: Vec::new(),
                        parent: Some(target),
                        identifier: and.base.identifier,
                        transform: and.base.transform.clone(),
                        pointer: join_pointer,
                        on_cycle: false,
                    },
                    real_parent: and.base.parent,
                    left_node: msg.node.ok_or_else(|| {
                        EngineError::InvalidEngineState("conjunction's left produced no node".into())
                    })?,
                })));
                self.queue.push(Action::Eval(EvalRequest {
                    node_id: and.right_child,
                    context: msg.result,
                    parent: Some(join_pointer),
                    identifier: and.base.identifier,
                    transform: Transformations::new(),
                    call_origin: None,
                    frame,
                }));
            }
            EvalRecord::Join(join) => {
                let node = msg
                    .node
                    .ok_or_else(|| EngineError::InvalidEngineState("conjunction's right produced no node".into()))?;
                if let Some(combined) = self.target.add_and(&[join.left_node, node]) {
                    if let Some(tctx) = join.base.transform.apply(msg.result) {
                        self.push_result(join.real_parent, tctx, Some(combined), Some(target));
                    }
                }
            }
            EvalRecord::Call(call) => {
                let raw_result = msg.result;
                if let Some(joined) =
                    self.join_call_result(&call.base.context, &call.call_args, &raw_result)
                {
                    if let Some(tctx) = call.base.transform.apply(joined) {
                        self.push_result(call.base.parent, tctx, msg.node, Some(target));
                    }
                }
            }
            EvalRecord::Or(or) => {
                let frozen = freeze_context(&msg.result);
                let node = msg.node.unwrap_or(NODE_FALSE);
                if or.base.on_cycle {
                    let parent = or.base.parent;
                    let merged = collapse_one(&mut or.results, &mut *self.target, frozen.clone(), node);
                    if merged != NODE_FALSE {
                        if let Some(tctx) = or.base.transform.apply(frozen) {
                            self.push_result(parent, tctx, Some(merged), Some(target));
                        }
                    }
                } else {
                    or.results.insert(frozen, node);
                }
            }
            EvalRecord::Not(not) => {
                not.nodes.insert(msg.node.unwrap_or(NODE_TRUE));
            }
            EvalRecord::Define(def) => {
                let frozen = freeze_context(&msg.result);
                let node = msg.node.unwrap_or(NODE_FALSE);
                if def.is_cycle_root || def.base.on_cycle || !def.waiters.is_empty() {
                    let merged = collapse_one(&mut def.results, &mut *self.target, frozen.clone(), node);
                    if def.base.on_cycle && merged != NODE_FALSE {
                        if let Some(tctx) = def.base.transform.apply(frozen.clone()) {
                            self.push_result(def.base.parent, tctx, Some(merged), Some(target));
                        }
                    }
                    if merged != NODE_FALSE {
                        for waiter in def.waiters.iter_mut().filter(|w| !w.notified) {
                            if def.is_ground {
                                self.queue.push(Action::complete(waiter.parent, None));
                                waiter.notified = true;
                            }
                            if let Some(tctx) = waiter.transform.apply(frozen.clone()) {
                                self.queue.push(Action::result(waiter.parent, tctx, Some(merged), None, false));
                            }
                        }
                    }
                } else {
                    def.results.insert(frozen, node);
                }
            }
        }
        self.stack[target] = Some(rec);
        Ok(())
    }

    fn deliver_complete(&mut self, msg: CompleteMsg, top_results: &mut Vec<QueryResult>) -> Result<(), EngineError> {
        let Some(target) = msg.target else {
            // A top-level `complete` just means the trampoline is drained of
            // this branch; nothing further to record beyond the results
            // already pushed to `top_results` via `push_result`.
            return Ok(());
        };
        let finished = {
            let rec = self.stack[target]
                .as_mut()
                .ok_or_else(|| EngineError::InvalidEngineState(format!("complete for dead record {target}")))?;
            match rec {
                EvalRecord::And(and) => {
                    and.to_complete -= 1;
                    and.to_complete == 0
                }
                EvalRecord::Join(_) => true,
                EvalRecord::Call(_) => true,
                EvalRecord::Or(or) => {
                    or.to_complete -= 1;
                    or.to_complete == 0
                }
                EvalRecord::Not(_) => true,
                EvalRecord::Define(def) => {
                    def.to_complete -= 1;
                    def.to_complete == 0
                }
            }
        };
        if !finished {
            return Ok(());
        }
        self.finish_record(target, top_results)
    }

    /// Finalizes a record once every child it was waiting on has completed:
    /// collapses multi-proof result sets (`Or`/`Define`), forwards the final
    /// results and a single `complete` to the parent, and frees the slot.
    fn finish_record(&mut self, pointer: usize, top_results: &mut Vec<QueryResult>) -> Result<(), EngineError> {
        let rec = self.stack[pointer]
            .take()
            .ok_or_else(|| EngineError::InvalidEngineState(format!("finishing dead record {pointer}")))?;
        match rec {
            EvalRecord::And(and) => {
                self.push_complete(and.base.parent, Some(pointer));
            }
            EvalRecord::Join(join) => {
                self.push_complete(join.base.parent, Some(pointer));
            }
            EvalRecord::Call(call) => {
                self.push_complete(call.base.parent, Some(pointer));
            }
            EvalRecord::Not(not) => {
                let base = not.base;
                let node = if not.nodes.is_empty() {
                    NODE_TRUE
                } else {
                    let children: Vec<_> = not.nodes.into_iter().collect();
                    let or_node = self.target.add_or(&children, true).unwrap_or(NODE_FALSE);
                    self.target.add_not(or_node)
                };
                self.push_complete(base.parent, Some(pointer));
                if let Some(tctx) = base.transform.apply(base.context) {
                    self.push_result(base.parent, tctx, Some(node), Some(pointer));
                }
            }
            EvalRecord::Or(mut or) => {
                let target = &mut *self.target;
                let readonly = !or.base.on_cycle;
                or.results.collapse(|_ctx, nodes| target.add_or(nodes, readonly).unwrap_or(NODE_FALSE));
                self.push_complete(or.base.parent, Some(pointer));
                if !or.base.on_cycle {
                    for (ctx, node) in or.results.iter_collapsed() {
                        if *node == NODE_FALSE {
                            continue;
                        }
                        if let Some(tctx) = or.base.transform.apply(ctx.clone()) {
                            if or.base.parent.is_none() {
                                top_results.push((tctx, *node));
                            } else {
                                self.push_result(or.base.parent, tctx, Some(*node), Some(pointer));
                            }
                        }
                    }
                }
            }
            EvalRecord::Define(def) => {
                self.finish_define_record(def, top_results)?;
            }
        }
        Ok(())
    }

    /// `finish_define` handles the no-candidate-clauses short circuit, which
    /// never allocated any children and so needs no generic `to_complete`
    /// bookkeeping before the definition is finalized.
    fn finish_define(&mut self, pointer: usize) -> Result<(), EngineError> {
        let mut top_results = Vec::new();
        self.finish_record(pointer, &mut top_results)?;
        debug_assert!(top_results.is_empty(), "a Define is never the top-level record");
        Ok(())
    }

    fn finish_define_record(
        &mut self,
        mut def: DefineRecord,
        top_results: &mut Vec<QueryResult>,
    ) -> Result<(), EngineError> {
        let target = &mut *self.target;
        def.results.collapse(|_ctx, nodes| target.add_or(nodes, false).unwrap_or(NODE_FALSE));
        let final_results: Vec<QueryResult> = def
            .results
            .iter_collapsed()
            .filter(|(_, node)| **node != NODE_FALSE)
            .map(|(ctx, node)| (ctx.clone(), *node))
            .collect();

        if self.config.label_all {
            for (_, node) in &final_results {
                self.target.add_name(format!("{}", def.functor), *node, NameLabel::Named);
            }
        }

        self.cache.store(&def.functor, &def.args_key, final_results.clone());
        self.cache.deactivate(&def.functor, &def.args_key);

        // An on-cycle member already streamed every result to its parent as
        // it arrived (`deliver_result`'s live path); replaying them again
        // here would double them up. The cycle root itself is never
        // `on_cycle` (the walk marks everything strictly between the
        // re-entrant caller and the root, not the root), so it still
        // replays normally.
        // Every complete destined for this batch is queued before any of
        // this batch's results: the queue pops LIFO, so that ordering is
        // what makes the results pop (and get recorded) first. A waiter's
        // parent is typically a `Call` record, which finishes on its very
        // first complete — if that complete popped before the matching
        // result, the result would later arrive at an already-freed slot.
        self.push_complete(def.base.parent, Some(def.base.pointer));
        let mut notified_targets: HashSet<Option<usize>> = HashSet::new();
        for waiter in &def.waiters {
            if waiter.notified {
                continue;
            }
            if notified_targets.insert(waiter.parent) {
                self.push_complete(waiter.parent, Some(def.base.pointer));
            }
        }

        if !def.base.on_cycle {
            for (ctx, node) in &final_results {
                if let Some(tctx) = def.base.transform.apply(ctx.clone()) {
                    if def.base.parent.is_none() {
                        top_results.push((tctx, *node));
                    } else {
                        self.push_result(def.base.parent, tctx, Some(*node), Some(def.base.pointer));
                    }
                }
            }
        }
        for waiter in def.waiters.into_iter().filter(|w| !w.notified) {
            for (ctx, node) in &final_results {
                if let Some(tctx) = waiter.transform.apply(ctx.clone()) {
                    if waiter.parent.is_none() {
                        top_results.push((tctx, *node));
                    } else {
                        self.push_result(waiter.parent, tctx, Some(*node), Some(def.base.pointer));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walks `parent` links from `from` up to the still-active `to` (the
    /// original engine's `createCycle`), marking every record it passes
    /// through `on_cycle = true` so it switches from buffering results to
    /// streaming them as they arrive. Fails the whole query if the walk
    /// crosses a `Not` (the definition would depend on its own negation,
    /// which has no fixed point) or an indirect call (a `call/N`-style
    /// dispatch cannot be folded into tabling since its target was computed
    /// rather than a static clause reference).
    fn walk_cycle_path(
        &mut self,
        from: Option<usize>,
        to: usize,
        functor: &str,
        arity: usize,
    ) -> Result<(), EngineError> {
        let mut cur = from;
        while let Some(p) = cur {
            if p == to {
                return Ok(());
            }
            let Some(rec) = self.stack[p].as_mut() else {
                return Err(EngineError::InvalidEngineState(format!("cycle walk crossed dead record {p}")));
            };
            if matches!(rec, EvalRecord::Not(_)) {
                return Err(EngineError::NegativeCycle { functor: format!("{functor}/{arity}") });
            }
            if let EvalRecord::Call(call) = rec {
                if call.indirect {
                    return Err(EngineError::IndirectCallCycleError { functor: format!("{functor}/{arity}") });
                }
            }
            if rec.base().on_cycle {
                return Ok(());
            }
            rec.base_mut().on_cycle = true;
            cur = rec.base().parent;
        }
        Err(EngineError::IndirectCallCycleError { functor: format!("{functor}/{arity}") })
    }
}

/// Merges one live result into an on-cycle `ResultSet`: the set is
/// guaranteed collapsed on exit (entering collapsed mode on the first call,
/// a no-op after). A result seen for the first time is wrapped in its own
/// mutable `Or` so a later recursive proof can extend it in place via
/// `add_disjunct`; a result already present is extended directly — this is
/// what produces the self-referential `Or` a genuine positive cycle grounds
/// to; a recursive call's own proof can route the same node id back to the
/// definition it started from.
fn collapse_one(
    results: &mut ResultSet<GroundNodeId>,
    target: &mut dyn GroundTarget,
    frozen: Context,
    node: GroundNodeId,
) -> GroundNodeId {
    if !results.is_collapsed() {
        results.collapse(|_ctx, nodes| target.add_or(nodes, false).unwrap_or(NODE_FALSE));
    }
    if let Some(&existing) = results.get_collapsed(&frozen) {
        target.add_disjunct(existing, node);
        existing
    } else {
        let wrapped = target.add_or(&[node], false).unwrap_or(NODE_FALSE);
        results.insert(frozen, wrapped);
        wrapped
    }
}

/// Convenience entry point mirroring the original engine's `call`: grounds
/// `functor(args...)` against `database`, honoring `config.unknown` for a
/// predicate with no compiled definition.
pub fn call(
    database: &dyn Database,
    target: &mut dyn GroundTarget,
    config: EngineConfig,
    functor: &str,
    arity: usize,
    args: Context,
) -> Result<Vec<QueryResult>, EngineError> {
    let Some(node) = database.find_define(functor, arity) else {
        return match config.unknown {
            UnknownPolicy::Error => Err(EngineError::UnknownClause { functor: functor.to_string(), arity }),
            UnknownPolicy::Fail => Ok(Vec::new()),
        };
    };
    let mut executor = Executor::new(database, target, config);
    executor.query(node, args)
}
