//! The expression evaluator.
//!
//! [`Evaluator`] walks an [`Expr`] part by part on a value stack. Literals,
//! variable references and path steps push one sequence each; operations that
//! take a left operand pop it and evaluate their own argument sub-expressions
//! with the focus they need. Whatever remains on the stack once the parts are
//! exhausted is concatenated into the result, so a sequence never nests.
//!
//! Evaluation is synchronous and single-threaded. Recursion depth is bounded
//! by [`EvaluatorConfig::max_depth`], and the context's cancellation flag is
//! polled after every part and every [`EvaluatorConfig::poll_interval`] loop
//! iterations.
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::engine::config::EvaluatorConfig;
use crate::engine::context::Context;
use crate::engine::functions::{CallCtx, FunctionLibrary, Lookup, effective_namespace};
use crate::engine::runtime::{Error, ErrorCode, ErrorKind};
use crate::ir::{Axis, ComparisonOp, Expr, KindTest, NameTest, NodeCompOp, OpKind, Operation, Part};
use crate::model::{QName, XdmNode};
use crate::schema::TypeRegistry;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};

mod arithmetic;
pub mod atomize;
mod axes;
pub(crate) mod casting;
mod comparison;
mod node_ops;
pub(crate) mod numeric;
mod quantifiers;
mod set_ops;
mod type_check;
mod xml_helpers;

use atomize::{atomize_node, atomize_sequence, effective_boolean_value};
use casting::{cast_atomic, parse_lexical};

/// Context item, position and size seen by one sub-expression.
#[derive(Debug, Clone)]
pub struct Focus<N> {
    pub item: Option<XdmItem<N>>,
    pub position: usize,
    pub size: usize,
}

impl<N> Focus<N> {
    pub fn new(item: Option<XdmItem<N>>, position: usize, size: usize) -> Self {
        Self { item, position, size }
    }

    fn top(item: Option<XdmItem<N>>) -> Self {
        Self::new(item, 1, 1)
    }
}

struct Operand<N> {
    value: XdmSequence<N>,
    // Result of a reverse-axis step, held in document order. Predicates
    // applied directly to it count positions in axis order.
    reverse_axis: bool,
}

impl<N> Operand<N> {
    fn plain(value: XdmSequence<N>) -> Self {
        Self {
            value,
            reverse_axis: false,
        }
    }
}

/// Evaluates expression IR against the nodes of a typed document.
///
/// The function library and type registry are built once and shared; all
/// per-evaluation state lives in the [`Context`].
///
/// ```
/// use xbrl_xpath::engine::{Context, Evaluator};
/// use xbrl_xpath::ir::ArithOp;
/// use xbrl_xpath::ir::builder::{arith, int};
/// use xbrl_xpath::model::simple::SimpleNode;
/// use xbrl_xpath::xdm::XdmAtomicValue;
///
/// let evaluator = Evaluator::<SimpleNode>::with_defaults();
/// let mut ctx = Context::builder().build();
/// let result = evaluator
///     .evaluate(&arith(int(40), ArithOp::Add, int(2)), &mut ctx)
///     .unwrap();
/// assert_eq!(
///     result.first().and_then(|i| i.as_atomic().cloned()),
///     Some(XdmAtomicValue::Integer(42))
/// );
/// ```
pub struct Evaluator<N> {
    functions: Arc<FunctionLibrary<N>>,
    types: Arc<TypeRegistry>,
    config: EvaluatorConfig,
}

impl<N> Clone for Evaluator<N> {
    fn clone(&self) -> Self {
        Self {
            functions: Arc::clone(&self.functions),
            types: Arc::clone(&self.types),
            config: self.config,
        }
    }
}

impl<N: XdmNode> Evaluator<N> {
    pub fn new(
        functions: Arc<FunctionLibrary<N>>,
        types: Arc<TypeRegistry>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            functions,
            types,
            config,
        }
    }

    /// Builtin functions, the xbrli item types and default limits.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(FunctionLibrary::with_builtins()),
            Arc::new(TypeRegistry::with_xbrl_item_types()),
            EvaluatorConfig::default(),
        )
    }

    pub fn functions(&self) -> &FunctionLibrary<N> {
        &self.functions
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate `expr` with the context's context item as focus.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole evaluation; there are no partial results.
    /// Cancellation through the context's flag yields
    /// [`ErrorKind::BudgetExceeded`].
    pub fn evaluate(&self, expr: &Expr, ctx: &mut Context<N>) -> Result<XdmSequence<N>, Error> {
        let focus = Focus::top(ctx.context_item().cloned());
        self.eval_expr(expr, ctx, &focus, 0)
    }

    /// Effective boolean value of the result.
    pub fn evaluate_boolean(&self, expr: &Expr, ctx: &mut Context<N>) -> Result<bool, Error> {
        effective_boolean_value(&self.evaluate(expr, ctx)?)
    }

    /// Atomized single-item result, optionally cast to `target`. An empty
    /// result is `None`; more than one item is `err:XPTY0004`.
    pub fn evaluate_atomic(
        &self,
        expr: &Expr,
        ctx: &mut Context<N>,
        target: Option<&ExpandedName>,
    ) -> Result<Option<XdmAtomicValue>, Error> {
        let atoms = self.atomize(self.evaluate(expr, ctx)?)?;
        let Some(value) = single_atomic(atoms, "expression result")? else {
            return Ok(None);
        };
        match target {
            Some(t) => cast_atomic(&self.types, &value, t).map(Some),
            None => Ok(Some(value)),
        }
    }

    /// Evaluate through the context's result cache.
    pub fn evaluate_cached(
        &self,
        key: &str,
        expr: &Expr,
        ctx: &mut Context<N>,
    ) -> Result<XdmSequence<N>, Error> {
        if let Some(hit) = ctx.cached(key) {
            return Ok(hit);
        }
        let value = self.evaluate(expr, ctx)?;
        ctx.store_cached(key, value.clone());
        Ok(value)
    }

    pub fn atomize(&self, seq: XdmSequence<N>) -> Result<XdmSequence<N>, Error> {
        atomize_sequence(&self.types, seq)
    }

    fn poll(&self, ctx: &Context<N>) -> Result<(), Error> {
        if ctx.is_cancelled() {
            warn!("evaluation cancelled");
            return Err(Error::budget_exceeded());
        }
        Ok(())
    }

    /// Poll on every `poll_interval`-th iteration of a loop.
    fn tick(&self, ctx: &Context<N>, iteration: usize) -> Result<(), Error> {
        if iteration % self.config.poll_interval.max(1) == 0 {
            self.poll(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn eval_expr(
        &self,
        expr: &Expr,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<XdmSequence<N>, Error> {
        if depth > self.config.max_depth {
            warn!(max_depth = self.config.max_depth, "expression nesting limit reached");
            return Err(Error::depth_exceeded(self.config.max_depth));
        }
        let result = self.run_parts(expr, ctx, focus, depth);
        let header = expr.parts().iter().find_map(|p| match p {
            Part::Header(h) => Some(h),
            _ => None,
        });
        if let Some(h) = header {
            if let (Some(kind), Ok(value)) = (ctx.trace(), &result) {
                debug!(?kind, source = %h.source, items = value.len(), "expression evaluated");
            }
            ctx.set_trace(None);
        }
        result
    }

    fn run_parts(
        &self,
        expr: &Expr,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<XdmSequence<N>, Error> {
        let mut stack: Vec<Operand<N>> = Vec::new();
        for part in expr.parts() {
            match part {
                Part::Header(h) => ctx.set_trace(h.trace),
                Part::Literal(v) => stack.push(Operand::plain(XdmSequence::one(v.clone()))),
                Part::VariableRef(name) => {
                    let value = ctx.variable(name).cloned().ok_or_else(|| {
                        Error::from_code(ErrorCode::XPST0008, format!("variable ${name} is not in scope"))
                    })?;
                    stack.push(Operand::plain(value));
                }
                Part::NameTest(test) => stack.push(self.name_step(test, focus)?),
                Part::Operation(op) => {
                    let left = if op.op.takes_left_operand() {
                        Some(stack.pop().ok_or_else(|| {
                            Error::from_code(
                                ErrorCode::XPST0003,
                                format!("{:?} has no left operand", op.op),
                            )
                        })?)
                    } else {
                        None
                    };
                    let value = self
                        .eval_operation(op, left, ctx, focus, depth)
                        .map_err(|e| e.at(op.location))?;
                    stack.push(value);
                }
                Part::Quantified(q) => {
                    let value = self
                        .eval_quantified(q, ctx, focus, depth)
                        .map_err(|e| e.at(q.location))?;
                    stack.push(Operand::plain(value));
                }
            }
            self.poll(ctx)?;
        }
        Ok(XdmSequence::concat(stack.into_iter().map(|o| o.value)))
    }

    fn eval_operation(
        &self,
        op: &Operation,
        left: Option<Operand<N>>,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<Operand<N>, Error> {
        let depth = depth + 1;
        let (left, left_reverse) = match left {
            Some(o) => (o.value, o.reverse_axis),
            None => (XdmSequence::empty(), false),
        };
        let arg = |i: usize| -> Result<&Expr, Error> {
            op.args.get(i).ok_or_else(|| {
                Error::from_code(
                    ErrorCode::XPST0003,
                    format!("{:?} is missing operand {}", op.op, i + 1),
                )
            })
        };
        let value = match &op.op {
            OpKind::Arithmetic(a) => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                match self.operand_pair(left, right, "arithmetic")? {
                    Some((x, y)) => XdmSequence::one(arithmetic::arithmetic(*a, &x, &y)?),
                    None => XdmSequence::empty(),
                }
            }
            OpKind::ValueCompare(c) => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                match self.operand_pair(left, right, "value comparison")? {
                    Some((x, y)) => XdmSequence::boolean(comparison::value_compare(&x, &y, *c)?),
                    None => XdmSequence::empty(),
                }
            }
            OpKind::GeneralCompare(c) => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                XdmSequence::boolean(self.general_compare(left, right, *c)?)
            }
            OpKind::NodeCompare(c) => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                XdmSequence::boolean(node_compare(left, right, *c)?)
            }
            OpKind::Set(s) => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                set_ops::set_operation(*s, left, right)?
            }
            OpKind::And | OpKind::Or => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                let (l, r) = (effective_boolean_value(&left)?, effective_boolean_value(&right)?);
                XdmSequence::boolean(if op.op == OpKind::And { l && r } else { l || r })
            }
            OpKind::To => {
                let right = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                match self.operand_pair(left, right, "range")? {
                    Some((lo, hi)) => {
                        XdmSequence::range_inclusive(range_bound(&lo)?, range_bound(&hi)?)
                    }
                    None => XdmSequence::empty(),
                }
            }
            OpKind::Negate | OpKind::UnaryPlus => {
                let operand = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                match single_atomic(self.atomize(operand)?, "unary operand")? {
                    Some(v) => XdmSequence::one(unary(&op.op, &v)?),
                    None => XdmSequence::empty(),
                }
            }
            OpKind::InstanceOf(t) => XdmSequence::boolean(type_check::instance_of(&self.types, &left, t)),
            OpKind::Treat(t) => {
                if !type_check::instance_of(&self.types, &left, t) {
                    return Err(Error::from_code(
                        ErrorCode::XPDY0050,
                        format!("value does not match required type {}", type_check::describe(t)),
                    ));
                }
                left
            }
            OpKind::Cast { target, optional } => match self.cast(left, target, *optional)? {
                Some(v) => XdmSequence::one(v),
                None => XdmSequence::empty(),
            },
            OpKind::Castable { target, optional } => {
                XdmSequence::boolean(self.cast(left, target, *optional).is_ok())
            }
            OpKind::Child => {
                let right = arg(0)?;
                let nodes = set_ops::require_nodes(left, "path step").map_err(|_| {
                    Error::from_code(ErrorCode::XPTY0019, "left side of '/' must contain only nodes")
                })?;
                self.path(nodes, right, ctx, depth)?
            }
            OpKind::Descendant => {
                let right = arg(0)?;
                let nodes = set_ops::require_nodes(left, "path step").map_err(|_| {
                    Error::from_code(ErrorCode::XPTY0019, "left side of '//' must contain only nodes")
                })?;
                let expanded = self.descendants_or_self(nodes, ctx)?;
                self.path(expanded, right, ctx, depth)?
            }
            OpKind::Root { descendant } => {
                let root = self.focus_node(focus, "/")?.root();
                match (op.args.first(), descendant) {
                    (None, false) => XdmSequence::one(XdmItem::Node(root)),
                    (Some(rel), false) => self.path(vec![root], rel, ctx, depth)?,
                    (Some(rel), true) => {
                        let all = self.descendants_or_self(vec![root], ctx)?;
                        self.path(all, rel, ctx, depth)?
                    }
                    (None, true) => {
                        return Err(Error::from_code(ErrorCode::XPST0003, "'//' must be followed by a step"));
                    }
                }
            }
            OpKind::Predicate => {
                let mut current = if left_reverse { reversed(left) } else { left };
                for pred in &op.args {
                    current = match constant_position(pred) {
                        Some(position) => position
                            .and_then(|p| current.item_at(p))
                            .map_or_else(XdmSequence::empty, |item| XdmSequence::from_items(vec![item])),
                        None => self.filter(current, pred, ctx, depth)?,
                    };
                }
                if left_reverse { reversed(current) } else { current }
            }
            OpKind::Sequence => {
                let mut out = XdmSequence::empty();
                for a in &op.args {
                    out.extend_from(self.eval_expr(a, ctx, focus, depth)?);
                }
                out
            }
            OpKind::If => {
                let cond = self.eval_expr(arg(0)?, ctx, focus, depth)?;
                let branch = if effective_boolean_value(&cond)? { arg(1)? } else { arg(2)? };
                self.eval_expr(branch, ctx, focus, depth)?
            }
            OpKind::ContextItem => match &focus.item {
                Some(item) => XdmSequence::one(item.clone()),
                None => return Err(missing_focus(".")),
            },
            OpKind::Parent => {
                let node = self.focus_node(focus, "..")?;
                XdmSequence::from_items(node.parent().map(XdmItem::Node).into_iter().collect())
            }
            OpKind::FunctionCall { name, axis } => {
                return self.call_function(name, *axis, &op.args, op, ctx, focus, depth);
            }
        };
        Ok(Operand::plain(value))
    }

    /// Atomize both operands of a value operator. `None` when either side is
    /// empty.
    fn operand_pair(
        &self,
        left: XdmSequence<N>,
        right: XdmSequence<N>,
        what: &str,
    ) -> Result<Option<(XdmAtomicValue, XdmAtomicValue)>, Error> {
        let l = single_atomic(self.atomize(left)?, what)?;
        let r = single_atomic(self.atomize(right)?, what)?;
        Ok(l.zip(r))
    }

    fn general_compare(
        &self,
        left: XdmSequence<N>,
        right: XdmSequence<N>,
        op: ComparisonOp,
    ) -> Result<bool, Error> {
        let left = self.atomize(left)?;
        let right = self.atomize(right)?;
        for a in left.iter() {
            let XdmItem::Atomic(a) = a else { continue };
            for b in right.iter() {
                let XdmItem::Atomic(b) = b else { continue };
                if comparison::general_compare_pair(&a, &b, op)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn cast(
        &self,
        value: XdmSequence<N>,
        target: &ExpandedName,
        optional: bool,
    ) -> Result<Option<XdmAtomicValue>, Error> {
        match single_atomic(self.atomize(value)?, "cast operand")? {
            Some(v) => cast_atomic(&self.types, &v, target).map(Some),
            None if optional => Ok(None),
            None => Err(Error::type_error(format!(
                "empty sequence cannot be cast to {target}"
            ))),
        }
    }

    fn focus_node(&self, focus: &Focus<N>, what: &str) -> Result<N, Error> {
        match &focus.item {
            Some(XdmItem::Node(n)) => Ok(n.clone()),
            Some(XdmItem::Atomic(a)) => Err(Error::from_code(
                ErrorCode::XPTY0020,
                format!("{what} requires a node context item, got {}", a.type_name()),
            )),
            None => Err(missing_focus(what)),
        }
    }

    /// Axis step with a name test from the focus node.
    fn name_step(&self, test: &NameTest, focus: &Focus<N>) -> Result<Operand<N>, Error> {
        let axis = test.effective_axis();
        let node = self.focus_node(focus, axis.as_str())?;
        let principal = axes::principal_kind(axis);
        let matched: Vec<N> = axes::step_axis(&node, axis)
            .into_iter()
            .filter(|n| node_ops::matches_name_test(n, test, principal))
            .collect();
        trace!(axis = axis.as_str(), matched = matched.len(), "axis step");
        if axis == Axis::Attribute {
            for a in matched.iter().filter(|a| a.schema_type().is_some()) {
                atomize_node(&self.types, a)?;
            }
        }
        Ok(step_result(matched, axis))
    }

    fn kind_step(&self, test: &KindTest, axis: Axis, focus: &Focus<N>) -> Result<Operand<N>, Error> {
        let node = self.focus_node(focus, axis.as_str())?;
        let matched: Vec<N> = axes::step_axis(&node, axis)
            .into_iter()
            .filter(|n| node_ops::matches_kind_test(&self.types, n, test))
            .collect();
        trace!(axis = axis.as_str(), matched = matched.len(), "kind test step");
        Ok(step_result(matched, axis))
    }

    /// Evaluate `step` once per node with that node as focus, then order the
    /// combined result.
    fn path(
        &self,
        nodes: Vec<N>,
        step: &Expr,
        ctx: &mut Context<N>,
        depth: usize,
    ) -> Result<XdmSequence<N>, Error> {
        let size = nodes.len();
        let mut out: Vec<XdmItem<N>> = Vec::new();
        for (i, n) in nodes.into_iter().enumerate() {
            self.tick(ctx, i + 1)?;
            let focus = Focus::new(Some(XdmItem::Node(n)), i + 1, size);
            out.extend(self.eval_expr(step, ctx, &focus, depth)?);
        }
        finish_path(out)
    }

    fn descendants_or_self(&self, nodes: Vec<N>, ctx: &Context<N>) -> Result<Vec<N>, Error> {
        let mut all = Vec::new();
        for (i, n) in nodes.iter().enumerate() {
            self.tick(ctx, i + 1)?;
            all.extend(axes::step_axis(n, Axis::DescendantOrSelf));
        }
        set_ops::sorted_distinct(all)
    }

    fn filter(
        &self,
        items: XdmSequence<N>,
        pred: &Expr,
        ctx: &mut Context<N>,
        depth: usize,
    ) -> Result<XdmSequence<N>, Error> {
        let size = items.len();
        let mut kept = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let position = i + 1;
            self.tick(ctx, position)?;
            let focus = Focus::new(Some(item), position, size);
            let result = self.eval_expr(pred, ctx, &focus, depth)?;
            if predicate_truth(&result, position)? {
                kept.extend(focus.item);
            }
        }
        Ok(XdmSequence::from_items(kept))
    }

    #[allow(clippy::too_many_arguments)]
    fn call_function(
        &self,
        name: &QName,
        axis: Option<Axis>,
        arg_exprs: &[Expr],
        op: &Operation,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<Operand<N>, Error> {
        let expanded = name.expanded();
        if let Some(custom) = ctx.custom_function(&expanded).cloned() {
            let args = self.eval_args(arg_exprs, ctx, focus, depth)?;
            trace!(function = %name, arity = args.len(), "custom function");
            let call = CallCtx {
                name,
                location: op.location,
                focus,
                context: &*ctx,
                types: &self.types,
            };
            return match custom.call(&call, &args).map_err(|e| wrap_call_error(e, name))? {
                Some(v) => Ok(Operand::plain(v)),
                None => Err(Error::function_unavailable(name)),
            };
        }
        if name.prefix.is_none()
            && name.ns_uri.is_none()
            && let Some(test) = node_ops::kind_test_from_call(&name.local, arg_exprs)
        {
            let test = test?;
            let default_axis = if matches!(test, KindTest::Attribute { .. }) {
                Axis::Attribute
            } else {
                Axis::Child
            };
            return self.kind_step(&test, axis.unwrap_or(default_axis), focus);
        }
        let Some(ns) = effective_namespace(name) else {
            return Err(Error::function_unavailable(name));
        };
        let args = self.eval_args(arg_exprs, ctx, focus, depth)?;
        let func = match self.functions.lookup(ns, &name.local, args.len()) {
            Lookup::Found(f) => f,
            Lookup::WrongArity(arities) => {
                return Err(Error::arity(format!(
                    "{name}() accepts {} argument(s), got {}",
                    arities.iter().join(" or "),
                    args.len()
                )));
            }
            Lookup::NotFound => return Err(Error::function_unavailable(name)),
        };
        trace!(function = %name, arity = args.len(), "builtin function");
        let call = CallCtx {
            name,
            location: op.location,
            focus,
            context: ctx,
            types: &self.types,
        };
        func(&call, &args)
            .map(Operand::plain)
            .map_err(|e| wrap_call_error(e, name))
    }

    fn eval_args(
        &self,
        exprs: &[Expr],
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<Vec<XdmSequence<N>>, Error> {
        exprs
            .iter()
            .map(|e| self.eval_expr(e, ctx, focus, depth))
            .collect()
    }
}

fn wrap_call_error(e: Error, name: &QName) -> Error {
    if e.is_kind(ErrorKind::Arity) || e.is_kind(ErrorKind::Type) {
        e.in_function(name)
    } else {
        e
    }
}

fn missing_focus(what: &str) -> Error {
    Error::from_code(
        ErrorCode::XPDY0002,
        format!("{what} requires a context item"),
    )
}

fn step_result<N: XdmNode>(mut nodes: Vec<N>, axis: Axis) -> Operand<N> {
    let reverse_axis = axes::is_reverse(axis);
    if reverse_axis {
        nodes.reverse();
    }
    Operand {
        value: nodes.into_iter().map(XdmItem::Node).collect(),
        reverse_axis,
    }
}

/// All nodes in document order without duplicates, or all atomic values in
/// evaluation order.
fn finish_path<N: XdmNode>(items: Vec<XdmItem<N>>) -> Result<XdmSequence<N>, Error> {
    let nodes = items.iter().filter(|i| i.as_node().is_some()).count();
    if nodes == 0 {
        return Ok(XdmSequence::from_items(items));
    }
    if nodes != items.len() {
        return Err(Error::from_code(
            ErrorCode::XPTY0018,
            "path result mixes nodes and atomic values",
        ));
    }
    let nodes = items
        .into_iter()
        .filter_map(|i| match i {
            XdmItem::Node(n) => Some(n),
            XdmItem::Atomic(_) => None,
        })
        .collect();
    Ok(set_ops::sorted_distinct(nodes)?
        .into_iter()
        .map(XdmItem::Node)
        .collect())
}

fn single_atomic<N: XdmNode>(
    seq: XdmSequence<N>,
    what: &str,
) -> Result<Option<XdmAtomicValue>, Error> {
    if seq.len() > 1 {
        return Err(Error::type_error(format!(
            "{what} must be a single item, got a sequence of {}",
            seq.len()
        )));
    }
    match seq.into_single() {
        None => Ok(None),
        Some(XdmItem::Atomic(a)) => Ok(Some(a)),
        Some(XdmItem::Node(_)) => Err(Error::type_error(format!("{what} did not atomize"))),
    }
}

/// A numeric predicate selects the item at that position; anything else
/// goes through the effective boolean value.
fn predicate_truth<N: XdmNode>(result: &XdmSequence<N>, position: usize) -> Result<bool, Error> {
    if result.len() == 1
        && let Some(XdmItem::Atomic(a)) = result.first()
        && let Some(n) = numeric::classify(&a)
    {
        return Ok(match n {
            numeric::NumKind::Int(i) => usize::try_from(i).is_ok_and(|i| i == position),
            other => other.to_f64() == position as f64,
        });
    }
    effective_boolean_value(result)
}

/// The position selected by a predicate that is a lone numeric literal;
/// `Some(None)` when no position can match.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn constant_position(pred: &Expr) -> Option<Option<usize>> {
    let [Part::Literal(v)] = pred.parts() else {
        return None;
    };
    match numeric::classify(v)? {
        numeric::NumKind::Int(i) => Some(usize::try_from(i).ok().filter(|p| *p >= 1)),
        other => {
            let f = other.to_f64();
            if f.fract() != 0.0 || f < 1.0 {
                return Some(None);
            }
            // Above 2^53 several positions compare equal to the same double.
            (f <= 9_007_199_254_740_992.0).then_some(Some(f as usize))
        }
    }
}

fn reversed<N>(seq: XdmSequence<N>) -> XdmSequence<N> {
    let mut items = seq.into_items();
    items.reverse();
    XdmSequence::from_items(items)
}

fn range_bound(v: &XdmAtomicValue) -> Result<i64, Error> {
    let v = match v {
        XdmAtomicValue::UntypedAtomic(s) => parse_lexical("integer", s, &|_| None)?,
        other => other.clone(),
    };
    v.as_i128()
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| {
            Error::type_error(format!("range bound must be an integer, got {}", v.type_name()))
        })
}

fn unary(op: &OpKind, v: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    let v = match v {
        XdmAtomicValue::UntypedAtomic(s) => parse_lexical("double", s, &|_| None)?,
        other => other.clone(),
    };
    match op {
        OpKind::Negate => numeric::negate(&v),
        _ if v.is_numeric() => Ok(v),
        _ => Err(Error::type_error(format!("unary + is not defined for {}", v.type_name()))),
    }
}

fn node_compare<N: XdmNode>(
    left: XdmSequence<N>,
    right: XdmSequence<N>,
    op: NodeCompOp,
) -> Result<bool, Error> {
    let single = |seq: XdmSequence<N>| -> Result<N, Error> {
        let len = seq.len();
        match seq.into_single() {
            Some(XdmItem::Node(n)) => Ok(n),
            Some(XdmItem::Atomic(a)) => Err(Error::type_error(format!(
                "node comparison requires nodes, got {}",
                a.type_name()
            ))),
            None => Err(Error::type_error(format!(
                "node comparison requires exactly one node per side, got {len}"
            ))),
        }
    };
    let (a, b) = (single(left)?, single(right)?);
    Ok(match op {
        NodeCompOp::Is => a == b,
        NodeCompOp::Precedes => set_ops::node_compare(&a, &b)?.is_lt(),
        NodeCompOp::Follows => set_ops::node_compare(&a, &b)?.is_gt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::*;
    use crate::ir::{ArithOp, SetOp};
    use crate::model::simple::{SimpleNode, attr as attr_node, doc, elem, text};

    fn eval(expr: &Expr, ctx: &mut Context<SimpleNode>) -> Result<XdmSequence<SimpleNode>, Error> {
        Evaluator::with_defaults().evaluate(expr, ctx)
    }

    fn ints(seq: &XdmSequence<SimpleNode>) -> Vec<i64> {
        seq.iter()
            .filter_map(|i| i.as_atomic().and_then(XdmAtomicValue::as_i128))
            .map(|i| i as i64)
            .collect()
    }

    fn tree() -> SimpleNode {
        doc()
            .child(
                elem("r")
                    .child(elem("a").attr(attr_node("id", "1")).child(text("x")))
                    .child(elem("a").attr(attr_node("id", "2")))
                    .child(elem("b")),
            )
            .build()
    }

    #[test]
    fn leftover_stack_values_are_concatenated() {
        let mut ctx = Context::builder().build();
        let e = Expr::new(int(1).0.into_iter().chain(int(2).0).collect());
        assert_eq!(ints(&eval(&e, &mut ctx).unwrap()), vec![1, 2]);
    }

    #[test]
    fn missing_left_operand_is_malformed() {
        let mut ctx = Context::builder().build();
        let e = op(OpKind::Arithmetic(ArithOp::Add), vec![int(1)]);
        let err = eval(&e, &mut ctx).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0003);
    }

    #[test]
    fn reverse_axis_predicates_count_from_the_step_origin() {
        let t = tree();
        let x = t.children()[0].children()[0].children()[0].clone();
        let mut ctx = Context::builder().with_context_node(x).build();
        let nearest = filter(axis(Axis::Ancestor, wildcard()), vec![int(1)]);
        let r = eval(&nearest, &mut ctx).unwrap();
        assert_eq!(r.len(), 1);
        let XdmItem::Node(n) = r.first().unwrap() else { panic!() };
        assert_eq!(n.name().unwrap().local, "a");
    }

    #[test]
    fn path_result_is_in_document_order() {
        let t = tree();
        let mut ctx = Context::builder().with_context_node(t).build();
        let e = union(root_desc(child("b")), root_desc(child("a")));
        let r = eval(&e, &mut ctx).unwrap();
        let names: Vec<String> = r
            .iter()
            .filter_map(|i| i.as_node().and_then(|n| n.name()).map(|q| q.local))
            .collect();
        assert_eq!(names, vec!["a", "a", "b"]);
    }

    #[test]
    fn mixed_path_results_are_rejected() {
        let t = tree();
        let mut ctx = Context::builder().with_context_node(t).build();
        let e = path(root_desc(child("a")), if_then_else(attr("id"), attr("id"), int(0)));
        assert!(eval(&e, &mut ctx).is_ok());
        let mixed = path(
            root_desc(child("a")),
            if_then_else(kind_step("text", None, vec![]), dot(), int(0)),
        );
        let err = eval(&mixed, &mut ctx).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0018);
    }

    #[test]
    fn set_operation_locations_attach_to_errors() {
        let mut ctx = Context::builder().build();
        let loc = crate::engine::runtime::SourceLocation::new(3, 1, 4);
        let e = at(set_op(int(1), SetOp::Union, int(2)), loc);
        let err = eval(&e, &mut ctx).unwrap_err();
        assert_eq!(err.location, Some(loc));
    }

    #[test]
    fn depth_bound_fails_fast() {
        let mut e = int(1);
        for _ in 0..20 {
            e = neg(e);
        }
        let evaluator = Evaluator::new(
            Arc::new(FunctionLibrary::with_builtins()),
            Arc::new(TypeRegistry::new()),
            EvaluatorConfig::default().with_max_depth(10),
        );
        let mut ctx: Context<SimpleNode> = Context::builder().build();
        let err = evaluator.evaluate(&e, &mut ctx).unwrap_err();
        assert!(err.is_kind(ErrorKind::DepthExceeded));
        let shallow = Evaluator::with_defaults();
        assert_eq!(ints(&shallow.evaluate(&e, &mut ctx).unwrap()), vec![1]);
    }
}
