//! `for`, `some` and `every` over range variables.

use std::ops::ControlFlow;

use crate::engine::context::Context;
use crate::engine::runtime::Error;
use crate::ir::{Quantified, QuantifierKind};
use crate::model::XdmNode;
use crate::xdm::XdmSequence;

use super::atomize::effective_boolean_value;
use super::{Evaluator, Focus};

struct Sweep<N> {
    out: XdmSequence<N>,
    iterations: usize,
}

impl<N: XdmNode> Evaluator<N> {
    pub(super) fn eval_quantified(
        &self,
        q: &Quantified,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
    ) -> Result<XdmSequence<N>, Error> {
        let mut sweep = Sweep {
            out: XdmSequence::empty(),
            iterations: 0,
        };
        let flow = self.bind_from(q, 0, ctx, focus, depth + 1, &mut sweep)?;
        Ok(match q.kind {
            QuantifierKind::For => sweep.out,
            QuantifierKind::Some => XdmSequence::boolean(flow.is_break()),
            // vacuously true when nothing falsified the clause
            QuantifierKind::Every => XdmSequence::boolean(flow.is_continue()),
        })
    }

    /// Bind `q.bindings[index..]` over the cross product of their domains.
    /// Each binding shadows a same-named variable and is undone before the
    /// next item, whether or not the nested evaluation failed.
    fn bind_from(
        &self,
        q: &Quantified,
        index: usize,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
        sweep: &mut Sweep<N>,
    ) -> Result<ControlFlow<()>, Error> {
        let Some(decl) = q.bindings.get(index) else {
            return self.run_clause(q, ctx, focus, depth, sweep);
        };
        let domain = self.eval_expr(&decl.binding, ctx, focus, depth)?;
        for item in domain {
            sweep.iterations += 1;
            self.tick(ctx, sweep.iterations)?;
            let previous = ctx.bind_variable(decl.variable.clone(), XdmSequence::one(item));
            let flow = self.bind_from(q, index + 1, ctx, focus, depth, sweep);
            ctx.restore_variable(&decl.variable, previous);
            if flow?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn run_clause(
        &self,
        q: &Quantified,
        ctx: &mut Context<N>,
        focus: &Focus<N>,
        depth: usize,
        sweep: &mut Sweep<N>,
    ) -> Result<ControlFlow<()>, Error> {
        let value = self.eval_expr(&q.clause.expr, ctx, focus, depth)?;
        Ok(match q.kind {
            QuantifierKind::For => {
                sweep.out.extend_from(value);
                ControlFlow::Continue(())
            }
            QuantifierKind::Some if effective_boolean_value(&value)? => ControlFlow::Break(()),
            QuantifierKind::Every if !effective_boolean_value(&value)? => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::ErrorKind;
    use crate::ir::ComparisonOp;
    use crate::ir::builder::*;
    use crate::model::simple::SimpleNode;
    use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};

    fn run(expr: &crate::ir::Expr, ctx: &mut Context<SimpleNode>) -> Result<XdmSequence<SimpleNode>, Error> {
        Evaluator::with_defaults().evaluate(expr, ctx)
    }

    fn boolean(seq: &XdmSequence<SimpleNode>) -> bool {
        matches!(seq.first(), Some(XdmItem::Atomic(XdmAtomicValue::Boolean(true))))
    }

    #[test]
    fn quantifiers_over_empty_domains() {
        let mut ctx = Context::builder().build();
        assert!(boolean(&run(&every(vec![("x", empty())], fn_call("false", vec![])), &mut ctx).unwrap()));
        assert!(!boolean(&run(&some(vec![("x", empty())], fn_call("true", vec![])), &mut ctx).unwrap()));
    }

    #[test]
    fn for_iterates_the_cross_product() {
        let mut ctx = Context::builder().build();
        let e = for_each(
            vec![("a", to(int(1), int(2))), ("b", seq(vec![int(10), int(20)]))],
            arith(var("a"), crate::ir::ArithOp::Add, var("b")),
        );
        let r = run(&e, &mut ctx).unwrap();
        let got: Vec<i128> = r.iter().filter_map(|i| i.as_atomic().and_then(XdmAtomicValue::as_i128)).collect();
        assert_eq!(got, vec![11, 21, 12, 22]);
    }

    #[test]
    fn bindings_are_restored_after_failure() {
        let x = ExpandedName::local("x");
        let mut ctx = Context::builder()
            .with_variable(x.clone(), XdmSequence::one(XdmAtomicValue::Integer(7)))
            .build();
        let failing = some(vec![("x", int(1))], value_cmp(var("x"), ComparisonOp::Eq, string("a")));
        assert!(run(&failing, &mut ctx).is_err());
        assert_eq!(ctx.variable(&x), Some(&XdmSequence::one(XdmAtomicValue::Integer(7))));
    }

    #[test]
    fn some_stops_at_the_first_witness() {
        let mut ctx = Context::builder().build();
        // the second item would fail to compare
        let e = some(
            vec![("x", seq(vec![int(1), string("s")]))],
            value_cmp(var("x"), ComparisonOp::Eq, int(1)),
        );
        assert!(boolean(&run(&e, &mut ctx).unwrap()));
    }

    #[test]
    fn cancellation_is_observed_inside_loops() {
        let mut ctx = Context::builder().build();
        ctx.cancel();
        let e = for_each(vec![("x", to(int(1), int(1_000)))], var("x"));
        let err = run(&e, &mut ctx).unwrap_err();
        assert!(err.is_kind(ErrorKind::BudgetExceeded));
    }
}
