//! Variables, caching, tracing and cancellation across evaluations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rstest::rstest;
use xbrl_xpath::engine::{Context, Evaluator};
use xbrl_xpath::ir::builder::*;
use xbrl_xpath::ir::{ArithOp, TraceKind};
use xbrl_xpath::model::simple::SimpleNode;
use xbrl_xpath::{ErrorCode, ErrorKind, ExpandedName, XdmAtomicValue, XdmSequence};

type N = SimpleNode;

fn int_seq(i: i64) -> XdmSequence<N> {
    XdmSequence::one(XdmAtomicValue::Integer(i))
}

#[rstest]
fn cancelled_contexts_fail_fast() {
    let mut ctx = Context::<N>::builder().build();
    ctx.cancel();
    let err = Evaluator::with_defaults().evaluate(&int(1), &mut ctx).unwrap_err();
    assert!(err.is_kind(ErrorKind::BudgetExceeded));
}

#[rstest]
fn cancellation_flags_are_shared_with_the_host() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut ctx = Context::<N>::builder().with_cancel_flag(Arc::clone(&flag)).build();
    let evaluator = Evaluator::with_defaults();
    assert!(evaluator.evaluate(&int(1), &mut ctx).is_ok());
    flag.store(true, Ordering::Relaxed);
    let err = evaluator
        .evaluate(&for_each(vec![("x", to(int(1), int(100)))], var("x")), &mut ctx)
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::BudgetExceeded));
    assert!(ctx.copy().is_cancelled());
}

#[rstest]
fn copies_do_not_see_later_bindings() {
    let x = ExpandedName::local("x");
    let mut ctx = Context::<N>::builder().with_variable(x.clone(), int_seq(1)).build();
    let mut sibling = ctx.copy();
    ctx.bind_variable(x.clone(), int_seq(2));
    let evaluator = Evaluator::with_defaults();
    assert_eq!(evaluator.evaluate(&var("x"), &mut sibling).unwrap(), int_seq(1));
    assert_eq!(evaluator.evaluate(&var("x"), &mut ctx).unwrap(), int_seq(2));
}

#[rstest]
fn cached_results_are_reused_by_key() {
    let x = ExpandedName::local("x");
    let mut ctx = Context::<N>::builder()
        .with_variable(x.clone(), int_seq(1))
        .with_cache_capacity(8)
        .build();
    let evaluator = Evaluator::with_defaults();
    let e = arith(var("x"), ArithOp::Add, int(1));
    assert_eq!(evaluator.evaluate_cached("x+1", &e, &mut ctx).unwrap(), int_seq(2));
    ctx.bind_variable(x, int_seq(10));
    assert_eq!(evaluator.evaluate_cached("x+1", &e, &mut ctx).unwrap(), int_seq(2));
    assert_eq!(evaluator.evaluate(&e, &mut ctx).unwrap(), int_seq(11));
    assert_eq!(ctx.cache_len(), 1);
}

#[rstest]
fn atomic_results_can_be_cast_on_the_way_out() {
    let mut ctx = Context::<N>::builder().build();
    let evaluator = Evaluator::with_defaults();
    let r = evaluator
        .evaluate_atomic(&string("1.50"), &mut ctx, Some(&ExpandedName::xs("decimal")))
        .unwrap();
    assert_eq!(r.map(|v| v.lexical()), Some("1.5".to_string()));
    assert_eq!(evaluator.evaluate_atomic(&empty(), &mut ctx, None).unwrap(), None);
    let err = evaluator
        .evaluate_atomic(&seq(vec![int(1), int(2)]), &mut ctx, None)
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
#[case(string("x"), true)]
#[case(empty(), false)]
#[case(int(0), false)]
#[case(to(int(1), int(1)), true)]
fn boolean_results(#[case] e: xbrl_xpath::ir::Expr, #[case] expected: bool) {
    let mut ctx = Context::<N>::builder().build();
    assert_eq!(Evaluator::with_defaults().evaluate_boolean(&e, &mut ctx).unwrap(), expected);
}

#[rstest]
fn trace_state_ends_with_the_evaluation() {
    let mut ctx = Context::<N>::builder().build();
    let e = with_header("1 + 1", Some(TraceKind::Expression), arith(int(1), ArithOp::Add, int(1)));
    assert_eq!(Evaluator::with_defaults().evaluate(&e, &mut ctx).unwrap(), int_seq(2));
    assert_eq!(ctx.trace(), None);
}

#[rstest]
fn undefined_variables_are_static_errors() {
    let mut ctx = Context::<N>::builder().build();
    let err = Evaluator::with_defaults().evaluate(&var("missing"), &mut ctx).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);
    assert!(err.message.contains("missing"));
}

#[rstest]
fn output_slots_are_kept_per_document() {
    let mut ctx = Context::<N>::builder().build();
    let fact = xbrl_xpath::model::simple::elem("fact").build();
    ctx.output_slots_mut("out.xml").last_fact = Some(fact.clone());
    assert_eq!(ctx.output_slots("out.xml").and_then(|s| s.last_fact.clone()), Some(fact));
    assert!(ctx.output_slots("other.xml").is_none());
    assert!(ctx.copy().output_slots("out.xml").is_none());
}
