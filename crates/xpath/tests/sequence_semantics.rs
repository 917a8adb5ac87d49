//! Value operators over sequences: flattening, empty propagation,
//! existential comparison and numeric promotion.

use rstest::rstest;
use rust_decimal::Decimal;
use xbrl_xpath::engine::{Context, Evaluator};
use xbrl_xpath::ir::builder::*;
use xbrl_xpath::ir::{ArithOp, ComparisonOp, Expr};
use xbrl_xpath::model::simple::SimpleNode;
use xbrl_xpath::{ErrorCode, ErrorKind, XdmAtomicValue, XdmItem, XdmSequence};

type N = SimpleNode;

fn eval(expr: &Expr) -> Result<XdmSequence<N>, xbrl_xpath::Error> {
    let mut ctx = Context::builder().build();
    Evaluator::with_defaults().evaluate(expr, &mut ctx)
}

fn atoms(seq: &XdmSequence<N>) -> Vec<XdmAtomicValue> {
    seq.iter()
        .map(|i| match i {
            XdmItem::Atomic(a) => a,
            XdmItem::Node(n) => panic!("expected atomic, got {n:?}"),
        })
        .collect()
}

fn single(expr: &Expr) -> XdmAtomicValue {
    let r = eval(expr).expect("evaluation succeeds");
    assert_eq!(r.len(), 1, "expected one item, got {r:?}");
    atoms(&r).remove(0)
}

#[rstest]
fn nested_sequence_constructors_flatten() {
    let e = seq(vec![int(1), seq(vec![int(2), int(3)]), empty(), int(4)]);
    let r = eval(&e).unwrap();
    assert_eq!(
        atoms(&r),
        (1..=4).map(XdmAtomicValue::Integer).collect::<Vec<_>>()
    );
}

#[rstest]
#[case(ArithOp::Add)]
#[case(ArithOp::Sub)]
#[case(ArithOp::Mul)]
#[case(ArithOp::Div)]
#[case(ArithOp::IDiv)]
#[case(ArithOp::Mod)]
fn arithmetic_with_an_empty_operand_is_empty(#[case] op: ArithOp) {
    assert!(eval(&arith(empty(), op, int(5))).unwrap().is_empty());
    assert!(eval(&arith(int(5), op, empty())).unwrap().is_empty());
}

#[rstest]
#[case(ComparisonOp::Eq)]
#[case(ComparisonOp::Lt)]
#[case(ComparisonOp::Ge)]
fn value_comparison_with_an_empty_operand_is_empty(#[case] op: ComparisonOp) {
    assert!(eval(&value_cmp(empty(), op, int(1))).unwrap().is_empty());
}

#[rstest]
fn value_operands_must_be_singletons() {
    let e = value_cmp(seq(vec![int(1), int(2)]), ComparisonOp::Eq, int(1));
    let err = eval(&e).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    assert!(err.is_kind(ErrorKind::Type));
}

#[rstest]
#[case(vec![1, 2, 3], vec![3, 4], true)]
#[case(vec![1, 2], vec![3, 4], false)]
#[case(vec![], vec![1], false)]
fn general_comparison_is_existential(
    #[case] left: Vec<i64>,
    #[case] right: Vec<i64>,
    #[case] expected: bool,
) {
    let s = |v: Vec<i64>| seq(v.into_iter().map(int).collect());
    let e = general_cmp(s(left), ComparisonOp::Eq, s(right));
    assert_eq!(single(&e), XdmAtomicValue::Boolean(expected));
}

#[rstest]
fn general_comparison_stops_at_the_first_match() {
    // the string on the left would not compare with an integer
    let e = general_cmp(seq(vec![int(1), string("x")]), ComparisonOp::Eq, int(1));
    assert_eq!(single(&e), XdmAtomicValue::Boolean(true));
}

#[rstest]
fn decimal_plus_float_promotes_to_float() {
    match single(&arith(dec(15, 1), ArithOp::Add, flt(0.5))) {
        XdmAtomicValue::Float(f) => assert!((f - 2.0).abs() < f32::EPSILON),
        other => panic!("expected float, got {other:?}"),
    }
    assert_eq!(
        single(&arith(dec(15, 1), ArithOp::Add, dec(25, 1))),
        XdmAtomicValue::Decimal(Decimal::new(40, 1))
    );
}

#[rstest]
fn integer_division_yields_decimal() {
    assert_eq!(
        single(&arith(int(1), ArithOp::Div, int(4))),
        XdmAtomicValue::Decimal(Decimal::new(25, 2))
    );
    assert_eq!(single(&arith(int(7), ArithOp::IDiv, int(2))), XdmAtomicValue::Integer(3));
}

#[rstest]
#[case(arith(int(1), ArithOp::Div, int(0)))]
#[case(arith(int(1), ArithOp::IDiv, int(0)))]
#[case(arith(dec(1, 0), ArithOp::Mod, dec(0, 0)))]
fn exact_division_by_zero_fails(#[case] e: Expr) {
    let err = eval(&e).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0001);
    assert!(err.is_kind(ErrorKind::Value));
}

#[rstest]
fn double_division_by_zero_is_infinite() {
    match single(&arith(dbl(1.0), ArithOp::Div, dbl(0.0))) {
        XdmAtomicValue::Double(d) => assert!(d.is_infinite() && d.is_sign_positive()),
        other => panic!("expected double, got {other:?}"),
    }
}

#[rstest]
fn ranges_are_inclusive() {
    let r = eval(&to(int(2), int(5))).unwrap();
    assert_eq!(r.len(), 4);
    assert_eq!(
        atoms(&r),
        (2..=5).map(XdmAtomicValue::Integer).collect::<Vec<_>>()
    );
    assert!(eval(&to(int(5), int(2))).unwrap().is_empty());
}

#[rstest]
fn untyped_operands_become_doubles_in_arithmetic() {
    match single(&arith(untyped("2"), ArithOp::Mul, int(3))) {
        XdmAtomicValue::Double(d) => assert!((d - 6.0).abs() < f64::EPSILON),
        other => panic!("expected double, got {other:?}"),
    }
}

#[rstest]
fn logical_operators_use_effective_boolean_values() {
    assert_eq!(single(&and(string("x"), int(1))), XdmAtomicValue::Boolean(true));
    assert_eq!(single(&or(empty(), dbl(0.0))), XdmAtomicValue::Boolean(false));
    let err = eval(&and(seq(vec![int(1), int(2)]), int(1))).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0006);
}

#[rstest]
fn conditionals_pick_one_branch() {
    let e = if_then_else(empty(), arith(int(1), ArithOp::Div, int(0)), string("else"));
    assert_eq!(single(&e), XdmAtomicValue::String("else".into()));
}

#[rstest]
fn unary_minus_negates() {
    assert_eq!(single(&neg(int(4))), XdmAtomicValue::Integer(-4));
    assert!(eval(&neg(empty())).unwrap().is_empty());
}

#[rstest]
fn ranges_may_end_at_the_largest_integer() {
    let r = eval(&to(int(i64::MAX - 2), int(i64::MAX))).unwrap();
    assert_eq!(r.len(), 3);
    assert_eq!(atoms(&r).last(), Some(&XdmAtomicValue::Integer(i64::MAX)));
}

#[rstest]
#[case(int(3), Some(3))]
#[case(dbl(2.0), Some(2))]
#[case(dec(40, 1), Some(4))]
#[case(dbl(2.5), None)]
#[case(int(0), None)]
#[case(int(-1), None)]
fn literal_positions_index_a_range_directly(#[case] position: Expr, #[case] expected: Option<i64>) {
    let r = eval(&filter(to(int(1), int(i64::MAX)), vec![position])).unwrap();
    assert_eq!(atoms(&r), expected.map(XdmAtomicValue::Integer).into_iter().collect::<Vec<_>>());
}

#[rstest]
fn literal_positions_past_the_end_select_nothing() {
    assert!(eval(&filter(to(int(1), int(5)), vec![int(6)])).unwrap().is_empty());
    let chained = filter(to(int(10), int(30_000_000)), vec![int(5), int(1)]);
    assert_eq!(atoms(&eval(&chained).unwrap()), vec![XdmAtomicValue::Integer(14)]);
    let chained = filter(to(int(10), int(30_000_000)), vec![int(5), int(2)]);
    assert!(eval(&chained).unwrap().is_empty());
}
