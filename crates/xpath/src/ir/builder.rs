//! Helpers for assembling expression IR by hand.
//!
//! There is no parser in this crate; tests, benches and hosts that compile
//! expressions themselves use these to spell out trees compactly.
//!
//! ```
//! use xbrl_xpath::ir::builder::*;
//! use xbrl_xpath::ir::ArithOp;
//!
//! // (1, 2, 3)[2] + 10
//! let e = arith(filter(seq(vec![int(1), int(2), int(3)]), vec![int(2)]), ArithOp::Add, int(10));
//! assert_eq!(e.parts().len(), 4);
//! ```
use rust_decimal::Decimal;

use super::*;

pub fn lit(v: XdmAtomicValue) -> Expr {
    Part::Literal(v).into()
}

pub fn int(i: i64) -> Expr {
    lit(XdmAtomicValue::Integer(i))
}

/// Decimal literal `mantissa * 10^-scale`.
pub fn dec(mantissa: i64, scale: u32) -> Expr {
    lit(XdmAtomicValue::Decimal(Decimal::new(mantissa, scale)))
}

pub fn dbl(d: f64) -> Expr {
    lit(XdmAtomicValue::Double(d))
}

pub fn flt(f: f32) -> Expr {
    lit(XdmAtomicValue::Float(f))
}

pub fn string(s: &str) -> Expr {
    lit(XdmAtomicValue::String(s.to_string()))
}

pub fn untyped(s: &str) -> Expr {
    lit(XdmAtomicValue::UntypedAtomic(s.to_string()))
}

pub fn var(local: &str) -> Expr {
    Part::VariableRef(ExpandedName::local(local)).into()
}

pub fn var_name(name: ExpandedName) -> Expr {
    Part::VariableRef(name).into()
}

fn operation(op: OpKind, args: Vec<Expr>) -> Part {
    Part::Operation(Operation {
        op,
        args,
        location: None,
    })
}

/// Operation without a left operand.
pub fn op(kind: OpKind, args: Vec<Expr>) -> Expr {
    operation(kind, args).into()
}

/// `left <op> right`: the left parts followed by the operation.
pub fn binary(left: Expr, kind: OpKind, right: Expr) -> Expr {
    let mut parts = left.0;
    parts.push(operation(kind, vec![right]));
    Expr(parts)
}

/// Left operand followed by an operation with no further arguments.
pub fn postfix(left: Expr, kind: OpKind) -> Expr {
    let mut parts = left.0;
    parts.push(operation(kind, Vec::new()));
    Expr(parts)
}

/// Attach a source location to the last part of `e`.
pub fn at(mut e: Expr, location: SourceLocation) -> Expr {
    match e.0.last_mut() {
        Some(Part::Operation(o)) => o.location = Some(location),
        Some(Part::Quantified(q)) => q.location = Some(location),
        Some(Part::Header(h)) => h.location = Some(location),
        _ => {}
    }
    e
}

pub fn empty() -> Expr {
    op(OpKind::Sequence, Vec::new())
}

pub fn seq(items: Vec<Expr>) -> Expr {
    op(OpKind::Sequence, items)
}

pub fn arith(left: Expr, a: ArithOp, right: Expr) -> Expr {
    binary(left, OpKind::Arithmetic(a), right)
}

pub fn neg(e: Expr) -> Expr {
    op(OpKind::Negate, vec![e])
}

pub fn value_cmp(left: Expr, c: ComparisonOp, right: Expr) -> Expr {
    binary(left, OpKind::ValueCompare(c), right)
}

pub fn general_cmp(left: Expr, c: ComparisonOp, right: Expr) -> Expr {
    binary(left, OpKind::GeneralCompare(c), right)
}

pub fn node_cmp(left: Expr, c: NodeCompOp, right: Expr) -> Expr {
    binary(left, OpKind::NodeCompare(c), right)
}

pub fn set_op(left: Expr, s: SetOp, right: Expr) -> Expr {
    binary(left, OpKind::Set(s), right)
}

pub fn union(left: Expr, right: Expr) -> Expr {
    set_op(left, SetOp::Union, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(left, OpKind::And, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    binary(left, OpKind::Or, right)
}

pub fn to(left: Expr, right: Expr) -> Expr {
    binary(left, OpKind::To, right)
}

pub fn name_test(local: &str) -> NameTest {
    NameTest {
        local: Some(local.to_string()),
        ..NameTest::default()
    }
}

pub fn name_test_ns(ns_uri: &str, local: &str) -> NameTest {
    NameTest {
        ns_uri: Some(ns_uri.to_string()),
        local: Some(local.to_string()),
        ..NameTest::default()
    }
}

pub fn wildcard() -> NameTest {
    NameTest {
        is_wildcard: true,
        ..NameTest::default()
    }
}

pub fn step(test: NameTest) -> Expr {
    Part::NameTest(test).into()
}

/// `local` on the child axis.
pub fn child(local: &str) -> Expr {
    step(name_test(local))
}

pub fn child_ns(ns_uri: &str, local: &str) -> Expr {
    step(name_test_ns(ns_uri, local))
}

/// `@local`
pub fn attr(local: &str) -> Expr {
    step(NameTest {
        is_attribute: true,
        ..name_test(local)
    })
}

/// `axis::test`
pub fn axis(axis: Axis, test: NameTest) -> Expr {
    step(NameTest {
        axis: Some(axis),
        is_attribute: axis == Axis::Attribute,
        ..test
    })
}

pub fn path(left: Expr, right: Expr) -> Expr {
    binary(left, OpKind::Child, right)
}

/// Chain of `/` steps, left to right.
pub fn path_of(steps: Vec<Expr>) -> Expr {
    let mut it = steps.into_iter();
    let first = it.next().unwrap_or_default();
    it.fold(first, path)
}

pub fn desc(left: Expr, right: Expr) -> Expr {
    binary(left, OpKind::Descendant, right)
}

/// `/`
pub fn root() -> Expr {
    op(OpKind::Root { descendant: false }, Vec::new())
}

/// `/right`
pub fn root_path(right: Expr) -> Expr {
    op(OpKind::Root { descendant: false }, vec![right])
}

/// `//right`
pub fn root_desc(right: Expr) -> Expr {
    op(OpKind::Root { descendant: true }, vec![right])
}

pub fn filter(base: Expr, predicates: Vec<Expr>) -> Expr {
    let mut parts = base.0;
    parts.push(operation(OpKind::Predicate, predicates));
    Expr(parts)
}

pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    op(OpKind::If, vec![cond, then, otherwise])
}

pub fn dot() -> Expr {
    op(OpKind::ContextItem, Vec::new())
}

pub fn dotdot() -> Expr {
    op(OpKind::Parent, Vec::new())
}

pub fn call(name: QName, args: Vec<Expr>) -> Expr {
    op(OpKind::FunctionCall { name, axis: None }, args)
}

/// Unprefixed call, resolved in the default function namespace.
pub fn fn_call(local: &str, args: Vec<Expr>) -> Expr {
    call(QName::new(None, None, local), args)
}

/// Kind test written as a call, e.g. `child::text()` or `element(x)`.
pub fn kind_step(local: &str, axis: Option<Axis>, args: Vec<Expr>) -> Expr {
    op(
        OpKind::FunctionCall {
            name: QName::new(None, None, local),
            axis,
        },
        args,
    )
}

pub fn atomic_type(local: &str, occurrence: Occurrence) -> SequenceType {
    SequenceType::Typed {
        item: ItemType::Atomic(ExpandedName::xs(local)),
        occurrence,
    }
}

pub fn instance_of(e: Expr, t: SequenceType) -> Expr {
    postfix(e, OpKind::InstanceOf(t))
}

pub fn treat(e: Expr, t: SequenceType) -> Expr {
    postfix(e, OpKind::Treat(t))
}

pub fn cast(e: Expr, target: ExpandedName, optional: bool) -> Expr {
    postfix(e, OpKind::Cast { target, optional })
}

pub fn castable(e: Expr, target: ExpandedName, optional: bool) -> Expr {
    postfix(e, OpKind::Castable { target, optional })
}

fn quantified(kind: QuantifierKind, bindings: Vec<(&str, Expr)>, clause: Clause) -> Expr {
    Part::Quantified(Quantified {
        kind,
        bindings: bindings
            .into_iter()
            .map(|(v, binding)| RangeDecl {
                variable: ExpandedName::local(v),
                binding,
            })
            .collect(),
        clause,
        location: None,
    })
    .into()
}

pub fn for_each(bindings: Vec<(&str, Expr)>, ret: Expr) -> Expr {
    quantified(
        QuantifierKind::For,
        bindings,
        Clause {
            kind: ClauseKind::Return,
            expr: ret,
        },
    )
}

pub fn some(bindings: Vec<(&str, Expr)>, satisfies: Expr) -> Expr {
    quantified(
        QuantifierKind::Some,
        bindings,
        Clause {
            kind: ClauseKind::Satisfies,
            expr: satisfies,
        },
    )
}

pub fn every(bindings: Vec<(&str, Expr)>, satisfies: Expr) -> Expr {
    quantified(
        QuantifierKind::Every,
        bindings,
        Clause {
            kind: ClauseKind::Satisfies,
            expr: satisfies,
        },
    )
}

/// Prefix `e` with a program header.
pub fn with_header(source: &str, trace: Option<TraceKind>, e: Expr) -> Expr {
    let mut parts = vec![Part::Header(ProgHeader {
        source: source.to_string(),
        trace,
        location: None,
    })];
    parts.extend(e.0);
    Expr(parts)
}
