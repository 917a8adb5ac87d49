//! Path composition, axes, predicates and node-set algebra.

use rstest::{fixture, rstest};
use xbrl_xpath::engine::{Context, Evaluator};
use xbrl_xpath::ir::builder::*;
use xbrl_xpath::ir::{Axis, ComparisonOp, Expr, NodeCompOp, SetOp};
use xbrl_xpath::model::simple::{SimpleNode, attr as attribute, doc, elem, text};
use xbrl_xpath::{ErrorCode, XdmAtomicValue, XdmItem, XdmNode, XdmSequence};

type N = SimpleNode;

// <xbrl>
//   <context id="c1"><entity/></context>
//   <fact contextRef="c1">10</fact>
//   <fact contextRef="c2">20</fact>
//   <unit id="u1"/>
// </xbrl>
#[fixture]
fn instance() -> N {
    doc()
        .child(
            elem("xbrl")
                .child(elem("context").attr(attribute("id", "c1")).child(elem("entity")))
                .child(elem("fact").attr(attribute("contextRef", "c1")).child(text("10")))
                .child(elem("fact").attr(attribute("contextRef", "c2")).child(text("20")))
                .child(elem("unit").attr(attribute("id", "u1"))),
        )
        .build()
}

fn eval_at(node: &N, expr: &Expr) -> Result<XdmSequence<N>, xbrl_xpath::Error> {
    let mut ctx = Context::builder().with_context_node(node.clone()).build();
    Evaluator::with_defaults().evaluate(expr, &mut ctx)
}

fn nodes(seq: &XdmSequence<N>) -> Vec<N> {
    seq.iter()
        .map(|i| match i {
            XdmItem::Node(n) => n,
            XdmItem::Atomic(a) => panic!("expected node, got {a:?}"),
        })
        .collect()
}

fn names(seq: &XdmSequence<N>) -> Vec<String> {
    nodes(seq)
        .iter()
        .map(|n| n.name().map(|q| q.local).unwrap_or_default())
        .collect()
}

fn xbrl(instance: &N) -> N {
    instance.children()[0].clone()
}

#[rstest]
fn child_steps_compose(instance: N) {
    let r = eval_at(&instance, &path(child("xbrl"), child("fact"))).unwrap();
    assert_eq!(names(&r), vec!["fact", "fact"]);
}

#[rstest]
fn descendant_paths_from_the_root(instance: N) {
    let start = nodes(&eval_at(&instance, &root_desc(child("entity"))).unwrap())[0].clone();
    let r = eval_at(&start, &root_desc(step(wildcard()))).unwrap();
    assert_eq!(names(&r), vec!["xbrl", "context", "entity", "fact", "fact", "unit"]);
}

#[rstest]
fn axis_round_trip(instance: N) {
    let p = xbrl(&instance);
    let children = nodes(&eval_at(&p, &axis(Axis::Child, wildcard())).unwrap());
    assert_eq!(children.len(), 4);
    for n in children {
        let parents = nodes(&eval_at(&n, &axis(Axis::Parent, wildcard())).unwrap());
        assert_eq!(parents, vec![p.clone()]);
    }
}

#[rstest]
#[case(Axis::FollowingSibling, vec!["fact", "unit"])]
#[case(Axis::PrecedingSibling, vec!["context"])]
#[case(Axis::Following, vec!["fact", "unit"])]
#[case(Axis::Preceding, vec!["context", "entity"])]
#[case(Axis::AncestorOrSelf, vec!["xbrl", "fact"])]
fn axes_return_document_order(instance: N, #[case] ax: Axis, #[case] expected: Vec<&str>) {
    let first_fact = xbrl(&instance).children()[1].clone();
    let r = eval_at(&first_fact, &axis(ax, wildcard())).unwrap();
    assert_eq!(names(&r), expected);
}

#[rstest]
fn numeric_predicate_selects_by_position(instance: N) {
    let r = eval_at(&instance, &filter(to(int(1), int(5)), vec![int(3)])).unwrap();
    assert_eq!(r.first(), Some(XdmItem::Atomic(XdmAtomicValue::Integer(3))));
    assert_eq!(r.len(), 1);
    let never = general_cmp(fn_call("position", vec![]), ComparisonOp::Gt, int(10));
    assert!(eval_at(&instance, &filter(to(int(1), int(5)), vec![never])).unwrap().is_empty());
}

#[rstest]
fn predicates_see_the_step_position(instance: N) {
    let last = value_cmp(fn_call("position", vec![]), ComparisonOp::Eq, fn_call("last", vec![]));
    let e = path(child("xbrl"), filter(child("fact"), vec![last]));
    let r = eval_at(&instance, &e).unwrap();
    assert_eq!(nodes(&r)[0].string_value(), "20");
}

#[rstest]
fn attribute_predicates(instance: N) {
    let e = root_desc(filter(
        child("fact"),
        vec![general_cmp(attr("contextRef"), ComparisonOp::Eq, string("c2"))],
    ));
    let r = eval_at(&instance, &e).unwrap();
    assert_eq!(nodes(&r)[0].string_value(), "20");
}

#[rstest]
fn union_is_idempotent(instance: N) {
    let facts = root_desc(child("fact"));
    let once = eval_at(&instance, &facts).unwrap();
    let twice = eval_at(&instance, &union(facts.clone(), facts)).unwrap();
    assert_eq!(once, twice);
}

#[rstest]
fn set_results_are_in_document_order(instance: N) {
    let e = union(root_desc(child("unit")), root_desc(child("context")));
    assert_eq!(names(&eval_at(&instance, &e).unwrap()), vec!["context", "unit"]);
    let e = set_op(root_desc(step(wildcard())), SetOp::Except, root_desc(child("fact")));
    assert_eq!(
        names(&eval_at(&instance, &e).unwrap()),
        vec!["xbrl", "context", "entity", "unit"]
    );
    let e = set_op(root_desc(step(wildcard())), SetOp::Intersect, root_desc(child("unit")));
    assert_eq!(names(&eval_at(&instance, &e).unwrap()), vec!["unit"]);
}

#[rstest]
fn set_operations_reject_atomic_values(instance: N) {
    let err = eval_at(&instance, &union(root_desc(child("unit")), int(1))).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn node_comparisons(instance: N) {
    let first = filter(root_desc(child("fact")), vec![int(1)]);
    let second = filter(root_desc(child("fact")), vec![int(2)]);
    let cmp = |l: Expr, op: NodeCompOp, r: Expr| {
        eval_at(&instance, &node_cmp(l, op, r)).unwrap().first()
    };
    let yes = Some(XdmItem::Atomic(XdmAtomicValue::Boolean(true)));
    assert_eq!(cmp(first.clone(), NodeCompOp::Precedes, second.clone()), yes);
    assert_eq!(cmp(second.clone(), NodeCompOp::Follows, first.clone()), yes);
    assert_eq!(cmp(first.clone(), NodeCompOp::Is, first.clone()), yes);
    let err = eval_at(&instance, &node_cmp(first, NodeCompOp::Is, root_desc(child("none"))))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn parent_of_an_attribute_is_its_element(instance: N) {
    let e = root_desc(path(attr("id"), dotdot()));
    assert_eq!(names(&eval_at(&instance, &e).unwrap()), vec!["context", "unit"]);
}

#[rstest]
fn steps_on_atomic_values_fail(instance: N) {
    let err = eval_at(&instance, &path(int(1), child("a"))).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0019);
    let err = eval_at(&instance, &filter(int(1), vec![child("a")])).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0020);
}

#[rstest]
fn steps_without_a_context_item_fail() {
    let mut ctx = Context::<N>::builder().build();
    let err = Evaluator::with_defaults().evaluate(&child("a"), &mut ctx).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPDY0002);
}

#[rstest]
fn kind_tests_written_as_calls(instance: N) {
    let e = root_desc(path(child("fact"), kind_step("text", None, vec![])));
    let texts: Vec<String> = nodes(&eval_at(&instance, &e).unwrap())
        .iter()
        .map(XdmNode::string_value)
        .collect();
    assert_eq!(texts, vec!["10", "20"]);
    let attrs = root_desc(kind_step("attribute", None, vec![string("id")]));
    assert_eq!(eval_at(&instance, &attrs).unwrap().len(), 2);
    let ancestors = path(
        root_desc(child("entity")),
        kind_step("node", Some(Axis::Ancestor), vec![]),
    );
    assert_eq!(eval_at(&instance, &ancestors).unwrap().len(), 3);
}

#[rstest]
fn atomic_path_results_keep_evaluation_order(instance: N) {
    let e = root_desc(path(child("fact"), fn_call("string", vec![])));
    let r = eval_at(&instance, &e).unwrap();
    assert_eq!(
        r.iter().filter_map(|i| i.as_atomic().map(XdmAtomicValue::lexical)).collect::<Vec<_>>(),
        vec!["10", "20"]
    );
}
