//! Document ordering and node-set algebra.

use core::cmp::Ordering;
use std::collections::HashSet;

use smallvec::SmallVec;

use crate::engine::runtime::{Error, ErrorCode};
use crate::ir::SetOp;
use crate::model::XdmNode;
use crate::xdm::{XdmItem, XdmSequence};

pub(crate) fn node_compare<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    match (a.doc_order_key(), b.doc_order_key()) {
        (Some(ak), Some(bk)) => Ok(ak.cmp(&bk)),
        _ => a.compare_document_order(b),
    }
}

fn sort_fallback<N: XdmNode>(nodes: &mut [N]) -> Result<(), Error> {
    // sort_by cannot propagate errors; remember the first one
    let mut failure = None;
    nodes.sort_by(|a, b| {
        node_compare(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

/// Sort into document order and drop repeated nodes.
pub(crate) fn sorted_distinct<N: XdmNode>(nodes: Vec<N>) -> Result<Vec<N>, Error> {
    let mut keyed: SmallVec<[(u64, N); 16]> = SmallVec::new();
    let mut fallback: Vec<N> = Vec::new();
    for n in nodes {
        match n.doc_order_key() {
            Some(k) => keyed.push((k, n)),
            None => fallback.push(n),
        }
    }
    keyed.sort_by_key(|(k, _)| *k);
    keyed.dedup_by(|a, b| a.0 == b.0);
    if fallback.is_empty() {
        return Ok(keyed.into_iter().map(|(_, n)| n).collect());
    }
    fallback.extend(keyed.into_iter().map(|(_, n)| n));
    sort_fallback(&mut fallback)?;
    fallback.dedup();
    Ok(fallback)
}

pub(crate) fn require_nodes<N: XdmNode>(seq: XdmSequence<N>, what: &str) -> Result<Vec<N>, Error> {
    seq.into_iter()
        .map(|item| match item {
            XdmItem::Node(n) => Ok(n),
            XdmItem::Atomic(a) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("{what} requires nodes, got {}", a.type_name()),
            )),
        })
        .collect()
}

fn membership<N: XdmNode>(nodes: &[N]) -> (HashSet<u64>, Vec<&N>) {
    let mut keys = HashSet::with_capacity(nodes.len());
    let mut unkeyed = Vec::new();
    for n in nodes {
        match n.doc_order_key() {
            Some(k) => {
                keys.insert(k);
            }
            None => unkeyed.push(n),
        }
    }
    (keys, unkeyed)
}

pub(crate) fn set_operation<N: XdmNode>(
    op: SetOp,
    left: XdmSequence<N>,
    right: XdmSequence<N>,
) -> Result<XdmSequence<N>, Error> {
    let what = match op {
        SetOp::Union => "union",
        SetOp::Intersect => "intersect",
        SetOp::Except => "except",
    };
    let lhs = require_nodes(left, what)?;
    let rhs = require_nodes(right, what)?;
    let out = match op {
        SetOp::Union => {
            let mut all = lhs;
            all.extend(rhs);
            sorted_distinct(all)?
        }
        SetOp::Intersect | SetOp::Except => {
            let keep_members = op == SetOp::Intersect;
            let (keys, unkeyed) = membership(&rhs);
            sorted_distinct(lhs)?
                .into_iter()
                .filter(|n| {
                    let member = match n.doc_order_key() {
                        Some(k) => keys.contains(&k),
                        None => unkeyed.iter().any(|m| *m == n),
                    };
                    member == keep_members
                })
                .collect()
        }
    };
    Ok(out.into_iter().map(XdmItem::Node).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::{SimpleNode, doc, elem};

    fn nodes() -> (SimpleNode, SimpleNode, SimpleNode) {
        let d = doc().child(elem("a")).child(elem("b")).build();
        let c = d.children();
        (d.clone(), c[0].clone(), c[1].clone())
    }

    fn seq(ns: &[&SimpleNode]) -> XdmSequence<SimpleNode> {
        ns.iter().map(|n| XdmItem::Node((*n).clone())).collect()
    }

    #[test]
    fn union_is_idempotent_and_ordered() {
        let (d, a, b) = nodes();
        let s = seq(&[&b, &a, &d]);
        let u = set_operation(SetOp::Union, s.clone(), s).unwrap();
        assert_eq!(u, seq(&[&d, &a, &b]));
    }

    #[test]
    fn intersect_and_except() {
        let (d, a, b) = nodes();
        let i = set_operation(SetOp::Intersect, seq(&[&d, &a, &b]), seq(&[&b, &d])).unwrap();
        assert_eq!(i, seq(&[&d, &b]));
        let e = set_operation(SetOp::Except, seq(&[&d, &a, &b]), seq(&[&b])).unwrap();
        assert_eq!(e, seq(&[&d, &a]));
    }

    #[test]
    fn atomic_operands_are_rejected() {
        let (d, ..) = nodes();
        let bad: XdmSequence<SimpleNode> = XdmSequence::one(crate::xdm::XdmAtomicValue::Integer(1));
        let e = set_operation(SetOp::Union, seq(&[&d]), bad).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::XPTY0004);
    }
}
