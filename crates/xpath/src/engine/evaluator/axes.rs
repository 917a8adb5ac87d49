//! Axis navigation.
//!
//! Results come back in axis order: document order for forward axes,
//! nearest-first for `parent`, `ancestor*` and `preceding*`. Callers that
//! need document order re-sort through [`super::set_ops`].

use crate::ir::Axis;
use crate::model::{NodeKind, XdmNode};

fn push_descendants<N: XdmNode>(node: &N, out: &mut Vec<N>) {
    // explicit stack keeps deep trees off the native stack
    let mut stack: Vec<N> = node.children().into_iter().rev().collect();
    while let Some(n) = stack.pop() {
        stack.extend(n.children().into_iter().rev());
        out.push(n);
    }
}

fn ancestors<N: XdmNode>(node: &N) -> Vec<N> {
    let mut out = Vec::new();
    let mut cur = node.parent();
    while let Some(p) = cur {
        cur = p.parent();
        out.push(p);
    }
    out
}

fn siblings<N: XdmNode>(node: &N) -> Option<(Vec<N>, usize)> {
    if matches!(node.kind(), NodeKind::Attribute | NodeKind::Namespace) {
        return None;
    }
    let parent = node.parent()?;
    let sibs = parent.children();
    let idx = sibs.iter().position(|s| s == node)?;
    Some((sibs, idx))
}

/// Every tree node in document order (attributes and namespaces excluded).
fn preorder<N: XdmNode>(root: &N) -> Vec<N> {
    let mut out = vec![root.clone()];
    push_descendants(root, &mut out);
    out
}

/// `following` / `preceding`: a full walk of the tree from the root, minus
/// the source's ancestors and descendants. An attribute's position is its
/// owner element's, so its owner's children follow it.
fn following_or_preceding<N: XdmNode>(node: &N, following: bool) -> Vec<N> {
    let is_attr = matches!(node.kind(), NodeKind::Attribute | NodeKind::Namespace);
    let anchor = if is_attr {
        match node.parent() {
            Some(p) => p,
            None => return Vec::new(),
        }
    } else {
        node.clone()
    };
    let all = preorder(&anchor.root());
    let Some(pos) = all.iter().position(|n| n == &anchor) else {
        return Vec::new();
    };
    if following {
        let mut skip = Vec::new();
        if !is_attr {
            push_descendants(&anchor, &mut skip);
        }
        all[pos + 1..]
            .iter()
            .filter(|n| !skip.contains(n))
            .cloned()
            .collect()
    } else {
        let ancestors = ancestors(&anchor);
        let mut out: Vec<N> = all[..pos]
            .iter()
            .filter(|n| !ancestors.contains(n))
            .cloned()
            .collect();
        out.reverse();
        out
    }
}

pub(crate) fn step_axis<N: XdmNode>(node: &N, axis: Axis) -> Vec<N> {
    match axis {
        Axis::Child => node.children(),
        Axis::Attribute => node.attributes(),
        Axis::SelfAxis => vec![node.clone()],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => ancestors(node),
        Axis::AncestorOrSelf => {
            let mut out = vec![node.clone()];
            out.extend(ancestors(node));
            out
        }
        Axis::Descendant => {
            let mut out = Vec::new();
            push_descendants(node, &mut out);
            out
        }
        Axis::DescendantOrSelf => {
            let mut out = vec![node.clone()];
            push_descendants(node, &mut out);
            out
        }
        Axis::FollowingSibling => siblings(node)
            .map(|(s, i)| s[i + 1..].to_vec())
            .unwrap_or_default(),
        Axis::PrecedingSibling => siblings(node)
            .map(|(s, i)| s[..i].iter().rev().cloned().collect())
            .unwrap_or_default(),
        Axis::Following => following_or_preceding(node, true),
        Axis::Preceding => following_or_preceding(node, false),
    }
}

pub(crate) fn is_reverse(axis: Axis) -> bool {
    matches!(
        axis,
        Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling | Axis::Preceding
    )
}

pub(crate) fn principal_kind(axis: Axis) -> NodeKind {
    match axis {
        Axis::Attribute => NodeKind::Attribute,
        _ => NodeKind::Element,
    }
}
