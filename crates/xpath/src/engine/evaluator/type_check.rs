//! Sequence type matching for `instance of` and `treat as`.

use crate::ir::{ItemType, Occurrence, SequenceType};
use crate::model::XdmNode;
use crate::schema::TypeRegistry;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};

use super::node_ops::matches_kind_test;

fn atomic_matches(types: &TypeRegistry, value: &XdmAtomicValue, expected: &ExpandedName) -> bool {
    types.derives_from(&value.type_name(), expected)
}

pub(crate) fn item_matches<N: XdmNode>(types: &TypeRegistry, item: &XdmItem<N>, t: &ItemType) -> bool {
    match (item, t) {
        (_, ItemType::AnyItem) => true,
        (XdmItem::Atomic(a), ItemType::Atomic(exp)) => atomic_matches(types, a, exp),
        (XdmItem::Node(n), ItemType::Kind(k)) => matches_kind_test(types, n, k),
        _ => false,
    }
}

fn occurrence_allows(occ: Occurrence, count: usize) -> bool {
    match occ {
        Occurrence::One => count == 1,
        Occurrence::ZeroOrOne => count <= 1,
        Occurrence::ZeroOrMore => true,
        Occurrence::OneOrMore => count >= 1,
    }
}

pub(crate) fn instance_of<N: XdmNode>(types: &TypeRegistry, seq: &XdmSequence<N>, t: &SequenceType) -> bool {
    match t {
        SequenceType::EmptySequence => seq.is_empty(),
        SequenceType::Typed { item, occurrence } => {
            if !occurrence_allows(*occurrence, seq.len()) {
                return false;
            }
            // ranges are integers throughout; checking one item suffices
            if seq.is_range() {
                return seq.first().is_none_or(|i| item_matches(types, &i, item));
            }
            seq.iter().all(|i| item_matches(types, &i, item))
        }
    }
}

pub(crate) fn describe(t: &SequenceType) -> String {
    let SequenceType::Typed { item, occurrence } = t else {
        return "empty-sequence()".to_string();
    };
    let base = match item {
        ItemType::AnyItem => "item()".to_string(),
        ItemType::Atomic(name) => name.to_string(),
        ItemType::Kind(k) => format!("{k:?}"),
    };
    let suffix = match occurrence {
        Occurrence::One => "",
        Occurrence::ZeroOrOne => "?",
        Occurrence::ZeroOrMore => "*",
        Occurrence::OneOrMore => "+",
    };
    format!("{base}{suffix}")
}
