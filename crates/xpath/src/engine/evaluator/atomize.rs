//! Atomization and effective boolean value.

use tracing::trace;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{NodeKind, XdmNode};
use crate::schema::{TypeContent, TypeRegistry};
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

use super::casting::parse_lexical;

/// Typed value of a single node.
///
/// Elements and attributes with a declared schema type are validated on
/// demand: the raw string value is coerced through the type's built-in base,
/// checked against every facet of the derivation chain, and the result is
/// handed back to the node so later atomizations are free. QName prefixes in
/// content resolve against the node's own in-scope namespaces.
pub fn atomize_node<N: XdmNode>(
    types: &TypeRegistry,
    node: &N,
) -> Result<Option<XdmAtomicValue>, Error> {
    match node.kind() {
        NodeKind::Comment | NodeKind::ProcessingInstruction => {
            return Ok(Some(XdmAtomicValue::String(node.string_value())));
        }
        NodeKind::Element | NodeKind::Attribute => {}
        _ => return Ok(Some(XdmAtomicValue::UntypedAtomic(node.string_value()))),
    }
    if node.is_nil() {
        return Ok(None);
    }
    if let Some(v) = node.validated_value() {
        return Ok(Some(v));
    }
    let Some(ty) = node.schema_type() else {
        return Ok(Some(XdmAtomicValue::UntypedAtomic(node.string_value())));
    };
    let resolved = types.resolve_simple(&ty)?;
    if resolved.content == TypeContent::ComplexElementOnly {
        return Err(Error::from_code(
            ErrorCode::FOTY0012,
            format!(
                "{} has element-only content of type {ty} and no typed value",
                node.name().map(|q| q.to_string()).unwrap_or_default()
            ),
        ));
    }
    let raw = node.string_value();
    let value = parse_lexical(&resolved.builtin.local, &raw, &|p| {
        node.lookup_namespace_uri(p)
    })?;
    resolved.check_facets(raw.trim(), &value)?;
    trace!(node = ?node.name(), ty = %ty, "validated on demand");
    node.cache_validated_value(&value);
    Ok(Some(value))
}

pub fn atomize_sequence<N: XdmNode>(
    types: &TypeRegistry,
    seq: XdmSequence<N>,
) -> Result<XdmSequence<N>, Error> {
    if seq.is_range() {
        return Ok(seq);
    }
    let mut out = Vec::with_capacity(seq.len());
    for item in seq {
        match item {
            XdmItem::Atomic(a) => out.push(XdmItem::Atomic(a)),
            XdmItem::Node(n) => {
                if let Some(v) = atomize_node(types, &n)? {
                    out.push(XdmItem::Atomic(v));
                }
            }
        }
    }
    Ok(XdmSequence::from_items(out))
}

fn ebv_error(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::FORG0006, msg)
}

pub fn effective_boolean_value<N: XdmNode>(seq: &XdmSequence<N>) -> Result<bool, Error> {
    let mut it = seq.iter();
    let Some(first) = it.next() else {
        return Ok(false);
    };
    let atom = match first {
        XdmItem::Node(_) => return Ok(true),
        XdmItem::Atomic(a) => a,
    };
    if it.next().is_some() {
        return Err(ebv_error(format!(
            "effective boolean value is not defined for a sequence of {} atomic values",
            seq.len()
        )));
    }
    use XdmAtomicValue as V;
    Ok(match &atom {
        V::Boolean(b) => *b,
        V::String(s) | V::UntypedAtomic(s) | V::AnyUri(s) | V::NormalizedString(s)
        | V::Token(s) | V::Language(s) | V::Name(s) | V::NCName(s) | V::NMTOKEN(s)
        | V::Id(s) | V::IdRef(s) | V::Entity(s) => !s.is_empty(),
        V::Decimal(d) => !d.is_zero(),
        V::Double(d) => *d != 0.0 && !d.is_nan(),
        V::Float(f) => *f != 0.0 && !f.is_nan(),
        other => match other.as_i128() {
            Some(i) => i != 0,
            None => {
                return Err(ebv_error(format!(
                    "effective boolean value is not defined for {}",
                    other.type_name()
                )));
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::XBRLI;
    use crate::model::simple::{SimpleNode, comment, elem, elem_ns, ns, text};
    use crate::xdm::ExpandedName;

    fn xbrli(local: &str) -> ExpandedName {
        ExpandedName::new(Some(XBRLI.to_string()), local)
    }

    fn types() -> TypeRegistry {
        TypeRegistry::with_xbrl_item_types()
    }

    #[test]
    fn untyped_nodes_atomize_to_untyped_atomic() {
        let e = elem("a").child(text("12")).build();
        assert_eq!(
            atomize_node(&types(), &e).unwrap(),
            Some(XdmAtomicValue::UntypedAtomic("12".into()))
        );
        let c = comment("note");
        assert_eq!(atomize_node(&types(), &c).unwrap(), Some(XdmAtomicValue::String("note".into())));
    }

    #[test]
    fn nil_facts_atomize_to_nothing() {
        let e = elem("a").typed(xbrli("monetaryItemType")).nil().build();
        assert_eq!(atomize_node(&types(), &e).unwrap(), None);
    }

    #[test]
    fn tuples_have_no_typed_value() {
        let t = elem("t").typed(xbrli("tuple")).child(elem("x")).build();
        let e = atomize_node(&types(), &t).unwrap_err();
        assert_eq!(e.code_enum(), ErrorCode::FOTY0012);
    }

    #[test]
    fn qname_content_uses_the_owning_elements_namespaces() {
        let e = elem_ns("xbrli", XBRLI, "measure")
            .namespace(ns("iso4217", "http://www.xbrl.org/2003/iso4217"))
            .typed(xbrli("QNameItemType"))
            .child(text(" iso4217:EUR "))
            .build();
        assert_eq!(
            atomize_node(&types(), &e).unwrap(),
            Some(XdmAtomicValue::QName {
                ns_uri: Some("http://www.xbrl.org/2003/iso4217".into()),
                prefix: Some("iso4217".into()),
                local: "EUR".into(),
            })
        );
    }

    #[test]
    fn validation_result_is_cached_on_the_node() {
        let e: SimpleNode = elem("a").typed(xbrli("decimalItemType")).child(text("1.50")).build();
        assert!(!e.has_validated_value());
        atomize_node(&types(), &e).unwrap();
        assert!(e.has_validated_value());
    }

    #[test]
    fn ebv_rules() {
        let s = |v: XdmAtomicValue| XdmSequence::<SimpleNode>::one(v);
        assert!(!effective_boolean_value(&XdmSequence::<SimpleNode>::empty()).unwrap());
        assert!(!effective_boolean_value(&s(XdmAtomicValue::Double(f64::NAN))).unwrap());
        assert!(!effective_boolean_value(&s(XdmAtomicValue::String(String::new()))).unwrap());
        assert!(effective_boolean_value(&s(XdmAtomicValue::Byte(-1))).unwrap());
        let nodes = XdmSequence::from_items(vec![
            XdmItem::Node(elem("a").build()),
            XdmItem::Atomic(XdmAtomicValue::Boolean(false)),
        ]);
        assert!(effective_boolean_value(&nodes).unwrap());
        let two = XdmSequence::<SimpleNode>::range(1, 3);
        assert_eq!(effective_boolean_value(&two).unwrap_err().code_enum(), ErrorCode::FORG0006);
        let date = s(XdmAtomicValue::YearMonthDuration(1));
        assert_eq!(effective_boolean_value(&date).unwrap_err().code_enum(), ErrorCode::FORG0006);
    }
}
