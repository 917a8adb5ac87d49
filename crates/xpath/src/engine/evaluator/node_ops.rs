//! Name tests, kind tests and node-name namespace resolution.

use crate::engine::runtime::Error;
use crate::ir::{Expr, KindTest, NameTest, Part};
use crate::model::{NodeKind, XdmNode};
use crate::schema::TypeRegistry;
use crate::xdm::{ExpandedName, XdmAtomicValue};

/// Namespace URI of a node's name. A prefix without a recorded URI is
/// resolved against the node's in-scope namespaces; an unprefixed element
/// falls into the default namespace, an unprefixed attribute into none.
pub(crate) fn node_namespace<N: XdmNode>(node: &N) -> Option<String> {
    let name = node.name()?;
    if let Some(ns) = name.ns_uri {
        return Some(ns);
    }
    match (name.prefix.as_deref(), node.kind()) {
        (Some(p), _) if !p.is_empty() => node.lookup_namespace_uri(p),
        (_, NodeKind::Element) => node.lookup_namespace_uri("").filter(|u| !u.is_empty()),
        _ => None,
    }
}

pub(crate) fn expanded_node_name<N: XdmNode>(node: &N) -> Option<ExpandedName> {
    let local = node.name()?.local;
    Some(ExpandedName::new(node_namespace(node), local))
}

/// Name test against a node of the axis' principal kind.
pub(crate) fn matches_name_test<N: XdmNode>(node: &N, test: &NameTest, principal: NodeKind) -> bool {
    if node.kind() != principal {
        return false;
    }
    if test.is_wildcard && test.ns_uri.is_none() && test.local.is_none() {
        return true;
    }
    let Some(name) = node.name() else {
        return false;
    };
    test.matches_name(node_namespace(node).as_deref(), &name.local)
}

/// Declared type of `node` is `required` or derived from it. Untyped nodes
/// only satisfy `xs:anyType` and `xs:untyped`.
fn type_matches<N: XdmNode>(types: &TypeRegistry, node: &N, required: &ExpandedName) -> bool {
    let actual = node
        .schema_type()
        .unwrap_or_else(|| ExpandedName::xs(if node.kind() == NodeKind::Attribute { "untypedAtomic" } else { "untyped" }));
    types.derives_from(&actual, required)
        || (required.is_xs() && required.local == "anySimpleType" && node.kind() == NodeKind::Attribute)
}

pub(crate) fn matches_kind_test<N: XdmNode>(types: &TypeRegistry, node: &N, test: &KindTest) -> bool {
    let name_ok = |name: &Option<ExpandedName>| {
        name.as_ref()
            .is_none_or(|n| expanded_node_name(node).as_ref() == Some(n))
    };
    match test {
        KindTest::AnyNode => true,
        KindTest::Document => node.kind() == NodeKind::Document,
        KindTest::Text => node.kind() == NodeKind::Text,
        KindTest::Comment => node.kind() == NodeKind::Comment,
        KindTest::ProcessingInstruction(target) => {
            node.kind() == NodeKind::ProcessingInstruction
                && target
                    .as_ref()
                    .is_none_or(|t| node.name().is_some_and(|q| &q.local == t))
        }
        KindTest::Element {
            name,
            type_name,
            nillable,
        } => {
            node.kind() == NodeKind::Element
                && name_ok(name)
                && type_name.as_ref().is_none_or(|t| {
                    type_matches(types, node, t) && (*nillable || !node.is_nil())
                })
        }
        KindTest::Attribute { name, type_name } => {
            node.kind() == NodeKind::Attribute
                && name_ok(name)
                && type_name.as_ref().is_none_or(|t| type_matches(types, node, t))
        }
    }
}

fn name_arg(arg: Option<&Expr>, what: &str) -> Result<Option<ExpandedName>, Error> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.single() {
        Some(Part::NameTest(t)) if t.is_wildcard && t.local.is_none() => Ok(None),
        Some(Part::NameTest(t)) => match &t.local {
            Some(local) => Ok(Some(ExpandedName::new(t.ns_uri.clone(), local.clone()))),
            None => Err(Error::type_error(format!("{what} must be a name"))),
        },
        Some(Part::Literal(XdmAtomicValue::String(s))) => Ok(Some(ExpandedName::local(s))),
        _ => Err(Error::type_error(format!("{what} must be a name"))),
    }
}

/// Kind test spelled as an unprefixed call (`text()`, `element(a, T)`, ...).
/// `None` when `local` does not name a kind test; `item()` is reported as
/// [`KindTest::AnyNode`] since a step can only yield nodes.
pub(crate) fn kind_test_from_call(local: &str, args: &[Expr]) -> Option<Result<KindTest, Error>> {
    let test = match local {
        "node" | "item" => Ok(KindTest::AnyNode),
        "text" => Ok(KindTest::Text),
        "comment" => Ok(KindTest::Comment),
        "document-node" => Ok(KindTest::Document),
        "processing-instruction" => {
            name_arg(args.first(), "processing-instruction target").map(|n| {
                KindTest::ProcessingInstruction(n.map(|n| n.local))
            })
        }
        "element" => (|| {
            let name = name_arg(args.first(), "element name")?;
            let type_name = name_arg(args.get(1), "element type")?;
            let nillable = matches!(
                args.get(2).and_then(Expr::single),
                Some(Part::Literal(XdmAtomicValue::Boolean(true)))
            );
            Ok(KindTest::Element {
                name,
                type_name,
                nillable,
            })
        })(),
        "attribute" => (|| {
            Ok(KindTest::Attribute {
                name: name_arg(args.first(), "attribute name")?,
                type_name: name_arg(args.get(1), "attribute type")?,
            })
        })(),
        _ => return None,
    };
    Some(test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::{name_test, name_test_ns, string, wildcard};
    use crate::model::simple::{attr, elem, elem_ns, ns};

    #[test]
    fn unprefixed_elements_use_the_default_namespace() {
        let root = elem("xbrl")
            .namespace(ns("", "urn:default"))
            .child(elem("Assets"))
            .build();
        let assets = root.children()[0].clone();
        assert_eq!(node_namespace(&assets).as_deref(), Some("urn:default"));
        assert!(matches_name_test(&assets, &name_test_ns("urn:default", "Assets"), NodeKind::Element));
        assert!(!matches_name_test(&assets, &name_test("Assets"), NodeKind::Element));
    }

    #[test]
    fn principal_kind_gates_name_tests() {
        let e = elem("a").attr(attr("a", "1")).build();
        let a = e.attributes()[0].clone();
        assert!(matches_name_test(&a, &wildcard(), NodeKind::Attribute));
        assert!(!matches_name_test(&a, &wildcard(), NodeKind::Element));
    }

    #[test]
    fn element_kind_test_follows_type_derivation() {
        let types = TypeRegistry::with_xbrl_item_types();
        let fact = elem_ns("p", "urn:p", "Assets")
            .typed(ExpandedName::new(Some(crate::consts::XBRLI.into()), "monetaryItemType"))
            .build();
        let test = KindTest::Element {
            name: None,
            type_name: Some(ExpandedName::xs("decimal")),
            nillable: false,
        };
        assert!(matches_kind_test(&types, &fact, &test));
        let test = KindTest::Element {
            name: None,
            type_name: Some(ExpandedName::xs("string")),
            nillable: false,
        };
        assert!(!matches_kind_test(&types, &fact, &test));
    }

    #[test]
    fn kind_tests_from_calls() {
        assert_eq!(kind_test_from_call("text", &[]).unwrap().unwrap(), KindTest::Text);
        assert!(kind_test_from_call("count", &[]).is_none());
        let pi = kind_test_from_call("processing-instruction", &[string("xml-stylesheet")]);
        assert_eq!(
            pi.unwrap().unwrap(),
            KindTest::ProcessingInstruction(Some("xml-stylesheet".into()))
        );
    }
}
