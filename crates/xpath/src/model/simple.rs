//! Simple in-memory tree implementation of `XdmNode`, used by tests, benches
//! and doc examples.
//!
//! Elements and attributes can carry a declared schema type and an `xsi:nil`
//! flag so that atomization follows the same path as for validated instances.
//! Building a tree assigns `(document, preorder)` order keys.
//!
//! ```
//! use xbrl_xpath::model::simple::{doc, elem, attr, text, ns};
//! use xbrl_xpath::{ExpandedName, XdmNode};
//!
//! // <xbrl xmlns:iso4217="..."><Assets unit="EUR">100</Assets></xbrl>
//! let document = doc()
//!     .child(
//!         elem("xbrl")
//!             .namespace(ns("iso4217", "http://www.xbrl.org/2003/iso4217"))
//!             .child(
//!                 elem("Assets")
//!                     .typed(ExpandedName::xs("decimal"))
//!                     .attr(attr("unit", "EUR"))
//!                     .child(text("100")),
//!             ),
//!     )
//!     .build();
//! let xbrl = document.children()[0].clone();
//! assert_eq!(
//!     xbrl.lookup_namespace_uri("iso4217").as_deref(),
//!     Some("http://www.xbrl.org/2003/iso4217")
//! );
//! assert_eq!(xbrl.string_value(), "100");
//! ```
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use crate::model::{NodeKind, QName, XdmNode};
use crate::xdm::{ExpandedName, XdmAtomicValue};

const NO_KEY: u64 = u64::MAX;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub(crate) struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    schema_type: Option<ExpandedName>,
    nil: bool,
    parent: RwLock<Option<Weak<Inner>>>,
    attributes: RwLock<Vec<SimpleNode>>,
    namespaces: RwLock<Vec<SimpleNode>>,
    children: RwLock<Vec<SimpleNode>>,
    validated: OnceLock<XdmAtomicValue>,
    order_key: AtomicU64,
}

/// Arc-backed node; clones share identity.
#[derive(Clone)]
pub struct SimpleNode(pub(crate) Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}
impl std::hash::Hash for SimpleNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

fn unqualified(local: &str) -> QName {
    QName {
        prefix: None,
        local: local.to_string(),
        ns_uri: None,
    }
}

impl SimpleNode {
    fn new(
        kind: NodeKind,
        name: Option<QName>,
        value: Option<String>,
        schema_type: Option<ExpandedName>,
        nil: bool,
    ) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            schema_type,
            nil,
            parent: RwLock::new(None),
            attributes: RwLock::new(Vec::new()),
            namespaces: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            validated: OnceLock::new(),
            order_key: AtomicU64::new(NO_KEY),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Document, None)
    }

    pub fn element(name: &str) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(unqualified(name)))
    }

    pub fn element_qname(name: QName) -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Element, Some(name))
    }

    pub fn attribute(name: &str, value: &str) -> SimpleNode {
        Self::attribute_qname(unqualified(name), value, None)
    }

    pub fn attribute_qname(name: QName, value: &str, schema_type: Option<ExpandedName>) -> SimpleNode {
        SimpleNode::new(
            NodeKind::Attribute,
            Some(name),
            Some(value.to_string()),
            schema_type,
            false,
        )
    }

    pub fn text(value: &str) -> SimpleNode {
        SimpleNode::new(NodeKind::Text, None, Some(value.to_string()), None, false)
    }

    pub fn comment(value: &str) -> SimpleNode {
        SimpleNode::new(NodeKind::Comment, None, Some(value.to_string()), None, false)
    }

    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        SimpleNode::new(
            NodeKind::Namespace,
            Some(QName {
                prefix: Some(prefix.to_string()),
                local: prefix.to_string(),
                ns_uri: Some(uri.to_string()),
            }),
            Some(uri.to_string()),
            None,
            false,
        )
    }

    /// Whether on-demand validation already stored a typed value on this node.
    pub fn has_validated_value(&self) -> bool {
        self.0.validated.get().is_some()
    }

    fn assign_order_keys(&self) {
        let tree = NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed);
        let mut next: u64 = 0;
        fn walk(n: &SimpleNode, tree: u64, next: &mut u64) {
            n.0.order_key.store((tree << 32) | *next, AtomicOrdering::Relaxed);
            *next += 1;
            for a in n.attributes() {
                walk(&a, tree, next);
            }
            for ns in n.namespaces() {
                walk(&ns, tree, next);
            }
            for c in n.children() {
                walk(&c, tree, next);
            }
        }
        walk(self, tree, &mut next);
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    schema_type: Option<ExpandedName>,
    nil: bool,
    pending_children: Vec<SimpleNode>,
    pending_attrs: Vec<SimpleNode>,
    pending_ns: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            schema_type: None,
            nil: false,
            pending_children: Vec::new(),
            pending_attrs: Vec::new(),
            pending_ns: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<SimpleNodeOrBuilder>) -> Self {
        match child.into() {
            SimpleNodeOrBuilder::Built(n) => self.pending_children.push(n),
            SimpleNodeOrBuilder::Builder(b) => self.pending_children.push(b.build()),
        }
        self
    }

    pub fn children<I: IntoIterator<Item = SimpleNodeOrBuilder>>(mut self, it: I) -> Self {
        for c in it {
            self = self.child(c);
        }
        self
    }

    pub fn attr(mut self, attr: SimpleNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.pending_attrs.push(attr);
        self
    }

    pub fn namespace(mut self, ns: SimpleNode) -> Self {
        debug_assert!(ns.kind() == NodeKind::Namespace);
        self.pending_ns.push(ns);
        self
    }

    /// Declared schema type of the element.
    pub fn typed(mut self, ty: ExpandedName) -> Self {
        self.schema_type = Some(ty);
        self
    }

    /// Mark the element `xsi:nil="true"`.
    pub fn nil(mut self) -> Self {
        self.nil = true;
        self
    }

    pub fn build(self) -> SimpleNode {
        let node = SimpleNode::new(self.kind, self.name, None, self.schema_type, self.nil);
        let link = |list: &RwLock<Vec<SimpleNode>>, pending: Vec<SimpleNode>| {
            for n in &pending {
                *n.0.parent.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::downgrade(&node.0));
            }
            list.write()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(pending);
        };
        link(&node.0.attributes, self.pending_attrs);
        link(&node.0.namespaces, self.pending_ns);
        link(&node.0.children, self.pending_children);
        node.assign_order_keys();
        node
    }
}

pub enum SimpleNodeOrBuilder {
    Built(SimpleNode),
    Builder(SimpleNodeBuilder),
}
impl From<SimpleNode> for SimpleNodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        SimpleNodeOrBuilder::Built(n)
    }
}
impl From<SimpleNodeBuilder> for SimpleNodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        SimpleNodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}
pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNode::element(name)
}
/// Element in a namespace, e.g. `elem_ns("xbrli", XBRLI, "context")`.
pub fn elem_ns(prefix: &str, uri: &str, local: &str) -> SimpleNodeBuilder {
    SimpleNode::element_qname(QName::new(Some(prefix), Some(uri), local))
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn attr(name: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(name, v)
}
pub fn typed_attr(name: &str, v: &str, ty: ExpandedName) -> SimpleNode {
    SimpleNode::attribute_qname(unqualified(name), v, Some(ty))
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::comment(v)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.kind() {
            NodeKind::Element | NodeKind::Document => {
                fn dfs(n: &SimpleNode, out: &mut String) {
                    if n.kind() == NodeKind::Text
                        && let Some(v) = &n.0.value
                    {
                        out.push_str(v);
                    }
                    for c in n.children() {
                        dfs(&c, out);
                    }
                }
                let mut out = String::new();
                dfs(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0
            .parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
            .map(SimpleNode)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn namespaces(&self) -> Vec<Self> {
        self.0.namespaces.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn doc_order_key(&self) -> Option<u64> {
        match self.0.order_key.load(AtomicOrdering::Relaxed) {
            NO_KEY => None,
            k => Some(k),
        }
    }

    fn schema_type(&self) -> Option<ExpandedName> {
        self.0.schema_type.clone()
    }

    fn is_nil(&self) -> bool {
        self.0.nil
    }

    fn validated_value(&self) -> Option<XdmAtomicValue> {
        self.0.validated.get().cloned()
    }

    fn cache_validated_value(&self, value: &XdmAtomicValue) {
        let _ = self.0.validated.set(value.clone());
    }
}
