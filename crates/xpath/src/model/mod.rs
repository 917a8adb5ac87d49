use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmAtomicValue};
use core::cmp::Ordering;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn new(prefix: Option<&str>, ns_uri: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            ns_uri: ns_uri.map(str::to_string),
        }
    }

    pub fn expanded(&self) -> ExpandedName {
        ExpandedName::new(self.ns_uri.clone(), self.local.clone())
    }
}

impl core::fmt::Display for QName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{}:{}", p, self.local),
            _ => f.write_str(&self.local),
        }
    }
}

/// Compare two nodes by ancestry and stable sibling order (fallback algorithm).
///
/// Properties:
/// - If one node is an ancestor of the other, the ancestor precedes the descendant.
/// - Among siblings, attributes come first, then namespaces, then child nodes; within
///   each group the order provided by the adapter is preserved.
/// - If the nodes belong to different roots, returns an error (`err:FOER0000`) because
///   the fallback cannot establish a global order. Adapters with several documents
///   should provide `XdmNode::doc_order_key` as `(document, preorder index)`.
pub fn try_compare_by_ancestry<N: XdmNode>(a: &N, b: &N) -> Result<Ordering, Error> {
    if a == b {
        return Ok(Ordering::Equal);
    }
    fn path_to_root<N: XdmNode>(mut n: N) -> Vec<N> {
        let mut p = vec![n.clone()];
        while let Some(parent) = n.parent() {
            p.push(parent.clone());
            n = parent;
        }
        p.reverse();
        p
    }
    let pa = path_to_root(a.clone());
    let pb = path_to_root(b.clone());
    let mut i = 0usize;
    let len = core::cmp::min(pa.len(), pb.len());
    while i < len && pa[i] == pb[i] {
        i += 1;
    }
    // One path is a prefix of the other: the shorter one is the ancestor.
    if i == len {
        return Ok(if pa.len() < pb.len() {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    if i == 0 {
        return Err(Error::from_code(
            ErrorCode::FOER0000,
            "document order requires adapter: nodes from different roots",
        ));
    }
    let parent = &pa[i - 1];
    let mut sibs: Vec<N> = Vec::new();
    sibs.extend(parent.attributes());
    sibs.extend(parent.namespaces());
    sibs.extend(parent.children());
    let posa = sibs.iter().position(|n| n == &pa[i]);
    let posb = sibs.iter().position(|n| n == &pb[i]);
    Ok(match (posa, posb) {
        (Some(aidx), Some(bidx)) => aidx.cmp(&bidx),
        _ => Ordering::Equal,
    })
}

/// Read-only view of a node in an externally owned, typed document tree.
///
/// Equality is node identity, never structural equality.
pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;
    fn namespaces(&self) -> Vec<Self> {
        Vec::new()
    }

    /// Stable document-order key. Keys must be unique across every document
    /// the evaluator may see at once.
    fn doc_order_key(&self) -> Option<u64> {
        None
    }

    fn compare_document_order(&self, other: &Self) -> Result<Ordering, Error> {
        match (self.doc_order_key(), other.doc_order_key()) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => try_compare_by_ancestry(self, other),
        }
    }

    /// Declared schema type of an element or attribute, if the node was validated
    /// (or can be validated) against a schema.
    fn schema_type(&self) -> Option<ExpandedName> {
        None
    }

    /// `xsi:nil="true"` on an element.
    fn is_nil(&self) -> bool {
        false
    }

    /// Typed value already computed by a validation pass.
    fn validated_value(&self) -> Option<XdmAtomicValue> {
        None
    }

    /// Record the value computed by on-demand validation. Must be idempotent:
    /// storing the same value twice has no further effect.
    fn cache_validated_value(&self, _value: &XdmAtomicValue) {}

    /// Resolve a namespace prefix ("" for the default namespace) against the
    /// in-scope namespaces of this node's owning element.
    fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(crate::consts::XML_URI.to_string());
        }
        let mut cur = match self.kind() {
            NodeKind::Element => Some(self.clone()),
            _ => self.parent(),
        };
        while let Some(n) = cur {
            if n.kind() == NodeKind::Element {
                for ns in n.namespaces() {
                    if let Some(q) = ns.name()
                        && q.prefix.as_deref().unwrap_or("") == prefix
                    {
                        return Some(ns.string_value());
                    }
                }
            }
            cur = n.parent();
        }
        None
    }

    fn root(&self) -> Self {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }
}
