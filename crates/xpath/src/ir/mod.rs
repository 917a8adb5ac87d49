//! Tree-shaped expression IR consumed by the evaluator.
//!
//! An [`Expr`] is a flat list of [`Part`]s evaluated left to right on a value
//! stack. Binary operations pop their left operand from that stack and carry
//! their remaining operands as unevaluated sub-expressions in `args`, so
//! `1 + 2` is `[Literal(1), Operation(Add, args: [[Literal(2)]])]`. Values left
//! on the stack when the list is exhausted are concatenated into the result.
//!
//! The IR is produced by an external parser (or [`builder`] in tests) and is
//! never mutated during evaluation.
use crate::engine::runtime::SourceLocation;
use crate::model::QName;
use crate::xdm::{ExpandedName, XdmAtomicValue};

pub mod builder;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expr(pub Vec<Part>);

impl Expr {
    pub fn new(parts: Vec<Part>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[Part] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The only part of a single-part expression.
    pub fn single(&self) -> Option<&Part> {
        match self.0.as_slice() {
            [p] => Some(p),
            _ => None,
        }
    }
}

impl From<Part> for Expr {
    fn from(p: Part) -> Self {
        Expr(vec![p])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Header(ProgHeader),
    Literal(XdmAtomicValue),
    VariableRef(ExpandedName),
    NameTest(NameTest),
    Operation(Operation),
    Quantified(Quantified),
}

/// Diagnostic kinds a host may attach to a compiled expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Expression,
    Variable,
    Assertion,
    Message,
}

/// Marks the start of one compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgHeader {
    pub source: String,
    pub trace: Option<TraceKind>,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Parent,
    SelfAxis,
    Ancestor,
    AncestorOrSelf,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Parent => "parent",
            Axis::SelfAxis => "self",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
            Axis::Attribute => "attribute",
        }
    }
}

/// Path-step name test.
///
/// With `is_wildcard` set, a missing `ns_uri` or `local` matches anything, so
/// `*` has neither, `ns:*` has only `ns_uri` and `*:local` only `local`.
/// Without it both parts must match exactly (`None` meaning no namespace).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameTest {
    pub ns_uri: Option<String>,
    pub local: Option<String>,
    pub axis: Option<Axis>,
    pub is_attribute: bool,
    pub is_wildcard: bool,
}

impl NameTest {
    /// Axis this test steps along when it appears as a path step.
    pub fn effective_axis(&self) -> Axis {
        match self.axis {
            Some(a) => a,
            None if self.is_attribute => Axis::Attribute,
            None => Axis::Child,
        }
    }

    pub fn matches_name(&self, ns_uri: Option<&str>, local: &str) -> bool {
        if self.is_wildcard {
            self.ns_uri.as_deref().is_none_or(|n| Some(n) == ns_uri)
                && self.local.as_deref().is_none_or(|l| l == local)
        } else {
            self.ns_uri.as_deref() == ns_uri && self.local.as_deref() == Some(local)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn test(self, ord: core::cmp::Ordering) -> bool {
        use core::cmp::Ordering::*;
        match self {
            ComparisonOp::Eq => ord == Equal,
            ComparisonOp::Ne => ord != Equal,
            ComparisonOp::Lt => ord == Less,
            ComparisonOp::Le => ord != Greater,
            ComparisonOp::Gt => ord == Greater,
            ComparisonOp::Ge => ord != Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCompOp {
    Is,
    Precedes,
    Follows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTest {
    Document,
    Element {
        name: Option<ExpandedName>,
        type_name: Option<ExpandedName>,
        nillable: bool,
    },
    Attribute {
        name: Option<ExpandedName>,
        type_name: Option<ExpandedName>,
    },
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
    AnyNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    AnyItem,
    Atomic(ExpandedName),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceType {
    EmptySequence,
    Typed { item: ItemType, occurrence: Occurrence },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Arithmetic(ArithOp),
    Negate,
    UnaryPlus,
    ValueCompare(ComparisonOp),
    GeneralCompare(ComparisonOp),
    NodeCompare(NodeCompOp),
    Set(SetOp),
    And,
    Or,
    To,
    InstanceOf(SequenceType),
    Treat(SequenceType),
    Cast { target: ExpandedName, optional: bool },
    Castable { target: ExpandedName, optional: bool },
    /// `left / args[0]`
    Child,
    /// `left // args[0]`
    Descendant,
    /// Leading `/` or `//`, optionally followed by a relative path in `args[0]`.
    Root { descendant: bool },
    /// `left[args[0]][args[1]]...`
    Predicate,
    /// `(args[0], args[1], ...)`
    Sequence,
    /// `if (args[0]) then args[1] else args[2]`
    If,
    ContextItem,
    Parent,
    FunctionCall { name: QName, axis: Option<Axis> },
}

impl OpKind {
    /// Whether the operation pops a left operand from the stack.
    pub fn takes_left_operand(&self) -> bool {
        matches!(
            self,
            OpKind::Arithmetic(_)
                | OpKind::ValueCompare(_)
                | OpKind::GeneralCompare(_)
                | OpKind::NodeCompare(_)
                | OpKind::Set(_)
                | OpKind::And
                | OpKind::Or
                | OpKind::To
                | OpKind::InstanceOf(_)
                | OpKind::Treat(_)
                | OpKind::Cast { .. }
                | OpKind::Castable { .. }
                | OpKind::Child
                | OpKind::Descendant
                | OpKind::Predicate
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: OpKind,
    pub args: Vec<Expr>,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    For,
    Some,
    Every,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Return,
    Satisfies,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeDecl {
    pub variable: ExpandedName,
    pub binding: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quantified {
    pub kind: QuantifierKind,
    pub bindings: Vec<RangeDecl>,
    pub clause: Clause,
    pub location: Option<SourceLocation>,
}
