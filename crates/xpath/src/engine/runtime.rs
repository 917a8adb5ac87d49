use crate::xdm::ExpandedName;
use core::fmt;
use std::sync::Arc;

pub use crate::consts::ERR_NS;

/// Position of the IR node being evaluated, as recorded by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error families callers branch on without matching code strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong number of function or operator arguments.
    Arity,
    /// Operand or argument does not match the required type, including
    /// sequences that are too long for the context.
    Type,
    /// The function name resolves to no implementation.
    FunctionUnavailable,
    /// Malformed lexical value, division by zero, indeterminate boolean value.
    Value,
    /// Evaluation aborted through the cooperative cancellation flag.
    BudgetExceeded,
    /// Expression tree nested deeper than the configured bound.
    DepthExceeded,
    /// Other dynamic errors (missing context item, document order failures).
    Dynamic,
    /// Malformed IR that a parser should have rejected.
    Static,
}

/// Error codes the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOCA0002, // invalid lexical value for a cast target
    FOER0000, // unidentified error (cancellation, document order across roots)
    FONS0004, // no namespace for prefix
    FORG0001, // invalid value for cast / constructor
    FORG0006, // invalid argument type (effective boolean value)
    FOTY0012, // argument node has no typed value
    XPDY0002, // context item undefined
    XPDY0050, // treat as mismatch
    XPDY0130, // implementation limit exceeded
    XPST0003, // malformed expression
    XPST0008, // undeclared variable
    XPST0017, // unknown function / wrong arity
    XPTY0004, // type error
    XPTY0018, // path result mixes nodes and atomic values
    XPTY0019, // path step on a non-node
    XPTY0020, // axis step with non-node context item
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FONS0004 => "FONS0004",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0012 => "FOTY0012",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPDY0050 => "XPDY0050",
            ErrorCode::XPDY0130 => "XPDY0130",
            ErrorCode::XPST0003 => "XPST0003",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0018 => "XPTY0018",
            ErrorCode::XPTY0019 => "XPTY0019",
            ErrorCode::XPTY0020 => "XPTY0020",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// QName of this code in the xqt-errors namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName::new(Some(ERR_NS.to_string()), self.as_str())
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s.strip_prefix("err:").unwrap_or(s) {
            "FOAR0001" => FOAR0001,
            "FOAR0002" => FOAR0002,
            "FOCA0002" => FOCA0002,
            "FOER0000" => FOER0000,
            "FONS0004" => FONS0004,
            "FORG0001" => FORG0001,
            "FORG0006" => FORG0006,
            "FOTY0012" => FOTY0012,
            "XPDY0002" => XPDY0002,
            "XPDY0050" => XPDY0050,
            "XPDY0130" => XPDY0130,
            "XPST0003" => XPST0003,
            "XPST0008" => XPST0008,
            "XPST0017" => XPST0017,
            "XPTY0004" => XPTY0004,
            "XPTY0018" => XPTY0018,
            "XPTY0019" => XPTY0019,
            "XPTY0020" => XPTY0020,
            _ => Unknown,
        }
    }

    /// Kind an error with this code carries unless a constructor says otherwise.
    pub fn default_kind(&self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            XPTY0004 | XPTY0018 | XPTY0019 | XPTY0020 | XPDY0050 | FOTY0012 => ErrorKind::Type,
            FOAR0001 | FOAR0002 | FOCA0002 | FONS0004 | FORG0001 | FORG0006 => ErrorKind::Value,
            XPST0017 => ErrorKind::FunctionUnavailable,
            XPDY0130 => ErrorKind::DepthExceeded,
            XPST0003 | XPST0008 => ErrorKind::Static,
            FOER0000 | XPDY0002 | Unknown => ErrorKind::Dynamic,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: msg.into(),
            location: None,
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), code.default_kind(), msg)
    }

    /// Wrong number of arguments (`err:XPST0017`).
    pub fn arity(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPST0017, msg).with_kind(ErrorKind::Arity)
    }

    /// Generic type mismatch (`err:XPTY0004`).
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPTY0004, msg)
    }

    /// No implementation for the named function.
    pub fn function_unavailable(name: impl fmt::Display) -> Self {
        Self::from_code(
            ErrorCode::XPST0017,
            format!("function {name}() is not available"),
        )
        .with_kind(ErrorKind::FunctionUnavailable)
    }

    /// Evaluation stopped because the cancellation flag was raised.
    pub fn budget_exceeded() -> Self {
        Self::from_code(ErrorCode::FOER0000, "evaluation budget exceeded")
            .with_kind(ErrorKind::BudgetExceeded)
    }

    pub fn depth_exceeded(max_depth: usize) -> Self {
        Self::from_code(
            ErrorCode::XPDY0130,
            format!("expression nesting exceeds the maximum depth of {max_depth}"),
        )
    }

    /// Name the function whose call failed; code and kind are kept.
    pub fn in_function(mut self, name: impl fmt::Display) -> Self {
        self.message = format!("{name}(): {}", self.message);
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach a location unless a more specific (inner) one is already set.
    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// Human-readable code (`err:LOCAL` or `Q{ns}local`).
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }
}

impl From<fancy_regex::Error> for Error {
    fn from(e: fancy_regex::Error) -> Self {
        Error::from_code(ErrorCode::FORG0001, "invalid pattern facet")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())?;
        if let Some(loc) = &self.location {
            write!(f, " at {loc}")?;
        }
        Ok(())
    }
}
