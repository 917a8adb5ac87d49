//! XPath 2.0 expression evaluation over typed XBRL instance documents.
//!
//! The crate evaluates pre-parsed expression IR ([`ir::Expr`]) against any
//! document model implementing [`XdmNode`]. Leaf values are typed through a
//! [`TypeRegistry`] of schema type definitions, and the result of every
//! evaluation is a flat [`XdmSequence`].
//!
//! ```
//! use xbrl_xpath::engine::{Context, Evaluator};
//! use xbrl_xpath::ir::builder::{child, path, root_desc};
//! use xbrl_xpath::model::simple::{doc, elem, text};
//! use xbrl_xpath::XdmNode;
//!
//! let instance = doc()
//!     .child(elem("xbrl").child(elem("Assets").child(text("100"))))
//!     .build();
//! let evaluator = Evaluator::with_defaults();
//! let mut ctx = Context::builder().with_context_node(instance).build();
//! let facts = evaluator
//!     .evaluate(&root_desc(path(child("xbrl"), child("Assets"))), &mut ctx)
//!     .unwrap();
//! assert_eq!(facts.len(), 1);
//! let fact = facts.first().unwrap();
//! assert_eq!(fact.as_node().unwrap().string_value(), "100");
//! ```
pub mod consts;
pub mod engine;
pub mod ir;
pub mod model;
pub mod schema;
pub mod xdm;

pub use engine::{Context, ContextBuilder, Error, ErrorCode, ErrorKind, Evaluator, EvaluatorConfig};
pub use model::{NodeKind, QName, XdmNode};
pub use schema::TypeRegistry;
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
