//! Evaluation engine: configuration, execution context, the evaluator and
//! function dispatch.
pub mod config;
pub mod context;
pub mod evaluator;
pub mod functions;
pub mod runtime;

pub use config::EvaluatorConfig;
pub use context::{Context, ContextBuilder, OutputSlots};
pub use evaluator::{Evaluator, Focus};
pub use functions::{CallCtx, CustomFunction, FunctionLibrary};
pub use runtime::{Error, ErrorCode, ErrorKind, SourceLocation};
