//! An XPath 1.0 engine over the [`dom`](crate::dom) tree.
//!
//! Expressions are compiled once into an AST and evaluated against a context
//! node. Variable, extension-function, and namespace-prefix resolution is
//! delegated to a [`Resolver`] supplied at evaluation time, so the same
//! compiled expression can run under different execution contexts.

pub mod ast;
pub mod engine;
pub mod functions;
pub mod parser;
pub mod value;

pub use self::ast::Expression;
pub use self::engine::{evaluate, sort_document_order, EvalContext, NullResolver, Resolver};
pub use self::functions::is_core_function;
pub use self::parser::parse_expression;
pub use self::value::{number_to_string, Value};
