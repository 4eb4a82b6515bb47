//! The XSLT 1.0 engine: stylesheet compiler, match-pattern engine, and the
//! tree-walking instruction interpreter.

pub mod avt;
pub mod context;
pub mod functions;
pub mod instruction;
pub mod number;
pub mod output;
pub mod pattern;
pub mod sort;
pub mod stylesheet;
pub mod template;

pub use self::stylesheet::{
    parse_stylesheet_file, OutputMethod, Stylesheet, StylesheetOptions,
};

/// The namespace that marks stylesheet elements as instructions.
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";
