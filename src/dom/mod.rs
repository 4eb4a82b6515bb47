//! An owned, mutable XML document tree.
//!
//! The transformation engine builds its output tree node by node, so unlike a
//! read-only parse tree the arena here supports appending children, setting
//! attributes, and declaring namespaces after construction. Handles stay
//! valid forever: the arena never removes nodes.

mod parse;
mod serialize;
mod tree;

pub use self::parse::{parse_file, parse_str};
pub use self::serialize::{serialize, SerializeOptions};
pub use self::tree::{Document, Node, NodeType, QName, XML_NAMESPACE};
