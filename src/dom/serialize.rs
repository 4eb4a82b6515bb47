//! Serializes a document tree back to markup.

use quick_xml::escape::{escape, partial_escape};

use super::tree::{Node, NodeType};

/// Elements that never take an end tag in HTML output.
const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Pretty-print: children of element-only content go on indented lines.
    pub indent: bool,
    /// HTML output rules: void elements, no self-closing tags, literal
    /// script/style content.
    pub html: bool,
}

/// Serializes a node (for a document node, its children) to a string.
pub fn serialize(node: &Node, opts: &SerializeOptions) -> String {
    let mut out = String::new();
    match node.node_type() {
        NodeType::Document => {
            let children = node.children();
            let last = children.len().saturating_sub(1);
            for (i, child) in children.iter().enumerate() {
                write_node(&mut out, child, opts, 0);
                if opts.indent && i < last {
                    out.push('\n');
                }
            }
        }
        _ => write_node(&mut out, node, opts, 0),
    }
    out
}

fn write_node(out: &mut String, node: &Node, opts: &SerializeOptions, depth: usize) {
    match node.node_type() {
        NodeType::Document => {
            for child in node.children() {
                write_node(out, &child, opts, depth);
            }
        }
        NodeType::Element => write_element(out, node, opts, depth),
        NodeType::Text => {
            let content = node.content();
            if node.is_raw() {
                out.push_str(&content);
            } else {
                out.push_str(&partial_escape(content.as_str()));
            }
        }
        NodeType::Cdata => {
            out.push_str("<![CDATA[");
            out.push_str(&node.content());
            out.push_str("]]>");
        }
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.content());
            out.push_str("-->");
        }
        NodeType::ProcessingInstruction => {
            out.push_str("<?");
            out.push_str(&node.name());
            let content = node.content();
            if !content.is_empty() {
                out.push(' ');
                out.push_str(&content);
            }
            out.push_str("?>");
        }
        NodeType::Attribute => {
            out.push_str(&node.content());
        }
    }
}

fn write_element(out: &mut String, node: &Node, opts: &SerializeOptions, depth: usize) {
    let name = node.name();
    out.push('<');
    out.push_str(&name);

    for (prefix, uri) in node.declared_namespaces() {
        if prefix.is_empty() {
            out.push_str(&format!(" xmlns=\"{}\"", escape(uri.as_str())));
        } else {
            out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri.as_str())));
        }
    }
    for attr in node.attributes() {
        out.push_str(&format!(
            " {}=\"{}\"",
            attr.name(),
            escape(attr.content().as_str())
        ));
    }

    let children = node.children();
    if children.is_empty() {
        if opts.html {
            out.push('>');
            if !HTML_VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
                out.push_str(&format!("</{}>", name));
            }
        } else {
            out.push_str("/>");
        }
        return;
    }
    out.push('>');

    let literal_content =
        opts.html && matches!(name.to_ascii_lowercase().as_str(), "script" | "style");
    let element_only = children
        .iter()
        .all(|c| !matches!(c.node_type(), NodeType::Text | NodeType::Cdata));
    let break_lines = opts.indent && element_only;

    for child in &children {
        if break_lines {
            out.push('\n');
            out.push_str(&"  ".repeat(depth + 1));
        }
        if literal_content && matches!(child.node_type(), NodeType::Text | NodeType::Cdata) {
            out.push_str(&child.content());
        } else {
            write_node(out, child, opts, depth + 1);
        }
    }
    if break_lines {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
    }
    out.push_str(&format!("</{}>", name));
}
