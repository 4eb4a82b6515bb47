//! Final output construction: method selection, XML declaration, DOCTYPE,
//! and serialization of the result tree.

use super::stylesheet::{OutputMethod, Stylesheet, StylesheetOptions};
use crate::dom::{serialize, Document, SerializeOptions};
use crate::error::Result;

/// Turns the finished result tree into the output string per the
/// stylesheet's `xsl:output` settings and the caller's options.
pub fn construct(
    style: &Stylesheet,
    output: &Document,
    options: &StylesheetOptions,
) -> Result<String> {
    let method = style.output.method.unwrap_or_else(|| detect_method(output));
    let indent = options.indent || style.output.indent;
    let serialize_options = SerializeOptions {
        indent,
        html: method == OutputMethod::Html,
    };

    let mut out = String::new();
    match method {
        OutputMethod::Xml => {
            if !style.output.omit_xml_declaration {
                out.push_str("<?xml version=\"1.0\"");
                if let Some(encoding) = &style.output.encoding {
                    out.push_str(&format!(" encoding=\"{}\"", encoding));
                }
                if let Some(standalone) = style.output.standalone {
                    out.push_str(if standalone {
                        " standalone=\"yes\""
                    } else {
                        " standalone=\"no\""
                    });
                }
                out.push_str("?>\n");
            }
            push_doctype(style, output, &mut out);
            out.push_str(&serialize(&output.root(), &serialize_options));
            out.push('\n');
        }
        OutputMethod::Html => {
            push_doctype(style, output, &mut out);
            out.push_str(&serialize(&output.root(), &serialize_options));
            out.push('\n');
        }
        OutputMethod::Text => {
            out.push_str(&output.root().string_value());
        }
    }
    Ok(out)
}

/// With no explicit method, an output rooted at a no-namespace `html`
/// element serializes as HTML.
fn detect_method(output: &Document) -> OutputMethod {
    match output.root_element() {
        Some(root)
            if root.local_name().eq_ignore_ascii_case("html") && root.namespace().is_empty() =>
        {
            OutputMethod::Html
        }
        _ => OutputMethod::Xml,
    }
}

fn push_doctype(style: &Stylesheet, output: &Document, out: &mut String) {
    let root_name = match output.root_element() {
        Some(root) => root.name(),
        None => return,
    };
    match (&style.output.doctype_public, &style.output.doctype_system) {
        (Some(public), Some(system)) => {
            out.push_str(&format!(
                "<!DOCTYPE {} PUBLIC \"{}\" \"{}\">\n",
                root_name, public, system
            ));
        }
        (None, Some(system)) => {
            out.push_str(&format!("<!DOCTYPE {} SYSTEM \"{}\">\n", root_name, system));
        }
        (Some(public), None) => {
            out.push_str(&format!("<!DOCTYPE {} PUBLIC \"{}\">\n", root_name, public));
        }
        (None, None) => {}
    }
}
