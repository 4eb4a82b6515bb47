//! Builds a [`Document`] from a `quick-xml` event stream.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::tree::{Document, Node, QName, XML_NAMESPACE};
use crate::error::{Error, Result};

/// Parses a complete XML document from a string.
pub fn parse_str(input: &str, uri: Option<&str>) -> Result<Document> {
    let doc = Document::new();
    if let Some(uri) = uri {
        doc.set_uri(uri);
    }

    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Node> = vec![doc.root()];

    loop {
        match reader.read_event()? {
            Event::DocType(text) => {
                let subset = String::from_utf8_lossy(&text).into_owned();
                scan_unparsed_entities(&doc, &subset);
            }
            Event::Start(start) => {
                let parent = current(&stack)?;
                let element = open_element(&doc, &parent, start.name().as_ref(), &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let parent = current(&stack)?;
                open_element(&doc, &parent, start.name().as_ref(), &start)?;
            }
            Event::End(_) => {
                if stack.len() <= 1 {
                    return Err(Error::Parse("unbalanced end tag".to_string()));
                }
                stack.pop();
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| Error::Parse(e.to_string()))?
                    .into_owned();
                let node = doc.create_text(&content);
                current(&stack)?.append_child(&node);
            }
            Event::CData(cdata) => {
                let content = std::str::from_utf8(&cdata)?.to_string();
                let node = doc.create_cdata(&content);
                current(&stack)?.append_child(&node);
            }
            Event::Comment(comment) => {
                let content = String::from_utf8_lossy(&comment).into_owned();
                let node = doc.create_comment(&content);
                current(&stack)?.append_child(&node);
            }
            Event::PI(pi) => {
                let text = String::from_utf8_lossy(&pi).into_owned();
                let (target, content) = match text.split_once(char::is_whitespace) {
                    Some((t, c)) => (t.to_string(), c.trim_start().to_string()),
                    None => (text, String::new()),
                };
                let node = doc.create_pi(&target, &content);
                current(&stack)?.append_child(&node);
            }
            Event::Eof => break,
            // declarations and entity references carry no tree content here
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(Error::Parse("unexpected end of document".to_string()));
    }
    if doc.root_element().is_none() {
        return Err(Error::Parse("document has no root element".to_string()));
    }
    Ok(doc)
}

/// Reads and parses an XML file.
pub fn parse_file(path: &Path) -> Result<Document> {
    let data = std::fs::read_to_string(path)?;
    parse_str(&data, Some(&path.to_string_lossy()))
}

fn current(stack: &[Node]) -> Result<Node> {
    stack
        .last()
        .cloned()
        .ok_or_else(|| Error::Parse("unbalanced element nesting".to_string()))
}

/// Creates an element for a start tag: namespace declarations are attached
/// first so that the element's own name (and its attributes) resolve against
/// the scope they introduce.
fn open_element(
    doc: &Document,
    parent: &Node,
    raw_name: &[u8],
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<Node> {
    let name = QName::parse(std::str::from_utf8(raw_name)?);
    let element = doc.create_element(name.clone());
    parent.append_child(&element);

    // Two passes over the attributes: declarations first, then ordinary
    // attributes, which may depend on the declarations for their prefixes.
    let mut plain = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            element.declare_namespace("", &value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.declare_namespace(prefix, &value);
        } else {
            plain.push((key, value));
        }
    }

    match &name.prefix {
        Some(prefix) => {
            if let Some(uri) = element.lookup_namespace_uri(prefix) {
                element.set_namespace(Some(prefix), &uri);
            } else {
                return Err(Error::Parse(format!("undeclared prefix '{}'", prefix)));
            }
        }
        None => {
            if let Some(uri) = element.default_namespace() {
                if !uri.is_empty() {
                    element.set_namespace(None, &uri);
                }
            }
        }
    }

    for (key, value) in plain {
        let qname = QName::parse(&key);
        match &qname.prefix {
            Some(prefix) if prefix == "xml" => {
                element.set_ns_attribute(XML_NAMESPACE, &key, &value);
            }
            Some(prefix) => {
                let uri = element
                    .lookup_namespace_uri(prefix)
                    .ok_or_else(|| Error::Parse(format!("undeclared prefix '{}'", prefix)))?;
                element.set_ns_attribute(&uri, &key, &value);
            }
            None => element.set_attribute(&key, &value),
        }
        if key == "id" || key == "xml:id" {
            doc.register_id(&value, &element);
        }
    }

    Ok(element)
}

/// Scans an internal DTD subset for unparsed entity declarations:
/// `<!ENTITY name SYSTEM "uri" NDATA notation>`.
fn scan_unparsed_entities(doc: &Document, subset: &str) {
    let mut rest = subset;
    while let Some(pos) = rest.find("<!ENTITY") {
        rest = &rest[pos + "<!ENTITY".len()..];
        let end = match rest.find('>') {
            Some(e) => e,
            None => break,
        };
        let decl = &rest[..end];
        rest = &rest[end..];

        let mut words = decl.split_whitespace();
        let name = match words.next() {
            Some(n) if n != "%" => n,
            _ => continue,
        };
        if words.next() != Some("SYSTEM") {
            continue;
        }
        let uri = match decl.split(['"', '\'']).nth(1) {
            Some(u) => u,
            None => continue,
        };
        if decl.contains("NDATA") {
            doc.register_unparsed_entity(name, uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeType;

    #[test]
    fn parse_simple_document() {
        let doc = parse_str("<a x=\"1\"><b/>text<b/></a>", None).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(root.name(), "a");
        assert_eq!(root.attribute("x").as_deref(), Some("1"));
        assert_eq!(root.children().len(), 3);
        assert_eq!(root.string_value(), "text");
    }

    #[test]
    fn parse_namespaces() {
        let doc = parse_str(
            "<r xmlns=\"urn:d\" xmlns:p=\"urn:p\"><p:c a=\"v\" p:b=\"w\"/></r>",
            None,
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(root.namespace(), "urn:d");
        let child = &root.children()[0];
        assert_eq!(child.namespace(), "urn:p");
        assert_eq!(child.local_name(), "c");
        let attrs = child.attributes();
        assert_eq!(attrs[0].namespace(), "");
        assert_eq!(attrs[1].namespace(), "urn:p");
    }

    #[test]
    fn parse_mixed_content_kinds() {
        let doc = parse_str(
            "<a><!-- note --><?go there?><![CDATA[<raw>]]></a>",
            None,
        )
        .unwrap();
        let kinds: Vec<NodeType> = doc
            .root_element()
            .unwrap()
            .children()
            .iter()
            .map(|c| c.node_type())
            .collect();
        assert_eq!(
            kinds,
            vec![NodeType::Comment, NodeType::ProcessingInstruction, NodeType::Cdata]
        );
    }

    #[test]
    fn parse_ids_and_entities() {
        let doc = parse_str(
            "<!DOCTYPE r [<!ENTITY pic SYSTEM \"img.png\" NDATA png>]><r><e id=\"e1\"/></r>",
            None,
        )
        .unwrap();
        assert_eq!(doc.element_by_id("e1").map(|n| n.name()), Some("e".into()));
        assert_eq!(doc.unparsed_entity_uri("pic").as_deref(), Some("img.png"));
    }

    #[test]
    fn reject_malformed() {
        assert!(parse_str("<a><b></a>", None).is_err());
        assert!(parse_str("just text", None).is_err());
    }
}
