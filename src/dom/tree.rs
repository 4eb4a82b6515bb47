//! The arena-backed document tree and the `Node` handle type.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// The URI bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

static NEXT_DOC_SERIAL: AtomicU64 = AtomicU64::new(1);

/// The type of a node, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    Element,
    Attribute,
    Text,
    Cdata,
    Comment,
    ProcessingInstruction,
}

/// A qualified name: optional prefix plus local part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(local: &str) -> QName {
        QName {
            prefix: None,
            local: local.to_string(),
        }
    }

    /// Splits a lexical QName on the first colon.
    pub fn parse(name: &str) -> QName {
        match name.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => QName {
                prefix: None,
                local: name.to_string(),
            },
        }
    }

    /// The qualified form, `prefix:local` or just `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeType,
    name: Option<QName>,
    ns_uri: Option<String>,
    content: String,
    /// Set by `disable-output-escaping`; the serializer emits the content verbatim.
    raw: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
    /// Namespace declarations made on this element: (prefix, uri). An empty
    /// prefix is the default namespace.
    namespaces: Vec<(String, String)>,
}

impl NodeData {
    fn new(kind: NodeType) -> NodeData {
        NodeData {
            kind,
            name: None,
            ns_uri: None,
            content: String::new(),
            raw: false,
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    serial: u64,
    nodes: Vec<NodeData>,
    ids: HashMap<String, usize>,
    unparsed_entities: HashMap<String, String>,
    uri: Option<String>,
}

/// A shared, mutable XML document. Cloning is cheap (reference counted);
/// all clones address the same tree.
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<Tree>>,
}

impl Document {
    /// Creates an empty document containing only the document node.
    pub fn new() -> Document {
        let root = NodeData::new(NodeType::Document);
        Document {
            tree: Rc::new(RefCell::new(Tree {
                serial: NEXT_DOC_SERIAL.fetch_add(1, AtomicOrdering::Relaxed),
                nodes: vec![root],
                ids: HashMap::new(),
                unparsed_entities: HashMap::new(),
                uri: None,
            })),
        }
    }

    /// A per-process serial number; used for deterministic cross-document ordering.
    pub fn serial(&self) -> u64 {
        self.tree.borrow().serial
    }

    /// The document node.
    pub fn root(&self) -> Node {
        Node {
            doc: self.clone(),
            id: 0,
        }
    }

    /// The outermost element, if any.
    pub fn root_element(&self) -> Option<Node> {
        self.root()
            .children()
            .into_iter()
            .find(|n| n.node_type() == NodeType::Element)
    }

    pub fn uri(&self) -> Option<String> {
        self.tree.borrow().uri.clone()
    }

    pub fn set_uri(&self, uri: &str) {
        self.tree.borrow_mut().uri = Some(uri.to_string());
    }

    fn alloc(&self, data: NodeData) -> Node {
        let mut tree = self.tree.borrow_mut();
        let id = tree.nodes.len();
        tree.nodes.push(data);
        Node {
            doc: self.clone(),
            id,
        }
    }

    /// Creates a detached element node.
    pub fn create_element(&self, name: QName) -> Node {
        let mut data = NodeData::new(NodeType::Element);
        data.name = Some(name);
        self.alloc(data)
    }

    /// Creates a detached text node.
    pub fn create_text(&self, content: &str) -> Node {
        let mut data = NodeData::new(NodeType::Text);
        data.content = content.to_string();
        self.alloc(data)
    }

    /// Creates a detached CDATA section node.
    pub fn create_cdata(&self, content: &str) -> Node {
        let mut data = NodeData::new(NodeType::Cdata);
        data.content = content.to_string();
        self.alloc(data)
    }

    /// Creates a detached comment node.
    pub fn create_comment(&self, content: &str) -> Node {
        let mut data = NodeData::new(NodeType::Comment);
        data.content = content.to_string();
        self.alloc(data)
    }

    /// Creates a detached processing-instruction node.
    pub fn create_pi(&self, target: &str, content: &str) -> Node {
        let mut data = NodeData::new(NodeType::ProcessingInstruction);
        data.name = Some(QName::new(target));
        data.content = content.to_string();
        self.alloc(data)
    }

    pub(crate) fn register_id(&self, id: &str, element: &Node) {
        let mut tree = self.tree.borrow_mut();
        tree.ids.entry(id.to_string()).or_insert(element.id);
    }

    /// Resolves an ID registered during parsing (`xml:id` or an attribute
    /// literally named `id`).
    pub fn element_by_id(&self, id: &str) -> Option<Node> {
        let node_id = *self.tree.borrow().ids.get(id)?;
        Some(Node {
            doc: self.clone(),
            id: node_id,
        })
    }

    pub(crate) fn register_unparsed_entity(&self, name: &str, uri: &str) {
        self.tree
            .borrow_mut()
            .unparsed_entities
            .insert(name.to_string(), uri.to_string());
    }

    pub fn unparsed_entity_uri(&self, name: &str) -> Option<String> {
        self.tree.borrow().unparsed_entities.get(name).cloned()
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("serial", &self.serial())
            .finish()
    }
}

/// A handle to one node of a [`Document`]. Identity is (document, node id).
#[derive(Clone)]
pub struct Node {
    doc: Document,
    id: usize,
}

impl Node {
    pub fn document(&self) -> Document {
        self.doc.clone()
    }

    fn make(&self, id: usize) -> Node {
        Node {
            doc: self.doc.clone(),
            id,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.doc.tree.borrow().nodes[self.id].kind
    }

    pub fn qname(&self) -> Option<QName> {
        self.doc.tree.borrow().nodes[self.id].name.clone()
    }

    /// The local part of the name, or `""` for unnamed nodes.
    pub fn local_name(&self) -> String {
        self.qname().map(|q| q.local).unwrap_or_default()
    }

    /// The qualified name (`prefix:local`), or `""` for unnamed nodes.
    pub fn name(&self) -> String {
        self.qname().map(|q| q.qualified()).unwrap_or_default()
    }

    pub fn prefix(&self) -> Option<String> {
        self.qname().and_then(|q| q.prefix)
    }

    /// The namespace URI, or `""` when the node is in no namespace.
    pub fn namespace(&self) -> String {
        self.doc.tree.borrow().nodes[self.id]
            .ns_uri
            .clone()
            .unwrap_or_default()
    }

    pub fn set_namespace(&self, prefix: Option<&str>, uri: &str) {
        let mut tree = self.doc.tree.borrow_mut();
        let data = &mut tree.nodes[self.id];
        data.ns_uri = Some(uri.to_string());
        if let Some(name) = &mut data.name {
            name.prefix = prefix.filter(|p| !p.is_empty()).map(|p| p.to_string());
        }
    }

    pub fn content(&self) -> String {
        self.doc.tree.borrow().nodes[self.id].content.clone()
    }

    pub fn set_content(&self, content: &str) {
        self.doc.tree.borrow_mut().nodes[self.id].content = content.to_string();
    }

    pub fn is_raw(&self) -> bool {
        self.doc.tree.borrow().nodes[self.id].raw
    }

    /// Marks a text node as exempt from output escaping.
    pub fn set_raw(&self) {
        self.doc.tree.borrow_mut().nodes[self.id].raw = true;
    }

    pub fn parent(&self) -> Option<Node> {
        let parent = self.doc.tree.borrow().nodes[self.id].parent?;
        Some(self.make(parent))
    }

    pub fn children(&self) -> Vec<Node> {
        self.doc.tree.borrow().nodes[self.id]
            .children
            .iter()
            .map(|&id| self.make(id))
            .collect()
    }

    pub fn first_child(&self) -> Option<Node> {
        let id = *self.doc.tree.borrow().nodes[self.id].children.first()?;
        Some(self.make(id))
    }

    pub fn last_child(&self) -> Option<Node> {
        let id = *self.doc.tree.borrow().nodes[self.id].children.last()?;
        Some(self.make(id))
    }

    fn sibling(&self, offset: isize) -> Option<Node> {
        let tree = self.doc.tree.borrow();
        let parent = tree.nodes[self.id].parent?;
        let siblings = &tree.nodes[parent].children;
        let pos = siblings.iter().position(|&id| id == self.id)?;
        let idx = pos as isize + offset;
        if idx < 0 {
            return None;
        }
        siblings.get(idx as usize).map(|&id| Node {
            doc: self.doc.clone(),
            id,
        })
    }

    pub fn next_sibling(&self) -> Option<Node> {
        self.sibling(1)
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        self.sibling(-1)
    }

    pub fn attributes(&self) -> Vec<Node> {
        self.doc.tree.borrow().nodes[self.id]
            .attributes
            .iter()
            .map(|&id| self.make(id))
            .collect()
    }

    /// Looks up an attribute value by qualified name.
    pub fn attribute(&self, name: &str) -> Option<String> {
        let tree = self.doc.tree.borrow();
        for &attr_id in &tree.nodes[self.id].attributes {
            let attr = &tree.nodes[attr_id];
            if let Some(q) = &attr.name {
                if q.qualified() == name {
                    return Some(attr.content.clone());
                }
            }
        }
        None
    }

    /// Appends a detached node as the last child of this node.
    pub fn append_child(&self, child: &Node) {
        debug_assert!(self.doc == child.doc, "cross-document append");
        let mut tree = self.doc.tree.borrow_mut();
        tree.nodes[child.id].parent = Some(self.id);
        tree.nodes[self.id].children.push(child.id);
    }

    /// Sets an attribute in no namespace, replacing any existing one of the
    /// same name.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.set_attr_inner(QName::parse(name), None, value);
    }

    /// Sets a namespaced attribute, replacing any existing one with the same
    /// expanded name.
    pub fn set_ns_attribute(&self, uri: &str, name: &str, value: &str) {
        self.set_attr_inner(QName::parse(name), Some(uri.to_string()), value);
    }

    fn set_attr_inner(&self, name: QName, ns_uri: Option<String>, value: &str) {
        {
            let mut tree = self.doc.tree.borrow_mut();
            let existing = tree.nodes[self.id].attributes.clone();
            for attr_id in existing {
                let attr = &mut tree.nodes[attr_id];
                let same = attr.name.as_ref().is_some_and(|q| q.local == name.local)
                    && attr.ns_uri == ns_uri;
                if same {
                    attr.content = value.to_string();
                    return;
                }
            }
        }
        let mut data = NodeData::new(NodeType::Attribute);
        data.name = Some(name);
        data.ns_uri = ns_uri;
        data.content = value.to_string();
        data.parent = Some(self.id);
        let attr = self.doc.alloc(data);
        self.doc.tree.borrow_mut().nodes[self.id].attributes.push(attr.id);
    }

    pub fn declare_namespace(&self, prefix: &str, uri: &str) {
        let mut tree = self.doc.tree.borrow_mut();
        let decls = &mut tree.nodes[self.id].namespaces;
        if decls.iter().any(|(p, _)| p == prefix) {
            return;
        }
        decls.push((prefix.to_string(), uri.to_string()));
    }

    /// Namespace declarations made directly on this element.
    pub fn declared_namespaces(&self) -> Vec<(String, String)> {
        self.doc.tree.borrow().nodes[self.id].namespaces.clone()
    }

    /// Resolves a prefix against the declarations in scope at this node.
    /// The reserved `xml` prefix is always bound.
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            for (p, uri) in node.declared_namespaces() {
                if p == prefix {
                    return Some(uri);
                }
            }
            cur = node.parent();
        }
        None
    }

    /// The default namespace in scope, if any.
    pub fn default_namespace(&self) -> Option<String> {
        self.lookup_namespace_uri("")
    }

    /// All (prefix, uri) pairs in scope; the nearest declaration of a prefix wins.
    pub fn in_scope_namespaces(&self) -> Vec<(String, String)> {
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            for (p, uri) in node.declared_namespaces() {
                if !seen.iter().any(|(sp, _)| *sp == p) {
                    seen.push((p, uri));
                }
            }
            cur = node.parent();
        }
        seen
    }

    /// The string value per XPath 1.0: concatenated descendant text for
    /// documents and elements, content for everything else.
    pub fn string_value(&self) -> String {
        match self.node_type() {
            NodeType::Document | NodeType::Element => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
            _ => self.content(),
        }
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.children() {
            match child.node_type() {
                NodeType::Text | NodeType::Cdata => out.push_str(&child.content()),
                NodeType::Element => child.collect_text(out),
                _ => {}
            }
        }
    }

    /// True for a whitespace-only text or CDATA node.
    pub fn is_blank(&self) -> bool {
        matches!(self.node_type(), NodeType::Text | NodeType::Cdata)
            && self.content().chars().all(char::is_whitespace)
    }

    /// A sort key realising stable document order. Attributes order before
    /// children of the same element.
    pub fn order_path(&self) -> Vec<(u8, usize)> {
        let tree = self.doc.tree.borrow();
        let mut path = Vec::new();
        let mut cur = self.id;
        while let Some(parent) = tree.nodes[cur].parent {
            let component = if tree.nodes[cur].kind == NodeType::Attribute {
                let pos = tree.nodes[parent]
                    .attributes
                    .iter()
                    .position(|&id| id == cur)
                    .unwrap_or(0);
                (0u8, pos)
            } else {
                let pos = tree.nodes[parent]
                    .children
                    .iter()
                    .position(|&id| id == cur)
                    .unwrap_or(0);
                (1u8, pos)
            };
            path.push(component);
            cur = parent;
        }
        path.reverse();
        path
    }

    /// Stable document-order comparison; nodes of different documents order
    /// by document serial.
    pub fn compare_document_order(&self, other: &Node) -> Ordering {
        if self.doc != other.doc {
            return self.doc.serial().cmp(&other.doc.serial());
        }
        self.order_path().cmp(&other.order_path())
    }

    pub(crate) fn raw_id(&self) -> usize {
        self.id
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc && self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.doc.serial().hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.node_type())
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_parsing() {
        let q = QName::parse("fo:block");
        assert_eq!(q.prefix.as_deref(), Some("fo"));
        assert_eq!(q.local, "block");
        assert_eq!(q.qualified(), "fo:block");
        assert_eq!(QName::parse("block").qualified(), "block");
    }

    #[test]
    fn build_and_navigate() {
        let doc = Document::new();
        let root = doc.create_element(QName::new("list"));
        doc.root().append_child(&root);
        let a = doc.create_element(QName::new("item"));
        let b = doc.create_element(QName::new("item"));
        root.append_child(&a);
        root.append_child(&b);
        a.append_child(&doc.create_text("one"));

        assert_eq!(doc.root_element().map(|n| n.name()), Some("list".into()));
        assert_eq!(root.children().len(), 2);
        assert_eq!(a.next_sibling(), Some(b.clone()));
        assert_eq!(b.previous_sibling(), Some(a.clone()));
        assert_eq!(root.string_value(), "one");
        assert!(a.compare_document_order(&b) == Ordering::Less);
    }

    #[test]
    fn attribute_replacement() {
        let doc = Document::new();
        let el = doc.create_element(QName::new("a"));
        el.set_attribute("x", "1");
        el.set_attribute("x", "2");
        assert_eq!(el.attributes().len(), 1);
        assert_eq!(el.attribute("x").as_deref(), Some("2"));
    }

    #[test]
    fn namespace_scope() {
        let doc = Document::new();
        let outer = doc.create_element(QName::new("outer"));
        doc.root().append_child(&outer);
        outer.declare_namespace("a", "urn:one");
        let inner = doc.create_element(QName::new("inner"));
        outer.append_child(&inner);
        inner.declare_namespace("a", "urn:two");

        assert_eq!(outer.lookup_namespace_uri("a").as_deref(), Some("urn:one"));
        assert_eq!(inner.lookup_namespace_uri("a").as_deref(), Some("urn:two"));
        assert_eq!(
            inner.lookup_namespace_uri("xml").as_deref(),
            Some(XML_NAMESPACE)
        );
        let scope = inner.in_scope_namespaces();
        assert_eq!(scope, vec![("a".to_string(), "urn:two".to_string())]);
    }

    #[test]
    fn attributes_order_before_children() {
        let doc = Document::new();
        let el = doc.create_element(QName::new("e"));
        doc.root().append_child(&el);
        let text = doc.create_text("x");
        el.append_child(&text);
        el.set_attribute("a", "1");
        let attr = &el.attributes()[0];
        assert_eq!(attr.compare_document_order(&text), Ordering::Less);
    }
}
