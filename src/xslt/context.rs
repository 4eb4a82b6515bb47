//! The per-transformation execution context: cursors, variable frames,
//! key indices, loaded documents, and the resolver the XPath engine calls
//! back into.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use super::stylesheet::{Stylesheet, StylesheetOptions};
use crate::dom::{self, Document, Node, NodeType, XML_NAMESPACE};
use crate::error::{Error, Result};
use crate::xpath::{evaluate, EvalContext, Expression, Resolver, Value};

pub struct ExecutionContext<'s> {
    pub style: &'s Stylesheet,
    pub source: Document,
    /// The output document under construction, and the insertion cursor.
    pub output: Document,
    pub output_node: Node,
    /// The node `current()` reports.
    pub current: Node,
    pub mode: String,
    /// 1-based XPath context position and size.
    pub position: usize,
    pub size: usize,
    /// Stylesheet node whose in-scope namespaces resolve prefixes in the
    /// expression currently being evaluated.
    pub(crate) ns_scope: Option<Node>,
    /// Stylesheets owning the currently-executing templates; consulted by
    /// `xsl:apply-imports`.
    pub(crate) owner_stack: Vec<&'s Stylesheet>,
    /// Local variable frames, innermost last.
    stack: Vec<HashMap<String, Value>>,
    pub(crate) globals: HashMap<String, Value>,
    /// Key name → key value → nodes in document order.
    keys: HashMap<String, HashMap<String, Vec<Node>>>,
    input_documents: RefCell<HashMap<PathBuf, Document>>,
    /// Documents seen this run, in first-seen order; gives generate-id() a
    /// deterministic document discriminator.
    documents_seen: RefCell<Vec<Document>>,
    cancel: Option<Arc<AtomicBool>>,
    pub(crate) parameters: HashMap<String, String>,
}

impl<'s> ExecutionContext<'s> {
    pub fn new(
        style: &'s Stylesheet,
        source: Document,
        output: Document,
        options: &StylesheetOptions,
    ) -> ExecutionContext<'s> {
        let output_node = output.root();
        let current = source.root();
        ExecutionContext {
            style,
            source,
            output,
            output_node,
            current,
            mode: String::new(),
            position: 1,
            size: 1,
            ns_scope: None,
            owner_stack: Vec::new(),
            stack: Vec::new(),
            globals: HashMap::new(),
            keys: HashMap::new(),
            input_documents: RefCell::new(HashMap::new()),
            documents_seen: RefCell::new(Vec::new()),
            cancel: options.cancel.clone(),
            parameters: options.parameters.clone(),
        }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    // --- Variable frames ---

    pub fn push_frame(&mut self) {
        self.stack.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.stack.pop();
    }

    /// Replaces the whole stack; template application starts from a clean
    /// scope so the caller's locals stay invisible.
    pub fn take_stack(&mut self) -> Vec<HashMap<String, Value>> {
        std::mem::take(&mut self.stack)
    }

    pub fn restore_stack(&mut self, stack: Vec<HashMap<String, Value>>) {
        self.stack = stack;
    }

    pub fn declare_local(&mut self, name: &str, value: Value) {
        match self.stack.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => {
                warn!("local variable '{}' declared without a stack frame", name);
            }
        }
    }

    // --- Expression evaluation ---

    /// Evaluates with the context's position/size against `node`.
    pub fn eval_compiled(&self, expr: &Expression, node: &Node) -> Result<Value> {
        let ectx = EvalContext {
            node: node.clone(),
            position: self.position,
            size: self.size,
            resolver: self,
        };
        evaluate(expr, &ectx)
    }

    /// Evaluates with namespace prefixes resolved against the given
    /// stylesheet node's in-scope declarations.
    pub fn eval_scoped(&mut self, expr: &Expression, node: &Node, scope: &Node) -> Result<Value> {
        let old = self.ns_scope.replace(scope.clone());
        let result = self.eval_compiled(expr, node);
        self.ns_scope = old;
        result
    }

    // --- Whitespace & CDATA policy ---

    /// The children of a node, minus whitespace-only text nodes stripped by
    /// `strip-space`.
    pub fn children_of(&self, node: &Node) -> Vec<Node> {
        node.children()
            .into_iter()
            .filter(|c| !self.should_strip(c))
            .collect()
    }

    /// True iff the node is a whitespace-only text node whose parent is
    /// matched by `strip-space` and not by an at-least-as-specific
    /// `preserve-space`. Specificity: QName > `ns:*` > `*`.
    pub fn should_strip(&self, node: &Node) -> bool {
        if node.node_type() != NodeType::Text {
            return false;
        }
        if !node.is_blank() {
            return false;
        }
        let parent = match node.parent() {
            Some(p) if p.node_type() == NodeType::Element => p,
            _ => return false,
        };
        let strip = self.name_test_specificity(&self.style.strip_space, &parent);
        let preserve = self.name_test_specificity(&self.style.preserve_space, &parent);
        strip > 0 && strip > preserve
    }

    /// Highest specificity of any pattern in the list matching the element:
    /// 3 for a QName, 2 for `ns:*`, 1 for `*`, 0 for no match.
    fn name_test_specificity(&self, patterns: &[String], element: &Node) -> u8 {
        let mut best = 0u8;
        for pattern in patterns {
            let spec = match pattern.as_str() {
                "*" => 1,
                p => match p.split_once(':') {
                    Some((prefix, local)) => {
                        match self.stylesheet_prefix_uri(prefix) {
                            Some(uri) if uri == element.namespace() => {
                                if local == "*" {
                                    2
                                } else if local == element.local_name() {
                                    3
                                } else {
                                    0
                                }
                            }
                            _ => 0,
                        }
                    }
                    None => {
                        if *p == element.local_name() {
                            3
                        } else {
                            0
                        }
                    }
                },
            };
            best = best.max(spec);
        }
        best
    }

    /// True iff text under this output element goes into a CDATA section.
    pub fn use_cdata_section(&self, node: &Node) -> bool {
        if node.node_type() != NodeType::Element {
            return false;
        }
        for pattern in &self.style.cdata_elements {
            match pattern.split_once(':') {
                Some((prefix, local)) => {
                    if let Some(uri) = self.stylesheet_prefix_uri(prefix) {
                        if uri == node.namespace() && local == node.local_name() {
                            return true;
                        }
                    }
                }
                None => {
                    if *pattern == node.local_name() && node.namespace().is_empty() {
                        return true;
                    }
                }
            }
        }
        false
    }

    // --- Namespaces ---

    /// The URI the stylesheet binds to a prefix (root element declarations).
    pub fn stylesheet_prefix_uri(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.style
            .namespace_mapping
            .iter()
            .find(|(_, p)| p.as_str() == prefix)
            .map(|(uri, _)| uri.clone())
    }

    // --- Keys ---

    pub(crate) fn reset_keys(&mut self) {
        self.keys.clear();
    }

    pub(crate) fn index_key(&mut self, name: &str, value: String, node: Node) {
        self.keys
            .entry(name.to_string())
            .or_default()
            .entry(value)
            .or_default()
            .push(node);
    }

    pub fn key_entries(&self, name: &str, value: &str) -> Vec<Node> {
        self.keys
            .get(name)
            .and_then(|m| m.get(value))
            .cloned()
            .unwrap_or_default()
    }

    // --- External documents ---

    /// Loads (or returns the cached) document for `document()` and friends.
    /// Relative locations resolve against the source document or the
    /// stylesheet, per the caller.
    pub fn fetch_input_document(&self, location: &str, relative_to_source: bool) -> Option<Document> {
        let base_uri = if relative_to_source {
            self.source.uri()
        } else {
            self.style.doc.uri()
        };
        let base = base_uri
            .as_deref()
            .map(Path::new)
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let resolved = base.join(location);

        if let Some(doc) = self.input_documents.borrow().get(&resolved) {
            return Some(doc.clone());
        }
        match dom::parse_file(&resolved) {
            Ok(doc) => {
                self.input_documents
                    .borrow_mut()
                    .insert(resolved, doc.clone());
                Some(doc)
            }
            Err(e) => {
                warn!("failed to load document '{}': {}", resolved.display(), e);
                None
            }
        }
    }

    /// A deterministic per-run index for the node's document.
    pub fn document_index(&self, doc: &Document) -> usize {
        let mut seen = self.documents_seen.borrow_mut();
        if let Some(i) = seen.iter().position(|d| d == doc) {
            return i;
        }
        seen.push(doc.clone());
        seen.len() - 1
    }
}

impl Resolver for ExecutionContext<'_> {
    fn variable(&self, name: &str) -> Option<Value> {
        for frame in self.stack.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(v.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn function(
        &self,
        uri: &str,
        local: &str,
        args: Vec<Value>,
        ectx: &EvalContext,
    ) -> Option<Result<Value>> {
        let key = format!("{{{}}}{}", uri, local);
        let f = self.style.functions.get(&key)?;
        Some(f(self, ectx, args))
    }

    fn namespace(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        if let Some(scope) = &self.ns_scope {
            if let Some(uri) = scope.lookup_namespace_uri(prefix) {
                return Some(uri);
            }
        }
        self.stylesheet_prefix_uri(prefix)
    }
}
