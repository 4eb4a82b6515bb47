//! Compiling stylesheet documents into an executable [`Stylesheet`] and
//! dispatching nodes to their best-matching templates.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{debug, warn};

use super::context::ExecutionContext;
use super::functions::{self, DecimalFormat, XsltFunction};
use super::instruction;
use super::output;
use super::pattern::{compile_match, CompiledMatch};
use super::template::{
    compile_content, compile_variable, is_xslt_name, CompiledStep, Template, TemplateId,
    VariableDecl,
};
use crate::dom::{self, Document, Node, NodeType};
use crate::error::{Error, Result};
use crate::xpath::{self, Expression};

/// Caller-facing knobs for one `process` call.
#[derive(Debug, Clone, Default)]
pub struct StylesheetOptions {
    /// Pretty-print the output (also switched on by `<xsl:output indent="yes"/>`).
    pub indent: bool,
    /// Values for global `xsl:param` declarations, overriding their defaults.
    pub parameters: HashMap<String, String>,
    /// Checked at dispatch boundaries and before each instruction; setting
    /// it aborts the transformation with no partial output.
    pub cancel: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMethod {
    Xml,
    Html,
    Text,
}

/// Settings gathered from `xsl:output`.
#[derive(Debug, Default)]
pub struct OutputSettings {
    pub method: Option<OutputMethod>,
    pub omit_xml_declaration: bool,
    pub indent: bool,
    pub standalone: Option<bool>,
    pub encoding: Option<String>,
    pub doctype_system: Option<String>,
    pub doctype_public: Option<String>,
}

pub(crate) struct AttributeSet {
    pub use_sets: Vec<String>,
    pub body: Vec<CompiledStep>,
}

pub(crate) struct KeyDef {
    pub matches: Vec<CompiledMatch>,
    pub use_expr: Expression,
}

/// A compiled stylesheet: immutable once `parse` returns, reusable across
/// `process` calls.
pub struct Stylesheet {
    pub(crate) doc: Document,
    pub(crate) templates: Vec<Template>,
    named_templates: HashMap<String, TemplateId>,
    element_matches: HashMap<String, Vec<CompiledMatch>>,
    attr_matches: HashMap<String, Vec<CompiledMatch>>,
    node_matches: Vec<CompiledMatch>,
    text_matches: Vec<CompiledMatch>,
    comment_matches: Vec<CompiledMatch>,
    pi_matches: Vec<CompiledMatch>,
    idkey_matches: Vec<CompiledMatch>,
    /// Imported stylesheets; later entries have higher precedence and are
    /// consulted only when this stylesheet has no match.
    pub(crate) imports: Vec<Stylesheet>,
    /// URI → prefix, from the root element's declarations.
    pub(crate) namespace_mapping: HashMap<String, String>,
    /// stylesheet prefix → result prefix.
    pub(crate) namespace_alias: HashMap<String, String>,
    /// Global `xsl:variable`/`xsl:param` declarations, in document order.
    pub(crate) global_variables: Vec<VariableDecl>,
    pub(crate) attribute_sets: HashMap<String, AttributeSet>,
    pub(crate) keys: HashMap<String, KeyDef>,
    pub(crate) decimal_formats: HashMap<String, DecimalFormat>,
    pub(crate) strip_space: Vec<String>,
    pub(crate) preserve_space: Vec<String>,
    pub(crate) cdata_elements: Vec<String>,
    pub(crate) exclude_prefixes: Vec<String>,
    pub(crate) extension_prefixes: Vec<String>,
    pub(crate) output: OutputSettings,
    /// Extension functions keyed `{namespace-uri}localname`.
    pub(crate) functions: HashMap<String, XsltFunction>,
    /// Resolved paths already included; a repeat is a fatal error.
    includes: HashSet<PathBuf>,
    decl_counter: usize,
}

impl Stylesheet {
    fn empty(doc: Document) -> Stylesheet {
        let mut functions = HashMap::new();
        functions::register_builtins(&mut functions);
        Stylesheet {
            doc,
            templates: Vec::new(),
            named_templates: HashMap::new(),
            element_matches: HashMap::new(),
            attr_matches: HashMap::new(),
            node_matches: Vec::new(),
            text_matches: Vec::new(),
            comment_matches: Vec::new(),
            pi_matches: Vec::new(),
            idkey_matches: Vec::new(),
            imports: Vec::new(),
            namespace_mapping: HashMap::new(),
            namespace_alias: HashMap::new(),
            global_variables: Vec::new(),
            attribute_sets: HashMap::new(),
            keys: HashMap::new(),
            decimal_formats: HashMap::new(),
            strip_space: Vec::new(),
            preserve_space: Vec::new(),
            cdata_elements: Vec::new(),
            exclude_prefixes: Vec::new(),
            extension_prefixes: Vec::new(),
            output: OutputSettings::default(),
            functions,
            includes: HashSet::new(),
            decl_counter: 0,
        }
    }

    /// Compiles a parsed stylesheet document. `file_uri` anchors relative
    /// `href`s in `xsl:include`/`xsl:import`.
    pub fn parse(doc: Document, file_uri: &str) -> Result<Stylesheet> {
        let mut style = Stylesheet::empty(doc.clone());
        let root = doc
            .root_element()
            .ok_or_else(|| Error::Compile("stylesheet has no root element".to_string()))?;

        for (prefix, uri) in root.declared_namespaces() {
            style.namespace_mapping.insert(uri, prefix);
        }

        match root.attribute("version") {
            Some(v) if v == "1.0" => {}
            Some(v) => warn!("stylesheet version {} (expected 1.0); continuing", v),
            None => {}
        }
        if let Some(excl) = root.attribute("exclude-result-prefixes") {
            style.exclude_prefixes = space_list(&excl);
        }
        if let Some(ext) = root.attribute("extension-element-prefixes") {
            style.extension_prefixes = space_list(&ext);
        }

        // Simplified form: the whole document is the body of an implicit
        // template matching the root.
        if !is_xslt_name(&root, "stylesheet") && !is_xslt_name(&root, "transform") {
            let children = compile_content(&doc.root())?;
            let template = Template {
                name: None,
                mode: String::new(),
                match_pattern: Some("/".to_string()),
                priority: Some(0.0),
                children,
                node: root,
            };
            style.add_template(template, Some(0.0));
            return Ok(style);
        }

        let base = Path::new(file_uri).parent().map(Path::to_path_buf).unwrap_or_default();
        let children = root.children();
        style.parse_toplevel(&children, &base)?;
        Ok(style)
    }

    fn parse_toplevel(&mut self, children: &[Node], base: &Path) -> Result<()> {
        for cur in children {
            if cur.node_type() != NodeType::Element {
                continue;
            }
            if is_xslt_name(cur, "template") {
                self.parse_template(cur)?;
            } else if is_xslt_name(cur, "variable") || is_xslt_name(cur, "param") {
                let decl = compile_variable(cur)?;
                self.global_variables.push(decl);
            } else if is_xslt_name(cur, "key") {
                let name = required(cur, "name")?;
                let matched = required(cur, "match")?;
                let use_attr = required(cur, "use")?;
                self.keys.insert(
                    name,
                    KeyDef {
                        matches: compile_match(&matched, None, "", None, Some(cur.clone())),
                        use_expr: xpath::parse_expression(&use_attr)?,
                    },
                );
            } else if is_xslt_name(cur, "attribute-set") {
                let name = required(cur, "name")?;
                self.attribute_sets.insert(
                    name,
                    AttributeSet {
                        use_sets: space_list(
                            &cur.attribute("use-attribute-sets").unwrap_or_default(),
                        ),
                        body: compile_content(cur)?,
                    },
                );
            } else if is_xslt_name(cur, "include") {
                let href = required(cur, "href")?;
                let resolved = self.resolve_once(base, &href)?;
                let included = dom::parse_file(&resolved)?;
                let inc_root = included.root_element().ok_or_else(|| {
                    Error::Compile(format!("included stylesheet {} is empty", href))
                })?;
                for (prefix, uri) in inc_root.declared_namespaces() {
                    self.namespace_mapping.entry(uri).or_insert(prefix);
                }
                let inc_base = resolved.parent().map(Path::to_path_buf).unwrap_or_default();
                let inc_children = inc_root.children();
                // splice at the same precedence
                self.parse_toplevel(&inc_children, &inc_base)?;
            } else if is_xslt_name(cur, "import") {
                let href = required(cur, "href")?;
                let resolved = self.resolve_once(base, &href)?;
                let imported_doc = dom::parse_file(&resolved)?;
                let imported = Stylesheet::parse(imported_doc, &resolved.to_string_lossy())?;
                self.imports.push(imported);
            } else if is_xslt_name(cur, "output") {
                self.parse_output(cur);
            } else if is_xslt_name(cur, "strip-space") {
                if let Some(el) = cur.attribute("elements") {
                    self.strip_space.extend(space_list(&el));
                }
            } else if is_xslt_name(cur, "preserve-space") {
                if let Some(el) = cur.attribute("elements") {
                    self.preserve_space.extend(space_list(&el));
                }
            } else if is_xslt_name(cur, "namespace-alias") {
                let style_prefix = required(cur, "stylesheet-prefix")?;
                let result_prefix = required(cur, "result-prefix")?;
                self.namespace_alias.insert(style_prefix, result_prefix);
            } else if is_xslt_name(cur, "decimal-format") {
                let name = cur.attribute("name").unwrap_or_default();
                self.decimal_formats
                    .insert(name, DecimalFormat::from_element(cur));
            } else {
                warn!("ignoring top-level element {}", cur.name());
            }
        }
        Ok(())
    }

    /// Resolves an `href` and enforces the once-only include/import guard.
    fn resolve_once(&mut self, base: &Path, href: &str) -> Result<PathBuf> {
        let joined = base.join(href);
        let resolved = joined.canonicalize().unwrap_or(joined);
        if !self.includes.insert(resolved.clone()) {
            return Err(Error::Compile(format!(
                "stylesheet {} included more than once",
                resolved.display()
            )));
        }
        Ok(resolved)
    }

    fn parse_output(&mut self, node: &Node) {
        if let Some(method) = node.attribute("method") {
            self.output.method = match method.as_str() {
                "xml" => Some(OutputMethod::Xml),
                "html" => Some(OutputMethod::Html),
                "text" => Some(OutputMethod::Text),
                other => {
                    warn!("unknown output method '{}'", other);
                    None
                }
            };
        }
        if node.attribute("omit-xml-declaration").as_deref() == Some("yes") {
            self.output.omit_xml_declaration = true;
        }
        if node.attribute("indent").as_deref() == Some("yes") {
            self.output.indent = true;
        }
        if let Some(standalone) = node.attribute("standalone") {
            self.output.standalone = Some(standalone == "yes");
        }
        if let Some(encoding) = node.attribute("encoding") {
            if !encoding.eq_ignore_ascii_case("utf-8") {
                warn!("output encoding '{}' not supported; emitting UTF-8", encoding);
            }
            self.output.encoding = Some(encoding);
        }
        self.output.doctype_system = node.attribute("doctype-system");
        self.output.doctype_public = node.attribute("doctype-public");
        if let Some(cdata) = node.attribute("cdata-section-elements") {
            self.cdata_elements.extend(space_list(&cdata));
        }
    }

    fn parse_template(&mut self, node: &Node) -> Result<()> {
        let name = node.attribute("name");
        let mode = node.attribute("mode").unwrap_or_default();
        let match_pattern = node.attribute("match");
        let priority = node
            .attribute("priority")
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|_| Error::Compile(format!("invalid template priority '{}'", p)))
            })
            .transpose()?;

        if name.is_none() && match_pattern.is_none() {
            return Err(Error::Compile(
                "xsl:template requires a name or a match pattern".to_string(),
            ));
        }

        let template = Template {
            name,
            mode,
            match_pattern,
            priority,
            children: compile_content(node)?,
            node: node.clone(),
        };
        self.add_template(template, priority);
        Ok(())
    }

    fn add_template(&mut self, template: Template, priority: Option<f64>) {
        let id = TemplateId(self.templates.len());
        if let Some(name) = &template.name {
            self.named_templates.insert(name.clone(), id);
        }

        if let Some(pattern) = template.match_pattern.clone() {
            let matches = compile_match(
                &pattern,
                Some(id),
                &template.mode,
                priority,
                Some(template.node.clone()),
            );
            for mut m in matches {
                self.decl_counter += 1;
                m.order = self.decl_counter;
                if m.is_element() {
                    insert_by_priority(self.element_matches.entry(m.hash()).or_default(), m);
                } else if m.is_attr() {
                    insert_by_priority(self.attr_matches.entry(m.hash()).or_default(), m);
                } else if m.is_id_key() {
                    insert_by_priority(&mut self.idkey_matches, m);
                } else if m.is_text() {
                    insert_by_priority(&mut self.text_matches, m);
                } else if m.is_comment() {
                    insert_by_priority(&mut self.comment_matches, m);
                } else if m.is_pi() {
                    insert_by_priority(&mut self.pi_matches, m);
                } else if m.is_node() {
                    insert_by_priority(&mut self.node_matches, m);
                } else {
                    debug!("pattern '{}' fits no dispatch bucket", m.pattern);
                }
            }
        }
        self.templates.push(template);
    }

    /// Finds a named template here or in an import.
    pub(crate) fn find_named_template(&self, name: &str) -> Option<(&Stylesheet, TemplateId)> {
        if let Some(&id) = self.named_templates.get(name) {
            return Some((self, id));
        }
        for imp in self.imports.iter().rev() {
            if let Some(found) = imp.find_named_template(name) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn lookup_attribute_set(&self, name: &str) -> Option<&AttributeSet> {
        if let Some(set) = self.attribute_sets.get(name) {
            return Some(set);
        }
        for imp in self.imports.iter().rev() {
            if let Some(set) = imp.lookup_attribute_set(name) {
                return Some(set);
            }
        }
        None
    }

    pub(crate) fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.namespace_mapping.get(uri).map(String::as_str)
    }

    pub(crate) fn is_excluded(&self, prefix: &str) -> bool {
        let target = if prefix.is_empty() { "#default" } else { prefix };
        self.exclude_prefixes.iter().any(|p| p == target || p == prefix)
            || self.extension_prefixes.iter().any(|p| p == prefix)
    }

    /// The best template for a node: the first match from each bucket forms
    /// the candidate set, the candidate with the highest priority wins, and
    /// priority ties go to the later declaration. Imports are consulted only
    /// when this stylesheet has no candidate.
    pub(crate) fn lookup_template<'s>(
        &'s self,
        node: &Node,
        mode: &str,
        ctx: &ExecutionContext,
    ) -> Option<(&'s Stylesheet, TemplateId)> {
        let name = if node.node_type() == NodeType::Document {
            "/".to_string()
        } else {
            node.local_name()
        };

        let mut candidates: Vec<&CompiledMatch> = Vec::new();
        let mut consider = |bucket: Option<&'s Vec<CompiledMatch>>| {
            if let Some(list) = bucket {
                if let Some(m) = list.iter().find(|m| m.matches(node, mode, Some(ctx))) {
                    candidates.push(m);
                }
            }
        };
        consider(self.element_matches.get(&name));
        consider(self.element_matches.get("*"));
        consider(self.attr_matches.get(&name));
        consider(self.attr_matches.get("*"));
        consider(Some(&self.idkey_matches));
        consider(Some(&self.node_matches));
        consider(Some(&self.text_matches));
        consider(Some(&self.comment_matches));
        consider(Some(&self.pi_matches));

        let best = candidates.into_iter().max_by(|a, b| {
            a.priority
                .partial_cmp(&b.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.order.cmp(&b.order))
        });
        if let Some(m) = best {
            return m.template.map(|id| (self, id));
        }

        for imp in self.imports.iter().rev() {
            if let Some(found) = imp.lookup_template(node, mode, ctx) {
                return Some(found);
            }
        }
        None
    }

    /// Global variable and parameter declarations in evaluation order:
    /// imported declarations first, so the importing stylesheet overrides.
    pub(crate) fn global_decls(&self) -> Vec<&VariableDecl> {
        let mut decls = Vec::new();
        for imp in &self.imports {
            decls.extend(imp.global_decls());
        }
        decls.extend(self.global_variables.iter());
        decls
    }

    /// Builds the key indices for one source document walk. Rebuilding from
    /// scratch keeps the operation idempotent.
    pub(crate) fn populate_keys(&self, ctx: &mut ExecutionContext) -> Result<()> {
        ctx.reset_keys();
        if self.keys.is_empty() {
            return Ok(());
        }
        let root = ctx.source.root();
        self.populate_keys_node(&root, ctx)
    }

    fn populate_keys_node(&self, node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
        for (name, key) in &self.keys {
            if !key.matches.iter().any(|m| m.matches(node, "", None)) {
                continue;
            }
            match ctx.eval_compiled(&key.use_expr, node) {
                Ok(value) => {
                    let lookup = value.string();
                    ctx.index_key(name, lookup, node.clone());
                }
                Err(e) => debug!("key '{}' use expression failed: {}", name, e),
            }
        }
        for child in ctx.children_of(node) {
            self.populate_keys_node(&child, ctx)?;
        }
        Ok(())
    }

    /// Runs the transformation and serializes the result.
    pub fn process(&self, source: &Document, options: &StylesheetOptions) -> Result<String> {
        let output = Document::new();
        let mut ctx = ExecutionContext::new(self, source.clone(), output.clone(), options);
        self.populate_keys(&mut ctx)?;
        instruction::evaluate_globals(&mut ctx)?;
        instruction::process_node(&source.root(), &mut ctx, &[])?;
        output::construct(self, &output, options)
    }
}

fn insert_by_priority(list: &mut Vec<CompiledMatch>, m: CompiledMatch) {
    // descending priority; at equal priority the newcomer goes first so the
    // later declaration wins
    let pos = list
        .iter()
        .position(|cur| cur.priority <= m.priority)
        .unwrap_or(list.len());
    list.insert(pos, m);
}

fn required(node: &Node, attr: &str) -> Result<String> {
    node.attribute(attr).ok_or_else(|| {
        Error::Compile(format!(
            "xsl:{} requires a {} attribute",
            node.local_name(),
            attr
        ))
    })
}

fn space_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Convenience for the CLI: parse a stylesheet straight from a file.
pub fn parse_stylesheet_file(path: &Path) -> Result<Stylesheet> {
    let doc = dom::parse_file(path)?;
    Stylesheet::parse(doc, &path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(xsl: &str) -> Stylesheet {
        let doc = dom::parse_str(xsl, None).unwrap();
        Stylesheet::parse(doc, "test.xsl").unwrap()
    }

    #[test]
    fn compiles_templates_into_buckets() {
        let style = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template match="/">r</xsl:template>
                <xsl:template match="para">p</xsl:template>
                <xsl:template match="*">s</xsl:template>
                <xsl:template match="@id">a</xsl:template>
                <xsl:template match="text()">t</xsl:template>
                <xsl:template name="named">n</xsl:template>
            </xsl:stylesheet>"#,
        );
        assert_eq!(style.templates.len(), 6);
        assert!(style.element_matches.contains_key("/"));
        assert!(style.element_matches.contains_key("para"));
        assert!(style.element_matches.contains_key("*"));
        assert!(style.attr_matches.contains_key("id"));
        assert_eq!(style.text_matches.len(), 1);
        assert!(style.find_named_template("named").is_some());
    }

    #[test]
    fn bucket_order_is_descending_priority() {
        let style = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template match="para">low</xsl:template>
                <xsl:template match="para" priority="2">high</xsl:template>
                <xsl:template match="para" priority="1">mid</xsl:template>
            </xsl:stylesheet>"#,
        );
        let bucket = &style.element_matches["para"];
        let priorities: Vec<f64> = bucket.iter().map(|m| m.priority).collect();
        assert_eq!(priorities, vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn equal_priority_later_declaration_first() {
        let style = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template match="para">first</xsl:template>
                <xsl:template match="para">second</xsl:template>
            </xsl:stylesheet>"#,
        );
        let bucket = &style.element_matches["para"];
        assert_eq!(bucket.len(), 2);
        assert!(bucket[0].order > bucket[1].order);
    }

    #[test]
    fn simplified_form_wraps_in_root_template() {
        let style = compile(
            r#"<html xmlns:xsl="http://www.w3.org/1999/XSL/Transform" xsl:version="1.0">
                <body><xsl:value-of select="greeting"/></body>
            </html>"#,
        );
        assert_eq!(style.templates.len(), 1);
        assert_eq!(style.templates[0].match_pattern.as_deref(), Some("/"));
    }

    #[test]
    fn missing_name_and_match_is_an_error() {
        let doc = dom::parse_str(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template>x</xsl:template>
            </xsl:stylesheet>"#,
            None,
        )
        .unwrap();
        assert!(Stylesheet::parse(doc, "test.xsl").is_err());
    }

    #[test]
    fn malformed_select_is_a_compile_error() {
        let doc = dom::parse_str(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template match="/"><xsl:value-of select="1 +"/></xsl:template>
            </xsl:stylesheet>"#,
            None,
        )
        .unwrap();
        assert!(Stylesheet::parse(doc, "test.xsl").is_err());
    }

    #[test]
    fn output_settings_are_recorded() {
        let style = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:output method="html" omit-xml-declaration="yes" indent="yes"
                            doctype-system="about:legacy-compat"
                            cdata-section-elements="script code"/>
                <xsl:template match="/">x</xsl:template>
            </xsl:stylesheet>"#,
        );
        assert_eq!(style.output.method, Some(OutputMethod::Html));
        assert!(style.output.omit_xml_declaration);
        assert!(style.output.indent);
        assert_eq!(
            style.output.doctype_system.as_deref(),
            Some("about:legacy-compat")
        );
        assert_eq!(style.cdata_elements, vec!["script", "code"]);
    }
}
