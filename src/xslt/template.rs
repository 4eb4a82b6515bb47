//! The compiled stylesheet IR: templates, instructions, literal result
//! elements, text, and variables.
//!
//! Every stylesheet element compiles into a [`CompiledStep`]. XSLT elements
//! become one constructor of the closed [`InstructionKind`] enum with their
//! attributes parsed up front (XPath expressions, AVTs, sort keys), so a
//! malformed expression is a compile-time error and the interpreter can
//! match exhaustively.

use log::warn;

use super::avt::Avt;
use super::pattern::{compile_match, CompiledMatch};
use super::sort::{compile_sort_key, SortKey};
use super::XSLT_NAMESPACE;
use crate::dom::{Node, NodeType};
use crate::error::{Error, Result};
use crate::xpath::{self, Expression};

/// Index of a template in the stylesheet's template arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(pub usize);

/// A named and/or pattern-matched rewrite rule. A template without a match
/// pattern is only reachable through `xsl:call-template`.
#[derive(Debug)]
pub struct Template {
    pub name: Option<String>,
    pub mode: String,
    pub match_pattern: Option<String>,
    /// Explicit `priority` attribute; alternatives fall back to the default
    /// priority table when absent.
    pub priority: Option<f64>,
    pub children: Vec<CompiledStep>,
    /// Source node, kept for namespace resolution.
    pub node: Node,
}

#[derive(Debug)]
pub enum CompiledStep {
    Instruction(Box<Instruction>),
    Literal(Box<LiteralElement>),
    Text(TextOutput),
    Variable(Box<VariableDecl>),
}

/// Literal text from the stylesheet (or an `xsl:text` body).
#[derive(Debug)]
pub struct TextOutput {
    pub content: String,
    pub raw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Variable,
    Param,
    WithParam,
}

/// `xsl:variable`, `xsl:param`, or `xsl:with-param`.
#[derive(Debug)]
pub struct VariableDecl {
    pub kind: VariableKind,
    pub name: String,
    pub select: Option<Expression>,
    pub body: Vec<CompiledStep>,
    pub node: Node,
}

/// A non-XSLT element in a template body, copied to the output with its
/// attributes expanded as attribute value templates.
#[derive(Debug)]
pub struct LiteralElement {
    pub node: Node,
    pub attributes: Vec<LiteralAttribute>,
    pub use_attribute_sets: Vec<String>,
    pub children: Vec<CompiledStep>,
}

#[derive(Debug)]
pub struct LiteralAttribute {
    pub name: crate::dom::QName,
    pub ns_uri: Option<String>,
    pub value: Avt,
}

#[derive(Debug)]
pub struct Instruction {
    /// Source node, kept for namespace resolution at evaluation time.
    pub node: Node,
    pub kind: InstructionKind,
}

#[derive(Debug)]
pub struct When {
    pub test: Expression,
    pub body: Vec<CompiledStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Single,
    Multiple,
    Any,
}

#[derive(Debug)]
pub struct NumberSpec {
    pub level: Level,
    /// Compiled `count` pattern; defaults to the current node's name at
    /// evaluation time when absent.
    pub count: Option<Vec<CompiledMatch>>,
    pub from: Vec<CompiledMatch>,
    pub value: Option<Expression>,
    pub format: Avt,
}

#[derive(Debug)]
pub enum InstructionKind {
    ApplyTemplates {
        select: Option<Expression>,
        mode: Option<String>,
        sort_keys: Vec<SortKey>,
        params: Vec<VariableDecl>,
    },
    CallTemplate {
        name: String,
        params: Vec<VariableDecl>,
    },
    ForEach {
        select: Expression,
        sort_keys: Vec<SortKey>,
        body: Vec<CompiledStep>,
    },
    If {
        test: Expression,
        body: Vec<CompiledStep>,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Vec<CompiledStep>,
    },
    ValueOf {
        select: Expression,
        disable_escaping: bool,
    },
    Copy {
        use_attribute_sets: Vec<String>,
        body: Vec<CompiledStep>,
    },
    CopyOf {
        select: Expression,
    },
    Element {
        name: Avt,
        namespace: Option<Avt>,
        use_attribute_sets: Vec<String>,
        body: Vec<CompiledStep>,
    },
    Attribute {
        name: Avt,
        namespace: Option<Avt>,
        body: Vec<CompiledStep>,
    },
    Comment {
        body: Vec<CompiledStep>,
    },
    ProcessingInstruction {
        name: Avt,
        body: Vec<CompiledStep>,
    },
    Message {
        terminate: bool,
        body: Vec<CompiledStep>,
    },
    Number(NumberSpec),
    Fallback {
        body: Vec<CompiledStep>,
    },
    ApplyImports,
    /// Unrecognised XSLT element; at apply time its `xsl:fallback` children
    /// run instead, if any.
    Unknown {
        name: String,
        body: Vec<CompiledStep>,
    },
}

/// True when the node is the named element in the XSLT namespace.
pub fn is_xslt_name(node: &Node, name: &str) -> bool {
    node.local_name() == name && node.namespace() == XSLT_NAMESPACE
}

/// Compiles the children of a template/instruction body.
pub fn compile_content(node: &Node) -> Result<Vec<CompiledStep>> {
    let mut steps = Vec::new();
    for cur in node.children() {
        if let Some(step) = compile_single_node(&cur)? {
            steps.push(step);
        }
    }
    Ok(steps)
}

/// Compiles one node of a template body; blank text, comments, and PIs in
/// the stylesheet compile to nothing.
pub fn compile_single_node(node: &Node) -> Result<Option<CompiledStep>> {
    match node.node_type() {
        NodeType::Element => {
            if node.namespace() == XSLT_NAMESPACE {
                match node.local_name().as_str() {
                    "variable" | "param" | "with-param" => {
                        Ok(Some(CompiledStep::Variable(Box::new(compile_variable(node)?))))
                    }
                    "text" => Ok(Some(CompiledStep::Text(TextOutput {
                        content: node.string_value(),
                        raw: node.attribute("disable-output-escaping").as_deref() == Some("yes"),
                    }))),
                    _ => Ok(Some(CompiledStep::Instruction(Box::new(
                        compile_instruction(node)?,
                    )))),
                }
            } else {
                Ok(Some(CompiledStep::Literal(Box::new(compile_literal(node)?))))
            }
        }
        NodeType::Text | NodeType::Cdata => {
            if node.is_blank() {
                Ok(None)
            } else {
                Ok(Some(CompiledStep::Text(TextOutput {
                    content: node.content(),
                    raw: false,
                })))
            }
        }
        _ => Ok(None),
    }
}

pub fn compile_variable(node: &Node) -> Result<VariableDecl> {
    let kind = match node.local_name().as_str() {
        "param" => VariableKind::Param,
        "with-param" => VariableKind::WithParam,
        _ => VariableKind::Variable,
    };
    let name = node
        .attribute("name")
        .ok_or_else(|| Error::Compile(format!("xsl:{} requires a name", node.local_name())))?;
    let select = node
        .attribute("select")
        .map(|s| xpath::parse_expression(&s))
        .transpose()?;
    Ok(VariableDecl {
        kind,
        name,
        select,
        body: compile_content(node)?,
        node: node.clone(),
    })
}

fn compile_literal(node: &Node) -> Result<LiteralElement> {
    let mut attributes = Vec::new();
    let mut use_attribute_sets = Vec::new();
    for attr in node.attributes() {
        if attr.namespace() == XSLT_NAMESPACE {
            if attr.local_name() == "use-attribute-sets" {
                use_attribute_sets = space_list(&attr.content());
            }
            // other xsl: attributes on literals (version, exclude-result-
            // prefixes) direct compilation, not output
            continue;
        }
        let ns = attr.namespace();
        attributes.push(LiteralAttribute {
            name: attr.qname().unwrap_or_else(|| crate::dom::QName::new("")),
            ns_uri: if ns.is_empty() { None } else { Some(ns) },
            value: Avt::compile(&attr.content())?,
        });
    }
    Ok(LiteralElement {
        node: node.clone(),
        attributes,
        use_attribute_sets,
        children: compile_content(node)?,
    })
}

fn space_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn required_attr(node: &Node, name: &str) -> Result<String> {
    node.attribute(name).ok_or_else(|| {
        Error::Compile(format!(
            "xsl:{} requires a {} attribute",
            node.local_name(),
            name
        ))
    })
}

fn optional_expr(node: &Node, name: &str) -> Result<Option<Expression>> {
    node.attribute(name)
        .map(|s| xpath::parse_expression(&s))
        .transpose()
}

fn required_expr(node: &Node, name: &str) -> Result<Expression> {
    xpath::parse_expression(&required_attr(node, name)?)
}

fn required_avt(node: &Node, name: &str) -> Result<Avt> {
    Avt::compile(&required_attr(node, name)?)
}

fn optional_avt(node: &Node, name: &str) -> Result<Option<Avt>> {
    node.attribute(name).map(|s| Avt::compile(&s)).transpose()
}

/// Collects `xsl:sort` and `xsl:with-param` children, compiling the rest as
/// the body.
fn compile_parts(node: &Node) -> Result<(Vec<SortKey>, Vec<VariableDecl>, Vec<CompiledStep>)> {
    let mut sort_keys = Vec::new();
    let mut params = Vec::new();
    let mut body = Vec::new();
    for cur in node.children() {
        if is_xslt_name(&cur, "sort") {
            sort_keys.push(compile_sort_key(&cur)?);
            continue;
        }
        if is_xslt_name(&cur, "with-param") {
            params.push(compile_variable(&cur)?);
            continue;
        }
        if let Some(step) = compile_single_node(&cur)? {
            body.push(step);
        }
    }
    Ok((sort_keys, params, body))
}

pub fn compile_instruction(node: &Node) -> Result<Instruction> {
    let local = node.local_name();
    let kind = match local.as_str() {
        "apply-templates" => {
            let (sort_keys, params, _) = compile_parts(node)?;
            InstructionKind::ApplyTemplates {
                select: optional_expr(node, "select")?,
                mode: node.attribute("mode"),
                sort_keys,
                params,
            }
        }
        "call-template" => {
            let (_, params, _) = compile_parts(node)?;
            InstructionKind::CallTemplate {
                name: required_attr(node, "name")?,
                params,
            }
        }
        "for-each" => {
            let (sort_keys, _, body) = compile_parts(node)?;
            InstructionKind::ForEach {
                select: required_expr(node, "select")?,
                sort_keys,
                body,
            }
        }
        "if" => InstructionKind::If {
            test: required_expr(node, "test")?,
            body: compile_content(node)?,
        },
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = Vec::new();
            for cur in node.children() {
                if is_xslt_name(&cur, "when") {
                    whens.push(When {
                        test: required_expr(&cur, "test")?,
                        body: compile_content(&cur)?,
                    });
                } else if is_xslt_name(&cur, "otherwise") {
                    otherwise = compile_content(&cur)?;
                }
            }
            InstructionKind::Choose { whens, otherwise }
        }
        "value-of" => InstructionKind::ValueOf {
            select: required_expr(node, "select")?,
            disable_escaping: node.attribute("disable-output-escaping").as_deref() == Some("yes"),
        },
        "copy" => InstructionKind::Copy {
            use_attribute_sets: space_list(&node.attribute("use-attribute-sets").unwrap_or_default()),
            body: compile_content(node)?,
        },
        "copy-of" => InstructionKind::CopyOf {
            select: required_expr(node, "select")?,
        },
        "element" => InstructionKind::Element {
            name: required_avt(node, "name")?,
            namespace: optional_avt(node, "namespace")?,
            use_attribute_sets: space_list(&node.attribute("use-attribute-sets").unwrap_or_default()),
            body: compile_content(node)?,
        },
        "attribute" => InstructionKind::Attribute {
            name: required_avt(node, "name")?,
            namespace: optional_avt(node, "namespace")?,
            body: compile_content(node)?,
        },
        "comment" => InstructionKind::Comment {
            body: compile_content(node)?,
        },
        "processing-instruction" => InstructionKind::ProcessingInstruction {
            name: required_avt(node, "name")?,
            body: compile_content(node)?,
        },
        "message" => InstructionKind::Message {
            terminate: node.attribute("terminate").as_deref() == Some("yes"),
            body: compile_content(node)?,
        },
        "number" => InstructionKind::Number(compile_number(node)?),
        "fallback" => InstructionKind::Fallback {
            body: compile_content(node)?,
        },
        "apply-imports" => InstructionKind::ApplyImports,
        other => {
            warn!("unknown XSLT instruction xsl:{}", other);
            InstructionKind::Unknown {
                name: other.to_string(),
                body: compile_content(node)?,
            }
        }
    };
    Ok(Instruction {
        node: node.clone(),
        kind,
    })
}

fn compile_number(node: &Node) -> Result<NumberSpec> {
    let level = match node.attribute("level").as_deref() {
        None | Some("single") => Level::Single,
        Some("multiple") => Level::Multiple,
        Some("any") => Level::Any,
        Some(other) => {
            return Err(Error::Compile(format!(
                "unknown xsl:number level '{}'",
                other
            )))
        }
    };
    let count = node
        .attribute("count")
        .map(|c| compile_match(&c, None, "", None, Some(node.clone())));
    let from = node
        .attribute("from")
        .map(|f| compile_match(&f, None, "", None, Some(node.clone())))
        .unwrap_or_default();
    let value = optional_expr(node, "value")?;
    let format = Avt::compile(&node.attribute("format").unwrap_or_else(|| "1".to_string()))?;
    Ok(NumberSpec {
        level,
        count,
        from,
        value,
        format,
    })
}
