//! The instruction interpreter: applies compiled steps against the source
//! tree, growing the output tree under the context's cursor.

use log::warn;

use super::context::ExecutionContext;
use super::number;
use super::pattern::compile_match;
use super::sort::sort_nodes;
use super::template::{
    CompiledStep, Instruction, InstructionKind, Level, LiteralElement, NumberSpec, Template,
    VariableDecl, VariableKind,
};
use super::XSLT_NAMESPACE;
use crate::dom::{Document, Node, NodeType, QName, XML_NAMESPACE};
use crate::error::{Error, Result};
use crate::xpath::Value;

/// Dispatches one source node: the best-matching template, or the default
/// rules when nothing matches.
pub fn process_node(node: &Node, ctx: &mut ExecutionContext, params: &[(String, Value)]) -> Result<()> {
    ctx.check_cancelled()?;
    let style = ctx.style;
    let mode = ctx.mode.clone();
    match style.lookup_template(node, &mode, ctx) {
        Some((owner, id)) => {
            let template = &owner.templates[id.0];
            ctx.owner_stack.push(owner);
            let result = apply_template(template, node, ctx, params);
            ctx.owner_stack.pop();
            result
        }
        None => default_rule(node, ctx),
    }
}

/// The built-in rules: documents and elements recurse into children, text
/// and attributes copy their text, comments and PIs vanish.
fn default_rule(node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
    match node.node_type() {
        NodeType::Document | NodeType::Element => {
            let children = ctx.children_of(node);
            let total = children.len();
            let (old_pos, old_size) = (ctx.position, ctx.size);
            for (i, child) in children.iter().enumerate() {
                ctx.position = i + 1;
                ctx.size = total;
                process_node(child, ctx, &[])?;
            }
            ctx.position = old_pos;
            ctx.size = old_size;
            Ok(())
        }
        NodeType::Text | NodeType::Cdata | NodeType::Attribute => {
            if ctx.should_strip(node) {
                return Ok(());
            }
            emit_text(ctx, &node.content(), false);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Instantiates a template body. The caller's local scope is hidden for the
/// duration; `xsl:param` children take caller-supplied values first.
pub fn apply_template(
    template: &Template,
    node: &Node,
    ctx: &mut ExecutionContext,
    params: &[(String, Value)],
) -> Result<()> {
    let old_stack = ctx.take_stack();
    ctx.push_frame();
    let old_current = std::mem::replace(&mut ctx.current, node.clone());
    let result = apply_body_with_params(&template.children, node, ctx, params);
    ctx.current = old_current;
    ctx.restore_stack(old_stack);
    result
}

/// Applies a body; `xsl:variable`/`xsl:param` declarations become visible to
/// the steps that follow them.
pub fn apply_body(steps: &[CompiledStep], node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
    apply_body_with_params(steps, node, ctx, &[])
}

fn apply_body_with_params(
    steps: &[CompiledStep],
    node: &Node,
    ctx: &mut ExecutionContext,
    params: &[(String, Value)],
) -> Result<()> {
    for step in steps {
        ctx.check_cancelled()?;
        match step {
            CompiledStep::Variable(decl) => {
                let value = if decl.kind == VariableKind::Param {
                    match params.iter().find(|(name, _)| *name == decl.name) {
                        Some((_, v)) => v.clone(),
                        None => evaluate_variable(decl, node, ctx)?,
                    }
                } else {
                    evaluate_variable(decl, node, ctx)?
                };
                ctx.declare_local(&decl.name, value);
            }
            CompiledStep::Instruction(inst) => apply_instruction(inst, node, ctx)?,
            CompiledStep::Literal(lit) => apply_literal(lit, node, ctx)?,
            CompiledStep::Text(text) => emit_text(ctx, &text.content, text.raw),
        }
    }
    Ok(())
}

/// Computes a variable's value: `select` expression, or the body
/// instantiated into a result tree fragment (a fresh document whose root
/// carries the generated children).
pub fn evaluate_variable(
    decl: &VariableDecl,
    node: &Node,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    if let Some(select) = &decl.select {
        return ctx.eval_scoped(select, node, &decl.node);
    }
    if decl.body.is_empty() {
        return Ok(Value::String(String::new()));
    }

    let fragment = Document::new();
    let old_output = std::mem::replace(&mut ctx.output, fragment.clone());
    let old_cursor = std::mem::replace(&mut ctx.output_node, fragment.root());
    ctx.push_frame();
    let result = apply_body(&decl.body, node, ctx);
    ctx.pop_frame();
    ctx.output = old_output;
    ctx.output_node = old_cursor;
    result?;
    Ok(Value::NodeSet(vec![fragment.root()]))
}

/// Evaluates the global variables and parameters into the context, imports
/// first, parameters taking caller overrides.
pub fn evaluate_globals(ctx: &mut ExecutionContext) -> Result<()> {
    let decls = ctx.style.global_decls();
    let root = ctx.source.root();
    for decl in decls {
        if decl.kind == VariableKind::Param {
            if let Some(value) = ctx.parameters.get(&decl.name).cloned() {
                ctx.globals.insert(decl.name.clone(), Value::String(value));
                continue;
            }
        }
        let value = evaluate_variable(decl, &root, ctx)?;
        ctx.globals.insert(decl.name.clone(), value);
    }
    Ok(())
}

fn evaluate_with_params(
    params: &[VariableDecl],
    node: &Node,
    ctx: &mut ExecutionContext,
) -> Result<Vec<(String, Value)>> {
    let mut out = Vec::with_capacity(params.len());
    for p in params {
        out.push((p.name.clone(), evaluate_variable(p, node, ctx)?));
    }
    Ok(out)
}

fn apply_instruction(inst: &Instruction, node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
    match &inst.kind {
        InstructionKind::ApplyTemplates {
            select,
            mode,
            sort_keys,
            params,
        } => {
            let old_mode = ctx.mode.clone();
            match mode.as_deref() {
                Some("#current") => {}
                Some(m) => ctx.mode = m.to_string(),
                None => ctx.mode.clear(),
            }
            let passed = evaluate_with_params(params, node, ctx)?;
            let mut nodes = match select {
                None => ctx.children_of(node),
                Some(expr) => ctx.eval_scoped(expr, node, &inst.node)?.into_node_set()?,
            };
            nodes.retain(|n| !ctx.should_strip(n));
            sort_nodes(&mut nodes, sort_keys, ctx)?;
            let total = nodes.len();
            let (old_pos, old_size) = (ctx.position, ctx.size);
            for (i, cur) in nodes.iter().enumerate() {
                ctx.position = i + 1;
                ctx.size = total;
                process_node(cur, ctx, &passed)?;
            }
            ctx.position = old_pos;
            ctx.size = old_size;
            ctx.mode = old_mode;
            Ok(())
        }

        InstructionKind::CallTemplate { name, params } => {
            let style = ctx.style;
            match style.find_named_template(name) {
                Some((owner, id)) => {
                    let template = &owner.templates[id.0];
                    let passed = evaluate_with_params(params, node, ctx)?;
                    ctx.owner_stack.push(owner);
                    let result = apply_template(template, node, ctx, &passed);
                    ctx.owner_stack.pop();
                    result
                }
                None => {
                    warn!("call-template: no template named '{}'", name);
                    Ok(())
                }
            }
        }

        InstructionKind::ForEach {
            select,
            sort_keys,
            body,
        } => {
            let mut nodes = ctx.eval_scoped(select, node, &inst.node)?.into_node_set()?;
            nodes.retain(|n| !ctx.should_strip(n));
            sort_nodes(&mut nodes, sort_keys, ctx)?;
            let total = nodes.len();
            let (old_pos, old_size) = (ctx.position, ctx.size);
            let old_current = ctx.current.clone();
            for (i, cur) in nodes.iter().enumerate() {
                ctx.push_frame();
                ctx.position = i + 1;
                ctx.size = total;
                ctx.current = cur.clone();
                let result = apply_body(body, cur, ctx);
                ctx.pop_frame();
                result?;
            }
            ctx.current = old_current;
            ctx.position = old_pos;
            ctx.size = old_size;
            Ok(())
        }

        InstructionKind::If { test, body } => {
            if ctx.eval_scoped(test, node, &inst.node)?.boolean() {
                apply_body(body, node, ctx)?;
            }
            Ok(())
        }

        InstructionKind::Choose { whens, otherwise } => {
            for when in whens {
                if ctx.eval_scoped(&when.test, node, &inst.node)?.boolean() {
                    return apply_body(&when.body, node, ctx);
                }
            }
            apply_body(otherwise, node, ctx)
        }

        InstructionKind::ValueOf {
            select,
            disable_escaping,
        } => {
            let value = ctx.eval_scoped(select, node, &inst.node)?;
            let text = match value {
                Value::NodeSet(nodes) => match nodes.first() {
                    Some(first) => first.string_value(),
                    None => String::new(),
                },
                other => other.string(),
            };
            emit_text(ctx, &text, *disable_escaping);
            Ok(())
        }

        InstructionKind::Copy {
            use_attribute_sets,
            body,
        } => apply_copy(node, use_attribute_sets, body, ctx),

        InstructionKind::CopyOf { select } => {
            let value = ctx.eval_scoped(select, node, &inst.node)?;
            match value {
                Value::NodeSet(nodes) => {
                    for cur in &nodes {
                        copy_to_output(cur, ctx, true)?;
                    }
                    Ok(())
                }
                other => {
                    emit_text(ctx, &other.string(), false);
                    Ok(())
                }
            }
        }

        InstructionKind::Element {
            name,
            namespace,
            use_attribute_sets,
            body,
        } => {
            let ename = name.evaluate(node, ctx)?;
            let qname = QName::parse(&ename);
            let element = ctx.output.create_element(qname.clone());
            let ns_attr = namespace
                .as_ref()
                .map(|avt| avt.evaluate(node, ctx))
                .transpose()?
                .filter(|ns| !ns.is_empty());
            if let Some(uri) = ns_attr {
                let prefix = qname
                    .prefix
                    .clone()
                    .or_else(|| ctx.style.prefix_for_uri(&uri).map(str::to_string))
                    .filter(|p| !p.is_empty());
                element.set_namespace(prefix.as_deref(), &uri);
                ensure_declared(&element, prefix.as_deref().unwrap_or(""), &uri);
            } else if let Some(prefix) = &qname.prefix {
                match inst.node.lookup_namespace_uri(prefix) {
                    Some(uri) => {
                        element.set_namespace(Some(prefix), &uri);
                        ensure_declared(&element, prefix, &uri);
                    }
                    None => warn!("xsl:element name '{}' uses an undeclared prefix", ename),
                }
            } else if let Some(uri) = inst.node.default_namespace().filter(|u| !u.is_empty()) {
                element.set_namespace(None, &uri);
                ensure_declared(&element, "", &uri);
            }
            declare_stylesheet_namespaces_if_root(ctx, &element);
            ctx.output_node.append_child(&element);

            let old_cursor = std::mem::replace(&mut ctx.output_node, element);
            let result = apply_attribute_sets(use_attribute_sets, node, ctx)
                .and_then(|_| apply_body(body, node, ctx));
            ctx.output_node = old_cursor;
            result
        }

        InstructionKind::Attribute {
            name,
            namespace,
            body,
        } => {
            let aname = name.evaluate(node, ctx)?;
            let ns = namespace
                .as_ref()
                .map(|avt| avt.evaluate(node, ctx))
                .transpose()?
                .filter(|ns| !ns.is_empty());
            let value = evaluate_body_as_text(body, node, ctx, "xsl:attribute")?;
            if ctx.output_node.node_type() != NodeType::Element {
                warn!("xsl:attribute '{}' outside an element; ignored", aname);
                return Ok(());
            }
            match ns {
                None => ctx.output_node.set_attribute(&aname, &value),
                Some(uri) => {
                    let qname = QName::parse(&aname);
                    let prefix = match &qname.prefix {
                        Some(p) => p.clone(),
                        None if uri == XML_NAMESPACE => "xml".to_string(),
                        None => ctx
                            .output_node
                            .in_scope_namespaces()
                            .into_iter()
                            .find(|(p, u)| !p.is_empty() && *u == uri)
                            .map(|(p, _)| p)
                            .unwrap_or_else(|| "ns_1".to_string()),
                    };
                    if uri != XML_NAMESPACE {
                        ensure_declared(&ctx.output_node, &prefix, &uri);
                    }
                    let full = format!("{}:{}", prefix, qname.local);
                    ctx.output_node.set_ns_attribute(&uri, &full, &value);
                }
            }
            Ok(())
        }

        InstructionKind::Comment { body } => {
            let text = evaluate_body_as_text(body, node, ctx, "xsl:comment")?;
            let comment = ctx.output.create_comment(&text);
            ctx.output_node.append_child(&comment);
            Ok(())
        }

        InstructionKind::ProcessingInstruction { name, body } => {
            let target = name.evaluate(node, ctx)?;
            let text = evaluate_body_as_text(body, node, ctx, "xsl:processing-instruction")?;
            let pi = ctx.output.create_pi(&target, &text);
            ctx.output_node.append_child(&pi);
            Ok(())
        }

        InstructionKind::Message { terminate, body } => {
            let text = evaluate_body_as_text(body, node, ctx, "xsl:message")?;
            if *terminate {
                return Err(Error::Terminated(text));
            }
            warn!("xsl:message: {}", text);
            Ok(())
        }

        InstructionKind::Number(spec) => {
            let text = apply_number(spec, inst, node, ctx)?;
            emit_text(ctx, &text, false);
            Ok(())
        }

        InstructionKind::Fallback { body } => apply_body(body, node, ctx),

        InstructionKind::ApplyImports => {
            let owner = ctx.owner_stack.last().copied().unwrap_or(ctx.style);
            let mode = ctx.mode.clone();
            for imp in owner.imports.iter().rev() {
                if let Some((found_owner, id)) = imp.lookup_template(node, &mode, ctx) {
                    let template = &found_owner.templates[id.0];
                    ctx.owner_stack.push(found_owner);
                    let result = apply_template(template, node, ctx, &[]);
                    ctx.owner_stack.pop();
                    return result;
                }
            }
            default_rule(node, ctx)
        }

        InstructionKind::Unknown { name, body } => {
            let mut ran_fallback = false;
            for step in body {
                if let CompiledStep::Instruction(child) = step {
                    if let InstructionKind::Fallback { body } = &child.kind {
                        apply_body(body, node, ctx)?;
                        ran_fallback = true;
                    }
                }
            }
            if !ran_fallback {
                warn!("unknown instruction xsl:{} ignored (no fallback)", name);
            }
            Ok(())
        }
    }
}

/// `xsl:copy`: a shallow copy of the current input node, then the body.
fn apply_copy(
    node: &Node,
    use_attribute_sets: &[String],
    body: &[CompiledStep],
    ctx: &mut ExecutionContext,
) -> Result<()> {
    match node.node_type() {
        NodeType::Text | NodeType::Cdata => {
            emit_text(ctx, &node.content(), false);
            Ok(())
        }
        NodeType::Attribute => {
            let ns = node.namespace();
            if ns.is_empty() {
                ctx.output_node.set_attribute(&node.name(), &node.content());
            } else {
                ctx.output_node
                    .set_ns_attribute(&ns, &node.name(), &node.content());
            }
            Ok(())
        }
        NodeType::Comment => {
            let comment = ctx.output.create_comment(&node.content());
            ctx.output_node.append_child(&comment);
            Ok(())
        }
        NodeType::ProcessingInstruction => {
            let pi = ctx.output.create_pi(&node.name(), &node.content());
            ctx.output_node.append_child(&pi);
            Ok(())
        }
        NodeType::Element => {
            let element = ctx.output.create_element(node.qname().unwrap_or_else(|| QName::new("")));
            let ns = node.namespace();
            if !ns.is_empty() {
                element.set_namespace(node.prefix().as_deref(), &ns);
            }
            declare_stylesheet_namespaces_if_root(ctx, &element);
            ctx.output_node.append_child(&element);
            for (prefix, uri) in node.declared_namespaces() {
                element.declare_namespace(&prefix, &uri);
            }
            if !ns.is_empty() {
                ensure_declared(&element, node.prefix().as_deref().unwrap_or(""), &ns);
            }
            let old_cursor = std::mem::replace(&mut ctx.output_node, element);
            let result = apply_attribute_sets(use_attribute_sets, node, ctx)
                .and_then(|_| apply_body(body, node, ctx));
            ctx.output_node = old_cursor;
            result
        }
        NodeType::Document => apply_body(body, node, ctx),
    }
}

/// Deep copy for `xsl:copy-of`.
fn copy_to_output(node: &Node, ctx: &mut ExecutionContext, recursive: bool) -> Result<()> {
    match node.node_type() {
        NodeType::Text | NodeType::Cdata => {
            if !ctx.should_strip(node) {
                emit_text(ctx, &node.content(), node.is_raw());
            }
            Ok(())
        }
        NodeType::Attribute => {
            let ns = node.namespace();
            if ns.is_empty() {
                ctx.output_node.set_attribute(&node.name(), &node.content());
            } else {
                ctx.output_node
                    .set_ns_attribute(&ns, &node.name(), &node.content());
            }
            Ok(())
        }
        NodeType::Comment => {
            let comment = ctx.output.create_comment(&node.content());
            ctx.output_node.append_child(&comment);
            Ok(())
        }
        NodeType::ProcessingInstruction => {
            let pi = ctx.output.create_pi(&node.name(), &node.content());
            ctx.output_node.append_child(&pi);
            Ok(())
        }
        NodeType::Element => {
            let element = ctx.output.create_element(node.qname().unwrap_or_else(|| QName::new("")));
            let ns = node.namespace();
            if !ns.is_empty() {
                element.set_namespace(node.prefix().as_deref(), &ns);
            }
            ctx.output_node.append_child(&element);
            for (prefix, uri) in node.declared_namespaces() {
                element.declare_namespace(&prefix, &uri);
            }
            if !ns.is_empty() {
                ensure_declared(&element, node.prefix().as_deref().unwrap_or(""), &ns);
            }
            if recursive {
                let old_cursor = std::mem::replace(&mut ctx.output_node, element);
                for attr in node.attributes() {
                    copy_to_output(&attr, ctx, recursive)?;
                }
                for child in node.children() {
                    copy_to_output(&child, ctx, recursive)?;
                }
                ctx.output_node = old_cursor;
            }
            Ok(())
        }
        NodeType::Document => {
            for child in node.children() {
                copy_to_output(&child, ctx, recursive)?;
            }
            Ok(())
        }
    }
}

/// Copies a literal result element to the output, expanding attribute value
/// templates and applying namespace aliases.
fn apply_literal(lit: &LiteralElement, node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
    // an extension element runs its fallback instead
    let style = ctx.style;
    let source_ns = lit.node.namespace();
    if !source_ns.is_empty() {
        if let Some(prefix) = style.prefix_for_uri(&source_ns) {
            if style.extension_prefixes.iter().any(|p| p == prefix) {
                for step in &lit.children {
                    if let CompiledStep::Instruction(child) = step {
                        if let InstructionKind::Fallback { body } = &child.kind {
                            apply_body(body, node, ctx)?;
                        }
                    }
                }
                return Ok(());
            }
        }
    }

    let qname = lit.node.qname().unwrap_or_else(|| QName::new(""));
    let (prefix, uri) = resolve_alias(ctx, qname.prefix.as_deref(), &source_ns);
    let element = ctx.output.create_element(QName {
        prefix: prefix.clone(),
        local: qname.local,
    });
    declare_stylesheet_namespaces_if_root(ctx, &element);
    if !uri.is_empty() {
        element.set_namespace(prefix.as_deref(), &uri);
        ensure_declared(&element, prefix.as_deref().unwrap_or(""), &uri);
    }
    ctx.output_node.append_child(&element);

    for attr in &lit.attributes {
        let value = attr.value.evaluate(node, ctx)?;
        match &attr.ns_uri {
            Some(uri) => {
                element.set_ns_attribute(uri, &attr.name.qualified(), &value);
                if let Some(p) = &attr.name.prefix {
                    if p != "xml" {
                        ensure_declared(&element, p, uri);
                    }
                }
            }
            None => element.set_attribute(&attr.name.local, &value),
        }
    }

    let old_cursor = std::mem::replace(&mut ctx.output_node, element);
    let result = apply_attribute_sets(&lit.use_attribute_sets, node, ctx)
        .and_then(|_| apply_body(&lit.children, node, ctx));
    ctx.output_node = old_cursor;
    result
}

/// Applies `xsl:namespace-alias`: a stylesheet prefix maps to a result
/// prefix, whose URI replaces the original.
fn resolve_alias(
    ctx: &ExecutionContext,
    prefix: Option<&str>,
    uri: &str,
) -> (Option<String>, String) {
    let alias_key = prefix.unwrap_or("");
    if let Some(result_prefix) = ctx.style.namespace_alias.get(alias_key) {
        for (mapped_uri, mapped_prefix) in &ctx.style.namespace_mapping {
            if mapped_prefix == result_prefix {
                let p = if result_prefix.is_empty() {
                    None
                } else {
                    Some(result_prefix.clone())
                };
                return (p, mapped_uri.clone());
            }
        }
    }
    (prefix.map(str::to_string), uri.to_string())
}

/// When the first element lands under the document node, the stylesheet's
/// non-excluded namespace declarations propagate onto it.
fn declare_stylesheet_namespaces_if_root(ctx: &ExecutionContext, element: &Node) {
    if ctx.output_node.node_type() != NodeType::Document {
        return;
    }
    for (uri, prefix) in &ctx.style.namespace_mapping {
        if uri == XSLT_NAMESPACE || ctx.style.is_excluded(prefix) {
            continue;
        }
        let (alias_prefix, alias_uri) = resolve_alias(ctx, Some(prefix), uri);
        element.declare_namespace(alias_prefix.as_deref().unwrap_or(""), &alias_uri);
    }
}

/// Declares `prefix` → `uri` on the element unless already in scope.
fn ensure_declared(element: &Node, prefix: &str, uri: &str) {
    if element.lookup_namespace_uri(prefix).as_deref() != Some(uri) {
        element.declare_namespace(prefix, uri);
    }
}

fn apply_attribute_sets(names: &[String], node: &Node, ctx: &mut ExecutionContext) -> Result<()> {
    let style = ctx.style;
    for name in names {
        let set = match style.lookup_attribute_set(name) {
            Some(set) => set,
            None => {
                warn!("unknown attribute-set '{}'", name);
                continue;
            }
        };
        // the set's own attributes override those from nested sets
        apply_attribute_sets(&set.use_sets, node, ctx)?;
        apply_body(&set.body, node, ctx)?;
    }
    Ok(())
}

/// Instantiates a body into a fragment that must contain only text; used
/// for attributes, comments, PIs, and messages.
fn evaluate_body_as_text(
    body: &[CompiledStep],
    node: &Node,
    ctx: &mut ExecutionContext,
    what: &str,
) -> Result<String> {
    let fragment = Document::new();
    let old_output = std::mem::replace(&mut ctx.output, fragment.clone());
    let old_cursor = std::mem::replace(&mut ctx.output_node, fragment.root());
    let result = apply_body(body, node, ctx);
    ctx.output = old_output;
    ctx.output_node = old_cursor;
    result?;

    let mut out = String::new();
    for child in fragment.root().children() {
        match child.node_type() {
            NodeType::Text | NodeType::Cdata => out.push_str(&child.content()),
            other => {
                return Err(Error::Evaluation(format!(
                    "{} content must be text, found a {:?} node",
                    what, other
                )))
            }
        }
    }
    Ok(out)
}

/// Adds a text (or CDATA, per `cdata-section-elements`) node at the cursor.
fn emit_text(ctx: &mut ExecutionContext, content: &str, raw: bool) {
    if content.is_empty() {
        return;
    }
    let node = if !raw && ctx.use_cdata_section(&ctx.output_node) {
        ctx.output.create_cdata(content)
    } else {
        ctx.output.create_text(content)
    };
    if raw {
        node.set_raw();
    }
    ctx.output_node.append_child(&node);
}

/// `xsl:number`: compute the number list and render it.
fn apply_number(
    spec: &NumberSpec,
    inst: &Instruction,
    node: &Node,
    ctx: &mut ExecutionContext,
) -> Result<String> {
    let format = spec.format.evaluate(node, ctx)?;

    let mut numbers: Vec<i64> = Vec::new();
    if let Some(value) = &spec.value {
        let v = ctx.eval_scoped(value, node, &inst.node)?.number();
        numbers.push(if v.is_finite() { v.floor() as i64 } else { 0 });
    } else {
        let default_count;
        let count = match &spec.count {
            Some(c) => c,
            None => {
                default_count = compile_match(&node.name(), None, "", None, Some(inst.node.clone()));
                &default_count
            }
        };
        let target = number::find_target(node, count);
        numbers.push(number::count_nodes(
            spec.level == Level::Any,
            target.as_ref(),
            count,
            &spec.from,
        ));
        if spec.level == Level::Multiple {
            if let Some(t) = &target {
                let mut cur = t.parent();
                while let Some(p) = cur {
                    let v = number::count_nodes(false, Some(&p), count, &spec.from);
                    if v > 0 {
                        numbers.push(v);
                    }
                    cur = p.parent();
                }
            }
            // outermost level first
            numbers.reverse();
        }
    }

    Ok(number::format_numbers(&numbers, &format))
}
