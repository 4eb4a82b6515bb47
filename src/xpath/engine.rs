//! The evaluator: runs a compiled expression against a context node.

use log::warn;

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, Step};
use super::functions;
use super::value::{string_to_number, Value};
use crate::dom::{Node, NodeType};
use crate::error::{Error, Result};

/// Supplies the parts of evaluation that depend on the caller: variable
/// bindings, extension functions, and namespace-prefix resolution. The XSLT
/// execution context implements this; resolution always reflects the state
/// at evaluation time.
pub trait Resolver {
    fn variable(&self, name: &str) -> Option<Value>;

    /// Dispatches an extension function keyed by namespace URI and local
    /// name. `None` means "no such function".
    fn function(
        &self,
        uri: &str,
        local: &str,
        args: Vec<Value>,
        ctx: &EvalContext,
    ) -> Option<Result<Value>>;

    fn namespace(&self, prefix: &str) -> Option<String>;
}

/// A resolver with no bindings at all; standalone evaluation.
pub struct NullResolver;

impl Resolver for NullResolver {
    fn variable(&self, _name: &str) -> Option<Value> {
        None
    }

    fn function(
        &self,
        _uri: &str,
        _local: &str,
        _args: Vec<Value>,
        _ctx: &EvalContext,
    ) -> Option<Result<Value>> {
        None
    }

    fn namespace(&self, _prefix: &str) -> Option<String> {
        None
    }
}

/// Everything needed to evaluate an expression at one point.
pub struct EvalContext<'a> {
    pub node: Node,
    /// 1-based context position.
    pub position: usize,
    pub size: usize,
    pub resolver: &'a dyn Resolver,
}

impl<'a> EvalContext<'a> {
    pub fn new(node: Node, resolver: &'a dyn Resolver) -> EvalContext<'a> {
        EvalContext {
            node,
            position: 1,
            size: 1,
            resolver,
        }
    }

    fn at(&self, node: Node, position: usize, size: usize) -> EvalContext<'a> {
        EvalContext {
            node,
            position,
            size,
            resolver: self.resolver,
        }
    }
}

/// Sorts into document order and removes duplicates.
pub fn sort_document_order(nodes: &mut Vec<Node>) {
    nodes.sort_by(|a, b| a.compare_document_order(b));
    nodes.dedup();
}

/// Evaluates a compiled expression.
pub fn evaluate(expr: &Expression, ctx: &EvalContext) -> Result<Value> {
    match expr {
        Expression::Literal(s) => Ok(Value::String(s.clone())),
        Expression::Number(n) => Ok(Value::Number(*n)),
        Expression::Variable(name) => ctx
            .resolver
            .variable(name)
            .ok_or_else(|| Error::Evaluation(format!("undefined variable ${}", name))),
        Expression::Unary { expr } => Ok(Value::Number(-evaluate(expr, ctx)?.number())),
        Expression::FunctionCall { prefix, name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            call_function(prefix.as_deref(), name, values, ctx)
        }
        Expression::Binary { left, op, right } => evaluate_binary(left, *op, right, ctx),
        Expression::Filter { base, predicates } => {
            let mut nodes = evaluate(base, ctx)?.into_node_set()?;
            sort_document_order(&mut nodes);
            for predicate in predicates {
                nodes = apply_predicate(predicate, nodes, ctx)?;
            }
            Ok(Value::NodeSet(nodes))
        }
        Expression::Path(path) => Ok(Value::NodeSet(evaluate_path(path, ctx)?)),
    }
}

fn call_function(
    prefix: Option<&str>,
    name: &str,
    args: Vec<Value>,
    ctx: &EvalContext,
) -> Result<Value> {
    let uri = match prefix {
        Some(p) => ctx
            .resolver
            .namespace(p)
            .ok_or_else(|| Error::Evaluation(format!("undeclared function prefix '{}'", p)))?,
        None => String::new(),
    };
    if uri.is_empty() && functions::is_core_function(name) {
        return functions::call_core(name, args, ctx);
    }
    match ctx.resolver.function(&uri, name, args, ctx) {
        Some(result) => result,
        None => Err(Error::Evaluation(format!("unknown function '{}'", name))),
    }
}

fn evaluate_binary(
    left_expr: &Expression,
    op: BinaryOperator,
    right_expr: &Expression,
    ctx: &EvalContext,
) -> Result<Value> {
    use BinaryOperator::*;

    // or/and short-circuit.
    if op == Or {
        if evaluate(left_expr, ctx)?.boolean() {
            return Ok(Value::Boolean(true));
        }
        return Ok(Value::Boolean(evaluate(right_expr, ctx)?.boolean()));
    }
    if op == And {
        if !evaluate(left_expr, ctx)?.boolean() {
            return Ok(Value::Boolean(false));
        }
        return Ok(Value::Boolean(evaluate(right_expr, ctx)?.boolean()));
    }

    let left = evaluate(left_expr, ctx)?;
    let right = evaluate(right_expr, ctx)?;

    match op {
        Union => {
            let mut nodes = left.into_node_set()?;
            nodes.extend(right.into_node_set()?);
            sort_document_order(&mut nodes);
            Ok(Value::NodeSet(nodes))
        }
        Equals => Ok(Value::Boolean(compare_equality(&left, &right, false))),
        NotEquals => Ok(Value::Boolean(compare_equality(&left, &right, true))),
        LessThan => Ok(Value::Boolean(compare_relational(&left, &right, |a, b| a < b))),
        LessThanOrEqual => Ok(Value::Boolean(compare_relational(&left, &right, |a, b| {
            a <= b
        }))),
        GreaterThan => Ok(Value::Boolean(compare_relational(&left, &right, |a, b| {
            a > b
        }))),
        GreaterThanOrEqual => Ok(Value::Boolean(compare_relational(&left, &right, |a, b| {
            a >= b
        }))),
        Plus => Ok(Value::Number(left.number() + right.number())),
        Minus => Ok(Value::Number(left.number() - right.number())),
        Multiply => Ok(Value::Number(left.number() * right.number())),
        Divide => Ok(Value::Number(left.number() / right.number())),
        Modulo => Ok(Value::Number(left.number() % right.number())),
        Or | And => unreachable!("handled above"),
    }
}

/// Equality per XPath 1.0: comparisons involving a node-set are existential.
fn compare_equality(left: &Value, right: &Value, negate: bool) -> bool {
    match (left, right) {
        (Value::NodeSet(l), Value::NodeSet(r)) => {
            let rvals: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter().any(|ln| {
                let lv = ln.string_value();
                rvals.iter().any(|rv| (lv == *rv) != negate)
            })
        }
        (Value::NodeSet(ns), other) | (other, Value::NodeSet(ns)) => match other {
            Value::Number(num) => ns
                .iter()
                .any(|n| (string_to_number(&n.string_value()) == *num) != negate),
            Value::Boolean(b) => (!ns.is_empty() == *b) != negate,
            _ => {
                let s = other.string();
                ns.iter().any(|n| (n.string_value() == s) != negate)
            }
        },
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
            (left.boolean() == right.boolean()) != negate
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            (left.number() == right.number()) != negate
        }
        _ => (left.string() == right.string()) != negate,
    }
}

fn compare_relational(left: &Value, right: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (left, right) {
        (Value::NodeSet(l), Value::NodeSet(r)) => l.iter().any(|ln| {
            let lv = string_to_number(&ln.string_value());
            r.iter()
                .any(|rn| cmp(lv, string_to_number(&rn.string_value())))
        }),
        (Value::NodeSet(ns), other) => ns
            .iter()
            .any(|n| cmp(string_to_number(&n.string_value()), other.number())),
        (other, Value::NodeSet(ns)) => ns
            .iter()
            .any(|n| cmp(other.number(), string_to_number(&n.string_value()))),
        _ => cmp(left.number(), right.number()),
    }
}

fn evaluate_path(path: &LocationPath, ctx: &EvalContext) -> Result<Vec<Node>> {
    let initial = if let Some(start) = &path.start {
        let mut nodes = evaluate(start, ctx)?.into_node_set()?;
        sort_document_order(&mut nodes);
        nodes
    } else if path.absolute {
        vec![ctx.node.document().root()]
    } else {
        vec![ctx.node.clone()]
    };

    let mut current = initial;
    for step in &path.steps {
        current = evaluate_step(step, &current, ctx)?;
    }
    Ok(current)
}

/// One location step: for each context node, walk the axis, filter by node
/// test, then filter by predicates with positions local to that axis result.
/// The merged set comes out deduplicated in document order.
fn evaluate_step(step: &Step, context_nodes: &[Node], ctx: &EvalContext) -> Result<Vec<Node>> {
    let mut result = Vec::new();
    for cn in context_nodes {
        let mut candidates: Vec<Node> = axis_nodes(step.axis, cn)
            .into_iter()
            .filter(|n| matches_node_test(n, &step.node_test, step.axis, ctx))
            .collect();
        for predicate in &step.predicates {
            candidates = apply_predicate(predicate, candidates, ctx)?;
        }
        result.extend(candidates);
    }
    sort_document_order(&mut result);
    Ok(result)
}

fn apply_predicate(predicate: &Expression, nodes: Vec<Node>, ctx: &EvalContext) -> Result<Vec<Node>> {
    let size = nodes.len();
    let mut kept = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let sub = ctx.at(node.clone(), i + 1, size);
        let value = evaluate(predicate, &sub)?;
        let keep = match value {
            Value::Number(n) => n == (i + 1) as f64,
            other => other.boolean(),
        };
        if keep {
            kept.push(node.clone());
        }
    }
    Ok(kept)
}

fn preorder(node: &Node, out: &mut Vec<Node>) {
    for child in node.children() {
        out.push(child.clone());
        preorder(&child, out);
    }
}

fn axis_nodes(axis: Axis, node: &Node) -> Vec<Node> {
    match axis {
        Axis::Child => node.children(),
        Axis::Attribute => node.attributes(),
        Axis::SelfAxis => vec![node.clone()],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => {
            let mut out = Vec::new();
            let mut cur = node.parent();
            while let Some(p) = cur {
                cur = p.parent();
                out.push(p);
            }
            out
        }
        Axis::AncestorOrSelf => {
            let mut out = vec![node.clone()];
            out.extend(axis_nodes(Axis::Ancestor, node));
            out
        }
        Axis::Descendant => {
            let mut out = Vec::new();
            preorder(node, &mut out);
            out
        }
        Axis::DescendantOrSelf => {
            let mut out = vec![node.clone()];
            preorder(node, &mut out);
            out
        }
        Axis::FollowingSibling => {
            let mut out = Vec::new();
            let mut cur = node.next_sibling();
            while let Some(s) = cur {
                cur = s.next_sibling();
                out.push(s);
            }
            out
        }
        Axis::PrecedingSibling => {
            let mut out = Vec::new();
            let mut cur = node.previous_sibling();
            while let Some(s) = cur {
                cur = s.previous_sibling();
                out.push(s);
            }
            out
        }
        Axis::Following => {
            let mut out = Vec::new();
            let mut cur = Some(node.clone());
            while let Some(n) = cur {
                let mut sib = n.next_sibling();
                while let Some(s) = sib {
                    out.push(s.clone());
                    preorder(&s, &mut out);
                    sib = s.next_sibling();
                }
                cur = n.parent();
            }
            out
        }
        Axis::Preceding => {
            let mut out = Vec::new();
            let mut cur = Some(node.clone());
            while let Some(n) = cur {
                let mut sib = n.previous_sibling();
                while let Some(s) = sib {
                    let mut subtree = vec![s.clone()];
                    preorder(&s, &mut subtree);
                    subtree.reverse();
                    out.extend(subtree);
                    sib = s.previous_sibling();
                }
                cur = n.parent();
            }
            out
        }
    }
}

fn matches_node_test(node: &Node, test: &NodeTest, axis: Axis, ctx: &EvalContext) -> bool {
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };
    match test {
        NodeTest::Wildcard => node.node_type() == principal,
        NodeTest::NsWildcard(prefix) => {
            node.node_type() == principal && matches_prefix(node, Some(prefix), ctx)
        }
        NodeTest::Name { prefix, local } => {
            node.node_type() == principal
                && node.local_name() == *local
                && matches_prefix(node, prefix.as_deref(), ctx)
        }
        NodeTest::Text => matches!(node.node_type(), NodeType::Text | NodeType::Cdata),
        NodeTest::Comment => node.node_type() == NodeType::Comment,
        NodeTest::Node => true,
        NodeTest::Pi(target) => {
            node.node_type() == NodeType::ProcessingInstruction
                && target.as_ref().is_none_or(|t| node.local_name() == *t)
        }
    }
}

/// An unprefixed name test selects the null namespace; a prefixed one selects
/// the URI the prefix resolves to in the expression's scope.
fn matches_prefix(node: &Node, prefix: Option<&str>, ctx: &EvalContext) -> bool {
    match prefix {
        None => node.namespace().is_empty(),
        Some(p) => match ctx.resolver.namespace(p) {
            Some(uri) => node.namespace() == uri,
            None => {
                warn!("unresolved namespace prefix '{}' in expression", p);
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;
    use crate::xpath::parse_expression;

    fn eval(doc_xml: &str, expr: &str) -> Value {
        let doc = parse_str(doc_xml, None).unwrap();
        let compiled = parse_expression(expr).unwrap();
        let ctx = EvalContext::new(doc.root(), &NullResolver);
        evaluate(&compiled, &ctx).unwrap()
    }

    const DOC: &str = r#"<root><para id="p1">Hello</para><div/><para>World</para></root>"#;

    #[test]
    fn selects_by_name_and_position() {
        let v = eval(DOC, "root/para");
        match v {
            Value::NodeSet(ns) => assert_eq!(ns.len(), 2),
            other => panic!("expected node-set, got {:?}", other),
        }
        assert_eq!(eval(DOC, "string(root/para[2])").string(), "World");
        assert_eq!(eval(DOC, "string(root/para[last()])").string(), "World");
    }

    #[test]
    fn attribute_and_predicate() {
        assert_eq!(eval(DOC, "string(root/para[@id='p1'])").string(), "Hello");
        assert_eq!(eval(DOC, "count(root/para[@id])").number(), 1.0);
    }

    #[test]
    fn descendant_shorthand() {
        assert_eq!(eval(DOC, "count(//para)").number(), 2.0);
        assert_eq!(eval(DOC, "string(//para[1])").string(), "Hello");
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(eval(DOC, "1 + 2 * 3").number(), 7.0);
        assert_eq!(eval(DOC, "(1 + 2) * 3").number(), 9.0);
        assert_eq!(eval(DOC, "10 mod 3").number(), 1.0);
        assert!(eval(DOC, "count(//para) = 2").boolean());
        assert!(eval(DOC, "count(//para) < 3").boolean());
        assert_eq!(eval(DOC, "-count(//para)").number(), -2.0);
    }

    #[test]
    fn union_in_document_order() {
        let v = eval(DOC, "root/div | root/para");
        match v {
            Value::NodeSet(ns) => {
                let names: Vec<String> = ns.iter().map(|n| n.name()).collect();
                assert_eq!(names, vec!["para", "div", "para"]);
            }
            other => panic!("expected node-set, got {:?}", other),
        }
    }

    #[test]
    fn existential_nodeset_comparison() {
        // One of the two para elements equals "World".
        assert!(eval(DOC, "root/para = 'World'").boolean());
        // != is existential too, not a negation.
        assert!(eval(DOC, "root/para != 'World'").boolean());
        assert!(!eval(DOC, "root/missing = 'World'").boolean());
    }

    #[test]
    fn reverse_axes() {
        assert_eq!(
            eval(DOC, "string(root/para[2]/preceding-sibling::*[1])").string(),
            ""
        );
        assert_eq!(
            eval(DOC, "name(root/para[2]/preceding-sibling::*[1])").string(),
            "div"
        );
        assert_eq!(
            eval(DOC, "name(root/div/following-sibling::*[1])").string(),
            "para"
        );
        assert_eq!(eval(DOC, "count(root/para[1]/ancestor::*)").number(), 1.0);
    }

    #[test]
    fn self_and_parent_abbreviations() {
        assert_eq!(eval(DOC, "count(root/.)").number(), 1.0);
        assert_eq!(eval(DOC, "name(root/div/..)").string(), "root");
    }

    #[test]
    fn undefined_variable_errors() {
        let doc = parse_str(DOC, None).unwrap();
        let compiled = parse_expression("$nope").unwrap();
        let ctx = EvalContext::new(doc.root(), &NullResolver);
        assert!(evaluate(&compiled, &ctx).is_err());
    }
}
