//! The XPath 1.0 core function library.

use super::engine::{sort_document_order, EvalContext};
use super::value::{string_to_number, Value};
use crate::dom::Node;
use crate::error::{Error, Result};

const CORE_FUNCTIONS: &[&str] = &[
    "last",
    "position",
    "count",
    "id",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "lang",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// True for names in the core library (always unprefixed).
pub fn is_core_function(name: &str) -> bool {
    CORE_FUNCTIONS.contains(&name)
}

/// Calls a core function. The caller has checked [`is_core_function`].
pub fn call_core(name: &str, args: Vec<Value>, ctx: &EvalContext) -> Result<Value> {
    match name {
        "last" => Ok(Value::Number(ctx.size as f64)),
        "position" => Ok(Value::Number(ctx.position as f64)),
        "count" => {
            let nodes = one_arg(name, args)?.into_node_set()?;
            Ok(Value::Number(nodes.len() as f64))
        }
        "id" => {
            let arg = one_arg(name, args)?;
            let mut tokens = Vec::new();
            match &arg {
                Value::NodeSet(nodes) => {
                    for node in nodes {
                        tokens.extend(
                            node.string_value()
                                .split_whitespace()
                                .map(str::to_string)
                                .collect::<Vec<_>>(),
                        );
                    }
                }
                other => tokens.extend(other.string().split_whitespace().map(str::to_string)),
            }
            let doc = ctx.node.document();
            let mut found: Vec<Node> = tokens
                .iter()
                .filter_map(|id| doc.element_by_id(id))
                .collect();
            sort_document_order(&mut found);
            Ok(Value::NodeSet(found))
        }
        "local-name" => Ok(Value::String(
            name_target(args, ctx)?.map(|n| n.local_name()).unwrap_or_default(),
        )),
        "namespace-uri" => Ok(Value::String(
            name_target(args, ctx)?.map(|n| n.namespace()).unwrap_or_default(),
        )),
        "name" => Ok(Value::String(
            name_target(args, ctx)?.map(|n| n.name()).unwrap_or_default(),
        )),
        "string" => Ok(Value::String(match args.into_iter().next() {
            Some(v) => v.string(),
            None => ctx.node.string_value(),
        })),
        "concat" => {
            if args.len() < 2 {
                return Err(Error::Evaluation(
                    "concat() requires at least two arguments".to_string(),
                ));
            }
            Ok(Value::String(
                args.iter().map(|a| a.string()).collect::<String>(),
            ))
        }
        "starts-with" => {
            let (a, b) = two_strings(name, args)?;
            Ok(Value::Boolean(a.starts_with(&b)))
        }
        "contains" => {
            let (a, b) = two_strings(name, args)?;
            Ok(Value::Boolean(a.contains(&b)))
        }
        "substring-before" => {
            let (a, b) = two_strings(name, args)?;
            Ok(Value::String(
                a.find(&b).map(|i| a[..i].to_string()).unwrap_or_default(),
            ))
        }
        "substring-after" => {
            let (a, b) = two_strings(name, args)?;
            Ok(Value::String(
                a.find(&b)
                    .map(|i| a[i + b.len()..].to_string())
                    .unwrap_or_default(),
            ))
        }
        "substring" => substring(args),
        "string-length" => {
            let s = match args.into_iter().next() {
                Some(v) => v.string(),
                None => ctx.node.string_value(),
            };
            Ok(Value::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            let s = match args.into_iter().next() {
                Some(v) => v.string(),
                None => ctx.node.string_value(),
            };
            Ok(Value::String(
                s.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => {
            let mut it = args.into_iter();
            let (s, from, to) = match (it.next(), it.next(), it.next()) {
                (Some(s), Some(f), Some(t)) => (s.string(), f.string(), t.string()),
                _ => {
                    return Err(Error::Evaluation(
                        "translate() requires three arguments".to_string(),
                    ))
                }
            };
            let from: Vec<char> = from.chars().collect();
            let to: Vec<char> = to.chars().collect();
            let out: String = s
                .chars()
                .filter_map(|c| match from.iter().position(|&f| f == c) {
                    Some(i) => to.get(i).copied(),
                    None => Some(c),
                })
                .collect();
            Ok(Value::String(out))
        }
        "boolean" => Ok(Value::Boolean(one_arg(name, args)?.boolean())),
        "not" => Ok(Value::Boolean(!one_arg(name, args)?.boolean())),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        "lang" => {
            let wanted = one_arg(name, args)?.string().to_ascii_lowercase();
            let mut cur = Some(ctx.node.clone());
            let mut lang = None;
            while let Some(node) = cur {
                if let Some(l) = node.attribute("xml:lang") {
                    lang = Some(l.to_ascii_lowercase());
                    break;
                }
                cur = node.parent();
            }
            Ok(Value::Boolean(match lang {
                Some(l) => l == wanted || l.starts_with(&format!("{}-", wanted)),
                None => false,
            }))
        }
        "number" => Ok(Value::Number(match args.into_iter().next() {
            Some(v) => v.number(),
            None => string_to_number(&ctx.node.string_value()),
        })),
        "sum" => {
            let nodes = one_arg(name, args)?.into_node_set()?;
            Ok(Value::Number(
                nodes
                    .iter()
                    .map(|n| string_to_number(&n.string_value()))
                    .sum(),
            ))
        }
        "floor" => Ok(Value::Number(one_arg(name, args)?.number().floor())),
        "ceiling" => Ok(Value::Number(one_arg(name, args)?.number().ceil())),
        "round" => {
            let n = one_arg(name, args)?.number();
            Ok(Value::Number(if n.is_nan() { n } else { (n + 0.5).floor() }))
        }
        other => Err(Error::Evaluation(format!("unknown function '{}'", other))),
    }
}

fn one_arg(name: &str, args: Vec<Value>) -> Result<Value> {
    let mut it = args.into_iter();
    match (it.next(), it.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(Error::Evaluation(format!(
            "{}() requires exactly one argument",
            name
        ))),
    }
}

fn two_strings(name: &str, args: Vec<Value>) -> Result<(String, String)> {
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok((a.string(), b.string())),
        _ => Err(Error::Evaluation(format!(
            "{}() requires exactly two arguments",
            name
        ))),
    }
}

/// The first node of the argument node-set, or the context node when called
/// without arguments. Used by name(), local-name(), namespace-uri().
fn name_target(args: Vec<Value>, ctx: &EvalContext) -> Result<Option<Node>> {
    match args.into_iter().next() {
        None => Ok(Some(ctx.node.clone())),
        Some(v) => {
            let mut nodes = v.into_node_set()?;
            sort_document_order(&mut nodes);
            Ok(nodes.into_iter().next())
        }
    }
}

/// substring() with the XPath rounding rules: positions are 1-based, the
/// start and length round half-up, and NaN bounds select nothing.
fn substring(args: Vec<Value>) -> Result<Value> {
    let mut it = args.into_iter();
    let (s, start) = match (it.next(), it.next()) {
        (Some(s), Some(b)) => (s.string(), b.number()),
        _ => {
            return Err(Error::Evaluation(
                "substring() requires two or three arguments".to_string(),
            ))
        }
    };
    let begin = (start + 0.5).floor();
    let end = match it.next() {
        Some(len) => begin + (len.number() + 0.5).floor(),
        None => f64::INFINITY,
    };
    let out: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i + 1) as f64;
            pos >= begin && pos < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;
    use crate::xpath::engine::NullResolver;
    use crate::xpath::{evaluate, parse_expression};

    fn eval(expr: &str) -> Value {
        let doc = parse_str("<r xml:lang=\"en-GB\"><a>3</a><a>4</a></r>", None).unwrap();
        let compiled = parse_expression(expr).unwrap();
        let ctx = EvalContext::new(doc.root(), &NullResolver);
        evaluate(&compiled, &ctx).unwrap()
    }

    #[test]
    fn string_functions() {
        assert_eq!(eval("concat('a', 'b', 'c')").string(), "abc");
        assert!(eval("starts-with('abcd', 'ab')").boolean());
        assert!(eval("contains('abcd', 'bc')").boolean());
        assert_eq!(eval("substring-before('1999/04', '/')").string(), "1999");
        assert_eq!(eval("substring-after('1999/04', '/')").string(), "04");
        assert_eq!(eval("normalize-space('  a  b ')").string(), "a b");
        assert_eq!(eval("translate('bar', 'abc', 'ABC')").string(), "BAr");
        assert_eq!(eval("translate('-aaa-', '-', '')").string(), "aaa");
        assert_eq!(eval("string-length('héllo')").number(), 5.0);
    }

    #[test]
    fn substring_rounding() {
        assert_eq!(eval("substring('12345', 2, 3)").string(), "234");
        assert_eq!(eval("substring('12345', 1.5, 2.6)").string(), "234");
        assert_eq!(eval("substring('12345', 0, 3)").string(), "12");
        assert_eq!(eval("substring('12345', 2)").string(), "2345");
        assert_eq!(eval("substring('12345', 0 div 0, 3)").string(), "");
    }

    #[test]
    fn numeric_functions() {
        assert_eq!(eval("floor(2.6)").number(), 2.0);
        assert_eq!(eval("ceiling(2.2)").number(), 3.0);
        assert_eq!(eval("round(2.5)").number(), 3.0);
        assert_eq!(eval("round(-2.5)").number(), -2.0);
        assert_eq!(eval("sum(r/a)").number(), 7.0);
    }

    #[test]
    fn lang_matches_subtags() {
        let doc = parse_str("<r xml:lang=\"en-GB\"><a>x</a></r>", None).unwrap();
        let inner = doc.root_element().unwrap().children()[0].clone();
        let ctx = EvalContext::new(inner, &NullResolver);
        let check = |expr: &str| {
            evaluate(&parse_expression(expr).unwrap(), &ctx)
                .unwrap()
                .boolean()
        };
        assert!(check("lang('en')"));
        assert!(check("lang('en-gb')"));
        assert!(!check("lang('de')"));
    }

    #[test]
    fn name_family() {
        assert_eq!(eval("name(r/a)").string(), "a");
        assert_eq!(eval("local-name(r/a)").string(), "a");
        assert_eq!(eval("namespace-uri(r/a)").string(), "");
    }
}
