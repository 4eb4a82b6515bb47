//! Attribute value templates: `text{expr}text`.
//!
//! Compiled once at stylesheet-compile time; `{{` and `}}` are literal
//! braces, and braces inside quoted substrings of an expression do not
//! terminate it.

use super::context::ExecutionContext;
use crate::dom::Node;
use crate::error::Result;
use crate::xpath::{self, Expression};

#[derive(Debug)]
pub enum AvtPart {
    Literal(String),
    Expr(Expression),
}

/// A compiled attribute value template.
#[derive(Debug)]
pub struct Avt {
    parts: Vec<AvtPart>,
}

impl Avt {
    /// Compiles an attribute value, splitting out `{…}` expressions.
    pub fn compile(input: &str) -> Result<Avt> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if chars.peek() == Some(&'{') {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    if !literal.is_empty() {
                        parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                    }
                    let mut expr = String::new();
                    let mut in_single = false;
                    let mut in_double = false;
                    for e in chars.by_ref() {
                        match e {
                            '\'' if !in_double => in_single = !in_single,
                            '"' if !in_single => in_double = !in_double,
                            '}' if !in_single && !in_double => break,
                            _ => {}
                        }
                        expr.push(e);
                    }
                    parts.push(AvtPart::Expr(xpath::parse_expression(&expr)?));
                }
                '}' => {
                    if chars.peek() == Some(&'}') {
                        chars.next();
                    }
                    literal.push('}');
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(AvtPart::Literal(literal));
        }
        Ok(Avt { parts })
    }

    /// True when the value is a single literal with no substitutions.
    pub fn is_literal(&self) -> bool {
        self.parts.len() <= 1 && matches!(self.parts.first(), None | Some(AvtPart::Literal(_)))
    }

    /// Evaluates against the current input node. Node-set results
    /// concatenate the string values of every node.
    pub fn evaluate(&self, node: &Node, ctx: &ExecutionContext) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                AvtPart::Literal(s) => out.push_str(s),
                AvtPart::Expr(expr) => {
                    let value = ctx.eval_compiled(expr, node)?;
                    match value {
                        crate::xpath::Value::NodeSet(nodes) => {
                            for n in nodes {
                                out.push_str(&n.string_value());
                            }
                        }
                        other => out.push_str(&other.string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal_parts(avt: &Avt) -> Vec<String> {
        avt.parts
            .iter()
            .map(|p| match p {
                AvtPart::Literal(s) => format!("lit:{}", s),
                AvtPart::Expr(_) => "expr".to_string(),
            })
            .collect()
    }

    #[test]
    fn splits_literals_and_expressions() {
        let avt = Avt::compile("hi-{$p}-bye").unwrap();
        assert_eq!(literal_parts(&avt), vec!["lit:hi-", "expr", "lit:-bye"]);
    }

    #[test]
    fn doubled_braces_are_literal() {
        let avt = Avt::compile("a{{b}}c").unwrap();
        assert_eq!(literal_parts(&avt), vec!["lit:a{b}c"]);
        assert!(avt.is_literal());
    }

    #[test]
    fn braces_inside_quotes_do_not_close() {
        // the } inside the string literal belongs to the expression
        let avt = Avt::compile("{concat('}', 'x')}").unwrap();
        assert_eq!(literal_parts(&avt), vec!["expr"]);
    }

    #[test]
    fn malformed_expression_is_an_error() {
        assert!(Avt::compile("{1 +}").is_err());
    }
}
