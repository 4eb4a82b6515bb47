//! A `nom`-based parser for the XPath 1.0 expression grammar.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{anychar, char, digit0, digit1, multispace0};
use nom::combinator::{map, opt, recognize, value, verify};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};

use super::ast::*;
use crate::error::{Error, Result};

/// Compiles an expression string into an AST.
pub fn parse_expression(input: &str) -> Result<Expression> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(Error::XPathParse {
            expr: input.to_string(),
            message: format!("unconsumed input: '{}'", rem),
        }),
        Err(e) => Err(Error::XPathParse {
            expr: input.to_string(),
            message: e.to_string(),
        }),
    }
}

// --- Combinators & helpers ---

fn ws<'a, F, O>(
    inner: F,
) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        verify(anychar, |c| c.is_alphabetic() || *c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '.'),
    ))
    .parse(input)
}

/// A lexical QName split into (prefix, local). Does not consume the `::` of
/// an axis specifier.
fn qname(input: &str) -> IResult<&str, (Option<String>, String)> {
    let (i, first) = ncname(input)?;
    let (i, second) = opt(preceded(
        verify(char(':'), |_| !i.starts_with("::")),
        ncname,
    ))
    .parse(i)?;
    Ok((
        i,
        match second {
            Some(local) => (Some(first.to_string()), local.to_string()),
            None => (None, first.to_string()),
        },
    ))
}

fn literal_string(input: &str) -> IResult<&str, String> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))
    .parse(input)
    .map(|(i, s): (&str, &str)| (i, s.to_string()))
}

// --- Expression parsers, loosest precedence first ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Or, tag("or")).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::And, tag("and")).parse(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::NotEquals, tag("!=")),
        value(BinaryOperator::Equals, tag("=")),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::LessThanOrEqual, tag("<=")),
        value(BinaryOperator::GreaterThanOrEqual, tag(">=")),
        value(BinaryOperator::LessThan, tag("<")),
        value(BinaryOperator::GreaterThan, tag(">")),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Plus, char('+')),
        value(BinaryOperator::Minus, char('-')),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::Multiply, char('*')),
        value(BinaryOperator::Divide, tag("div")),
        value(BinaryOperator::Modulo, tag("mod")),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    value(BinaryOperator::Union, char('|')).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, neg) = opt(ws(char('-'))).parse(input)?;
    let (i, expr) = union_expr(i)?;
    if neg.is_some() {
        Ok((
            i,
            Expression::Unary {
                expr: Box::new(expr),
            },
        ))
    } else {
        Ok((i, expr))
    }
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(path_expr, union_op)(input)
}

/// Handles the ambiguity between location paths and primary expressions that
/// may be followed by a path (`$var/item`, `key('k','v')/@id`).
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first: `position()` must parse as a function
    // call, not as a step named `position` with trailing garbage.
    let (i, base) = alt((filter_expr, map(location_path, Expression::Path))).parse(input)?;
    let (i, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;

    if continuation.is_empty() {
        return Ok((i, base));
    }

    let (start, absolute, mut steps) = match base {
        Expression::Path(lp) => (lp.start, lp.absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };
    for (sep, next) in continuation {
        if sep == "//" {
            steps.push(Step::descendant_or_self_node());
        }
        steps.push(next);
    }
    Ok((i, Expression::Path(LocationPath { start, absolute, steps })))
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, base) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        if predicates.is_empty() {
            base
        } else {
            Expression::Filter {
                base: Box::new(base),
                predicates,
            }
        },
    ))
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(char('$'), qname), |(prefix, local)| {
            Expression::Variable(match prefix {
                Some(p) => format!("{}:{}", p, local),
                None => local,
            })
        }),
        map(literal_string, Expression::Literal),
        number_expr,
        delimited(ws(char('(')), expression, ws(char(')'))),
        function_call,
    ))
    .parse(input)
}

fn number_expr(input: &str) -> IResult<&str, Expression> {
    map(
        recognize(alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        ))),
        |s: &str| Expression::Number(s.parse().unwrap_or(f64::NAN)),
    )
    .parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (i, (prefix, name)) = qname(input)?;
    // Node-type tests look like calls but belong to location paths.
    if prefix.is_none()
        && matches!(
            name.as_str(),
            "comment" | "text" | "node" | "processing-instruction"
        )
    {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (i, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )
    .parse(i)?;
    Ok((i, Expression::FunctionCall { prefix, name, args }))
}

// --- Location paths ---

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    alt((
        map(preceded(tag("//"), relative_steps), |mut steps| {
            steps.insert(0, Step::descendant_or_self_node());
            LocationPath {
                start: None,
                absolute: true,
                steps,
            }
        }),
        map(
            preceded(char('/'), opt(relative_steps)),
            |steps| LocationPath {
                start: None,
                absolute: true,
                steps: steps.unwrap_or_default(),
            },
        ),
        map(relative_steps, |steps| LocationPath {
            start: None,
            absolute: false,
            steps,
        }),
    ))
    .parse(input)
}

fn relative_steps(input: &str) -> IResult<&str, Vec<Step>> {
    let (i, first) = step(input)?;
    let (i, rest) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    let mut steps = vec![first];
    for (sep, next) in rest {
        if sep == "//" {
            steps.push(Step::descendant_or_self_node());
        }
        steps.push(next);
    }
    Ok((i, steps))
}

fn step(input: &str) -> IResult<&str, Step> {
    alt((
        value(
            Step {
                axis: Axis::Parent,
                node_test: NodeTest::Node,
                predicates: vec![],
            },
            tag(".."),
        ),
        value(
            Step {
                axis: Axis::SelfAxis,
                node_test: NodeTest::Node,
                predicates: vec![],
            },
            char('.'),
        ),
        map(
            (axis_specifier, node_test, many0(predicate)),
            |(axis, node_test, predicates)| Step {
                axis,
                node_test,
                predicates,
            },
        ),
        map(
            (preceded(char('@'), node_test), many0(predicate)),
            |(node_test, predicates)| Step {
                axis: Axis::Attribute,
                node_test,
                predicates,
            },
        ),
        map(
            (node_test, many0(predicate)),
            |(node_test, predicates)| Step {
                axis: Axis::Child,
                node_test,
                predicates,
            },
        ),
    ))
    .parse(input)
}

fn axis_specifier(input: &str) -> IResult<&str, Axis> {
    terminated(
        alt((
            value(Axis::AncestorOrSelf, tag("ancestor-or-self")),
            value(Axis::Ancestor, tag("ancestor")),
            value(Axis::Attribute, tag("attribute")),
            value(Axis::Child, tag("child")),
            value(Axis::DescendantOrSelf, tag("descendant-or-self")),
            value(Axis::Descendant, tag("descendant")),
            value(Axis::FollowingSibling, tag("following-sibling")),
            value(Axis::Following, tag("following")),
            value(Axis::Parent, tag("parent")),
            value(Axis::PrecedingSibling, tag("preceding-sibling")),
            value(Axis::Preceding, tag("preceding")),
            value(Axis::SelfAxis, tag("self")),
        )),
        tag("::"),
    )
    .parse(input)
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(
            preceded(
                tag("processing-instruction"),
                delimited(ws(char('(')), opt(literal_string), char(')')),
            ),
            NodeTest::Pi,
        ),
        value(NodeTest::Comment, pair(tag("comment"), empty_parens)),
        value(NodeTest::Text, pair(tag("text"), empty_parens)),
        value(NodeTest::Node, pair(tag("node"), empty_parens)),
        map(terminated(ncname, tag(":*")), |p| {
            NodeTest::NsWildcard(p.to_string())
        }),
        value(NodeTest::Wildcard, char('*')),
        map(qname, |(prefix, local)| NodeTest::Name { prefix, local }),
    ))
    .parse(input)
}

fn empty_parens(input: &str) -> IResult<&str, ()> {
    value((), (char('('), multispace0, char(')'))).parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_paths() {
        assert!(parse_expression("foo").is_ok());
        assert!(parse_expression("foo/bar").is_ok());
        assert!(parse_expression("/").is_ok());
        assert!(parse_expression("//item").is_ok());
        assert!(parse_expression("@id").is_ok());
        assert!(parse_expression("../sibling").is_ok());
        assert!(parse_expression(".").is_ok());
        assert!(parse_expression("text()").is_ok());
        assert!(parse_expression("ancestor-or-self::div").is_ok());
    }

    #[test]
    fn parses_expressions() {
        assert!(parse_expression("1 + 2 * 3").is_ok());
        assert!(parse_expression("position() = last()").is_ok());
        assert!(parse_expression("@a = 'x' or @b != \"y\"").is_ok());
        assert!(parse_expression("-price div 2").is_ok());
        assert!(parse_expression("a | b | c").is_ok());
        assert!(parse_expression("not(@done)").is_ok());
    }

    #[test]
    fn parses_filter_with_trailing_path() {
        let expr = parse_expression("$set/item[1]/@name").unwrap();
        match expr {
            Expression::Path(lp) => {
                assert!(lp.start.is_some());
                assert_eq!(lp.steps.len(), 2);
                assert_eq!(lp.steps[1].axis, Axis::Attribute);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn double_slash_expands() {
        let expr = parse_expression("a//b").unwrap();
        match expr {
            Expression::Path(lp) => {
                assert_eq!(lp.steps.len(), 3);
                assert_eq!(lp.steps[1].axis, Axis::DescendantOrSelf);
                assert_eq!(lp.steps[1].node_test, NodeTest::Node);
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn function_call_beats_step_name() {
        let expr = parse_expression("position()").unwrap();
        assert!(matches!(expr, Expression::FunctionCall { .. }));
        // ...but node-type tests stay steps.
        let expr = parse_expression("node()").unwrap();
        assert!(matches!(expr, Expression::Path(_)));
    }

    #[test]
    fn ns_wildcard_and_prefixed_names() {
        let expr = parse_expression("fo:*").unwrap();
        match expr {
            Expression::Path(lp) => {
                assert_eq!(lp.steps[0].node_test, NodeTest::NsWildcard("fo".into()));
            }
            other => panic!("expected a path, got {:?}", other),
        }
        let expr = parse_expression("fo:block").unwrap();
        match expr {
            Expression::Path(lp) => {
                assert_eq!(
                    lp.steps[0].node_test,
                    NodeTest::Name {
                        prefix: Some("fo".into()),
                        local: "block".into()
                    }
                );
            }
            other => panic!("expected a path, got {:?}", other),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_expression("foo)").is_err());
        assert!(parse_expression("").is_err());
    }
}
