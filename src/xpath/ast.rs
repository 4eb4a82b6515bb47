//! The abstract syntax tree for XPath 1.0 expressions.

/// A compiled expression, ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(String),
    Number(f64),
    /// A variable reference, `$name` (qualified name kept lexical).
    Variable(String),
    FunctionCall {
        prefix: Option<String>,
        name: String,
        args: Vec<Expression>,
    },
    Unary {
        expr: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// A primary expression filtered by predicates, e.g. `key('k','v')[1]`.
    Filter {
        base: Box<Expression>,
        predicates: Vec<Expression>,
    },
    Path(LocationPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Union,
}

/// A location path: optional starting expression (for `$var/item` and the
/// like), absolute flag, and a list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub start: Option<Box<Expression>>,
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expression>,
}

impl Step {
    /// The `//` shorthand expands to this step.
    pub fn descendant_or_self_node() -> Step {
        Step {
            axis: Axis::DescendantOrSelf,
            node_test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// Axes are produced in axis order: the reverse axes (ancestor, preceding,
/// preceding-sibling) yield nearest-first, which is what predicate positions
/// count over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `*`
    Wildcard,
    /// `prefix:*`
    NsWildcard(String),
    /// `name` or `prefix:name`
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `node()`
    Node,
    /// `processing-instruction()` with optional target literal.
    Pi(Option<String>),
}
