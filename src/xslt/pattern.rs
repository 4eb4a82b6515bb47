//! Compiling and evaluating XSLT `match` patterns.
//!
//! Patterns are lexed by a small state machine into a list of steps stored in
//! **reverse** order: step 0 is the rightmost node test of the written
//! pattern, and the list is terminated by `End`. Matching walks the steps
//! left to right while a cursor climbs from the candidate node toward the
//! root, which makes the common case (a plain name test) a single comparison.

use log::debug;

use super::context::ExecutionContext;
use super::template::TemplateId;
use crate::dom::{Node, NodeType};
use crate::xpath::{self, evaluate, EvalContext, NullResolver, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    End,
    Root,
    Elem,
    Attr,
    Parent,
    Ancestor,
    Id,
    Key,
    Ns,
    All,
    Pi,
    Comment,
    Text,
    Node,
    Predicate,
    Or,
    Error,
}

/// One step of a compiled pattern.
#[derive(Debug, Clone)]
pub struct MatchStep {
    pub op: StepOp,
    pub value: String,
}

/// One alternative of a match pattern, bound to the template that declared
/// it. A written pattern with `|` compiles to several of these.
#[derive(Debug, Clone)]
pub struct CompiledMatch {
    pub pattern: String,
    pub steps: Vec<MatchStep>,
    pub template: Option<TemplateId>,
    /// Mode of the owning template; matching fails under any other mode.
    pub mode: String,
    /// Explicit or default priority of this alternative.
    pub priority: f64,
    /// Declaration sequence number; later declarations win priority ties.
    pub order: usize,
    /// Stylesheet node whose in-scope namespaces resolve `Ns` steps.
    pub scope: Option<Node>,
}

// --- Lexer ---

struct StateFn(fn(&mut Lexer) -> Option<StateFn>);

struct Lexer<'a> {
    input: &'a str,
    start: usize,
    pos: usize,
    width: usize,
    steps: Vec<MatchStep>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input,
            start: 0,
            pos: 0,
            width: 0,
            steps: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<MatchStep> {
        let mut state = StateFn(lex_node_test);
        loop {
            match (state.0)(&mut self) {
                Some(next) => state = next,
                None => break,
            }
        }
        self.steps
    }

    fn next_char(&mut self) -> Option<char> {
        match self.input[self.pos..].chars().next() {
            Some(c) => {
                self.width = c.len_utf8();
                self.pos += self.width;
                Some(c)
            }
            None => {
                self.width = 0;
                None
            }
        }
    }

    fn backup(&mut self) {
        self.pos -= self.width;
    }

    fn peek(&mut self) -> Option<char> {
        let c = self.next_char();
        if c.is_some() {
            self.backup();
        }
        c
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn emit(&mut self, op: StepOp) {
        self.steps.push(MatchStep {
            op,
            value: self.input[self.start..self.pos].to_string(),
        });
        self.start = self.pos;
    }

    fn emit_value(&mut self, op: StepOp, value: &str) {
        self.steps.push(MatchStep {
            op,
            value: value.to_string(),
        });
        self.start = self.pos;
    }

    fn pending(&self) -> bool {
        self.pos > self.start
    }
}

fn lex_node_test(l: &mut Lexer) -> Option<StateFn> {
    let mut attr = false;
    loop {
        let r = match l.next_char() {
            Some(r) => r,
            None => break,
        };
        match r {
            '/' => {
                l.backup();
                if l.pending() {
                    l.emit(if attr { StepOp::Attr } else { StepOp::Elem });
                }
                return Some(StateFn(lex_parent));
            }
            '(' => {
                l.backup();
                return Some(StateFn(if attr { lex_attr_node_test } else { lex_function_call }));
            }
            '[' => {
                l.backup();
                if l.pending() {
                    l.emit(if attr { StepOp::Attr } else { StepOp::Elem });
                }
                return Some(StateFn(lex_predicate));
            }
            '@' => {
                l.ignore();
                attr = true;
            }
            '*' => {
                if attr {
                    l.emit(StepOp::Attr);
                } else {
                    l.emit(StepOp::All);
                }
            }
            ':' => {
                if l.peek() == Some(':') {
                    // Axis specifier; only child:: and attribute:: are legal
                    // in a pattern.
                    let _ = l.next_char();
                    let axis_name = &l.input[l.start..l.pos];
                    if axis_name == "attribute::" {
                        attr = true;
                    }
                    l.ignore();
                } else {
                    l.backup();
                    l.emit(StepOp::Ns);
                    let _ = l.next_char();
                    l.ignore();
                }
            }
            '|' => {
                l.backup();
                if l.pending() {
                    l.emit(if attr { StepOp::Attr } else { StepOp::Elem });
                }
                let _ = l.next_char();
                l.emit_value(StepOp::Or, "|");
                return Some(StateFn(lex_node_test));
            }
            _ => {}
        }
    }
    if l.pending() {
        l.emit(if attr { StepOp::Attr } else { StepOp::Elem });
    }
    None
}

fn lex_function_call(l: &mut Lexer) -> Option<StateFn> {
    let op = match &l.input[l.start..l.pos] {
        "comment" => StepOp::Comment,
        "text" => StepOp::Text,
        "node" => StepOp::Node,
        "id" => StepOp::Id,
        "key" => StepOp::Key,
        "processing-instruction" => StepOp::Pi,
        _ => StepOp::Error,
    };
    l.ignore();
    consume_call_args(l, op, None);
    Some(StateFn(lex_node_test))
}

/// `@node()` is the one node test allowed after the attribute axis; it is
/// equivalent to `@*`.
fn lex_attr_node_test(l: &mut Lexer) -> Option<StateFn> {
    let op = match &l.input[l.start..l.pos] {
        "node" => StepOp::Attr,
        _ => StepOp::Error,
    };
    l.ignore();
    consume_call_args(l, op, Some("*"));
    Some(StateFn(lex_node_test))
}

/// Consumes a balanced `( … )` group and emits `op` carrying the inner text
/// (or `fixed` when given).
fn consume_call_args(l: &mut Lexer, op: StepOp, fixed: Option<&str>) {
    let mut depth = 0usize;
    let mut content_start = l.pos;
    loop {
        let r = match l.next_char() {
            Some(r) => r,
            None => break,
        };
        if r == '(' {
            depth += 1;
            if depth == 1 {
                content_start = l.pos;
            }
        }
        if r == ')' {
            depth -= 1;
            if depth == 0 {
                let inner = l.input[content_start..l.pos - 1].to_string();
                match fixed {
                    Some(v) => l.emit_value(op, v),
                    None => l.emit_value(op, &inner),
                }
                break;
            }
        }
    }
}

fn lex_predicate(l: &mut Lexer) -> Option<StateFn> {
    let mut depth = 0usize;
    let mut content_start = l.pos;
    loop {
        let r = match l.next_char() {
            Some(r) => r,
            None => break,
        };
        if r == '[' {
            depth += 1;
            if depth == 1 {
                content_start = l.pos;
            }
        }
        if r == ']' {
            depth -= 1;
            if depth == 0 {
                let inner = l.input[content_start..l.pos - 1].to_string();
                l.emit_value(StepOp::Predicate, &inner);
                break;
            }
        }
    }
    Some(StateFn(lex_node_test))
}

fn lex_parent(l: &mut Lexer) -> Option<StateFn> {
    let _ = l.next_char();
    if l.peek() == Some('/') {
        let _ = l.next_char();
        // a leading // anchors at the root and needs no step
        if l.start == 0 {
            l.ignore();
        } else {
            l.emit(StepOp::Ancestor);
        }
        return Some(StateFn(lex_node_test));
    }
    if l.start == 0 {
        l.emit(StepOp::Root);
        return Some(StateFn(lex_node_test));
    }
    l.emit(StepOp::Parent);
    Some(StateFn(lex_node_test))
}

/// Lexes a pattern into reversed steps: rightmost node test first, each
/// predicate immediately after the step it qualifies, `End` last.
pub fn parse_match_pattern(pattern: &str) -> Vec<MatchStep> {
    if pattern == "/" {
        return vec![
            MatchStep {
                op: StepOp::Root,
                value: "/".to_string(),
            },
            MatchStep {
                op: StepOp::End,
                value: String::new(),
            },
        ];
    }

    let emitted = Lexer::new(pattern).run();

    let mut steps: Vec<MatchStep> = vec![MatchStep {
        op: StepOp::End,
        value: String::new(),
    }];
    for step in emitted {
        if step.op == StepOp::Predicate {
            // Keep the predicate right behind the node test it qualifies.
            steps.insert(1, step);
        } else {
            steps.insert(0, step);
        }
    }
    steps
}

/// Compiles a pattern into one `CompiledMatch` per `|` alternative.
pub fn compile_match(
    pattern: &str,
    template: Option<TemplateId>,
    mode: &str,
    explicit_priority: Option<f64>,
    scope: Option<Node>,
) -> Vec<CompiledMatch> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let steps = parse_match_pattern(pattern);
    let mut matches = Vec::new();
    let mut start = 0;
    let mut push = |segment: &[MatchStep]| {
        matches.push(CompiledMatch {
            pattern: pattern.to_string(),
            steps: segment.to_vec(),
            template,
            mode: mode.to_string(),
            priority: explicit_priority.unwrap_or_else(|| default_priority(segment)),
            order: 0,
            scope: scope.clone(),
        });
    };
    for (i, step) in steps.iter().enumerate() {
        if step.op == StepOp::Or {
            push(&steps[start..i]);
            start = i + 1;
        }
    }
    push(&steps[start..]);
    matches
}

fn ends_after(steps: &[MatchStep], n: usize) -> bool {
    steps.len() == n || (steps.len() == n + 1 && steps[n].op == StepOp::End)
}

/// The default priority table for patterns without an explicit `priority`.
/// Computed from the reversed steps, so index 0 is the rightmost step.
pub fn default_priority(steps: &[MatchStep]) -> f64 {
    let step = match steps.first() {
        Some(s) => s,
        None => return 0.5,
    };
    // * and ns:*
    if step.op == StepOp::All {
        if ends_after(steps, 1) {
            return -0.5;
        }
        if ends_after(steps, 2) && steps[1].op == StepOp::Ns {
            return -0.25;
        }
    }
    // @* and @ns:*
    if step.op == StepOp::Attr && step.value == "*" {
        if ends_after(steps, 1) {
            return -0.5;
        }
        if ends_after(steps, 2) && steps[1].op == StepOp::Ns {
            return -0.25;
        }
    }
    // text(), node(), comment(), processing-instruction()
    if matches!(step.op, StepOp::Text | StepOp::Node | StepOp::Comment | StepOp::Pi)
        && ends_after(steps, 1)
    {
        return -0.5;
    }
    // QName and ns:QName
    if step.op == StepOp::Elem {
        if ends_after(steps, 1) {
            return 0.0;
        }
        if ends_after(steps, 2) && steps[1].op == StepOp::Ns {
            return 0.0;
        }
    }
    // @QName and @ns:QName
    if step.op == StepOp::Attr && step.value != "*" {
        if ends_after(steps, 1) {
            return 0.0;
        }
        if ends_after(steps, 2) && steps[1].op == StepOp::Ns {
            return 0.0;
        }
    }
    0.5
}

impl CompiledMatch {
    /// Tests the candidate node against this pattern.
    pub fn matches(&self, node: &Node, mode: &str, ctx: Option<&ExecutionContext>) -> bool {
        let mut cur = node.clone();

        // #all is tolerated for forwards compatibility.
        if self.template.is_some() && mode != self.mode && self.mode != "#all" {
            return false;
        }

        for (i, step) in self.steps.iter().enumerate() {
            match step.op {
                StepOp::End => return true,
                StepOp::Root => {
                    if cur.node_type() != NodeType::Document {
                        return false;
                    }
                }
                StepOp::Elem => {
                    if cur.node_type() != NodeType::Element {
                        return false;
                    }
                    if step.value != cur.local_name() && step.value != "*" {
                        return false;
                    }
                }
                StepOp::Ns => {
                    let uri = self.resolve_prefix(&step.value, ctx);
                    if uri.as_deref() != Some(cur.namespace().as_str()) {
                        return false;
                    }
                }
                StepOp::Attr => {
                    if cur.node_type() != NodeType::Attribute {
                        return false;
                    }
                    if step.value != cur.local_name() && step.value != "*" {
                        return false;
                    }
                }
                StepOp::Text => {
                    if !matches!(cur.node_type(), NodeType::Text | NodeType::Cdata) {
                        return false;
                    }
                }
                StepOp::Comment => {
                    if cur.node_type() != NodeType::Comment {
                        return false;
                    }
                }
                StepOp::All => {
                    if cur.node_type() != NodeType::Element {
                        return false;
                    }
                }
                StepOp::Pi => {
                    if cur.node_type() != NodeType::ProcessingInstruction {
                        return false;
                    }
                    let target = step.value.trim().trim_matches(['"', '\'']);
                    if !target.is_empty() && cur.local_name() != target {
                        return false;
                    }
                }
                StepOp::Node => match cur.node_type() {
                    NodeType::Element
                    | NodeType::Text
                    | NodeType::Cdata
                    | NodeType::Comment
                    | NodeType::ProcessingInstruction => {}
                    _ => return false,
                },
                StepOp::Parent => match cur.parent() {
                    Some(p) => cur = p,
                    None => return false,
                },
                StepOp::Ancestor => {
                    let next = match self.steps.get(i + 1) {
                        Some(n) if n.op == StepOp::Elem => n,
                        _ => return false,
                    };
                    loop {
                        match cur.parent() {
                            Some(p) => cur = p,
                            None => return false,
                        }
                        if cur.node_type() == NodeType::Element
                            && cur.local_name() == next.value
                        {
                            break;
                        }
                    }
                }
                StepOp::Predicate => {
                    if !self.match_predicate(i, &cur, node, ctx) {
                        return false;
                    }
                    if self.predicate_was_full_eval(i, ctx) {
                        // the whole-pattern fallback already decided
                        return true;
                    }
                }
                StepOp::Id => {
                    let value = step.value.trim().trim_matches(['"', '\'']);
                    match cur.document().element_by_id(value) {
                        Some(target) if target == cur => {}
                        _ => return false,
                    }
                }
                StepOp::Key => {
                    let ctx = match ctx {
                        Some(c) => c,
                        None => return false,
                    };
                    let mut parts = step.value.splitn(2, ',');
                    let key_name = parts.next().unwrap_or("").trim().trim_matches(['"', '\'']);
                    let key_value = parts.next().unwrap_or("").trim().trim_matches(['"', '\'']);
                    let hit = ctx
                        .key_entries(key_name, key_value)
                        .iter()
                        .any(|n| *n == cur);
                    if !hit {
                        return false;
                    }
                }
                StepOp::Or | StepOp::Error => return false,
            }
        }
        // Alternatives other than the last lack an explicit End step.
        true
    }

    fn resolve_prefix(&self, prefix: &str, ctx: Option<&ExecutionContext>) -> Option<String> {
        if let Some(scope) = &self.scope {
            if let Some(uri) = scope.lookup_namespace_uri(prefix) {
                return Some(uri);
            }
        }
        ctx.and_then(|c| c.stylesheet_prefix_uri(prefix))
    }

    /// Positional fast path: when the qualified step is a plain element test,
    /// the predicate can be decided against the position among like-named
    /// siblings without touching the rest of the document.
    fn predicate_fast_path(&self, i: usize) -> Option<&MatchStep> {
        let mut prev = self.steps.get(i.checked_sub(1)?)?;
        if prev.op == StepOp::Predicate {
            prev = self.steps.get(i.checked_sub(2)?)?;
        }
        if matches!(prev.op, StepOp::Elem | StepOp::All) {
            Some(prev)
        } else {
            None
        }
    }

    fn predicate_was_full_eval(&self, i: usize, ctx: Option<&ExecutionContext>) -> bool {
        ctx.is_none() || self.predicate_fast_path(i).is_none()
    }

    fn match_predicate(
        &self,
        i: usize,
        cur: &Node,
        candidate: &Node,
        ctx: Option<&ExecutionContext>,
    ) -> bool {
        let step = &self.steps[i];
        if let Some(ctx) = ctx {
            if let Some(prev) = self.predicate_fast_path(i) {
                let siblings = match cur.parent() {
                    Some(p) => ctx.children_of(&p),
                    None => vec![cur.clone()],
                };
                let mut len = 0usize;
                let mut pos = 0usize;
                for n in &siblings {
                    if *n == *cur {
                        len += 1;
                        pos = len;
                    } else if n.node_type() == NodeType::Element
                        && (prev.op == StepOp::All || n.local_name() == cur.local_name())
                    {
                        len += 1;
                    }
                }
                if step.value.trim() == "last()" {
                    return pos == len;
                }
                if let Ok(want) = step.value.trim().parse::<usize>() {
                    return pos == want;
                }
                let compiled = match xpath::parse_expression(&step.value) {
                    Ok(e) => e,
                    Err(e) => {
                        debug!("unparseable match predicate '{}': {}", step.value, e);
                        return false;
                    }
                };
                let ectx = EvalContext {
                    node: cur.clone(),
                    position: pos,
                    size: len,
                    resolver: ctx,
                };
                return match evaluate(&compiled, &ectx) {
                    Ok(Value::Number(n)) => n == pos as f64,
                    Ok(v) => v.boolean(),
                    Err(_) => false,
                };
            }
        }

        // Fallback: evaluate the whole pattern as an expression over the
        // document and test membership of the candidate.
        let expr_text = if self.pattern.starts_with('/') {
            self.pattern.clone()
        } else {
            format!("//{}", self.pattern)
        };
        let compiled = match xpath::parse_expression(&expr_text) {
            Ok(e) => e,
            Err(e) => {
                debug!("pattern fallback failed to parse '{}': {}", expr_text, e);
                return false;
            }
        };
        let root = candidate.document().root();
        let result = match ctx {
            Some(c) => {
                let ectx = EvalContext::new(root, c);
                evaluate(&compiled, &ectx)
            }
            None => {
                let ectx = EvalContext::new(root, &NullResolver);
                evaluate(&compiled, &ectx)
            }
        };
        match result {
            Ok(Value::NodeSet(nodes)) => nodes.iter().any(|n| *n == *cur),
            _ => false,
        }
    }

    /// The index key for the dispatch buckets.
    pub fn hash(&self) -> String {
        match self.steps.first() {
            Some(s) => match s.op {
                StepOp::Attr | StepOp::Elem => s.value.clone(),
                StepOp::All => "*".to_string(),
                StepOp::Root => "/".to_string(),
                _ => String::new(),
            },
            None => String::new(),
        }
    }

    fn first_op(&self) -> StepOp {
        self.steps.first().map(|s| s.op).unwrap_or(StepOp::Error)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.first_op(), StepOp::Elem | StepOp::Root | StepOp::All)
    }

    pub fn is_attr(&self) -> bool {
        self.first_op() == StepOp::Attr
    }

    pub fn is_node(&self) -> bool {
        self.first_op() == StepOp::Node
    }

    pub fn is_text(&self) -> bool {
        self.first_op() == StepOp::Text
    }

    pub fn is_comment(&self) -> bool {
        self.first_op() == StepOp::Comment
    }

    pub fn is_pi(&self) -> bool {
        self.first_op() == StepOp::Pi
    }

    pub fn is_id_key(&self) -> bool {
        matches!(self.first_op(), StepOp::Id | StepOp::Key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;

    fn compile_one(pattern: &str) -> CompiledMatch {
        let matches = compile_match(pattern, None, "", None, None);
        assert_eq!(matches.len(), 1, "expected one alternative for {}", pattern);
        matches.into_iter().next().unwrap()
    }

    #[test]
    fn steps_are_reversed() {
        let m = compile_one("doc/section/para");
        let ops: Vec<StepOp> = m.steps.iter().map(|s| s.op).collect();
        assert_eq!(
            ops,
            vec![
                StepOp::Elem,
                StepOp::Parent,
                StepOp::Elem,
                StepOp::Parent,
                StepOp::Elem,
                StepOp::End
            ]
        );
        assert_eq!(m.steps[0].value, "para");
        assert_eq!(m.steps[2].value, "section");
        assert_eq!(m.steps[4].value, "doc");
    }

    #[test]
    fn predicate_follows_its_node_test() {
        let m = compile_one("item[2]/name");
        let ops: Vec<StepOp> = m.steps.iter().map(|s| s.op).collect();
        assert_eq!(
            ops,
            vec![
                StepOp::Elem,      // name
                StepOp::Parent,
                StepOp::Elem,      // item
                StepOp::Predicate, // [2], right after item
                StepOp::End
            ]
        );
        assert_eq!(m.steps[3].value, "2");
    }

    #[test]
    fn union_splits_alternatives() {
        let matches = compile_match("para|note|@id", None, "", None, None);
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().any(|m| m.is_attr()));
        assert_eq!(matches.iter().filter(|m| m.is_element()).count(), 2);
    }

    #[test]
    fn default_priorities_match_the_table() {
        let priority = |p: &str| compile_one(p).priority;
        assert_eq!(priority("*"), -0.5);
        assert_eq!(priority("ns:*"), -0.25);
        assert_eq!(priority("node()"), -0.5);
        assert_eq!(priority("text()"), -0.5);
        assert_eq!(priority("comment()"), -0.5);
        assert_eq!(priority("processing-instruction()"), -0.5);
        assert_eq!(priority("para"), 0.0);
        assert_eq!(priority("ns:para"), 0.0);
        assert_eq!(priority("@*"), -0.5);
        assert_eq!(priority("@ns:*"), -0.25);
        assert_eq!(priority("@id"), 0.0);
        assert_eq!(priority("doc/para"), 0.5);
        assert_eq!(priority("para[1]"), 0.5);
        assert_eq!(priority("id(\"x\")"), 0.5);
    }

    #[test]
    fn explicit_priority_overrides_default() {
        let matches = compile_match("*", None, "", Some(2.0), None);
        assert_eq!(matches[0].priority, 2.0);
    }

    const DOC: &str = r#"<doc><section><para id="p1">one</para><para>two</para></section><note/></doc>"#;

    fn find(doc: &crate::dom::Document, path: &[usize]) -> Node {
        let mut cur = doc.root();
        for &i in path {
            cur = cur.children()[i].clone();
        }
        cur
    }

    #[test]
    fn name_and_path_matching() {
        let doc = parse_str(DOC, None).unwrap();
        let para = find(&doc, &[0, 0, 0]);
        let note = find(&doc, &[0, 1]);

        assert!(compile_one("para").matches(&para, "", None));
        assert!(!compile_one("para").matches(&note, "", None));
        assert!(compile_one("section/para").matches(&para, "", None));
        assert!(!compile_one("note/para").matches(&para, "", None));
        assert!(compile_one("doc//para").matches(&para, "", None));
        assert!(compile_one("/doc/section/para").matches(&para, "", None));
        assert!(compile_one("*").matches(&note, "", None));
        assert!(!compile_one("*").matches(&doc.root(), "", None));
        assert!(compile_one("/").matches(&doc.root(), "", None));
    }

    #[test]
    fn attribute_and_node_type_matching() {
        let doc = parse_str(DOC, None).unwrap();
        let para = find(&doc, &[0, 0, 0]);
        let attr = para.attributes()[0].clone();
        let text = find(&doc, &[0, 0, 0, 0]);

        assert!(compile_one("@id").matches(&attr, "", None));
        assert!(compile_one("@*").matches(&attr, "", None));
        assert!(!compile_one("@id").matches(&para, "", None));
        assert!(compile_one("text()").matches(&text, "", None));
        assert!(compile_one("node()").matches(&para, "", None));
        assert!(!compile_one("node()").matches(&attr, "", None));
        assert!(compile_one("para/text()").matches(&text, "", None));
    }

    #[test]
    fn id_matching() {
        let doc = parse_str(DOC, None).unwrap();
        let para = find(&doc, &[0, 0, 0]);
        let other = find(&doc, &[0, 0, 1]);
        assert!(compile_one("id('p1')").matches(&para, "", None));
        assert!(!compile_one("id('p1')").matches(&other, "", None));
    }

    #[test]
    fn mode_gates_matching() {
        let matches = compile_match("para", Some(TemplateId(0)), "toc", None, None);
        let doc = parse_str(DOC, None).unwrap();
        let para = find(&doc, &[0, 0, 0]);
        assert!(matches[0].matches(&para, "toc", None));
        assert!(!matches[0].matches(&para, "", None));
        assert!(!matches[0].matches(&para, "other", None));
    }
}
