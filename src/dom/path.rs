//! Reference evaluator for a location-path subset of XPath 1.0.
//!
//! ```text
//! expr      := path ('|' path)*
//! path      := '/' relative? | '//' relative | relative
//! relative  := step (('/' | '//') step)*
//! step      := '.' | '..' | (axis '::')? test predicate*
//! test      := '*' | name | kind '(' arg? ')'
//! predicate := '[' number | '@' name (('=' | '!=') literal)? | 'not' '(' inner ')' | expr ']'
//! ```
//!
//! Expressions are parsed on every call; the evaluator holds no state.

use crate::dom::NodeRef;
use crate::{DocumentNode, EvalError, Evaluator, NodeKind};

/// Stateless evaluator over [`NodeRef`]s.
///
/// `matches(pattern, node)` is true when `pattern`, evaluated with `node` as
/// context, selects at least one node. Patterns therefore usually start with
/// the `self::` axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathEvaluator;

impl<'d> Evaluator<NodeRef<'d>> for PathEvaluator {
    fn matches(&self, pattern: &str, node: &NodeRef<'d>) -> Result<bool, EvalError> {
        Ok(!self.select(pattern, node)?.is_empty())
    }

    fn select(&self, path: &str, context: &NodeRef<'d>) -> Result<Vec<NodeRef<'d>>, EvalError> {
        let expr = Parser::new(path)?.parse()?;
        Ok(eval_expr(&expr, *context))
    }
}

// --- Tokens -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    DoubleColon,
    DoubleSlash,
    Slash,
    DotDot,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Pipe,
    NotEq,
    Eq,
    Star,
    Literal(String),
    Number(usize),
    Name(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let re = regex!(
        r#"^\s*(?:(::)|(//)|(/)|(\.\.)|(\.)|(\[)|(\])|(\()|(\))|(@)|(\|)|(!=)|(=)|(\*)|"([^"]*)"|'([^']*)'|(\d+)|([A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?))"#
    );

    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.trim_start().is_empty() {
        let caps = re.captures(rest).ok_or_else(|| {
            EvalError::new(input, format!("unexpected input at `{}`", rest.trim_start()))
        })?;
        let group = (1..caps.len()).find(|&i| caps.get(i).is_some()).unwrap_or(0);
        let text = caps.get(group).map(|m| m.as_str()).unwrap_or("");
        tokens.push(match group {
            1 => Token::DoubleColon,
            2 => Token::DoubleSlash,
            3 => Token::Slash,
            4 => Token::DotDot,
            5 => Token::Dot,
            6 => Token::LBracket,
            7 => Token::RBracket,
            8 => Token::LParen,
            9 => Token::RParen,
            10 => Token::At,
            11 => Token::Pipe,
            12 => Token::NotEq,
            13 => Token::Eq,
            14 => Token::Star,
            15 | 16 => Token::Literal(text.to_string()),
            17 => Token::Number(text.parse().map_err(|_| EvalError::new(input, format!("bad number `{text}`")))?),
            _ => Token::Name(text.to_string()),
        });
        rest = &rest[caps.get(0).map(|m| m.end()).unwrap_or(rest.len())..];
    }
    Ok(tokens)
}

// --- Syntax tree ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    SelfAxis,
    Child,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "self" => Axis::SelfAxis,
            "child" => Axis::Child,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// `node()`
    Any,
    /// `*`
    AnyElement,
    /// `name` or `element(name)`
    Element(String),
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
    DocumentNode,
}

#[derive(Debug, Clone)]
enum Predicate {
    Position(usize),
    Attribute { name: String, compare: Option<(bool, String)> },
    Not(Box<Predicate>),
    Exists(Expr),
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Expr {
    paths: Vec<Path>,
}

// --- Parser -----------------------------------------------------------------

struct Parser<'i> {
    input: &'i str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'i> Parser<'i> {
    fn new(input: &'i str) -> Result<Self, EvalError> {
        Ok(Parser { input, tokens: tokenize(input)?, pos: 0 })
    }

    fn parse(mut self) -> Result<Expr, EvalError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        let expr = self.expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::new(self.input, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), EvalError> {
        if self.eat(token) { Ok(()) } else { Err(self.error(format!("expected {token:?}"))) }
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        let mut paths = vec![self.path()?];
        while self.eat(&Token::Pipe) {
            paths.push(self.path()?);
        }
        Ok(Expr { paths })
    }

    fn path(&mut self) -> Result<Path, EvalError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(Path { absolute: true, steps });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        Ok(Path { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(self.peek(), Some(Token::Dot | Token::DotDot | Token::Star | Token::Name(_)))
    }

    fn step(&mut self) -> Result<Step, EvalError> {
        if self.eat(&Token::Dot) {
            return Ok(Step { axis: Axis::SelfAxis, test: NodeTest::Any, predicates: Vec::new() });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step { axis: Axis::Parent, test: NodeTest::Any, predicates: Vec::new() });
        }
        if self.peek() == Some(&Token::At) {
            return Err(self.error("attribute nodes can only be tested inside predicates"));
        }

        let mut axis = Axis::Child;
        if let (Some(Token::Name(name)), Some(Token::DoubleColon)) = (self.peek(), self.peek_at(1)) {
            axis = Axis::from_name(name).ok_or_else(|| self.error(format!("unsupported axis `{name}`")))?;
            self.pos += 2;
        }

        let test = self.node_test()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.predicate()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(Step { axis, test, predicates })
    }

    fn node_test(&mut self) -> Result<NodeTest, EvalError> {
        match self.next() {
            Some(Token::Star) => Ok(NodeTest::AnyElement),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let arg = match self.peek() {
                    Some(Token::Name(arg)) | Some(Token::Literal(arg)) => {
                        let arg = arg.clone();
                        self.pos += 1;
                        Some(arg)
                    }
                    Some(Token::Star) => {
                        self.pos += 1;
                        None
                    }
                    _ => None,
                };
                self.expect(&Token::RParen)?;
                match (name.as_str(), arg) {
                    ("node", None) => Ok(NodeTest::Any),
                    ("text", None) => Ok(NodeTest::Text),
                    ("comment", None) => Ok(NodeTest::Comment),
                    ("processing-instruction", target) => Ok(NodeTest::ProcessingInstruction(target)),
                    ("element", None) => Ok(NodeTest::AnyElement),
                    ("element", Some(name)) => Ok(NodeTest::Element(name)),
                    ("document-node", None) => Ok(NodeTest::DocumentNode),
                    (other, _) => Err(self.error(format!("unsupported node test `{other}()`"))),
                }
            }
            Some(Token::Name(name)) => Ok(NodeTest::Element(name)),
            Some(token) => Err(self.error(format!("expected a node test, found {token:?}"))),
            None => Err(self.error("expected a node test")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, EvalError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Predicate::Position(n))
            }
            Some(Token::At) => {
                self.pos += 1;
                let name = match self.next() {
                    Some(Token::Name(name)) => name,
                    _ => return Err(self.error("expected an attribute name after `@`")),
                };
                let equal = if self.eat(&Token::Eq) {
                    Some(true)
                } else if self.eat(&Token::NotEq) {
                    Some(false)
                } else {
                    None
                };
                let compare = match equal {
                    Some(equal) => match self.next() {
                        Some(Token::Literal(value)) => Some((equal, value)),
                        Some(Token::Number(value)) => Some((equal, value.to_string())),
                        _ => return Err(self.error("expected a literal after comparison")),
                    },
                    None => None,
                };
                Ok(Predicate::Attribute { name, compare })
            }
            Some(Token::Name(name)) if name == "not" && self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 2;
                let inner = self.predicate()?;
                self.expect(&Token::RParen)?;
                Ok(Predicate::Not(Box::new(inner)))
            }
            _ => Ok(Predicate::Exists(self.expr()?)),
        }
    }
}

fn descendant_or_self() -> Step {
    Step { axis: Axis::DescendantOrSelf, test: NodeTest::Any, predicates: Vec::new() }
}

// --- Evaluation -------------------------------------------------------------

fn eval_expr<'d>(expr: &Expr, context: NodeRef<'d>) -> Vec<NodeRef<'d>> {
    if let [path] = expr.paths.as_slice() {
        return eval_path(path, context);
    }
    let mut out = Vec::new();
    for path in &expr.paths {
        out.extend(eval_path(path, context));
    }
    document_order(out)
}

fn eval_path<'d>(path: &Path, context: NodeRef<'d>) -> Vec<NodeRef<'d>> {
    let start = if path.absolute { context.document().root() } else { context };
    let mut current = vec![start];
    for step in &path.steps {
        let mut next = Vec::new();
        for node in &current {
            next.extend(eval_step(step, *node));
        }
        current = document_order(next);
    }
    current
}

fn eval_step<'d>(step: &Step, context: NodeRef<'d>) -> Vec<NodeRef<'d>> {
    let mut candidates: Vec<NodeRef<'d>> =
        axis_nodes(step.axis, context).into_iter().filter(|n| test_matches(&step.test, n)).collect();

    for predicate in &step.predicates {
        candidates = candidates
            .iter()
            .enumerate()
            .filter(|(idx, n)| predicate_holds(predicate, **n, idx + 1))
            .map(|(_, n)| *n)
            .collect();
    }
    candidates
}

/// Nodes along `axis`, in proximity order (reverse axes nearest first).
fn axis_nodes<'d>(axis: Axis, node: NodeRef<'d>) -> Vec<NodeRef<'d>> {
    match axis {
        Axis::SelfAxis => vec![node],
        Axis::Child => node.children(),
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors().collect(),
        Axis::AncestorOrSelf => std::iter::once(node).chain(node.ancestors()).collect(),
        Axis::Descendant => node.descendants(),
        Axis::DescendantOrSelf => std::iter::once(node).chain(node.descendants()).collect(),
        Axis::FollowingSibling => node.following_siblings(),
        Axis::PrecedingSibling => node.preceding_siblings(),
    }
}

fn test_matches(test: &NodeTest, node: &NodeRef<'_>) -> bool {
    match test {
        NodeTest::Any => true,
        NodeTest::AnyElement => node.kind() == NodeKind::Element,
        NodeTest::Element(name) => node.kind() == NodeKind::Element && node.name() == Some(name.as_str()),
        NodeTest::Text => node.kind() == NodeKind::Text,
        NodeTest::Comment => node.kind() == NodeKind::Comment,
        NodeTest::ProcessingInstruction(target) => {
            node.kind() == NodeKind::ProcessingInstruction
                && target.as_deref().is_none_or(|target| node.name() == Some(target))
        }
        NodeTest::DocumentNode => node.kind() == NodeKind::Document,
    }
}

fn predicate_holds(predicate: &Predicate, node: NodeRef<'_>, position: usize) -> bool {
    match predicate {
        Predicate::Position(n) => position == *n,
        Predicate::Attribute { name, compare: None } => node.attribute(name).is_some(),
        Predicate::Attribute { name, compare: Some((equal, value)) } => {
            node.attribute(name).is_some_and(|actual| (actual == value.as_str()) == *equal)
        }
        Predicate::Not(inner) => !predicate_holds(inner, node, position),
        Predicate::Exists(expr) => !eval_expr(expr, node).is_empty(),
    }
}

/// Sort into document order and drop duplicates.
fn document_order(mut nodes: Vec<NodeRef<'_>>) -> Vec<NodeRef<'_>> {
    nodes.sort_by_cached_key(|n| n.order_key());
    nodes.dedup_by(|a, b| a.is_same(b));
    nodes
}
