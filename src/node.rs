//! Node adapter and evaluator seams.
//!
//! The engine never parses XML and never interprets path syntax. It talks to
//! the document through [`DocumentNode`] and to the pattern/path language
//! through [`Evaluator`]. Both are expected to be pure: given the same inputs
//! they must return the same answers, otherwise key stability is lost.

use crate::EvalError;

/// Kind of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Element => "element",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle into an immutable document tree.
///
/// Handles are cheap to clone. Two handles denote the same node when
/// [`is_same`](DocumentNode::is_same) says so; structural equality of the
/// subtrees is irrelevant.
pub trait DocumentNode: Clone {
    /// Reference identity.
    fn is_same(&self, other: &Self) -> bool;

    fn kind(&self) -> NodeKind;

    /// Value of the identifier attribute, if the node carries one.
    ///
    /// Only the key generator looks at this; rule selection never does.
    fn identifier(&self) -> Option<String>;

    /// Immediate children in document order.
    fn children(&self) -> Vec<Self>;
}

/// The external pattern/path evaluator.
pub trait Evaluator<N> {
    /// Whether `pattern` matches `node`.
    fn matches(&self, pattern: &str, node: &N) -> Result<bool, EvalError>;

    /// Resolve `path` relative to `context`, in the evaluator's order.
    fn select(&self, path: &str, context: &N) -> Result<Vec<N>, EvalError>;
}
