//! Error types.

use thiserror::Error;

use crate::{Mode, NodeKind};

/// Boxed error raised from inside a rule body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by an [`Evaluator`](crate::Evaluator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot evaluate `{expression}`: {message}")]
pub struct EvalError {
    pub expression: String,
    pub message: String,
}

impl EvalError {
    pub fn new(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self { expression: expression.into(), message: message.into() }
    }
}

/// Errors surfaced by [`render`](crate::render) and friends.
///
/// Nothing is retried or recovered: the first failure aborts the whole
/// traversal and is handed back to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Evaluator(#[from] EvalError),

    #[error("rule failed: {0}")]
    Rule(#[source] BoxError),

    #[error("no rule matches {kind} node `{key}` in mode {mode}")]
    Unmatched { key: String, mode: Mode, kind: NodeKind },
}

impl Error {
    /// Wrap an arbitrary error raised by a rule body.
    pub fn rule(err: impl Into<BoxError>) -> Self {
        Error::Rule(err.into())
    }
}
