//! Rule resolution.
//!
//! Given a node and a requested mode, pick the single rule to apply:
//!
//! ```text
//! resolve(node, mode)
//!   ├─ match every rule of `mode`      ──▶ best ranked match wins
//!   └─ none? and mode is named
//!        └─ match every rule of default ──▶ best ranked match wins
//! ```
//!
//! The ranked index (see `modes.rs`) is ordered by specificity, then by
//! registration sequence, newest first, so the first match in it is exactly
//! the "most specific, most recently registered" rule. Every pattern of the
//! searched mode is still evaluated, so a malformed pattern fails the render
//! no matter which node is visited. The fallback is one-way: a rule
//! registered in a named mode never fires for a default-mode traversal.
//!
//! Evaluator failures are not interpreted here; they bubble up as
//! [`Error::Evaluator`](crate::Error::Evaluator).

use super::modes::ModeTable;
use crate::{EvalError, Evaluator, Mode, Rule};

/// Outcome of a successful resolution.
pub(crate) struct Resolved<'r, N, O> {
    pub rule: &'r Rule<N, O>,
    /// Whether the rule came from the default-mode fallback of a named mode.
    pub fallback: bool,
}

pub(crate) fn resolve<'r, N, O>(
    table: &'r ModeTable<N, O>,
    evaluator: &dyn Evaluator<N>,
    node: &N,
    mode: &Mode,
) -> Result<Option<Resolved<'r, N, O>>, EvalError> {
    if let Some(rule) = best_match(table, evaluator, node, mode)? {
        return Ok(Some(Resolved { rule, fallback: false }));
    }
    if mode.is_default() {
        return Ok(None);
    }

    tracing::trace!(%mode, "no rule in mode, falling back to default mode");
    Ok(best_match(table, evaluator, node, &Mode::Default)?.map(|rule| Resolved { rule, fallback: true }))
}

fn best_match<'r, N, O>(
    table: &'r ModeTable<N, O>,
    evaluator: &dyn Evaluator<N>,
    node: &N,
    mode: &Mode,
) -> Result<Option<&'r Rule<N, O>>, EvalError> {
    let Some(rules) = table.get(mode) else {
        return Ok(None);
    };
    let mut winner = None;
    for rule in rules.ranked() {
        if evaluator.matches(&rule.pattern, node)? && winner.is_none() {
            winner = Some(rule);
        }
    }
    Ok(winner)
}
