//! Traversal run metrics.
//!
//! Counters are always collected. The per-invocation trace is opt-in
//! (`Options::trace`).
//!
//! Nothing in here feeds back into rule selection or key derivation.

use std::time::Duration;

use crate::{Mode, NodeKind, PatternFeatures, Specificity};

#[derive(Debug, Default, Clone)]
pub(crate) struct RunMetrics {
    /// Total elapsed time of the traversal.
    pub total: Duration,
    /// Number of rule invocations.
    pub invocations: usize,
    /// Nodes that no rule (nor the default-mode fallback) matched.
    pub unmatched: usize,
    /// Invocations satisfied by the default-mode fallback of a named mode.
    pub fallbacks: usize,
    /// Deepest invocation; the render root is depth 0.
    pub max_depth: usize,
    /// Per-invocation trace, only when requested.
    pub trace: Vec<Invocation>,
}

/// One rule invocation, as recorded in the trace.
#[derive(Debug, Clone)]
pub(crate) struct Invocation {
    pub key: String,
    pub pattern: String,
    /// Mode the traversal requested.
    pub mode: Mode,
    /// Mode the winning rule was registered in.
    pub rule_mode: Mode,
    pub specificity: Specificity,
    pub features: PatternFeatures,
    pub kind: NodeKind,
    pub depth: usize,
}
