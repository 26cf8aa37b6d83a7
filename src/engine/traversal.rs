//! Recursive traversal and the per-invocation render context.
//!
//! A traversal is a depth-first walk driven entirely by rule bodies: the
//! engine resolves and invokes one rule for the render root, and every further
//! step happens because a rule body called one of the `traverse*` methods on
//! its [`Renderer`].
//!
//! ```text
//! Traversal::invoke(node, mode, key)
//!   ├─ resolve(node, mode)              (resolve.rs)
//!   │    └─ none ─▶ UnmatchedPolicy     (omit / warn / fail)
//!   └─ rule body(&Renderer)
//!        └─ traverse_with(query, switch)
//!             ├─ select nodes (children or evaluator query)
//!             ├─ effective mode (inherit / reset / named)
//!             └─ for each node: invoke(node, mode, key.descend(hop))
//! ```
//!
//! The current mode and key travel by value inside each `Renderer`; there is
//! no shared "current mode" anywhere. The only shared state is the metrics
//! cell, which is write-only from the traversal's point of view.

use std::cell::{Cell, RefCell};

use super::keys::{Hop, KeyPath};
use super::metrics::{Invocation, RunMetrics};
use super::modes::ModeTable;
use super::resolve::resolve;
use crate::{DocumentNode, Error, Evaluator, Mode, Options, UnmatchedPolicy};

/// Mode handling of a nested traversal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModeSwitch {
    /// Stay in the mode of the calling rule.
    #[default]
    Inherit,
    /// Go back to the default mode.
    Reset,
    /// Continue in the given mode.
    To(Mode),
}

impl ModeSwitch {
    pub fn named(name: &str) -> Self {
        ModeSwitch::To(Mode::named(name))
    }

    fn apply(&self, current: &Mode) -> Mode {
        match self {
            ModeSwitch::Inherit => current.clone(),
            ModeSwitch::Reset => Mode::Default,
            ModeSwitch::To(mode) => mode.clone(),
        }
    }
}

/// State of one traversal run.
pub(crate) struct Traversal<'a, N, O> {
    table: &'a ModeTable<N, O>,
    evaluator: &'a dyn Evaluator<N>,
    options: &'a Options,
    metrics: RefCell<RunMetrics>,
}

impl<'a, N: DocumentNode, O> Traversal<'a, N, O> {
    pub(crate) fn new(table: &'a ModeTable<N, O>, evaluator: &'a dyn Evaluator<N>, options: &'a Options) -> Self {
        Traversal { table, evaluator, options, metrics: RefCell::new(RunMetrics::default()) }
    }

    /// Render `root` in the start mode of the options.
    pub(crate) fn render_root(&self, root: &N) -> Result<Option<O>, Error> {
        self.invoke(root.clone(), self.options.mode.clone(), KeyPath::root(root.identifier()), 0)
    }

    pub(crate) fn into_metrics(self) -> RunMetrics {
        self.metrics.into_inner()
    }

    fn invoke(&self, node: N, mode: Mode, key: KeyPath, depth: usize) -> Result<Option<O>, Error> {
        let Some(resolved) = resolve(self.table, self.evaluator, &node, &mode)? else {
            return self.unmatched(&node, &mode, &key).map(|()| None);
        };
        let rule = resolved.rule;

        tracing::debug!(
            key = key.as_str(),
            pattern = %rule.pattern,
            %mode,
            specificity = %rule.specificity,
            fallback = resolved.fallback,
            "invoking rule"
        );

        // The borrow must end before the rule body runs: it re-enters `invoke`.
        {
            let mut metrics = self.metrics.borrow_mut();
            metrics.invocations += 1;
            metrics.max_depth = metrics.max_depth.max(depth);
            if resolved.fallback {
                metrics.fallbacks += 1;
            }
            if self.options.trace {
                metrics.trace.push(Invocation {
                    key: key.as_str().to_string(),
                    pattern: rule.pattern.clone(),
                    mode: mode.clone(),
                    rule_mode: rule.mode.clone(),
                    specificity: rule.specificity,
                    features: rule.features,
                    kind: node.kind(),
                    depth,
                });
            }
        }

        let renderer = Renderer {
            traversal: self,
            node,
            mode,
            key,
            depth,
            call_sites: Cell::new(0),
            child_hop_taken: Cell::new(false),
        };
        (rule.render)(&renderer).map(Some)
    }

    fn unmatched(&self, node: &N, mode: &Mode, key: &KeyPath) -> Result<(), Error> {
        self.metrics.borrow_mut().unmatched += 1;
        match self.options.unmatched {
            UnmatchedPolicy::Ignore => {
                tracing::trace!(key = key.as_str(), %mode, kind = %node.kind(), "no rule matches, omitting node");
                Ok(())
            }
            UnmatchedPolicy::Warn => {
                tracing::warn!(key = key.as_str(), %mode, kind = %node.kind(), "no rule matches, omitting node");
                Ok(())
            }
            UnmatchedPolicy::Error => {
                Err(Error::Unmatched { key: key.as_str().to_string(), mode: mode.clone(), kind: node.kind() })
            }
        }
    }
}

/// Render context handed to a rule body.
///
/// Created for one invocation and dropped when the rule body returns.
pub struct Renderer<'t, N, O> {
    traversal: &'t Traversal<'t, N, O>,
    node: N,
    mode: Mode,
    key: KeyPath,
    depth: usize,
    /// Number of `traverse*` calls made so far by this rule body.
    call_sites: Cell<usize>,
    /// Whether the child hop (see `keys.rs`) has been used.
    child_hop_taken: Cell<bool>,
}

impl<'t, N: DocumentNode, O> Renderer<'t, N, O> {
    /// The node this rule was invoked for.
    pub fn node(&self) -> &N {
        &self.node
    }

    /// The mode this invocation runs in.
    ///
    /// For a rule reached through the default-mode fallback this is still the
    /// requested named mode; nested traversals inherit it.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Stable key of this invocation, unique within the traversal.
    pub fn key(&self) -> String {
        self.key.as_str().to_string()
    }

    /// Nesting depth; the render root is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Render all children in document order, in the current mode.
    pub fn traverse(&self) -> Result<Vec<O>, Error> {
        self.traverse_with(None, ModeSwitch::Inherit)
    }

    /// Render the nodes selected by `query`, in the current mode.
    pub fn traverse_query(&self, query: &str) -> Result<Vec<O>, Error> {
        self.traverse_with(Some(query), ModeSwitch::Inherit)
    }

    /// Render the nodes selected by `query` in `mode`.
    pub fn traverse_mode(&self, query: &str, mode: &str) -> Result<Vec<O>, Error> {
        self.traverse_with(Some(query), ModeSwitch::named(mode))
    }

    /// Render all children in the default mode, whatever the current mode is.
    pub fn traverse_reset(&self) -> Result<Vec<O>, Error> {
        self.traverse_with(None, ModeSwitch::Reset)
    }

    /// General form of the `traverse*` family.
    ///
    /// `query` of `None` selects all children in document order; otherwise the
    /// evaluator resolves it relative to this node and its order is kept. The
    /// mode switch only affects the nodes selected by this call. Nodes without
    /// a matching rule contribute nothing to the returned vector.
    pub fn traverse_with(&self, query: Option<&str>, switch: ModeSwitch) -> Result<Vec<O>, Error> {
        let site = self.call_sites.get();
        self.call_sites.set(site + 1);

        let mode = switch.apply(&self.mode);
        let nodes = match query {
            None => self.node.children(),
            Some(query) => self.traversal.evaluator.select(query, &self.node)?,
        };

        let child_hop = query.is_none() && mode.is_default() && !self.child_hop_taken.get();
        if child_hop {
            self.child_hop_taken.set(true);
        }

        let mut out = Vec::with_capacity(nodes.len());
        for (position, node) in nodes.into_iter().enumerate() {
            let hop = if child_hop { Hop::Child(position) } else { Hop::Visit { site, position, mode: &mode } };
            let key = self.key.descend(hop, node.identifier());
            if let Some(value) = self.traversal.invoke(node, mode.clone(), key, self.depth + 1)? {
                out.push(value);
            }
        }
        Ok(out)
    }
}

impl<N: std::fmt::Debug, O> std::fmt::Debug for Renderer<'_, N, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("node", &self.node)
            .field("mode", &self.mode)
            .field("key", &self.key.as_str())
            .field("depth", &self.depth)
            .finish()
    }
}
