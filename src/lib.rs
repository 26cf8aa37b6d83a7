//! Rule-based tree transformation.
//!
//! Register pattern-guarded rules in a [`Registry`], then [`render`] a
//! document node. For every visited node exactly one rule is chosen (the most
//! specific pattern wins, later registrations break ties), and the rule body
//! gets a [`Renderer`] through which it reads its node, mints a stable
//! [`key`](Renderer::key) and recurses with [`traverse`](Renderer::traverse).
//!
//! ```
//! use xtemplate::dom::{Document, NodeRef, PathEvaluator};
//! use xtemplate::{Registry, render};
//!
//! let mut doc = Document::new();
//! let div = doc.element(doc.root_id(), "div");
//! doc.text(div, "hello");
//!
//! let mut registry: Registry<NodeRef<'_>, String> = Registry::new();
//! registry.register("self::document-node()", |r| Ok(r.traverse()?.concat()));
//! registry.register("self::div", |r| Ok(format!("<{}>{}</>", r.key(), r.traverse()?.concat())));
//! registry.register("self::text()", |r| Ok(r.node().value().unwrap_or_default().to_string()));
//!
//! let out = render(&registry, &PathEvaluator, &doc.root()).unwrap();
//! assert_eq!(out.as_deref(), Some("<#/0>hello</>"));
//! ```

use std::sync::Arc;

#[macro_use]
mod macros;
mod api;
pub mod dom;
mod engine;
mod error;
mod node;
pub mod report;

pub use api::{
    InvocationSummary, ModeRegistry, Options, Registry, RenderDetails, RenderResult, RenderResultVerbose,
    UnmatchedPolicy, render, render_verbose_with, render_with,
};
pub use engine::{ModeSwitch, PatternFeatures, Renderer, Specificity};
pub use error::{BoxError, Error, EvalError};
pub use node::{DocumentNode, Evaluator, NodeKind};

// --- Shared types -----------------------------------------------------------

/// A named namespace of rules.
///
/// Traversal always happens in exactly one mode. The default mode doubles as
/// the fallback for every named mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Default,
    Named(Arc<str>),
}

impl Mode {
    /// Build a mode from its name; the empty name is the default mode.
    pub fn named(name: &str) -> Self {
        if name.is_empty() { Mode::Default } else { Mode::Named(Arc::from(name)) }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Mode::Default)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Mode::Default => None,
            Mode::Named(name) => Some(name),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Default => f.write_str("#default"),
            Mode::Named(name) => f.write_str(name),
        }
    }
}

/// Rule body: receives the render context and produces an output value.
pub(crate) type RenderFn<N, O> = Box<dyn Fn(&Renderer<'_, N, O>) -> Result<O, Error> + Send + Sync>;

/// A registered rule. Immutable once registered.
pub(crate) struct Rule<N, O> {
    pub pattern: String,
    pub mode: Mode,
    pub render: RenderFn<N, O>,
    /// Computed once from `pattern`.
    pub specificity: Specificity,
    pub features: PatternFeatures,
    /// Global registration counter, only used to break specificity ties.
    pub sequence: u64,
}

impl<N, O> std::fmt::Debug for Rule<N, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern)
            .field("mode", &self.mode)
            .field("render", &"<function>")
            .field("specificity", &self.specificity)
            .field("sequence", &self.sequence)
            .finish()
    }
}
