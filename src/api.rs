use std::time::{Duration, Instant};

use crate::engine::{self, ModeTable, RunMetrics, Traversal};
use crate::{DocumentNode, Error, Evaluator, Mode, NodeKind, PatternFeatures, Renderer, Rule, Specificity};

/// What to do with a node no rule matches, neither in the requested mode nor
/// in the default-mode fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedPolicy {
    /// Omit the node silently.
    #[default]
    Ignore,
    /// Omit the node and emit a `tracing` warning.
    Warn,
    /// Abort the traversal with [`Error::Unmatched`].
    Error,
}

impl std::str::FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" | "" => Ok(UnmatchedPolicy::Ignore),
            "warn" => Ok(UnmatchedPolicy::Warn),
            "error" => Ok(UnmatchedPolicy::Error),
            other => Err(format!("invalid unmatched policy '{other}' (expected ignore, warn or error)")),
        }
    }
}

/// Options that affect a traversal.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Mode the render root is rendered in.
    pub mode: Mode,
    pub unmatched: UnmatchedPolicy,
    /// Record every invocation (see [`render_verbose_with`]).
    pub trace: bool,
}

impl Options {
    /// Read options from the environment.
    ///
    /// - `XTEMPLATE_UNMATCHED`: `ignore` (default), `warn` or `error`;
    ///   unparseable values fall back to the default with a warning.
    /// - `XTEMPLATE_TRACE`: any value enables the invocation trace.
    ///
    /// The start mode is always the default mode.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var_os(name).map(|value| value.to_string_lossy().into_owned()))
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let unmatched = match var("XTEMPLATE_UNMATCHED") {
            Some(value) => value.parse().unwrap_or_else(|err: String| {
                tracing::warn!("{err}");
                UnmatchedPolicy::default()
            }),
            None => UnmatchedPolicy::default(),
        };
        Options { unmatched, trace: var("XTEMPLATE_TRACE").is_some(), ..Options::default() }
    }
}

/// Rules grouped by mode.
///
/// Registration happens before rendering; a registry is never modified by a
/// traversal and rules are never removed.
pub struct Registry<N, O> {
    table: ModeTable<N, O>,
}

impl<N, O> Default for Registry<N, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, O> Registry<N, O> {
    pub fn new() -> Self {
        Registry { table: ModeTable::new() }
    }

    /// Register a rule in the default mode.
    ///
    /// Overlapping or duplicate patterns are fine: the most specific pattern
    /// wins at render time, and among equally specific ones the latest
    /// registration does.
    pub fn register<F>(&mut self, pattern: &str, render: F) -> &mut Self
    where
        F: Fn(&Renderer<'_, N, O>) -> Result<O, Error> + Send + Sync + 'static,
    {
        self.insert(pattern, Mode::Default, Box::new(render));
        self
    }

    /// Sub-registry for the named mode. The empty name is the default mode.
    pub fn mode(&mut self, name: &str) -> ModeRegistry<'_, N, O> {
        ModeRegistry { registry: self, mode: Mode::named(name) }
    }

    /// Patterns registered in `mode`, in registration order. Unknown modes
    /// have none.
    pub fn rules_for(&self, mode: &Mode) -> Vec<&str> {
        self.table.rules_for(mode).iter().map(|r| r.pattern.as_str()).collect()
    }

    /// Modes that have rules, default mode first.
    pub fn modes(&self) -> Vec<&Mode> {
        self.table.modes()
    }

    /// Total number of registered rules.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, pattern: &str, mode: Mode, render: crate::RenderFn<N, O>) {
        let (specificity, features) = engine::analyze(pattern);
        let sequence = self.table.next_sequence();
        tracing::trace!(pattern, %mode, %specificity, sequence, "registering rule");
        self.table.insert(Rule { pattern: pattern.to_string(), mode, render, specificity, features, sequence });
    }
}

/// Registration surface scoped to one mode, from [`Registry::mode`].
pub struct ModeRegistry<'r, N, O> {
    registry: &'r mut Registry<N, O>,
    mode: Mode,
}

impl<N, O> ModeRegistry<'_, N, O> {
    /// Register a rule in this mode.
    pub fn register<F>(&mut self, pattern: &str, render: F) -> &mut Self
    where
        F: Fn(&Renderer<'_, N, O>) -> Result<O, Error> + Send + Sync + 'static,
    {
        self.registry.insert(pattern, self.mode.clone(), Box::new(render));
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }
}

/// Result from [`render_with`].
#[derive(Debug, Clone)]
pub struct RenderResult<O> {
    /// Output of the root rule; `None` when no rule matched the root.
    pub output: Option<O>,
    pub elapsed: Duration,
}

/// One rule invocation, in traversal order.
#[derive(Debug, Clone)]
pub struct InvocationSummary {
    pub key: String,
    pub pattern: String,
    /// Mode the traversal was in.
    pub mode: Mode,
    /// Mode the rule was registered in; differs from `mode` on fallback.
    pub rule_mode: Mode,
    pub specificity: Specificity,
    pub features: PatternFeatures,
    pub kind: NodeKind,
    pub depth: usize,
}

/// Additional details returned by [`render_verbose_with`].
#[derive(Debug, Clone)]
pub struct RenderDetails {
    pub total: Duration,
    pub invocations: usize,
    pub unmatched: usize,
    pub fallbacks: usize,
    pub max_depth: usize,
    /// Empty unless [`Options::trace`] is set.
    pub trace: Vec<InvocationSummary>,
}

/// Result from [`render_verbose_with`].
#[derive(Debug, Clone)]
pub struct RenderResultVerbose<O> {
    pub output: Option<O>,
    pub elapsed: Duration,
    pub details: RenderDetails,
}

/// Render `root` in the default mode with default [`Options`].
///
/// Returns `Ok(None)` when no rule matches the root.
///
/// # Example
/// ```
/// use xtemplate::dom::{Document, NodeRef, PathEvaluator};
/// use xtemplate::{DocumentNode, Registry, render};
///
/// let mut doc = Document::new();
/// doc.element(doc.root_id(), "div");
///
/// let mut registry: Registry<NodeRef<'_>, String> = Registry::new();
/// registry.register("self::element()", |r| Ok(r.key()));
///
/// let div = doc.root().children()[0];
/// assert_eq!(render(&registry, &PathEvaluator, &div).unwrap().as_deref(), Some("#"));
/// ```
pub fn render<N: DocumentNode, O>(
    registry: &Registry<N, O>,
    evaluator: &dyn Evaluator<N>,
    root: &N,
) -> Result<Option<O>, Error> {
    Ok(render_with(registry, evaluator, root, &Options::default())?.output)
}

/// Render `root` with explicit [`Options`].
pub fn render_with<N: DocumentNode, O>(
    registry: &Registry<N, O>,
    evaluator: &dyn Evaluator<N>,
    root: &N,
    options: &Options,
) -> Result<RenderResult<O>, Error> {
    let (output, metrics) = run(registry, evaluator, root, options)?;
    Ok(RenderResult { output, elapsed: metrics.total })
}

/// Render `root` and return run statistics (and the invocation trace when
/// [`Options::trace`] is set).
pub fn render_verbose_with<N: DocumentNode, O>(
    registry: &Registry<N, O>,
    evaluator: &dyn Evaluator<N>,
    root: &N,
    options: &Options,
) -> Result<RenderResultVerbose<O>, Error> {
    let (output, metrics) = run(registry, evaluator, root, options)?;

    let trace = metrics
        .trace
        .into_iter()
        .map(|inv| InvocationSummary {
            key: inv.key,
            pattern: inv.pattern,
            mode: inv.mode,
            rule_mode: inv.rule_mode,
            specificity: inv.specificity,
            features: inv.features,
            kind: inv.kind,
            depth: inv.depth,
        })
        .collect();

    let details = RenderDetails {
        total: metrics.total,
        invocations: metrics.invocations,
        unmatched: metrics.unmatched,
        fallbacks: metrics.fallbacks,
        max_depth: metrics.max_depth,
        trace,
    };

    Ok(RenderResultVerbose { output, elapsed: details.total, details })
}

fn run<N: DocumentNode, O>(
    registry: &Registry<N, O>,
    evaluator: &dyn Evaluator<N>,
    root: &N,
    options: &Options,
) -> Result<(Option<O>, RunMetrics), Error> {
    let start = Instant::now();
    let traversal = Traversal::new(&registry.table, evaluator, options);
    let output = traversal.render_root(root)?;
    let mut metrics = traversal.into_metrics();
    metrics.total = start.elapsed();
    Ok((output, metrics))
}
