//! Rule selection and traversal engine.
//!
//! ## How the parts work together
//!
//! ```text
//! Registry::register ──┐
//!                      │  specificity(pattern)         (specificity.rs)
//!                      └──────────────┬──────────────
//!                                     │
//!                          ModeTable::insert           (modes.rs)
//!                            - rules per mode
//!                            - ranked index
//!                                     │
//! render(root) ── Traversal::invoke ──┼─ resolve(node, mode)   (resolve.rs)
//!                  (traversal.rs)     │    - named mode first
//!                                     │    - default mode fallback
//!                                     v
//!                            rule body(&Renderer)
//!                              - key()          (keys.rs)
//!                              - traverse*()  ──> Traversal::invoke ...
//! ```
//!
//! Registration is the only mutating phase. A traversal reads the registry,
//! never writes it, and owns nothing but run statistics.
//!
//! ## Responsibilities by module
//!
//! - `specificity.rs`: static scoring of pattern strings.
//! - `modes.rs`: rule storage grouped by mode, with a per-mode ranked index.
//! - `resolve.rs`: picks the single rule for a node, with default-mode fallback.
//! - `traversal.rs`: the recursive descent and the `Renderer` context.
//! - `keys.rs`: stable, collision-free invocation keys.
//! - `metrics.rs`: run statistics and the optional invocation trace.
//!
//! ## Debugging
//!
//! Rule selection is reported through `tracing` at `debug`/`trace` level.

#[path = "engine/keys.rs"]
mod keys;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/modes.rs"]
mod modes;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/specificity.rs"]
mod specificity;
#[path = "engine/traversal.rs"]
mod traversal;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub(crate) use metrics::RunMetrics;
pub(crate) use modes::ModeTable;
pub(crate) use specificity::analyze;
pub use specificity::{PatternFeatures, Specificity};
pub(crate) use traversal::Traversal;
pub use traversal::{ModeSwitch, Renderer};
