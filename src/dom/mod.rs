//! In-memory document model and a reference path evaluator.
//!
//! The engine itself only needs the [`DocumentNode`](crate::DocumentNode) and
//! [`Evaluator`](crate::Evaluator) seams. This module provides one
//! implementation of each, so rules can be exercised without an external XML
//! stack:
//!
//! - [`Document`]: an arena tree built programmatically (no XML parsing).
//! - [`PathEvaluator`]: a location-path subset of XPath 1.0, enough for the
//!   usual template patterns (`self::div[@class]`, `./*[1]`, `parent::p`,
//!   `//section`, `self::text()`, unions, `not(...)`).

mod path;
mod tree;


pub use path::PathEvaluator;
pub use tree::{Document, NodeId, NodeRef};
