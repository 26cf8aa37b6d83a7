//! Invocation keys.
//!
//! Every rule invocation gets a key that is
//!
//! - **stable**: re-rendering the same document with the same registry yields
//!   the same keys,
//! - **unique** within one traversal, even when a node is visited several
//!   times through different modes or `traverse` call sites, and even when
//!   several nodes share an identifier,
//! - **scoped** by the nearest identified ancestor: a node carrying an
//!   identifier starts a new prefix that all its descendants share.
//!
//! ## Shape
//!
//! ```text
//! #                 render root without identifier
//! #/0/2             path (child indices) from the root
//! #/0/1.0@my-mode   any other hop: <call site>.<position>[@mode]
//! OK[#/0/2]         identified node: identifier, then its path in brackets
//! OK[#/0/2/1]       descendant whose nearest identified ancestor is OK
//! ```
//!
//! The first all-children `traverse` in the default mode of a rule body is a
//! *child* hop and appends the bare child index. Every other hop spells out
//! the call site (the n-th `traverse` call of the invoking rule body) and the
//! position in that call's selection. Child segments never contain `.`, visit
//! segments always do, so siblings of one invocation cannot collide.
//!
//! The bracketed path never contains `[` or `]`: mode names are escaped before
//! they are appended. The path is therefore everything after the last `[`,
//! and it alone tells invocations apart. Identifiers are used verbatim.

use std::borrow::Cow;

use crate::Mode;

/// Path of the render root.
pub(crate) const ROOT_SCOPE: &str = "#";

/// How an invocation was reached from its parent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Hop<'m> {
    /// First default-mode, all-children traversal of a rule body.
    Child(usize),
    /// Anything else.
    Visit { site: usize, position: usize, mode: &'m Mode },
}

/// Key of one invocation plus what is needed to derive its children's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyPath {
    key: String,
    path: String,
    scope: Option<String>,
}

impl KeyPath {
    /// Key of the render root.
    pub(crate) fn root(identifier: Option<String>) -> Self {
        Self::scoped(ROOT_SCOPE.to_string(), identifier)
    }

    /// Key of the invocation reached from `self` through `hop`, for a node
    /// carrying `identifier`.
    pub(crate) fn descend(&self, hop: Hop<'_>, identifier: Option<String>) -> Self {
        let path = match hop {
            Hop::Child(position) => format!("{}/{}", self.path, position),
            Hop::Visit { site, position, mode } => {
                let mut path = format!("{}/{}.{}", self.path, site, position);
                if let Some(name) = mode.name() {
                    path.push('@');
                    path.push_str(&escape(name));
                }
                path
            }
        };
        Self::scoped(path, identifier.or_else(|| self.scope.clone()))
    }

    fn scoped(path: String, scope: Option<String>) -> Self {
        let key = match &scope {
            Some(id) => format!("{id}[{path}]"),
            None => path.clone(),
        };
        KeyPath { key, path, scope }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.key
    }
}

/// Percent-encode the characters that delimit path segments.
fn escape(name: &str) -> Cow<'_, str> {
    if !name.contains(['%', '/', '[', ']']) {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len() + 6);
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
