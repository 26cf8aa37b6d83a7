//! Static pattern scoring.
//!
//! Every rule gets a [`Specificity`] at registration time. The score is a pure
//! function of the pattern string; no document is ever consulted. Comparison is
//! lexicographic over:
//!
//! ```text
//! (predicates, attribute predicates, node-test weight, steps)
//! ```
//!
//! which guarantees the ordering contract rules rely on:
//!
//! - a predicate (attribute or otherwise) always outranks its absence,
//! - a concrete name test ranks at least as high as a wildcard,
//! - adding a predicate never lowers the score.
//!
//! Node-test weights: `*` / `node()` = 0, kind tests (`text()`, `comment()`,
//! `element()`, `prefix:*`, ...) = 1, names and `element(name)` = 2.
//!
//! The lexer is shallow: it only tracks bracket/parenthesis depth
//! and string literals. The grammar proper belongs to the evaluator.

use std::cmp::Ordering;

bitflags::bitflags! {
    /// Structural features found in a pattern.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatternFeatures: u16 {
        const NAME_TEST            = 1 << 0;
        const WILDCARD             = 1 << 1;
        const KIND_TEST            = 1 << 2;
        const PREDICATE            = 1 << 3;
        const ATTRIBUTE_PREDICATE  = 1 << 4;
        const POSITIONAL_PREDICATE = 1 << 5;
        const UNION                = 1 << 6;
    }
}

/// Static rank of a pattern. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Specificity {
    pub predicates: u16,
    pub attribute_predicates: u16,
    pub node_tests: u16,
    pub steps: u16,
}

impl Specificity {
    /// Score `pattern`.
    pub fn of(pattern: &str) -> Self {
        analyze(pattern).0
    }

    fn add(self, other: Specificity) -> Specificity {
        Specificity {
            predicates: self.predicates.saturating_add(other.predicates),
            attribute_predicates: self.attribute_predicates.saturating_add(other.attribute_predicates),
            node_tests: self.node_tests.saturating_add(other.node_tests),
            steps: self.steps.saturating_add(other.steps),
        }
    }
}

impl std::fmt::Display for Specificity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{},{})", self.predicates, self.attribute_predicates, self.node_tests, self.steps)
    }
}

/// Score `pattern` and collect its features.
pub(crate) fn analyze(pattern: &str) -> (Specificity, PatternFeatures) {
    // String literals may contain any of the structural characters.
    let stripped = regex!(r#""[^"]*"|'[^']*'"#).replace_all(pattern, "''");

    let mut features = PatternFeatures::empty();
    let branches = split_top_level(&stripped, '|');
    if branches.len() > 1 {
        features |= PatternFeatures::UNION;
    }

    let mut score: Option<Specificity> = None;
    for branch in branches {
        let branch_score = analyze_branch(branch, &mut features);
        score = Some(match score {
            // A union is only as specific as its weakest alternative.
            Some(current) => current.min(branch_score),
            None => branch_score,
        });
    }

    (score.unwrap_or_default(), features)
}

fn analyze_branch(branch: &str, features: &mut PatternFeatures) -> Specificity {
    let mut total = Specificity::default();
    for step in split_top_level(branch, '/') {
        let step = step.trim();
        if step.is_empty() {
            continue;
        }
        total = total.add(analyze_step(step, features));
    }
    total
}

fn analyze_step(step: &str, features: &mut PatternFeatures) -> Specificity {
    let (test, predicates) = split_predicates(step);
    let mut score = Specificity { steps: 1, node_tests: node_test_weight(test, features), ..Default::default() };

    for predicate in predicates {
        score.predicates = score.predicates.saturating_add(1);
        *features |= PatternFeatures::PREDICATE;
        if predicate.contains('@') {
            score.attribute_predicates = score.attribute_predicates.saturating_add(1);
            *features |= PatternFeatures::ATTRIBUTE_PREDICATE;
        }
        if is_positional(predicate) {
            *features |= PatternFeatures::POSITIONAL_PREDICATE;
        }
    }
    score
}

fn node_test_weight(test: &str, features: &mut PatternFeatures) -> u16 {
    let test = test.trim();
    let test = match test.find("::") {
        Some(idx) => &test[idx + 2..],
        None => test.trim_start_matches('@'),
    };
    let test = test.trim();

    if test.is_empty() || test == "*" || test == "." || test == ".." || test == "node()" {
        *features |= PatternFeatures::WILDCARD;
        return 0;
    }
    if let Some(caps) = regex!(r"^(element|attribute)\(\s*([^),\s]*)").captures(test) {
        let named = caps.get(2).map(|m| !m.as_str().is_empty() && m.as_str() != "*").unwrap_or(false);
        if named {
            *features |= PatternFeatures::NAME_TEST;
            return 2;
        }
        *features |= PatternFeatures::KIND_TEST;
        return 1;
    }
    if test.ends_with(')') || test.ends_with(":*") {
        *features |= PatternFeatures::KIND_TEST;
        return 1;
    }
    *features |= PatternFeatures::NAME_TEST;
    2
}

fn is_positional(predicate: &str) -> bool {
    let trimmed = predicate.trim();
    trimmed.parse::<u32>().is_ok() || trimmed.contains("position()") || trimmed.contains("last()")
}

/// Split on `sep` where bracket and parenthesis depth are both zero.
pub(crate) fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Split a step into its node test and the contents of its top-level predicates.
fn split_predicates(step: &str) -> (&str, Vec<&str>) {
    let mut predicates = Vec::new();
    let mut test_end = None;
    let mut depth = 0i32;
    let mut open = 0;
    for (idx, ch) in step.char_indices() {
        match ch {
            '[' => {
                if depth == 0 {
                    test_end.get_or_insert(idx);
                    open = idx + 1;
                }
                depth += 1;
            }
            ']' => {
                depth -= 1;
                if depth == 0 {
                    predicates.push(&step[open..idx]);
                }
            }
            _ => {}
        }
    }
    (&step[..test_end.unwrap_or(step.len())], predicates)
}

/// Ranking used by the resolver: higher specificity first, then later
/// registrations first.
pub(crate) fn rank(a: (Specificity, u64), b: (Specificity, u64)) -> Ordering {
    b.0.cmp(&a.0).then(b.1.cmp(&a.1))
}
