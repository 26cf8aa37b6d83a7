//! Rule storage grouped by mode.
//!
//! This is the *static* side of the engine, the counterpart of a compiled rule
//! set: everything here is computed while rules are registered, so that a
//! traversal only has to walk a pre-ranked list.
//!
//! ## Invariants
//!
//! - Rules are only ever appended; `RuleId`s index into `ModeRules::rules`.
//! - `ModeRules::ranked` holds every id of `rules` exactly once, ordered by
//!   (specificity desc, sequence desc). Walking it front to back and stopping
//!   at the first match picks the same rule as "highest specificity, latest
//!   registration on ties".
//! - The default mode entry always exists.

use std::collections::HashMap;

use super::specificity::rank;
use crate::{Mode, Rule};

/// Rule identifier (index into `ModeRules::rules`).
pub(crate) type RuleId = usize;

pub(crate) struct ModeRules<N, O> {
    rules: Vec<Rule<N, O>>,
    ranked: Vec<RuleId>,
}

impl<N, O> ModeRules<N, O> {
    fn new() -> Self {
        ModeRules { rules: Vec::new(), ranked: Vec::new() }
    }

    fn insert(&mut self, rule: Rule<N, O>) {
        let key = (rule.specificity, rule.sequence);
        let at = self.ranked.partition_point(|&id| {
            let other = &self.rules[id];
            rank((other.specificity, other.sequence), key).is_lt()
        });
        self.rules.push(rule);
        self.ranked.insert(at, self.rules.len() - 1);
    }

    /// Rules in registration order.
    pub(crate) fn rules(&self) -> &[Rule<N, O>] {
        &self.rules
    }

    /// Rules from most to least preferred.
    pub(crate) fn ranked(&self) -> impl Iterator<Item = &Rule<N, O>> {
        self.ranked.iter().map(move |&id| &self.rules[id])
    }
}

/// Mode name -> rules registered under it.
pub(crate) struct ModeTable<N, O> {
    modes: HashMap<Mode, ModeRules<N, O>>,
    next_sequence: u64,
}

impl<N, O> ModeTable<N, O> {
    pub(crate) fn new() -> Self {
        let mut modes = HashMap::new();
        modes.insert(Mode::Default, ModeRules::new());
        ModeTable { modes, next_sequence: 0 }
    }

    /// Hand out the next registration sequence number.
    pub(crate) fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    pub(crate) fn insert(&mut self, rule: Rule<N, O>) {
        self.modes.entry(rule.mode.clone()).or_insert_with(ModeRules::new).insert(rule);
    }

    /// Rules of `mode`; `None` for a mode nobody registered into.
    pub(crate) fn get(&self, mode: &Mode) -> Option<&ModeRules<N, O>> {
        self.modes.get(mode)
    }

    /// Rules of `mode` in registration order, empty for unknown modes.
    pub(crate) fn rules_for(&self, mode: &Mode) -> &[Rule<N, O>] {
        self.get(mode).map(ModeRules::rules).unwrap_or(&[])
    }

    pub(crate) fn len(&self) -> usize {
        self.modes.values().map(|m| m.rules.len()).sum()
    }

    /// Named modes plus the default mode, sorted by name for stable output.
    pub(crate) fn modes(&self) -> Vec<&Mode> {
        let mut modes: Vec<&Mode> = self.modes.keys().collect();
        modes.sort_by(|a, b| a.name().cmp(&b.name()));
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Specificity;
    use crate::engine::{PatternFeatures, Renderer};

    fn rule(table: &mut ModeTable<(), ()>, pattern: &str, mode: Mode) -> Rule<(), ()> {
        Rule {
            pattern: pattern.to_string(),
            mode,
            render: Box::new(|_: &Renderer<'_, (), ()>| Ok(())),
            specificity: Specificity::of(pattern),
            features: PatternFeatures::empty(),
            sequence: table.next_sequence(),
        }
    }

    #[test]
    fn ranked_order_follows_specificity_then_recency() {
        let mut table = ModeTable::new();
        for pattern in ["self::div", "self::div[@a]", "self::*", "self::div"] {
            let r = rule(&mut table, pattern, Mode::Default);
            table.insert(r);
        }

        let ranked: Vec<(&str, u64)> =
            table.get(&Mode::Default).unwrap().ranked().map(|r| (r.pattern.as_str(), r.sequence)).collect();
        assert_eq!(ranked, vec![("self::div[@a]", 1), ("self::div", 3), ("self::div", 0), ("self::*", 2)]);

        let registered: Vec<u64> = table.rules_for(&Mode::Default).iter().map(|r| r.sequence).collect();
        assert_eq!(registered, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unknown_mode_is_empty() {
        let mut table: ModeTable<(), ()> = ModeTable::new();
        let r = rule(&mut table, "self::fn", Mode::named("my-mode"));
        table.insert(r);

        assert!(table.rules_for(&Mode::named("other")).is_empty());
        assert_eq!(table.rules_for(&Mode::named("my-mode")).len(), 1);
        assert!(table.rules_for(&Mode::Default).is_empty());
        assert_eq!(table.len(), 1);
        assert_eq!(table.modes(), vec![&Mode::Default, &Mode::named("my-mode")]);
    }
}
