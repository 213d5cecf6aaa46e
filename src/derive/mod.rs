//! The derivation engine: rules, the trigger registry, and rule dynamics.
//!
//! A rule fires when the step loop dequeues an event whose target edge
//! matches one of the rule's trigger kinds (or always, for trigger-free
//! rules). Rules only read the store and indexes; they return [`Conclusion`]s
//! that the kernel applies through the ordinary add-hyperedge path, so every
//! derived belief carries premises and a rule name.
//!
//! Each firing is reported to the meta-reasoner. Rules whose success rate
//! collapses are disabled and re-enabled once their advised rate recovers.

pub mod rules;

use crate::graph::Hyperedge;
use crate::graph::index::IndexSet;
use crate::graph::store::Hypergraph;
use crate::propagate::Activations;
use crate::queue::Event;
use crate::term::{TermId, TermKind};
use crate::truth::Truth;

/// Attempts required before the success-rate dynamics may disable a rule.
const DYNAMICS_MIN_ATTEMPTS: u64 = 20;
/// Success rate below which a rule is disabled.
const DISABLE_BELOW: f32 = 0.1;
/// Success rate above which a disabled rule is re-enabled.
const ENABLE_ABOVE: f32 = 0.4;

/// Read-only view handed to a rule when it fires.
pub struct RuleContext<'a> {
    pub event: &'a Event,
    pub edge: &'a Hyperedge,
    pub store: &'a Hypergraph,
    pub indexes: &'a IndexSet,
    pub activations: &'a Activations,
}

/// What a rule wants done.
#[derive(Debug, Clone)]
pub enum Conclusion {
    /// Assert a derived edge.
    Edge {
        kind: TermKind,
        args: Vec<String>,
        truth: Truth,
        premises: Vec<TermId>,
    },
    /// Inject activation into an existing edge (conditional propagation).
    Activate { target: TermId, activation: f32 },
}

/// A derivation rule.
pub trait DerivationRule: Send + Sync {
    /// Stable rule name, used in provenance and productivity accounting.
    fn name(&self) -> &'static str;
    /// Edge kinds this rule fires on; `None` fires on every event.
    fn triggers(&self) -> Option<&'static [TermKind]>;
    /// Produce conclusions for the dequeued event.
    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion>;
}

/// Productivity record for one firing, consumed by the meta-reasoner.
#[derive(Debug, Clone, Copy)]
pub struct FiringReport {
    pub rule: &'static str,
    pub success: bool,
    /// Work performed, in conclusion-application units.
    pub cost: f32,
    /// Novel edges or strengthened beliefs produced.
    pub value: f32,
}

/// A registered rule with its scheduling state.
pub struct RuleEntry {
    rule: Box<dyn DerivationRule>,
    priority: f32,
    attempts: u64,
    successes: u64,
    enabled: bool,
}

impl RuleEntry {
    pub fn name(&self) -> &'static str {
        self.rule.name()
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn success_rate(&self) -> f32 {
        if self.attempts == 0 {
            return 1.0;
        }
        self.successes as f32 / self.attempts as f32
    }
}

/// A rule-dynamics transition applied during maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDynamicsChange {
    Disabled(&'static str),
    Enabled(&'static str),
}

/// Registry of derivation rules, iterated in descending effective priority.
pub struct RuleRegistry {
    entries: Vec<RuleEntry>,
}

impl RuleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry holding the built-in rule set.
    pub fn with_default_rules() -> Self {
        let mut reg = Self::new();
        reg.register(Box::new(rules::InheritanceTransitivity), 1.0);
        reg.register(Box::new(rules::AnalogyBridge), 0.9);
        reg.register(Box::new(rules::EquivalenceExpansion), 0.9);
        reg.register(Box::new(rules::ConditionalActivation), 0.8);
        reg.register(Box::new(rules::TemporalComposition), 0.7);
        reg
    }

    /// Add a rule with a base priority.
    pub fn register(&mut self, rule: Box<dyn DerivationRule>, priority: f32) {
        self.entries.push(RuleEntry {
            rule,
            priority: priority.clamp(0.0, 1.0),
            attempts: 0,
            successes: 0,
            enabled: true,
        });
    }

    /// Indices of the enabled rules matching a trigger kind, sorted by
    /// effective priority (base priority times the meta-reasoner's advice).
    pub fn candidates(&self, kind: TermKind, advice: impl Fn(&str) -> f32) -> Vec<usize> {
        let mut out: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.enabled
                    && e.rule
                        .triggers()
                        .map(|kinds| kinds.contains(&kind))
                        .unwrap_or(true)
            })
            .map(|(i, e)| (i, e.priority * advice(e.rule.name())))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out.into_iter().map(|(i, _)| i).collect()
    }

    /// Fire the rule at `index`.
    pub fn apply(&self, index: usize, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        self.entries[index].rule.apply(ctx)
    }

    /// The rule name at `index`.
    pub fn name_of(&self, index: usize) -> &'static str {
        self.entries[index].rule.name()
    }

    /// Record one firing outcome for the named rule.
    pub fn record(&mut self, name: &str, success: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.rule.name() == name) {
            entry.attempts += 1;
            if success {
                entry.successes += 1;
            }
        }
    }

    /// Override a rule's base priority.
    pub fn set_priority(&mut self, name: &str, priority: f32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.rule.name() == name) {
            entry.priority = priority.clamp(0.0, 1.0);
        }
    }

    /// Apply success-rate dynamics: disable collapsed rules, re-enable
    /// recovered ones. Returns the transitions taken.
    pub fn update_dynamics(&mut self) -> Vec<RuleDynamicsChange> {
        let mut changes = Vec::new();
        for entry in &mut self.entries {
            if entry.attempts < DYNAMICS_MIN_ATTEMPTS {
                continue;
            }
            let rate = entry.successes as f32 / entry.attempts as f32;
            if entry.enabled && rate < DISABLE_BELOW {
                entry.enabled = false;
                changes.push(RuleDynamicsChange::Disabled(entry.rule.name()));
            } else if !entry.enabled && rate > ENABLE_ABOVE {
                entry.enabled = true;
                changes.push(RuleDynamicsChange::Enabled(entry.rule.name()));
            }
        }
        changes
    }

    /// Per-rule (attempts, successes) pairs, for the meta-reasoner.
    pub fn stats(&self) -> impl Iterator<Item = (&'static str, u64, u64)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.rule.name(), e.attempts, e.successes))
    }

    /// All registered entries.
    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl DerivationRule for Inert {
        fn name(&self) -> &'static str {
            "inert"
        }
        fn triggers(&self) -> Option<&'static [TermKind]> {
            Some(&[TermKind::Inheritance])
        }
        fn apply(&self, _ctx: &RuleContext<'_>) -> Vec<Conclusion> {
            Vec::new()
        }
    }

    #[test]
    fn candidates_respect_triggers() {
        let mut reg = RuleRegistry::new();
        reg.register(Box::new(Inert), 0.5);
        assert_eq!(reg.candidates(TermKind::Inheritance, |_| 1.0).len(), 1);
        assert!(reg.candidates(TermKind::Similarity, |_| 1.0).is_empty());
    }

    #[test]
    fn advice_reorders_candidates() {
        let reg = RuleRegistry::with_default_rules();
        let plain = reg.candidates(TermKind::Inheritance, |_| 1.0);
        // Demote transitivity below everything else.
        let advised = reg.candidates(TermKind::Inheritance, |name| {
            if name == "inheritance-transitivity" { 0.1 } else { 1.0 }
        });
        assert_eq!(plain.len(), advised.len());
        assert_eq!(reg.name_of(plain[0]), "inheritance-transitivity");
        assert_ne!(reg.name_of(advised[0]), "inheritance-transitivity");
    }

    #[test]
    fn dynamics_disable_and_reenable() {
        let mut reg = RuleRegistry::new();
        reg.register(Box::new(Inert), 0.5);

        for _ in 0..30 {
            reg.record("inert", false);
        }
        let changes = reg.update_dynamics();
        assert_eq!(changes, vec![RuleDynamicsChange::Disabled("inert")]);
        assert!(reg.candidates(TermKind::Inheritance, |_| 1.0).is_empty());

        // A long run of successes brings the rate back over the bar.
        for _ in 0..30 {
            reg.record("inert", true);
        }
        let changes = reg.update_dynamics();
        assert_eq!(changes, vec![RuleDynamicsChange::Enabled("inert")]);
        assert_eq!(reg.candidates(TermKind::Inheritance, |_| 1.0).len(), 1);
    }

    #[test]
    fn fresh_rules_are_not_disabled() {
        let mut reg = RuleRegistry::new();
        reg.register(Box::new(Inert), 0.5);
        reg.record("inert", false);
        assert!(reg.update_dynamics().is_empty());
    }
}
