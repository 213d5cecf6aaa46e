//! Contradiction detection and resolution.
//!
//! A contradiction exists on an edge when the strongest belief and another
//! belief disagree in frequency by more than the configured threshold while
//! both are well supported (confidence above 0.5). Records are keyed by the
//! pair's truth signature, so repeated detection of the same conflict is
//! idempotent.
//!
//! Resolution strategies are trait objects tried in configured order; the
//! first one that reports success wins, and a record is resolved by at most
//! one strategy per pass. The `specialize` strategy cannot finish on its
//! own — it asks the kernel to move the minority belief onto a context-split
//! edge and assert a similarity between the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{Belief, Hyperedge, now_millis};
use crate::term::TermId;
use crate::truth::Truth;

/// Timestamp gap beyond which a conflicting pair is split into a temporal
/// context rather than a generic one.
const TEMPORAL_CONTEXT_GAP_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A detected, possibly resolved contradiction on one edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionRecord {
    /// Signature of the conflicting pair (idempotency key).
    pub signature: String,
    /// The edge the conflict lives on.
    pub edge: TermId,
    /// Disagreement weighted by the weaker confidence, in [0, 1].
    pub severity: f32,
    /// When the conflict was first detected (milliseconds since epoch).
    pub detected_at: u64,
    /// Whether a strategy has handled this record.
    pub resolved: bool,
    /// Name of the strategy that resolved it.
    pub strategy: Option<&'static str>,
}

/// Find the strongest belief and its most conflicting partner.
fn conflicting_pair(edge: &Hyperedge, threshold: f32) -> Option<(usize, usize, f32)> {
    let strongest = edge.beliefs.first()?;
    if strongest.truth.confidence <= 0.5 {
        return None;
    }
    let mut worst: Option<(usize, f32)> = None;
    for (i, other) in edge.beliefs.iter().enumerate().skip(1) {
        if other.truth.confidence <= 0.5 {
            continue;
        }
        let gap = (strongest.truth.frequency - other.truth.frequency).abs();
        if gap > threshold && worst.map(|(_, g)| gap > g).unwrap_or(true) {
            worst = Some((i, gap));
        }
    }
    worst.map(|(i, gap)| {
        let severity =
            gap * edge.beliefs[0].truth.confidence.min(edge.beliefs[i].truth.confidence);
        (0, i, severity)
    })
}

fn signature(edge: &TermId, a: &Truth, b: &Truth) -> String {
    let (x, y) = if a.frequency <= b.frequency { (a, b) } else { (b, a) };
    format!(
        "{}#{:.3}:{:.3}|{:.3}:{:.3}",
        edge, x.frequency, x.confidence, y.frequency, y.confidence
    )
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Outcome of one strategy's attempt on one contradiction.
#[derive(Debug)]
pub enum Resolution {
    /// The strategy does not apply; try the next one.
    NotApplicable,
    /// The edge was repaired in place.
    Resolved,
    /// The minority belief must move to a context-split edge (kernel work).
    Split { minority: Belief, context: String },
}

/// Shared inputs for resolution strategies.
pub struct ResolutionContext<'a> {
    /// Per-source reliability multipliers (belief context → weight).
    pub reliability: &'a HashMap<String, f32>,
    /// The detection threshold in force.
    pub threshold: f32,
    /// The kernel's current context tag, if any.
    pub active_context: Option<&'a str>,
}

/// A contradiction-resolution strategy.
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution;
}

/// The built-in strategies, in their default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    DominantEvidence,
    Merge,
    Recency,
    EvidenceWeighted,
    SourceReliability,
    Specialize,
}

impl StrategyKind {
    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn ResolutionStrategy> {
        match self {
            StrategyKind::DominantEvidence => Box::new(DominantEvidence),
            StrategyKind::Merge => Box::new(Merge),
            StrategyKind::Recency => Box::new(Recency),
            StrategyKind::EvidenceWeighted => Box::new(EvidenceWeighted),
            StrategyKind::SourceReliability => Box::new(SourceReliability),
            StrategyKind::Specialize => Box::new(Specialize),
        }
    }

    /// The default chain: every built-in strategy, tried in this order.
    pub fn default_chain() -> Vec<StrategyKind> {
        vec![
            StrategyKind::DominantEvidence,
            StrategyKind::Merge,
            StrategyKind::Recency,
            StrategyKind::EvidenceWeighted,
            StrategyKind::SourceReliability,
            StrategyKind::Specialize,
        ]
    }
}

/// Weaken everything but a clearly dominant belief.
struct DominantEvidence;

impl ResolutionStrategy for DominantEvidence {
    fn name(&self) -> &'static str {
        "dominant-evidence"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        if conflicting_pair(edge, ctx.threshold).is_none() {
            return Resolution::NotApplicable;
        }
        let mut strengths: Vec<f32> = edge.beliefs.iter().map(Belief::evidence).collect();
        strengths.sort_by(|a, b| b.total_cmp(a));
        let (Some(&top), Some(&second)) = (strengths.first(), strengths.get(1)) else {
            return Resolution::NotApplicable;
        };
        if top <= second * 1.5 {
            return Resolution::NotApplicable;
        }
        let top_idx = edge
            .beliefs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.evidence().total_cmp(&b.evidence()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        for (i, belief) in edge.beliefs.iter_mut().enumerate() {
            if i != top_idx {
                belief.truth.confidence *= 0.5;
                belief.budget = belief.budget.scale(0.5);
            }
        }
        Resolution::Resolved
    }
}

/// Revise the conflicting pair into one belief with attenuated confidence.
struct Merge;

impl ResolutionStrategy for Merge {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        let Some((i, j, _)) = conflicting_pair(edge, ctx.threshold) else {
            return Resolution::NotApplicable;
        };
        let other = edge.beliefs.remove(j);
        let keeper = &mut edge.beliefs[i];
        let mut truth = keeper.truth.revise(&other.truth);
        truth.confidence *= 0.8;
        keeper.truth = truth;
        keeper.budget = keeper.budget.merge(&other.budget);
        for p in other.premises {
            if !keeper.premises.contains(&p) {
                keeper.premises.push(p);
            }
        }
        keeper.timestamp = keeper.timestamp.max(other.timestamp);
        Resolution::Resolved
    }
}

/// Keep whichever of the pair is most recent.
struct Recency;

impl ResolutionStrategy for Recency {
    fn name(&self) -> &'static str {
        "recency"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        let Some((i, j, _)) = conflicting_pair(edge, ctx.threshold) else {
            return Resolution::NotApplicable;
        };
        let drop = if edge.beliefs[i].timestamp >= edge.beliefs[j].timestamp {
            j
        } else {
            i
        };
        edge.beliefs.remove(drop);
        Resolution::Resolved
    }
}

fn weighted_collapse(edge: &mut Hyperedge, weights: &[f32]) -> Resolution {
    let total: f32 = weights.iter().sum();
    if total <= f32::EPSILON {
        return Resolution::NotApplicable;
    }
    let frequency = edge
        .beliefs
        .iter()
        .zip(weights)
        .map(|(b, w)| b.truth.frequency * w)
        .sum::<f32>()
        / total;
    let confidence = edge
        .beliefs
        .iter()
        .zip(weights)
        .map(|(b, w)| b.truth.confidence * w)
        .sum::<f32>()
        / total;
    let budget = edge
        .beliefs
        .iter()
        .skip(1)
        .fold(edge.beliefs[0].budget, |acc, b| acc.merge(&b.budget));
    let timestamp = edge.beliefs.iter().map(|b| b.timestamp).max().unwrap_or(0);
    let premises = edge
        .beliefs
        .iter()
        .flat_map(|b| b.premises.iter().cloned())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    edge.beliefs = vec![
        Belief::new(Truth::new(frequency, confidence), budget)
            .with_premises(premises)
            .with_timestamp(timestamp),
    ];
    Resolution::Resolved
}

/// Replace all beliefs with the evidence-weighted mean.
struct EvidenceWeighted;

impl ResolutionStrategy for EvidenceWeighted {
    fn name(&self) -> &'static str {
        "evidence-weighted"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        if conflicting_pair(edge, ctx.threshold).is_none() {
            return Resolution::NotApplicable;
        }
        let weights: Vec<f32> = edge.beliefs.iter().map(Belief::evidence).collect();
        weighted_collapse(edge, &weights)
    }
}

/// Evidence-weighted mean with per-source reliability multipliers.
struct SourceReliability;

impl ResolutionStrategy for SourceReliability {
    fn name(&self) -> &'static str {
        "source-reliability"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        if conflicting_pair(edge, ctx.threshold).is_none() {
            return Resolution::NotApplicable;
        }
        let any_known = edge
            .beliefs
            .iter()
            .any(|b| b.context.as_deref().is_some_and(|c| ctx.reliability.contains_key(c)));
        if !any_known {
            return Resolution::NotApplicable;
        }
        let weights: Vec<f32> = edge
            .beliefs
            .iter()
            .map(|b| {
                let factor = b
                    .context
                    .as_deref()
                    .and_then(|c| ctx.reliability.get(c))
                    .copied()
                    .unwrap_or(0.5);
                b.evidence() * factor
            })
            .collect();
        weighted_collapse(edge, &weights)
    }
}

/// Move the minority belief onto a context-split edge.
struct Specialize;

impl ResolutionStrategy for Specialize {
    fn name(&self) -> &'static str {
        "specialize"
    }

    fn resolve(&self, edge: &mut Hyperedge, ctx: &ResolutionContext<'_>) -> Resolution {
        let Some((i, j, _)) = conflicting_pair(edge, ctx.threshold) else {
            return Resolution::NotApplicable;
        };
        let minority_idx = if edge.beliefs[i].evidence() <= edge.beliefs[j].evidence() {
            i
        } else {
            j
        };
        let gap = edge.beliefs[i]
            .timestamp
            .abs_diff(edge.beliefs[j].timestamp);
        let context = if gap > TEMPORAL_CONTEXT_GAP_MS {
            "temporal".to_string()
        } else {
            ctx.active_context.unwrap_or("default").to_string()
        };
        let minority = edge.beliefs.remove(minority_idx);
        Resolution::Split { minority, context }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// A resolution that the kernel must finish by splitting an edge.
#[derive(Debug)]
pub struct SplitRequest {
    pub edge: TermId,
    pub minority: Belief,
    pub context: String,
}

/// Report for one resolved contradiction.
#[derive(Debug)]
pub struct ResolutionReport {
    pub signature: String,
    pub edge: TermId,
    pub strategy: &'static str,
    pub split: Option<SplitRequest>,
}

/// Owns contradiction records, the strategy chain, and source reliability.
pub struct ContradictionManager {
    records: HashMap<String, ContradictionRecord>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    reliability: HashMap<String, f32>,
}

impl ContradictionManager {
    /// Manager with the default strategy chain.
    pub fn new() -> Self {
        Self::with_strategies(StrategyKind::default_chain())
    }

    /// Manager with an explicit strategy order.
    pub fn with_strategies(kinds: Vec<StrategyKind>) -> Self {
        Self {
            records: HashMap::new(),
            strategies: kinds.iter().map(StrategyKind::build).collect(),
            reliability: HashMap::new(),
        }
    }

    /// Replace the strategy chain.
    pub fn set_strategies(&mut self, kinds: Vec<StrategyKind>) {
        self.strategies = kinds.iter().map(StrategyKind::build).collect();
    }

    /// Record how reliable a belief context/source is (weight multiplier).
    pub fn set_reliability(&mut self, source: impl Into<String>, weight: f32) {
        self.reliability.insert(source.into(), weight.max(0.0));
    }

    /// Check an edge for contradictions, inserting new records.
    ///
    /// Returns the newly detected records (repeat detections are silent).
    pub fn detect(&mut self, edge: &Hyperedge, threshold: f32) -> Vec<ContradictionRecord> {
        let Some((i, j, severity)) = conflicting_pair(edge, threshold) else {
            return Vec::new();
        };
        let sig = signature(&edge.id, &edge.beliefs[i].truth, &edge.beliefs[j].truth);
        if self.records.contains_key(&sig) {
            return Vec::new();
        }
        let record = ContradictionRecord {
            signature: sig.clone(),
            edge: edge.id.clone(),
            severity,
            detected_at: now_millis(),
            resolved: false,
            strategy: None,
        };
        self.records.insert(sig, record.clone());
        tracing::warn!(edge = %record.edge, severity, "contradiction detected");
        vec![record]
    }

    /// Resolve every unresolved record against the store.
    ///
    /// Strategies are tried in order; the first success wins. Records whose
    /// edge vanished, or whose conflict no longer holds, are dropped.
    pub fn resolve_pending(
        &mut self,
        store: &mut crate::graph::store::Hypergraph,
        threshold: f32,
        active_context: Option<&str>,
    ) -> Vec<ResolutionReport> {
        let pending: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| !r.resolved)
            .map(|(sig, _)| sig.clone())
            .collect();
        self.resolve_records(pending, store, threshold, active_context)
    }

    /// Resolve the pending records on one edge immediately.
    pub fn resolve_edge(
        &mut self,
        store: &mut crate::graph::store::Hypergraph,
        edge: &TermId,
        threshold: f32,
        active_context: Option<&str>,
    ) -> Vec<ResolutionReport> {
        let pending: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| !r.resolved && &r.edge == edge)
            .map(|(sig, _)| sig.clone())
            .collect();
        self.resolve_records(pending, store, threshold, active_context)
    }

    fn resolve_records(
        &mut self,
        pending: Vec<String>,
        store: &mut crate::graph::store::Hypergraph,
        threshold: f32,
        active_context: Option<&str>,
    ) -> Vec<ResolutionReport> {
        let mut reports = Vec::new();
        for sig in pending {
            let Some(record) = self.records.get(&sig) else {
                continue;
            };
            let edge_id = record.edge.clone();
            let Some(edge) = store.get_mut(&edge_id) else {
                self.records.remove(&sig);
                continue;
            };
            if conflicting_pair(edge, threshold).is_none() {
                self.records.remove(&sig);
                continue;
            }

            let ctx = ResolutionContext {
                reliability: &self.reliability,
                threshold,
                active_context,
            };
            let mut applied: Option<(&'static str, Option<SplitRequest>)> = None;
            for strategy in &self.strategies {
                match strategy.resolve(edge, &ctx) {
                    Resolution::NotApplicable => continue,
                    Resolution::Resolved => {
                        applied = Some((strategy.name(), None));
                        break;
                    }
                    Resolution::Split { minority, context } => {
                        applied = Some((
                            strategy.name(),
                            Some(SplitRequest {
                                edge: edge_id.clone(),
                                minority,
                                context,
                            }),
                        ));
                        break;
                    }
                }
            }

            if let Some((name, split)) = applied {
                edge.beliefs.sort_by(|a, b| {
                    b.budget
                        .priority
                        .total_cmp(&a.budget.priority)
                        .then(b.timestamp.cmp(&a.timestamp))
                });
                if let Some(record) = self.records.get_mut(&sig) {
                    record.resolved = true;
                    record.strategy = Some(name);
                }
                reports.push(ResolutionReport {
                    signature: sig,
                    edge: edge_id,
                    strategy: name,
                    split,
                });
            }
        }
        reports
    }

    /// All records, resolved or not.
    pub fn records(&self) -> impl Iterator<Item = &ContradictionRecord> {
        self.records.values()
    }

    /// Number of unresolved records.
    pub fn unresolved_count(&self) -> usize {
        self.records.values().filter(|r| !r.resolved).count()
    }

    /// Drop everything (snapshot restore).
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for ContradictionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContradictionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContradictionManager")
            .field("records", &self.records.len())
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::Hypergraph;
    use crate::term::TermKind;
    use crate::truth::Budget;

    fn conflicted_edge(store: &mut Hypergraph) -> TermId {
        let (id, _) = store.upsert(TermKind::Atom, vec!["a".into()]);
        store.revise(
            &id,
            Belief::new(Truth::new(0.9, 0.9), Budget::default()),
        );
        store.revise(
            &id,
            Belief::new(Truth::new(0.1, 0.9), Budget::default())
                .with_premises(vec![TermId::raw("Term(src)")]),
        );
        id
    }

    #[test]
    fn detection_requires_confident_disagreement() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::new();
        let id = conflicted_edge(&mut store);

        let found = mgr.detect(store.get(&id).unwrap(), 0.7);
        assert_eq!(found.len(), 1);
        assert!(found[0].severity > 0.7);

        // Repeat detection is idempotent.
        let again = mgr.detect(store.get(&id).unwrap(), 0.7);
        assert!(again.is_empty());
    }

    #[test]
    fn weak_confidence_is_not_a_contradiction() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::new();
        let (id, _) = store.upsert(TermKind::Atom, vec!["a".into()]);
        store.revise(&id, Belief::new(Truth::new(0.9, 0.9), Budget::default()));
        store.revise(
            &id,
            Belief::new(Truth::new(0.1, 0.3), Budget::default())
                .with_premises(vec![TermId::raw("Term(src)")]),
        );
        assert!(mgr.detect(store.get(&id).unwrap(), 0.7).is_empty());
    }

    #[test]
    fn merge_produces_single_moderate_belief() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::new();
        let id = conflicted_edge(&mut store);
        mgr.detect(store.get(&id).unwrap(), 0.7);

        let reports = mgr.resolve_pending(&mut store, 0.7, None);
        assert_eq!(reports.len(), 1);
        // Equivalent budgets: dominant-evidence passes, merge handles it.
        assert_eq!(reports[0].strategy, "merge");

        let edge = store.get(&id).unwrap();
        assert_eq!(edge.beliefs.len(), 1);
        let t = edge.truth();
        assert!(t.frequency > 0.2 && t.frequency < 0.8, "f = {}", t.frequency);
        assert!(t.confidence < 0.9, "c = {}", t.confidence);
    }

    #[test]
    fn dominant_evidence_weakens_the_minority() {
        let mut store = Hypergraph::new(8);
        let mut mgr =
            ContradictionManager::with_strategies(vec![StrategyKind::DominantEvidence]);
        let (id, _) = store.upsert(TermKind::Atom, vec!["a".into()]);
        store.revise(
            &id,
            Belief::new(Truth::new(0.9, 0.9), Budget::new(0.9, 0.9, 0.9)),
        );
        store.revise(
            &id,
            Belief::new(Truth::new(0.1, 0.6), Budget::new(0.3, 0.3, 0.3))
                .with_premises(vec![TermId::raw("Term(src)")]),
        );
        mgr.detect(store.get(&id).unwrap(), 0.7);

        let reports = mgr.resolve_pending(&mut store, 0.7, None);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].strategy, "dominant-evidence");

        let edge = store.get(&id).unwrap();
        assert_eq!(edge.beliefs.len(), 2);
        // The weakened belief no longer clears the confidence bar.
        assert!(conflicting_pair(edge, 0.7).is_none());
    }

    #[test]
    fn recency_keeps_the_newer_belief() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::with_strategies(vec![StrategyKind::Recency]);
        let (id, _) = store.upsert(TermKind::Atom, vec!["a".into()]);
        store.revise(
            &id,
            Belief::new(Truth::new(0.9, 0.9), Budget::default()).with_timestamp(1_000),
        );
        store.revise(
            &id,
            Belief::new(Truth::new(0.1, 0.9), Budget::default())
                .with_premises(vec![TermId::raw("Term(src)")])
                .with_timestamp(2_000),
        );
        mgr.detect(store.get(&id).unwrap(), 0.7);
        mgr.resolve_pending(&mut store, 0.7, None);

        let edge = store.get(&id).unwrap();
        assert_eq!(edge.beliefs.len(), 1);
        assert_eq!(edge.beliefs[0].timestamp, 2_000);
    }

    #[test]
    fn specialize_requests_a_split() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::with_strategies(vec![StrategyKind::Specialize]);
        let (id, _) = store.upsert(TermKind::Atom, vec!["a".into()]);
        store.revise(
            &id,
            Belief::new(Truth::new(0.9, 0.9), Budget::new(0.9, 0.9, 0.9)).with_timestamp(1_000),
        );
        store.revise(
            &id,
            Belief::new(Truth::new(0.1, 0.9), Budget::new(0.4, 0.4, 0.4))
                .with_premises(vec![TermId::raw("Term(src)")])
                .with_timestamp(50_000),
        );
        mgr.detect(store.get(&id).unwrap(), 0.7);

        let reports = mgr.resolve_pending(&mut store, 0.7, None);
        assert_eq!(reports.len(), 1);
        let split = reports[0].split.as_ref().unwrap();
        // 49 seconds apart: the split lands in a temporal context.
        assert_eq!(split.context, "temporal");
        assert!((split.minority.truth.frequency - 0.1).abs() < 0.001);
        assert_eq!(store.get(&id).unwrap().beliefs.len(), 1);
    }

    #[test]
    fn stale_records_are_dropped() {
        let mut store = Hypergraph::new(8);
        let mut mgr = ContradictionManager::new();
        let id = conflicted_edge(&mut store);
        mgr.detect(store.get(&id).unwrap(), 0.7);
        store.remove(&id);

        let reports = mgr.resolve_pending(&mut store, 0.7, None);
        assert!(reports.is_empty());
        assert_eq!(mgr.unresolved_count(), 0);
    }
}
