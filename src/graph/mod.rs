//! The typed hypergraph: beliefs, hyperedges, and their revision semantics.
//!
//! A [`Hyperedge`] is a typed relation over ordered term arguments carrying a
//! bounded, priority-sorted list of [`Belief`]s. The store
//! ([`store::Hypergraph`]) maps content-addressed ids to edges; the index
//! layer ([`index::IndexSet`]) provides type, argument, structural, temporal,
//! and popularity lookups; [`contradiction`] detects and resolves conflicting
//! beliefs on a single edge.

pub mod contradiction;
pub mod index;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::term::{TermId, TermKind};
use crate::truth::{Budget, Truth};

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One belief held about a hyperedge: truth, resources, and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    /// The uncertainty measure.
    pub truth: Truth,
    /// The resources allocated to this belief.
    pub budget: Budget,
    /// Ids of the edges this belief was derived from (empty for input).
    pub premises: Vec<TermId>,
    /// Name of the derivation rule that produced this belief, if any.
    pub derived_by: Option<String>,
    /// Context tag assigned by contradiction specialization, if any.
    pub context: Option<String>,
    /// When this belief was recorded (milliseconds since epoch).
    pub timestamp: u64,
}

impl Belief {
    /// Create a belief with the current timestamp and no provenance.
    pub fn new(truth: Truth, budget: Budget) -> Self {
        Self {
            truth,
            budget,
            premises: Vec::new(),
            derived_by: None,
            context: None,
            timestamp: now_millis(),
        }
    }

    /// Attach the premise ids this belief was derived from.
    pub fn with_premises(mut self, premises: Vec<TermId>) -> Self {
        self.premises = premises;
        self
    }

    /// Attach the name of the producing rule.
    pub fn with_derived_by(mut self, rule: impl Into<String>) -> Self {
        self.derived_by = Some(rule.into());
        self
    }

    /// Attach a context tag.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Override the timestamp (snapshot restore).
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Evidence strength: budget priority weighted by confidence.
    pub fn evidence(&self) -> f32 {
        self.budget.priority * self.truth.confidence
    }

    /// Whether this belief cites exactly the given premise set (order-free).
    pub fn same_premises(&self, other: &[TermId]) -> bool {
        self.premises.len() == other.len() && other.iter().all(|p| self.premises.contains(p))
    }
}

/// Outcome of revising an edge with a new belief.
#[derive(Debug, Clone)]
pub struct RevisionOutcome {
    /// Whether the new belief was merged into an existing one in place.
    pub merged: bool,
    /// The edge's strongest truth after the revision.
    pub truth: Truth,
    /// The edge's strongest-belief expectation before the revision.
    pub prior_expectation: f32,
}

/// A typed relation over ordered term arguments, carrying beliefs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    /// Content-addressed identity.
    pub id: TermId,
    /// The relation type.
    pub kind: TermKind,
    /// Ordered arguments: atom tokens or nested term ids.
    pub args: Vec<String>,
    /// Beliefs sorted by budget priority, strongest first.
    pub beliefs: Vec<Belief>,
}

impl Hyperedge {
    /// Create an empty edge for the given structure.
    pub fn new(kind: TermKind, args: Vec<String>) -> Self {
        let id = TermId::compose(kind, &args);
        Self {
            id,
            kind,
            args,
            beliefs: Vec::new(),
        }
    }

    /// The highest-priority belief, if any.
    pub fn strongest_belief(&self) -> Option<&Belief> {
        self.beliefs.first()
    }

    /// The strongest belief's truth, or [`Truth::unknown`] when empty.
    pub fn truth(&self) -> Truth {
        self.strongest_belief()
            .map(|b| b.truth)
            .unwrap_or_else(Truth::unknown)
    }

    /// Revise this edge with a new belief.
    ///
    /// A belief citing the same premise set as an existing one is merged in
    /// place via [`Truth::revise`]; otherwise the belief is appended. The
    /// list is then re-sorted by budget priority and truncated to `capacity`.
    pub fn revise(&mut self, belief: Belief, capacity: usize) -> RevisionOutcome {
        let prior_expectation = self.truth().expectation();

        let merged = if let Some(existing) = self
            .beliefs
            .iter_mut()
            .find(|b| b.same_premises(&belief.premises))
        {
            existing.truth = existing.truth.revise(&belief.truth);
            existing.budget = existing.budget.merge(&belief.budget);
            existing.timestamp = belief.timestamp;
            if belief.derived_by.is_some() {
                existing.derived_by = belief.derived_by;
            }
            true
        } else {
            self.beliefs.push(belief);
            false
        };

        self.beliefs.sort_by(|a, b| {
            b.budget
                .priority
                .total_cmp(&a.budget.priority)
                .then(b.timestamp.cmp(&a.timestamp))
        });
        self.beliefs.truncate(capacity.max(1));

        RevisionOutcome {
            merged,
            truth: self.truth(),
            prior_expectation,
        }
    }

    /// Remove and return the weakest belief by budget total.
    pub fn pop_weakest(&mut self) -> Option<Belief> {
        if self.beliefs.len() < 2 {
            return None;
        }
        let (idx, _) = self
            .beliefs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.budget.total().total_cmp(&b.budget.total()))?;
        Some(self.beliefs.remove(idx))
    }
}
