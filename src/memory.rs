//! The memory manager: importance scoring, forgetting, and budget allocation.
//!
//! Every maintenance tick the manager re-scores edge importance from
//! activations, pending questions, recent derivation successes, the context
//! stack, and active goals. When the hypergraph is large enough it samples
//! candidate edges and probabilistically forgets the low-retention ones,
//! popping weak beliefs before deleting whole edges. It also owns the
//! budget-allocation formula used for every new task.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::index::IndexSet;
use crate::graph::store::Hypergraph;
use crate::propagate::Activations;
use crate::term::TermId;
use crate::truth::Budget;

/// Capacity of the recently-touched concept ring.
const ACTIVE_RING_CAPACITY: usize = 64;
/// Importance score above which an edge is never forgotten.
const IMPORTANCE_OVERRIDE: f32 = 0.8;

/// Task classes for resource allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Question,
    CriticalEvent,
    Goal,
    Derivation,
    Revision,
    Default,
}

impl TaskKind {
    fn base_priority(&self) -> f32 {
        match self {
            TaskKind::Question => 0.9,
            TaskKind::CriticalEvent => 0.95,
            TaskKind::Goal => 0.85,
            TaskKind::Derivation => 0.6,
            TaskKind::Revision => 0.7,
            TaskKind::Default => 0.5,
        }
    }

    fn base_durability(&self) -> f32 {
        match self {
            TaskKind::Question | TaskKind::CriticalEvent | TaskKind::Goal => 0.9,
            _ => 0.6,
        }
    }
}

/// Optional modifiers for resource allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationContext {
    pub urgency: f32,
    pub importance: f32,
    pub success_history: f32,
    pub novelty: f32,
}

/// An active goal: terms it references and its decaying priority.
#[derive(Debug, Clone)]
pub struct Goal {
    pub terms: Vec<TermId>,
    pub priority: f32,
}

/// What the forgetting pass did to one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgetAction {
    /// The weakest belief was popped; the edge survives.
    PrunedBelief(TermId),
    /// The edge was removed entirely.
    RemovedEdge(TermId),
}

/// Tunables for the forgetting pass, taken from the kernel configuration.
#[derive(Debug, Clone, Copy)]
pub struct ForgettingLimits {
    pub min_concepts: usize,
    pub sample_size: usize,
    pub threshold: f32,
}

/// Importance scores, goal/context state, and the allocation formula.
pub struct MemoryManager {
    importance: HashMap<TermId, f32>,
    active_ring: VecDeque<TermId>,
    active_set: HashSet<TermId>,
    recent_successes: HashSet<TermId>,
    context_stack: Vec<String>,
    goals: Vec<Goal>,
    rng: StdRng,
}

impl MemoryManager {
    pub fn new(seed: u64) -> Self {
        Self {
            importance: HashMap::new(),
            active_ring: VecDeque::new(),
            active_set: HashSet::new(),
            recent_successes: HashSet::new(),
            context_stack: Vec::new(),
            goals: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    // -- scoring -----------------------------------------------------------

    /// Current importance of an edge.
    pub fn importance(&self, id: &TermId) -> f32 {
        self.importance.get(id).copied().unwrap_or(0.0)
    }

    /// Re-score importance for the current tick.
    pub fn rescore(
        &mut self,
        activations: &Activations,
        question_terms: &HashSet<TermId>,
        indexes: &IndexSet,
    ) {
        // Global decay, then blend in activations.
        for v in self.importance.values_mut() {
            *v *= 0.995;
        }
        for (id, activation) in activations.iter() {
            let entry = self.importance.entry(id.clone()).or_insert(0.0);
            *entry = (*entry * 0.8 + activation * 0.2).clamp(0.0, 1.0);
        }
        for id in question_terms {
            let entry = self.importance.entry(id.clone()).or_insert(0.0);
            *entry = (*entry + 0.2).clamp(0.0, 1.0);
        }
        for id in &self.recent_successes {
            if let Some(entry) = self.importance.get_mut(id) {
                *entry = (*entry + 0.1).clamp(0.0, 1.0);
            }
        }
        for token in &self.context_stack {
            for id in indexes.with_arg(token) {
                let entry = self.importance.entry(id.clone()).or_insert(0.0);
                *entry = (*entry + 0.3).clamp(0.0, 1.0);
            }
        }
        for goal in &self.goals {
            for id in &goal.terms {
                let entry = self.importance.entry(id.clone()).or_insert(0.0);
                *entry = (*entry + 0.4 * goal.priority).clamp(0.0, 1.0);
            }
        }
        self.recent_successes.clear();
        self.importance.retain(|_, v| *v > 0.001);
    }

    /// Note that a derivation touching this edge succeeded.
    pub fn note_success(&mut self, id: &TermId) {
        self.recent_successes.insert(id.clone());
        self.touch(id);
    }

    /// Record the edge in the recently-active ring.
    pub fn touch(&mut self, id: &TermId) {
        if self.active_set.insert(id.clone()) {
            self.active_ring.push_back(id.clone());
            while self.active_ring.len() > ACTIVE_RING_CAPACITY {
                if let Some(evicted) = self.active_ring.pop_front() {
                    self.active_set.remove(&evicted);
                }
            }
        }
    }

    /// Override importance directly (tests, external scoring).
    pub fn set_importance(&mut self, id: &TermId, value: f32) {
        self.importance.insert(id.clone(), value.clamp(0.0, 1.0));
    }

    // -- context & goals ---------------------------------------------------

    /// Push a context token; edges mentioning it gain importance.
    pub fn push_context(&mut self, token: impl Into<String>) {
        self.context_stack.push(token.into());
    }

    /// Pop the innermost context token.
    pub fn pop_context(&mut self) -> Option<String> {
        self.context_stack.pop()
    }

    /// The innermost context token.
    pub fn current_context(&self) -> Option<&str> {
        self.context_stack.last().map(String::as_str)
    }

    /// Register a goal referencing the given terms.
    pub fn add_goal(&mut self, terms: Vec<TermId>, priority: f32) {
        self.goals.push(Goal {
            terms,
            priority: priority.clamp(0.0, 1.0),
        });
    }

    /// Decay goal priorities and drop the exhausted ones.
    pub fn decay_goals(&mut self) -> usize {
        let before = self.goals.len();
        self.goals.retain_mut(|g| {
            g.priority *= 0.98;
            g.priority >= 0.05
        });
        before - self.goals.len()
    }

    /// Active goals.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    // -- forgetting --------------------------------------------------------

    /// Whether an edge is protected from forgetting.
    fn is_important(&self, id: &TermId, question_terms: &HashSet<TermId>) -> bool {
        question_terms.contains(id)
            || self.active_set.contains(id)
            || self.importance(id) > IMPORTANCE_OVERRIDE
    }

    /// Sampled probabilistic forgetting.
    ///
    /// Does nothing while the hypergraph is below `min_concepts`. Otherwise
    /// samples up to `sample_size` edges; each non-important edge is
    /// forgotten with probability `(1 − retention)²`, where retention blends
    /// importance, activation, and popularity. Multi-belief edges lose their
    /// weakest belief; single-belief edges below the retention threshold are
    /// deleted outright.
    pub fn run_forgetting(
        &mut self,
        store: &mut Hypergraph,
        indexes: &mut IndexSet,
        activations: &mut Activations,
        question_terms: &HashSet<TermId>,
        limits: ForgettingLimits,
    ) -> Vec<ForgetAction> {
        if store.len() < limits.min_concepts {
            return Vec::new();
        }

        let ids: Vec<TermId> = store.ids().cloned().collect();
        let mut actions = Vec::new();
        let sample = limits.sample_size.min(ids.len());

        for _ in 0..sample {
            let id = &ids[self.rng.gen_range(0..ids.len())];
            if !store.contains(id) || self.is_important(id, question_terms) {
                continue;
            }
            let retention = 0.6 * self.importance(id)
                + 0.3 * activations.get(id)
                + 0.1 * (indexes.popularity(id) / 100.0).min(1.0);
            let forgetting_probability = (1.0 - retention).powi(2);
            if !self.rng.gen_bool(forgetting_probability.clamp(0.0, 1.0) as f64) {
                continue;
            }

            let multi_belief = store.get(id).is_some_and(|e| e.beliefs.len() > 1);
            if multi_belief {
                if let Some(edge) = store.get_mut(id) {
                    edge.pop_weakest();
                    actions.push(ForgetAction::PrunedBelief(id.clone()));
                }
            } else if retention < limits.threshold {
                if let Some(edge) = store.remove(id) {
                    indexes.remove_edge(&edge);
                    activations.remove(id);
                    self.importance.remove(id);
                    actions.push(ForgetAction::RemovedEdge(id.clone()));
                }
            }
        }
        if !actions.is_empty() {
            tracing::debug!(count = actions.len(), "forgetting pass pruned knowledge");
        }
        actions
    }

    // -- allocation --------------------------------------------------------

    /// Compute the budget for a new task.
    pub fn allocate_resources(
        &self,
        kind: TaskKind,
        ctx: AllocationContext,
        queue_len: usize,
    ) -> Budget {
        let availability = (1.0 - (queue_len as f32 / 1000.0).min(1.0) * 0.7).max(0.1);

        let mut priority = kind.base_priority()
            + ctx.urgency * 0.3
            + ctx.importance * 0.2
            + ctx.novelty * 0.15;
        priority = (priority * availability).clamp(0.01, 1.0);

        let durability = (kind.base_durability() + ctx.success_history * 0.2).clamp(0.01, 1.0);
        let quality = (availability.sqrt() * 0.8 + ctx.novelty * 0.1).clamp(0.0, 1.0);

        Budget::new(priority, durability, quality)
    }

    /// Adjust belief capacity to the hypergraph's size.
    pub fn adjusted_belief_capacity(&self, store_len: usize, current: usize) -> usize {
        if store_len > 10_000 {
            ((current as f32 * 0.95).floor() as usize).max(4)
        } else if store_len < 5_000 {
            ((current as f32 * 1.05).ceil() as usize).min(12)
        } else {
            current
        }
    }

    /// Drop all scoring state (snapshot restore).
    pub fn clear(&mut self) {
        self.importance.clear();
        self.active_ring.clear();
        self.active_set.clear();
        self.recent_successes.clear();
        self.context_stack.clear();
        self.goals.clear();
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("scored", &self.importance.len())
            .field("goals", &self.goals.len())
            .field("contexts", &self.context_stack.len())
            .finish()
    }
}
