//! Kernel facade: the reasoning loop and the public API.
//!
//! The `Kernel` owns every subsystem — store, indexes, event queue,
//! activations, rules, contradiction records, memory scoring, meta state,
//! and the question table — and exposes the collaborator-facing operations.
//! One `step` is atomic from the outside: pop the best event, update
//! activation, fire derivation rules, propagate a wave, and periodically run
//! the resolver sweep and the maintenance passes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::allen::{AllenRelation, relation_between};
use crate::config::KernelConfig;
use crate::derive::{Conclusion, FiringReport, RuleContext, RuleDynamicsChange, RuleRegistry};
use crate::error::{DoxaResult, TemporalError};
use crate::event::{KernelEvent, Listener, PruneReason};
use crate::explain::{self, ExplainOptions};
use crate::graph::contradiction::{ContradictionManager, SplitRequest, StrategyKind};
use crate::graph::index::IndexSet;
use crate::graph::store::Hypergraph;
use crate::graph::{Belief, Hyperedge};
use crate::memory::{AllocationContext, ForgetAction, ForgettingLimits, MemoryManager, TaskKind};
use crate::meta::MetaReasoner;
use crate::parse::{AstTerm, parse_statement};
use crate::propagate::{Activations, PathGuard, WaveLimits, extend_path_hash, wave};
use crate::queue::{Event, EventQueue};
use crate::question::{
    AskOptions, Bindings, QuestionHandle, QuestionTable, SweepOutcome, concrete_tokens, unify,
};
use crate::snapshot::Snapshot;
use crate::term::{TermId, TermKind, format_endpoint, is_variable, is_wildcard};
use crate::truth::{Budget, EXPECTATION_EPSILON, Truth};

/// Compound-argument occurrences before a token is materialized as a concept.
const CONCEPT_FORMATION_THRESHOLD: u32 = 3;
/// Propagation-path length from which a repeated conclusion earns a shortcut.
const SHORTCUT_MIN_PATH: u32 = 3;

/// Options for [`Kernel::add_hyperedge`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub truth: Option<Truth>,
    pub budget: Option<Budget>,
    pub premises: Vec<TermId>,
    pub derived_by: Option<String>,
    pub context: Option<String>,
    pub timestamp: Option<u64>,
}

/// One match returned by [`Kernel::query`].
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: TermId,
    pub bindings: Bindings,
    pub expectation: f32,
    pub truth: Truth,
}

/// Options for [`Kernel::query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub limit: usize,
    pub min_expectation: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 32,
            min_expectation: 0.0,
        }
    }
}

/// A read-only view of one belief.
#[derive(Debug, Clone, Copy)]
pub struct BeliefView {
    pub truth: Truth,
    pub budget: Budget,
    pub expectation: f32,
}

/// A predicted successor from [`Kernel::predict`].
#[derive(Debug, Clone)]
pub struct Prediction {
    pub term: String,
    pub relation: AllenRelation,
    pub expectation: f32,
}

/// A temporally co-located term from [`Kernel::get_context`].
#[derive(Debug, Clone)]
pub struct TemporalNeighbor {
    pub term: String,
    pub relation: AllenRelation,
}

/// Summary counters exposed for hosts and tests.
#[derive(Debug, Clone)]
pub struct KernelInfo {
    pub edges: usize,
    pub queued_events: usize,
    pub pending_questions: usize,
    pub unresolved_contradictions: usize,
    pub current_step: u64,
    pub focus: crate::meta::Focus,
}

impl std::fmt::Display for KernelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "doxa kernel")?;
        writeln!(f, "  edges:          {}", self.edges)?;
        writeln!(f, "  queued events:  {}", self.queued_events)?;
        writeln!(f, "  questions:      {}", self.pending_questions)?;
        writeln!(f, "  contradictions: {}", self.unresolved_contradictions)?;
        writeln!(f, "  step:           {}", self.current_step)?;
        writeln!(f, "  focus:          {}", self.focus)?;
        Ok(())
    }
}

/// Carried provenance when a derived conclusion re-enters the loop.
#[derive(Debug, Clone)]
struct EventLineage {
    path_hash: u64,
    path_length: u32,
    derivation_path: Vec<String>,
}

/// The reasoning kernel.
pub struct Kernel {
    config: KernelConfig,
    store: Hypergraph,
    indexes: IndexSet,
    queue: EventQueue,
    activations: Activations,
    path_guard: PathGuard,
    rules: RuleRegistry,
    contradictions: ContradictionManager,
    memory: MemoryManager,
    meta: MetaReasoner,
    questions: QuestionTable,
    listeners: Vec<Listener>,
    current_step: u64,
    steps_since_maintenance: u64,
    concept_counts: HashMap<String, u32>,
    pending_concepts: Vec<String>,
    shortcut_counts: HashMap<TermId, u32>,
}

impl Kernel {
    /// Create a kernel with the given configuration.
    pub fn new(config: KernelConfig) -> DoxaResult<Self> {
        config.validate()?;
        tracing::info!(
            belief_capacity = config.belief_capacity,
            maintenance_interval = config.memory_maintenance_interval,
            "initializing doxa kernel"
        );
        Ok(Self {
            store: Hypergraph::new(config.belief_capacity),
            indexes: IndexSet::new(),
            queue: EventQueue::new(),
            activations: Activations::new(),
            path_guard: PathGuard::new(),
            rules: RuleRegistry::with_default_rules(),
            contradictions: ContradictionManager::new(),
            memory: MemoryManager::new(0x5eed),
            meta: MetaReasoner::new(),
            questions: QuestionTable::new(),
            listeners: Vec::new(),
            current_step: 0,
            steps_since_maintenance: 0,
            concept_counts: HashMap::new(),
            pending_concepts: Vec::new(),
            shortcut_counts: HashMap::new(),
            config,
        })
    }

    /// Kernel with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(KernelConfig::default()).expect("default config is valid")
    }

    /// Current configuration (the meta-reasoner adapts it over time).
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Register an event listener. Listeners run synchronously inside the
    /// emitting step.
    pub fn on_event(&mut self, listener: impl Fn(&KernelEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&self, event: KernelEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    /// Summary counters.
    pub fn info(&self) -> KernelInfo {
        KernelInfo {
            edges: self.store.len(),
            queued_events: self.queue.len(),
            pending_questions: self.questions.pending_count(),
            unresolved_contradictions: self.contradictions.unresolved_count(),
            current_step: self.current_step,
            focus: self.meta.focus(),
        }
    }

    /// Replace the contradiction strategy chain.
    pub fn set_resolution_strategies(&mut self, kinds: Vec<StrategyKind>) {
        self.contradictions.set_strategies(kinds);
    }

    /// Record how reliable a belief context/source is.
    pub fn set_source_reliability(&mut self, source: impl Into<String>, weight: f32) {
        self.contradictions.set_reliability(source, weight);
    }

    // ------------------------------------------------------------------
    // Assertion
    // ------------------------------------------------------------------

    /// Assert or revise a hyperedge. Never fails; re-asserting an existing
    /// structure revises it.
    pub fn add_hyperedge(
        &mut self,
        kind: TermKind,
        args: Vec<String>,
        options: AddOptions,
    ) -> TermId {
        self.add_internal(kind, args, options, None)
    }

    fn add_internal(
        &mut self,
        kind: TermKind,
        args: Vec<String>,
        options: AddOptions,
        lineage: Option<EventLineage>,
    ) -> TermId {
        let (id, created) = self.store.upsert(kind, args);
        if created {
            let edge = self
                .store
                .get(&id)
                .expect("edge present after upsert")
                .clone();
            self.indexes.insert_edge(&edge);
            self.note_new_compound(&edge);
        }

        let truth = options.truth.unwrap_or_else(Truth::default_belief);
        let budget = options.budget.unwrap_or_else(|| {
            self.memory.allocate_resources(
                if options.derived_by.is_some() {
                    TaskKind::Derivation
                } else {
                    TaskKind::Revision
                },
                AllocationContext::default(),
                self.queue.len(),
            )
        });

        let mut belief = Belief::new(truth, budget).with_premises(options.premises);
        if let Some(rule) = options.derived_by {
            belief = belief.with_derived_by(rule);
        }
        if let Some(context) = options.context {
            belief = belief.with_context(context);
        }
        if let Some(timestamp) = options.timestamp {
            belief = belief.with_timestamp(timestamp);
        }

        if let Some(outcome) = self.store.revise(&id, belief) {
            self.after_revision(&id, outcome.merged, lineage);
        }
        id
    }

    /// Shared post-revision flow: contradiction check, notifications, and
    /// the propagation seed event.
    fn after_revision(&mut self, id: &TermId, merged: bool, lineage: Option<EventLineage>) {
        let Some(edge) = self.store.get(id) else {
            return;
        };
        let truth = edge.truth();
        let strongest_budget = edge
            .strongest_belief()
            .map(|b| b.budget)
            .unwrap_or_default();

        let detected = self
            .contradictions
            .detect(edge, self.config.contradiction_threshold);
        let fed = {
            let edge = self.store.get(id).expect("edge just revised");
            self.questions.notify_belief(edge)
        };

        for record in &detected {
            self.meta.record_contradiction();
            self.emit(KernelEvent::ContradictionDetected {
                signature: record.signature.clone(),
                edge: record.edge.clone(),
                severity: record.severity,
            });
        }
        self.emit(KernelEvent::BeliefAdded {
            id: id.clone(),
            truth,
            merged,
        });
        self.emit(KernelEvent::Revision {
            id: id.clone(),
            truth,
            expectation: truth.expectation(),
        });
        if !fed.is_empty() {
            tracing::debug!(edge = %id, questions = fed.len(), "belief matched pending questions");
        }

        let mut event = Event::seed(id.clone(), 1.0, strongest_budget);
        if let Some(lineage) = lineage {
            event.path_hash = lineage.path_hash;
            event.path_length = lineage.path_length;
            event.derivation_path = lineage.derivation_path;
        }
        self.queue.push(event);
    }

    fn note_new_compound(&mut self, edge: &Hyperedge) {
        if !edge.kind.is_compound() || edge.kind == TermKind::Question {
            return;
        }
        for arg in &edge.args {
            if is_variable(arg) || is_wildcard(arg) || arg.contains('(') {
                continue;
            }
            let count = self.concept_counts.entry(arg.clone()).or_insert(0);
            *count += 1;
            if *count == CONCEPT_FORMATION_THRESHOLD {
                self.pending_concepts.push(arg.clone());
            }
        }
    }

    /// Revise an existing edge in place. No effect when the edge is absent.
    pub fn revise(&mut self, id: &TermId, truth: Option<Truth>, budget: Option<Budget>) -> bool {
        if !self.store.contains(id) {
            return false;
        }
        let truth = truth.unwrap_or_else(Truth::default_belief);
        let budget = budget.unwrap_or_else(|| {
            self.memory
                .allocate_resources(TaskKind::Revision, AllocationContext::default(), self.queue.len())
        });
        if let Some(outcome) = self.store.revise(id, Belief::new(truth, budget)) {
            self.after_revision(id, outcome.merged, None);
            true
        } else {
            false
        }
    }

    /// Remove an edge and all its index entries.
    pub fn remove_hyperedge(&mut self, id: &TermId) -> bool {
        let Some(edge) = self.store.remove(id) else {
            return false;
        };
        self.indexes.remove_edge(&edge);
        self.activations.remove(id);
        self.path_guard.remove(id);
        self.emit(KernelEvent::KnowledgePruned {
            id: id.clone(),
            reason: PruneReason::Removed,
        });
        true
    }

    // ------------------------------------------------------------------
    // Belief language
    // ------------------------------------------------------------------

    /// Parse and assert one statement; questions are routed to the pending
    /// table and their `Question(pattern)` edge id is returned.
    pub fn nal(&mut self, statement: &str) -> DoxaResult<TermId> {
        let parsed = parse_statement(statement)?;
        if parsed.question {
            let handle = self.ask_parsed(parsed.term, AskOptions::default());
            return Ok(handle.edge().clone());
        }
        Ok(self.add_ast(&parsed.term, parsed.truth, parsed.priority))
    }

    /// Parse a question statement and return its completion handle.
    pub fn nalq(&mut self, question: &str, options: AskOptions) -> DoxaResult<QuestionHandle> {
        let parsed = parse_statement(question)?;
        Ok(self.ask_parsed(parsed.term, options))
    }

    /// Ask a pattern question (`$x`/`?x` bind, `*` matches one slot).
    pub fn ask(&mut self, pattern: &str, options: AskOptions) -> DoxaResult<QuestionHandle> {
        let parsed = parse_statement(pattern)?;
        Ok(self.ask_parsed(parsed.term, options))
    }

    fn add_ast(&mut self, term: &AstTerm, truth: Option<Truth>, priority: Option<f32>) -> TermId {
        match term {
            AstTerm::Atom(name) => self.add_hyperedge(
                TermKind::Atom,
                vec![name.clone()],
                AddOptions {
                    truth: truth.map(|t| t.with_priority(priority.unwrap_or(t.priority))),
                    ..Default::default()
                },
            ),
            AstTerm::Variable(name) => self.add_hyperedge(
                TermKind::Variable,
                vec![name.clone()],
                AddOptions::default(),
            ),
            AstTerm::Wildcard => self.add_hyperedge(
                TermKind::Atom,
                vec!["*".to_string()],
                AddOptions::default(),
            ),
            AstTerm::Compound { kind, args } => {
                for sub in args {
                    if !matches!(sub, AstTerm::Wildcard) {
                        self.add_ast(sub, None, None);
                    }
                }
                let tokens: Vec<String> = args.iter().map(AstTerm::arg_token).collect();
                self.add_hyperedge(
                    *kind,
                    tokens,
                    AddOptions {
                        truth: truth.map(|t| t.with_priority(priority.unwrap_or(t.priority))),
                        budget: priority.map(|p| {
                            self.memory.allocate_resources(
                                TaskKind::Revision,
                                AllocationContext {
                                    importance: p,
                                    ..Default::default()
                                },
                                self.queue.len(),
                            )
                        }),
                        ..Default::default()
                    },
                )
            }
        }
    }

    fn ask_parsed(&mut self, pattern: AstTerm, options: AskOptions) -> QuestionHandle {
        let pattern_id = pattern.id();
        let question_budget = self.memory.allocate_resources(
            TaskKind::Question,
            AllocationContext {
                urgency: options.urgency,
                ..Default::default()
            },
            self.queue.len(),
        );
        let question_edge = self.add_hyperedge(
            TermKind::Question,
            vec![pattern.arg_token()],
            AddOptions {
                budget: Some(question_budget),
                ..Default::default()
            },
        );

        let handle = self.questions.register(
            question_edge,
            pattern_id.clone(),
            options,
            self.config.question_timeout_ms,
        );

        // Feed matches already in the store.
        let candidates = self.pattern_candidates(&pattern_id);
        for id in &candidates {
            if let Some(edge) = self.store.get(id) {
                self.questions.notify_belief(edge);
            }
        }

        // Seed propagation from the pattern's concrete content so answers
        // can still be derived.
        for token in concrete_tokens(&pattern_id) {
            let ids: Vec<TermId> = self.indexes.with_arg(&token).cloned().collect();
            for id in ids {
                self.queue
                    .push(Event::seed(id, 1.0, question_budget));
            }
        }
        handle
    }

    /// Cancel a pending question.
    pub fn cancel_question(&mut self, handle: &QuestionHandle) -> bool {
        self.questions.cancel(handle.id())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn pattern_candidates(&self, pattern: &TermId) -> Vec<TermId> {
        match pattern.decompose() {
            Ok(parts) if parts.kind.is_compound() => {
                // Narrow through the argument trie when the pattern carries a
                // concrete token; fall back to the kind index otherwise.
                let concrete = parts
                    .args
                    .iter()
                    .find(|a| !is_variable(a) && !is_wildcard(a) && !a.contains('('));
                if let Some(token) = concrete {
                    self.indexes
                        .with_arg(token)
                        .filter(|id| self.indexes.has_kind_entry(parts.kind, id))
                        .cloned()
                        .collect()
                } else {
                    self.indexes.of_kind(parts.kind).cloned().collect()
                }
            }
            Ok(parts) => {
                // Atom or variable pattern: an atom matches itself, a bare
                // variable matches everything.
                if parts.kind == TermKind::Atom {
                    vec![pattern.clone()]
                } else {
                    self.store.ids().cloned().collect()
                }
            }
            Err(_) => Vec::new(),
        }
    }

    /// Match a pattern against the store, returning bindings and truth.
    pub fn query(&mut self, pattern: &str, options: QueryOptions) -> DoxaResult<Vec<QueryMatch>> {
        let parsed = parse_statement(pattern)?;
        let pattern_id = parsed.term.id();
        let deadline =
            Instant::now() + Duration::from_millis(self.config.expression_timeout_ms.max(1));

        let mut matches = Vec::new();
        for id in self.pattern_candidates(&pattern_id) {
            if Instant::now() >= deadline {
                tracing::warn!(pattern = %pattern_id, "query hit expression timeout");
                break;
            }
            let Some(edge) = self.store.get(&id) else {
                continue;
            };
            if edge.kind == TermKind::Question {
                continue;
            }
            let Some(bindings) = unify(&pattern_id, &id) else {
                continue;
            };
            let truth = edge.truth();
            let expectation = truth.expectation();
            if expectation < options.min_expectation {
                continue;
            }
            matches.push(QueryMatch {
                id,
                bindings,
                expectation,
                truth,
            });
        }
        matches.sort_by(|a, b| b.expectation.total_cmp(&a.expectation));
        matches.truncate(options.limit);
        Ok(matches)
    }

    /// All beliefs on an edge, strongest first. Empty when the edge is gone.
    pub fn get_beliefs(&self, id: &TermId) -> Vec<BeliefView> {
        self.store
            .get(id)
            .map(|edge| {
                edge.beliefs
                    .iter()
                    .map(|b| BeliefView {
                        truth: b.truth,
                        budget: b.budget,
                        expectation: b.truth.expectation(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The strongest truth of an edge, or unknown.
    pub fn get_truth(&self, id: &TermId) -> Truth {
        self.store
            .get(id)
            .map(|e| e.truth())
            .unwrap_or_else(Truth::unknown)
    }

    /// Edges mentioning any argument token starting with `prefix`.
    pub fn edges_with_prefix(&self, prefix: &str) -> Vec<TermId> {
        self.indexes.with_arg_prefix(prefix)
    }

    /// The maintenance-effort split currently advised by the meta-reasoner.
    pub fn resource_fractions(&self) -> crate::meta::ResourceFractions {
        self.meta.fractions()
    }

    /// Walk an edge's premise chain into a formatted account.
    pub fn explain(&self, id: &TermId, options: ExplainOptions) -> DoxaResult<String> {
        explain::explain(&self.store, id, options)
    }

    // ------------------------------------------------------------------
    // The loop
    // ------------------------------------------------------------------

    /// Run one reasoning step. Returns false when there is no work.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.queue.pop() else {
            return false;
        };
        if event.budget.priority < self.config.budget_threshold {
            tracing::debug!(target = %event.target, "dequeued event below budget threshold");
            return false;
        }

        self.activations.nudge(&event.target, event.activation);
        self.indexes.bump_popularity(&event.target);
        self.memory.touch(&event.target);

        if let Some(edge) = self.store.get(&event.target).cloned() {
            self.fire_rules(&event, &edge);
            self.propagate_wave(&event, &edge);
        }

        self.current_step += 1;
        self.steps_since_maintenance += 1;

        if self.current_step % self.config.question_resolution_interval == 0 {
            self.sweep_questions();
        }
        if self.steps_since_maintenance >= self.config.memory_maintenance_interval {
            self.steps_since_maintenance = 0;
            self.run_maintenance();
        }
        if self.current_step % 100 == 0 {
            self.path_guard.shrink(self.config.derivation_cache_size);
            self.questions.shrink(self.config.derivation_cache_size);
            if self.shortcut_counts.len() > self.config.derivation_cache_size {
                self.shortcut_counts.clear();
            }
        }

        self.emit(KernelEvent::Step {
            step: self.current_step,
        });
        true
    }

    /// Run up to `max_steps` steps; stops early when no work remains.
    pub fn run(&mut self, max_steps: u64) -> u64 {
        self.run_with(max_steps, |_| {})
    }

    /// Like [`Kernel::run`], invoking the callback after every step.
    pub fn run_with(&mut self, max_steps: u64, mut callback: impl FnMut(u64)) -> u64 {
        let mut steps = 0;
        while steps < max_steps {
            if !self.step() {
                break;
            }
            steps += 1;
            callback(self.current_step);
        }
        steps
    }

    fn fire_rules(&mut self, event: &Event, edge: &Hyperedge) {
        if event.path_length >= self.config.max_path_length
            || event.derivation_path.len() as u32 >= self.config.max_derivation_depth
        {
            return;
        }

        let candidates = self
            .rules
            .candidates(edge.kind, |name| self.meta.rule_priority(name));

        for index in candidates {
            let conclusions = {
                let ctx = RuleContext {
                    event,
                    edge,
                    store: &self.store,
                    indexes: &self.indexes,
                    activations: &self.activations,
                };
                self.rules.apply(index, &ctx)
            };
            let rule = self.rules.name_of(index);
            if conclusions.is_empty() {
                continue;
            }

            let cost = conclusions.len() as f32;
            let mut value = 0.0f32;
            for conclusion in conclusions {
                if self.apply_conclusion(event, rule, conclusion) {
                    value += 1.0;
                }
            }

            let report = FiringReport {
                rule,
                success: value > 0.0,
                cost,
                value,
            };
            self.meta.record_firing(&report);
            self.rules.record(rule, report.success);
            if report.success {
                self.memory.note_success(&event.target);
                tracing::debug!(rule, target = %event.target, value, "derivation fired");
            }
        }
    }

    /// Apply one conclusion; returns whether it was productive (novel edge,
    /// strengthened belief, or delivered activation).
    fn apply_conclusion(&mut self, event: &Event, rule: &'static str, conclusion: Conclusion) -> bool {
        match conclusion {
            Conclusion::Edge {
                kind,
                args,
                truth,
                premises,
            } => {
                let budget = self
                    .memory
                    .allocate_resources(
                        TaskKind::Derivation,
                        AllocationContext::default(),
                        self.queue.len(),
                    )
                    .merge(&event.budget.scale(self.config.budget_decay));
                if budget.total() < self.config.inference_threshold {
                    return false;
                }

                let id = TermId::compose(kind, &args);
                let prior = self.store.get(&id).map(|e| e.truth().expectation());

                let mut derivation_path = event.derivation_path.clone();
                derivation_path.push(rule.to_string());
                let lineage = EventLineage {
                    path_hash: extend_path_hash(event.path_hash, rule),
                    path_length: event.path_length + 1,
                    derivation_path,
                };
                self.add_internal(
                    kind,
                    args,
                    AddOptions {
                        truth: Some(truth),
                        budget: Some(budget),
                        premises,
                        derived_by: Some(rule.to_string()),
                        ..Default::default()
                    },
                    Some(lineage),
                );
                self.note_shortcut(&id, event.path_length + 1);

                let now = self.store.get(&id).map(|e| e.truth().expectation());
                match (prior, now) {
                    (None, Some(_)) => true,
                    (Some(before), Some(after)) => after - before > EXPECTATION_EPSILON,
                    _ => false,
                }
            }
            Conclusion::Activate { target, activation } => {
                if !self.store.contains(&target) {
                    return false;
                }
                self.queue.push(Event {
                    target,
                    activation,
                    budget: event.budget.scale(self.config.budget_decay),
                    path_hash: extend_path_hash(event.path_hash, rule),
                    path_length: event.path_length + 1,
                    derivation_path: event.derivation_path.clone(),
                });
                true
            }
        }
    }

    /// A conclusion reached repeatedly through a long chain earns a direct
    /// high-durability belief.
    fn note_shortcut(&mut self, id: &TermId, path_length: u32) {
        if path_length < SHORTCUT_MIN_PATH {
            return;
        }
        let count = self.shortcut_counts.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count != 2 {
            return;
        }
        let Some((truth, mut budget)) = self
            .store
            .get(id)
            .and_then(|e| e.strongest_belief())
            .map(|b| (b.truth, b.budget))
        else {
            return;
        };
        budget.durability = budget.durability.max(0.95);
        let capacity = self.store.belief_capacity();
        if let Some(edge) = self.store.get_mut(id) {
            edge.revise(
                Belief::new(truth, budget).with_derived_by("shortcut"),
                capacity,
            );
        }
        self.emit(KernelEvent::ShortcutCreated {
            id: id.clone(),
            path_length,
        });
    }

    fn propagate_wave(&mut self, event: &Event, edge: &Hyperedge) {
        let limits = WaveLimits {
            decay: self.config.decay,
            budget_threshold: self.config.budget_threshold,
            max_path_length: self.config.max_path_length,
        };
        let sub_events = wave(event, edge, &self.indexes, &mut self.path_guard, limits);
        for sub in sub_events {
            self.queue.push(sub);
        }
    }

    fn sweep_questions(&mut self) {
        let outcomes = self.questions.sweep(Instant::now());
        for outcome in outcomes {
            match outcome {
                SweepOutcome::Resolved {
                    response_time_ms, ..
                } => {
                    self.meta.record_question_rt(response_time_ms);
                }
                SweepOutcome::TimedOut {
                    response_time_ms, ..
                } => {
                    self.meta.record_question_rt(response_time_ms);
                }
            }
        }
    }

    /// Drop queued events whose budget total is below `threshold`.
    pub fn prune_low_value_paths(&mut self, threshold: f32) -> usize {
        let removed = self.queue.prune_below(threshold);
        if removed > 0 {
            self.emit(KernelEvent::Pruning { removed });
        }
        removed
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Resolve pending contradictions immediately.
    pub fn resolve_contradictions(&mut self) -> usize {
        let reports = self.contradictions.resolve_pending(
            &mut self.store,
            self.config.contradiction_threshold,
            self.memory.current_context(),
        );
        let count = reports.len();
        for report in reports {
            if let Some(split) = report.split {
                self.apply_split(split);
            }
            self.emit(KernelEvent::ContradictionResolved {
                signature: report.signature,
                edge: report.edge,
                strategy: report.strategy,
            });
        }
        count
    }

    fn apply_split(&mut self, split: SplitRequest) {
        let Some(original) = self.store.get(&split.edge) else {
            return;
        };
        let split_id = TermId::raw(format!("{}|context:{}", split.edge, split.context));
        let shell = Hyperedge {
            id: split_id.clone(),
            kind: original.kind,
            args: original.args.clone(),
            beliefs: Vec::new(),
        };
        if self.store.insert_raw(shell) {
            if let Some(edge) = self.store.get(&split_id) {
                let edge = edge.clone();
                self.indexes.insert_edge(&edge);
            }
        }
        let minority = split.minority.with_context(split.context);
        self.store.revise(&split_id, minority);

        self.add_hyperedge(
            TermKind::Similarity,
            vec![
                split_id.as_str().to_string(),
                split.edge.as_str().to_string(),
            ],
            AddOptions {
                truth: Some(Truth::new(0.7, 0.9)),
                ..Default::default()
            },
        );
    }

    /// Run every maintenance pass once, in the canonical order:
    /// memory, contradictions, meta, learning, temporal horizon, goals.
    pub fn run_maintenance(&mut self) {
        // Memory: decay, re-score, forget, adapt capacity.
        self.activations.decay_all(self.config.decay);
        self.indexes.decay_popularity(1.0 - self.config.decay * 0.5);
        let question_terms = self.questions.pending_terms();
        self.memory
            .rescore(&self.activations, &question_terms, &self.indexes);
        let actions = self.memory.run_forgetting(
            &mut self.store,
            &mut self.indexes,
            &mut self.activations,
            &question_terms,
            ForgettingLimits {
                min_concepts: self.config.min_concepts_for_forgetting,
                sample_size: self.config.forgetting_check_sample_size,
                threshold: self.config.forgetting_threshold,
            },
        );
        let forgotten = actions.len();
        for action in actions {
            match action {
                ForgetAction::RemovedEdge(id) => {
                    self.path_guard.remove(&id);
                    self.emit(KernelEvent::KnowledgePruned {
                        id,
                        reason: PruneReason::Forgotten,
                    });
                }
                ForgetAction::PrunedBelief(id) => {
                    self.emit(KernelEvent::KnowledgePruned {
                        id,
                        reason: PruneReason::BeliefEvicted,
                    });
                }
            }
        }
        if forgotten > 0 {
            self.emit(KernelEvent::Log {
                message: format!("forgetting pass pruned {forgotten} item(s)"),
            });
        }
        let capacity = self
            .memory
            .adjusted_belief_capacity(self.store.len(), self.store.belief_capacity());
        self.store.set_belief_capacity(capacity);

        // Contradictions.
        self.resolve_contradictions();

        // Meta: monitor and adapt.
        let outcome = self.meta.self_monitor(self.queue.len(), &mut self.config);
        if let Some((from, to)) = outcome.focus_changed {
            self.emit(KernelEvent::FocusChanged { from, to });
        }
        self.emit(KernelEvent::MaintenanceInfo {
            step: self.current_step,
            edges: self.store.len(),
            queue: self.queue.len(),
            focus: self.meta.focus(),
            metrics: outcome.metrics,
        });

        // Learning: rule dynamics and concept formation.
        for change in self.rules.update_dynamics() {
            match change {
                RuleDynamicsChange::Disabled(rule) => {
                    self.emit(KernelEvent::RuleDisabled { rule });
                }
                RuleDynamicsChange::Enabled(rule) => {
                    self.emit(KernelEvent::RuleEnabled { rule });
                }
            }
        }
        self.form_concepts();

        // Temporal horizon: drop derived relations that decayed to noise.
        self.temporal_horizon_pass();

        // Goals.
        self.memory.decay_goals();
    }

    fn form_concepts(&mut self) {
        let pending = std::mem::take(&mut self.pending_concepts);
        for token in pending {
            let id = TermId::compose(TermKind::Atom, &[token.clone()]);
            if self.store.contains(&id) {
                continue;
            }
            let formed = self.add_hyperedge(
                TermKind::Atom,
                vec![token.clone()],
                AddOptions {
                    truth: Some(Truth::unknown()),
                    ..Default::default()
                },
            );
            self.emit(KernelEvent::ConceptFormed { id: formed, token });
        }
    }

    fn temporal_horizon_pass(&mut self) {
        let stale: Vec<TermId> = self
            .indexes
            .of_kind(TermKind::TemporalRelation)
            .filter(|id| {
                self.store.get(id).is_some_and(|edge| {
                    edge.strongest_belief()
                        .is_some_and(|b| !b.premises.is_empty() && b.truth.expectation() < 0.1)
                })
            })
            .cloned()
            .collect();
        for id in stale {
            if let Some(edge) = self.store.remove(&id) {
                self.indexes.remove_edge(&edge);
                self.activations.remove(&id);
                self.emit(KernelEvent::KnowledgePruned {
                    id,
                    reason: PruneReason::TemporalHorizon,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Goals and context
    // ------------------------------------------------------------------

    /// Register a goal over the named terms; boosts their importance.
    pub fn add_goal(&mut self, terms: &[&str], priority: f32) {
        let ids: Vec<TermId> = terms.iter().map(|t| self.term(t)).collect();
        self.memory.add_goal(ids, priority);
    }

    /// Enter a context; edges mentioning the token gain importance and
    /// contradiction splits land in this context.
    pub fn push_context(&mut self, token: impl Into<String>) {
        self.memory.push_context(token);
    }

    /// Leave the innermost context.
    pub fn pop_context(&mut self) -> Option<String> {
        self.memory.pop_context()
    }

    // ------------------------------------------------------------------
    // Structural helpers
    // ------------------------------------------------------------------

    /// Assert an atomic term.
    pub fn term(&mut self, name: &str) -> TermId {
        self.add_hyperedge(TermKind::Atom, vec![name.to_string()], AddOptions::default())
    }

    fn binary(&mut self, kind: TermKind, a: &str, b: &str, truth: Option<Truth>) -> TermId {
        self.term(a);
        self.term(b);
        self.add_hyperedge(
            kind,
            vec![a.to_string(), b.to_string()],
            AddOptions {
                truth,
                ..Default::default()
            },
        )
    }

    pub fn inheritance(&mut self, a: &str, b: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Inheritance, a, b, truth)
    }

    pub fn similarity(&mut self, a: &str, b: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Similarity, a, b, truth)
    }

    pub fn implication(&mut self, a: &str, b: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Implication, a, b, truth)
    }

    pub fn equivalence(&mut self, a: &str, b: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Equivalence, a, b, truth)
    }

    pub fn instance(&mut self, member: &str, class: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Instance, member, class, truth)
    }

    pub fn property(&mut self, bearer: &str, prop: &str, truth: Option<Truth>) -> TermId {
        self.binary(TermKind::Property, bearer, prop, truth)
    }

    pub fn conjunction(&mut self, terms: &[&str], truth: Option<Truth>) -> TermId {
        self.nary(TermKind::Conjunction, terms, truth)
    }

    pub fn disjunction(&mut self, terms: &[&str], truth: Option<Truth>) -> TermId {
        self.nary(TermKind::Disjunction, terms, truth)
    }

    pub fn product(&mut self, terms: &[&str], truth: Option<Truth>) -> TermId {
        self.nary(TermKind::Product, terms, truth)
    }

    fn nary(&mut self, kind: TermKind, terms: &[&str], truth: Option<Truth>) -> TermId {
        for t in terms {
            self.term(t);
        }
        self.add_hyperedge(
            kind,
            terms.iter().map(|t| t.to_string()).collect(),
            AddOptions {
                truth,
                ..Default::default()
            },
        )
    }

    pub fn negation(&mut self, inner: &str, truth: Option<Truth>) -> TermId {
        self.term(inner);
        self.add_hyperedge(
            TermKind::Negation,
            vec![inner.to_string()],
            AddOptions {
                truth,
                ..Default::default()
            },
        )
    }

    // ------------------------------------------------------------------
    // Temporal helpers
    // ------------------------------------------------------------------

    /// Record a time interval for a term.
    pub fn interval(&mut self, term: &str, start: f64, end: f64) -> DoxaResult<TermId> {
        if !(start < end) {
            return Err(TemporalError::DegenerateInterval {
                term: term.to_string(),
                start,
                end,
            }
            .into());
        }
        self.term(term);
        Ok(self.add_hyperedge(
            TermKind::TimeInterval,
            vec![
                term.to_string(),
                format_endpoint(start),
                format_endpoint(end),
            ],
            AddOptions::default(),
        ))
    }

    /// Compute the Allen relation between two terms' recorded intervals and
    /// assert it.
    pub fn relate(&mut self, a: &str, b: &str) -> DoxaResult<AllenRelation> {
        let (_, span_a) =
            self.indexes
                .interval_of_term(a)
                .ok_or_else(|| TemporalError::UnknownInterval {
                    term: a.to_string(),
                })?;
        let (_, span_b) =
            self.indexes
                .interval_of_term(b)
                .ok_or_else(|| TemporalError::UnknownInterval {
                    term: b.to_string(),
                })?;
        let relation = relation_between(span_a, span_b);
        self.constraint(a, b, relation, None);
        Ok(relation)
    }

    /// Assert an explicit temporal relation between two terms.
    pub fn constraint(
        &mut self,
        a: &str,
        b: &str,
        relation: AllenRelation,
        truth: Option<Truth>,
    ) -> TermId {
        self.term(a);
        self.term(b);
        self.add_hyperedge(
            TermKind::TemporalRelation,
            vec![a.to_string(), b.to_string(), relation.name().to_string()],
            AddOptions {
                truth,
                ..Default::default()
            },
        )
    }

    /// Expected successors of a term, following `before`/`meets`/`overlaps`
    /// relations up to the temporal horizon.
    pub fn predict(&self, term: &str) -> Vec<Prediction> {
        let successor = |r: AllenRelation| {
            matches!(
                r,
                AllenRelation::Before | AllenRelation::Meets | AllenRelation::Overlaps
            )
        };

        let mut out: Vec<Prediction> = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(term.to_string());
        let mut frontier = vec![(term.to_string(), 1.0f32)];

        for _ in 0..self.config.temporal_horizon {
            let mut next = Vec::new();
            for (current, weight) in &frontier {
                for id in self.indexes.with_arg(current) {
                    let Some(edge) = self.store.get(id) else {
                        continue;
                    };
                    if edge.kind != TermKind::TemporalRelation
                        || edge.args.len() != 3
                        || edge.args[0] != *current
                    {
                        continue;
                    }
                    let Ok(relation) = AllenRelation::from_name(&edge.args[2]) else {
                        continue;
                    };
                    if !successor(relation) {
                        continue;
                    }
                    let target = edge.args[1].clone();
                    if !seen.insert(target.clone()) {
                        continue;
                    }
                    let expectation = weight * edge.truth().expectation();
                    out.push(Prediction {
                        term: target.clone(),
                        relation,
                        expectation,
                    });
                    next.push((target, expectation));
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        out.sort_by(|a, b| b.expectation.total_cmp(&a.expectation));
        out
    }

    /// Terms whose recorded intervals share time with the given term's.
    pub fn get_context(&self, term: &str) -> DoxaResult<Vec<TemporalNeighbor>> {
        let (own_id, own_span) =
            self.indexes
                .interval_of_term(term)
                .ok_or_else(|| TemporalError::UnknownInterval {
                    term: term.to_string(),
                })?;

        let mut out = Vec::new();
        for (id, span) in self.indexes.intervals() {
            if *id == own_id {
                continue;
            }
            let relation = relation_between(own_span, *span);
            if matches!(
                relation,
                AllenRelation::Before
                    | AllenRelation::After
                    | AllenRelation::Meets
                    | AllenRelation::MetBy
            ) {
                continue;
            }
            let Some(edge) = self.store.get(id) else {
                continue;
            };
            if let Some(other_term) = edge.args.first() {
                out.push(TemporalNeighbor {
                    term: other_term.clone(),
                    relation,
                });
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the kernel (config, step counter, all edges and beliefs).
    pub fn save(&self) -> DoxaResult<String> {
        Snapshot::capture(&self.config, self.current_step, &self.store).to_json()
    }

    /// Save to a file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> DoxaResult<()> {
        Snapshot::capture(&self.config, self.current_step, &self.store).write_to(path)
    }

    /// Clear all state and rebuild from a snapshot document.
    pub fn restore(&mut self, json: &str) -> DoxaResult<()> {
        let snapshot = Snapshot::from_json(json)?;
        self.restore_snapshot(snapshot);
        Ok(())
    }

    /// Restore from a file.
    pub fn restore_from(&mut self, path: impl AsRef<Path>) -> DoxaResult<()> {
        let snapshot = Snapshot::read_from(path)?;
        self.restore_snapshot(snapshot);
        Ok(())
    }

    fn restore_snapshot(&mut self, snapshot: Snapshot) {
        self.store.clear();
        self.indexes.clear();
        self.queue.clear();
        self.activations.clear();
        self.path_guard.clear();
        self.contradictions.clear();
        self.questions.clear();
        self.memory.clear();
        self.concept_counts.clear();
        self.pending_concepts.clear();
        self.shortcut_counts.clear();

        self.config = snapshot.config;
        self.store.set_belief_capacity(self.config.belief_capacity);
        self.current_step = snapshot.current_step;
        self.steps_since_maintenance = 0;

        for edge in snapshot.hypergraph {
            let structural = TermId::compose(edge.kind, &edge.args);
            if structural != edge.id {
                // Context-split edge: its id carries a suffix the structural
                // address does not reproduce.
                let shell = Hyperedge {
                    id: edge.id.clone(),
                    kind: edge.kind,
                    args: edge.args.clone(),
                    beliefs: Vec::new(),
                };
                if self.store.insert_raw(shell) {
                    if let Some(e) = self.store.get(&edge.id) {
                        let e = e.clone();
                        self.indexes.insert_edge(&e);
                    }
                }
                for belief in edge.beliefs {
                    self.store.revise(&edge.id, belief);
                }
                continue;
            }
            for belief in edge.beliefs {
                self.add_internal(
                    edge.kind,
                    edge.args.clone(),
                    AddOptions {
                        truth: Some(belief.truth),
                        budget: Some(belief.budget),
                        premises: belief.premises,
                        derived_by: belief.derived_by,
                        context: belief.context,
                        timestamp: Some(belief.timestamp),
                    },
                    None,
                );
            }
        }

        // Restoring replays revisions; the rebuilt kernel starts quiescent.
        self.queue.clear();
        self.path_guard.clear();
        tracing::info!(
            edges = self.store.len(),
            step = self.current_step,
            "kernel state restored"
        );
    }

    // ------------------------------------------------------------------
    // Test hooks
    // ------------------------------------------------------------------

    /// Direct access to importance scoring (used by hosts and tests).
    pub fn set_importance(&mut self, id: &TermId, value: f32) {
        self.memory.set_importance(id, value);
    }

    /// Current activation of an edge.
    pub fn activation(&self, id: &TermId) -> f32 {
        self.activations.get(id)
    }

    /// Whether an edge currently exists.
    pub fn contains(&self, id: &TermId) -> bool {
        self.store.contains(id)
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("edges", &self.store.len())
            .field("queue", &self.queue.len())
            .field("step", &self.current_step)
            .finish()
    }
}
