//! Questions: pattern registration, unification, and the pending lifecycle.
//!
//! A question is an asserted `Question(pattern)` edge whose pattern may
//! contain variables (`$x`, `?x`) and single-slot wildcards (`*`). Asking
//! registers a pending entry with a deadline; every new belief is unified
//! against the stored patterns, and a periodic resolver sweep completes
//! handles whose answer list is non-empty or whose deadline has passed.
//! Handles are completed from inside the step loop; external code polls them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::QuestionError;
use crate::graph::Hyperedge;
use crate::term::{TermId, TermKind, is_compound_arg, is_variable, is_wildcard};
use crate::truth::Truth;

// ---------------------------------------------------------------------------
// Unification
// ---------------------------------------------------------------------------

/// Variable bindings produced by a successful unification.
pub type Bindings = HashMap<String, String>;

/// Unify a pattern id against a concrete candidate id.
///
/// `$x`/`?x` bind (consistently across repeats), `*` matches one argument
/// without binding, and compound arguments unify recursively. Returns the
/// bindings on success.
pub fn unify(pattern: &TermId, candidate: &TermId) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    if unify_ids(pattern.as_str(), candidate.as_str(), &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}

fn unify_ids(pattern: &str, candidate: &str, bindings: &mut Bindings) -> bool {
    let (Ok(p), Ok(c)) = (
        TermId::raw(pattern).decompose(),
        TermId::raw(candidate).decompose(),
    ) else {
        return false;
    };
    if p.kind != c.kind || p.args.len() != c.args.len() {
        return false;
    }
    p.args
        .iter()
        .zip(&c.args)
        .all(|(pa, ca)| unify_args(pa, ca, bindings))
}

fn unify_args(pattern: &str, candidate: &str, bindings: &mut Bindings) -> bool {
    if is_wildcard(pattern) {
        return true;
    }
    if is_variable(pattern) {
        return match bindings.get(pattern) {
            Some(bound) => bound == candidate,
            None => {
                bindings.insert(pattern.to_string(), candidate.to_string());
                true
            }
        };
    }
    if is_compound_arg(pattern) && is_compound_arg(candidate) {
        return unify_ids(pattern, candidate, bindings);
    }
    pattern == candidate
}

/// The concrete (non-variable, non-wildcard) argument tokens of a pattern,
/// recursing through compound arguments.
pub fn concrete_tokens(pattern: &TermId) -> Vec<String> {
    let mut out = Vec::new();
    collect_concrete(pattern.as_str(), &mut out);
    out
}

fn collect_concrete(id: &str, out: &mut Vec<String>) {
    let Ok(parts) = TermId::raw(id).decompose() else {
        return;
    };
    for arg in &parts.args {
        if is_variable(arg) || is_wildcard(arg) {
            continue;
        }
        if is_compound_arg(arg) {
            collect_concrete(arg, out);
        } else {
            out.push(arg.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// One concrete answer to a question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The matching edge.
    pub term: TermId,
    /// Its strongest truth at match time.
    pub truth: Truth,
    /// Its expectation at match time.
    pub expectation: f32,
    /// Variable bindings extracted by unification.
    pub bindings: Bindings,
}

/// Lifecycle state of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Pending,
    Answered,
    TimedOut,
    Cancelled,
}

#[derive(Debug)]
struct QuestionState {
    status: QuestionStatus,
    answers: Vec<Answer>,
    elapsed_ms: u64,
}

/// Cheap-to-clone completion handle for one question.
///
/// Completed from inside the step loop; callers poll `status` or
/// `try_result` between runs.
#[derive(Debug, Clone)]
pub struct QuestionHandle {
    id: u64,
    edge: TermId,
    state: Arc<Mutex<QuestionState>>,
}

impl QuestionHandle {
    /// The table key of this question.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The `Question(pattern)` edge asserted for this question.
    pub fn edge(&self) -> &TermId {
        &self.edge
    }

    /// Current lifecycle status.
    pub fn status(&self) -> QuestionStatus {
        self.state.lock().expect("question state poisoned").status
    }

    /// Answers collected so far (also available while pending).
    pub fn answers(&self) -> Vec<Answer> {
        self.state
            .lock()
            .expect("question state poisoned")
            .answers
            .clone()
    }

    /// The final outcome, once the question has left the pending state.
    pub fn try_result(&self) -> Option<Result<Vec<Answer>, QuestionError>> {
        let state = self.state.lock().expect("question state poisoned");
        match state.status {
            QuestionStatus::Pending => None,
            QuestionStatus::Answered => Some(Ok(state.answers.clone())),
            QuestionStatus::TimedOut => Some(Err(QuestionError::Timeout {
                elapsed_ms: state.elapsed_ms,
            })),
            QuestionStatus::Cancelled => Some(Err(QuestionError::Cancelled)),
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Options for `ask`.
#[derive(Debug, Clone, Copy)]
pub struct AskOptions {
    /// Deadline override, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Urgency in [0, 1]; shortens the deadline and raises the seed budget.
    pub urgency: f32,
    /// Minimum expectation for a belief to count as an answer.
    pub min_expectation: f32,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            urgency: 0.0,
            min_expectation: 0.5,
        }
    }
}

struct PendingQuestion {
    pattern: TermId,
    asked_at: Instant,
    deadline: Instant,
    min_expectation: f32,
    state: Arc<Mutex<QuestionState>>,
}

/// Outcome of one resolver sweep entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Resolved {
        id: u64,
        response_time_ms: f32,
        answers: usize,
    },
    TimedOut {
        id: u64,
        response_time_ms: f32,
    },
}

/// The pending-question table.
#[derive(Default)]
pub struct QuestionTable {
    next_id: u64,
    pending: HashMap<u64, PendingQuestion>,
}

impl QuestionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending question for an asserted pattern.
    ///
    /// The deadline is `default_timeout × (1.5 − min(1, urgency))`.
    pub fn register(
        &mut self,
        question_edge: TermId,
        pattern: TermId,
        options: AskOptions,
        default_timeout_ms: u64,
    ) -> QuestionHandle {
        let timeout = options.timeout_ms.unwrap_or(default_timeout_ms);
        let scaled = (timeout as f64 * (1.5 - f64::from(options.urgency.clamp(0.0, 1.0)))) as u64;
        let now = Instant::now();

        let id = self.next_id;
        self.next_id += 1;
        let state = Arc::new(Mutex::new(QuestionState {
            status: QuestionStatus::Pending,
            answers: Vec::new(),
            elapsed_ms: 0,
        }));
        self.pending.insert(
            id,
            PendingQuestion {
                pattern,
                asked_at: now,
                deadline: now + Duration::from_millis(scaled.max(1)),
                min_expectation: options.min_expectation,
                state: Arc::clone(&state),
            },
        );
        QuestionHandle {
            id,
            edge: question_edge,
            state,
        }
    }

    /// Unify a freshly revised edge against every pending pattern.
    ///
    /// Returns the ids of questions that gained an answer.
    pub fn notify_belief(&mut self, edge: &Hyperedge) -> Vec<u64> {
        if edge.kind == TermKind::Question {
            return Vec::new();
        }
        let truth = edge.truth();
        let expectation = truth.expectation();

        let mut fed = Vec::new();
        for (id, question) in &mut self.pending {
            if expectation < question.min_expectation {
                continue;
            }
            let Some(bindings) = unify(&question.pattern, &edge.id) else {
                continue;
            };
            let mut state = question.state.lock().expect("question state poisoned");
            if state.answers.iter().any(|a| a.term == edge.id) {
                continue;
            }
            state.answers.push(Answer {
                term: edge.id.clone(),
                truth,
                expectation,
                bindings,
            });
            fed.push(*id);
        }
        fed
    }

    /// Resolve answered questions and reject expired ones.
    pub fn sweep(&mut self, now: Instant) -> Vec<SweepOutcome> {
        let mut outcomes = Vec::new();
        self.pending.retain(|id, question| {
            let mut state = question.state.lock().expect("question state poisoned");
            let response_time_ms = now.duration_since(question.asked_at).as_secs_f32() * 1000.0;
            state.elapsed_ms = response_time_ms as u64;
            if !state.answers.is_empty() {
                state.status = QuestionStatus::Answered;
                outcomes.push(SweepOutcome::Resolved {
                    id: *id,
                    response_time_ms,
                    answers: state.answers.len(),
                });
                false
            } else if now >= question.deadline {
                state.status = QuestionStatus::TimedOut;
                outcomes.push(SweepOutcome::TimedOut {
                    id: *id,
                    response_time_ms,
                });
                false
            } else {
                true
            }
        });
        outcomes
    }

    /// Cancel a pending question.
    pub fn cancel(&mut self, id: u64) -> bool {
        if let Some(question) = self.pending.remove(&id) {
            question
                .state
                .lock()
                .expect("question state poisoned")
                .status = QuestionStatus::Cancelled;
            true
        } else {
            false
        }
    }

    /// Edge ids referenced by pending patterns, for importance bumps and
    /// forgetting protection.
    pub fn pending_terms(&self) -> HashSet<TermId> {
        let mut out = HashSet::new();
        for question in self.pending.values() {
            out.insert(question.pattern.clone());
            for token in concrete_tokens(&question.pattern) {
                if is_compound_arg(&token) {
                    out.insert(TermId::raw(token));
                } else {
                    out.insert(TermId::compose(TermKind::Atom, &[token]));
                }
            }
        }
        out
    }

    /// Number of pending questions.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Force-expire the oldest questions beyond `max_pending`.
    pub fn shrink(&mut self, max_pending: usize) {
        if self.pending.len() <= max_pending {
            return;
        }
        let mut by_age: Vec<(u64, Instant)> = self
            .pending
            .iter()
            .map(|(id, q)| (*id, q.asked_at))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        let excess = self.pending.len() - max_pending;
        for (id, _) in by_age.into_iter().take(excess) {
            if let Some(question) = self.pending.remove(&id) {
                question
                    .state
                    .lock()
                    .expect("question state poisoned")
                    .status = QuestionStatus::TimedOut;
            }
        }
    }

    /// Drop everything (snapshot restore).
    pub fn clear(&mut self) {
        for question in self.pending.values() {
            question
                .state
                .lock()
                .expect("question state poisoned")
                .status = QuestionStatus::Cancelled;
        }
        self.pending.clear();
    }
}

impl std::fmt::Debug for QuestionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionTable")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Belief;
    use crate::truth::Budget;

    fn concrete_edge(kind: TermKind, args: &[&str], truth: Truth) -> Hyperedge {
        let mut edge = Hyperedge::new(kind, args.iter().map(|s| s.to_string()).collect());
        edge.revise(Belief::new(truth, Budget::default()), 8);
        edge
    }

    #[test]
    fn variables_bind() {
        let pattern = TermId::raw("Inheritance($x,animal)");
        let candidate = TermId::raw("Inheritance(bird,animal)");
        let bindings = unify(&pattern, &candidate).unwrap();
        assert_eq!(bindings.get("$x").map(String::as_str), Some("bird"));
    }

    #[test]
    fn repeated_variables_must_agree() {
        let pattern = TermId::raw("Similarity($x,$x)");
        assert!(unify(&pattern, &TermId::raw("Similarity(a,a)")).is_some());
        assert!(unify(&pattern, &TermId::raw("Similarity(a,b)")).is_none());
    }

    #[test]
    fn wildcard_matches_without_binding() {
        let pattern = TermId::raw("Inheritance(*,animal)");
        let bindings = unify(&pattern, &TermId::raw("Inheritance(bird,animal)")).unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn kinds_and_arity_must_match() {
        assert!(unify(
            &TermId::raw("Similarity($x,animal)"),
            &TermId::raw("Inheritance(bird,animal)")
        )
        .is_none());
        assert!(unify(
            &TermId::raw("Product($x)"),
            &TermId::raw("Product(a,b)")
        )
        .is_none());
    }

    #[test]
    fn nested_patterns_unify() {
        let pattern = TermId::raw("Implication(Inheritance($x,bird),Inheritance($x,flier))");
        let candidate =
            TermId::raw("Implication(Inheritance(tweety,bird),Inheritance(tweety,flier))");
        let bindings = unify(&pattern, &candidate).unwrap();
        assert_eq!(bindings.get("$x").map(String::as_str), Some("tweety"));

        let mismatched =
            TermId::raw("Implication(Inheritance(tweety,bird),Inheritance(sam,flier))");
        assert!(unify(&pattern, &mismatched).is_none());
    }

    #[test]
    fn concrete_token_extraction() {
        let pattern = TermId::raw("Implication(Inheritance($x,bird),Term(sky))");
        let tokens = concrete_tokens(&pattern);
        assert!(tokens.contains(&"bird".to_string()));
        assert!(tokens.contains(&"sky".to_string()));
        assert!(!tokens.iter().any(|t| t == "$x"));
    }

    #[test]
    fn matching_belief_feeds_answer() {
        let mut table = QuestionTable::new();
        let handle = table.register(
            TermId::raw("Question(Inheritance($x,animal))"),
            TermId::raw("Inheritance($x,animal)"),
            AskOptions::default(),
            3000,
        );

        let edge = concrete_edge(
            TermKind::Inheritance,
            &["bird", "animal"],
            Truth::new(1.0, 0.9),
        );
        let fed = table.notify_belief(&edge);
        assert_eq!(fed.len(), 1);

        let outcomes = table.sweep(Instant::now());
        assert!(matches!(
            outcomes.as_slice(),
            [SweepOutcome::Resolved { answers: 1, .. }]
        ));
        assert_eq!(handle.status(), QuestionStatus::Answered);
        let answers = handle.answers();
        assert_eq!(answers[0].bindings.get("$x").map(String::as_str), Some("bird"));
    }

    #[test]
    fn weak_beliefs_are_not_answers() {
        let mut table = QuestionTable::new();
        let handle = table.register(
            TermId::raw("Question(Inheritance($x,animal))"),
            TermId::raw("Inheritance($x,animal)"),
            AskOptions::default(),
            3000,
        );
        let edge = concrete_edge(
            TermKind::Inheritance,
            &["bird", "animal"],
            Truth::new(0.5, 0.1),
        );
        assert!(table.notify_belief(&edge).is_empty());
        assert_eq!(handle.status(), QuestionStatus::Pending);
    }

    #[test]
    fn unanswered_question_times_out() {
        let mut table = QuestionTable::new();
        let handle = table.register(
            TermId::raw("Question(Inheritance($x,ghost))"),
            TermId::raw("Inheritance($x,ghost)"),
            AskOptions {
                timeout_ms: Some(1),
                ..Default::default()
            },
            3000,
        );

        std::thread::sleep(Duration::from_millis(10));
        let outcomes = table.sweep(Instant::now());
        assert!(matches!(outcomes.as_slice(), [SweepOutcome::TimedOut { .. }]));
        assert_eq!(handle.status(), QuestionStatus::TimedOut);
        assert!(matches!(
            handle.try_result(),
            Some(Err(QuestionError::Timeout { .. }))
        ));
    }

    #[test]
    fn urgency_shortens_deadlines() {
        let mut table = QuestionTable::new();
        let relaxed = table.register(
            TermId::raw("Question(Term(a))"),
            TermId::raw("Term(a)"),
            AskOptions::default(),
            1000,
        );
        let urgent = table.register(
            TermId::raw("Question(Term(b))"),
            TermId::raw("Term(b)"),
            AskOptions {
                urgency: 1.0,
                ..Default::default()
            },
            1000,
        );
        let relaxed_deadline = table.pending[&relaxed.id()].deadline;
        let urgent_deadline = table.pending[&urgent.id()].deadline;
        assert!(urgent_deadline < relaxed_deadline);
    }

    #[test]
    fn cancel_removes_entry() {
        let mut table = QuestionTable::new();
        let handle = table.register(
            TermId::raw("Question(Term(a))"),
            TermId::raw("Term(a)"),
            AskOptions::default(),
            3000,
        );
        assert!(table.cancel(handle.id()));
        assert!(!table.cancel(handle.id()));
        assert_eq!(handle.status(), QuestionStatus::Cancelled);
        assert_eq!(table.pending_count(), 0);
    }

    #[test]
    fn pending_terms_cover_pattern_tokens() {
        let mut table = QuestionTable::new();
        table.register(
            TermId::raw("Question(Inheritance($x,animal))"),
            TermId::raw("Inheritance($x,animal)"),
            AskOptions::default(),
            3000,
        );
        let terms = table.pending_terms();
        assert!(terms.contains(&TermId::raw("Term(animal)")));
        assert!(terms.contains(&TermId::raw("Inheritance($x,animal)")));
    }
}
