//! The meta-reasoner: self-monitoring and parameter adaptation.
//!
//! On each maintenance tick the meta-reasoner normalizes the activity
//! counters accumulated since the previous tick into rates, detects
//! operational issues, nudges kernel thresholds toward relief, shifts the
//! processing focus, and re-balances the resource fractions the maintenance
//! passes are advised to spend. It also converts per-rule success statistics
//! into the priority advice the derivation registry reads.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::KernelConfig;
use crate::derive::FiringReport;

/// Attempts required before a rule's own statistics drive its priority.
const RULE_ADVICE_MIN_ATTEMPTS: u64 = 10;
/// Smoothing rate for resource-fraction re-balancing.
const FRACTION_RATE: f32 = 0.1;

/// What the kernel is currently organized around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Focus {
    Default,
    QuestionAnswering,
    ContradictionResolution,
}

impl std::fmt::Display for Focus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Focus::Default => write!(f, "default"),
            Focus::QuestionAnswering => write!(f, "question-answering"),
            Focus::ContradictionResolution => write!(f, "contradiction-resolution"),
        }
    }
}

/// Normalized metrics for one monitoring window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub inference_rate: f32,
    pub contradiction_rate: f32,
    pub resource_utilization: f32,
    pub question_response_time: f32,
}

/// Operational issues the monitor can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaIssue {
    HighContradictions,
    LowInferenceRate,
    HighResourceUtilization,
    SlowQuestionResponse,
}

/// Normalized maintenance-effort split advised to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceFractions {
    pub derivation: f32,
    pub memory: f32,
    pub temporal: f32,
}

impl ResourceFractions {
    fn target_for(focus: Focus) -> Self {
        match focus {
            Focus::Default => Self {
                derivation: 0.6,
                memory: 0.25,
                temporal: 0.15,
            },
            Focus::QuestionAnswering => Self {
                derivation: 0.7,
                memory: 0.2,
                temporal: 0.1,
            },
            Focus::ContradictionResolution => Self {
                derivation: 0.45,
                memory: 0.4,
                temporal: 0.15,
            },
        }
    }

    fn step_toward(&mut self, target: &Self) {
        self.derivation += (target.derivation - self.derivation) * FRACTION_RATE;
        self.memory += (target.memory - self.memory) * FRACTION_RATE;
        self.temporal += (target.temporal - self.temporal) * FRACTION_RATE;
        let total = self.derivation + self.memory + self.temporal;
        if total > f32::EPSILON {
            self.derivation /= total;
            self.memory /= total;
            self.temporal /= total;
        }
    }
}

/// Result of one monitoring tick.
#[derive(Debug, Clone)]
pub struct MonitorOutcome {
    pub metrics: Metrics,
    pub issues: Vec<MetaIssue>,
    /// `(from, to)` when the focus shifted this tick.
    pub focus_changed: Option<(Focus, Focus)>,
}

/// Tracks activity counters and adapts the kernel configuration.
#[derive(Debug)]
pub struct MetaReasoner {
    firings: u64,
    contradictions: u64,
    question_rts_ms: Vec<f32>,
    window_start: Instant,
    rule_stats: HashMap<&'static str, (u64, u64)>,
    focus: Focus,
    fractions: ResourceFractions,
}

impl MetaReasoner {
    pub fn new() -> Self {
        Self {
            firings: 0,
            contradictions: 0,
            question_rts_ms: Vec::new(),
            window_start: Instant::now(),
            rule_stats: HashMap::new(),
            focus: Focus::Default,
            fractions: ResourceFractions::target_for(Focus::Default),
        }
    }

    // -- recording ---------------------------------------------------------

    /// Account one rule firing.
    pub fn record_firing(&mut self, report: &FiringReport) {
        self.firings += 1;
        let entry = self.rule_stats.entry(report.rule).or_insert((0, 0));
        entry.0 += 1;
        if report.success {
            entry.1 += 1;
        }
    }

    /// Account one detected contradiction.
    pub fn record_contradiction(&mut self) {
        self.contradictions += 1;
    }

    /// Account one resolved question's response time.
    pub fn record_question_rt(&mut self, millis: f32) {
        self.question_rts_ms.push(millis.max(0.0));
    }

    // -- advice ------------------------------------------------------------

    /// Priority multiplier for a rule: `0.5 + success_rate` once the rule
    /// has enough history, neutral before that.
    pub fn rule_priority(&self, rule: &str) -> f32 {
        match self.rule_stats.get(rule) {
            Some((attempts, successes)) if *attempts >= RULE_ADVICE_MIN_ATTEMPTS => {
                0.5 + *successes as f32 / *attempts as f32
            }
            _ => 1.0,
        }
    }

    /// Current focus.
    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Current resource fractions.
    pub fn fractions(&self) -> ResourceFractions {
        self.fractions
    }

    // -- monitoring --------------------------------------------------------

    /// Normalize the window's counters, detect issues, adapt the config,
    /// and possibly shift focus. Resets the window.
    pub fn self_monitor(&mut self, queue_len: usize, config: &mut KernelConfig) -> MonitorOutcome {
        let dt = self.window_start.elapsed().as_secs_f32().max(1e-3);

        let mean_rt = if self.question_rts_ms.is_empty() {
            0.0
        } else {
            self.question_rts_ms.iter().sum::<f32>() / self.question_rts_ms.len() as f32
        };
        let metrics = Metrics {
            inference_rate: ((self.firings as f32 / dt) / 200.0).min(1.0),
            contradiction_rate: ((self.contradictions as f32 / dt) / 5.0).min(1.0),
            resource_utilization: (queue_len as f32 / 2000.0).min(1.0),
            question_response_time: (1.0 - mean_rt / config.question_timeout_ms.max(1) as f32)
                .max(0.0),
        };

        let mut issues = Vec::new();
        if metrics.contradiction_rate > 0.3 {
            issues.push(MetaIssue::HighContradictions);
            config.inference_threshold = (config.inference_threshold * 1.1).min(0.6);
        }
        if metrics.inference_rate < 0.1 && queue_len > 100 {
            issues.push(MetaIssue::LowInferenceRate);
            config.inference_threshold = (config.inference_threshold * 0.9).max(0.05);
            config.budget_threshold = (config.budget_threshold * 0.95).max(0.01);
        }
        if metrics.resource_utilization > 0.8 {
            issues.push(MetaIssue::HighResourceUtilization);
            config.budget_threshold = (config.budget_threshold * 1.2).min(0.25);
            config.max_path_length = config.max_path_length.saturating_sub(1).max(5);
        }
        if !self.question_rts_ms.is_empty() && metrics.question_response_time < 0.4 {
            issues.push(MetaIssue::SlowQuestionResponse);
        }

        let new_focus = if issues.contains(&MetaIssue::HighContradictions) {
            Focus::ContradictionResolution
        } else if issues.contains(&MetaIssue::SlowQuestionResponse) {
            Focus::QuestionAnswering
        } else {
            Focus::Default
        };
        let focus_changed = if new_focus != self.focus {
            let change = (self.focus, new_focus);
            tracing::info!(from = %change.0, to = %change.1, "reasoning focus shifted");
            self.focus = new_focus;
            Some(change)
        } else {
            None
        };

        self.fractions
            .step_toward(&ResourceFractions::target_for(self.focus));

        self.firings = 0;
        self.contradictions = 0;
        self.question_rts_ms.clear();
        self.window_start = Instant::now();

        MonitorOutcome {
            metrics,
            issues,
            focus_changed,
        }
    }
}

impl Default for MetaReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firing(rule: &'static str, success: bool) -> FiringReport {
        FiringReport {
            rule,
            success,
            cost: 1.0,
            value: if success { 1.0 } else { 0.0 },
        }
    }

    #[test]
    fn contradiction_burst_raises_inference_threshold() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        let before = config.inference_threshold;

        for _ in 0..5 {
            meta.record_contradiction();
        }
        let outcome = meta.self_monitor(0, &mut config);

        assert!(outcome.issues.contains(&MetaIssue::HighContradictions));
        assert!(config.inference_threshold > before);
        assert!(config.inference_threshold <= 0.6);
    }

    #[test]
    fn idle_stuffed_queue_lowers_thresholds() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        let before_inference = config.inference_threshold;
        let before_budget = config.budget_threshold;

        let outcome = meta.self_monitor(500, &mut config);

        assert!(outcome.issues.contains(&MetaIssue::LowInferenceRate));
        assert!(config.inference_threshold < before_inference);
        assert!(config.budget_threshold < before_budget);
    }

    #[test]
    fn saturation_shortens_paths() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();

        let outcome = meta.self_monitor(1_900, &mut config);

        assert!(outcome.issues.contains(&MetaIssue::HighResourceUtilization));
        assert_eq!(config.max_path_length, 14);
        assert!(config.budget_threshold > 0.05);
    }

    #[test]
    fn path_length_floor_is_five() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        config.max_path_length = 5;
        meta.self_monitor(1_900, &mut config);
        assert_eq!(config.max_path_length, 5);
    }

    #[test]
    fn focus_shifts_and_reports() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        assert_eq!(meta.focus(), Focus::Default);

        for _ in 0..10 {
            meta.record_contradiction();
        }
        let outcome = meta.self_monitor(0, &mut config);
        assert_eq!(
            outcome.focus_changed,
            Some((Focus::Default, Focus::ContradictionResolution))
        );

        // A quiet window shifts back.
        let outcome = meta.self_monitor(0, &mut config);
        assert_eq!(
            outcome.focus_changed,
            Some((Focus::ContradictionResolution, Focus::Default))
        );
    }

    #[test]
    fn slow_questions_shift_focus() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        meta.record_question_rt(2_900.0);
        let outcome = meta.self_monitor(0, &mut config);
        assert!(outcome.issues.contains(&MetaIssue::SlowQuestionResponse));
        assert_eq!(meta.focus(), Focus::QuestionAnswering);
    }

    #[test]
    fn rule_advice_needs_history() {
        let mut meta = MetaReasoner::new();
        for _ in 0..5 {
            meta.record_firing(&firing("young", true));
        }
        assert!((meta.rule_priority("young") - 1.0).abs() < f32::EPSILON);
        assert!((meta.rule_priority("unseen") - 1.0).abs() < f32::EPSILON);

        for _ in 0..15 {
            meta.record_firing(&firing("seasoned", true));
        }
        assert!((meta.rule_priority("seasoned") - 1.5).abs() < 0.001);

        for _ in 0..20 {
            meta.record_firing(&firing("failing", false));
        }
        assert!((meta.rule_priority("failing") - 0.5).abs() < 0.001);
    }

    #[test]
    fn fractions_stay_normalized() {
        let mut meta = MetaReasoner::new();
        let mut config = KernelConfig::default();
        for _ in 0..10 {
            meta.record_contradiction();
            meta.self_monitor(0, &mut config);
        }
        let f = meta.fractions();
        assert!((f.derivation + f.memory + f.temporal - 1.0).abs() < 0.001);
        // Contradiction focus shifts effort toward memory upkeep.
        assert!(f.memory > 0.25);
    }
}
