//! Truth-value and budget arithmetic.
//!
//! A [`Truth`] is the four-component uncertainty measure attached to every
//! belief: frequency (evidence in favor), confidence (evidence weight,
//! monotone non-decreasing under revision), priority, and doubt. A
//! [`Budget`] is the three-component resource measure that drives the event
//! scheduler. Both are plain value types; all operators return new values
//! and clamp every component to [0, 1].

use serde::{Deserialize, Serialize};

/// Expectation delta below which a revision is considered a no-op.
pub const EXPECTATION_EPSILON: f32 = 0.01;

/// Four-component truth value `(frequency, confidence, priority, doubt)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    /// Belief in favor of the proposition, in [0, 1].
    pub frequency: f32,
    /// Evidence weight, in [0, 1]. Never decreases under revision.
    pub confidence: f32,
    /// Attention weight used by revision averaging, in [0, 1].
    pub priority: f32,
    /// Accumulated disagreement between revised sources, in [0, 1].
    pub doubt: f32,
}

impl Truth {
    /// Create a truth value with the given frequency and confidence.
    ///
    /// Priority defaults to 0.5 and doubt to 0.
    pub fn new(frequency: f32, confidence: f32) -> Self {
        Self {
            frequency: frequency.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            priority: 0.5,
            doubt: 0.0,
        }
    }

    /// Set the priority component.
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }

    /// Set the doubt component.
    pub fn with_doubt(mut self, doubt: f32) -> Self {
        self.doubt = doubt.clamp(0.0, 1.0);
        self
    }

    /// The truth value of a proposition nothing is known about: `(0.5, 0.1)`.
    pub fn unknown() -> Self {
        Self::new(0.5, 0.1)
    }

    /// The default truth for externally asserted beliefs: `(1.0, 0.9)`.
    pub fn default_belief() -> Self {
        Self::new(1.0, 0.9)
    }

    /// Expected truth: `c·(f − 0.5) + 0.5`, scaled by `(1 − doubt)`.
    pub fn expectation(&self) -> f32 {
        ((self.confidence * (self.frequency - 0.5) + 0.5) * (1.0 - self.doubt)).clamp(0.0, 1.0)
    }

    /// Combine two beliefs about the same proposition.
    ///
    /// Frequency is the priority-weighted mean, confidence accumulates as
    /// `1 − (1−c1)(1−c2)`, and doubt grows with the disagreement between the
    /// two frequencies.
    pub fn revise(&self, other: &Truth) -> Truth {
        let w1 = self.priority.max(1e-3);
        let w2 = other.priority.max(1e-3);
        let frequency = (self.frequency * w1 + other.frequency * w2) / (w1 + w2);
        let confidence = 1.0 - (1.0 - self.confidence) * (1.0 - other.confidence);
        let doubt = (self.doubt.max(other.doubt) + (self.frequency - other.frequency).abs())
            .clamp(0.0, 1.0);
        Truth {
            frequency: frequency.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            priority: self.priority.max(other.priority),
            doubt,
        }
    }

    /// Forward chaining: from `A→B` and `B→C`, the truth of `A→C`.
    pub fn deduction(&self, other: &Truth) -> Truth {
        Truth {
            frequency: (self.frequency * other.frequency).clamp(0.0, 1.0),
            confidence: (self.confidence * other.confidence).clamp(0.0, 1.0),
            priority: (self.priority + other.priority) / 2.0,
            doubt: self.doubt.max(other.doubt),
        }
    }

    /// Analogy: deduction through a similarity, discounted by the
    /// similarity's frequency.
    pub fn analogy(&self, other: &Truth) -> Truth {
        Truth {
            frequency: (self.frequency * other.frequency).clamp(0.0, 1.0),
            confidence: (self.confidence * other.confidence * other.frequency).clamp(0.0, 1.0),
            priority: (self.priority + other.priority) / 2.0,
            doubt: self.doubt.max(other.doubt),
        }
    }

    /// Abduction: explanatory inference, weaker than deduction.
    pub fn abduction(&self, other: &Truth) -> Truth {
        Truth {
            frequency: other.frequency,
            confidence: (self.confidence * other.confidence * self.frequency).clamp(0.0, 1.0),
            priority: (self.priority + other.priority) / 2.0,
            doubt: self.doubt.max(other.doubt),
        }
    }

    /// Induction: generalizing inference, weaker than deduction.
    pub fn induction(&self, other: &Truth) -> Truth {
        Truth {
            frequency: self.frequency,
            confidence: (self.confidence * other.confidence * other.frequency).clamp(0.0, 1.0),
            priority: (self.priority + other.priority) / 2.0,
            doubt: self.doubt.max(other.doubt),
        }
    }

    /// Invert the frequency, keeping all other components.
    pub fn negate(&self) -> Truth {
        Truth {
            frequency: 1.0 - self.frequency,
            ..*self
        }
    }
}

impl std::fmt::Display for Truth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{:.2};{:.2}%", self.frequency, self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Three-component resource budget `(priority, durability, quality)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// How urgently the associated item should be processed.
    pub priority: f32,
    /// How slowly the item's priority should decay.
    pub durability: f32,
    /// How useful the item is expected to be.
    pub quality: f32,
}

impl Budget {
    /// Create a budget, clamping each component to [0, 1].
    pub fn new(priority: f32, durability: f32, quality: f32) -> Self {
        Self {
            priority: priority.clamp(0.0, 1.0),
            durability: durability.clamp(0.0, 1.0),
            quality: quality.clamp(0.0, 1.0),
        }
    }

    /// The scheduler's ordering key: the component mean.
    pub fn total(&self) -> f32 {
        (self.priority + self.durability + self.quality) / 3.0
    }

    /// Scale every component by `k`.
    pub fn scale(&self, k: f32) -> Budget {
        Budget::new(self.priority * k, self.durability * k, self.quality * k)
    }

    /// Componentwise mean of two budgets.
    pub fn merge(&self, other: &Budget) -> Budget {
        Budget::new(
            (self.priority + other.priority) / 2.0,
            (self.durability + other.durability) / 2.0,
            (self.quality + other.quality) / 2.0,
        )
    }

    /// Whether two budgets differ by at most `epsilon` in every component.
    pub fn equivalent(&self, other: &Budget, epsilon: f32) -> bool {
        (self.priority - other.priority).abs() <= epsilon
            && (self.durability - other.durability).abs() <= epsilon
            && (self.quality - other.quality).abs() <= epsilon
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5)
    }
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "${:.2};{:.2};{:.2}$",
            self.priority, self.durability, self.quality
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectation_of_unknown_is_half() {
        let t = Truth::unknown();
        assert!((t.expectation() - 0.5).abs() < 0.01);
    }

    #[test]
    fn expectation_in_unit_interval() {
        for (f, c, d) in [
            (0.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 1.0),
            (0.3, 0.7, 0.4),
        ] {
            let t = Truth::new(f, c).with_doubt(d);
            let e = t.expectation();
            assert!((0.0..=1.0).contains(&e), "expectation {e} out of range");
        }
    }

    #[test]
    fn revision_raises_confidence() {
        let a = Truth::new(0.9, 0.5);
        let b = Truth::new(0.8, 0.5);
        let r = a.revise(&b);
        assert!(r.confidence > a.confidence);
        assert!(r.confidence > b.confidence);
        assert!((r.confidence - 0.75).abs() < 0.001);
    }

    #[test]
    fn revision_frequency_is_weighted_mean() {
        let a = Truth::new(1.0, 0.9).with_priority(0.9);
        let b = Truth::new(0.0, 0.9).with_priority(0.1);
        let r = a.revise(&b);
        assert!(r.frequency > 0.8, "frequency {} should lean to a", r.frequency);
    }

    #[test]
    fn revision_disagreement_raises_doubt() {
        let a = Truth::new(0.9, 0.9);
        let b = Truth::new(0.1, 0.9);
        let r = a.revise(&b);
        assert!(r.doubt >= 0.79);
    }

    #[test]
    fn revising_with_unknown_keeps_expectation() {
        let a = Truth::new(0.9, 0.8);
        let r = a.revise(&Truth::unknown());
        assert!((r.expectation() - a.expectation()).abs() < 0.2);
        assert!(r.confidence >= a.confidence);
    }

    #[test]
    fn deduction_multiplies() {
        let ab = Truth::new(1.0, 0.9);
        let bc = Truth::new(1.0, 0.9);
        let ac = ab.deduction(&bc);
        assert!((ac.frequency - 1.0).abs() < f32::EPSILON);
        assert!((ac.confidence - 0.81).abs() < 0.001);
    }

    #[test]
    fn analogy_discounts_by_similarity_frequency() {
        let inh = Truth::new(1.0, 0.9);
        let sim = Truth::new(0.8, 0.9);
        let out = inh.analogy(&sim);
        assert!((out.confidence - 0.9 * 0.9 * 0.8).abs() < 0.001);
    }

    #[test]
    fn negate_inverts_frequency() {
        let t = Truth::new(0.9, 0.8);
        let n = t.negate();
        assert!((n.frequency - 0.1).abs() < 0.001);
        assert!((n.confidence - 0.8).abs() < f32::EPSILON);
        assert!((n.negate().frequency - t.frequency).abs() < 0.001);
    }

    #[test]
    fn budget_total_is_mean() {
        let b = Budget::new(0.9, 0.6, 0.3);
        assert!((b.total() - 0.6).abs() < 0.001);
    }

    #[test]
    fn budget_scale_clamps() {
        let b = Budget::new(0.9, 0.9, 0.9).scale(2.0);
        assert!((b.priority - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn budget_merge_is_componentwise_mean() {
        let a = Budget::new(1.0, 0.0, 0.5);
        let b = Budget::new(0.0, 1.0, 0.5);
        let m = a.merge(&b);
        assert!((m.priority - 0.5).abs() < f32::EPSILON);
        assert!((m.durability - 0.5).abs() < f32::EPSILON);
        assert!((m.quality - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn budget_equivalence() {
        let a = Budget::new(0.5, 0.5, 0.5);
        let b = Budget::new(0.52, 0.48, 0.54);
        assert!(a.equivalent(&b, 0.05));
        assert!(!a.equivalent(&b, 0.01));
    }
}
