//! The built-in derivation rules.
//!
//! Every rule follows the same shape: look up companion edges through the
//! argument index, combine truths with the appropriate operator from
//! [`Truth`], and return conclusions citing both premises. Pattern edges
//! (arguments containing variables or wildcards) never derive.

use crate::allen::{AllenRelation, compose};
use crate::derive::{Conclusion, DerivationRule, RuleContext};
use crate::graph::Hyperedge;
use crate::term::{TermId, TermKind, is_variable, is_wildcard};

/// Activation above which an implication antecedent counts as active.
const ANTECEDENT_GATE: f32 = 0.5;
/// Confidence attenuation applied to composed temporal relations.
const TEMPORAL_SCALE: f32 = 0.7;

/// Whether an edge is a concrete fact (no variables or wildcards).
fn concrete(edge: &Hyperedge) -> bool {
    !edge
        .args
        .iter()
        .any(|a| is_variable(a) || is_wildcard(a))
}

/// The token other edges use to reference this edge as an argument:
/// the bare name for atoms, the full id for compounds.
fn ref_token(edge: &Hyperedge) -> &str {
    if edge.kind == TermKind::Atom {
        &edge.args[0]
    } else {
        edge.id.as_str()
    }
}

/// The edge id an argument token refers to.
fn arg_edge_id(arg: &str) -> TermId {
    if arg.contains('(') {
        TermId::raw(arg)
    } else {
        TermId::compose(TermKind::Atom, &[arg.to_string()])
    }
}

// ---------------------------------------------------------------------------
// Inheritance transitivity
// ---------------------------------------------------------------------------

/// `Inheritance(A,B)` with `Inheritance(B,C)` yields `Inheritance(A,C)`
/// under deduction, chaining in both directions from the trigger edge.
pub struct InheritanceTransitivity;

impl DerivationRule for InheritanceTransitivity {
    fn name(&self) -> &'static str {
        "inheritance-transitivity"
    }

    fn triggers(&self) -> Option<&'static [TermKind]> {
        Some(&[TermKind::Inheritance])
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        if !concrete(ctx.edge) || ctx.edge.args.len() != 2 {
            return Vec::new();
        }
        let (a, b) = (&ctx.edge.args[0], &ctx.edge.args[1]);
        let truth_ab = ctx.edge.truth();
        let mut out = Vec::new();

        // Forward: (A,B) ∘ (B,C) → (A,C)
        for id in ctx.indexes.with_arg(b) {
            let Some(companion) = ctx.store.get(id) else {
                continue;
            };
            if companion.kind != TermKind::Inheritance
                || companion.id == ctx.edge.id
                || !concrete(companion)
                || companion.args.first() != Some(b)
            {
                continue;
            }
            let c = &companion.args[1];
            if c == a {
                continue;
            }
            out.push(Conclusion::Edge {
                kind: TermKind::Inheritance,
                args: vec![a.clone(), c.clone()],
                truth: truth_ab.deduction(&companion.truth()),
                premises: vec![ctx.edge.id.clone(), companion.id.clone()],
            });
        }

        // Backward: (Z,A) ∘ (A,B) → (Z,B)
        for id in ctx.indexes.with_arg(a) {
            let Some(companion) = ctx.store.get(id) else {
                continue;
            };
            if companion.kind != TermKind::Inheritance
                || companion.id == ctx.edge.id
                || !concrete(companion)
                || companion.args.get(1) != Some(a)
            {
                continue;
            }
            let z = &companion.args[0];
            if z == b {
                continue;
            }
            out.push(Conclusion::Edge {
                kind: TermKind::Inheritance,
                args: vec![z.clone(), b.clone()],
                truth: companion.truth().deduction(&truth_ab),
                premises: vec![companion.id.clone(), ctx.edge.id.clone()],
            });
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Analogy
// ---------------------------------------------------------------------------

/// `Similarity(X,Y)` carries inheritance across: `Inheritance(X,P)` yields
/// `Inheritance(Y,P)` under the analogy operator. Fires from either side of
/// the pair so insertion order does not matter.
pub struct AnalogyBridge;

impl AnalogyBridge {
    fn from_similarity(ctx: &RuleContext<'_>, out: &mut Vec<Conclusion>) {
        let truth_sim = ctx.edge.truth();
        for side in 0..2 {
            let subject = &ctx.edge.args[side];
            let counterpart = &ctx.edge.args[1 - side];
            for id in ctx.indexes.with_arg(subject) {
                let Some(inh) = ctx.store.get(id) else {
                    continue;
                };
                if inh.kind != TermKind::Inheritance
                    || !concrete(inh)
                    || inh.args.first() != Some(subject)
                {
                    continue;
                }
                let property = &inh.args[1];
                if property == counterpart {
                    continue;
                }
                out.push(Conclusion::Edge {
                    kind: TermKind::Inheritance,
                    args: vec![counterpart.clone(), property.clone()],
                    truth: inh.truth().analogy(&truth_sim),
                    premises: vec![inh.id.clone(), ctx.edge.id.clone()],
                });
            }
        }
    }

    fn from_inheritance(ctx: &RuleContext<'_>, out: &mut Vec<Conclusion>) {
        let subject = &ctx.edge.args[0];
        let property = &ctx.edge.args[1];
        let truth_inh = ctx.edge.truth();
        for id in ctx.indexes.with_arg(subject) {
            let Some(sim) = ctx.store.get(id) else {
                continue;
            };
            if sim.kind != TermKind::Similarity || !concrete(sim) {
                continue;
            }
            let counterpart = if sim.args.first() == Some(subject) {
                sim.args.get(1)
            } else if sim.args.get(1) == Some(subject) {
                sim.args.first()
            } else {
                None
            };
            let Some(counterpart) = counterpart else {
                continue;
            };
            if counterpart == property {
                continue;
            }
            out.push(Conclusion::Edge {
                kind: TermKind::Inheritance,
                args: vec![counterpart.clone(), property.clone()],
                truth: truth_inh.analogy(&sim.truth()),
                premises: vec![ctx.edge.id.clone(), sim.id.clone()],
            });
        }
    }
}

impl DerivationRule for AnalogyBridge {
    fn name(&self) -> &'static str {
        "analogy"
    }

    fn triggers(&self) -> Option<&'static [TermKind]> {
        Some(&[TermKind::Similarity, TermKind::Inheritance])
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        if !concrete(ctx.edge) || ctx.edge.args.len() != 2 {
            return Vec::new();
        }
        let mut out = Vec::new();
        match ctx.edge.kind {
            TermKind::Similarity => Self::from_similarity(ctx, &mut out),
            TermKind::Inheritance => Self::from_inheritance(ctx, &mut out),
            _ => {}
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Equivalence expansion
// ---------------------------------------------------------------------------

/// `Equivalence(A,B)` asserts both implications with the same truth.
pub struct EquivalenceExpansion;

impl DerivationRule for EquivalenceExpansion {
    fn name(&self) -> &'static str {
        "equivalence-expansion"
    }

    fn triggers(&self) -> Option<&'static [TermKind]> {
        Some(&[TermKind::Equivalence])
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        if !concrete(ctx.edge) || ctx.edge.args.len() != 2 {
            return Vec::new();
        }
        let (a, b) = (&ctx.edge.args[0], &ctx.edge.args[1]);
        let truth = ctx.edge.truth();
        vec![
            Conclusion::Edge {
                kind: TermKind::Implication,
                args: vec![a.clone(), b.clone()],
                truth,
                premises: vec![ctx.edge.id.clone()],
            },
            Conclusion::Edge {
                kind: TermKind::Implication,
                args: vec![b.clone(), a.clone()],
                truth,
                premises: vec![ctx.edge.id.clone()],
            },
        ]
    }
}

// ---------------------------------------------------------------------------
// Conditional activation
// ---------------------------------------------------------------------------

/// Propagates activation through implications: when an antecedent is active,
/// its consequent receives activation scaled by the implication's truth.
///
/// Trigger-free: fires on implication events (checking the antecedent's
/// stored activation) and on ordinary events whose target is an antecedent.
pub struct ConditionalActivation;

impl ConditionalActivation {
    fn activate(target_arg: &str, strength: f32, out: &mut Vec<Conclusion>) {
        if strength > ANTECEDENT_GATE {
            out.push(Conclusion::Activate {
                target: arg_edge_id(target_arg),
                activation: strength,
            });
        }
    }
}

impl DerivationRule for ConditionalActivation {
    fn name(&self) -> &'static str {
        "conditional-activation"
    }

    fn triggers(&self) -> Option<&'static [TermKind]> {
        None
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        let mut out = Vec::new();

        if ctx.edge.kind == TermKind::Implication {
            if !concrete(ctx.edge) || ctx.edge.args.len() != 2 {
                return out;
            }
            let antecedent = arg_edge_id(&ctx.edge.args[0]);
            let strength =
                ctx.activations.get(&antecedent) * ctx.edge.truth().expectation();
            Self::activate(&ctx.edge.args[1], strength, &mut out);
            return out;
        }

        // The event target may itself be some implication's antecedent.
        let token = ref_token(ctx.edge);
        for id in ctx.indexes.with_arg(token) {
            let Some(implication) = ctx.store.get(id) else {
                continue;
            };
            if implication.kind != TermKind::Implication
                || !concrete(implication)
                || implication.args.first().map(String::as_str) != Some(token)
            {
                continue;
            }
            let strength = ctx.event.activation * implication.truth().expectation();
            Self::activate(&implication.args[1], strength, &mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Temporal composition
// ---------------------------------------------------------------------------

/// Chains `TemporalRelation(A,B,r1)` with `TemporalRelation(B,C,r2)` through
/// Allen composition, asserting every candidate relation with attenuated
/// confidence (attenuated twice when the composition is ambiguous).
pub struct TemporalComposition;

impl TemporalComposition {
    fn conclude(
        a: &str,
        c: &str,
        premise_first: &Hyperedge,
        premise_second: &Hyperedge,
        out: &mut Vec<Conclusion>,
    ) {
        if a == c {
            return;
        }
        let (Ok(r1), Ok(r2)) = (
            AllenRelation::from_name(&premise_first.args[2]),
            AllenRelation::from_name(&premise_second.args[2]),
        ) else {
            return;
        };
        let candidates = compose(r1, r2);
        let ambiguous = candidates.len() > 1;
        for relation in candidates {
            let mut truth = premise_first.truth().deduction(&premise_second.truth());
            truth.confidence *= TEMPORAL_SCALE;
            if ambiguous {
                truth.confidence *= TEMPORAL_SCALE;
            }
            out.push(Conclusion::Edge {
                kind: TermKind::TemporalRelation,
                args: vec![a.to_string(), c.to_string(), relation.name().to_string()],
                truth,
                premises: vec![premise_first.id.clone(), premise_second.id.clone()],
            });
        }
    }
}

impl DerivationRule for TemporalComposition {
    fn name(&self) -> &'static str {
        "temporal-composition"
    }

    fn triggers(&self) -> Option<&'static [TermKind]> {
        Some(&[TermKind::TemporalRelation])
    }

    fn apply(&self, ctx: &RuleContext<'_>) -> Vec<Conclusion> {
        if !concrete(ctx.edge) || ctx.edge.args.len() != 3 {
            return Vec::new();
        }
        let (a, b) = (&ctx.edge.args[0], &ctx.edge.args[1]);
        let mut out = Vec::new();

        // Forward: (A,B,r1) ∘ (B,C,r2) → (A,C,·)
        for id in ctx.indexes.with_arg(b) {
            let Some(companion) = ctx.store.get(id) else {
                continue;
            };
            if companion.kind != TermKind::TemporalRelation
                || companion.id == ctx.edge.id
                || companion.args.len() != 3
                || !concrete(companion)
                || companion.args.first() != Some(b)
            {
                continue;
            }
            Self::conclude(a, &companion.args[1], ctx.edge, companion, &mut out);
        }

        // Backward: (Z,A,r0) ∘ (A,B,r1) → (Z,B,·)
        for id in ctx.indexes.with_arg(a) {
            let Some(companion) = ctx.store.get(id) else {
                continue;
            };
            if companion.kind != TermKind::TemporalRelation
                || companion.id == ctx.edge.id
                || companion.args.len() != 3
                || !concrete(companion)
                || companion.args.get(1) != Some(a)
            {
                continue;
            }
            Self::conclude(&companion.args[0], b, companion, ctx.edge, &mut out);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Belief;
    use crate::graph::index::IndexSet;
    use crate::graph::store::Hypergraph;
    use crate::propagate::Activations;
    use crate::queue::Event;
    use crate::truth::{Budget, Truth};

    struct Fixture {
        store: Hypergraph,
        indexes: IndexSet,
        activations: Activations,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Hypergraph::new(8),
                indexes: IndexSet::new(),
                activations: Activations::new(),
            }
        }

        fn add(&mut self, kind: TermKind, args: &[&str], truth: Truth) -> TermId {
            let (id, created) =
                self.store.upsert(kind, args.iter().map(|s| s.to_string()).collect());
            if created {
                let edge = self.store.get(&id).unwrap().clone();
                self.indexes.insert_edge(&edge);
            }
            self.store
                .revise(&id, Belief::new(truth, Budget::default()));
            id
        }

        fn fire(&self, rule: &dyn DerivationRule, target: &TermId) -> Vec<Conclusion> {
            let event = Event::seed(target.clone(), 1.0, Budget::new(0.9, 0.9, 0.9));
            let ctx = RuleContext {
                event: &event,
                edge: self.store.get(target).unwrap(),
                store: &self.store,
                indexes: &self.indexes,
                activations: &self.activations,
            };
            rule.apply(&ctx)
        }
    }

    fn edge_conclusions(conclusions: &[Conclusion]) -> Vec<(TermKind, Vec<String>)> {
        conclusions
            .iter()
            .filter_map(|c| match c {
                Conclusion::Edge { kind, args, .. } => Some((*kind, args.clone())),
                Conclusion::Activate { .. } => None,
            })
            .collect()
    }

    #[test]
    fn transitivity_chains_forward() {
        let mut fx = Fixture::new();
        let ab = fx.add(
            TermKind::Inheritance,
            &["a", "b"],
            Truth::new(1.0, 0.9),
        );
        fx.add(TermKind::Inheritance, &["b", "c"], Truth::new(1.0, 0.9));

        let out = fx.fire(&InheritanceTransitivity, &ab);
        let edges = edge_conclusions(&out);
        assert!(edges.contains(&(TermKind::Inheritance, vec!["a".into(), "c".into()])));

        match &out[0] {
            Conclusion::Edge { truth, .. } => {
                assert!((truth.frequency - 1.0).abs() < 0.001);
                assert!((truth.confidence - 0.81).abs() < 0.001);
            }
            other => panic!("expected edge conclusion, got {other:?}"),
        }
    }

    #[test]
    fn transitivity_chains_backward() {
        let mut fx = Fixture::new();
        fx.add(TermKind::Inheritance, &["a", "b"], Truth::new(1.0, 0.9));
        let bc = fx.add(TermKind::Inheritance, &["b", "c"], Truth::new(1.0, 0.9));

        let edges = edge_conclusions(&fx.fire(&InheritanceTransitivity, &bc));
        assert!(edges.contains(&(TermKind::Inheritance, vec!["a".into(), "c".into()])));
    }

    #[test]
    fn transitivity_ignores_cycles() {
        let mut fx = Fixture::new();
        let ab = fx.add(TermKind::Inheritance, &["a", "b"], Truth::new(1.0, 0.9));
        fx.add(TermKind::Inheritance, &["b", "a"], Truth::new(1.0, 0.9));

        let edges = edge_conclusions(&fx.fire(&InheritanceTransitivity, &ab));
        assert!(edges.iter().all(|(_, args)| args[0] != args[1]));
    }

    #[test]
    fn patterns_never_derive() {
        let mut fx = Fixture::new();
        let pattern = fx.add(
            TermKind::Inheritance,
            &["$x", "b"],
            Truth::new(1.0, 0.9),
        );
        fx.add(TermKind::Inheritance, &["b", "c"], Truth::new(1.0, 0.9));
        assert!(fx.fire(&InheritanceTransitivity, &pattern).is_empty());
    }

    #[test]
    fn analogy_from_similarity() {
        let mut fx = Fixture::new();
        let sim = fx.add(TermKind::Similarity, &["x", "y"], Truth::new(1.0, 0.9));
        fx.add(TermKind::Inheritance, &["x", "p"], Truth::new(1.0, 0.9));

        let out = fx.fire(&AnalogyBridge, &sim);
        let edges = edge_conclusions(&out);
        assert!(edges.contains(&(TermKind::Inheritance, vec!["y".into(), "p".into()])));
    }

    #[test]
    fn analogy_from_inheritance_side() {
        let mut fx = Fixture::new();
        fx.add(TermKind::Similarity, &["x", "y"], Truth::new(1.0, 0.9));
        let inh = fx.add(TermKind::Inheritance, &["y", "p"], Truth::new(1.0, 0.9));

        // y is on the right side of the similarity; the bridge still crosses.
        let edges = edge_conclusions(&fx.fire(&AnalogyBridge, &inh));
        assert!(edges.contains(&(TermKind::Inheritance, vec!["x".into(), "p".into()])));
    }

    #[test]
    fn equivalence_expands_to_both_implications() {
        let mut fx = Fixture::new();
        let eq = fx.add(TermKind::Equivalence, &["p", "q"], Truth::new(0.9, 0.8));

        let edges = edge_conclusions(&fx.fire(&EquivalenceExpansion, &eq));
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&(TermKind::Implication, vec!["p".into(), "q".into()])));
        assert!(edges.contains(&(TermKind::Implication, vec!["q".into(), "p".into()])));
    }

    #[test]
    fn conditional_activation_fires_above_gate() {
        let mut fx = Fixture::new();
        fx.add(TermKind::Atom, &["rain"], Truth::new(1.0, 0.9));
        fx.add(TermKind::Atom, &["wet"], Truth::new(1.0, 0.9));
        let implication = fx.add(
            TermKind::Implication,
            &["rain", "wet"],
            Truth::new(1.0, 0.9),
        );
        fx.activations
            .nudge(&TermId::raw("Term(rain)"), 1.0);
        fx.activations.nudge(&TermId::raw("Term(rain)"), 1.0);

        let out = fx.fire(&ConditionalActivation, &implication);
        assert!(matches!(
            out.as_slice(),
            [Conclusion::Activate { target, .. }] if target.as_str() == "Term(wet)"
        ));
    }

    #[test]
    fn conditional_activation_from_antecedent_event() {
        let mut fx = Fixture::new();
        let rain = fx.add(TermKind::Atom, &["rain"], Truth::new(1.0, 0.9));
        fx.add(
            TermKind::Implication,
            &["rain", "wet"],
            Truth::new(1.0, 0.9),
        );

        let out = fx.fire(&ConditionalActivation, &rain);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn conditional_activation_quiet_below_gate() {
        let mut fx = Fixture::new();
        fx.add(TermKind::Atom, &["rain"], Truth::new(1.0, 0.9));
        let implication = fx.add(
            TermKind::Implication,
            &["rain", "wet"],
            Truth::new(1.0, 0.9),
        );
        // No stored activation on the antecedent.
        assert!(fx.fire(&ConditionalActivation, &implication).is_empty());
    }

    #[test]
    fn temporal_composition_before_meets() {
        let mut fx = Fixture::new();
        let ab = fx.add(
            TermKind::TemporalRelation,
            &["a", "b", "before"],
            Truth::new(1.0, 0.9),
        );
        fx.add(
            TermKind::TemporalRelation,
            &["b", "c", "meets"],
            Truth::new(1.0, 0.9),
        );

        let edges = edge_conclusions(&fx.fire(&TemporalComposition, &ab));
        assert_eq!(
            edges,
            vec![(
                TermKind::TemporalRelation,
                vec!["a".into(), "c".into(), "before".into()]
            )]
        );
    }

    #[test]
    fn ambiguous_composition_asserts_every_candidate_weaker() {
        let mut fx = Fixture::new();
        let ab = fx.add(
            TermKind::TemporalRelation,
            &["a", "b", "during"],
            Truth::new(1.0, 0.9),
        );
        fx.add(
            TermKind::TemporalRelation,
            &["b", "c", "overlaps"],
            Truth::new(1.0, 0.9),
        );

        let out = fx.fire(&TemporalComposition, &ab);
        // during ∘ overlaps = {before, meets, overlaps, starts, during}
        assert_eq!(out.len(), 5);
        for c in &out {
            match c {
                Conclusion::Edge { truth, .. } => {
                    assert!(truth.confidence < 0.81 * 0.7 + 0.001);
                }
                other => panic!("expected edge conclusion, got {other:?}"),
            }
        }
    }
}
