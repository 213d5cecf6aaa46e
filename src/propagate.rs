//! Activation tracking and the propagation wave.
//!
//! Each edge carries a scalar activation, nudged upward when events arrive
//! and decayed on maintenance. When the step loop processes an event it also
//! spawns a wave of sub-events toward the target's neighbors (edges sharing
//! an argument), with scaled budgets and a per-target path-hash cache as the
//! cycle guard.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::graph::Hyperedge;
use crate::graph::index::IndexSet;
use crate::queue::Event;
use crate::term::TermId;

/// Blend rate used when moving an edge's activation toward an event's.
const ACTIVATION_BLEND: f32 = 0.5;

// ---------------------------------------------------------------------------
// Activation table
// ---------------------------------------------------------------------------

/// `id → activation` with monotone event updates and maintenance decay.
#[derive(Debug, Default)]
pub struct Activations {
    levels: HashMap<TermId, f32>,
}

impl Activations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current activation of an edge (0 when never activated).
    pub fn get(&self, id: &TermId) -> f32 {
        self.levels.get(id).copied().unwrap_or(0.0)
    }

    /// Move an edge's activation toward `target`, never downward.
    pub fn nudge(&mut self, id: &TermId, target: f32) -> f32 {
        let entry = self.levels.entry(id.clone()).or_insert(0.0);
        let blended = *entry + (target.clamp(0.0, 1.0) - *entry) * ACTIVATION_BLEND;
        *entry = entry.max(blended).clamp(0.0, 1.0);
        *entry
    }

    /// Decay every activation, dropping the negligible ones.
    pub fn decay_all(&mut self, factor: f32) {
        self.levels.retain(|_, v| {
            *v *= 1.0 - factor.clamp(0.0, 1.0);
            *v > 0.001
        });
    }

    /// Remove an edge's activation entirely.
    pub fn remove(&mut self, id: &TermId) {
        self.levels.remove(id);
    }

    /// Iterate over all (id, activation) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&TermId, f32)> {
        self.levels.iter().map(|(k, v)| (k, *v))
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

// ---------------------------------------------------------------------------
// Cycle guard
// ---------------------------------------------------------------------------

/// Per-target record of propagation path hashes already delivered.
#[derive(Debug, Default)]
pub struct PathGuard {
    seen: HashMap<TermId, HashSet<u64>>,
}

impl PathGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a (target, path) pair; returns false when it was seen before.
    pub fn admit(&mut self, target: &TermId, path_hash: u64) -> bool {
        self.seen.entry(target.clone()).or_default().insert(path_hash)
    }

    /// Bound the cache: keep at most `max_targets` entries, preferring the
    /// ones with the fewest recorded paths (cheap to rebuild).
    pub fn shrink(&mut self, max_targets: usize) {
        if self.seen.len() <= max_targets {
            return;
        }
        let mut sizes: Vec<(TermId, usize)> = self
            .seen
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        sizes.sort_by(|a, b| a.1.cmp(&b.1));
        for (id, _) in sizes.into_iter().skip(max_targets) {
            self.seen.remove(&id);
        }
    }

    /// Forget one target's history (edge removed).
    pub fn remove(&mut self, target: &TermId) {
        self.seen.remove(target);
    }

    /// Number of tracked targets.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Fold a hop into a path hash.
pub fn extend_path_hash(hash: u64, hop: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hop.hash(&mut hasher);
    hash ^ hasher.finish()
}

// ---------------------------------------------------------------------------
// Wave construction
// ---------------------------------------------------------------------------

/// Parameters for a propagation wave, taken from the kernel configuration.
#[derive(Debug, Clone, Copy)]
pub struct WaveLimits {
    /// Per-hop budget attenuation (`scale(1 − decay)`).
    pub decay: f32,
    /// Events below this budget total are not propagated.
    pub budget_threshold: f32,
    /// Maximum number of hops.
    pub max_path_length: u32,
}

/// Build the sub-events for an event just processed on `edge`.
///
/// Neighbors are every edge sharing an argument token with the target.
/// Sub-events inherit the parent's path, scaled budget, and attenuated
/// activation; hops beyond the limits or already seen by the guard are
/// dropped.
pub fn wave(
    event: &Event,
    edge: &Hyperedge,
    indexes: &IndexSet,
    guard: &mut PathGuard,
    limits: WaveLimits,
) -> Vec<Event> {
    if event.path_length >= limits.max_path_length {
        return Vec::new();
    }
    let budget = event.budget.scale(1.0 - limits.decay);
    if budget.total() < limits.budget_threshold {
        return Vec::new();
    }
    let activation = (event.activation * (1.0 - limits.decay)).clamp(0.0, 1.0);

    let mut out = Vec::new();
    let mut visited: HashSet<&TermId> = HashSet::new();
    for token in &edge.args {
        for neighbor in indexes.with_arg(token) {
            if neighbor == &edge.id || !visited.insert(neighbor) {
                continue;
            }
            let path_hash = extend_path_hash(event.path_hash, neighbor.as_str());
            if !guard.admit(neighbor, path_hash) {
                continue;
            }
            out.push(Event {
                target: neighbor.clone(),
                activation,
                budget,
                path_hash,
                path_length: event.path_length + 1,
                derivation_path: event.derivation_path.clone(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermKind;
    use crate::truth::Budget;

    #[test]
    fn nudge_is_monotone_and_bounded() {
        let mut acts = Activations::new();
        let id = TermId::raw("Term(a)");
        let first = acts.nudge(&id, 1.0);
        assert!(first > 0.0 && first <= 1.0);
        let second = acts.nudge(&id, 1.0);
        assert!(second >= first);
        // Nudging toward a lower target never decreases activation.
        let third = acts.nudge(&id, 0.0);
        assert!(third >= second);
    }

    #[test]
    fn decay_forgets_negligible_levels() {
        let mut acts = Activations::new();
        let id = TermId::raw("Term(a)");
        acts.nudge(&id, 0.1);
        for _ in 0..20 {
            acts.decay_all(0.5);
        }
        assert!((acts.get(&id) - 0.0).abs() < f32::EPSILON);
        assert_eq!(acts.iter().count(), 0);
    }

    #[test]
    fn guard_rejects_repeat_paths() {
        let mut guard = PathGuard::new();
        let id = TermId::raw("Term(a)");
        assert!(guard.admit(&id, 42));
        assert!(!guard.admit(&id, 42));
        assert!(guard.admit(&id, 43));
    }

    #[test]
    fn guard_shrinks_to_bound() {
        let mut guard = PathGuard::new();
        for i in 0..20 {
            guard.admit(&TermId::raw(format!("Term(t{i})")), i);
        }
        guard.shrink(5);
        assert!(guard.len() <= 5);
    }

    #[test]
    fn wave_reaches_arg_sharing_neighbors() {
        let mut indexes = IndexSet::new();
        let ab = Hyperedge::new(TermKind::Inheritance, vec!["a".into(), "b".into()]);
        let bc = Hyperedge::new(TermKind::Inheritance, vec!["b".into(), "c".into()]);
        let cd = Hyperedge::new(TermKind::Inheritance, vec!["c".into(), "d".into()]);
        indexes.insert_edge(&ab);
        indexes.insert_edge(&bc);
        indexes.insert_edge(&cd);

        let mut guard = PathGuard::new();
        let event = Event::seed(ab.id.clone(), 1.0, Budget::new(0.9, 0.9, 0.9));
        let limits = WaveLimits {
            decay: 0.1,
            budget_threshold: 0.05,
            max_path_length: 15,
        };
        let sub = wave(&event, &ab, &indexes, &mut guard, limits);

        // Only bc shares an argument with ab.
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].target, bc.id);
        assert_eq!(sub[0].path_length, 1);
        assert!(sub[0].budget.total() < event.budget.total());
    }

    #[test]
    fn wave_respects_path_length_limit() {
        let mut indexes = IndexSet::new();
        let ab = Hyperedge::new(TermKind::Inheritance, vec!["a".into(), "b".into()]);
        let bc = Hyperedge::new(TermKind::Inheritance, vec!["b".into(), "c".into()]);
        indexes.insert_edge(&ab);
        indexes.insert_edge(&bc);

        let mut guard = PathGuard::new();
        let mut event = Event::seed(ab.id.clone(), 1.0, Budget::new(0.9, 0.9, 0.9));
        event.path_length = 3;
        let limits = WaveLimits {
            decay: 0.1,
            budget_threshold: 0.05,
            max_path_length: 3,
        };
        assert!(wave(&event, &ab, &indexes, &mut guard, limits).is_empty());
    }

    #[test]
    fn wave_drops_cold_budgets() {
        let mut indexes = IndexSet::new();
        let ab = Hyperedge::new(TermKind::Inheritance, vec!["a".into(), "b".into()]);
        let bc = Hyperedge::new(TermKind::Inheritance, vec!["b".into(), "c".into()]);
        indexes.insert_edge(&ab);
        indexes.insert_edge(&bc);

        let mut guard = PathGuard::new();
        let event = Event::seed(ab.id.clone(), 1.0, Budget::new(0.05, 0.05, 0.05));
        let limits = WaveLimits {
            decay: 0.1,
            budget_threshold: 0.05,
            max_path_length: 15,
        };
        assert!(wave(&event, &ab, &indexes, &mut guard, limits).is_empty());
    }
}
