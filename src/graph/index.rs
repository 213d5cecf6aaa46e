//! Secondary indexes over the hypergraph.
//!
//! Four lookups back the propagator, the derivation rules, and the query
//! layer:
//!
//! - **by kind** — `TermKind → set<id>`
//! - **by argument** — token → set<id>, backed by a trie so wildcard queries
//!   can scan a concrete prefix
//! - **structural** — symmetric-relation lookup (finds `Similarity(b,a)`
//!   when `Similarity(a,b)` is stored)
//! - **temporal** — interval spans for `TimeInterval` edges
//!
//! plus a popularity counter per edge, decayed on maintenance.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::Hyperedge;
use crate::term::{TermId, TermKind};

// ---------------------------------------------------------------------------
// Argument trie
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    ids: HashSet<TermId>,
}

/// Byte-trie mapping argument tokens to the edges that mention them.
#[derive(Debug, Default)]
pub struct ArgTrie {
    root: TrieNode,
}

impl ArgTrie {
    fn node_mut(&mut self, token: &str) -> &mut TrieNode {
        let mut node = &mut self.root;
        for byte in token.bytes() {
            node = node.children.entry(byte).or_default();
        }
        node
    }

    fn node(&self, token: &str) -> Option<&TrieNode> {
        let mut node = &self.root;
        for byte in token.bytes() {
            node = node.children.get(&byte)?;
        }
        Some(node)
    }

    /// Associate an edge id with a token.
    pub fn insert(&mut self, token: &str, id: TermId) {
        self.node_mut(token).ids.insert(id);
    }

    /// Remove an edge id from a token. Empty branches are left in place;
    /// they are rare and harmless.
    pub fn remove(&mut self, token: &str, id: &TermId) {
        if let Some(node) = self.node_mut_existing(token) {
            node.ids.remove(id);
        }
    }

    fn node_mut_existing(&mut self, token: &str) -> Option<&mut TrieNode> {
        let mut node = &mut self.root;
        for byte in token.bytes() {
            node = node.children.get_mut(&byte)?;
        }
        Some(node)
    }

    /// Edges mentioning exactly this token.
    pub fn exact(&self, token: &str) -> impl Iterator<Item = &TermId> {
        self.node(token).into_iter().flat_map(|n| n.ids.iter())
    }

    /// Edges mentioning any token starting with `prefix`.
    pub fn prefix(&self, prefix: &str) -> Vec<TermId> {
        let Some(start) = self.node(prefix) else {
            return Vec::new();
        };
        let mut out = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            out.extend(node.ids.iter().cloned());
            stack.extend(node.children.values());
        }
        out.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Interval spans
// ---------------------------------------------------------------------------

/// The span recorded for a `TimeInterval` edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSpan {
    pub start: f64,
    pub end: f64,
}

// ---------------------------------------------------------------------------
// Index set
// ---------------------------------------------------------------------------

/// All secondary indexes, maintained together on every insert/remove.
#[derive(Debug, Default)]
pub struct IndexSet {
    by_kind: HashMap<TermKind, HashSet<TermId>>,
    by_arg: ArgTrie,
    structural: HashMap<String, TermId>,
    intervals: HashMap<TermId, IntervalSpan>,
    popularity: HashMap<TermId, f32>,
}

/// Symmetric relations index under a sorted-argument key so either argument
/// order finds the stored edge.
fn structural_key(kind: TermKind, args: &[String]) -> Option<String> {
    if !kind.is_symmetric() {
        return None;
    }
    let mut sorted: Vec<&str> = args.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    Some(format!("{}[{}]", kind.canonical_name(), sorted.join("|")))
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an edge in every index.
    pub fn insert_edge(&mut self, edge: &Hyperedge) {
        self.by_kind
            .entry(edge.kind)
            .or_default()
            .insert(edge.id.clone());
        for arg in &edge.args {
            self.by_arg.insert(arg, edge.id.clone());
        }
        if let Some(key) = structural_key(edge.kind, &edge.args) {
            self.structural.entry(key).or_insert_with(|| edge.id.clone());
        }
        if edge.kind == TermKind::TimeInterval {
            if let (Some(start), Some(end)) = (
                edge.args.get(1).and_then(|s| s.parse::<f64>().ok()),
                edge.args.get(2).and_then(|s| s.parse::<f64>().ok()),
            ) {
                self.intervals.insert(edge.id.clone(), IntervalSpan { start, end });
            }
        }
    }

    /// Remove an edge from every index.
    pub fn remove_edge(&mut self, edge: &Hyperedge) {
        if let Some(set) = self.by_kind.get_mut(&edge.kind) {
            set.remove(&edge.id);
        }
        for arg in &edge.args {
            self.by_arg.remove(arg, &edge.id);
        }
        if let Some(key) = structural_key(edge.kind, &edge.args) {
            if self.structural.get(&key) == Some(&edge.id) {
                self.structural.remove(&key);
            }
        }
        self.intervals.remove(&edge.id);
        self.popularity.remove(&edge.id);
    }

    /// All edges of a kind.
    pub fn of_kind(&self, kind: TermKind) -> impl Iterator<Item = &TermId> {
        self.by_kind.get(&kind).into_iter().flatten()
    }

    /// Whether an id is indexed under its kind.
    pub fn has_kind_entry(&self, kind: TermKind, id: &TermId) -> bool {
        self.by_kind.get(&kind).is_some_and(|s| s.contains(id))
    }

    /// Edges mentioning a token as an argument.
    pub fn with_arg(&self, token: &str) -> impl Iterator<Item = &TermId> {
        self.by_arg.exact(token)
    }

    /// Edges mentioning any token with the given prefix.
    pub fn with_arg_prefix(&self, prefix: &str) -> Vec<TermId> {
        self.by_arg.prefix(prefix)
    }

    /// Find a symmetric edge regardless of argument order.
    pub fn symmetric_lookup(&self, kind: TermKind, args: &[String]) -> Option<&TermId> {
        structural_key(kind, args).and_then(|key| self.structural.get(&key))
    }

    /// The interval span recorded for a `TimeInterval` edge.
    pub fn interval(&self, id: &TermId) -> Option<IntervalSpan> {
        self.intervals.get(id).copied()
    }

    /// The interval span recorded for a term, by its atom token.
    pub fn interval_of_term(&self, term: &str) -> Option<(TermId, IntervalSpan)> {
        for id in self.by_arg.exact(term) {
            if let Some(span) = self.intervals.get(id) {
                return Some((id.clone(), *span));
            }
        }
        None
    }

    /// All recorded interval edges.
    pub fn intervals(&self) -> impl Iterator<Item = (&TermId, &IntervalSpan)> {
        self.intervals.iter()
    }

    /// Bump an edge's popularity counter.
    pub fn bump_popularity(&mut self, id: &TermId) {
        *self.popularity.entry(id.clone()).or_insert(0.0) += 1.0;
    }

    /// Current popularity of an edge.
    pub fn popularity(&self, id: &TermId) -> f32 {
        self.popularity.get(id).copied().unwrap_or(0.0)
    }

    /// Decay all popularity counters, dropping the negligible ones.
    pub fn decay_popularity(&mut self, factor: f32) {
        self.popularity.retain(|_, v| {
            *v *= factor;
            *v > 0.01
        });
    }

    /// Drop everything (snapshot restore).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(kind: TermKind, args: &[&str]) -> Hyperedge {
        Hyperedge::new(kind, args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn kind_and_arg_lookup() {
        let mut idx = IndexSet::new();
        let e = edge(TermKind::Inheritance, &["bird", "animal"]);
        idx.insert_edge(&e);

        assert!(idx.has_kind_entry(TermKind::Inheritance, &e.id));
        let hits: Vec<_> = idx.with_arg("bird").collect();
        assert_eq!(hits, vec![&e.id]);
        assert_eq!(idx.with_arg("fish").count(), 0);
    }

    #[test]
    fn prefix_lookup() {
        let mut idx = IndexSet::new();
        let a = edge(TermKind::Atom, &["birch"]);
        let b = edge(TermKind::Atom, &["bird"]);
        let c = edge(TermKind::Atom, &["cat"]);
        idx.insert_edge(&a);
        idx.insert_edge(&b);
        idx.insert_edge(&c);

        let hits = idx.with_arg_prefix("bir");
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&a.id));
        assert!(hits.contains(&b.id));
    }

    #[test]
    fn symmetric_lookup_ignores_order() {
        let mut idx = IndexSet::new();
        let e = edge(TermKind::Similarity, &["swan", "goose"]);
        idx.insert_edge(&e);

        let hit = idx
            .symmetric_lookup(TermKind::Similarity, &["goose".into(), "swan".into()])
            .unwrap();
        assert_eq!(hit, &e.id);
        assert!(
            idx.symmetric_lookup(TermKind::Inheritance, &["a".into(), "b".into()])
                .is_none()
        );
    }

    #[test]
    fn interval_extraction() {
        let mut idx = IndexSet::new();
        let e = edge(TermKind::TimeInterval, &["breakfast", "10", "20"]);
        idx.insert_edge(&e);

        let span = idx.interval(&e.id).unwrap();
        assert!((span.start - 10.0).abs() < f64::EPSILON);
        assert!((span.end - 20.0).abs() < f64::EPSILON);

        let (id, span) = idx.interval_of_term("breakfast").unwrap();
        assert_eq!(id, e.id);
        assert!((span.end - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn remove_clears_all_indexes() {
        let mut idx = IndexSet::new();
        let e = edge(TermKind::Similarity, &["a", "b"]);
        idx.insert_edge(&e);
        idx.bump_popularity(&e.id);
        idx.remove_edge(&e);

        assert!(!idx.has_kind_entry(TermKind::Similarity, &e.id));
        assert_eq!(idx.with_arg("a").count(), 0);
        assert!(idx.symmetric_lookup(TermKind::Similarity, &e.args).is_none());
        assert!((idx.popularity(&e.id) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn popularity_decays_to_nothing() {
        let mut idx = IndexSet::new();
        let e = edge(TermKind::Atom, &["a"]);
        idx.insert_edge(&e);
        idx.bump_popularity(&e.id);
        assert!((idx.popularity(&e.id) - 1.0).abs() < f32::EPSILON);

        for _ in 0..10 {
            idx.decay_popularity(0.5);
        }
        assert!((idx.popularity(&e.id) - 0.0).abs() < f32::EPSILON);
    }
}
