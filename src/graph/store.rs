//! The hypergraph store: content-addressed edges with belief tables.
//!
//! The store owns every [`Hyperedge`] and nothing else; indexes, activations,
//! and scheduling live in their own layers so the kernel can borrow them
//! independently during a step.

use std::collections::HashMap;

use crate::graph::{Belief, Hyperedge, RevisionOutcome};
use crate::term::{TermId, TermKind};

/// Mapping `id → Hyperedge`, plus the current belief capacity.
#[derive(Debug, Default)]
pub struct Hypergraph {
    edges: HashMap<TermId, Hyperedge>,
    belief_capacity: usize,
}

impl Hypergraph {
    /// Create an empty hypergraph with the given belief capacity.
    pub fn new(belief_capacity: usize) -> Self {
        Self {
            edges: HashMap::new(),
            belief_capacity: belief_capacity.max(1),
        }
    }

    /// Current per-edge belief capacity.
    pub fn belief_capacity(&self) -> usize {
        self.belief_capacity
    }

    /// Adjust the per-edge belief capacity (dynamic allocation).
    ///
    /// Existing over-long belief lists shrink lazily on their next revision.
    pub fn set_belief_capacity(&mut self, capacity: usize) {
        self.belief_capacity = capacity.max(1);
    }

    /// Look up the edge for a structure, creating it when absent.
    ///
    /// Returns the id and whether the edge was newly created.
    pub fn upsert(&mut self, kind: TermKind, args: Vec<String>) -> (TermId, bool) {
        let id = TermId::compose(kind, &args);
        if self.edges.contains_key(&id) {
            return (id, false);
        }
        self.edges.insert(id.clone(), Hyperedge::new(kind, args));
        (id, true)
    }

    /// Insert a pre-built edge under its own id (context splits, restore).
    ///
    /// Returns whether the edge was newly inserted.
    pub fn insert_raw(&mut self, edge: Hyperedge) -> bool {
        if self.edges.contains_key(&edge.id) {
            return false;
        }
        self.edges.insert(edge.id.clone(), edge);
        true
    }

    /// Revise an edge with a new belief.
    ///
    /// Returns `None` when the edge does not exist (no effect).
    pub fn revise(&mut self, id: &TermId, belief: Belief) -> Option<RevisionOutcome> {
        let capacity = self.belief_capacity;
        self.edges.get_mut(id).map(|e| e.revise(belief, capacity))
    }

    /// Remove an edge entirely.
    pub fn remove(&mut self, id: &TermId) -> Option<Hyperedge> {
        self.edges.remove(id)
    }

    /// Borrow an edge.
    pub fn get(&self, id: &TermId) -> Option<&Hyperedge> {
        self.edges.get(id)
    }

    /// Mutably borrow an edge.
    pub fn get_mut(&mut self, id: &TermId) -> Option<&mut Hyperedge> {
        self.edges.get_mut(id)
    }

    /// Whether an edge exists.
    pub fn contains(&self, id: &TermId) -> bool {
        self.edges.contains_key(id)
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate over all edges.
    pub fn iter(&self) -> impl Iterator<Item = &Hyperedge> {
        self.edges.values()
    }

    /// Iterate over all edge ids.
    pub fn ids(&self) -> impl Iterator<Item = &TermId> {
        self.edges.keys()
    }

    /// Drop every edge.
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
