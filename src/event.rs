//! Observable kernel events.
//!
//! Collaborators (UIs, persistence layers, test harnesses) observe the
//! kernel through these synchronously delivered notifications rather than by
//! reaching into its state. Listeners are plain closures registered with
//! `Kernel::on_event`; they run inside the emitting step.

use crate::meta::{Focus, Metrics};
use crate::term::TermId;
use crate::truth::Truth;

/// Why an edge or belief left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    /// Forgotten by the memory manager.
    Forgotten,
    /// A weak belief was popped to respect retention.
    BeliefEvicted,
    /// Removed explicitly through the public API.
    Removed,
    /// Dropped by the temporal-horizon maintenance pass.
    TemporalHorizon,
}

/// A typed notification emitted by the kernel.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    /// A belief landed on an edge (new or merged).
    BeliefAdded {
        id: TermId,
        truth: Truth,
        merged: bool,
    },
    /// An edge's belief table changed through revision.
    Revision {
        id: TermId,
        truth: Truth,
        expectation: f32,
    },
    /// A conflicting belief pair was found.
    ContradictionDetected {
        signature: String,
        edge: TermId,
        severity: f32,
    },
    /// A contradiction was handled.
    ContradictionResolved {
        signature: String,
        edge: TermId,
        strategy: &'static str,
    },
    /// The meta-reasoner shifted focus.
    FocusChanged { from: Focus, to: Focus },
    /// An edge or belief was dropped.
    KnowledgePruned { id: TermId, reason: PruneReason },
    /// An argument token seen across several compounds was materialized.
    ConceptFormed { id: TermId, token: String },
    /// A recurring long derivation chain was collapsed into a direct belief.
    ShortcutCreated { id: TermId, path_length: u32 },
    /// A rule was re-enabled by the success-rate dynamics.
    RuleEnabled { rule: &'static str },
    /// A rule was disabled by the success-rate dynamics.
    RuleDisabled { rule: &'static str },
    /// The event queue was pruned of low-value entries.
    Pruning { removed: usize },
    /// Summary of one maintenance pass.
    MaintenanceInfo {
        step: u64,
        edges: usize,
        queue: usize,
        focus: Focus,
        metrics: Metrics,
    },
    /// One reasoning step completed.
    Step { step: u64 },
    /// Free-form diagnostics.
    Log { message: String },
}

/// A registered observer.
pub type Listener = Box<dyn Fn(&KernelEvent) + Send + Sync>;
