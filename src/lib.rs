//! # doxa
//!
//! A non-axiomatic reasoning kernel: an open-world inference engine that
//! accumulates uncertain beliefs over a typed hypergraph, derives new ones
//! under bounded resources, answers pattern questions, detects and resolves
//! contradictions, and adapts its own operating parameters from observed
//! productivity.
//!
//! ## Architecture
//!
//! - **Primitives** (`truth`): truth-value and budget arithmetic
//! - **Hypergraph** (`term`, `graph`): content-addressed edges with bounded
//!   belief tables, secondary indexes, and contradiction management
//! - **Scheduler** (`queue`, `propagate`): budget-ordered event queue and
//!   spreading activation with cycle guards
//! - **Derivation** (`derive`, `allen`): trigger-registered rules, including
//!   temporal composition over Allen's interval algebra
//! - **Self-regulation** (`memory`, `meta`): importance-driven forgetting,
//!   budget allocation, and metric-driven parameter adaptation
//! - **Surface** (`parse`, `question`, `kernel`): the belief language,
//!   pattern questions with unification, and the kernel facade
//!
//! ## Library usage
//!
//! ```
//! use doxa::kernel::Kernel;
//! use doxa::term::TermId;
//!
//! let mut kernel = Kernel::with_defaults();
//! kernel.nal("bird --> animal %1.0;0.9%").unwrap();
//! kernel.nal("animal --> living %1.0;0.9%").unwrap();
//! kernel.run(20);
//!
//! let derived = kernel.get_truth(&TermId::raw("Inheritance(bird,living)"));
//! assert!(derived.confidence > 0.5);
//! ```

pub mod allen;
pub mod config;
pub mod derive;
pub mod error;
pub mod event;
pub mod explain;
pub mod graph;
pub mod kernel;
pub mod memory;
pub mod meta;
pub mod parse;
pub mod propagate;
pub mod question;
pub mod queue;
pub mod snapshot;
pub mod telemetry;
pub mod term;
pub mod truth;

pub use config::KernelConfig;
pub use error::{DoxaError, DoxaResult};
pub use kernel::Kernel;
pub use term::{TermId, TermKind};
pub use truth::{Budget, Truth};
