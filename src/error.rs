//! Rich diagnostic error types for the doxa kernel.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so callers know exactly what
//! went wrong and how to fix it. Internal invariants (belief lists sorted,
//! indexes consistent) are enforced by construction and are not represented
//! here; everything below is reachable from the public API.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the doxa kernel.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum DoxaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Term(#[from] TermError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kernel(#[from] KernelError),
}

// ---------------------------------------------------------------------------
// Term errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TermError {
    #[error("unknown term kind: \"{name}\"")]
    #[diagnostic(
        code(doxa::term::unknown_kind),
        help(
            "Valid kinds are: Term, Variable, Inheritance, Similarity, Instance, \
             Property, Implication, Equivalence, Conjunction, Disjunction, \
             Product, Negation, TimeInterval, TemporalRelation, Question."
        )
    )]
    UnknownKind { name: String },

    #[error("malformed term id: \"{id}\"")]
    #[diagnostic(
        code(doxa::term::malformed),
        help(
            "A term id has the shape Kind(arg1,arg2,...) with balanced \
             parentheses. Ids produced by TermId::compose are always well \
             formed; hand-built ids must follow the same shape."
        )
    )]
    Malformed { id: String },
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("unexpected token at byte {position}: found \"{found}\", expected {expected}")]
    #[diagnostic(
        code(doxa::parse::unexpected_token),
        help(
            "Statements look like `bird --> animal %0.9;0.8%` or \
             `(a --> b) ==> (c --> d)`. Operators by precedence: \
             `==>` `<=>`, then `&&` `||`, then `-->` `<->`."
        )
    )]
    UnexpectedToken {
        position: usize,
        found: String,
        expected: String,
    },

    #[error("unexpected end of input (started at byte {position})")]
    #[diagnostic(
        code(doxa::parse::unexpected_end),
        help("The statement is truncated. Close any open parentheses and finish the expression.")
    )]
    UnexpectedEnd { position: usize },

    #[error("invalid annotation at byte {position}: \"{text}\"")]
    #[diagnostic(
        code(doxa::parse::invalid_annotation),
        help(
            "Truth annotations are `%frequency;confidence%` with both values \
             in [0, 1], e.g. `%0.9;0.8%`. Priority annotations are `#p#`, \
             e.g. `#0.7#`."
        )
    )]
    InvalidAnnotation { position: usize, text: String },

    #[error("empty statement")]
    #[diagnostic(
        code(doxa::parse::empty),
        help("Provide at least one term, e.g. `bird` or `bird --> animal`.")
    )]
    Empty,
}

// ---------------------------------------------------------------------------
// Question errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QuestionError {
    #[error("question timed out after {elapsed_ms} ms")]
    #[diagnostic(
        code(doxa::question::timeout),
        help(
            "No belief matched the pattern before the deadline. Raise the \
             timeout or urgency in AskOptions, add more knowledge, or run \
             more steps before asking."
        )
    )]
    Timeout { elapsed_ms: u64 },

    #[error("question was cancelled")]
    #[diagnostic(
        code(doxa::question::cancelled),
        help("The question entry was removed with `cancel` before an answer arrived.")
    )]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Temporal errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TemporalError {
    #[error("no interval recorded for term \"{term}\"")]
    #[diagnostic(
        code(doxa::temporal::unknown_interval),
        help("Register an interval first with `kernel.interval(term, start, end)`.")
    )]
    UnknownInterval { term: String },

    #[error("unknown temporal relation: \"{name}\"")]
    #[diagnostic(
        code(doxa::temporal::unknown_relation),
        help(
            "Valid relations are the 13 Allen relations: before, after, meets, \
             metBy, overlaps, overlappedBy, starts, startedBy, during, \
             contains, finishes, finishedBy, equals."
        )
    )]
    UnknownRelation { name: String },

    #[error("degenerate interval for \"{term}\": start {start} >= end {end}")]
    #[diagnostic(
        code(doxa::temporal::degenerate_interval),
        help("Intervals must have start < end. Swap the endpoints or widen the interval.")
    )]
    DegenerateInterval { term: String, start: f64, end: f64 },
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {found} (this build reads version {expected})")]
    #[diagnostic(
        code(doxa::snapshot::version),
        help(
            "The snapshot was written by an incompatible build. Re-export it \
             from the original version, or migrate it by hand."
        )
    )]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("corrupt snapshot: {message}")]
    #[diagnostic(
        code(doxa::snapshot::corrupt),
        help(
            "The snapshot document failed to deserialize. Check that the file \
             is complete and was not truncated or edited."
        )
    )]
    Corrupt { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(doxa::snapshot::io),
        help("A filesystem operation failed. Check the path and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Kernel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KernelError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(doxa::kernel::invalid_config),
        help("Check the KernelConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("no hyperedge with id \"{id}\"")]
    #[diagnostic(
        code(doxa::kernel::unknown_edge),
        help(
            "The edge does not exist (it may have been forgotten by the \
             memory manager). Re-assert it or query with a pattern instead."
        )
    )]
    UnknownEdge { id: String },
}

/// Convenience alias for functions returning doxa results.
pub type DoxaResult<T> = std::result::Result<T, DoxaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_converts_to_doxa_error() {
        let err = ParseError::Empty;
        let doxa: DoxaError = err.into();
        assert!(matches!(doxa, DoxaError::Parse(ParseError::Empty)));
    }

    #[test]
    fn snapshot_version_message_is_descriptive() {
        let err = SnapshotError::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        let msg = format!("{err}");
        assert!(msg.contains('9'));
        assert!(msg.contains('1'));
    }

    #[test]
    fn kernel_error_converts() {
        let err = KernelError::UnknownEdge {
            id: "Term(a)".into(),
        };
        let doxa: DoxaError = err.into();
        assert!(matches!(
            doxa,
            DoxaError::Kernel(KernelError::UnknownEdge { .. })
        ));
    }
}
