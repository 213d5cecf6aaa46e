//! Term identity: kinds, content addressing, and structural decomposition.
//!
//! Every node and relation in the hypergraph is identified by a [`TermId`],
//! a content-addressed string of the form `Kind(arg1,arg2,...)`. Identity is
//! purely structural: composing the same kind with the same arguments always
//! yields the same id, so edges never need pointer identity and premise
//! lists can store ids directly.

use serde::{Deserialize, Serialize};

use crate::error::TermError;

/// Classification of a term in the hypergraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TermKind {
    /// An atomic term (a plain concept).
    Atom,
    /// A variable (`$name` or `?name`).
    Variable,
    /// `Inheritance(subject, predicate)` — "subject is a kind of predicate".
    Inheritance,
    /// `Similarity(a, b)` — symmetric resemblance.
    Similarity,
    /// `Instance(member, class)`.
    Instance,
    /// `Property(bearer, property)`.
    Property,
    /// `Implication(antecedent, consequent)`.
    Implication,
    /// `Equivalence(a, b)` — bidirectional implication.
    Equivalence,
    /// `Conjunction(a, b, ...)`.
    Conjunction,
    /// `Disjunction(a, b, ...)`.
    Disjunction,
    /// `Product(a, b, ...)` — an ordered tuple.
    Product,
    /// `Negation(inner)`.
    Negation,
    /// `TimeInterval(term, start, end)`.
    TimeInterval,
    /// `TemporalRelation(a, b, relation)` — an Allen relation between intervals.
    TemporalRelation,
    /// `Question(pattern)` — an asserted query pattern.
    Question,
}

impl TermKind {
    /// The name used inside content-addressed ids.
    ///
    /// Atomic terms address as `Term(...)`, matching the belief language.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            TermKind::Atom => "Term",
            TermKind::Variable => "Variable",
            TermKind::Inheritance => "Inheritance",
            TermKind::Similarity => "Similarity",
            TermKind::Instance => "Instance",
            TermKind::Property => "Property",
            TermKind::Implication => "Implication",
            TermKind::Equivalence => "Equivalence",
            TermKind::Conjunction => "Conjunction",
            TermKind::Disjunction => "Disjunction",
            TermKind::Product => "Product",
            TermKind::Negation => "Negation",
            TermKind::TimeInterval => "TimeInterval",
            TermKind::TemporalRelation => "TemporalRelation",
            TermKind::Question => "Question",
        }
    }

    /// Parse a canonical kind name back into a [`TermKind`].
    pub fn from_name(name: &str) -> Result<Self, TermError> {
        Ok(match name {
            "Term" => TermKind::Atom,
            "Variable" => TermKind::Variable,
            "Inheritance" => TermKind::Inheritance,
            "Similarity" => TermKind::Similarity,
            "Instance" => TermKind::Instance,
            "Property" => TermKind::Property,
            "Implication" => TermKind::Implication,
            "Equivalence" => TermKind::Equivalence,
            "Conjunction" => TermKind::Conjunction,
            "Disjunction" => TermKind::Disjunction,
            "Product" => TermKind::Product,
            "Negation" => TermKind::Negation,
            "TimeInterval" => TermKind::TimeInterval,
            "TemporalRelation" => TermKind::TemporalRelation,
            "Question" => TermKind::Question,
            other => {
                return Err(TermError::UnknownKind {
                    name: other.to_string(),
                });
            }
        })
    }

    /// Whether this kind relates other terms (anything but atoms/variables).
    pub fn is_compound(&self) -> bool {
        !matches!(self, TermKind::Atom | TermKind::Variable)
    }

    /// Whether the relation is symmetric (argument order is immaterial for
    /// matching, though ids keep the asserted order).
    pub fn is_symmetric(&self) -> bool {
        matches!(self, TermKind::Similarity | TermKind::Equivalence)
    }

    /// All kinds, in declaration order.
    pub fn all() -> &'static [TermKind] {
        &[
            TermKind::Atom,
            TermKind::Variable,
            TermKind::Inheritance,
            TermKind::Similarity,
            TermKind::Instance,
            TermKind::Property,
            TermKind::Implication,
            TermKind::Equivalence,
            TermKind::Conjunction,
            TermKind::Disjunction,
            TermKind::Product,
            TermKind::Negation,
            TermKind::TimeInterval,
            TermKind::TemporalRelation,
            TermKind::Question,
        ]
    }
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

// ---------------------------------------------------------------------------
// Term ids
// ---------------------------------------------------------------------------

/// Content-addressed identity of a hyperedge.
///
/// The id is a pure function of `(kind, args)`; two structurally identical
/// terms always share one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(String);

impl TermId {
    /// Compose the id for a kind and argument list.
    pub fn compose(kind: TermKind, args: &[String]) -> TermId {
        let mut s = String::with_capacity(
            kind.canonical_name().len() + 2 + args.iter().map(|a| a.len() + 1).sum::<usize>(),
        );
        s.push_str(kind.canonical_name());
        s.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(arg);
        }
        s.push(')');
        TermId(s)
    }

    /// Wrap an already-formed id string without validation.
    ///
    /// Used for derived ids that extend a structural id (context splits).
    pub fn raw(id: impl Into<String>) -> TermId {
        TermId(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decompose the id into its kind and top-level arguments.
    pub fn decompose(&self) -> Result<TermParts, TermError> {
        decompose_str(&self.0)
    }
}

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&TermId> for TermId {
    fn from(id: &TermId) -> Self {
        id.clone()
    }
}

/// A decomposed term id: its kind and top-level argument strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermParts {
    pub kind: TermKind,
    pub args: Vec<String>,
}

/// Decompose `Kind(arg1,arg2,...)`, splitting arguments at top-level commas.
fn decompose_str(id: &str) -> Result<TermParts, TermError> {
    // A context-split id is "<structural id>|context:<ctx>"; the structural
    // prefix carries the shape.
    let id = id.split('|').next().unwrap_or(id);

    let open = id.find('(').ok_or_else(|| TermError::Malformed {
        id: id.to_string(),
    })?;
    if !id.ends_with(')') {
        return Err(TermError::Malformed { id: id.to_string() });
    }
    let kind = TermKind::from_name(&id[..open])?;
    let inner = &id[open + 1..id.len() - 1];

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| TermError::Malformed {
                    id: id.to_string(),
                })?;
            }
            ',' if depth == 0 => {
                args.push(inner[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(TermError::Malformed { id: id.to_string() });
    }
    if !inner.is_empty() {
        args.push(inner[start..].to_string());
    }
    Ok(TermParts { kind, args })
}

/// Whether an argument token is a variable (`$name` or `?name`).
pub fn is_variable(token: &str) -> bool {
    (token.starts_with('$') || token.starts_with('?')) && token.len() > 1
}

/// Whether an argument token is the single-slot wildcard `*`.
pub fn is_wildcard(token: &str) -> bool {
    token == "*"
}

/// Whether an argument token is itself a compound term id.
pub fn is_compound_arg(token: &str) -> bool {
    token.contains('(') && token.ends_with(')')
}

/// Format an interval endpoint the way ids expect: integers without a
/// fractional part, everything else in plain decimal.
pub fn format_endpoint(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
