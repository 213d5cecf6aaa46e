//! Allen's interval algebra: thirteen qualitative relations on time
//! intervals, with inversion and composition.
//!
//! Composition is encoded as the seven base rows (`before`, `meets`,
//! `overlaps`, `starts`, `during`, `finishes`, `equals`) against all
//! thirteen columns. The remaining rows are derived: `after`, `metBy`, and
//! `overlappedBy` through time-reversal symmetry, the rest through the
//! converse identity `compose(r1,r2) = inverse(compose(inverse(r2),
//! inverse(r1)))`, with the small residual block
//! `{startedBy, contains, finishedBy} ∘ {starts, during, finishes}` encoded
//! directly (neither symmetry reduces it to a base row).
//!
//! Composition frequently yields several candidate relations; callers assert
//! each candidate with reduced confidence.

use serde::{Deserialize, Serialize};

use crate::error::TemporalError;
use crate::graph::index::IntervalSpan;

/// One of Allen's thirteen interval relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllenRelation {
    Before,
    After,
    Meets,
    MetBy,
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    During,
    Contains,
    Finishes,
    FinishedBy,
    Equals,
}

use AllenRelation::*;

/// The nine relations compatible with two intervals sharing interior points.
const CONCUR: &[AllenRelation] = &[
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    During,
    Contains,
    Finishes,
    FinishedBy,
    Equals,
];

/// All thirteen relations.
const FULL: &[AllenRelation] = &[
    Before,
    After,
    Meets,
    MetBy,
    Overlaps,
    OverlappedBy,
    Starts,
    StartedBy,
    During,
    Contains,
    Finishes,
    FinishedBy,
    Equals,
];

impl AllenRelation {
    /// The relation's canonical name as used in `TemporalRelation` ids.
    pub fn name(&self) -> &'static str {
        match self {
            Before => "before",
            After => "after",
            Meets => "meets",
            MetBy => "metBy",
            Overlaps => "overlaps",
            OverlappedBy => "overlappedBy",
            Starts => "starts",
            StartedBy => "startedBy",
            During => "during",
            Contains => "contains",
            Finishes => "finishes",
            FinishedBy => "finishedBy",
            Equals => "equals",
        }
    }

    /// Parse a canonical relation name.
    pub fn from_name(name: &str) -> Result<Self, TemporalError> {
        Ok(match name {
            "before" => Before,
            "after" => After,
            "meets" => Meets,
            "metBy" => MetBy,
            "overlaps" => Overlaps,
            "overlappedBy" => OverlappedBy,
            "starts" => Starts,
            "startedBy" => StartedBy,
            "during" => During,
            "contains" => Contains,
            "finishes" => Finishes,
            "finishedBy" => FinishedBy,
            "equals" => Equals,
            other => {
                return Err(TemporalError::UnknownRelation {
                    name: other.to_string(),
                });
            }
        })
    }

    /// The converse relation: if `A r B` then `B r.inverse() A`.
    pub fn inverse(&self) -> AllenRelation {
        match self {
            Before => After,
            After => Before,
            Meets => MetBy,
            MetBy => Meets,
            Overlaps => OverlappedBy,
            OverlappedBy => Overlaps,
            Starts => StartedBy,
            StartedBy => Starts,
            During => Contains,
            Contains => During,
            Finishes => FinishedBy,
            FinishedBy => Finishes,
            Equals => Equals,
        }
    }

    /// The relation's image under time reversal (`[s,e] → [-e,-s]`).
    fn time_reversal(&self) -> AllenRelation {
        match self {
            Before => After,
            After => Before,
            Meets => MetBy,
            MetBy => Meets,
            Overlaps => OverlappedBy,
            OverlappedBy => Overlaps,
            Starts => Finishes,
            Finishes => Starts,
            StartedBy => FinishedBy,
            FinishedBy => StartedBy,
            During => During,
            Contains => Contains,
            Equals => Equals,
        }
    }

    /// Whether this relation is one of the seven with an explicit table row.
    fn is_base(&self) -> bool {
        matches!(self, Before | Meets | Overlaps | Starts | During | Finishes | Equals)
    }
}

impl std::fmt::Display for AllenRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// The set of relations possibly holding between `A` and `C` given
/// `A r1 B` and `B r2 C`.
pub fn compose(r1: AllenRelation, r2: AllenRelation) -> Vec<AllenRelation> {
    if r1 == Equals {
        return vec![r2];
    }
    if r2 == Equals {
        return vec![r1];
    }
    if r1.is_base() {
        return base_row(r1, r2).to_vec();
    }
    if !r2.is_base() {
        // inverse ∘ inverse: converse identity bottoms out on a base row.
        return compose(r2.inverse(), r1.inverse())
            .into_iter()
            .map(|r| r.inverse())
            .collect();
    }
    match (r1, r2) {
        // Time-reversal maps these rows onto base rows.
        (After | MetBy | OverlappedBy, _) => compose(r1.time_reversal(), r2.time_reversal())
            .into_iter()
            .map(|r| r.time_reversal())
            .collect(),
        // Reversal turns the column into an inverse, handled above.
        (_, Before | Meets | Overlaps) => compose(r1.time_reversal(), r2.time_reversal())
            .into_iter()
            .map(|r| r.time_reversal())
            .collect(),
        // Residual block: no symmetry reaches a base row.
        (StartedBy, Starts) => vec![Starts, StartedBy, Equals],
        (StartedBy, During) => vec![OverlappedBy, During, Finishes],
        (StartedBy, Finishes) => vec![OverlappedBy],
        (Contains, Starts) => vec![Overlaps, Contains, FinishedBy],
        (Contains, During) => CONCUR.to_vec(),
        (Contains, Finishes) => vec![OverlappedBy, Contains, StartedBy],
        (FinishedBy, Starts) => vec![Overlaps],
        (FinishedBy, During) => vec![Overlaps, Starts, During],
        (FinishedBy, Finishes) => vec![Finishes, FinishedBy, Equals],
        _ => unreachable!("all relation pairs are covered"),
    }
}

/// Explicit table rows for the seven base relations.
fn base_row(r1: AllenRelation, r2: AllenRelation) -> &'static [AllenRelation] {
    match (r1, r2) {
        (Before, After) => FULL,
        (Before, During | Finishes | OverlappedBy | MetBy) => {
            &[Before, Meets, Overlaps, Starts, During]
        }
        (Before, _) => &[Before],

        (Meets, Before | Meets | Overlaps | FinishedBy | Contains) => &[Before],
        (Meets, Starts | StartedBy) => &[Meets],
        (Meets, During | Finishes | OverlappedBy) => &[Overlaps, Starts, During],
        (Meets, MetBy) => &[Finishes, FinishedBy, Equals],
        (Meets, After) => &[After, MetBy, OverlappedBy, StartedBy, Contains],

        (Overlaps, Before | Meets) => &[Before],
        (Overlaps, Overlaps | FinishedBy) => &[Before, Meets, Overlaps],
        (Overlaps, Contains) => &[Before, Meets, Overlaps, FinishedBy, Contains],
        (Overlaps, Starts) => &[Overlaps],
        (Overlaps, StartedBy) => &[Overlaps, FinishedBy, Contains],
        (Overlaps, During | Finishes) => &[Overlaps, Starts, During],
        (Overlaps, OverlappedBy) => CONCUR,
        (Overlaps, MetBy) => &[OverlappedBy, StartedBy, Contains],
        (Overlaps, After) => &[After, MetBy, OverlappedBy, StartedBy, Contains],

        (Starts, Before | Meets) => &[Before],
        (Starts, Overlaps | FinishedBy) => &[Before, Meets, Overlaps],
        (Starts, Contains) => &[Before, Meets, Overlaps, FinishedBy, Contains],
        (Starts, Starts) => &[Starts],
        (Starts, StartedBy) => &[Starts, StartedBy, Equals],
        (Starts, During | Finishes) => &[During],
        (Starts, OverlappedBy) => &[During, Finishes, OverlappedBy],
        (Starts, MetBy) => &[MetBy],
        (Starts, After) => &[After],

        (During, Before | Meets) => &[Before],
        (During, Overlaps | FinishedBy) => &[Before, Meets, Overlaps, Starts, During],
        (During, Contains) => FULL,
        (During, Starts | During | Finishes) => &[During],
        (During, StartedBy | OverlappedBy) => {
            &[During, Finishes, OverlappedBy, MetBy, After]
        }
        (During, MetBy | After) => &[After],

        (Finishes, Before) => &[Before],
        (Finishes, Meets) => &[Meets],
        (Finishes, Overlaps) => &[Overlaps, Starts, During],
        (Finishes, FinishedBy) => &[Finishes, FinishedBy, Equals],
        (Finishes, Contains) => &[After, MetBy, OverlappedBy, StartedBy, Contains],
        (Finishes, Starts | During) => &[During],
        (Finishes, Finishes) => &[Finishes],
        (Finishes, StartedBy | OverlappedBy) => &[After, MetBy, OverlappedBy],
        (Finishes, MetBy | After) => &[After],

        _ => unreachable!("base_row is only called with a non-equals base first argument"),
    }
}

// ---------------------------------------------------------------------------
// Concrete intervals
// ---------------------------------------------------------------------------

/// The relation holding between two concrete interval spans.
pub fn relation_between(a: IntervalSpan, b: IntervalSpan) -> AllenRelation {
    if a.end < b.start {
        return Before;
    }
    if b.end < a.start {
        return After;
    }
    if a.end == b.start {
        return Meets;
    }
    if b.end == a.start {
        return MetBy;
    }
    match (
        a.start.partial_cmp(&b.start).expect("finite endpoints"),
        a.end.partial_cmp(&b.end).expect("finite endpoints"),
    ) {
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Equal) => Equals,
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Less) => Starts,
        (std::cmp::Ordering::Equal, std::cmp::Ordering::Greater) => StartedBy,
        (std::cmp::Ordering::Greater, std::cmp::Ordering::Equal) => Finishes,
        (std::cmp::Ordering::Less, std::cmp::Ordering::Equal) => FinishedBy,
        (std::cmp::Ordering::Greater, std::cmp::Ordering::Less) => During,
        (std::cmp::Ordering::Less, std::cmp::Ordering::Greater) => Contains,
        (std::cmp::Ordering::Less, std::cmp::Ordering::Less) => Overlaps,
        (std::cmp::Ordering::Greater, std::cmp::Ordering::Greater) => OverlappedBy,
    }
}
