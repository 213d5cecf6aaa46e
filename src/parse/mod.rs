//! The belief language: AST types and the statement parser.
//!
//! Statements are `content (truth | priority)* ('?')?` where content uses
//! three precedence levels of left-associative infix operators:
//!
//! 1. `==>` (implication), `<=>` (equivalence)
//! 2. `&&` (conjunction), `||` (disjunction)
//! 3. `-->` (inheritance), `<->` (similarity)
//!
//! plus `¬` prefix negation, parentheses, `$x`/`?x` variables, and the `*`
//! wildcard. Truth annotations are `%f;c%`, priority annotations `#p#`, and
//! a trailing `?` marks a question.

pub mod lexer;
pub mod parser;

pub use parser::parse_statement;

use crate::term::{TermId, TermKind};
use crate::truth::Truth;

/// A parsed term tree.
#[derive(Debug, Clone, PartialEq)]
pub enum AstTerm {
    Atom(String),
    Variable(String),
    Wildcard,
    Compound { kind: TermKind, args: Vec<AstTerm> },
}

impl AstTerm {
    /// The token this term contributes to a parent's argument list.
    pub fn arg_token(&self) -> String {
        match self {
            AstTerm::Atom(name) => name.clone(),
            AstTerm::Variable(name) => name.clone(),
            AstTerm::Wildcard => "*".to_string(),
            AstTerm::Compound { .. } => self.id().as_str().to_string(),
        }
    }

    /// The content-addressed id of this term.
    pub fn id(&self) -> TermId {
        match self {
            AstTerm::Atom(name) => TermId::compose(TermKind::Atom, &[name.clone()]),
            AstTerm::Variable(name) => TermId::compose(TermKind::Variable, &[name.clone()]),
            AstTerm::Wildcard => TermId::compose(TermKind::Atom, &["*".to_string()]),
            AstTerm::Compound { kind, args } => {
                let tokens: Vec<String> = args.iter().map(AstTerm::arg_token).collect();
                TermId::compose(*kind, &tokens)
            }
        }
    }

    /// Whether any subterm is a variable or wildcard.
    pub fn has_variables(&self) -> bool {
        match self {
            AstTerm::Atom(_) => false,
            AstTerm::Variable(_) | AstTerm::Wildcard => true,
            AstTerm::Compound { args, .. } => args.iter().any(AstTerm::has_variables),
        }
    }
}

/// A parsed statement: content plus its annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub term: AstTerm,
    pub truth: Option<Truth>,
    pub priority: Option<f32>,
    pub question: bool,
}
