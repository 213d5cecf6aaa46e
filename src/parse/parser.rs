//! Recursive-descent parser with explicit precedence levels.

use crate::error::ParseError;
use crate::parse::lexer::{Spanned, Token, tokenize};
use crate::parse::{AstTerm, Statement};
use crate::term::TermKind;
use crate::truth::Truth;

struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let spanned = self.tokens.get(self.position);
        if spanned.is_some() {
            self.position += 1;
        }
        spanned
    }

    fn here(&self) -> usize {
        self.tokens
            .get(self.position)
            .map(|s| s.span.start)
            .unwrap_or(self.input_len)
    }

    fn expect_rparen(&mut self, open_at: usize) -> Result<(), ParseError> {
        match self.peek() {
            Some(Token::RParen) => {
                self.position += 1;
                Ok(())
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                position: self.here(),
                found: format!("{other:?}"),
                expected: "`)`".into(),
            }),
            None => Err(ParseError::UnexpectedEnd { position: open_at }),
        }
    }

    // statement := expr (truth | priority)* '?'?
    fn statement(&mut self) -> Result<Statement, ParseError> {
        let term = self.expr()?;
        let mut truth = None;
        let mut priority = None;
        let mut question = false;

        while let Some(token) = self.peek() {
            match token {
                Token::Truth(f, c) => {
                    truth = Some(Truth::new(*f, *c));
                    self.position += 1;
                }
                Token::Priority(p) => {
                    priority = Some(*p);
                    self.position += 1;
                }
                Token::Question => {
                    question = true;
                    self.position += 1;
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        position: self.here(),
                        found: format!("{other:?}"),
                        expected: "a truth/priority annotation, `?`, or end of input".into(),
                    });
                }
            }
        }

        // A pattern with variables asserts nothing; treat it as a question
        // even without the trailing mark.
        if term.has_variables() {
            question = true;
        }

        // Top-level negation folds into the truth annotation.
        let (term, truth) = match term {
            AstTerm::Compound { kind: TermKind::Negation, mut args } if args.len() == 1 => {
                let inner = args.remove(0);
                let negated = truth.unwrap_or_else(Truth::default_belief).negate();
                (inner, Some(negated))
            }
            other => (other, truth),
        };

        Ok(Statement {
            term,
            truth,
            priority,
            question,
        })
    }

    // expr := level2 (('==>' | '<=>') level2)*
    fn expr(&mut self) -> Result<AstTerm, ParseError> {
        let mut left = self.level2()?;
        while let Some(kind) = match self.peek() {
            Some(Token::Impl) => Some(TermKind::Implication),
            Some(Token::Equiv) => Some(TermKind::Equivalence),
            _ => None,
        } {
            self.position += 1;
            let right = self.level2()?;
            left = AstTerm::Compound {
                kind,
                args: vec![left, right],
            };
        }
        Ok(left)
    }

    // level2 := level3 (('&&' | '||') level3)*
    fn level2(&mut self) -> Result<AstTerm, ParseError> {
        let mut left = self.level3()?;
        while let Some(kind) = match self.peek() {
            Some(Token::And) => Some(TermKind::Conjunction),
            Some(Token::Or) => Some(TermKind::Disjunction),
            _ => None,
        } {
            self.position += 1;
            let right = self.level3()?;
            left = AstTerm::Compound {
                kind,
                args: vec![left, right],
            };
        }
        Ok(left)
    }

    // level3 := unary (('-->' | '<->') unary)*
    fn level3(&mut self) -> Result<AstTerm, ParseError> {
        let mut left = self.unary()?;
        while let Some(kind) = match self.peek() {
            Some(Token::Inherit) => Some(TermKind::Inheritance),
            Some(Token::Sim) => Some(TermKind::Similarity),
            _ => None,
        } {
            self.position += 1;
            let right = self.unary()?;
            left = AstTerm::Compound {
                kind,
                args: vec![left, right],
            };
        }
        Ok(left)
    }

    // unary := '¬' unary | primary
    fn unary(&mut self) -> Result<AstTerm, ParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.position += 1;
            let inner = self.unary()?;
            return Ok(AstTerm::Compound {
                kind: TermKind::Negation,
                args: vec![inner],
            });
        }
        self.primary()
    }

    // primary := '(' expr ')' | ident | var | '*'
    fn primary(&mut self) -> Result<AstTerm, ParseError> {
        let position = self.here();
        let Some(spanned) = self.advance() else {
            return Err(ParseError::UnexpectedEnd { position });
        };
        match &spanned.token {
            Token::Ident(name) => Ok(AstTerm::Atom(name.clone())),
            Token::Var(name) => Ok(AstTerm::Variable(name.clone())),
            Token::Star => Ok(AstTerm::Wildcard),
            Token::LParen => {
                let open_at = spanned.span.start;
                let inner = self.expr()?;
                self.expect_rparen(open_at)?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken {
                position,
                found: format!("{other:?}"),
                expected: "a term, `(`, `¬`, a variable, or `*`".into(),
            }),
        }
    }
}

/// Parse one statement of the belief language.
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        input_len: input.len(),
    };
    parser.statement()
}
