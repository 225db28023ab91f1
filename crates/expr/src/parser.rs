//! Recursive-descent parser from tokens to an expression tree.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or_expr  := and_expr ("or" and_expr)*
//! and_expr := primary ("and" primary)*
//! primary  := "(" or_expr ")"
//!           | operand (compare_op operand)?
//! operand  := field | literal
//! ```
//!
//! The parser applies conventional precedence on its own, so evaluating a
//! raw lexer stream and a normalized one gives the same result.

use strata_core::Value;

use crate::error::{ExprError, ExprResult};
use crate::token::{CompareOp, FieldPath, LogicalOp, Token, TokenKind};

/// Deepest parenthesis nesting the parser accepts, counting the groups added
/// by precedence normalization
pub const MAX_NESTING: usize = 128;

/// Most `and`/`or` connectives in one expression
pub const MAX_CONNECTIVES: usize = 1024;

/// Leaf of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Field reference, resolved at evaluation time
    Field(FieldPath),
    /// Literal value
    Literal(Value),
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`
    Compare {
        /// Left operand
        left: Operand,
        /// Operator
        op: CompareOp,
        /// Right operand
        right: Operand,
    },
    /// Bare operand used as a boolean
    Truthy(Operand),
    /// Short-circuit conjunction
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction
    Or(Box<Expr>, Box<Expr>),
}

/// A parsed condition, reusable across evaluations
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub(crate) expr: Expr,
}

impl Condition {
    /// The root of the expression tree
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// Parse a token stream into a [`Condition`]
///
/// # Errors
///
/// Returns `ExprError::Syntax` for an empty stream, a missing operand, a
/// dangling operator, chained comparisons, unbalanced parentheses, nesting
/// deeper than [`MAX_NESTING`] or more than [`MAX_CONNECTIVES`] connectives.
pub fn parse(tokens: &[Token]) -> ExprResult<Condition> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        connectives: 0,
    };
    if tokens.is_empty() {
        return Err(ExprError::syntax(0, "empty expression"));
    }
    let expr = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(ExprError::syntax(
            token.position,
            format!("unexpected {}", token.kind.describe()),
        ));
    }
    Ok(Condition { expr })
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    connectives: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_position(&self) -> usize {
        self.tokens
            .last()
            .map(|t| t.position + t.text.chars().count())
            .unwrap_or(0)
    }

    fn eat_logical(&mut self, op: LogicalOp) -> ExprResult<bool> {
        let Some(token) = self.peek().filter(|t| t.is_logical(op)) else {
            return Ok(false);
        };
        // Chains build left-deep trees; evaluation and drop recurse per link
        if self.connectives >= MAX_CONNECTIVES {
            return Err(ExprError::syntax(
                token.position,
                format!("expression has more than {} and/or connectives", MAX_CONNECTIVES),
            ));
        }
        self.connectives += 1;
        self.pos += 1;
        Ok(true)
    }

    fn or_expr(&mut self) -> ExprResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_logical(LogicalOp::Or)? {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ExprResult<Expr> {
        let mut left = self.primary()?;
        while self.eat_logical(LogicalOp::And)? {
            let right = self.primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let token = match self.next() {
            Some(token) => token,
            None => {
                return Err(ExprError::syntax(
                    self.end_position(),
                    "unexpected end of expression, expected operand",
                ))
            }
        };

        if token.kind == TokenKind::LParen {
            if self.depth >= MAX_NESTING {
                return Err(ExprError::syntax(token.position, "expression nested too deeply"));
            }
            self.depth += 1;
            let inner = self.or_expr();
            self.depth -= 1;
            let inner = inner?;
            return match self.next() {
                Some(t) if t.kind == TokenKind::RParen => Ok(inner),
                Some(t) => Err(ExprError::syntax(
                    t.position,
                    format!("expected ')', found {}", t.kind.describe()),
                )),
                None => Err(ExprError::syntax(token.position, "unclosed '('")),
            };
        }

        let left = self.operand(token)?;
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Compare(op)) => *op,
            _ => return Ok(Expr::Truthy(left)),
        };
        self.pos += 1;

        let right = match self.next() {
            Some(t) => self.operand(t)?,
            None => {
                return Err(ExprError::syntax(
                    self.end_position(),
                    format!("expected operand after '{}'", op.symbol()),
                ))
            }
        };

        if let Some(t) = self.peek() {
            if matches!(t.kind, TokenKind::Compare(_)) {
                return Err(ExprError::syntax(
                    t.position,
                    "comparison operators cannot be chained",
                ));
            }
        }

        Ok(Expr::Compare { left, op, right })
    }

    fn operand(&self, token: &Token) -> ExprResult<Operand> {
        match &token.kind {
            TokenKind::Field(path) => Ok(Operand::Field(path.clone())),
            TokenKind::Literal(value) => Ok(Operand::Literal(value.clone())),
            other => Err(ExprError::syntax(
                token.position,
                format!("expected operand, found {}", other.describe()),
            )),
        }
    }
}
