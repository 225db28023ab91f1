//! Error types for condition expressions.
//!
//! Every failure carries enough context to point at the offending input:
//! lexing and syntax errors carry a character position, type errors carry
//! the operator and both operand types, resolution errors carry the field
//! path.

use thiserror::Error;

/// Result type alias for expression operations
pub type ExprResult<T> = std::result::Result<T, ExprError>;

/// Expression lexing, parsing and evaluation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Malformed token stream: bad character, unterminated string or operator
    #[error("lex error at position {position}: {reason}")]
    Lex {
        /// Character offset into the expression
        position: usize,
        /// What was wrong
        reason: String,
    },

    /// Tokens do not form an expression
    #[error("syntax error at position {position}: {reason}")]
    Syntax {
        /// Character offset into the expression
        position: usize,
        /// What was wrong
        reason: String,
    },

    /// Comparison between operands of incompatible kinds
    #[error("type mismatch: cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        /// Operator symbol
        op: &'static str,
        /// Left operand type
        left: &'static str,
        /// Right operand type
        right: &'static str,
    },

    /// A bare operand in logical position was not a boolean
    #[error("expected Bool operand, found {found}")]
    NotBoolean {
        /// Actual operand type
        found: &'static str,
    },

    /// Structured-object mode: the field does not exist
    #[error("unknown field: {path}")]
    UnknownField {
        /// Field path as written
        path: String,
    },

    /// Structured-object mode: a path segment descends into a non-object
    #[error("cannot resolve {path}: {found} has no fields")]
    NotAnObject {
        /// Field path as written
        path: String,
        /// Type of the value that was traversed
        found: &'static str,
    },

    /// A parameter context could not be built
    #[error("invalid parameter context: {reason}")]
    InvalidContext {
        /// What was wrong
        reason: String,
    },
}

impl ExprError {
    pub(crate) fn lex(position: usize, reason: impl Into<String>) -> Self {
        ExprError::Lex {
            position,
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(position: usize, reason: impl Into<String>) -> Self {
        ExprError::Syntax {
            position,
            reason: reason.into(),
        }
    }

    /// Character offset for lex and syntax errors
    pub fn position(&self) -> Option<usize> {
        match self {
            ExprError::Lex { position, .. } | ExprError::Syntax { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}
