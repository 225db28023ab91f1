//! Condition expressions for dynamic SQL
//!
//! Mapper templates include a SQL fragment only when its condition holds.
//! This crate provides the pipeline behind that decision:
//!
//! ```text
//! text ──lex──▶ tokens ──normalize_precedence──▶ tokens ──parse──▶ Condition ──evaluate──▶ bool
//! ```
//!
//! # Example
//!
//! ```
//! use strata_expr::{lexer_eval, Params, ResolutionMode};
//!
//! let params = Params::new().with("page", -9);
//! let include = lexer_eval(".page <= 0 and .page <= -8 or .page > 0", &params, ResolutionMode::Map)?;
//! assert!(include);
//! # Ok::<(), strata_expr::ExprError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod precedence;
pub mod token;

pub use context::{Params, ResolutionMode};
pub use engine::ExpressionEngine;
pub use error::{ExprError, ExprResult};
pub use eval::{compare, eval, lexer_eval};
pub use lexer::lex;
pub use parser::{parse, Condition, Expr, Operand, MAX_CONNECTIVES, MAX_NESTING};
pub use precedence::{lexer_and_or_support, normalize_precedence};
pub use token::{render_tokens, CompareOp, FieldPath, LogicalOp, Token, TokenKind};
