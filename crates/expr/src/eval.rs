//! Evaluation of conditions against a parameter context.
//!
//! ## Comparison rules
//!
//! - Number vs number: numeric ordering, `Int` and `Float` mix freely
//! - String vs string: lexical ordering
//! - `== null` / `!= null`: a missing key and a stored null are both absent
//! - Bool, Bytes, Array, Object: `==` / `!=` against the same kind only
//! - Anything else is a `TypeMismatch`; nothing is coerced
//!
//! `and` / `or` short-circuit. The right operand is never resolved once the
//! left one decides the result, so its resolution errors never surface.

use std::cmp::Ordering;
use std::mem::discriminant;

use strata_core::Value;

use crate::context::{Params, ResolutionMode};
use crate::error::{ExprError, ExprResult};
use crate::parser::{parse, Condition, Expr, Operand};
use crate::precedence::lexer_and_or_support;
use crate::token::{CompareOp, Token};

/// Evaluate a token stream
///
/// # Errors
///
/// Returns a syntax error if the tokens do not form an expression, or any
/// type or resolution error reached during evaluation.
pub fn eval(tokens: &[Token], params: &Params, mode: ResolutionMode) -> ExprResult<bool> {
    parse(tokens)?.evaluate(params, mode)
}

/// Lex, normalize precedence and evaluate in one call
///
/// # Errors
///
/// Returns the first lex, syntax, type or resolution error.
pub fn lexer_eval(expression: &str, params: &Params, mode: ResolutionMode) -> ExprResult<bool> {
    let tokens = lexer_and_or_support(expression)?;
    eval(&tokens, params, mode)
}

impl Condition {
    /// Evaluate against `params` under `mode`
    ///
    /// # Errors
    ///
    /// Returns any type or resolution error that is not short-circuited.
    pub fn evaluate(&self, params: &Params, mode: ResolutionMode) -> ExprResult<bool> {
        Evaluator { params, mode }.expr(&self.expr)
    }
}

struct Evaluator<'a> {
    params: &'a Params,
    mode: ResolutionMode,
}

impl<'a> Evaluator<'a> {
    fn expr(&self, expr: &Expr) -> ExprResult<bool> {
        match expr {
            Expr::And(left, right) => {
                if !self.expr(left)? {
                    return Ok(false);
                }
                self.expr(right)
            }
            Expr::Or(left, right) => {
                if self.expr(left)? {
                    return Ok(true);
                }
                self.expr(right)
            }
            Expr::Truthy(operand) => {
                let value = self.operand(operand)?;
                value.as_bool().ok_or(ExprError::NotBoolean {
                    found: value.type_name(),
                })
            }
            Expr::Compare { left, op, right } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                compare(*op, left, right)
            }
        }
    }

    fn operand<'b>(&self, operand: &'b Operand) -> ExprResult<&'b Value>
    where
        'a: 'b,
    {
        match operand {
            Operand::Literal(value) => Ok(value),
            Operand::Field(path) => self.params.resolve(path, self.mode),
        }
    }
}

// NaN is unordered: only != holds
fn accepts_partial(op: CompareOp, ordering: Option<Ordering>) -> bool {
    match ordering {
        Some(ordering) => op.accepts(ordering),
        None => op == CompareOp::Ne,
    }
}

/// Order an integer against a float without rounding the integer
///
/// `i as f64` is lossy above 2^53, so the float is split into its integral
/// part, compared as `i64`, and its fraction breaks ties.
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, exactly representable
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    Some(i.cmp(&(whole as i64)).then_with(|| {
        if f > whole {
            Ordering::Less
        } else if f < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}

/// Apply a comparison operator to two resolved values
///
/// # Errors
///
/// Returns `ExprError::TypeMismatch` when the operand kinds do not support
/// `op`.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> ExprResult<bool> {
    let mismatch = || ExprError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match (left, right) {
        (Value::Null, Value::Null) if op.is_equality() => Ok(op == CompareOp::Eq),
        (Value::Null, _) | (_, Value::Null) if op.is_equality() => Ok(op == CompareOp::Ne),
        (Value::Null, _) | (_, Value::Null) => Err(mismatch()),

        (Value::Int(a), Value::Int(b)) => Ok(op.accepts(a.cmp(b))),
        (Value::Int(a), Value::Float(b)) => Ok(accepts_partial(op, cmp_int_float(*a, *b))),
        (Value::Float(a), Value::Int(b)) => Ok(accepts_partial(
            op,
            cmp_int_float(*b, *a).map(Ordering::reverse),
        )),
        (Value::Float(a), Value::Float(b)) => Ok(accepts_partial(op, a.partial_cmp(b))),

        (Value::String(a), Value::String(b)) => Ok(op.accepts(a.as_str().cmp(b.as_str()))),

        (a, b) if op.is_equality() && discriminant(a) == discriminant(b) => {
            let ordering = if a == b {
                Ordering::Equal
            } else {
                Ordering::Less
            };
            Ok(op.accepts(ordering))
        }

        _ => Err(mismatch()),
    }
}
