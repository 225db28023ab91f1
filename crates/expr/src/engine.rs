//! Stateless façade over the expression pipeline.
//!
//! The mapper layer holds one `ExpressionEngine` and calls it for every
//! conditional fragment. Nothing is cached between calls; use
//! [`ExpressionEngine::compile`] to parse once and evaluate many times.

use tracing::trace;

use crate::context::{Params, ResolutionMode};
use crate::error::ExprResult;
use crate::parser::{parse, Condition};
use crate::token::Token;

/// Entry point for condition expressions
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEngine;

impl ExpressionEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Tokenize an expression
    ///
    /// # Errors
    ///
    /// Returns `ExprError::Lex` on malformed input.
    pub fn lexer(&self, expression: &str) -> ExprResult<Vec<Token>> {
        crate::lexer::lex(expression)
    }

    /// Tokenize and bracket `and`-chains ahead of `or`
    ///
    /// # Errors
    ///
    /// Returns `ExprError::Lex` on malformed input.
    pub fn lexer_and_or_support(&self, expression: &str) -> ExprResult<Vec<Token>> {
        crate::precedence::lexer_and_or_support(expression)
    }

    /// Evaluate a token stream
    ///
    /// # Errors
    ///
    /// Returns syntax, type or resolution errors.
    pub fn eval(&self, tokens: &[Token], params: &Params, mode: ResolutionMode) -> ExprResult<bool> {
        crate::eval::eval(tokens, params, mode)
    }

    /// Lex, normalize and evaluate
    ///
    /// # Errors
    ///
    /// Returns the first lex, syntax, type or resolution error.
    pub fn lexer_eval(
        &self,
        expression: &str,
        params: &Params,
        mode: ResolutionMode,
    ) -> ExprResult<bool> {
        let result = crate::eval::lexer_eval(expression, params, mode);
        trace!(target: "strata::expr", expression, ?mode, ?result, "Condition evaluated");
        result
    }

    /// Parse once for repeated evaluation
    ///
    /// # Errors
    ///
    /// Returns lex or syntax errors.
    pub fn compile(&self, expression: &str) -> ExprResult<Condition> {
        let tokens = self.lexer_and_or_support(expression)?;
        parse(&tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;

    #[test]
    fn test_engine_pipeline() {
        let engine = ExpressionEngine::new();
        let params = Params::new().with("page", -9);
        let tokens = engine.lexer(".page <= 0").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(engine.eval(&tokens, &params, ResolutionMode::Map), Ok(true));
        assert_eq!(
            engine.lexer_eval(
                ".page <= 0 and .page <= -8 or .page > 0",
                &params,
                ResolutionMode::Map
            ),
            Ok(true)
        );
    }

    #[test]
    fn test_compile_reports_syntax_errors() {
        let engine = ExpressionEngine::new();
        assert!(matches!(
            engine.compile(".a == 1 and"),
            Err(ExprError::Syntax { .. })
        ));
    }
}
