//! Precedence normalization for flat `and`/`or` chains.
//!
//! Scanning yields comparisons joined by `and`/`or` with no grouping. This
//! pass brackets every maximal `and`-chain that sits next to an `or` at the
//! same parenthesis depth, so
//!
//! ```text
//! .page <= 0 and .page <= -8 or .page > 0
//! ```
//!
//! becomes
//!
//! ```text
//! (.page <= 0 and .page <= -8) or .page > 0
//! ```
//!
//! Existing parenthesized groups keep their grouping; their contents are
//! normalized the same way. The pass is idempotent.

use crate::error::ExprResult;
use crate::lexer::lex;
use crate::parser::MAX_NESTING;
use crate::token::{LogicalOp, Token, TokenKind};

/// Bracket `and`-chains so conjunction binds tighter than disjunction
///
/// Input with unbalanced parentheses, or nested deeper than
/// [`MAX_NESTING`], is returned unchanged; the parser reports it.
pub fn normalize_precedence(tokens: &[Token]) -> Vec<Token> {
    match nesting_depth(tokens) {
        Some(depth) if depth <= MAX_NESTING => normalize_span(tokens),
        _ => tokens.to_vec(),
    }
}

/// Lex `expression` and normalize its precedence in one step
///
/// # Errors
///
/// Returns `ExprError::Lex` if the expression does not tokenize.
pub fn lexer_and_or_support(expression: &str) -> ExprResult<Vec<Token>> {
    let tokens = lex(expression)?;
    Ok(normalize_precedence(&tokens))
}

/// Deepest parenthesis nesting, `None` if unbalanced
fn nesting_depth(tokens: &[Token]) -> Option<usize> {
    let mut depth: usize = 0;
    let mut deepest = 0;
    for token in tokens {
        match token.kind {
            TokenKind::LParen => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            TokenKind::RParen => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(deepest)
}

/// Index of the `)` matching the `(` at `open`
fn matching_paren(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len() - 1
}

#[derive(Default)]
struct Segment {
    tokens: Vec<Token>,
    has_and: bool,
}

fn normalize_span(tokens: &[Token]) -> Vec<Token> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut separators: Vec<Token> = Vec::new();
    let mut current = Segment::default();

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::LParen => {
                let close = matching_paren(tokens, i);
                current.tokens.push(token.clone());
                current.tokens.extend(normalize_span(&tokens[i + 1..close]));
                current.tokens.push(tokens[close].clone());
                i = close + 1;
                continue;
            }
            TokenKind::Logical(LogicalOp::Or) => {
                separators.push(token.clone());
                segments.push(std::mem::take(&mut current));
            }
            TokenKind::Logical(LogicalOp::And) => {
                current.has_and = true;
                current.tokens.push(token.clone());
            }
            _ => current.tokens.push(token.clone()),
        }
        i += 1;
    }
    segments.push(current);

    let needs_grouping = !separators.is_empty();
    let mut out = Vec::with_capacity(tokens.len() + 2 * segments.len());
    let mut separators = separators.into_iter();
    for (n, segment) in segments.into_iter().enumerate() {
        if n > 0 {
            if let Some(or) = separators.next() {
                out.push(or);
            }
        }
        let bounds = segment
            .tokens
            .first()
            .zip(segment.tokens.last())
            .map(|(first, last)| (first.position, last.position + last.text.chars().count()));
        match bounds {
            Some((start, end)) if needs_grouping && segment.has_and => {
                out.push(Token::synthetic_paren(true, start));
                out.extend(segment.tokens);
                out.push(Token::synthetic_paren(false, end));
            }
            _ => out.extend(segment.tokens),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::render_tokens;

    fn normalized(expr: &str) -> String {
        render_tokens(&lexer_and_or_support(expr).unwrap())
    }

    #[test]
    fn test_too_deep_input_left_for_the_parser() {
        let depth = MAX_NESTING + 1;
        let expr = format!("{}.a == 1 and .b == 2 or .c == 3{}", "(".repeat(depth), ")".repeat(depth));
        let tokens = lex(&expr).unwrap();
        assert_eq!(normalize_precedence(&tokens), tokens);
    }

    #[test]
    fn test_and_chain_grouped_before_or() {
        assert_eq!(
            normalized(".page <= 0 and .page <= -8 or .page > 0"),
            "(.page <= 0 and .page <= -8) or .page > 0"
        );
    }

    #[test]
    fn test_or_then_and() {
        assert_eq!(
            normalized(".a == 1 or .b == 2 and .c == 3"),
            ".a == 1 or (.b == 2 and .c == 3)"
        );
    }

    #[test]
    fn test_multiple_chains() {
        assert_eq!(
            normalized(".a == 1 and .b == 2 or .c == 3 and .d == 4 or .e == 5"),
            "(.a == 1 and .b == 2) or (.c == 3 and .d == 4) or .e == 5"
        );
    }

    #[test]
    fn test_pure_and_untouched() {
        assert_eq!(
            normalized(".a == 1 and .b == 2 and .c == 3"),
            ".a == 1 and .b == 2 and .c == 3"
        );
    }

    #[test]
    fn test_pure_or_untouched() {
        assert_eq!(normalized(".a == 1 or .b == 2"), ".a == 1 or .b == 2");
    }

    #[test]
    fn test_explicit_group_kept() {
        assert_eq!(
            normalized(".a == 1 and (.b == 2 or .c == 3)"),
            ".a == 1 and (.b == 2 or .c == 3)"
        );
    }

    #[test]
    fn test_inside_group_is_normalized() {
        assert_eq!(
            normalized("(.a == 1 and .b == 2 or .c == 3) and .d == 4"),
            "((.a == 1 and .b == 2) or .c == 3) and .d == 4"
        );
    }

    #[test]
    fn test_idempotent() {
        let once = lexer_and_or_support(".a == 1 and .b == 2 or .c == 3").unwrap();
        let twice = normalize_precedence(&once);
        assert_eq!(render_tokens(&once), render_tokens(&twice));
    }

    #[test]
    fn test_unbalanced_returned_unchanged() {
        let tokens = lex("(.a == 1 and .b == 2 or .c == 3").unwrap();
        assert_eq!(normalize_precedence(&tokens), tokens);
    }

    #[test]
    fn test_source_shape_from_mapper_templates() {
        assert_eq!(
            normalized(".page <= 0 and .page != 0 or .page <=0"),
            "(.page <= 0 and .page != 0) or .page <= 0"
        );
    }
}
