//! Tokens produced by the lexer.

use std::cmp::Ordering;
use std::fmt;

use strata_core::Value;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Source spelling
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Only `==` and `!=` apply to unordered kinds
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    /// Whether `ordering` of left against right satisfies the operator
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Logical connective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl LogicalOp {
    /// Source spelling
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
        }
    }
}

/// Dotted path into the parameter context, e.g. `.user.name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Build a path from its segments; the lexer guarantees at least one
    pub fn new(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        Self { segments }
    }

    /// Path segments without the leading dots
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// Token type
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Field reference
    Field(FieldPath),
    /// Number, string, boolean or null literal
    Literal(Value),
    /// `== != < <= > >=`
    Compare(CompareOp),
    /// `and` / `or`
    Logical(LogicalOp),
    /// `(`
    LParen,
    /// `)`
    RParen,
}

impl TokenKind {
    /// Human-readable name for error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Field(path) => format!("field '{}'", path),
            TokenKind::Literal(value) => format!("{} literal", value.type_name()),
            TokenKind::Compare(op) => format!("'{}'", op.symbol()),
            TokenKind::Logical(op) => format!("'{}'", op.keyword()),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
        }
    }
}

/// A token with its source text and character position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What the token is
    pub kind: TokenKind,
    /// Source text (literal strings keep their quotes)
    pub text: String,
    /// Character offset of the first character
    pub position: usize,
}

impl Token {
    /// Create a token
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Parenthesis inserted by precedence normalization
    pub(crate) fn synthetic_paren(open: bool, position: usize) -> Self {
        if open {
            Self::new(TokenKind::LParen, "(", position)
        } else {
            Self::new(TokenKind::RParen, ")", position)
        }
    }

    /// Whether this is the given logical connective
    pub fn is_logical(&self, op: LogicalOp) -> bool {
        self.kind == TokenKind::Logical(op)
    }
}

/// Render tokens back into expression text
///
/// Tokens are separated by single spaces, except directly inside
/// parentheses: `(.a == 1 and .b == 2) or .c == 3`.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<&TokenKind> = None;
    for token in tokens {
        let glued = matches!(previous, None | Some(TokenKind::LParen))
            || token.kind == TokenKind::RParen;
        if !glued {
            out.push(' ');
        }
        out.push_str(&token.text);
        previous = Some(&token.kind);
    }
    out
}
