//! Lexer (tokenizer) for condition expressions.
//!
//! Supported syntax:
//! - `.name`, `.user.name` - field references
//! - `42`, `-8`, `0.5`, `-0.25` - numbers (unary minus binds to the literal)
//! - `'text'`, `"text"` - strings with `\\ \' \" \n \t` escapes
//! - `null`, `true`, `false`
//! - `== != < <= > >=` - longest match, so `<=` is never split
//! - `and`, `or`, `(`, `)`
//!
//! Keywords must be lowercase. `AND` or `Null` are rejected rather than
//! normalized so a template typo never silently changes meaning.

use strata_core::Value;

use crate::error::{ExprError, ExprResult};
use crate::token::{CompareOp, FieldPath, LogicalOp, Token, TokenKind};

const KEYWORDS: [&str; 5] = ["and", "or", "null", "true", "false"];

/// Tokenize a condition expression
///
/// # Errors
///
/// Returns `ExprError::Lex` on an unrecognized character, an unterminated
/// string, an incomplete operator, or a keyword in the wrong case.
pub fn lex(input: &str) -> ExprResult<Vec<Token>> {
    Lexer::new(input).tokenize()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn slice(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn tokenize(mut self) -> ExprResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            let kind = match c {
                '(' => {
                    self.pos += 1;
                    TokenKind::LParen
                }
                ')' => {
                    self.pos += 1;
                    TokenKind::RParen
                }
                '.' => self.field(start)?,
                '"' | '\'' => self.string(c, start)?,
                '=' | '!' | '<' | '>' => self.compare(c, start)?,
                '-' | '0'..='9' => self.number(start)?,
                c if is_ident_start(c) => self.word(start)?,
                other => {
                    return Err(ExprError::lex(
                        start,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };

            tokens.push(Token::new(kind, self.slice(start), start));
        }

        Ok(tokens)
    }

    fn ident(&mut self) -> Option<String> {
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        Some(self.slice(start))
    }

    fn field(&mut self, start: usize) -> ExprResult<TokenKind> {
        let mut segments = Vec::new();
        while self.peek() == Some('.') {
            self.pos += 1;
            match self.ident() {
                Some(segment) => segments.push(segment),
                None => {
                    return Err(ExprError::lex(
                        self.pos,
                        format!(
                            "expected field name after '.' in '{}'",
                            self.slice(start)
                        ),
                    ))
                }
            }
        }
        Ok(TokenKind::Field(FieldPath::new(segments)))
    }

    fn string(&mut self, quote: char, start: usize) -> ExprResult<TokenKind> {
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(ExprError::lex(start, "unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(TokenKind::Literal(Value::String(value)));
                }
                Some('\\') => {
                    let escaped = match self.peek_at(1) {
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(other) => {
                            return Err(ExprError::lex(
                                self.pos,
                                format!("unknown escape sequence '\\{}'", other),
                            ))
                        }
                        None => {
                            return Err(ExprError::lex(start, "unterminated string literal"))
                        }
                    };
                    value.push(escaped);
                    self.pos += 2;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn compare(&mut self, first: char, start: usize) -> ExprResult<TokenKind> {
        let followed_by_eq = self.peek_at(1) == Some('=');
        let (op, width) = match (first, followed_by_eq) {
            ('=', true) => (CompareOp::Eq, 2),
            ('!', true) => (CompareOp::Ne, 2),
            ('<', true) => (CompareOp::Le, 2),
            ('>', true) => (CompareOp::Ge, 2),
            ('<', false) => (CompareOp::Lt, 1),
            ('>', false) => (CompareOp::Gt, 1),
            (c, false) => {
                return Err(ExprError::lex(
                    start,
                    format!("incomplete operator '{}', expected '{}='", c, c),
                ))
            }
            _ => unreachable!("compare is only entered on = ! < >"),
        };
        self.pos += width;
        Ok(TokenKind::Compare(op))
    }

    fn number(&mut self, start: usize) -> ExprResult<TokenKind> {
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(ExprError::lex(start, "'-' must be followed by a digit"));
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }

        let is_float =
            self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text = self.slice(start);
        if is_float {
            text.parse::<f64>()
                .map(|f| TokenKind::Literal(Value::Float(f)))
                .map_err(|e| ExprError::lex(start, format!("invalid number '{}': {}", text, e)))
        } else {
            text.parse::<i64>()
                .map(|i| TokenKind::Literal(Value::Int(i)))
                .map_err(|_| {
                    ExprError::lex(start, format!("integer literal '{}' out of range", text))
                })
        }
    }

    fn word(&mut self, start: usize) -> ExprResult<TokenKind> {
        let word = self.ident().unwrap_or_default();
        match word.as_str() {
            "and" => Ok(TokenKind::Logical(LogicalOp::And)),
            "or" => Ok(TokenKind::Logical(LogicalOp::Or)),
            "null" => Ok(TokenKind::Literal(Value::Null)),
            "true" => Ok(TokenKind::Literal(Value::Bool(true))),
            "false" => Ok(TokenKind::Literal(Value::Bool(false))),
            _ => {
                let lower = word.to_ascii_lowercase();
                if KEYWORDS.contains(&lower.as_str()) {
                    Err(ExprError::lex(
                        start,
                        format!("keyword '{}' must be lowercase '{}'", word, lower),
                    ))
                } else {
                    Err(ExprError::lex(
                        start,
                        format!(
                            "unexpected identifier '{}'; field references start with '.'",
                            word
                        ),
                    ))
                }
            }
        }
    }
}
