//! Typed tokens produced by the recipe lexer or built by directives.

mod byte_size;
mod duration;

pub use byte_size::{ByteSize, ByteUnit};
pub use duration::{TimeDuration, TimeUnit};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare word: directive names, keywords, policy names.
    Identifier(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Text(String),
    Number(Decimal),
    Bool(bool),
    Null,
    ByteSize(ByteSize),
    TimeDuration(TimeDuration),
    /// `:name`, stored without the colon.
    Column(String),
    /// `= == != < <= > >= + - * / % && || !`
    Operator(&'static str),
    /// `( ) { } [ ] , ; .`
    Delimiter(char),
    /// `#pragma`
    Pragma,
    Eof,
    /// Unrecognised input. Carries the offending text and a reason.
    Error { text: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Text,
    Number,
    Bool,
    Null,
    ByteSize,
    TimeDuration,
    ColumnName,
    Operator,
    Delimiter,
    Pragma,
    Eof,
    Error,
}

impl TokenKind {
    /// Upper-case name used in structured output and usage strings.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Text => "TEXT",
            TokenKind::Number => "NUMERIC",
            TokenKind::Bool => "BOOLEAN",
            TokenKind::Null => "NULL",
            TokenKind::ByteSize => "BYTE_SIZE",
            TokenKind::TimeDuration => "TIME_DURATION",
            TokenKind::ColumnName => "COLUMN_NAME",
            TokenKind::Operator => "OPERATOR",
            TokenKind::Delimiter => "DELIMITER",
            TokenKind::Pragma => "PRAGMA",
            TokenKind::Eof => "EOF",
            TokenKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Identifier(_) => TokenKind::Identifier,
            Token::Text(_) => TokenKind::Text,
            Token::Number(_) => TokenKind::Number,
            Token::Bool(_) => TokenKind::Bool,
            Token::Null => TokenKind::Null,
            Token::ByteSize(_) => TokenKind::ByteSize,
            Token::TimeDuration(_) => TokenKind::TimeDuration,
            Token::Column(_) => TokenKind::ColumnName,
            Token::Operator(_) => TokenKind::Operator,
            Token::Delimiter(_) => TokenKind::Delimiter,
            Token::Pragma => TokenKind::Pragma,
            Token::Eof => TokenKind::Eof,
            Token::Error { .. } => TokenKind::Error,
        }
    }

    pub fn is_delimiter(&self, c: char) -> bool {
        matches!(self, Token::Delimiter(d) if *d == c)
    }

    /// Canonical value as JSON: exact bytes for sizes, exact nanoseconds for
    /// durations. Fractions are kept. A duration with an unsupported unit,
    /// or a magnitude that overflows, has a null value.
    pub fn value(&self) -> JsonValue {
        match self {
            Token::Identifier(s) | Token::Text(s) | Token::Column(s) => json!(s),
            Token::Number(n) => decimal_to_json(*n),
            Token::Bool(b) => json!(b),
            Token::Null | Token::Eof | Token::Pragma => JsonValue::Null,
            Token::ByteSize(b) => b
                .bytes_exact()
                .map(decimal_to_json)
                .unwrap_or(JsonValue::Null),
            Token::TimeDuration(d) => d
                .nanos_exact()
                .map(decimal_to_json)
                .unwrap_or(JsonValue::Null),
            Token::Operator(op) => json!(op),
            Token::Delimiter(c) => json!(c.to_string()),
            Token::Error { text, .. } => json!(text),
        }
    }

    /// Structured rendering of the token.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Token::ByteSize(b) => json!({
                "type": TokenKind::ByteSize.as_str(),
                "value": b.original(),
                "unit": b.unit().as_str(),
                "bytes": self.value(),
            }),
            Token::TimeDuration(d) => json!({
                "type": TokenKind::TimeDuration.as_str(),
                "value": d.original(),
                "unit": d.raw_unit(),
                "nanos": self.value(),
            }),
            Token::Error { text, message } => json!({
                "type": TokenKind::Error.as_str(),
                "value": text,
                "message": message,
            }),
            other => json!({
                "type": other.kind().as_str(),
                "value": other.value(),
            }),
        }
    }
}

/// Renders the token as recipe text; lexing the output yields an equal token.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(s) => f.write_str(s),
            Token::Text(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    match c {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
            Token::Number(n) => write!(f, "{}", n),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Null => f.write_str("null"),
            Token::ByteSize(b) => write!(f, "{}", b),
            Token::TimeDuration(d) => write!(f, "{}", d),
            Token::Column(c) => write!(f, ":{}", c),
            Token::Operator(op) => f.write_str(op),
            Token::Delimiter(c) => write!(f, "{}", c),
            Token::Pragma => f.write_str("#pragma"),
            Token::Eof => Ok(()),
            Token::Error { text, .. } => f.write_str(text),
        }
    }
}

/// Integral decimals become JSON integers; others the nearest JSON number.
pub(crate) fn decimal_to_json(d: Decimal) -> JsonValue {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return json!(i);
        }
    }
    let text = d.normalize().to_string();
    serde_json::Number::from_str(&text)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::String(text))
}

/// A token with its position in the recipe: 1-based line and column,
/// 0-based character offsets `offset..end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
    pub end: usize,
}
