//! Declarative directive usage definitions and the argument binder.
//!
//! A directive declares its parameters once through [`UsageDefinition`].
//! The compiler binds each statement's tokens against it, so by the time a
//! directive sees its [`Arguments`] every value has the declared kind and
//! required parameters are present.

use rust_decimal::Decimal;
use std::fmt;

use crate::error::CompileError;
use crate::token::{ByteSize, Spanned, TimeDuration, Token, TokenKind};

/// Declaration of a single positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub kind: TokenKind,
    pub optional: bool,
    /// Accepts one or more comma-separated values.
    pub list: bool,
}

impl ParamDef {
    /// Whether a token is acceptable for this parameter. Text parameters
    /// also take bare identifiers.
    pub fn accepts(&self, token: &Token) -> bool {
        let kind = token.kind();
        kind == self.kind || (self.kind == TokenKind::Text && kind == TokenKind::Identifier)
    }

    fn placeholder(&self) -> String {
        let one = match self.kind {
            TokenKind::ColumnName => format!(":{}", self.name),
            _ => format!("<{}>", self.name),
        };
        if self.list {
            format!("{one}[,{one} ...]")
        } else {
            one
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageDefinition {
    directive: String,
    params: Vec<ParamDef>,
}

impl UsageDefinition {
    pub fn builder(directive: impl Into<String>) -> UsageBuilder {
        UsageBuilder {
            directive: directive.into(),
            params: Vec::new(),
        }
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// Bind a statement's argument tokens (directive name excluded) to the
    /// declared parameters.
    ///
    /// Parameters are matched left to right. An optional parameter whose
    /// kind does not match the next token is skipped; a required one is an
    /// error. Tokens left over after the last parameter are an error too.
    /// `line`/`column` locate the statement for errors with no better
    /// position (missing arguments).
    pub fn bind(
        &self,
        tokens: &[Spanned],
        line: u32,
        column: u32,
    ) -> Result<Arguments, CompileError> {
        let err = |line: u32, column: u32, message: String| {
            CompileError::parse(Some(&self.directive), line, column, message)
        };
        let mut args = Arguments {
            directive: self.directive.clone(),
            line,
            column,
            entries: Vec::new(),
        };
        let mut pos = 0usize;

        for param in &self.params {
            let Some(first) = tokens.get(pos) else {
                if param.optional {
                    continue;
                }
                return Err(err(
                    line,
                    column,
                    format!(
                        "missing required argument '{}' ({}); usage: {}",
                        param.name, param.kind, self
                    ),
                ));
            };
            if !param.accepts(&first.token) {
                if param.optional {
                    continue;
                }
                return Err(err(
                    first.line,
                    first.column,
                    format!(
                        "argument '{}' expects {}, found {} '{}'",
                        param.name,
                        param.kind,
                        first.token.kind(),
                        first.token
                    ),
                ));
            }

            let mut values = vec![first.token.clone()];
            pos += 1;
            while param.list && tokens.get(pos).is_some_and(|t| t.token.is_delimiter(',')) {
                match tokens.get(pos + 1) {
                    Some(next) if param.accepts(&next.token) => {
                        values.push(next.token.clone());
                        pos += 2;
                    }
                    Some(next) => {
                        return Err(err(
                            next.line,
                            next.column,
                            format!(
                                "argument '{}' expects a list of {}, found {} '{}'",
                                param.name,
                                param.kind,
                                next.token.kind(),
                                next.token
                            ),
                        ))
                    }
                    None => {
                        let comma = &tokens[pos];
                        return Err(err(
                            comma.line,
                            comma.column,
                            format!("trailing ',' in argument '{}'", param.name),
                        ));
                    }
                }
            }

            for value in &values {
                if let Token::TimeDuration(d) = value {
                    if let Err(e) = d.unit() {
                        return Err(err(first.line, first.column, e.to_string()));
                    }
                }
            }
            args.entries.push((param.name.clone(), values));
        }

        if let Some(extra) = tokens.get(pos) {
            return Err(err(
                extra.line,
                extra.column,
                format!("unexpected argument '{}'; usage: {}", extra.token, self),
            ));
        }
        Ok(args)
    }
}

/// Renders the one-line usage string, e.g.
/// `aggregate-stats :column <operation> [:output]`.
impl fmt::Display for UsageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directive)?;
        for param in &self.params {
            if param.optional {
                write!(f, " [{}]", param.placeholder())?;
            } else {
                write!(f, " {}", param.placeholder())?;
            }
        }
        Ok(())
    }
}

pub struct UsageBuilder {
    directive: String,
    params: Vec<ParamDef>,
}

impl UsageBuilder {
    fn push(mut self, name: &str, kind: TokenKind, optional: bool, list: bool) -> Self {
        self.params.push(ParamDef {
            name: name.to_owned(),
            kind,
            optional,
            list,
        });
        self
    }

    pub fn define(self, name: &str, kind: TokenKind) -> Self {
        self.push(name, kind, false, false)
    }

    pub fn define_optional(self, name: &str, kind: TokenKind) -> Self {
        self.push(name, kind, true, false)
    }

    pub fn define_list(self, name: &str, kind: TokenKind) -> Self {
        self.push(name, kind, false, true)
    }

    pub fn define_optional_list(self, name: &str, kind: TokenKind) -> Self {
        self.push(name, kind, true, true)
    }

    pub fn build(self) -> UsageDefinition {
        UsageDefinition {
            directive: self.directive,
            params: self.params,
        }
    }
}

/// Bound arguments, read back by parameter name through typed getters.
/// A getter returns `None` when the parameter was not supplied or holds a
/// different kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments {
    directive: String,
    line: u32,
    column: u32,
    entries: Vec<(String, Vec<Token>)>,
}

impl Arguments {
    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// Source line of the statement these arguments came from.
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn tokens(&self, name: &str) -> &[Token] {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn token(&self, name: &str) -> Option<&Token> {
        self.tokens(name).first()
    }

    pub fn column_name(&self, name: &str) -> Option<&str> {
        match self.token(name) {
            Some(Token::Column(c)) => Some(c),
            _ => None,
        }
    }

    pub fn column_names(&self, name: &str) -> Vec<&str> {
        self.tokens(name)
            .iter()
            .filter_map(|t| match t {
                Token::Column(c) => Some(c.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text or bare identifier.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.token(name) {
            Some(Token::Text(s)) | Some(Token::Identifier(s)) => Some(s),
            _ => None,
        }
    }

    pub fn identifier(&self, name: &str) -> Option<&str> {
        match self.token(name) {
            Some(Token::Identifier(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<Decimal> {
        match self.token(name) {
            Some(Token::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.token(name) {
            Some(Token::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn byte_size(&self, name: &str) -> Option<&ByteSize> {
        match self.token(name) {
            Some(Token::ByteSize(b)) => Some(b),
            _ => None,
        }
    }

    pub fn time_duration(&self, name: &str) -> Option<&TimeDuration> {
        match self.token(name) {
            Some(Token::TimeDuration(d)) => Some(d),
            _ => None,
        }
    }
}
