//! Grammar walker and recipe compiler.
//!
//! A recipe is a sequence of statements, one directive invocation each,
//! terminated by `;` or by the end of the line:
//!
//! ```text
//! #pragma version 2.0;
//! #pragma load-directives my-udd;
//! parse-as-size :size skip;
//! aggregate-stats :size sum
//! ```
//!
//! [`GrammarWalker`] splits recipe text into statements without consulting
//! the registry. [`RecipeCompiler`] resolves and binds each statement
//! against a [`Catalog`], collecting every error instead of stopping at the
//! first one.

use std::collections::VecDeque;
use std::fmt;

use crate::error::{CompileError, CompileErrors};
use crate::lexer::lex;
use crate::registry::{Catalog, DirectiveFactory, Scope};
use crate::token::{Spanned, Token};
use crate::usage::Arguments;

/// Default maximum number of errors collected before compilation stops.
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// Grammar version written by [`crate::migrate::migrate`].
pub const GRAMMAR_VERSION: &str = "2.0";

/// The tokens of one directive statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGroup {
    pub name: String,
    pub line: u32,
    pub column: u32,
    /// Argument tokens, without the directive name or the terminating `;`.
    pub tokens: Vec<Spanned>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pragma {
    Version(String),
    LoadDirectives(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Directive(TokenGroup),
    Pragma { pragma: Pragma, line: u32 },
}

/// Observer of parsed directive statements, called in source order.
pub trait Visitor {
    fn visit(&mut self, name: &str, group: &TokenGroup);
}

impl<F> Visitor for F
where
    F: FnMut(&str, &TokenGroup),
{
    fn visit(&mut self, name: &str, group: &TokenGroup) {
        self(name, group)
    }
}

pub struct GrammarWalker;

impl GrammarWalker {
    /// Lazily split `text` into statements. Single pass; call again to
    /// restart.
    pub fn statements(text: &str) -> Statements {
        Statements {
            tokens: lex(text),
            pos: 0,
            pending: VecDeque::new(),
        }
    }

    /// Visit every well-formed directive statement. Malformed statements
    /// are skipped and their errors returned together at the end.
    pub fn walk<V: Visitor + ?Sized>(text: &str, visitor: &mut V) -> Result<(), CompileErrors> {
        let mut errors = Vec::new();
        for statement in Self::statements(text) {
            match statement {
                Ok(Statement::Directive(group)) => visitor.visit(&group.name, &group),
                Ok(Statement::Pragma { .. }) => {}
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CompileErrors(errors))
        }
    }
}

/// Iterator returned by [`GrammarWalker::statements`].
pub struct Statements {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Further lexical errors from the statement last returned.
    pending: VecDeque<CompileError>,
}

impl Statements {
    fn at_end(&self, i: usize) -> bool {
        self.tokens
            .get(i)
            .map_or(true, |t| t.token == Token::Eof)
    }
}

impl Iterator for Statements {
    type Item = Result<Statement, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.pop_front() {
            return Some(Err(e));
        }
        while !self.at_end(self.pos) && self.tokens[self.pos].token.is_delimiter(';') {
            self.pos += 1;
        }
        if self.at_end(self.pos) {
            return None;
        }

        let start = self.pos;
        let line = self.tokens[start].line;
        let mut end = start;
        while !self.at_end(end)
            && !self.tokens[end].token.is_delimiter(';')
            && self.tokens[end].line == line
        {
            end += 1;
        }
        self.pos = end;
        if !self.at_end(self.pos) && self.tokens[self.pos].token.is_delimiter(';') {
            self.pos += 1;
        }
        let group = &self.tokens[start..end];

        let mut lexical = group.iter().filter_map(|s| match &s.token {
            Token::Error { text, message } => Some(CompileError::lexical(
                s.line,
                s.column,
                s.offset,
                text.clone(),
                message.clone(),
            )),
            _ => None,
        });
        if let Some(first) = lexical.next() {
            self.pending.extend(lexical);
            return Some(Err(first));
        }

        Some(parse_statement(group))
    }
}

fn parse_statement(group: &[Spanned]) -> Result<Statement, CompileError> {
    let head = &group[0];
    match &head.token {
        Token::Identifier(name) => Ok(Statement::Directive(TokenGroup {
            name: name.clone(),
            line: head.line,
            column: head.column,
            tokens: group[1..].to_vec(),
        })),
        Token::Pragma => parse_pragma(head, &group[1..]),
        other => Err(CompileError::parse(
            None,
            head.line,
            head.column,
            format!("expected a directive name, found {} '{}'", other.kind(), other),
        )),
    }
}

fn parse_pragma(head: &Spanned, rest: &[Spanned]) -> Result<Statement, CompileError> {
    let err = |at: &Spanned, message: String| CompileError::parse(None, at.line, at.column, message);
    let pragma = match rest.first().map(|s| &s.token) {
        Some(Token::Identifier(kw)) if kw == "version" => match rest.get(1).map(|s| &s.token) {
            Some(Token::Number(n)) if rest.len() == 2 => Pragma::Version(n.to_string()),
            _ => return Err(err(head, "expected '#pragma version <number>'".to_owned())),
        },
        Some(Token::Identifier(kw)) if kw == "load-directives" => {
            let mut names = Vec::new();
            for s in &rest[1..] {
                match &s.token {
                    Token::Identifier(name) => names.push(name.clone()),
                    Token::Delimiter(',') => {}
                    other => {
                        return Err(err(
                            s,
                            format!("expected a directive name in load-directives, found '{}'", other),
                        ))
                    }
                }
            }
            if names.is_empty() {
                return Err(err(head, "load-directives lists no directives".to_owned()));
            }
            Pragma::LoadDirectives(names)
        }
        Some(other) => return Err(err(&rest[0], format!("unknown pragma '{}'", other))),
        None => return Err(err(head, "empty pragma".to_owned())),
    };
    Ok(Statement::Pragma {
        pragma,
        line: head.line,
    })
}

/// One bound directive invocation.
#[derive(Clone)]
pub struct Invocation {
    pub name: String,
    pub args: Arguments,
    pub line: u32,
    pub column: u32,
    pub scope: Scope,
    pub(crate) factory: DirectiveFactory,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("name", &self.name)
            .field("line", &self.line)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Output of [`RecipeCompiler::compile`]. Immutable and reusable across
/// executions.
#[derive(Debug, Clone)]
pub struct CompiledRecipe {
    pub invocations: Vec<Invocation>,
    /// From `#pragma version`, if present.
    pub version: Option<String>,
    /// From `#pragma load-directives`.
    pub loaded_directives: Vec<String>,
    pub namespace: String,
    /// Registry snapshot version the recipe was resolved against.
    pub registry_version: u64,
}

impl CompiledRecipe {
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }
}

pub struct RecipeCompiler {
    catalog: Catalog,
    max_errors: usize,
}

impl RecipeCompiler {
    pub fn new(catalog: Catalog) -> Self {
        RecipeCompiler {
            catalog,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors.max(1);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn compile(&self, text: &str) -> Result<CompiledRecipe, CompileErrors> {
        let mut recipe = CompiledRecipe {
            invocations: Vec::new(),
            version: None,
            loaded_directives: Vec::new(),
            namespace: self.catalog.namespace().to_owned(),
            registry_version: self.catalog.version(),
        };
        let mut errors = Vec::new();

        for statement in GrammarWalker::statements(text) {
            if errors.len() >= self.max_errors {
                break;
            }
            match statement {
                Err(e) => errors.push(e),
                Ok(Statement::Pragma {
                    pragma: Pragma::Version(v),
                    ..
                }) => recipe.version = Some(v),
                Ok(Statement::Pragma {
                    pragma: Pragma::LoadDirectives(names),
                    line,
                }) => {
                    for name in names {
                        if let Err(e) = self.catalog.resolve(&name) {
                            errors.push(CompileError::parse(Some(&name), line, 1, e.to_string()));
                        } else if !recipe.loaded_directives.contains(&name) {
                            recipe.loaded_directives.push(name);
                        }
                    }
                }
                Ok(Statement::Directive(group)) => match self.bind(&group) {
                    Ok(invocation) => recipe.invocations.push(invocation),
                    Err(e) => errors.push(e),
                },
            }
        }

        if !errors.is_empty() {
            errors.truncate(self.max_errors);
            tracing::debug!(
                namespace = %recipe.namespace,
                errors = errors.len(),
                "recipe failed to compile"
            );
            return Err(CompileErrors(errors));
        }
        tracing::debug!(
            namespace = %recipe.namespace,
            directives = recipe.invocations.len(),
            registry_version = recipe.registry_version,
            "recipe compiled"
        );
        Ok(recipe)
    }

    fn bind(&self, group: &TokenGroup) -> Result<Invocation, CompileError> {
        let Some((info, scope)) = self.catalog.lookup(&group.name) else {
            return Err(CompileError::parse(
                Some(&group.name),
                group.line,
                group.column,
                "unknown directive",
            ));
        };
        let args = info.usage().bind(&group.tokens, group.line, group.column)?;
        Ok(Invocation {
            name: group.name.clone(),
            args,
            line: group.line,
            column: group.column,
            scope,
            factory: info.factory(),
        })
    }
}

/// Visitor recording which referenced directives are user-defined.
pub struct UserDirectivesCollector<'c> {
    catalog: &'c Catalog,
    names: Vec<String>,
}

impl<'c> UserDirectivesCollector<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        UserDirectivesCollector {
            catalog,
            names: Vec::new(),
        }
    }

    /// Names in order of first reference.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `#pragma load-directives a,b;`, or `None` if no user directive was
    /// referenced.
    pub fn pragma(&self) -> Option<String> {
        if self.names.is_empty() {
            None
        } else {
            Some(format!("#pragma load-directives {};", self.names.join(",")))
        }
    }
}

impl Visitor for UserDirectivesCollector<'_> {
    fn visit(&mut self, name: &str, _group: &TokenGroup) {
        if let Some(Scope::User { .. }) = self.catalog.scope_of(name) {
            if !self.names.iter().any(|n| n == name) {
                self.names.push(name.to_owned());
            }
        }
    }
}

/// `#pragma load-directives ...` line, allowing leading whitespace.
fn is_load_directives_pragma(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix("#pragma") else {
        return false;
    };
    if !rest.starts_with(char::is_whitespace) {
        return false;
    }
    let Some(after) = rest.trim_start().strip_prefix("load-directives") else {
        return false;
    };
    after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == ';')
}

fn is_version_pragma(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("#pragma")
        .is_some_and(|rest| rest.trim_start().starts_with("version"))
}

/// Replace any `load-directives` pragmas in `text` with a single one listing
/// the user directives `collector` saw. The pragma goes right after a
/// leading version pragma, or first. Running it again on its own output
/// changes nothing.
pub fn regenerate_pragma(text: &str, collector: &UserDirectivesCollector<'_>) -> String {
    let mut lines: Vec<String> = text
        .lines()
        .filter(|l| !is_load_directives_pragma(l))
        .map(str::to_owned)
        .collect();
    if let Some(pragma) = collector.pragma() {
        let at = usize::from(lines.first().is_some_and(|l| is_version_pragma(l)));
        lines.insert(at, pragma);
    }
    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}
