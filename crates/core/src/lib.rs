#![allow(clippy::result_large_err)]
//! wrangler-core: directive-language engine for tabular data wrangling.
//!
//! A recipe is a list of directive invocations, one per statement:
//!
//! ```text
//! #pragma version 2.0;
//! parse-as-size :size skip;
//! aggregate-stats :size sum :total;
//! ```
//!
//! The recipe is lexed, bound against the [`DirectiveRegistry`] by the
//! [`RecipeCompiler`], and run over a batch of [`Row`]s by a [`Pipeline`].
//!
//! # Public API
//!
//! - [`lex()`] -- recipe text to positioned tokens
//! - [`RecipeCompiler`] / [`CompiledRecipe`] -- statement binding with error accumulation
//! - [`GrammarWalker`] -- registry-free statement iteration and visitors
//! - [`migrate()`] -- legacy recipe text to the current grammar
//! - [`LocalExecutor`] / [`RemoteExecutor`] -- one-call recipe execution
//! - [`DirectiveRegistry`] -- system and per-namespace user directives
//! - [`WranglerError`] -- umbrella error type

pub mod compiler;
pub mod config;
pub mod directive;
pub mod directives;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod migrate;
pub mod pipeline;
pub mod registry;
pub mod row;
pub mod token;
pub mod usage;

// ── Convenience re-exports: key types ────────────────────────────────

pub use compiler::{CompiledRecipe, GrammarWalker, RecipeCompiler, Statement, TokenGroup, Visitor};
pub use config::{ExecutionMode, WranglerConfig};
pub use directive::{Directive, ErrorRecord, ExecutorContext, RowPolicy};
pub use error::{
    CompileError, CompileErrors, ConfigError, DirectiveError, ExecutionError, RegistryError,
    TokenError, WranglerError,
};
pub use pipeline::{Pipeline, PipelineOutput, PipelineState};
pub use registry::{Catalog, DirectiveInfo, DirectiveRegistry, Scope};
pub use row::{Row, Value};
pub use token::{ByteSize, ByteUnit, Spanned, TimeDuration, TimeUnit, Token, TokenKind};
pub use usage::{Arguments, UsageDefinition};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use directives::builtin_registry;
pub use executor::{LocalExecutor, RecipeExecutor, RemoteExecutor};
pub use lexer::lex;
pub use migrate::migrate;
