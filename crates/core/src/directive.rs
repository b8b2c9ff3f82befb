//! The contract every directive implements, and the per-execution context
//! directives report row errors through.

use serde_json::json;
use std::fmt;

use crate::error::DirectiveError;
use crate::row::Row;
use crate::usage::{Arguments, UsageDefinition};

/// A named transformation step.
///
/// Lifecycle: `define` may be called at any time; a fresh instance is
/// created per execution, receives `initialize` once with its bound
/// arguments, then `execute` once per row batch. `destroy` is always called
/// when the execution ends, whether it succeeded or not, and must tolerate
/// being called more than once.
pub trait Directive: Send {
    fn define(&self) -> UsageDefinition;

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError>;

    fn execute(
        &mut self,
        rows: Vec<Row>,
        ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError>;

    fn destroy(&mut self) {}
}

/// What a directive does with a row that fails its per-row check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    /// Drop the row silently.
    Skip,
    /// Abort the whole pipeline on the first offending row.
    FailPipeline,
    /// Divert the row to the error collector and carry on.
    SendToErrorCollector,
}

impl RowPolicy {
    pub const NAMES: [&'static str; 3] = ["skip", "fail-pipeline", "send-to-error-collector"];

    pub fn parse(name: &str) -> Option<RowPolicy> {
        match name.to_ascii_lowercase().as_str() {
            "skip" => Some(RowPolicy::Skip),
            "fail-pipeline" | "error-pipeline" => Some(RowPolicy::FailPipeline),
            "send-to-error-collector" => Some(RowPolicy::SendToErrorCollector),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RowPolicy::Skip => "skip",
            RowPolicy::FailPipeline => "fail-pipeline",
            RowPolicy::SendToErrorCollector => "send-to-error-collector",
        }
    }

    /// Read an optional policy argument, defaulting when it is absent.
    pub fn from_args(
        args: &Arguments,
        name: &str,
        default: RowPolicy,
    ) -> Result<RowPolicy, DirectiveError> {
        match args.text(name) {
            None => Ok(default),
            Some(text) => RowPolicy::parse(text).ok_or_else(|| {
                DirectiveError::InvalidArgument(format!(
                    "unknown row policy '{}'; expected one of: {}",
                    text,
                    RowPolicy::NAMES.join(", ")
                ))
            }),
        }
    }
}

impl fmt::Display for RowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row diverted by the send-to-error-collector policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub directive: String,
    /// Position of the row in the batch the directive received.
    pub row_index: usize,
    pub column: String,
    pub message: String,
    pub row: Row,
}

impl ErrorRecord {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "directive": self.directive,
            "row_index": self.row_index,
            "column": self.column,
            "message": self.message,
            "row": self.row.to_json(),
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Option<ErrorRecord> {
        Some(ErrorRecord {
            directive: value.get("directive")?.as_str()?.to_owned(),
            row_index: usize::try_from(value.get("row_index")?.as_u64()?).ok()?,
            column: value.get("column")?.as_str()?.to_owned(),
            message: value.get("message")?.as_str()?.to_owned(),
            row: Row::from_json(value.get("row")?).ok()?,
        })
    }
}

/// Per-execution state handed to every directive.
#[derive(Debug)]
pub struct ExecutorContext {
    namespace: String,
    directive: String,
    errors: Vec<ErrorRecord>,
}

impl ExecutorContext {
    pub fn new(namespace: impl Into<String>) -> Self {
        ExecutorContext {
            namespace: namespace.into(),
            directive: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the directive currently executing.
    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub(crate) fn enter(&mut self, directive: &str) {
        self.directive = directive.to_owned();
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.errors)
    }

    /// Apply `policy` to a row that failed a check on `column`.
    ///
    /// Skip and send-to-error-collector consume the row and return `Ok`;
    /// the caller must leave it out of its output. Fail-pipeline returns the
    /// escalated error.
    pub fn reject_row(
        &mut self,
        policy: RowPolicy,
        row_index: usize,
        row: Row,
        column: &str,
        message: impl Into<String>,
    ) -> Result<(), DirectiveError> {
        let message = message.into();
        match policy {
            RowPolicy::Skip => {
                tracing::debug!(
                    directive = %self.directive,
                    row = row_index,
                    column,
                    reason = %message,
                    "row skipped"
                );
                Ok(())
            }
            RowPolicy::SendToErrorCollector => {
                tracing::debug!(
                    directive = %self.directive,
                    row = row_index,
                    column,
                    reason = %message,
                    "row sent to error collector"
                );
                self.errors.push(ErrorRecord {
                    directive: self.directive.clone(),
                    row_index,
                    column: column.to_owned(),
                    message,
                    row,
                });
                Ok(())
            }
            RowPolicy::FailPipeline => Err(DirectiveError::Row {
                row: row_index,
                column: column.to_owned(),
                message,
            }),
        }
    }
}

/// Owns a directive instance for one execution and guarantees `destroy`
/// runs exactly once, including on early return or panic unwinding.
pub(crate) struct DirectiveGuard {
    directive: Box<dyn Directive>,
    destroyed: bool,
}

impl DirectiveGuard {
    pub(crate) fn new(directive: Box<dyn Directive>) -> Self {
        DirectiveGuard {
            directive,
            destroyed: false,
        }
    }

    pub(crate) fn get(&mut self) -> &mut dyn Directive {
        self.directive.as_mut()
    }

    pub(crate) fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.directive.destroy();
        }
    }
}

impl Drop for DirectiveGuard {
    fn drop(&mut self) {
        self.destroy();
    }
}
