//! Runs a compiled recipe over a row batch.

use std::fmt;

use crate::compiler::{CompiledRecipe, Invocation};
use crate::directive::{DirectiveGuard, ErrorRecord, ExecutorContext};
use crate::error::{DirectiveError, ExecutionError};
use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Compiled,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Compiled => "compiled",
            PipelineState::Running => "running",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        })
    }
}

/// Result of a successful run: the output batch plus rows diverted by the
/// send-to-error-collector policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub rows: Vec<Row>,
    pub errors: Vec<ErrorRecord>,
}

/// One execution of a compiled recipe.
///
/// Every directive gets a fresh instance. All of them are initialized
/// before any row is touched, so a bad argument aborts the run with no
/// work done. Directives then execute strictly in recipe order. On any
/// failure the partial output is discarded. Every instantiated directive is
/// destroyed when the run ends, whatever the outcome.
pub struct Pipeline<'r> {
    recipe: &'r CompiledRecipe,
    state: PipelineState,
}

impl CompiledRecipe {
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            recipe: self,
            state: PipelineState::Compiled,
        }
    }
}

impl<'r> Pipeline<'r> {
    /// State after the most recent [`run`](Self::run).
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn run(&mut self, rows: Vec<Row>) -> Result<PipelineOutput, ExecutionError> {
        self.state = PipelineState::Running;
        let result = self.run_inner(rows);
        self.state = match &result {
            Ok(_) => PipelineState::Completed,
            Err(_) => PipelineState::Failed,
        };
        result
    }

    fn run_inner(&self, rows: Vec<Row>) -> Result<PipelineOutput, ExecutionError> {
        let namespace = &self.recipe.namespace;
        let mut ctx = ExecutorContext::new(namespace.as_str());
        let mut stages: Vec<(&Invocation, DirectiveGuard)> =
            Vec::with_capacity(self.recipe.invocations.len());

        for invocation in &self.recipe.invocations {
            let mut guard = DirectiveGuard::new((invocation.factory)());
            if let Err(e) = guard.get().initialize(&invocation.args) {
                let err = match e {
                    DirectiveError::InvalidArgument(message)
                    | DirectiveError::Configuration(message)
                    | DirectiveError::Failed(message) => ExecutionError::Initialize {
                        directive: invocation.name.clone(),
                        line: invocation.line,
                        message,
                    },
                    other => other.into_execution(&invocation.name, invocation.line),
                };
                tracing::warn!(
                    directive = %invocation.name,
                    line = invocation.line,
                    error = %err,
                    "directive failed to initialize"
                );
                return Err(err);
            }
            stages.push((invocation, guard));
        }

        tracing::debug!(
            namespace = %namespace,
            directives = stages.len(),
            rows = rows.len(),
            "pipeline running"
        );
        let mut batch = rows;
        for (invocation, guard) in &mut stages {
            ctx.enter(&invocation.name);
            let input = batch.len();
            batch = guard.get().execute(batch, &mut ctx).map_err(|e| {
                let e = match e {
                    DirectiveError::InvalidArgument(message) => DirectiveError::Failed(message),
                    other => other,
                };
                let err = e.into_execution(&invocation.name, invocation.line);
                tracing::warn!(
                    directive = %invocation.name,
                    line = invocation.line,
                    error = %err,
                    "pipeline aborted"
                );
                err
            })?;
            tracing::trace!(
                directive = %invocation.name,
                rows_in = input,
                rows_out = batch.len(),
                "directive executed"
            );
        }

        for (_, guard) in &mut stages {
            guard.destroy();
        }
        Ok(PipelineOutput {
            rows: batch,
            errors: ctx.take_errors(),
        })
    }
}
