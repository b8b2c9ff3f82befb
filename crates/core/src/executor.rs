//! Recipe executors.
//!
//! [`LocalExecutor`] compiles against the registry and runs the pipeline
//! in-process. [`RemoteExecutor`] migrates the recipe and hands it, with the
//! row batch, to a [`TaskRunner`] that executes it elsewhere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::{GrammarWalker, RecipeCompiler, Statement, TokenGroup, DEFAULT_MAX_ERRORS};
use crate::config::{ExecutionMode, WranglerConfig, DEFAULT_NAMESPACE};
use crate::directive::ErrorRecord;
use crate::error::WranglerError;
use crate::migrate::migrate;
use crate::pipeline::PipelineOutput;
use crate::registry::{DirectiveRegistry, Scope};
use crate::row::{rows_from_json, rows_to_json, Row};

pub trait RecipeExecutor {
    fn execute(&self, recipe: &str, rows: Vec<Row>) -> Result<PipelineOutput, WranglerError>;
}

/// Build the executor selected by `config.execution.mode`. Remote mode
/// uses a [`LoopbackRunner`].
pub fn from_config(
    registry: Arc<DirectiveRegistry>,
    config: &WranglerConfig,
) -> Box<dyn RecipeExecutor> {
    let local = LocalExecutor::new(Arc::clone(&registry))
        .with_namespace(&config.namespace)
        .with_max_errors(config.max_errors);
    match config.execution.mode {
        ExecutionMode::Local => Box::new(local),
        ExecutionMode::Remote => Box::new(
            RemoteExecutor::new(registry, LoopbackRunner::new(local))
                .with_namespace(&config.namespace),
        ),
    }
}

// ──────────────────────────────────────────────
// Local
// ──────────────────────────────────────────────

#[derive(Clone)]
pub struct LocalExecutor {
    registry: Arc<DirectiveRegistry>,
    namespace: String,
    max_errors: usize,
}

impl LocalExecutor {
    pub fn new(registry: Arc<DirectiveRegistry>) -> Self {
        LocalExecutor {
            registry,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_owned();
        self
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl RecipeExecutor for LocalExecutor {
    fn execute(&self, recipe: &str, rows: Vec<Row>) -> Result<PipelineOutput, WranglerError> {
        self.registry.reload(&self.namespace);
        let catalog = self.registry.catalog(&self.namespace)?;
        let compiled = RecipeCompiler::new(catalog)
            .with_max_errors(self.max_errors)
            .compile(recipe)?;
        tracing::info!(
            namespace = %self.namespace,
            directives = compiled.invocations.len(),
            rows = rows.len(),
            "executing recipe locally"
        );
        let output = compiled.pipeline().run(rows)?;
        Ok(output)
    }
}

// ──────────────────────────────────────────────
// Remote
// ──────────────────────────────────────────────

/// Envelope sent to a [`TaskRunner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDirectiveRequest {
    /// Migrated recipe text.
    pub recipe: String,
    /// System directives the recipe references, in first-use order.
    pub system_directives: Vec<String>,
    pub namespace: String,
    /// Row batch in the JSON row format.
    pub rows: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDirectiveResponse {
    pub rows: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

/// Runs a recipe request somewhere other than the calling thread.
pub trait TaskRunner {
    fn run(&self, request: &RemoteDirectiveRequest) -> Result<RemoteDirectiveResponse, WranglerError>;
}

pub struct RemoteExecutor<R> {
    registry: Arc<DirectiveRegistry>,
    namespace: String,
    runner: R,
}

impl<R: TaskRunner> RemoteExecutor<R> {
    pub fn new(registry: Arc<DirectiveRegistry>, runner: R) -> Self {
        RemoteExecutor {
            registry,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            runner,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_owned();
        self
    }

    /// Migrate `recipe` and build the request for it. `None` when the
    /// recipe holds no statements.
    pub fn prepare(
        &self,
        recipe: &str,
        rows: &[Row],
    ) -> Result<Option<RemoteDirectiveRequest>, WranglerError> {
        self.registry.reload(&self.namespace);
        let catalog = self.registry.catalog(&self.namespace)?;
        let migrated = migrate(recipe, &catalog);

        let has_statements = GrammarWalker::statements(&migrated)
            .any(|s| matches!(s, Ok(Statement::Directive(_)) | Err(_)));
        if !has_statements {
            return Ok(None);
        }

        let mut system_directives: Vec<String> = Vec::new();
        GrammarWalker::walk(&migrated, &mut |name: &str, _group: &TokenGroup| {
            if catalog.scope_of(name) == Some(Scope::System)
                && !system_directives.iter().any(|d| d == name)
            {
                system_directives.push(name.to_owned());
            }
        })?;

        Ok(Some(RemoteDirectiveRequest {
            recipe: migrated,
            system_directives,
            namespace: self.namespace.clone(),
            rows: rows_to_json(rows),
        }))
    }
}

impl<R: TaskRunner> RecipeExecutor for RemoteExecutor<R> {
    fn execute(&self, recipe: &str, rows: Vec<Row>) -> Result<PipelineOutput, WranglerError> {
        let Some(request) = self.prepare(recipe, &rows)? else {
            tracing::debug!("recipe has no statements, returning input rows");
            return Ok(PipelineOutput {
                rows,
                errors: Vec::new(),
            });
        };
        tracing::info!(
            namespace = %request.namespace,
            directives = ?request.system_directives,
            rows = rows.len(),
            "dispatching recipe to task runner"
        );
        let response = self.runner.run(&request)?;
        let rows = rows_from_json(&response.rows)
            .map_err(|e| WranglerError::Remote(format!("undecodable rows: {}", e)))?;
        let errors = response
            .errors
            .iter()
            .map(|e| {
                ErrorRecord::from_json(e)
                    .ok_or_else(|| WranglerError::Remote(format!("undecodable error record: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PipelineOutput { rows, errors })
    }
}

/// In-process [`TaskRunner`]: round-trips the request through its JSON
/// encoding, as a real transport would, then runs it on a
/// [`LocalExecutor`].
pub struct LoopbackRunner {
    executor: LocalExecutor,
}

impl LoopbackRunner {
    pub fn new(executor: LocalExecutor) -> Self {
        LoopbackRunner { executor }
    }
}

impl TaskRunner for LoopbackRunner {
    fn run(&self, request: &RemoteDirectiveRequest) -> Result<RemoteDirectiveResponse, WranglerError> {
        let wire = serde_json::to_string(request).map_err(|e| WranglerError::Remote(e.to_string()))?;
        let request: RemoteDirectiveRequest =
            serde_json::from_str(&wire).map_err(|e| WranglerError::Remote(e.to_string()))?;
        let rows = rows_from_json(&request.rows)?;
        let output = self
            .executor
            .clone()
            .with_namespace(&request.namespace)
            .execute(&request.recipe, rows)?;
        Ok(RemoteDirectiveResponse {
            rows: rows_to_json(&output.rows),
            errors: output.errors.iter().map(ErrorRecord::to_json).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::{builtin_registry, columns::Rename};
    use crate::registry::DirectiveInfo;
    use crate::row::Value;
    use std::cell::RefCell;

    fn registry() -> Arc<DirectiveRegistry> {
        Arc::new(builtin_registry().unwrap())
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new().with("size", "1KB").with("name", "a"),
            Row::new().with("size", "3KB").with("name", Value::Null),
        ]
    }

    /// Records requests and answers with the input rows.
    #[derive(Default)]
    struct Recording {
        seen: RefCell<Vec<RemoteDirectiveRequest>>,
    }

    impl TaskRunner for Recording {
        fn run(
            &self,
            request: &RemoteDirectiveRequest,
        ) -> Result<RemoteDirectiveResponse, WranglerError> {
            self.seen.borrow_mut().push(request.clone());
            Ok(RemoteDirectiveResponse {
                rows: request.rows.clone(),
                errors: Vec::new(),
            })
        }
    }

    #[test]
    fn local_executes_recipe() {
        let exec = LocalExecutor::new(registry());
        let out = exec
            .execute(
                "parse-as-size :size\naggregate-stats :size sum :total",
                rows(),
            )
            .unwrap();
        assert_eq!(out.rows.len(), 2);
        match out.rows[1].get("total") {
            Some(Value::ByteSize(b)) => assert_eq!(b.to_bytes().unwrap(), 4096),
            other => panic!("expected byte size, got {:?}", other),
        }
    }

    #[test]
    fn local_reports_compile_errors() {
        let exec = LocalExecutor::new(registry());
        let err = exec.execute("frobnicate :x", rows()).unwrap_err();
        assert!(matches!(err, WranglerError::Compile(_)));
    }

    #[test]
    fn local_reloads_before_compiling() {
        let reg = registry();
        reg.register_user("ns", DirectiveInfo::new("alias", || Box::new(Rename::named("mv"))))
            .unwrap();
        let exec = LocalExecutor::new(Arc::clone(&reg)).with_namespace("ns");
        let out = exec.execute("mv :name :label", rows()).unwrap();
        assert!(out.rows[0].get("label").is_some());
    }

    #[test]
    fn remote_sends_migrated_recipe_and_system_names() {
        let exec = RemoteExecutor::new(registry(), Recording::default()).with_namespace("ns");
        let out = exec
            .execute("drop name\nparse-as-size size\ndrop size", rows())
            .unwrap();
        assert_eq!(out.rows, rows());

        let seen = exec.runner.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].recipe,
            "#pragma version 2.0;\ndrop :name;\nparse-as-size :size;\ndrop :size;"
        );
        assert_eq!(seen[0].system_directives, vec!["drop", "parse-as-size"]);
        assert_eq!(seen[0].namespace, "ns");
    }

    #[test]
    fn remote_without_statements_returns_input() {
        let exec = RemoteExecutor::new(registry(), Recording::default());
        let out = exec.execute("// only a comment\n\n", rows()).unwrap();
        assert_eq!(out.rows, rows());
        assert!(exec.runner.seen.borrow().is_empty());
    }

    #[test]
    fn loopback_matches_local() {
        let recipe = "check-nulls :name send-to-error-collector\nparse-as-size :size";
        let local = LocalExecutor::new(registry());
        let expected = local.execute(recipe, rows()).unwrap();
        let remote = RemoteExecutor::new(registry(), LoopbackRunner::new(local));
        let actual = remote.execute(recipe, rows()).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual.errors.len(), 1);
    }

    #[test]
    fn config_selects_executor() {
        let mut config = WranglerConfig::default();
        config.execution.mode = ExecutionMode::Remote;
        let exec = from_config(registry(), &config);
        let out = exec.execute("drop :name", rows()).unwrap();
        assert!(out.rows.iter().all(|r| r.get("name").is_none()));
    }
}
