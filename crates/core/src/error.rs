//! Error taxonomy for recipe compilation and execution.
//!
//! Compile-time errors carry source positions and are accumulated so a
//! caller can report every malformed statement at once. Execution errors
//! identify the failing directive and abort the pipeline.

use std::fmt;

/// A token value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Malformed literal text or an unsupported unit.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    /// The canonical value does not fit in 64 bits.
    #[error("value out of range: {0}")]
    Overflow(String),
}

/// A single lexical or parse error with its position in the recipe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Unrecognised character or unterminated literal.
    #[error("line {line}, column {column}: {message}")]
    Lexical {
        line: u32,
        column: u32,
        offset: usize,
        text: String,
        message: String,
    },
    /// Unknown directive, arity or type mismatch while binding arguments.
    #[error("line {line}, column {column}: {}{message}", directive_prefix(.directive))]
    Parse {
        directive: Option<String>,
        line: u32,
        column: u32,
        message: String,
    },
}

fn directive_prefix(directive: &Option<String>) -> String {
    match directive {
        Some(d) => format!("directive '{}': ", d),
        None => String::new(),
    }
}

impl CompileError {
    pub fn lexical(
        line: u32,
        column: u32,
        offset: usize,
        text: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CompileError::Lexical {
            line,
            column,
            offset,
            text: text.into(),
            message: message.into(),
        }
    }

    pub fn parse(
        directive: Option<&str>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        CompileError::Parse {
            directive: directive.map(str::to_owned),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            CompileError::Lexical { line, .. } | CompileError::Parse { line, .. } => *line,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CompileError::Lexical { message, .. } | CompileError::Parse { message, .. } => message,
        }
    }

    /// Serialize to the JSON shape used by `--output json`.
    /// All fields are always present (null when not applicable).
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            CompileError::Lexical {
                line,
                column,
                offset,
                text,
                message,
            } => serde_json::json!({
                "kind":      "lexical",
                "directive": null,
                "line":      line,
                "column":    column,
                "offset":    offset,
                "text":      text,
                "message":   message,
            }),
            CompileError::Parse {
                directive,
                line,
                column,
                message,
            } => serde_json::json!({
                "kind":      "parse",
                "directive": directive,
                "line":      line,
                "column":    column,
                "offset":    null,
                "text":      null,
                "message":   message,
            }),
        }
    }
}

/// Every error collected while compiling one recipe. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::Array(self.0.iter().map(CompileError::to_json_value).collect())
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

impl From<CompileError> for CompileErrors {
    fn from(e: CompileError) -> Self {
        CompileErrors(vec![e])
    }
}

/// Failures raised while a compiled recipe runs over a row batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// `initialize` rejected the bound arguments. Raised before any row is
    /// processed.
    #[error("directive '{directive}' (line {line}) failed to initialize: {message}")]
    Initialize {
        directive: String,
        line: u32,
        message: String,
    },
    /// The directive's preconditions are unmet for this batch as a whole.
    #[error("configuration error in directive '{directive}': {message}")]
    Configuration { directive: String, message: String },
    /// A row error escalated under the fail-pipeline policy.
    #[error("directive '{directive}' failed on row {row}, column '{column}': {message}")]
    RowFatal {
        directive: String,
        column: String,
        row: usize,
        message: String,
    },
    /// Any other failure reported by a directive.
    #[error("directive '{directive}' failed: {message}")]
    Directive { directive: String, message: String },
}

impl ExecutionError {
    pub fn configuration(directive: &str, message: impl Into<String>) -> Self {
        ExecutionError::Configuration {
            directive: directive.to_owned(),
            message: message.into(),
        }
    }

    pub fn directive(directive: &str, message: impl Into<String>) -> Self {
        ExecutionError::Directive {
            directive: directive.to_owned(),
            message: message.into(),
        }
    }

    /// Name of the directive that failed.
    pub fn directive_name(&self) -> &str {
        match self {
            ExecutionError::Initialize { directive, .. }
            | ExecutionError::Configuration { directive, .. }
            | ExecutionError::RowFatal { directive, .. }
            | ExecutionError::Directive { directive, .. } => directive,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ExecutionError::Configuration { .. })
    }
}

/// Error returned by a directive implementation. The pipeline attaches the
/// directive name and source line to produce an [`ExecutionError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    /// Bound arguments are unusable (e.g. an unknown operation name).
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Configuration(String),
    /// A row error escalated by the fail-pipeline policy.
    #[error("row {row}, column '{column}': {message}")]
    Row {
        row: usize,
        column: String,
        message: String,
    },
    #[error("{0}")]
    Failed(String),
}

impl DirectiveError {
    /// Attach the failing directive's identity. `InvalidArgument` maps to an
    /// initialize failure; every other variant is an execution failure.
    pub fn into_execution(self, directive: &str, line: u32) -> ExecutionError {
        let directive = directive.to_owned();
        match self {
            DirectiveError::InvalidArgument(message) => ExecutionError::Initialize {
                directive,
                line,
                message,
            },
            DirectiveError::Configuration(message) => {
                ExecutionError::configuration(&directive, message)
            }
            DirectiveError::Row {
                row,
                column,
                message,
            } => ExecutionError::RowFatal {
                directive,
                column,
                row,
                message,
            },
            DirectiveError::Failed(message) => ExecutionError::directive(&directive, message),
        }
    }
}

/// Registry lookups and registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Directives were registered in this namespace but `reload` was not
    /// called afterwards.
    #[error("registry namespace '{namespace}' has pending changes; reload before compiling")]
    Stale { namespace: String },
    #[error("unknown directive '{name}' in namespace '{namespace}'")]
    UnknownDirective { name: String, namespace: String },
    #[error("directive '{name}' is already registered in scope {scope}")]
    Duplicate { name: String, scope: String },
}

/// Configuration file loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Umbrella error returned by executors and front ends.
#[derive(Debug, thiserror::Error)]
pub enum WranglerError {
    #[error("{0}")]
    Compile(#[from] CompileErrors),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid row batch: {0}")]
    InvalidRows(String),
    /// The remote worker failed or returned an undecodable payload.
    #[error("remote execution failed: {0}")]
    Remote(String),
}

impl WranglerError {
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            WranglerError::Compile(errors) => serde_json::json!({
                "error": "compile",
                "errors": errors.to_json_value(),
            }),
            WranglerError::Execution(e) => serde_json::json!({
                "error": "execution",
                "directive": e.directive_name(),
                "message": e.to_string(),
            }),
            other => serde_json::json!({
                "error": "internal",
                "message": other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_names_directive() {
        let e = CompileError::parse(Some("frobnicate"), 3, 1, "unknown directive");
        assert_eq!(
            e.to_string(),
            "line 3, column 1: directive 'frobnicate': unknown directive"
        );
        assert_eq!(e.line(), 3);
    }

    #[test]
    fn lexical_error_json_has_all_fields() {
        let e = CompileError::lexical(1, 5, 4, "@", "unexpected character '@'");
        let json = e.to_json_value();
        assert_eq!(json["kind"], "lexical");
        assert_eq!(json["offset"], 4);
        assert!(json["directive"].is_null());
    }

    #[test]
    fn compile_errors_display_one_per_line() {
        let errors = CompileErrors(vec![
            CompileError::parse(None, 1, 1, "a"),
            CompileError::parse(None, 2, 1, "b"),
        ]);
        assert_eq!(errors.to_string().lines().count(), 2);
    }
}
