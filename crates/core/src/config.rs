//! Wrangler configuration, read from TOML.
//!
//! ```toml
//! namespace = "default"
//! max_errors = 10
//!
//! [execution]
//! mode = "local"   # or "remote"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::DEFAULT_MAX_ERRORS;
use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WranglerConfig {
    /// Registry namespace used to resolve user-defined directives.
    pub namespace: String,
    /// Compile errors collected before compilation stops.
    pub max_errors: usize,
    pub execution: ExecutionConfig,
}

impl Default for WranglerConfig {
    fn default() -> Self {
        WranglerConfig {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            max_errors: DEFAULT_MAX_ERRORS,
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Compile and run in-process.
    #[default]
    Local,
    /// Ship the migrated recipe to a task runner.
    Remote,
}

impl WranglerConfig {
    pub fn parse(text: &str) -> Result<WranglerConfig, ConfigError> {
        let config: WranglerConfig = toml::from_str(text)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<WranglerConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            namespace = %config.namespace,
            mode = ?config.execution.mode,
            "configuration loaded"
        );
        Ok(config)
    }
}
