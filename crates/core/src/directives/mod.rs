//! Built-in directives.

pub mod aggregate;
pub mod columns;
pub mod nulls;
pub mod parse;

use crate::error::RegistryError;
use crate::registry::{DirectiveInfo, DirectiveRegistry};

/// Catalogue entries for every built-in directive.
pub fn builtins() -> Vec<DirectiveInfo> {
    vec![
        DirectiveInfo::new(
            "Aggregates a byte size or time duration column (sum, avg, min, max) \
             and appends the result to every row",
            || Box::new(aggregate::AggregateStats::new()),
        ),
        DirectiveInfo::new("Parses text cells into byte sizes", || {
            Box::new(parse::ParseAs::size())
        }),
        DirectiveInfo::new("Parses text cells into time durations", || {
            Box::new(parse::ParseAs::duration())
        }),
        DirectiveInfo::new(
            "Applies a row policy to rows with null or missing values in the given columns",
            || Box::new(nulls::CheckNulls::new()),
        ),
        DirectiveInfo::new("Removes columns", || Box::new(columns::DropColumns::new())),
        DirectiveInfo::new("Renames a column", || Box::new(columns::Rename::new())),
    ]
}

pub fn register_builtins(registry: &DirectiveRegistry) -> Result<(), RegistryError> {
    for info in builtins() {
        registry.register_system(info)?;
    }
    tracing::debug!(version = registry.version(), "built-in directives registered");
    Ok(())
}

/// A registry holding just the built-ins.
pub fn builtin_registry() -> Result<DirectiveRegistry, RegistryError> {
    let registry = DirectiveRegistry::new();
    register_builtins(&registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_lists_every_builtin() {
        let reg = builtin_registry().unwrap();
        let list = reg.catalog("default").unwrap().list();
        let usages: Vec<&str> = list.iter().map(|d| d.usage.as_str()).collect();
        assert_eq!(
            usages,
            vec![
                "aggregate-stats :column <operation> [:output]",
                "check-nulls :columns[,:columns ...] <policy>",
                "drop :columns[,:columns ...]",
                "parse-as-duration :column [<policy>]",
                "parse-as-size :column [<policy>]",
                "rename :old :new",
            ]
        );
        assert!(list.iter().all(|d| d.scope == "system"));
    }
}
