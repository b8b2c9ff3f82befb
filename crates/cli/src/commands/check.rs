use std::path::Path;

use wrangler_core::{RecipeCompiler, WranglerConfig, WranglerError};

use crate::{fail, read_file, registry, OutputFormat};

pub(crate) fn cmd_check(
    recipe_path: &Path,
    config: &WranglerConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let recipe = read_file(recipe_path, "recipe", output, quiet);
    let registry = registry(output, quiet);
    registry.reload(&config.namespace);
    let catalog = registry
        .catalog(&config.namespace)
        .unwrap_or_else(|e| fail(&WranglerError::from(e), output, quiet));

    let compiled = match RecipeCompiler::new(catalog)
        .with_max_errors(config.max_errors)
        .compile(&recipe)
    {
        Ok(c) => c,
        Err(errors) => {
            if output == OutputFormat::Text && !quiet {
                eprintln!(
                    "{}: {} error(s)",
                    recipe_path.display(),
                    errors.errors().len()
                );
            }
            fail(&WranglerError::from(errors), output, quiet);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": true,
                "version": compiled.version,
                "directives": compiled
                    .invocations
                    .iter()
                    .map(|i| serde_json::json!({
                        "name": i.name,
                        "line": i.line,
                        "scope": i.scope.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            println!(
                "ok: {} directive(s), grammar {}",
                compiled.invocations.len(),
                compiled.version.as_deref().unwrap_or("1 (legacy)")
            );
        }
    }
}
