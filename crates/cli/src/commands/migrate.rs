use std::path::Path;

use wrangler_core::migrate::is_current;
use wrangler_core::{migrate, WranglerConfig, WranglerError};

use crate::{fail, read_file, registry, OutputFormat};

/// Prints the migrated recipe to stdout. The input file is left untouched.
pub(crate) fn cmd_migrate(
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

    let changed = !is_current(&recipe);
    let migrated = migrate(&recipe, &catalog);

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "changed": changed,
                "recipe": migrated,
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            print!("{}", migrated);
            if !migrated.ends_with('\n') {
                println!();
            }
            if !changed && !quiet {
                eprintln!("{}: already current", recipe_path.display());
            }
        }
    }
}
