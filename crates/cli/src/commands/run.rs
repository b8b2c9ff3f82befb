use std::path::Path;
use std::process;

use wrangler_core::executor;
use wrangler_core::row::{rows_from_json, rows_to_json};
use wrangler_core::{ErrorRecord, WranglerConfig};

use crate::{fail, read_file, registry, report_error, OutputFormat};

pub(crate) fn cmd_run(
    recipe_path: &Path,
    rows_path: &Path,
    config: &WranglerConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let recipe = read_file(recipe_path, "recipe", output, quiet);
    let rows_src = read_file(rows_path, "rows file", output, quiet);

    let rows_json: serde_json::Value = match serde_json::from_str(&rows_src) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error: invalid JSON in {}: {}", rows_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let rows = rows_from_json(&rows_json).unwrap_or_else(|e| fail(&e, output, quiet));

    let executor = executor::from_config(registry(output, quiet), config);
    let result = executor
        .execute(&recipe, rows)
        .unwrap_or_else(|e| fail(&e, output, quiet));

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "rows": rows_to_json(&result.rows),
                "errors": result.errors.iter().map(ErrorRecord::to_json).collect::<Vec<_>>(),
            });
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for row in &result.rows {
                let cells: Vec<String> = row
                    .columns()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                println!("{}", cells.join(", "));
            }
            println!("{} row(s)", result.rows.len());
            if !result.errors.is_empty() {
                println!("{} row(s) sent to the error collector:", result.errors.len());
                for e in &result.errors {
                    println!(
                        "  {} row {}, column '{}': {}",
                        e.directive, e.row_index, e.column, e.message
                    );
                }
            }
        }
    }
}
