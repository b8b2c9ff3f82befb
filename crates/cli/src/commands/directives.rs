use wrangler_core::{WranglerConfig, WranglerError};

use crate::{fail, registry, OutputFormat};

pub(crate) fn cmd_directives(config: &WranglerConfig, output: OutputFormat, quiet: bool) {
    let registry = registry(output, quiet);
    registry.reload(&config.namespace);
    let catalog = registry
        .catalog(&config.namespace)
        .unwrap_or_else(|e| fail(&WranglerError::from(e), output, quiet));
    let list = catalog.list();

    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&list)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for d in &list {
                println!("{}", d.usage);
                if !quiet {
                    println!("    {} [{}]", d.description, d.scope);
                }
            }
        }
    }
}
