use std::path::Path;
use std::process;

use wrangler_core::{lex, Token};

use crate::{read_file, OutputFormat};

/// Dumps the lexer output. Exits 1 if the recipe contains error tokens.
pub(crate) fn cmd_tokens(recipe_path: &Path, output: OutputFormat, quiet: bool) {
    let recipe = read_file(recipe_path, "recipe", output, quiet);
    let tokens = lex(&recipe);
    let errors = tokens
        .iter()
        .filter(|s| matches!(s.token, Token::Error { .. }))
        .count();

    match output {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = tokens
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "line": s.line,
                        "column": s.column,
                        "offset": s.offset,
                        "token": s.token.to_json(),
                    })
                })
                .collect();
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if !quiet {
                for s in &tokens {
                    match &s.token {
                        Token::Error { text, message } => println!(
                            "{:>4}:{:<4} {:<14} {:?} ({})",
                            s.line,
                            s.column,
                            s.token.kind().as_str(),
                            text,
                            message
                        ),
                        other => println!(
                            "{:>4}:{:<4} {:<14} {}",
                            s.line,
                            s.column,
                            other.kind().as_str(),
                            other
                        ),
                    }
                }
            }
        }
    }

    if errors > 0 {
        process::exit(1);
    }
}
