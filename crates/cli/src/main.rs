mod commands;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use wrangler_core::{DirectiveRegistry, WranglerConfig, WranglerError};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Wrangler recipe toolchain.
#[derive(Parser)]
#[command(name = "wrangler", version, about = "Wrangler recipe toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a wrangler.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recipe over a batch of rows
    Run {
        /// Path to the recipe file
        recipe: PathBuf,
        /// Path to a JSON array of row objects
        #[arg(long)]
        rows: PathBuf,
    },

    /// Compile a recipe and report every error
    Check {
        /// Path to the recipe file
        recipe: PathBuf,
    },

    /// Rewrite a legacy recipe into the current grammar
    Migrate {
        /// Path to the recipe file
        recipe: PathBuf,
    },

    /// List the directive catalogue
    Directives,

    /// Print the token stream of a recipe
    Tokens {
        /// Path to the recipe file
        recipe: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.output, cli.quiet);
    tracing::debug!(
        namespace = %config.namespace,
        mode = ?config.execution.mode,
        "wrangler starting"
    );

    match cli.command {
        Commands::Run { recipe, rows } => {
            commands::run::cmd_run(&recipe, &rows, &config, cli.output, cli.quiet);
        }
        Commands::Check { recipe } => {
            commands::check::cmd_check(&recipe, &config, cli.output, cli.quiet);
        }
        Commands::Migrate { recipe } => {
            commands::migrate::cmd_migrate(&recipe, &config, cli.output, cli.quiet);
        }
        Commands::Directives => {
            commands::directives::cmd_directives(&config, cli.output, cli.quiet);
        }
        Commands::Tokens { recipe } => {
            commands::tokens::cmd_tokens(&recipe, cli.output, cli.quiet);
        }
    }
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> WranglerConfig {
    let Some(path) = path else {
        return WranglerConfig::default();
    };
    match WranglerConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Registry holding the built-in directives.
pub(crate) fn registry(output: OutputFormat, quiet: bool) -> Arc<DirectiveRegistry> {
    match wrangler_core::builtin_registry() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            report_error(&format!("internal error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn read_file(path: &Path, what: &str, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error: cannot read {} '{}': {}", what, path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print a library error and exit 1. JSON errors are printed even with
/// `--quiet`, matching the structured-output contract.
pub(crate) fn fail(err: &WranglerError, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&err.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err));
            eprintln!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{}", err);
            }
        }
    }
    process::exit(1);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
