mod commands;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use inbound_pipeline::PipelineConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Inbound proposition pipeline tools.
#[derive(Parser)]
#[command(name = "inbound", version, about = "Inbound proposition pipeline tools")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log filter (overrides the config file; INBOUND_LOG overrides both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to a pipeline config TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a proposition payload and summarize what each store would receive
    Parse {
        /// Path to the payload JSON file
        payload: PathBuf,
        /// Requested surface URI (repeatable)
        #[arg(long = "surface", required = true)]
        surfaces: Vec<String>,
    },

    /// Validate a proposition payload against the JSON Schema
    Validate {
        /// Path to the payload JSON file
        payload: PathBuf,
    },

    /// Replay a scripted request session through the pipeline
    Replay {
        /// Path to the session JSON file
        session: PathBuf,
    },

    /// Inspect or delete the durable proposition cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print the cached in-app propositions
    Show {
        /// Cache directory (defaults to cache_dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Delete the cached in-app propositions
    Clear {
        /// Cache directory (defaults to cache_dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                report_error(&e.to_string(), cli.output, cli.quiet);
                process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    logging::init(&level, config.logging.json);
    tracing::debug!(app_id = %config.app_id, config = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Parse { payload, surfaces } => {
            commands::parse::cmd_parse(&payload, &surfaces, cli.output, cli.quiet);
        }
        Commands::Validate { payload } => {
            commands::validate::cmd_validate(&payload, cli.output, cli.quiet);
        }
        Commands::Replay { session } => {
            commands::replay::cmd_replay(&session, &config, cli.output, cli.quiet);
        }
        Commands::Cache { command } => match command {
            CacheCommands::Show { dir } => {
                let dir = cache_dir(dir, &config, cli.output, cli.quiet);
                commands::cache::cmd_cache_show(&dir, &config, cli.output, cli.quiet);
            }
            CacheCommands::Clear { dir } => {
                let dir = cache_dir(dir, &config, cli.output, cli.quiet);
                commands::cache::cmd_cache_clear(&dir, &config, cli.output, cli.quiet);
            }
        },
    }
}

/// `--dir`, else the configured `cache_dir`, else exit.
fn cache_dir(
    dir: Option<PathBuf>,
    config: &PipelineConfig,
    output: OutputFormat,
    quiet: bool,
) -> PathBuf {
    match dir.or_else(|| config.cache_dir.clone()) {
        Some(d) => d,
        None => {
            report_error(
                "no cache directory: pass --dir or set cache_dir in the config",
                output,
                quiet,
            );
            process::exit(1);
        }
    }
}

/// Report an error message in the appropriate output format.
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
