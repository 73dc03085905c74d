//! ragpipe CLI
//!
//! Main entry point for the ragpipe command-line tool.
//! Answers questions over local text files with an in-memory RAG pipeline.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand};
use ragpipe_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// ragpipe - retrieval-augmented answers over local files
#[derive(Parser, Debug)]
#[command(name = "ragpipe")]
#[command(about = "Retrieval-augmented answers over local files", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./ragpipe.yaml if present)
    #[arg(short, long, global = true, env = "RAGPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question over source files
    Ask(AskCommand),

    /// Ingest files and report how they were chunked
    Ingest(IngestCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then config file, then environment
    let config = AppConfig::load(cli.config.as_deref())?;

    // Apply CLI overrides
    let config = config.with_overrides(cli.log_level, cli.verbose, cli.no_color, cli.log_json);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    config.validate()?;

    tracing::info!("ragpipe CLI starting");
    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!(
        "Embedding: {} ({} dims), generation: {} ({})",
        config.embedding.provider,
        config.embedding.dimensions,
        config.generation.provider,
        config.generation.model
    );

    // Emit command.start span
    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
    };

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
