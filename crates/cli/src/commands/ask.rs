//! Ask command handler.
//!
//! Ingests the given sources, retrieves context for the question and prints
//! the generated answer, streamed by default.

use super::sources::ingest_paths;
use clap::Args;
use futures::StreamExt;
use ragpipe_core::{config::AppConfig, AppError, AppResult};
use ragpipe_rag::{Query, RagPipeline, RetrievalMode};
use std::io::Write;
use std::path::PathBuf;

/// Ask a question over a set of source files
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Files or directories to answer from
    #[arg(short, long = "source", required = true, num_args = 1..)]
    pub sources: Vec<PathBuf>,

    /// Retrieval mode (vector, graph, hybrid, naive)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Maximum number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Disable streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = RagPipeline::from_settings(config)?;
        let summaries = ingest_paths(&pipeline, &self.sources).await?;
        tracing::info!("Loaded {} source documents", summaries.len());

        let query = self.build_query(&pipeline)?;

        if self.is_streaming() {
            self.handle_streaming(&pipeline, query).await
        } else {
            self.handle_non_streaming(&pipeline, query).await
        }
    }

    /// Apply `--mode` and `--top-k` over the configured defaults.
    fn build_query(&self, pipeline: &RagPipeline) -> AppResult<Query> {
        let mut query = pipeline.new_query(self.question.clone());

        if let Some(mode) = &self.mode {
            query.mode = RetrievalMode::parse(mode).ok_or_else(|| {
                AppError::Config(format!(
                    "Unknown retrieval mode: '{}'. Supported modes: vector, graph, hybrid, naive",
                    mode
                ))
            })?;
        }

        if let Some(top_k) = self.top_k {
            query.top_k = top_k;
        }

        Ok(query)
    }

    /// Check if streaming is enabled.
    pub fn is_streaming(&self) -> bool {
        !self.no_stream && !self.json
    }

    /// Handle non-streaming response.
    async fn handle_non_streaming(&self, pipeline: &RagPipeline, query: Query) -> AppResult<()> {
        let mode = query.mode;
        let top_k = query.top_k;
        let response = pipeline.run_query(query).await?;

        if self.json {
            let output = serde_json::json!({
                "queryId": response.query_id,
                "answer": response.answer,
                "contextUsed": response.context_used,
                "mode": mode.as_str(),
                "topK": top_k,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", response.answer);
            print_sources(&response.context_used);
        }

        Ok(())
    }

    /// Handle streaming response.
    async fn handle_streaming(&self, pipeline: &RagPipeline, query: Query) -> AppResult<()> {
        let mut stream = pipeline.run_query_stream(query).await?;
        let mut stdout = std::io::stdout();

        while let Some(fragment) = stream.answer.next().await {
            let fragment = fragment?;
            print!("{}", fragment);
            stdout.flush().ok();
        }

        // Add newline after streaming output
        println!();
        print_sources(&stream.context_used());

        Ok(())
    }
}

fn print_sources(context_used: &[String]) {
    if context_used.is_empty() {
        return;
    }
    println!("\nSources:");
    for id in context_used {
        println!("  - {}", id);
    }
}
