//! Ingest command handler.
//!
//! Chunks and embeds files into a fresh in-memory pipeline and reports what
//! was stored. Nothing is persisted; this is useful for checking how sources
//! will be split before asking questions over them.

use super::sources::ingest_paths;
use clap::Args;
use ragpipe_core::{config::AppConfig, AppResult};
use ragpipe_rag::RagPipeline;
use std::path::PathBuf;

/// Ingest files and report chunking results
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    /// Execute the ingest command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest command options: {:?}", self);

        let pipeline = RagPipeline::from_settings(config)?;
        let summaries = ingest_paths(&pipeline, &self.paths).await?;
        let stats = pipeline.stats().await?;

        if self.json {
            let output = serde_json::json!({
                "documents": summaries,
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        for summary in &summaries {
            println!(
                "{}: {} chunks, {} bytes ({}ms)",
                summary.document_id,
                summary.chunk_ids.len(),
                summary.bytes,
                summary.duration_ms
            );
        }
        println!(
            "\n{} documents, {} chunks ({} embedded)",
            stats.documents, stats.chunks, stats.indexed_chunks
        );

        Ok(())
    }
}
