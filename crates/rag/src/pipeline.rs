//! Pipeline orchestration: ingestion and query answering.
//!
//! Ingestion chunks a document, embeds every chunk in one batch and swaps
//! the document into the store in a single write. Queries run retrieval and
//! then generation, either all at once or with the answer streamed.

use crate::chunker::{chunk_id, Chunker, TextChunker};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::generator::{AnswerStream, Generator, LlmGenerator};
use crate::retriever::{Retriever, StoreRetriever, DEFAULT_HYBRID_ALPHA};
use crate::store::{InMemoryStore, StoreStats, VectorStore};
use crate::types::{
    Chunk, DataSource, Document, GeneratorContext, GeneratorResponse, Metadata, Query,
    RetrievalMode, RetrieverResult, DEFAULT_TOP_K,
};
use crate::vector_index::SimilarityMetric;
use futures::TryStreamExt;
use ragpipe_core::config::{ChunkingSettings, EmbeddingSettings};
use ragpipe_core::{AppConfig, AppError, AppResult};
use ragpipe_llm::ExtractiveClient;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

/// Hex characters of the content hash used in generated document ids.
const CONTENT_ID_LEN: usize = 16;

/// Model name used when no generator is configured.
const DEFAULT_MODEL: &str = "extractive-v1";

/// Derive a document id from its content.
pub fn content_id(content: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    format!("doc-{}", &digest[..CONTENT_ID_LEN])
}

/// A document to ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Defaults to a content hash, so identical content maps to one document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub content: String,

    #[serde(default)]
    pub source: DataSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,

    /// Copied onto every chunk as well as the document. On chunks, the
    /// `position`, `start` and `end` keys are always set by ingestion and
    /// replace any supplied values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl IngestRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Outcome of one ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub document_id: String,
    pub chunk_ids: Vec<String>,
    /// Content length in bytes
    pub bytes: usize,
    pub duration_ms: u64,
}

/// Retrieved context plus the answer as a stream.
pub struct QueryStream {
    pub query_id: String,
    pub retrieved: RetrieverResult,
    pub answer: AnswerStream,
}

impl QueryStream {
    /// Chunk ids handed to the generator, in retrieval order.
    pub fn context_used(&self) -> Vec<String> {
        self.retrieved.chunk_ids()
    }

    /// Drain the stream into a complete response.
    pub async fn collect(self) -> AppResult<GeneratorResponse> {
        let context_used = self.retrieved.chunk_ids();
        let fragments: Vec<String> = self.answer.try_collect().await?;
        Ok(GeneratorResponse {
            query_id: self.query_id,
            answer: fragments.concat(),
            context_used,
        })
    }
}

/// The assembled pipeline. Cheap to share behind an `Arc`.
pub struct RagPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    default_mode: RetrievalMode,
    default_top_k: usize,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Assemble a pipeline from validated configuration.
    pub fn from_settings(config: &AppConfig) -> AppResult<Self> {
        let embedding = &config.embedding;
        let metric = SimilarityMetric::parse(&embedding.metric).ok_or_else(|| {
            AppError::Config(format!("Unknown similarity metric: '{}'", embedding.metric))
        })?;
        let mode = RetrievalMode::parse(&config.retrieval.mode).ok_or_else(|| {
            AppError::Config(format!("Unknown retrieval mode: '{}'", config.retrieval.mode))
        })?;

        let embedder = create_provider(embedding)?;
        let store: Arc<dyn VectorStore> =
            Arc::new(InMemoryStore::new(embedding.dimensions, metric)?);

        tracing::debug!(
            "Building pipeline: embedder={} ({} dims, {}), llm={} ({}), mode={}",
            embedding.provider,
            embedding.dimensions,
            metric.as_str(),
            config.generation.provider,
            config.generation.model,
            mode.as_str()
        );

        Self::builder()
            .store(store)
            .embedder(embedder)
            .chunker(Arc::new(TextChunker::from_settings(&config.chunking)?))
            .generator(Arc::new(LlmGenerator::from_settings(&config.generation)?))
            .hybrid_alpha(config.retrieval.hybrid_alpha)
            .default_mode(mode)
            .default_top_k(config.retrieval.top_k)
            .build()
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn default_mode(&self) -> RetrievalMode {
        self.default_mode
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub async fn stats(&self) -> AppResult<StoreStats> {
        self.store.stats().await
    }

    /// Chunk, embed and store a document, replacing any previous version.
    pub async fn ingest(&self, request: IngestRequest) -> AppResult<IngestSummary> {
        let started = Instant::now();
        let document_id = request
            .id
            .clone()
            .unwrap_or_else(|| content_id(&request.content));

        if document_id.trim().is_empty() {
            return Err(AppError::InvalidInput("document id is empty".to_string()));
        }

        let spans = self.chunker.chunk(&request.content)?;
        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();

        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed_batch(&texts)
                .await
                .map_err(AppError::into_embedding_unavailable)?
        };

        if embeddings.len() != spans.len() {
            return Err(AppError::EmbeddingUnavailable(format!(
                "{} embeddings returned for {} chunks",
                embeddings.len(),
                spans.len()
            )));
        }

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(position, (span, embedding))| {
                let mut metadata = request.metadata.clone().unwrap_or_default();
                metadata.insert("position".to_string(), (position as i64).into());
                metadata.insert("start".to_string(), (span.start as i64).into());
                metadata.insert("end".to_string(), (span.end as i64).into());

                Chunk::new(chunk_id(&document_id, position), document_id.clone(), span.text)
                    .with_embedding(embedding)
                    .with_metadata(metadata)
            })
            .collect();
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();

        let bytes = request.content.len();
        let mut document = Document::new(document_id.clone(), request.content, request.source);
        if let Some(uri) = request.source_uri {
            document = document.with_source_uri(uri);
        }
        if let Some(metadata) = request.metadata {
            document = document.with_metadata(metadata);
        }

        self.store.replace_document(document, chunks).await?;

        let summary = IngestSummary {
            document_id,
            chunk_ids,
            bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Ingested document '{}': {} chunks, {} bytes in {}ms",
            summary.document_id,
            summary.chunk_ids.len(),
            summary.bytes,
            summary.duration_ms
        );

        Ok(summary)
    }

    /// A query using this pipeline's default mode and top-k.
    pub fn new_query(&self, text: impl Into<String>) -> Query {
        Query::new(text)
            .with_mode(self.default_mode)
            .with_top_k(self.default_top_k)
    }

    /// Answer `text` in one piece.
    pub async fn query(
        &self,
        text: &str,
        mode: RetrievalMode,
        top_k: usize,
    ) -> AppResult<GeneratorResponse> {
        let query = Query::new(text).with_mode(mode).with_top_k(top_k);
        self.run_query(query).await
    }

    /// Retrieve, then generate.
    pub async fn run_query(&self, query: Query) -> AppResult<GeneratorResponse> {
        let context = self.retrieve_context(query).await?;
        let response = self.generator.generate(&context).await?;

        tracing::info!(
            "Answered query {} using {} chunks",
            response.query_id,
            response.context_used.len()
        );
        Ok(response)
    }

    /// Answer `text` with the answer streamed.
    pub async fn query_stream(
        &self,
        text: &str,
        mode: RetrievalMode,
        top_k: usize,
    ) -> AppResult<QueryStream> {
        let query = Query::new(text).with_mode(mode).with_top_k(top_k);
        self.run_query_stream(query).await
    }

    pub async fn run_query_stream(&self, query: Query) -> AppResult<QueryStream> {
        let context = self.retrieve_context(query).await?;
        let answer = self.generator.stream_generate(&context).await?;

        Ok(QueryStream {
            query_id: context.query.id,
            retrieved: context.retrieved_context,
            answer,
        })
    }

    async fn retrieve_context(&self, query: Query) -> AppResult<GeneratorContext> {
        tracing::info!(
            "Running query {} (mode: {}, top_k: {})",
            query.id,
            query.mode.as_str(),
            query.top_k
        );

        let retrieved = self.retriever.retrieve(&query).await?;
        Ok(GeneratorContext::new(query, retrieved))
    }
}

/// Builder for [`RagPipeline`]. Every component has an offline default.
#[derive(Default)]
pub struct RagPipelineBuilder {
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<Arc<dyn Generator>>,
    hybrid_alpha: Option<f32>,
    default_mode: Option<RetrievalMode>,
    default_top_k: Option<usize>,
}

impl RagPipelineBuilder {
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Use a custom retriever instead of a [`StoreRetriever`] over the store.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn hybrid_alpha(mut self, alpha: f32) -> Self {
        self.hybrid_alpha = Some(alpha);
        self
    }

    pub fn default_mode(mut self, mode: RetrievalMode) -> Self {
        self.default_mode = Some(mode);
        self
    }

    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = Some(top_k);
        self
    }

    pub fn build(self) -> AppResult<RagPipeline> {
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => create_provider(&EmbeddingSettings::default())?,
        };

        let store: Arc<dyn VectorStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new(
                embedder.dimensions(),
                SimilarityMetric::default(),
            )?),
        };

        if store.dimension() != embedder.dimensions() {
            return Err(AppError::Config(format!(
                "Store dimension {} does not match embedder '{}' ({} dimensions)",
                store.dimension(),
                embedder.provider_name(),
                embedder.dimensions()
            )));
        }

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(TextChunker::from_settings(&ChunkingSettings::default())?),
        };

        let retriever: Arc<dyn Retriever> = match self.retriever {
            Some(retriever) => retriever,
            None => Arc::new(
                StoreRetriever::new(Arc::clone(&store), Arc::clone(&embedder))?
                    .with_hybrid_alpha(self.hybrid_alpha.unwrap_or(DEFAULT_HYBRID_ALPHA)),
            ),
        };

        let generator: Arc<dyn Generator> = match self.generator {
            Some(generator) => generator,
            None => Arc::new(LlmGenerator::new(
                Arc::new(ExtractiveClient::new()),
                DEFAULT_MODEL,
            )?),
        };

        let default_top_k = self.default_top_k.unwrap_or(DEFAULT_TOP_K);
        if default_top_k == 0 {
            return Err(AppError::Config(
                "Default top_k must be greater than zero".to_string(),
            ));
        }

        Ok(RagPipeline {
            store,
            embedder,
            chunker,
            retriever,
            generator,
            default_mode: self.default_mode.unwrap_or_default(),
            default_top_k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;

    fn trigram_pipeline(dimensions: usize) -> AppResult<RagPipeline> {
        RagPipeline::builder()
            .embedder(Arc::new(TrigramProvider::new(dimensions)))
            .build()
    }

    #[test]
    fn test_content_id_is_stable() {
        let a = content_id("The sky is blue.");
        assert_eq!(a, content_id("The sky is blue."));
        assert_ne!(a, content_id("The sky is grey."));
        assert!(a.starts_with("doc-"));
        assert_eq!(a.len(), 4 + CONTENT_ID_LEN);
    }

    #[tokio::test]
    async fn test_ingest_assigns_positional_chunk_ids() {
        let pipeline = trigram_pipeline(64).unwrap();
        let summary = pipeline
            .ingest(IngestRequest::new("The sky is blue.").with_id("D1"))
            .await
            .unwrap();

        assert_eq!(summary.document_id, "D1");
        assert_eq!(summary.chunk_ids, vec!["D1-0"]);
        assert_eq!(summary.bytes, 16);

        let chunk = pipeline.store().fetch_chunk("D1-0").await.unwrap();
        assert_eq!(chunk.content, "The sky is blue.");
        assert_eq!(chunk.embedding.as_ref().map(Vec::len), Some(64));
        assert_eq!(
            chunk.metadata_value("position"),
            Some(&crate::types::MetadataValue::Integer(0))
        );
    }

    #[tokio::test]
    async fn test_span_keys_win_over_supplied_metadata() {
        use crate::types::MetadataValue;

        let pipeline = trigram_pipeline(64).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("position".to_string(), "custom".into());
        metadata.insert("lang".to_string(), "en".into());
        pipeline
            .ingest(IngestRequest::new("The sky is blue.").with_id("D1").with_metadata(metadata))
            .await
            .unwrap();

        let chunk = pipeline.store().fetch_chunk("D1-0").await.unwrap();
        assert_eq!(chunk.metadata_value("position"), Some(&MetadataValue::Integer(0)));
        assert_eq!(chunk.metadata_value("end"), Some(&MetadataValue::Integer(16)));
        assert_eq!(chunk.metadata_value("lang"), Some(&MetadataValue::Text("en".to_string())));

        let document = pipeline.store().fetch_document("D1").await.unwrap();
        assert_eq!(
            document.metadata.unwrap().get("position"),
            Some(&MetadataValue::Text("custom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_reingesting_same_content_is_idempotent() {
        let pipeline = trigram_pipeline(64).unwrap();
        let first = pipeline.ingest(IngestRequest::new("Same text.")).await.unwrap();
        let second = pipeline.ingest(IngestRequest::new("Same text.")).await.unwrap();

        assert_eq!(first.document_id, second.document_id);
        let stats = pipeline.stats().await.unwrap();
        assert_eq!((stats.documents, stats.chunks), (1, 1));
    }

    #[tokio::test]
    async fn test_empty_document_has_no_chunks() {
        let pipeline = trigram_pipeline(64).unwrap();
        let summary = pipeline
            .ingest(IngestRequest::new("").with_id("blank"))
            .await
            .unwrap();

        assert!(summary.chunk_ids.is_empty());
        assert!(pipeline.store().get_document("blank").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_builder_rejects_mismatched_store() {
        let store = Arc::new(InMemoryStore::new(8, SimilarityMetric::Cosine).unwrap());
        let result = RagPipeline::builder()
            .store(store)
            .embedder(Arc::new(TrigramProvider::new(16)))
            .build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_settings_uses_configured_defaults() {
        let mut config = AppConfig::default();
        config.embedding.dimensions = 32;
        config.retrieval.mode = "naive".to_string();
        config.retrieval.top_k = 2;

        let pipeline = RagPipeline::from_settings(&config).unwrap();
        assert_eq!(pipeline.store().dimension(), 32);

        let query = pipeline.new_query("sky");
        assert_eq!(query.mode, RetrievalMode::Naive);
        assert_eq!(query.top_k, 2);
    }
}
