//! Document and chunk storage.
//!
//! [`InMemoryStore`] keeps documents, chunks and the vector index behind a
//! single `RwLock`, so a write is visible in full or not at all and a read
//! that starts after a write returned sees it.

use crate::filter::SearchFilters;
use crate::types::{Chunk, Document};
use crate::vector_index::{FlatIndex, SimilarityMetric, VectorIndex};
use ragpipe_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Counts reported by [`DocumentStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks that carry an embedding
    pub indexed_chunks: usize,
}

/// Storage for documents and their chunks.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or overwrite a document.
    async fn add_document(&self, document: Document) -> AppResult<()>;

    /// Insert or overwrite chunks. The whole batch is validated before
    /// anything is written.
    async fn add_chunks(&self, chunks: Vec<Chunk>) -> AppResult<()>;

    async fn get_document(&self, id: &str) -> AppResult<Option<Document>>;

    async fn get_chunk(&self, id: &str) -> AppResult<Option<Chunk>>;

    /// Chunks of a document in insertion order; empty for unknown documents.
    async fn get_chunks_by_doc_id(&self, document_id: &str) -> AppResult<Vec<Chunk>>;

    /// Like [`get_document`](Self::get_document), failing when absent.
    async fn fetch_document(&self, id: &str) -> AppResult<Document> {
        self.get_document(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("document '{}'", id)))
    }

    /// Like [`get_chunk`](Self::get_chunk), failing when absent.
    async fn fetch_chunk(&self, id: &str) -> AppResult<Chunk> {
        self.get_chunk(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chunk '{}'", id)))
    }

    /// Remove a document and all of its chunks. Returns whether it existed.
    async fn delete_document(&self, id: &str) -> AppResult<bool>;

    /// All chunks passing `filters`, in insertion order.
    async fn scan_chunks(&self, filters: Option<&SearchFilters>) -> AppResult<Vec<Chunk>>;

    async fn stats(&self) -> AppResult<StoreStats>;
}

/// A document store that can also rank chunks by embedding similarity.
#[async_trait::async_trait]
pub trait VectorStore: DocumentStore {
    /// Embedding dimension accepted by this store.
    fn dimension(&self) -> usize;

    fn metric(&self) -> SimilarityMetric;

    /// Top-k chunks with scores, descending, ties in insertion order.
    async fn search_scored(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filters: Option<&SearchFilters>,
    ) -> AppResult<Vec<(Chunk, f32)>>;

    /// Top-k chunks most similar to `query_embedding`.
    async fn search_similar_chunks(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filters: Option<&SearchFilters>,
    ) -> AppResult<Vec<Chunk>> {
        let scored = self.search_scored(query_embedding, top_k, filters).await?;
        Ok(scored.into_iter().map(|(chunk, _)| chunk).collect())
    }

    /// Store `document` with exactly `chunks`, dropping chunks of any previous
    /// version, as one atomic write.
    async fn replace_document(&self, document: Document, chunks: Vec<Chunk>) -> AppResult<()>;
}

#[derive(Debug)]
struct ChunkEntry {
    chunk: Chunk,
    /// Insertion sequence; kept when the chunk is overwritten
    seq: u64,
}

struct StoreState {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, ChunkEntry>,
    next_seq: u64,
    index: Box<dyn VectorIndex>,
}

impl StoreState {
    fn check_embedding(&self, chunk: &Chunk) -> AppResult<()> {
        if let Some(embedding) = &chunk.embedding {
            if embedding.len() != self.index.dimension() {
                return Err(AppError::DimensionMismatch {
                    expected: self.index.dimension(),
                    actual: embedding.len(),
                });
            }
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(AppError::InvalidInput(format!(
                    "embedding of chunk '{}' has non-finite values",
                    chunk.id
                )));
            }
        }
        Ok(())
    }

    /// Write a chunk that has already been validated.
    fn put_chunk(&mut self, chunk: Chunk) -> AppResult<()> {
        match &chunk.embedding {
            Some(embedding) => self.index.upsert(&chunk.id, embedding.clone())?,
            None => {
                self.index.remove(&chunk.id);
            }
        }

        let seq = match self.chunks.get(&chunk.id) {
            Some(existing) => existing.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };

        self.chunks.insert(chunk.id.clone(), ChunkEntry { chunk, seq });
        Ok(())
    }

    fn remove_chunk(&mut self, id: &str) {
        self.index.remove(id);
        self.chunks.remove(id);
    }

    /// Entries sorted by insertion sequence.
    fn ordered<'a>(&'a self, keep: impl Fn(&Chunk) -> bool) -> Vec<&'a ChunkEntry> {
        let mut entries: Vec<&ChunkEntry> =
            self.chunks.values().filter(|e| keep(&e.chunk)).collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    fn chunk_ids_of(&self, document_id: &str) -> Vec<String> {
        self.chunks
            .values()
            .filter(|e| e.chunk.document_id == document_id)
            .map(|e| e.chunk.id.clone())
            .collect()
    }
}

/// Process-lifetime store backed by hash maps and a vector index.
pub struct InMemoryStore {
    dimension: usize,
    metric: SimilarityMetric,
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Create a store with a [`FlatIndex`] of the given shape.
    pub fn new(dimension: usize, metric: SimilarityMetric) -> AppResult<Self> {
        let index = FlatIndex::new(dimension, metric)?;
        Ok(Self::with_index(Box::new(index)))
    }

    /// Create a store around an existing (empty) index.
    pub fn with_index(index: Box<dyn VectorIndex>) -> Self {
        Self {
            dimension: index.dimension(),
            metric: index.metric(),
            state: RwLock::new(StoreState {
                documents: HashMap::new(),
                chunks: HashMap::new(),
                next_seq: 0,
                index,
            }),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn add_document(&self, document: Document) -> AppResult<()> {
        let mut state = self.state.write().await;
        tracing::debug!("Storing document '{}'", document.id);
        state.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn add_chunks(&self, chunks: Vec<Chunk>) -> AppResult<()> {
        let mut state = self.state.write().await;

        for chunk in &chunks {
            if !state.documents.contains_key(&chunk.document_id) {
                return Err(AppError::NotFound(format!(
                    "document '{}' for chunk '{}'",
                    chunk.document_id, chunk.id
                )));
            }
            state.check_embedding(chunk)?;
        }

        tracing::debug!("Storing {} chunks", chunks.len());
        for chunk in chunks {
            state.put_chunk(chunk)?;
        }
        Ok(())
    }

    async fn get_document(&self, id: &str) -> AppResult<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.get(id).cloned())
    }

    async fn get_chunk(&self, id: &str) -> AppResult<Option<Chunk>> {
        let state = self.state.read().await;
        Ok(state.chunks.get(id).map(|e| e.chunk.clone()))
    }

    async fn get_chunks_by_doc_id(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        let state = self.state.read().await;
        Ok(state
            .ordered(|c| c.document_id == document_id)
            .into_iter()
            .map(|e| e.chunk.clone())
            .collect())
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.documents.remove(id).is_none() {
            return Ok(false);
        }

        let chunk_ids = state.chunk_ids_of(id);
        for chunk_id in &chunk_ids {
            state.remove_chunk(chunk_id);
        }

        tracing::debug!("Deleted document '{}' ({} chunks)", id, chunk_ids.len());
        Ok(true)
    }

    async fn scan_chunks(&self, filters: Option<&SearchFilters>) -> AppResult<Vec<Chunk>> {
        let state = self.state.read().await;
        Ok(state
            .ordered(|c| filters.map_or(true, |f| f.matches(c)))
            .into_iter()
            .map(|e| e.chunk.clone())
            .collect())
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats {
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            indexed_chunks: state.index.len(),
        })
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    async fn search_scored(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filters: Option<&SearchFilters>,
    ) -> AppResult<Vec<(Chunk, f32)>> {
        let state = self.state.read().await;

        let accept = |id: &str| match (filters, state.chunks.get(id)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(f), Some(entry)) => f.matches(&entry.chunk),
        };
        let hits = state.index.search(query_embedding, top_k, &accept)?;

        let min_score = filters.and_then(|f| f.min_score);
        Ok(hits
            .into_iter()
            .filter(|(_, score)| min_score.map_or(true, |min| *score >= min))
            .filter_map(|(id, score)| state.chunks.get(&id).map(|e| (e.chunk.clone(), score)))
            .collect())
    }

    async fn replace_document(&self, document: Document, chunks: Vec<Chunk>) -> AppResult<()> {
        let mut state = self.state.write().await;

        for chunk in &chunks {
            if chunk.document_id != document.id {
                return Err(AppError::InvalidInput(format!(
                    "chunk '{}' belongs to '{}', not '{}'",
                    chunk.id, chunk.document_id, document.id
                )));
            }
            state.check_embedding(chunk)?;
        }

        let keep: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = state
            .chunk_ids_of(&document.id)
            .into_iter()
            .filter(|id| !keep.contains(id.as_str()))
            .collect();
        for id in &stale {
            state.remove_chunk(id);
        }

        tracing::debug!(
            "Replacing document '{}' with {} chunks ({} stale removed)",
            document.id,
            chunks.len(),
            stale.len()
        );

        state.documents.insert(document.id.clone(), document);
        for chunk in chunks {
            state.put_chunk(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSource, Metadata};

    fn store() -> InMemoryStore {
        InMemoryStore::new(2, SimilarityMetric::Cosine).unwrap()
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::new(id, content, DataSource::Text)
    }

    fn chunk(id: &str, document_id: &str, embedding: [f32; 2]) -> Chunk {
        Chunk::new(id, document_id, format!("chunk {}", id)).with_embedding(embedding.to_vec())
    }

    #[tokio::test]
    async fn test_document_round_trip() {
        let store = store();
        store.add_document(doc("D1", "The sky is blue.")).await.unwrap();

        let fetched = store.get_document("D1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "The sky is blue.");
        assert!(store.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = store();
        assert!(matches!(
            store.fetch_document("nope").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.fetch_chunk("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_orphan_chunks_rejected_atomically() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();

        let result = store
            .add_chunks(vec![chunk("a", "D1", [1.0, 0.0]), chunk("b", "ghost", [0.0, 1.0])])
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.get_chunk("a").await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();

        let bad = Chunk::new("a", "D1", "x").with_embedding(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            store.add_chunks(vec![bad]).await,
            Err(AppError::DimensionMismatch { expected: 2, actual: 3 })
        ));

        let nan = Chunk::new("a", "D1", "x").with_embedding(vec![f32::NAN, 0.0]);
        assert!(matches!(
            store.add_chunks(vec![nan]).await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(store.stats().await.unwrap().chunks, 0);
    }

    #[tokio::test]
    async fn test_chunks_by_doc_in_insertion_order() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();
        store.add_document(doc("D2", "y")).await.unwrap();
        store
            .add_chunks(vec![
                chunk("z", "D1", [1.0, 0.0]),
                chunk("other", "D2", [1.0, 0.0]),
                chunk("a", "D1", [0.0, 1.0]),
            ])
            .await
            .unwrap();

        let ids: Vec<_> = store
            .get_chunks_by_doc_id("D1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert!(store.get_chunks_by_doc_id("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_overwrite_keeps_slot() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();
        store
            .add_chunks(vec![chunk("first", "D1", [1.0, 0.0]), chunk("second", "D1", [1.0, 0.0])])
            .await
            .unwrap();
        store
            .add_chunks(vec![Chunk::new("first", "D1", "rewritten").with_embedding(vec![1.0, 0.0])])
            .await
            .unwrap();

        let all = store.scan_chunks(None).await.unwrap();
        assert_eq!(all[0].id, "first");
        assert_eq!(all[0].content, "rewritten");

        let hits = store.search_scored(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].0.id, "first");
    }

    #[tokio::test]
    async fn test_chunk_without_embedding_leaves_index() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();
        store.add_chunks(vec![chunk("a", "D1", [1.0, 0.0])]).await.unwrap();
        store.add_chunks(vec![Chunk::new("a", "D1", "plain")]).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.indexed_chunks, 0);
        assert!(store.search_scored(&[1.0, 0.0], 5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_with_filters() {
        let store = store();
        store.add_document(doc("D1", "x")).await.unwrap();
        store.add_document(doc("D2", "y")).await.unwrap();

        let mut tagged = Metadata::new();
        tagged.insert("topic".to_string(), "weather".into());
        store
            .add_chunks(vec![
                chunk("a", "D1", [1.0, 0.0]).with_metadata(tagged),
                chunk("b", "D2", [1.0, 0.1]),
                chunk("c", "D2", [0.0, 1.0]),
            ])
            .await
            .unwrap();

        let by_doc = SearchFilters::new().with_document_ids(vec!["D2".to_string()]);
        let ids: Vec<_> = store
            .search_similar_chunks(&[1.0, 0.0], 5, Some(&by_doc))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);

        let by_meta = SearchFilters::new().with_metadata("topic", "weather");
        let hits = store.search_scored(&[0.0, 1.0], 5, Some(&by_meta)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "a");

        let by_score = SearchFilters::new().with_min_score(0.5);
        let hits = store.search_scored(&[1.0, 0.0], 5, Some(&by_score)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_document_drops_stale_chunks() {
        let store = store();
        store
            .replace_document(
                doc("D1", "v1"),
                vec![chunk("D1-0", "D1", [1.0, 0.0]), chunk("D1-1", "D1", [0.0, 1.0])],
            )
            .await
            .unwrap();
        store
            .replace_document(doc("D1", "v2"), vec![chunk("D1-0", "D1", [0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.fetch_document("D1").await.unwrap().content, "v2");
        assert!(store.get_chunk("D1-1").await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap().indexed_chunks, 1);
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_chunks() {
        let store = store();
        let result = store
            .replace_document(doc("D1", "x"), vec![chunk("c", "D2", [1.0, 0.0])])
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert!(store.get_document("D1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_document() {
        let store = store();
        store
            .replace_document(doc("D1", "x"), vec![chunk("D1-0", "D1", [1.0, 0.0])])
            .await
            .unwrap();

        assert!(store.delete_document("D1").await.unwrap());
        assert!(!store.delete_document("D1").await.unwrap());
        assert_eq!(store.stats().await.unwrap(), StoreStats::default());
    }
}
