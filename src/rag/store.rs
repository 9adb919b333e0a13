//! Storage abstraction for indexed documents and their embedded chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// One ingested document. `content_hash` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub content_hash: String,
    pub filename: String,
    pub source: String,
    pub chunk_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub source: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub doc_id: String,
    /// Position of the chunk within its document, starting at 0.
    pub chunk_index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity, higher is better.
    pub score: f32,
}

/// Result of [`RagStore::insert_document`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A document with the same content hash was already indexed; nothing
    /// was written.
    Existing(DocumentRecord),
}

#[async_trait]
pub trait RagStore: Send + Sync {
    async fn find_by_content_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, ApiError>;

    /// Writes the document row and all of its chunks atomically.
    async fn insert_document(
        &self,
        document: DocumentRecord,
        chunks: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<InsertOutcome, ApiError>;

    /// Top `limit` chunks by similarity, optionally restricted to `doc_ids`.
    /// An empty filter slice matches nothing.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    /// Removes a document and its chunks. Returns the number of chunks
    /// removed; unknown ids remove nothing.
    async fn delete_document(&self, doc_id: &str) -> Result<usize, ApiError>;

    /// Chunk count, optionally restricted to `doc_ids`.
    async fn count(&self, doc_ids: Option<&[String]>) -> Result<usize, ApiError>;

    async fn document_count(&self) -> Result<usize, ApiError>;

    async fn chunks_for_document(&self, doc_id: &str) -> Result<Vec<StoredChunk>, ApiError>;
}
