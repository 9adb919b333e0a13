//! Ingest and query front door over a [`RagStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::chunker::{sanitize_text, ChunkerConfig, TextChunker};
use super::context_builder::{build_context, build_sources};
use super::store::{
    ChunkMetadata, ChunkSearchResult, DocumentRecord, InsertOutcome, RagStore, StoredChunk,
};
use crate::cache::{query_key, QueryCache};
use crate::citation::Source;
use crate::core::errors::ApiError;
use crate::llm::LlmService;

const EMBED_BATCH_SIZE: usize = 32;
const QUERY_EMBEDDING_TTL: Duration = Duration::from_secs(3600);
const QUERY_EMBEDDING_CAPACITY: usize = 512;

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents indexed yet";

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub results: Vec<ChunkSearchResult>,
    pub sources: Vec<Source>,
    pub context: String,
}

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Top `top_k` chunks for `query`. Fails with `NotFound` when nothing at
    /// all has been indexed.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Retrieval, ApiError>;
}

#[derive(Debug, Clone, Default)]
pub struct IngestMetadata {
    /// Generated when absent.
    pub doc_id: Option<String>,
    pub filename: String,
    pub source: String,
    /// Hash of the raw upload. Falls back to a hash of the sanitized text.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub chunk_count: usize,
    /// True when an identical document was already indexed.
    pub reused: bool,
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub struct RetrievalService {
    store: Arc<dyn RagStore>,
    llm: LlmService,
    chunker: TextChunker,
    query_embeddings: QueryCache<Vec<f32>>,
    ingest_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn RagStore>, llm: LlmService, chunker: ChunkerConfig) -> Self {
        Self {
            store,
            llm,
            chunker: TextChunker::new(chunker),
            query_embeddings: QueryCache::new(QUERY_EMBEDDING_TTL, QUERY_EMBEDDING_CAPACITY),
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn deduplicate(&self, content_hash: &str) -> Result<Option<DocumentRecord>, ApiError> {
        self.store.find_by_content_hash(content_hash).await
    }

    /// Chunks, embeds and stores `text`. Identical content is indexed once;
    /// later ingests return the existing document with `reused = true`.
    pub async fn ingest(
        &self,
        text: &str,
        metadata: IngestMetadata,
    ) -> Result<IngestOutcome, ApiError> {
        let sanitized = sanitize_text(text);
        if sanitized.is_empty() {
            return Err(ApiError::BadRequest(
                "Document contains no extractable text".to_string(),
            ));
        }

        let hash = metadata
            .content_hash
            .clone()
            .unwrap_or_else(|| content_hash(sanitized.as_bytes()));

        let lock = self.lock_for(&hash);
        let outcome = {
            let _guard = lock.lock().await;
            self.ingest_locked(&sanitized, &hash, metadata).await
        };
        drop(lock);
        self.release_lock(&hash);
        outcome
    }

    async fn ingest_locked(
        &self,
        sanitized: &str,
        hash: &str,
        metadata: IngestMetadata,
    ) -> Result<IngestOutcome, ApiError> {
        if let Some(existing) = self.deduplicate(hash).await? {
            info!("Document already indexed as {} (hash {})", existing.doc_id, hash);
            return Ok(reused(existing));
        }

        let pieces = self.chunker.split(sanitized);
        let mut embeddings = Vec::with_capacity(pieces.len());
        for batch in pieces.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.llm.embed(batch).await?);
        }

        let doc_id = metadata
            .doc_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let chunk_metadata = ChunkMetadata {
            filename: metadata.filename.clone(),
            source: metadata.source.clone(),
            content_hash: hash.to_string(),
        };

        let chunks: Vec<(StoredChunk, Vec<f32>)> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (content, embedding))| {
                let chunk = StoredChunk {
                    chunk_id: format!("{doc_id}:{chunk_index}"),
                    doc_id: doc_id.clone(),
                    chunk_index,
                    content,
                    metadata: chunk_metadata.clone(),
                };
                (chunk, embedding)
            })
            .collect();
        let chunk_count = chunks.len();

        let document = DocumentRecord {
            doc_id: doc_id.clone(),
            content_hash: hash.to_string(),
            filename: metadata.filename,
            source: metadata.source,
            chunk_count,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        match self.store.insert_document(document, chunks).await? {
            InsertOutcome::Inserted => {
                info!("Indexed document {} with {} chunks", doc_id, chunk_count);
                Ok(IngestOutcome {
                    doc_id,
                    chunk_count,
                    reused: false,
                })
            }
            InsertOutcome::Existing(existing) => {
                debug!("Lost insert race for hash {}, reusing {}", hash, existing.doc_id);
                Ok(reused(existing))
            }
        }
    }

    /// Removes a document and its chunks. Unknown ids are not an error.
    pub async fn delete(&self, doc_id: &str) -> Result<usize, ApiError> {
        let removed = self.store.delete_document(doc_id).await?;
        info!("Deleted document {} ({} chunks)", doc_id, removed);
        Ok(removed)
    }

    /// Stored chunks of one document in `chunk_index` order.
    pub async fn document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>, ApiError> {
        let chunks = self.store.chunks_for_document(doc_id).await?;
        if chunks.is_empty() {
            return Err(ApiError::NotFound(format!("Document not found: {doc_id}")));
        }
        Ok(chunks)
    }

    pub async fn document_count(&self) -> Result<usize, ApiError> {
        self.store.document_count().await
    }

    pub async fn chunk_count(&self) -> Result<usize, ApiError> {
        self.store.count(None).await
    }

    async fn query_embedding(&self, query: &str) -> Result<Vec<f32>, ApiError> {
        let key = query_key(query, &[("purpose", "embedding".to_string())]);
        if let Some(cached) = self.query_embeddings.get(&key) {
            return Ok(cached);
        }
        let embedding = self.llm.embed_one(query).await?;
        self.query_embeddings.insert(key, embedding.clone());
        Ok(embedding)
    }

    fn lock_for(&self, hash: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.ingest_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(hash.to_string()).or_default().clone()
    }

    fn release_lock(&self, hash: &str) {
        let mut locks = self.ingest_locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(hash) {
            // Only the map still holds it.
            if Arc::strong_count(lock) == 1 {
                locks.remove(hash);
            }
        }
    }
}

fn reused(existing: DocumentRecord) -> IngestOutcome {
    IngestOutcome {
        doc_id: existing.doc_id,
        chunk_count: existing.chunk_count,
        reused: true,
    }
}

#[async_trait]
impl DocumentRetriever for RetrievalService {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Retrieval, ApiError> {
        if self.store.count(None).await? == 0 {
            return Err(ApiError::NotFound(NO_DOCUMENTS_MESSAGE.to_string()));
        }

        let embedding = self.query_embedding(query).await?;
        let results = self.store.search(&embedding, top_k, doc_ids).await?;
        debug!("Retrieved {} chunks for query", results.len());

        Ok(Retrieval {
            sources: build_sources(&results, 1),
            context: build_context(&results, 1),
            results,
        })
    }
}
