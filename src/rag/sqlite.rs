//! SQLite-backed RAG store.
//!
//! Document and chunk metadata live in two tables; embeddings are stored as
//! little-endian f32 blobs and searched by brute-force cosine similarity.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::store::{
    ChunkMetadata, ChunkSearchResult, DocumentRecord, InsertOutcome, RagStore, StoredChunk,
};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use crate::vector_math::cosine_similarity;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_documents (
                doc_id TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                chunk_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                chunk_id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL REFERENCES rag_documents(doc_id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                UNIQUE(doc_id, chunk_index)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rag_chunks_doc ON rag_chunks(doc_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<StoredChunk, ApiError> {
        let metadata_str: String = row.get("metadata");
        let metadata: ChunkMetadata =
            serde_json::from_str(&metadata_str).map_err(ApiError::internal)?;
        let chunk_index: i64 = row.get("chunk_index");

        Ok(StoredChunk {
            chunk_id: row.get("chunk_id"),
            doc_id: row.get("doc_id"),
            chunk_index: chunk_index.max(0) as usize,
            content: row.get("content"),
            metadata,
        })
    }

    fn row_to_document(row: &SqliteRow) -> DocumentRecord {
        let chunk_count: i64 = row.get("chunk_count");
        DocumentRecord {
            doc_id: row.get("doc_id"),
            content_hash: row.get("content_hash"),
            filename: row.get("filename"),
            source: row.get("source"),
            chunk_count: chunk_count.max(0) as usize,
            created_at: row.get("created_at"),
        }
    }

    fn push_doc_filter(builder: &mut QueryBuilder<'_, Sqlite>, doc_ids: &[String]) {
        builder.push(" WHERE doc_id IN (");
        let mut separated = builder.separated(", ");
        for doc_id in doc_ids {
            separated.push_bind(doc_id.clone());
        }
        separated.push_unseparated(")");
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn find_by_content_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<DocumentRecord>, ApiError> {
        let row = sqlx::query(
            "SELECT doc_id, content_hash, filename, source, chunk_count, created_at
             FROM rag_documents
             WHERE content_hash = ?1",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(Self::row_to_document))
    }

    async fn insert_document(
        &self,
        document: DocumentRecord,
        chunks: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<InsertOutcome, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let inserted = sqlx::query(
            "INSERT INTO rag_documents (doc_id, content_hash, filename, source, chunk_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(content_hash) DO NOTHING",
        )
        .bind(&document.doc_id)
        .bind(&document.content_hash)
        .bind(&document.filename)
        .bind(&document.source)
        .bind(document.chunk_count as i64)
        .bind(&document.created_at)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(ApiError::internal)?;
            return match self.find_by_content_hash(&document.content_hash).await? {
                Some(existing) => Ok(InsertOutcome::Existing(existing)),
                None => Err(ApiError::Internal(format!(
                    "Document {} conflicted but no existing record was found",
                    document.doc_id
                ))),
            };
        }

        for (chunk, embedding) in &chunks {
            let metadata_str = serde_json::to_string(&chunk.metadata).map_err(ApiError::internal)?;
            sqlx::query(
                "INSERT INTO rag_chunks (chunk_id, doc_id, chunk_index, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.doc_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(&metadata_str)
            .bind(Self::serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(InsertOutcome::Inserted)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        doc_ids: Option<&[String]>,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if limit == 0 || matches!(doc_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT chunk_id, doc_id, chunk_index, content, metadata, embedding FROM rag_chunks",
        );
        if let Some(ids) = doc_ids {
            Self::push_doc_filter(&mut builder, ids);
        }
        builder.push(" ORDER BY rowid");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            let stored = Self::deserialize_embedding(&embedding_bytes);
            let score = match cosine_similarity(query_embedding, &stored) {
                Ok(score) => score,
                Err(err) => {
                    tracing::warn!("Skipping chunk with unusable embedding: {}", err);
                    continue;
                }
            };
            scored.push(ChunkSearchResult {
                chunk: Self::row_to_chunk(row)?,
                score,
            });
        }

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let chunks = sqlx::query("DELETE FROM rag_chunks WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM rag_documents WHERE doc_id = ?1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(chunks.rows_affected() as usize)
    }

    async fn count(&self, doc_ids: Option<&[String]>) -> Result<usize, ApiError> {
        if matches!(doc_ids, Some(ids) if ids.is_empty()) {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM rag_chunks");
        if let Some(ids) = doc_ids {
            Self::push_doc_filter(&mut builder, ids);
        }

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count.max(0) as usize)
    }

    async fn document_count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_documents")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count.max(0) as usize)
    }

    async fn chunks_for_document(&self, doc_id: &str) -> Result<Vec<StoredChunk>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, doc_id, chunk_index, content, metadata
             FROM rag_chunks
             WHERE doc_id = ?1
             ORDER BY chunk_index",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(Self::row_to_chunk).collect()
    }
}
