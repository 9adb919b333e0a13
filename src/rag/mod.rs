//! Document retrieval: chunking, storage and similarity search.

pub mod chunker;
pub mod context_builder;
pub mod retrieval;
pub mod sqlite;
pub mod store;

pub use chunker::{ChunkerConfig, TextChunker};
pub use retrieval::{
    DocumentRetriever, IngestMetadata, IngestOutcome, Retrieval, RetrievalService,
    NO_DOCUMENTS_MESSAGE,
};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, DocumentRecord, RagStore, StoredChunk};
