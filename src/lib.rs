pub mod cache;
pub mod citation;
pub mod core;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod qa;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
pub mod vector_math;
