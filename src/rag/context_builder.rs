//! Turns ranked chunks into a citation-numbered context block and matching
//! source records.

use super::store::ChunkSearchResult;
use crate::citation::Source;

pub const CHUNK_SEPARATOR: &str = "\n----------\n\n";

/// Citation numbers start at `first_index` so several blocks can share one
/// numbering.
pub fn build_context(results: &[ChunkSearchResult], first_index: usize) -> String {
    results
        .iter()
        .enumerate()
        .map(|(offset, result)| {
            format!(
                "Source [{}] | score={:.4}: {}\n{}\n",
                first_index + offset,
                result.score,
                display_name(result),
                result.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

pub fn build_sources(results: &[ChunkSearchResult], first_index: usize) -> Vec<Source> {
    results
        .iter()
        .enumerate()
        .map(|(offset, result)| Source::Document {
            index: first_index + offset,
            id: result.chunk.doc_id.clone(),
            filename: result.chunk.metadata.filename.clone(),
            source: result.chunk.metadata.source.clone(),
            chunk_index: result.chunk.chunk_index,
            score: result.score,
        })
        .collect()
}

fn display_name(result: &ChunkSearchResult) -> &str {
    let metadata = &result.chunk.metadata;
    if !metadata.filename.is_empty() {
        &metadata.filename
    } else if !metadata.source.is_empty() {
        &metadata.source
    } else {
        &result.chunk.doc_id
    }
}
