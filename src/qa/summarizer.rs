//! Document summaries: a single pass for short texts, batched map-reduce
//! for long ones.

use tracing::{debug, info, warn};

use super::prompts::{combine_prompt, map_prompt, summary_prompt};
use crate::core::errors::ApiError;
use crate::llm::LlmService;
use crate::rag::chunker::{ChunkerConfig, TextChunker};

pub const DEFAULT_CONTEXT_BUDGET: usize = 12_000;
const BATCH_SIZE: usize = 3;

pub struct Summarizer {
    llm: LlmService,
    context_budget: usize,
    splitter: TextChunker,
}

impl Summarizer {
    pub fn new(llm: LlmService, context_budget: usize) -> Self {
        let piece_size = (context_budget / 3).max(500);
        Self {
            llm,
            context_budget,
            splitter: TextChunker::new(ChunkerConfig {
                chunk_size: piece_size,
                chunk_overlap: piece_size / 10,
            }),
        }
    }

    pub async fn summarize(&self, pages: &[String]) -> Result<String, ApiError> {
        let pages: Vec<&str> = pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if pages.is_empty() {
            return Err(ApiError::BadRequest("No text to summarize".to_string()));
        }

        let total_chars: usize = pages.iter().map(|p| p.chars().count()).sum();
        if total_chars <= self.context_budget {
            info!("Summarizing {} chars in one pass", total_chars);
            let summary = self.llm.generate(&summary_prompt(&pages.join("\n\n"))).await?;
            return Ok(summary.trim().to_string());
        }

        let pieces: Vec<String> = pages
            .iter()
            .flat_map(|page| self.splitter.split(page))
            .collect();
        info!(
            "Summarizing {} chars as {} pieces (map-reduce, batch size {})",
            total_chars,
            pieces.len(),
            BATCH_SIZE
        );

        let mut summaries = Vec::new();
        for (batch_no, batch) in pieces.chunks(BATCH_SIZE).enumerate() {
            debug!("Map batch {}", batch_no + 1);
            for piece in batch {
                match self.llm.generate(&map_prompt(piece)).await {
                    Ok(summary) if !summary.trim().is_empty() => {
                        summaries.push(summary.trim().to_string())
                    }
                    Ok(_) => warn!("Empty summary for a piece, skipping"),
                    Err(err) => warn!("Failed to summarize a piece: {}", err),
                }
            }
        }
        if summaries.is_empty() {
            return Err(ApiError::Internal("Unable to generate summary".to_string()));
        }

        while summaries.len() > BATCH_SIZE {
            debug!("Reducing {} summaries", summaries.len());
            let mut next_level = Vec::new();
            for batch in summaries.chunks(BATCH_SIZE) {
                match self.llm.generate(&combine_prompt(batch)).await {
                    Ok(combined) if !combined.trim().is_empty() => {
                        next_level.push(combined.trim().to_string())
                    }
                    _ => {
                        warn!("Failed to combine a batch, keeping its first summary");
                        next_level.push(batch[0].clone());
                    }
                }
            }
            summaries = next_level;
        }

        if summaries.len() == 1 {
            return Ok(summaries.remove(0));
        }
        match self.llm.generate(&combine_prompt(&summaries)).await {
            Ok(summary) if !summary.trim().is_empty() => Ok(summary.trim().to_string()),
            _ => Ok(summaries.remove(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::service::testing::{scripted_service, ScriptedProvider};

    #[tokio::test]
    async fn short_text_uses_one_call() {
        let (llm, provider) = scripted_service(vec![Ok(" A short summary. ".to_string())]);
        let summary = Summarizer::new(llm, DEFAULT_CONTEXT_BUDGET)
            .summarize(&["Some page text.".to_string()])
            .await
            .unwrap();

        assert_eq!(summary, "A short summary.");
        assert_eq!(provider.prompt_count(), 1);
        assert!(provider.prompts.lock().unwrap()[0].contains("CONCISE SUMMARY:"));
    }

    #[tokio::test]
    async fn long_text_is_mapped_then_reduced() {
        let provider = Arc::new(ScriptedProvider::new(vec![]).with_fallback("partial summary"));
        let llm = LlmService::new(provider.clone(), Default::default());
        let pages: Vec<String> = (0..4).map(|_| "Sentence about rivers. ".repeat(60)).collect();

        let summary = Summarizer::new(llm, 1500).summarize(&pages).await.unwrap();

        assert_eq!(summary, "partial summary");
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts.iter().any(|p| p.contains("BRIEF SUMMARY:")));
        assert!(prompts.iter().any(|p| p.contains("FINAL SUMMARY:")));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let (llm, _) = scripted_service(vec![]);
        assert!(Summarizer::new(llm, 100).summarize(&["  ".to_string()]).await.is_err());
    }
}
