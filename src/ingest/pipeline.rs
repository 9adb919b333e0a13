//! Per-file upload flow: validate, hash, dedup, store, extract, index and
//! optionally summarize.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::blob::BlobStore;
use super::extract::TextExtractor;
use super::UploadedFile;
use crate::core::errors::ApiError;
use crate::graph::StepSink;
use crate::qa::Summarizer;
use crate::rag::retrieval::content_hash;
use crate::rag::{IngestMetadata, RetrievalService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Indexed,
    Reused,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub filename: String,
    pub status: UploadStatus,
    pub doc_id: Option<String>,
    pub chunks_indexed: usize,
    pub reused: bool,
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadReport {
    fn failed(filename: &str, err: &ApiError) -> Self {
        Self {
            filename: filename.to_string(),
            status: UploadStatus::Failed,
            doc_id: None,
            chunks_indexed: 0,
            reused: false,
            source: None,
            summary: None,
            error: Some(err.message()),
        }
    }
}

pub struct UploadPipeline {
    retrieval: Arc<RetrievalService>,
    blobs: Arc<dyn BlobStore>,
    extractors: Vec<Arc<dyn TextExtractor>>,
    summarizer: Option<Summarizer>,
    max_upload_bytes: usize,
}

impl UploadPipeline {
    pub fn new(
        retrieval: Arc<RetrievalService>,
        blobs: Arc<dyn BlobStore>,
        extractors: Vec<Arc<dyn TextExtractor>>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            retrieval,
            blobs,
            extractors,
            summarizer: None,
            max_upload_bytes,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Handles files in order. A failed file is reported and the rest are
    /// still processed.
    pub async fn process(&self, files: Vec<UploadedFile>, reporter: &dyn StepSink) -> Vec<UploadReport> {
        let total = files.len();
        let mut reports = Vec::with_capacity(total);

        for (idx, file) in files.into_iter().enumerate() {
            reporter.emit(&format!(
                "📄 Processing file {}/{}: {}",
                idx + 1,
                total,
                file.filename
            ));
            let filename = file.filename.clone();
            match self.process_one(file, reporter).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!("Upload of {} failed: {}", filename, err);
                    reporter.emit(&format!("  ❌ {} failed: {}", filename, err.message()));
                    reports.push(UploadReport::failed(&filename, &err));
                }
            }
        }

        reports
    }

    async fn process_one(
        &self,
        file: UploadedFile,
        reporter: &dyn StepSink,
    ) -> Result<UploadReport, ApiError> {
        self.validate(&file)?;
        let hash = content_hash(&file.bytes);

        if let Some(existing) = self.retrieval.deduplicate(&hash).await? {
            info!(
                "{} matches already indexed document {}",
                file.filename, existing.doc_id
            );
            reporter.emit(&format!("  ♻️ {} already indexed", file.filename));
            return Ok(UploadReport {
                filename: file.filename,
                status: UploadStatus::Reused,
                doc_id: Some(existing.doc_id),
                chunks_indexed: existing.chunk_count,
                reused: true,
                source: Some(existing.source),
                summary: None,
                error: None,
            });
        }

        let extractor = self
            .extractors
            .iter()
            .find(|extractor| extractor.supports(&file))
            .cloned()
            .ok_or_else(|| {
                ApiError::BadRequest(format!("Unsupported file type: {}", file.filename))
            })?;

        reporter.emit("  ⬆️  Uploading...");
        let location = self.blobs.put(&file.filename, &hash, &file.bytes).await?;

        reporter.emit(&format!("  📖 Parsing {}...", extractor.name()));
        let pages = extractor.extract(&file.bytes).await?;
        let texts: Vec<String> = pages.into_iter().map(|page| page.text).collect();

        reporter.emit("  🔢 Indexing...");
        let outcome = self
            .retrieval
            .ingest(
                &texts.join("\n\n"),
                IngestMetadata {
                    doc_id: None,
                    filename: file.filename.clone(),
                    source: location.clone(),
                    content_hash: Some(hash),
                },
            )
            .await?;

        let summary = match &self.summarizer {
            Some(summarizer) if !outcome.reused => {
                reporter.emit("  📝 Summarizing...");
                Some(summarizer.summarize(&texts).await.unwrap_or_else(|err| {
                    warn!("Summary of {} failed: {}", file.filename, err);
                    "Summary failed".to_string()
                }))
            }
            _ => None,
        };

        reporter.emit(&format!("  ✅ {} indexed", file.filename));
        Ok(UploadReport {
            filename: file.filename,
            status: if outcome.reused {
                UploadStatus::Reused
            } else {
                UploadStatus::Indexed
            },
            doc_id: Some(outcome.doc_id),
            chunks_indexed: outcome.chunk_count,
            reused: outcome.reused,
            source: Some(location),
            summary,
            error: None,
        })
    }

    fn validate(&self, file: &UploadedFile) -> Result<(), ApiError> {
        if file.bytes.is_empty() {
            return Err(ApiError::BadRequest(format!("{} is empty", file.filename)));
        }
        if file.bytes.len() > self.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "{} is {} bytes, limit is {}",
                file.filename,
                file.bytes.len(),
                self.max_upload_bytes
            )));
        }
        Ok(())
    }
}
