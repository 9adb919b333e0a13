//! Text extraction for uploaded files.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::UploadedFile;
use crate::core::errors::ApiError;

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const TEXT_EXTENSIONS: [&str; 6] = ["txt", "md", "markdown", "csv", "json", "log"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// 1-based.
    pub page: usize,
    pub text: String,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, file: &UploadedFile) -> bool;

    async fn extract(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>, ApiError>;
}

pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supports(&self, file: &UploadedFile) -> bool {
        let by_type = file.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("text/") || ct.contains("application/json")
        });
        let by_extension = file
            .extension()
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()));
        by_type || by_extension
    }

    async fn extract(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>, ApiError> {
        Ok(vec![ExtractedPage {
            page: 1,
            text: String::from_utf8_lossy(bytes).into_owned(),
        }])
    }
}

/// Extracts embedded text. Scanned PDFs without a text layer yield nothing.
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supports(&self, file: &UploadedFile) -> bool {
        file.extension().as_deref() == Some("pdf")
            || file
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
            || file.bytes.starts_with(PDF_SIGNATURE)
    }

    async fn extract(&self, bytes: &[u8]) -> Result<Vec<ExtractedPage>, ApiError> {
        if !bytes.starts_with(PDF_SIGNATURE) {
            return Err(ApiError::BadRequest(
                "File is not a valid PDF (missing %PDF- header)".to_string(),
            ));
        }

        let owned = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(ApiError::internal)?
            .map_err(|e| ApiError::BadRequest(format!("PDF extraction failed: {e}")))?;

        let pages = split_pages(&text);
        debug!("Extracted {} pages from PDF", pages.len());
        Ok(pages)
    }
}

/// Form feeds separate pages; blank pages are dropped.
fn split_pages(text: &str) -> Vec<ExtractedPage> {
    text.split('\u{000C}')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(idx, page)| ExtractedPage {
            page: idx + 1,
            text: page.trim().to_string(),
        })
        .collect()
}

/// PDF first so that a `.pdf` sent as `text/plain` is still parsed.
pub fn default_extractors() -> Vec<Arc<dyn TextExtractor>> {
    vec![Arc::new(PdfExtractor), Arc::new(PlainTextExtractor)]
}
