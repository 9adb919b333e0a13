//! Upload handling: validation, blob storage, text extraction and indexing.

pub mod blob;
pub mod extract;
pub mod pipeline;

pub use blob::{BlobStore, LocalBlobStore};
pub use extract::{default_extractors, ExtractedPage, PdfExtractor, PlainTextExtractor, TextExtractor};
pub use pipeline::{UploadPipeline, UploadReport, UploadStatus};

/// One file as received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }

    /// Lowercased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}
