use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::graph::NoopStepSink;
use crate::ingest::UploadedFile;
use crate::state::AppState;

/// Text fields and file parts of a multipart body.
#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

/// Parts with a filename are files; everything else is a text field.
pub(crate) async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.files
                    .push(UploadedFile::new(filename, content_type, bytes.to_vec()));
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_multipart(multipart).await?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest("No files provided".to_string()));
    }

    let reports = state.uploads.process(form.files, &NoopStepSink).await;
    Ok(Json(json!({ "files": reports })))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.retrieval.delete(&doc_id).await?;
    Ok(Json(json!({
        "doc_id": doc_id,
        "deleted": removed > 0,
        "chunks_removed": removed
    })))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.retrieval.document_chunks(&doc_id).await?;
    Ok(Json(json!({
        "doc_id": doc_id,
        "chunk_count": chunks.len(),
        "chunks": chunks
    })))
}
