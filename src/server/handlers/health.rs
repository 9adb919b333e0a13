use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let llm_healthy = state.llm.health_check().await;
    let documents = state.retrieval.document_count().await?;
    let chunks = state.retrieval.chunk_count().await?;

    let config = match state.config.load_config() {
        Ok(value) => state.config.redact_sensitive_values(&value),
        Err(err) => {
            tracing::warn!("Failed to load config for status: {}", err);
            Value::Null
        }
    };

    Ok(Json(json!({
        "status": "ok",
        "llm": {
            "provider": state.llm.provider_name(),
            "model": state.llm.chat_model(),
            "healthy": llm_healthy
        },
        "documents": documents,
        "chunks": chunks,
        "search_provider": state.search_provider,
        "config": config
    })))
}
