//! Direct access to the agent's tools: retrieval, web search and scraping.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::rag::DocumentRetriever;
use crate::state::AppState;
use crate::tools::{ScrapeMethod, ScrapeRequest, WebSearchOptions};

const MAX_TOP_K: usize = 50;
const MAX_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    pub top_k: Option<usize>,
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(flatten)]
    pub options: WebSearchOptions,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    pub url: String,
    pub css_selector: Option<String>,
    pub extraction_prompt: Option<String>,
    pub method: Option<String>,
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RetrieveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = non_empty_query(&payload.query)?;
    let top_k = payload
        .top_k
        .unwrap_or(state.settings.rag.top_k)
        .clamp(1, MAX_TOP_K);

    let retrieval = state
        .retrieval
        .retrieve(query, top_k, payload.doc_ids.as_deref())
        .await?;
    Ok(Json(retrieval))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = non_empty_query(&payload.query)?;
    let mut options = payload.options;
    options.max_results = options.max_results.clamp(1, MAX_SEARCH_RESULTS);

    let output = state.web_search.web_search(query, &options).await?;
    Ok(Json(output))
}

pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScrapeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let url = reqwest::Url::parse(payload.url.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }

    let preferred = match payload.method.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) if name.eq_ignore_ascii_case("auto") => None,
        Some(name) => Some(
            ScrapeMethod::parse(name)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown scraping method: {name}")))?,
        ),
    };

    let request = ScrapeRequest {
        url: url.to_string(),
        css_selector: payload.css_selector.filter(|s| !s.trim().is_empty()),
        extraction_prompt: payload.extraction_prompt.filter(|s| !s.trim().is_empty()),
        preferred,
    };
    Ok(Json(state.scraper.scrape(request).await))
}

pub(crate) fn non_empty_query(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }
    Ok(trimmed)
}
