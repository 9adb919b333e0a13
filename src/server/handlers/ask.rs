//! `POST /ask`: runs the agent and streams progress as NDJSON.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::documents::read_multipart;
use super::tools::non_empty_query;
use crate::core::errors::ApiError;
use crate::graph::{AgentRequest, ChannelStepSink, StepSink};
use crate::ingest::{UploadReport, UploadStatus, UploadedFile};
use crate::state::AppState;

const LINE_BUFFER: usize = 64;
const STEP_BUFFER: usize = 256;

pub const INITIAL_PROGRESS: u32 = 5;
const PROGRESS_STEP: u32 = 8;
const MAX_STEP_PROGRESS: u32 = 90;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub doc_ids: Vec<String>,
    pub max_iter: Option<usize>,
}

struct AskInput {
    request: AgentRequest,
    files: Vec<UploadedFile>,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    let input = parse_ask(&state, request).await?;

    let (lines_tx, lines_rx) = mpsc::channel::<String>(LINE_BUFFER);
    tokio::spawn(run_ask(state, input, lines_tx));

    let stream = ReceiverStream::new(lines_rx).map(|line| Ok::<_, Infallible>(line + "\n"));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(ApiError::internal)
}

async fn parse_ask(state: &Arc<AppState>, request: Request) -> Result<AskInput, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let form = read_multipart(multipart).await?;

        let query = non_empty_query(form.fields.get("query").map(String::as_str).unwrap_or(""))?;
        let max_iter = match form.fields.get("max_iter").map(|v| v.trim()) {
            Some(raw) if !raw.is_empty() => Some(
                raw.parse::<usize>()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid max_iter: {raw}")))?,
            ),
            _ => None,
        };
        let doc_ids = form
            .fields
            .get("doc_ids")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        return Ok(AskInput {
            request: AgentRequest {
                query: query.to_string(),
                doc_ids,
                max_iter,
            },
            files: form.files,
        });
    }

    let Json(payload) = Json::<AskRequest>::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = non_empty_query(&payload.query)?;
    Ok(AskInput {
        request: AgentRequest {
            query: query.to_string(),
            doc_ids: payload.doc_ids,
            max_iter: payload.max_iter,
        },
        files: Vec::new(),
    })
}

/// Progress reported with the n-th step (1-based).
pub fn step_progress(n: u32) -> u32 {
    (INITIAL_PROGRESS + PROGRESS_STEP * n).min(MAX_STEP_PROGRESS)
}

async fn send(lines: &mpsc::Sender<String>, value: Value) {
    // A closed receiver means the client went away; the run still finishes
    let _ = lines.send(value.to_string()).await;
}

async fn run_ask(state: Arc<AppState>, input: AskInput, lines: mpsc::Sender<String>) {
    let AskInput { mut request, files } = input;

    send(
        &lines,
        json!({ "step": "🚀 Initializing agent...", "progress": INITIAL_PROGRESS }),
    )
    .await;

    let (sink, mut steps) = ChannelStepSink::channel(STEP_BUFFER);
    let forward_lines = lines.clone();
    let forwarder = tokio::spawn(async move {
        let mut count = 0;
        while let Some(step) = steps.recv().await {
            count += 1;
            send(
                &forward_lines,
                json!({ "step": step, "progress": step_progress(count) }),
            )
            .await;
        }
    });

    let uploaded: Option<Vec<UploadReport>> = if files.is_empty() {
        None
    } else {
        let reports = state.uploads.process(files, &sink).await;
        request.doc_ids.extend(
            reports
                .iter()
                .filter(|report| report.status != UploadStatus::Failed)
                .filter_map(|report| report.doc_id.clone()),
        );
        Some(reports)
    };

    let timeout = state.settings.agent.timeout();
    let run = state.agent.run(request, Some(&sink as &dyn StepSink));
    let outcome = tokio::time::timeout(timeout, run).await;

    // Every step line goes out before the final line
    drop(sink);
    let _ = forwarder.await;

    let final_line = match outcome {
        Ok(Ok(result)) => {
            send(
                &lines,
                json!({
                    "step": format!("✅ Agent completed ({} iterations)", result.iterations),
                    "progress": 100
                }),
            )
            .await;
            let mut line = json!({
                "answer": result.answer,
                "sources": result.sources,
                "verification": result.verification,
                "iterations": result.iterations,
                "steps": result.steps,
                "mode": result.mode,
                "done": true
            });
            if let (Some(reports), Some(object)) = (uploaded, line.as_object_mut()) {
                object.insert("uploaded_files".to_string(), json!(reports));
            }
            line
        }
        Ok(Err(err)) => {
            tracing::error!("Agent run failed: {}", err);
            json!({ "error": err.to_string(), "done": true })
        }
        Err(_) => {
            tracing::error!("Agent run timed out after {:?}", timeout);
            json!({
                "error": format!("Agent timed out after {} seconds", timeout.as_secs()),
                "done": true
            })
        }
    };
    send(&lines, final_line).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_advances_by_eight_and_caps() {
        assert_eq!(step_progress(1), 13);
        assert_eq!(step_progress(2), 21);
        assert_eq!(step_progress(10), 85);
        assert_eq!(step_progress(11), 90);
        assert_eq!(step_progress(50), 90);
    }
}
