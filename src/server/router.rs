use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{ask, documents, health, tools};
use crate::state::AppState;

/// Room for several maximum-size files in one multipart request.
const FILES_PER_REQUEST: usize = 5;

/// Creates the application router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    let body_limit = state
        .settings
        .rag
        .max_upload_bytes
        .saturating_mul(FILES_PER_REQUEST);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/ask", post(ask::ask))
        .route("/api/documents", post(documents::upload_documents))
        .route(
            "/api/documents/:doc_id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/retrieve", post(tools::retrieve))
        .route("/api/search", post(tools::search))
        .route("/api/scrape", post(tools::scrape))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let config = match state.config.load_config() {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                "Failed to load config while building CORS layer: {}; using local defaults",
                err
            );
            Value::Null
        }
    };
    let allowed_origins = resolve_allowed_origins(&config)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(config: &Value) -> Vec<String> {
    let origins = config
        .get("server")
        .and_then(|server| server.get("cors_allowed_origins"))
        .and_then(|value| value.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::state::testing::test_state;

    const PASS: &str = r#"{"verdict": "pass", "reasons": "grounded"}"#;
    const BOUNDARY: &str = "ragent-test-boundary";

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (filename, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
                 Content-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn post_multipart(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn ndjson_lines(bytes: &[u8]) -> Vec<Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn status_reports_counts_and_provider() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);

        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["documents"], 0);
        assert_eq!(body["chunks"], 0);
        assert_eq!(body["search_provider"], "canned");
        assert_eq!(body["llm"]["healthy"], true);
    }

    #[tokio::test]
    async fn retrieve_on_empty_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);

        let response = app
            .oneshot(post_json("/api/retrieve", json!({ "query": "anything" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "No documents indexed yet");
    }

    #[tokio::test]
    async fn uploaded_document_is_retrievable_and_deletable() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);
        let notes = "Paris is the capital of France. The Seine flows through Paris.";

        let response = app
            .clone()
            .oneshot(post_multipart(
                "/api/documents",
                multipart_body(&[], &[("notes.txt", notes)]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["files"][0]["status"], "indexed");
        let doc_id = body["files"][0]["doc_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/retrieve",
                json!({ "query": "capital of France", "top_k": 3, "doc_ids": [doc_id] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"][0]["chunk"]["doc_id"], doc_id.as_str());
        assert_eq!(body["sources"][0]["type"], "document");

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/documents/{doc_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["chunks"][0]["chunk_index"], 0);
        assert_eq!(body["chunk_count"], body["chunks"].as_array().unwrap().len());

        for expected in [true, false] {
            let response = app
                .clone()
                .oneshot(
                    Request::delete(format!("/api/documents/{doc_id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["deleted"], expected);
        }

        let response = app
            .oneshot(
                Request::get(format!("/api/documents/{doc_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ask_rejects_empty_query_before_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);

        let response = app
            .oneshot(post_json("/ask", json!({ "query": "   " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ask_streams_steps_then_final_answer() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, vec!["The capital of France is Paris [1].", PASS]).await;
        let app = router(state);

        let response = app
            .oneshot(post_json(
                "/ask",
                json!({ "query": "What is the capital of France?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/x-ndjson"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let lines = ndjson_lines(&bytes);

        assert_eq!(lines[0]["progress"], 5);
        assert_eq!(lines[1]["step"], "💭 THINK: WEB strategy (internet search)");
        assert_eq!(lines[1]["progress"], 13);

        let last = lines.last().unwrap();
        assert_eq!(last["done"], true);
        assert_eq!(last["mode"], "web");
        assert!(last["answer"].as_str().unwrap().contains("Paris"));
        assert_eq!(last["sources"].as_array().unwrap().len(), 1);
        assert!(last.get("uploaded_files").is_none());
    }

    #[tokio::test]
    async fn ask_with_files_indexes_them_and_answers_from_documents() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, vec!["The report says revenue grew [1].", PASS]).await;
        let app = router(state);
        let report = "The annual report shows revenue grew by twelve percent. ".repeat(6);

        let response = app
            .oneshot(post_multipart(
                "/ask",
                multipart_body(
                    &[("query", "What does the report say about revenue?")],
                    &[("report.txt", &report)],
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let lines = ndjson_lines(&bytes);
        assert!(lines
            .iter()
            .any(|line| line["step"] == "📄 Processing file 1/1: report.txt"));

        let last = lines.last().unwrap();
        assert_eq!(last["done"], true);
        assert_eq!(last["mode"], "rag");
        assert_eq!(last["uploaded_files"][0]["status"], "indexed");
        assert_eq!(last["sources"][0]["type"], "document");
    }

    #[tokio::test]
    async fn scrape_validates_url_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(&dir, Vec::new()).await);

        let response = app
            .clone()
            .oneshot(post_json("/api/scrape", json!({ "url": "ftp://example.org" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/api/scrape",
                json!({ "url": "https://example.org", "method": "http" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["scraping_method"], "failed");
    }

    #[test]
    fn configured_origins_replace_local_defaults() {
        let config = json!({ "server": { "cors_allowed_origins": ["https://app.example", " "] } });
        assert_eq!(resolve_allowed_origins(&config), vec!["https://app.example"]);
        assert_eq!(resolve_allowed_origins(&Value::Null), default_local_origins());
    }
}
