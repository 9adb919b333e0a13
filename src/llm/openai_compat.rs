use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Provider for any server exposing the OpenAI `/v1` chat and embedding routes
/// (OpenAI itself, LM Studio, Ollama, vLLM).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.top_p {
            obj.insert("top_p".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
        if let Some(s) = &request.stop {
            obj.insert("stop".to_string(), json!(s));
        }
    }

    body
}

fn parse_chat_content(payload: &Value) -> Result<String, ApiError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::Internal("Chat response has no message content".to_string()))
}

fn parse_embeddings(payload: &Value) -> Vec<Vec<f32>> {
    let mut items: Vec<(usize, Vec<f32>)> = payload["data"]
        .as_array()
        .map(|data| {
            data.iter()
                .enumerate()
                .filter_map(|(position, item)| {
                    let index = item["index"]
                        .as_u64()
                        .map(|i| i as usize)
                        .unwrap_or(position);
                    item["embedding"].as_array().map(|vals| {
                        let vector = vals
                            .iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect();
                        (index, vector)
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    items.sort_by_key(|(index, _)| *index);
    items.into_iter().map(|(_, vector)| vector).collect()
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        match builder.send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let body = chat_body(&request, model_id);

        let res = self
            .post("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Chat completion failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        parse_chat_content(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        Ok(parse_embeddings(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn chat_body_includes_only_set_options() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_temperature(0.2);
        let body = chat_body(&request, "llama3");

        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parse_chat_content_requires_message() {
        let ok = json!({ "choices": [{ "message": { "content": "Paris" } }] });
        assert_eq!(parse_chat_content(&ok).unwrap(), "Paris");
        assert!(parse_chat_content(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn parse_embeddings_orders_by_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embeddings(&payload);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
