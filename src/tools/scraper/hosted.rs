use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::content::{PageContent, MAX_ELEMENTS, MAX_ELEMENT_CHARS};
use super::{ScrapeMethod, ScrapeRequest, ScrapeStrategy, StrategyFailure, StrategyOutcome};

/// Firecrawl-compatible `/v1/scrape`. Only active with an API key.
pub struct HostedStrategy {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HostedStrategy {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

pub(crate) fn request_body(request: &ScrapeRequest) -> Value {
    match &request.extraction_prompt {
        Some(prompt) => json!({
            "url": request.url,
            "formats": ["markdown", "json"],
            "jsonOptions": {
                "prompt": format!(
                    "Extract the following information from this webpage:\n{prompt}\n\
                     Structure the response as JSON with clear field names."
                )
            },
            "onlyMainContent": true,
        }),
        None => json!({
            "url": request.url,
            "formats": ["markdown"],
            "onlyMainContent": true,
        }),
    }
}

pub(crate) fn parse_response(payload: &Value) -> Result<PageContent, StrategyFailure> {
    if payload.get("success").and_then(|v| v.as_bool()) == Some(false) {
        let error = payload
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("hosted scrape was not successful");
        return Err(StrategyFailure::permanent(error));
    }

    let data = payload
        .get("data")
        .ok_or_else(|| StrategyFailure::permanent("hosted response has no data"))?;
    let extracted = data.get("json").filter(|v| !v.is_null()).cloned();
    let mut text = data
        .get("markdown")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    if text.is_empty() {
        if let Some(extracted) = &extracted {
            text = extracted.to_string();
        }
    }

    let title = data
        .get("metadata")
        .and_then(|m| m.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let elements = extracted
        .as_ref()
        .and_then(|v| v.as_object())
        .map(|fields| {
            fields
                .iter()
                .take(MAX_ELEMENTS)
                .map(|(key, value)| {
                    format!("{key}: {value}")
                        .chars()
                        .take(MAX_ELEMENT_CHARS)
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(PageContent {
        title,
        text,
        elements,
        extracted,
    })
}

#[async_trait]
impl ScrapeStrategy for HostedStrategy {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Hosted
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, request: &ScrapeRequest) -> StrategyOutcome {
        let Some(api_key) = &self.api_key else {
            return StrategyOutcome::Failure(StrategyFailure::permanent(
                "hosted scraper API key not configured",
            ));
        };

        let response = match self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(api_key)
            .json(&request_body(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return StrategyOutcome::Failure(StrategyFailure::from_reqwest(&err)),
        };

        let status = response.status();
        if !status.is_success() {
            let failure = format!("hosted scrape HTTP {}", status.as_u16());
            let transient = status == reqwest::StatusCode::REQUEST_TIMEOUT
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                || status.is_server_error();
            return StrategyOutcome::Failure(StrategyFailure {
                reason: failure,
                transient,
            });
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => return StrategyOutcome::Failure(StrategyFailure::from_reqwest(&err)),
        };

        match parse_response(&payload) {
            Ok(page) => StrategyOutcome::Success(page),
            Err(failure) => StrategyOutcome::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_requests_json_format() {
        let mut request = ScrapeRequest::new("https://example.com");
        assert_eq!(request_body(&request)["formats"], json!(["markdown"]));

        request.extraction_prompt = Some("list the prices".to_string());
        let body = request_body(&request);
        assert_eq!(body["formats"], json!(["markdown", "json"]));
        assert!(body["jsonOptions"]["prompt"]
            .as_str()
            .unwrap()
            .contains("list the prices"));
    }

    #[test]
    fn parses_markdown_title_and_extraction() {
        let payload = json!({
            "success": true,
            "data": {
                "markdown": "# Prices\nTea costs 3.",
                "metadata": {"title": "Menu"},
                "json": {"tea": 3}
            }
        });
        let page = parse_response(&payload).unwrap();
        assert_eq!(page.title, "Menu");
        assert!(page.text.starts_with("# Prices"));
        assert_eq!(page.elements, vec!["tea: 3".to_string()]);
        assert_eq!(page.extracted, Some(json!({"tea": 3})));
    }

    #[test]
    fn unsuccessful_payload_is_a_permanent_failure() {
        let failure = parse_response(&json!({"success": false, "error": "blocked"})).unwrap_err();
        assert_eq!(failure, StrategyFailure::permanent("blocked"));
    }

    #[test]
    fn unavailable_without_key() {
        let strategy = HostedStrategy::new(
            "https://api.firecrawl.dev/".to_string(),
            Some("  ".to_string()),
            Duration::from_secs(5),
        );
        assert!(!strategy.is_available());
    }
}
