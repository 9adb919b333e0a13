//! Web search providers behind one `search(query, max_results)` capability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::core::config::SearchSettings;
use crate::core::errors::ApiError;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchResult>, ApiError>;
}

/// Builds the configured provider. Keyed providers without credentials
/// degrade to DuckDuckGo; configured ones fall back to it on failure.
pub fn provider_from_settings(settings: &SearchSettings) -> Arc<dyn SearchProvider> {
    let client = reqwest::Client::builder()
        .timeout(SEARCH_TIMEOUT)
        .build()
        .unwrap_or_default();
    let duckduckgo = DuckDuckGoProvider::new(client.clone());

    let primary: Option<Box<dyn SearchProvider>> = match settings.provider.as_str() {
        "google" => match (&settings.google_api_key, &settings.google_engine_id) {
            (Some(key), Some(cx)) if !key.is_empty() && !cx.is_empty() => Some(Box::new(
                GoogleProvider::new(client.clone(), key.clone(), cx.clone()),
            )),
            _ => None,
        },
        "bing" => settings
            .bing_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Box::new(BingProvider::new(client.clone(), key.clone())) as Box<dyn SearchProvider>),
        "brave" => settings
            .brave_api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .map(|key| Box::new(BraveProvider::new(client.clone(), key.clone())) as Box<dyn SearchProvider>),
        "custom" => settings
            .custom_search_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| Box::new(CustomProvider::new(client.clone(), url.clone())) as Box<dyn SearchProvider>),
        _ => None,
    };

    match primary {
        Some(primary) => Arc::new(FallbackProvider::new(primary, Box::new(duckduckgo))),
        None => {
            if settings.provider != "duckduckgo" {
                warn!(
                    "Search provider '{}' is not configured, using duckduckgo",
                    settings.provider
                );
            }
            Arc::new(duckduckgo)
        }
    }
}

/// Tries `primary`, then `fallback` when it errors or finds nothing.
pub struct FallbackProvider {
    primary: Box<dyn SearchProvider>,
    fallback: Box<dyn SearchProvider>,
}

impl FallbackProvider {
    pub fn new(primary: Box<dyn SearchProvider>, fallback: Box<dyn SearchProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl SearchProvider for FallbackProvider {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        match self.primary.search(query, max_results).await {
            Ok(results) if !results.is_empty() => return Ok(results),
            Ok(_) => warn!("{} returned no results, falling back", self.primary.name()),
            Err(err) => warn!("{} search failed: {}, falling back", self.primary.name(), err),
        }
        self.fallback.search(query, max_results).await
    }
}

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );
        let payload = fetch_json(self.client.get(url), "DuckDuckGo").await?;
        Ok(limit(parse_duckduckgo(&payload), max_results))
    }
}

pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, api_key: String, engine_id: String) -> Self {
        Self {
            client,
            api_key,
            engine_id,
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        // The API caps `num` at 10.
        let url = format!(
            "https://www.googleapis.com/customsearch/v1?key={}&cx={}&q={}&num={}",
            self.api_key,
            self.engine_id,
            urlencoding::encode(query),
            max_results.clamp(1, 10)
        );
        let payload = fetch_json(self.client.get(url), "Google").await?;
        Ok(limit(
            collect_results(payload.get("items"), "title", "link", "snippet"),
            max_results,
        ))
    }
}

pub struct BingProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BingProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for BingProvider {
    fn name(&self) -> &str {
        "bing"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.bing.microsoft.com/v7.0/search?q={}&count={}",
            urlencoding::encode(query),
            max_results.max(1)
        );
        let request = self
            .client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key);
        let payload = fetch_json(request, "Bing").await?;
        Ok(limit(
            collect_results(
                payload.get("webPages").and_then(|wp| wp.get("value")),
                "name",
                "url",
                "snippet",
            ),
            max_results,
        ))
    }
}

pub struct BraveProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BraveProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            max_results.clamp(1, 20)
        );
        let request = self
            .client
            .get(url)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json");
        let payload = fetch_json(request, "Brave").await?;
        Ok(limit(
            collect_results(
                payload.get("web").and_then(|w| w.get("results")),
                "title",
                "url",
                "description",
            ),
            max_results,
        ))
    }
}

/// SearxNG-style JSON endpoint: `GET {base}?q=...&format=json` answering
/// `{"results": [{"title","url","content"}]}`.
pub struct CustomProvider {
    client: reqwest::Client,
    base_url: String,
}

impl CustomProvider {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl SearchProvider for CustomProvider {
    fn name(&self) -> &str {
        "custom"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json")]);
        let payload = fetch_json(request, "Custom search").await?;
        Ok(limit(
            collect_results(payload.get("results"), "title", "url", "content"),
            max_results,
        ))
    }
}

async fn fetch_json(request: reqwest::RequestBuilder, label: &str) -> Result<Value, ApiError> {
    let response = request.send().await.map_err(ApiError::internal)?;
    if !response.status().is_success() {
        return Err(ApiError::Internal(format!(
            "{} search failed: {}",
            label,
            response.status()
        )));
    }
    response.json().await.map_err(ApiError::internal)
}

fn limit(mut results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    results.truncate(max_results);
    results
}

fn collect_results(
    items: Option<&Value>,
    title_key: &str,
    url_key: &str,
    snippet_key: &str,
) -> Vec<SearchResult> {
    let Some(items) = items.and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let title = item.get(title_key).and_then(|v| v.as_str()).unwrap_or("");
            let url = item.get(url_key).and_then(|v| v.as_str()).unwrap_or("");
            let snippet = item.get(snippet_key).and_then(|v| v.as_str()).unwrap_or("");
            if title.is_empty() || url.is_empty() {
                return None;
            }
            Some(SearchResult {
                title: title.to_string(),
                url: url.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .collect()
}

fn parse_duckduckgo(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = payload
        .get("AbstractText")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let abstract_url = payload
        .get("AbstractURL")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = payload
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| abstract_text.split(" - ").next().unwrap_or(abstract_text));
        results.push(SearchResult {
            title: heading.to_string(),
            url: abstract_url.to_string(),
            snippet: abstract_text.to_string(),
        });
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }

    results
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned {
        name: &'static str,
        outcome: Result<Vec<SearchResult>, String>,
    }

    #[async_trait]
    impl SearchProvider for Canned {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, ApiError> {
            self.outcome.clone().map_err(ApiError::Internal)
        }
    }

    fn hit(url: &str) -> SearchResult {
        SearchResult {
            title: "t".to_string(),
            url: url.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn duckduckgo_flattens_nested_topics() {
        let payload = json!({
            "Heading": "Paris",
            "AbstractText": "Paris is the capital of France.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Paris",
            "RelatedTopics": [
                {"Text": "Louvre - museum", "FirstURL": "https://duckduckgo.com/Louvre"},
                {"Name": "Places", "Topics": [
                    {"Text": "Seine - river", "FirstURL": "https://duckduckgo.com/Seine"}
                ]},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]
        });

        let results = parse_duckduckgo(&payload);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Paris", "Louvre", "Seine"]);
    }

    #[test]
    fn custom_endpoint_reads_searxng_shape() {
        let payload = json!({"results": [
            {"title": "A", "url": "https://a.example", "content": "alpha"},
            {"title": "", "url": "https://skip.example", "content": "no title"}
        ]});
        let results = collect_results(payload.get("results"), "title", "url", "content");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "alpha");
    }

    #[tokio::test]
    async fn fallback_used_when_primary_fails_or_is_empty() {
        let failing = FallbackProvider::new(
            Box::new(Canned {
                name: "bing",
                outcome: Err("quota".to_string()),
            }),
            Box::new(Canned {
                name: "duckduckgo",
                outcome: Ok(vec![hit("https://ddg.example")]),
            }),
        );
        assert_eq!(failing.search("q", 5).await.unwrap()[0].url, "https://ddg.example");

        let working = FallbackProvider::new(
            Box::new(Canned {
                name: "brave",
                outcome: Ok(vec![hit("https://brave.example")]),
            }),
            Box::new(Canned {
                name: "duckduckgo",
                outcome: Ok(vec![hit("https://ddg.example")]),
            }),
        );
        assert_eq!(working.search("q", 5).await.unwrap()[0].url, "https://brave.example");
    }

    #[test]
    fn unconfigured_keyed_provider_degrades_to_duckduckgo() {
        let settings = SearchSettings {
            provider: "google".to_string(),
            ..Default::default()
        };
        assert_eq!(provider_from_settings(&settings).name(), "duckduckgo");

        let settings = SearchSettings {
            provider: "custom".to_string(),
            custom_search_url: Some("http://127.0.0.1:8888/search".to_string()),
            ..Default::default()
        };
        assert_eq!(provider_from_settings(&settings).name(), "custom");
    }
}
