//! Typed view over the merged YAML config.
//!
//! Every field has a default so an empty config yields a working local setup
//! (Ollama on localhost, DuckDuckGo search, SQLite under the data dir).

use std::env;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

const DEFAULT_RECENCY_KEYWORDS: [&str; 10] = [
    "latest",
    "today",
    "current",
    "news",
    "recent",
    "this week",
    "actuel",
    "récent",
    "aujourd'hui",
    "dernier",
];

#[derive(Debug, Clone, Serialize)]
pub struct LlmSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            api_key: None,
            chat_model: "llama3:latest".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub summarize_on_upload: bool,
    pub max_upload_bytes: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            summarize_on_upload: false,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSettings {
    pub max_iter: usize,
    pub max_iter_cap: usize,
    pub recursion_limit: usize,
    pub min_context_chars: usize,
    pub max_context_chars: usize,
    pub max_consecutive_failures: u32,
    pub timeout_secs: u64,
    pub recency_keywords: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iter: 1,
            max_iter_cap: 5,
            recursion_limit: 50,
            min_context_chars: 200,
            max_context_chars: 16_000,
            max_consecutive_failures: 3,
            timeout_secs: 300,
            recency_keywords: DEFAULT_RECENCY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AgentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScraperSettings {
    pub max_chars: usize,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub browser_path: Option<String>,
    #[serde(skip_serializing)]
    pub hosted_api_key: Option<String>,
    pub hosted_base_url: String,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            timeout_secs: 20,
            max_attempts: 3,
            retry_delay_ms: 500,
            browser_path: None,
            hosted_api_key: None,
            hosted_base_url: "https://api.firecrawl.dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSettings {
    pub provider: String,
    #[serde(skip_serializing)]
    pub google_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub google_engine_id: Option<String>,
    #[serde(skip_serializing)]
    pub bing_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub brave_api_key: Option<String>,
    pub custom_search_url: Option<String>,
    pub optimize_queries: bool,
    pub scrape_top_n: usize,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
            google_api_key: None,
            google_engine_id: None,
            bing_api_key: None,
            brave_api_key: None,
            custom_search_url: None,
            optimize_queries: true,
            scrape_top_n: 5,
            cache_ttl_secs: 3600,
            cache_max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Settings {
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub agent: AgentSettings,
    pub scraper: ScraperSettings,
    pub search: SearchSettings,
}

impl Settings {
    pub fn from_config(config: &Value) -> Self {
        let mut settings = Settings::default();

        if let Some(llm) = config.get("llm") {
            let s = &mut settings.llm;
            s.base_url = string_or(llm, "base_url", &s.base_url);
            s.api_key = optional_string(llm, "api_key");
            s.chat_model = string_or(llm, "chat_model", &s.chat_model);
            s.embedding_model = string_or(llm, "embedding_model", &s.embedding_model);
            s.temperature = llm
                .get("temperature")
                .and_then(|v| v.as_f64())
                .unwrap_or(s.temperature);
            s.timeout_secs = u64_or(llm, "timeout_secs", s.timeout_secs);
        }

        if let Some(rag) = config.get("rag") {
            let s = &mut settings.rag;
            s.chunk_size = usize_or(rag, "chunk_size", s.chunk_size);
            s.chunk_overlap = usize_or(rag, "chunk_overlap", s.chunk_overlap);
            s.top_k = usize_or(rag, "top_k", s.top_k);
            s.summarize_on_upload = bool_or(rag, "summarize_on_upload", s.summarize_on_upload);
            s.max_upload_bytes = usize_or(rag, "max_upload_bytes", s.max_upload_bytes);
        }

        if let Some(agent) = config.get("agent") {
            let s = &mut settings.agent;
            s.max_iter = usize_or(agent, "max_iter", s.max_iter);
            s.max_iter_cap = usize_or(agent, "max_iter_cap", s.max_iter_cap);
            s.recursion_limit = usize_or(agent, "recursion_limit", s.recursion_limit);
            s.min_context_chars = usize_or(agent, "min_context_chars", s.min_context_chars);
            s.max_context_chars = usize_or(agent, "max_context_chars", s.max_context_chars);
            s.max_consecutive_failures = agent
                .get("max_consecutive_failures")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(s.max_consecutive_failures);
            s.timeout_secs = u64_or(agent, "timeout_secs", s.timeout_secs);
            if let Some(keywords) = string_list(agent, "recency_keywords") {
                s.recency_keywords = keywords;
            }
        }

        if let Some(scraper) = config.get("scraper") {
            let s = &mut settings.scraper;
            s.max_chars = usize_or(scraper, "max_chars", s.max_chars);
            s.timeout_secs = u64_or(scraper, "timeout_secs", s.timeout_secs);
            s.max_attempts = scraper
                .get("max_attempts")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32)
                .unwrap_or(s.max_attempts);
            s.retry_delay_ms = u64_or(scraper, "retry_delay_ms", s.retry_delay_ms);
            s.browser_path = optional_string(scraper, "browser_path");
            s.hosted_api_key = optional_string(scraper, "hosted_api_key");
            s.hosted_base_url = string_or(scraper, "hosted_base_url", &s.hosted_base_url);
        }

        if let Some(tools) = config.get("tools") {
            let s = &mut settings.search;
            s.provider = string_or(tools, "search_provider", &s.provider).to_lowercase();
            s.google_api_key = optional_string(tools, "google_search_api_key");
            s.google_engine_id = optional_string(tools, "google_search_engine_id");
            s.bing_api_key = optional_string(tools, "bing_search_api_key");
            s.brave_api_key = optional_string(tools, "brave_search_api_key");
            s.custom_search_url = optional_string(tools, "custom_search_url");
            s.optimize_queries = bool_or(tools, "optimize_queries", s.optimize_queries);
            s.scrape_top_n = usize_or(tools, "scrape_top_n", s.scrape_top_n);
            s.cache_ttl_secs = u64_or(tools, "cache_ttl_secs", s.cache_ttl_secs);
            s.cache_max_entries = usize_or(tools, "cache_max_entries", s.cache_max_entries);
        }

        settings
    }

    /// `AGENT_MAX_ITER` and `RAG_SUMMARIZE_ON_UPLOAD` win over the file config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(max_iter) = env::var("AGENT_MAX_ITER")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.agent.max_iter = max_iter;
        }
        if let Ok(flag) = env::var("RAG_SUMMARIZE_ON_UPLOAD") {
            self.rag.summarize_on_upload = flag.trim().eq_ignore_ascii_case("true");
        }
        self
    }
}

fn optional_string(section: &Value, key: &str) -> Option<String> {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn string_or(section: &Value, key: &str, fallback: &str) -> String {
    optional_string(section, key).unwrap_or_else(|| fallback.to_string())
}

fn u64_or(section: &Value, key: &str, fallback: u64) -> u64 {
    section
        .get(key)
        .and_then(|v| v.as_u64())
        .unwrap_or(fallback)
}

fn usize_or(section: &Value, key: &str, fallback: usize) -> usize {
    section
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(fallback)
}

fn bool_or(section: &Value, key: &str, fallback: bool) -> bool {
    section
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(fallback)
}

fn string_list(section: &Value, key: &str) -> Option<Vec<String>> {
    section.get(key).and_then(|v| v.as_array()).map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_lowercase())
            .filter(|item| !item.is_empty())
            .collect()
    })
}
