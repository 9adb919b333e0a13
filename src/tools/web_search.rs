//! `web_search`: provider lookup, concurrent scraping of the top hits and a
//! citation-numbered context block.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::query_optimizer::QueryOptimizer;
use super::scraper::{url_host, PageScraper, ScrapeRequest};
use super::search::{SearchProvider, SearchResult};
use crate::cache::{query_key, QueryCache};
use crate::citation::Source;
use crate::core::config::SearchSettings;
use crate::core::errors::ApiError;

pub const DEFAULT_MAX_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 200;
const SOURCE_SEPARATOR: &str = "\n\n----------\n\n";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebSearchOptions {
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl WebSearchOptions {
    pub fn with_max_results(max_results: usize) -> Self {
        Self {
            max_results,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebPage {
    pub title: String,
    pub url: String,
    pub content: String,
    /// False when the page could not be scraped and `content` is the
    /// provider's snippet.
    pub scraped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchOutput {
    pub search_query: String,
    pub results: Vec<WebPage>,
    pub sources: Vec<Source>,
    pub context: String,
}

#[async_trait]
pub trait WebSearchTool: Send + Sync {
    async fn web_search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<WebSearchOutput, ApiError>;
}

pub fn web_context(pages: &[WebPage], first_index: usize) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(offset, page)| {
            format!(
                "Source [{}]: {}\nURL: {}\n{}",
                first_index + offset,
                page.title,
                page.url,
                page.content
            )
        })
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR)
}

pub fn web_sources(pages: &[WebPage], first_index: usize) -> Vec<Source> {
    pages
        .iter()
        .enumerate()
        .map(|(offset, page)| Source::Web {
            index: first_index + offset,
            title: page.title.clone(),
            url: page.url.clone(),
            snippet: snippet(&page.content),
        })
        .collect()
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(SNIPPET_CHARS).collect();
    format!("{head}...")
}

/// `site:`/`-site:` operators in front of the query.
pub fn filtered_query(query: &str, options: &WebSearchOptions) -> String {
    let filters = options
        .allowed_domains
        .iter()
        .map(|d| format!("site:{d}"))
        .chain(options.blocked_domains.iter().map(|d| format!("-site:{d}")))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{filters} {query}").trim().to_string()
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim().trim_start_matches("www.").to_ascii_lowercase();
    let host = host.trim_start_matches("www.");
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Providers do not all honor `site:`; enforce it on the way back.
pub fn passes_domain_filters(url: &str, options: &WebSearchOptions) -> bool {
    let host = url_host(url);
    if options
        .blocked_domains
        .iter()
        .any(|domain| domain_matches(host, domain))
    {
        return false;
    }
    options.allowed_domains.is_empty()
        || options
            .allowed_domains
            .iter()
            .any(|domain| domain_matches(host, domain))
}

pub struct WebSearcher {
    provider: Arc<dyn SearchProvider>,
    scraper: Arc<dyn PageScraper>,
    optimizer: Option<QueryOptimizer>,
    cache: QueryCache<WebSearchOutput>,
    scrape_top_n: usize,
}

impl WebSearcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        scraper: Arc<dyn PageScraper>,
        optimizer: Option<QueryOptimizer>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            provider,
            scraper,
            optimizer,
            cache: QueryCache::new(
                Duration::from_secs(settings.cache_ttl_secs),
                settings.cache_max_entries,
            ),
            scrape_top_n: settings.scrape_top_n,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn scrape_hits(&self, hits: &[SearchResult], limit: usize) -> Vec<WebPage> {
        let scrapes = hits.iter().take(limit).map(|hit| async move {
            let result = self.scraper.scrape(ScrapeRequest::new(&hit.url)).await;
            if result.success {
                WebPage {
                    title: if result.title.is_empty() {
                        hit.title.clone()
                    } else {
                        result.title
                    },
                    url: hit.url.clone(),
                    content: result.content,
                    scraped: true,
                }
            } else {
                debug!("Using search snippet for {}", hit.url);
                WebPage {
                    title: hit.title.clone(),
                    url: hit.url.clone(),
                    content: hit.snippet.clone(),
                    scraped: false,
                }
            }
        });
        join_all(scrapes).await
    }
}

#[async_trait]
impl WebSearchTool for WebSearcher {
    async fn web_search(
        &self,
        query: &str,
        options: &WebSearchOptions,
    ) -> Result<WebSearchOutput, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("Search query is empty".to_string()));
        }
        let max_results = options.max_results.max(1);

        let key = query_key(
            query,
            &[
                ("allowed", options.allowed_domains.join(",")),
                ("blocked", options.blocked_domains.join(",")),
                ("max", max_results.to_string()),
            ],
        );
        if let Some(cached) = self.cache.get(&key) {
            debug!("web_search cache hit for {:?}", query);
            return Ok(cached);
        }

        let search_query = match &self.optimizer {
            Some(optimizer) => optimizer.optimize(query).await,
            None => query.to_string(),
        };
        let provider_query = filtered_query(&search_query, options);
        info!("web_search via {}: {:?}", self.provider.name(), provider_query);

        let hits: Vec<SearchResult> = self
            .provider
            .search(&provider_query, max_results)
            .await?
            .into_iter()
            .filter(|hit| passes_domain_filters(&hit.url, options))
            .take(max_results)
            .collect();

        let pages: Vec<WebPage> = self
            .scrape_hits(&hits, self.scrape_top_n.min(max_results))
            .await
            .into_iter()
            .filter(|page| !page.content.trim().is_empty())
            .collect();

        let output = WebSearchOutput {
            search_query,
            sources: web_sources(&pages, 1),
            context: web_context(&pages, 1),
            results: pages,
        };
        self.cache.insert(key, output.clone());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::tools::scraper::ScrapeResult;

    struct FixedProvider {
        hits: Vec<SearchResult>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchResult>, ApiError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.clone())
        }
    }

    /// Succeeds for every URL except those containing "broken".
    struct FakeScraper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageScraper for FakeScraper {
        async fn scrape(&self, request: ScrapeRequest) -> ScrapeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ok = !request.url.contains("broken");
            ScrapeResult {
                url: request.url.clone(),
                title: if ok { format!("Page {}", request.url) } else { String::new() },
                content: if ok { format!("Full text of {}", request.url) } else { String::new() },
                elements: Vec::new(),
                extracted: None,
                scraping_method: if ok { "http" } else { "failed" }.to_string(),
                error: (!ok).then(|| "blocked".to_string()),
                success: ok,
            }
        }
    }

    fn hit(url: &str) -> SearchResult {
        SearchResult {
            title: format!("Hit {url}"),
            url: url.to_string(),
            snippet: format!("snippet for {url}"),
        }
    }

    fn searcher(hits: Vec<SearchResult>) -> (WebSearcher, Arc<FixedProvider>, Arc<FakeScraper>) {
        let provider = Arc::new(FixedProvider {
            hits,
            queries: Mutex::new(Vec::new()),
        });
        let scraper = Arc::new(FakeScraper {
            calls: AtomicUsize::new(0),
        });
        let tool = WebSearcher::new(provider.clone(), scraper.clone(), None, &SearchSettings::default());
        (tool, provider, scraper)
    }

    #[tokio::test]
    async fn builds_numbered_context_in_provider_order() {
        let (tool, _, _) = searcher(vec![
            hit("https://a.example/1"),
            hit("https://broken.example/2"),
        ]);

        let output = tool
            .web_search("paris", &WebSearchOptions::with_max_results(5))
            .await
            .unwrap();

        assert_eq!(output.results.len(), 2);
        assert!(output.results[0].scraped);
        assert!(!output.results[1].scraped);
        assert_eq!(output.results[1].content, "snippet for https://broken.example/2");
        assert!(output.context.starts_with(
            "Source [1]: Page https://a.example/1\nURL: https://a.example/1\nFull text of"
        ));
        assert!(output.context.contains("\n\n----------\n\nSource [2]: Hit https://broken.example/2"));
        assert_eq!(output.sources[1].index(), 2);
    }

    #[tokio::test]
    async fn domain_filters_reach_query_and_results() {
        let (tool, provider, _) = searcher(vec![
            hit("https://docs.rust-lang.org/book"),
            hit("https://spam.example/rust"),
        ]);
        let options = WebSearchOptions {
            allowed_domains: vec!["rust-lang.org".to_string()],
            blocked_domains: vec!["spam.example".to_string()],
            max_results: 5,
        };

        let output = tool.web_search("ownership", &options).await.unwrap();

        assert_eq!(
            provider.queries.lock().unwrap()[0],
            "site:rust-lang.org -site:spam.example ownership"
        );
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].url, "https://docs.rust-lang.org/book");
    }

    #[tokio::test]
    async fn repeated_search_is_served_from_cache() {
        let (tool, provider, scraper) = searcher(vec![hit("https://a.example/1")]);
        let options = WebSearchOptions::with_max_results(3);

        tool.web_search("Rust news", &options).await.unwrap();
        tool.web_search("  rust NEWS ", &options).await.unwrap();

        assert_eq!(provider.queries.lock().unwrap().len(), 1);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scrapes_at_most_max_results_pages() {
        let hits = (0..8).map(|i| hit(&format!("https://s{i}.example"))).collect();
        let (tool, _, scraper) = searcher(hits);

        let output = tool
            .web_search("many", &WebSearchOptions::with_max_results(3))
            .await
            .unwrap();
        assert_eq!(output.results.len(), 3);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn snippets_are_bounded() {
        assert_eq!(snippet("short"), "short");
        assert_eq!(snippet(&"y".repeat(250)).chars().count(), SNIPPET_CHARS + 3);
    }
}
