//! Multi-strategy page scraper.
//!
//! Strategies are tried in a per-call order; transient failures are retried
//! with exponential backoff, anything else moves on to the next strategy.
//! [`Scraper::scrape`] never fails: exhausting every strategy yields a result
//! with `success = false` and the last error.

mod browser;
pub mod content;
mod hosted;
mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use browser::BrowserStrategy;
pub use content::{truncate_at_word, PageContent};
pub use hosted::HostedStrategy;
pub use http::HttpStrategy;

use crate::core::config::ScraperSettings;

/// Domain fragments that usually need a real browser to render.
const JS_HEAVY_MARKERS: [&str; 8] = [
    "twitter",
    "x.com",
    "facebook",
    "instagram",
    "linkedin",
    "spa",
    "react",
    "angular",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMethod {
    Hosted,
    Browser,
    Http,
}

impl ScrapeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeMethod::Hosted => "hosted",
            ScrapeMethod::Browser => "browser",
            ScrapeMethod::Http => "http",
        }
    }

    /// Accepts the method names plus common aliases. `"auto"` and unknown
    /// names mean no preference.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "hosted" | "firecrawl" => Some(ScrapeMethod::Hosted),
            "browser" | "selenium" | "chrome" => Some(ScrapeMethod::Browser),
            "http" | "beautifulsoup" | "bs4" => Some(ScrapeMethod::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    pub url: String,
    pub css_selector: Option<String>,
    pub extraction_prompt: Option<String>,
    pub preferred: Option<ScrapeMethod>,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
    pub reason: String,
    /// Timeouts, connection errors and HTTP 408 are worth retrying.
    pub transient: bool,
}

impl StrategyFailure {
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            transient: false,
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            transient: true,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err.status() == Some(reqwest::StatusCode::REQUEST_TIMEOUT);
        Self {
            reason: err.to_string(),
            transient,
        }
    }
}

#[derive(Debug)]
pub enum StrategyOutcome {
    Success(PageContent),
    Failure(StrategyFailure),
}

#[async_trait]
pub trait ScrapeStrategy: Send + Sync {
    fn method(&self) -> ScrapeMethod;

    /// Unconfigured strategies are skipped entirely.
    fn is_available(&self) -> bool {
        true
    }

    async fn fetch(&self, request: &ScrapeRequest) -> StrategyOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeResult {
    pub url: String,
    pub title: String,
    pub content: String,
    pub elements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<serde_json::Value>,
    /// Name of the strategy that succeeded, or `"failed"`.
    pub scraping_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

impl ScrapeResult {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            elements: Vec::new(),
            extracted: None,
            scraping_method: "failed".to_string(),
            error: Some(error.into()),
            success: false,
        }
    }
}

/// The capability the web-search tool depends on.
#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, request: ScrapeRequest) -> ScrapeResult;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total tries per strategy, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Order for one call: explicit preference first, then extraction prompt,
/// then JS-heavy domains, then the cheap HTTP path.
pub fn scraping_order(
    url: &str,
    has_extraction_prompt: bool,
    preferred: Option<ScrapeMethod>,
) -> [ScrapeMethod; 3] {
    use ScrapeMethod::{Browser, Hosted, Http};

    match preferred {
        Some(Hosted) => return [Hosted, Http, Browser],
        Some(Http) => return [Http, Browser, Hosted],
        Some(Browser) => return [Browser, Http, Hosted],
        None => {}
    }

    if has_extraction_prompt {
        return [Hosted, Browser, Http];
    }

    let domain = url_host(url).to_ascii_lowercase();
    if JS_HEAVY_MARKERS.iter().any(|marker| domain.contains(marker)) {
        return [Browser, Hosted, Http];
    }

    [Http, Hosted, Browser]
}

pub(crate) fn url_host(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    host_port.split(':').next().unwrap_or(host_port)
}

pub struct Scraper {
    strategies: Vec<Arc<dyn ScrapeStrategy>>,
    retry: RetryPolicy,
    max_chars: usize,
}

impl Scraper {
    pub fn new(strategies: Vec<Arc<dyn ScrapeStrategy>>, retry: RetryPolicy, max_chars: usize) -> Self {
        Self {
            strategies,
            retry,
            max_chars,
        }
    }

    pub fn from_settings(settings: &ScraperSettings) -> Self {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let strategies: Vec<Arc<dyn ScrapeStrategy>> = vec![
            Arc::new(HttpStrategy::new(timeout)),
            Arc::new(BrowserStrategy::new(settings.browser_path.as_deref(), timeout)),
            Arc::new(HostedStrategy::new(
                settings.hosted_base_url.clone(),
                settings.hosted_api_key.clone(),
                timeout,
            )),
        ];
        let retry = RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_delay_ms),
        };
        Self::new(strategies, retry, settings.max_chars)
    }

    fn strategy(&self, method: ScrapeMethod) -> Option<&Arc<dyn ScrapeStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.method() == method && s.is_available())
    }

    async fn attempt_with_retry(
        &self,
        strategy: &dyn ScrapeStrategy,
        request: &ScrapeRequest,
    ) -> Result<PageContent, StrategyFailure> {
        let mut attempt = 0;
        loop {
            match strategy.fetch(request).await {
                StrategyOutcome::Success(page) => return Ok(page),
                StrategyOutcome::Failure(failure) => {
                    attempt += 1;
                    if !failure.transient || attempt >= self.retry.max_attempts {
                        return Err(failure);
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    debug!(
                        "{} attempt {} failed transiently ({}), retrying in {:?}",
                        strategy.method().as_str(),
                        attempt,
                        failure.reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn finish(&self, request: &ScrapeRequest, method: ScrapeMethod, page: PageContent) -> ScrapeResult {
        ScrapeResult {
            url: request.url.clone(),
            title: page.title,
            content: truncate_at_word(&page.text, self.max_chars),
            elements: page.elements,
            extracted: page.extracted,
            scraping_method: method.as_str().to_string(),
            error: None,
            success: true,
        }
    }
}

#[async_trait]
impl PageScraper for Scraper {
    async fn scrape(&self, request: ScrapeRequest) -> ScrapeResult {
        let order = scraping_order(
            &request.url,
            request.extraction_prompt.is_some(),
            request.preferred,
        );
        info!("Scraping {} with order {:?}", request.url, order);

        let mut last_error = None;
        for method in order {
            let Some(strategy) = self.strategy(method) else {
                debug!("Skipping unavailable strategy {}", method.as_str());
                continue;
            };

            match self.attempt_with_retry(strategy.as_ref(), &request).await {
                Ok(page) if !page.text.trim().is_empty() => {
                    info!("Scraped {} with {}", request.url, method.as_str());
                    return self.finish(&request, method, page);
                }
                Ok(_) => {
                    warn!("{} returned no text for {}", method.as_str(), request.url);
                    last_error = Some(format!("{}: empty content", method.as_str()));
                }
                Err(failure) => {
                    warn!("{} failed for {}: {}", method.as_str(), request.url, failure.reason);
                    last_error = Some(format!("{}: {}", method.as_str(), failure.reason));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| "no scraping strategy available".to_string());
        warn!("All scraping strategies failed for {}: {}", request.url, error);
        ScrapeResult::failed(&request.url, error)
    }
}
