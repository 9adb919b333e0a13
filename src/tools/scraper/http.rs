use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use super::content::{is_json_content_type, HtmlPage};
use super::{ScrapeMethod, ScrapeRequest, ScrapeStrategy, StrategyFailure, StrategyOutcome};

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
];

/// Plain GET plus HTML parsing. Cheapest strategy, blind to client-side
/// rendering.
pub struct HttpStrategy {
    client: reqwest::Client,
}

impl HttpStrategy {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }
}

#[async_trait]
impl ScrapeStrategy for HttpStrategy {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Http
    }

    async fn fetch(&self, request: &ScrapeRequest) -> StrategyOutcome {
        let response = match self
            .client
            .get(&request.url)
            .header(reqwest::header::USER_AGENT, Self::user_agent())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return StrategyOutcome::Failure(StrategyFailure::from_reqwest(&err)),
        };

        let status = response.status();
        if !status.is_success() {
            let failure = format!("HTTP {}", status.as_u16());
            return StrategyOutcome::Failure(if status == reqwest::StatusCode::REQUEST_TIMEOUT {
                StrategyFailure::transient(failure)
            } else {
                StrategyFailure::permanent(failure)
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if is_json_content_type(&content_type) {
            return StrategyOutcome::Failure(StrategyFailure::permanent(
                "response is JSON, not a page",
            ));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return StrategyOutcome::Failure(StrategyFailure::from_reqwest(&err)),
        };

        let page = HtmlPage::parse(&body, request.css_selector.as_deref());
        if let Some(reason) = page.blocking_reason() {
            return StrategyOutcome::Failure(StrategyFailure::permanent(reason));
        }
        StrategyOutcome::Success(page.into_content())
    }
}
