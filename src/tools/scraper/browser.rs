use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::content::HtmlPage;
use super::{ScrapeMethod, ScrapeRequest, ScrapeStrategy, StrategyFailure, StrategyOutcome};

const BROWSER_CANDIDATES: [&str; 5] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Renders the page in headless Chromium and parses the dumped DOM.
pub struct BrowserStrategy {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl BrowserStrategy {
    pub fn new(configured_path: Option<&str>, timeout: Duration) -> Self {
        let binary = configured_path
            .map(PathBuf::from)
            .filter(|path| path.exists() || which::which(path).is_ok())
            .or_else(|| {
                BROWSER_CANDIDATES
                    .iter()
                    .find_map(|candidate| which::which(candidate).ok())
            });
        debug!("Headless browser binary: {:?}", binary);
        Self { binary, timeout }
    }
}

#[async_trait]
impl ScrapeStrategy for BrowserStrategy {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Browser
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    async fn fetch(&self, request: &ScrapeRequest) -> StrategyOutcome {
        let Some(binary) = &self.binary else {
            return StrategyOutcome::Failure(StrategyFailure::permanent(
                "no headless browser installed",
            ));
        };

        let mut command = Command::new(binary);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--virtual-time-budget=5000")
            .arg("--dump-dom")
            .arg(&request.url)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return StrategyOutcome::Failure(StrategyFailure::permanent(format!(
                    "failed to launch browser: {err}"
                )))
            }
            Err(_) => {
                return StrategyOutcome::Failure(StrategyFailure::transient(format!(
                    "browser timed out after {:?}",
                    self.timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first_line = stderr.lines().next().unwrap_or("").to_string();
            return StrategyOutcome::Failure(StrategyFailure::permanent(format!(
                "browser exited with {}: {}",
                output.status, first_line
            )));
        }

        let html = String::from_utf8_lossy(&output.stdout);
        let page = HtmlPage::parse(&html, request.css_selector.as_deref());
        if let Some(reason) = page.blocking_reason() {
            return StrategyOutcome::Failure(StrategyFailure::permanent(reason));
        }
        StrategyOutcome::Success(page.into_content())
    }
}
