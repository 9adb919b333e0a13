//! External-facing tools the agent can call: page scraping and web search.

pub mod query_optimizer;
pub mod scraper;
pub mod search;
pub mod web_search;

pub use query_optimizer::QueryOptimizer;
pub use self::scraper::{PageScraper, ScrapeMethod, ScrapeRequest, ScrapeResult, Scraper};
pub use search::{provider_from_settings, SearchProvider, SearchResult};
pub use web_search::{
    web_context, web_sources, WebPage, WebSearchOptions, WebSearchOutput, WebSearchTool,
    WebSearcher,
};
