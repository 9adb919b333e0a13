pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    AgentSettings, LlmSettings, RagSettings, ScraperSettings, SearchSettings, Settings,
};
