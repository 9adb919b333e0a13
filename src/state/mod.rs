use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::graph::{AgentTools, RagAgent};
use crate::ingest::{default_extractors, LocalBlobStore, UploadPipeline};
use crate::llm::LlmService;
use crate::qa::summarizer::DEFAULT_CONTEXT_BUDGET;
use crate::qa::{AnswerSynthesizer, Summarizer};
use crate::rag::{ChunkerConfig, RetrievalService, SqliteRagStore};
use crate::tools::{
    provider_from_settings, PageScraper, QueryOptimizer, Scraper, WebSearchTool, WebSearcher,
};

pub mod error;

use error::InitializationError;

/// External collaborators. Swapped for in-process doubles in tests.
pub struct Collaborators {
    pub llm: LlmService,
    pub web_search: Arc<dyn WebSearchTool>,
    pub scraper: Arc<dyn PageScraper>,
    pub search_provider: String,
}

impl Collaborators {
    pub fn from_settings(settings: &Settings) -> Self {
        let llm = LlmService::from_settings(&settings.llm);
        let scraper: Arc<dyn PageScraper> = Arc::new(Scraper::from_settings(&settings.scraper));
        let provider = provider_from_settings(&settings.search);
        let optimizer = settings
            .search
            .optimize_queries
            .then(|| QueryOptimizer::new(llm.clone()));
        let searcher = WebSearcher::new(provider, scraper.clone(), optimizer, &settings.search);
        let search_provider = searcher.provider_name().to_string();

        Self {
            llm,
            web_search: Arc::new(searcher),
            scraper,
            search_provider,
        }
    }
}

/// Global application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub llm: LlmService,
    pub retrieval: Arc<RetrievalService>,
    pub web_search: Arc<dyn WebSearchTool>,
    pub scraper: Arc<dyn PageScraper>,
    pub search_provider: String,
    pub uploads: Arc<UploadPipeline>,
    pub agent: Arc<RagAgent>,
}

impl AppState {
    /// Loads configuration for `paths` and wires every service against the
    /// real collaborators.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let collaborators = Collaborators::from_settings(&settings);
        Self::assemble(paths, config, settings, collaborators).await
    }

    pub async fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>, InitializationError> {
        let Collaborators {
            llm,
            web_search,
            scraper,
            search_provider,
        } = collaborators;

        let store = SqliteRagStore::new(paths.as_ref())
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?;
        let retrieval = Arc::new(RetrievalService::new(
            Arc::new(store),
            llm.clone(),
            ChunkerConfig {
                chunk_size: settings.rag.chunk_size,
                chunk_overlap: settings.rag.chunk_overlap,
            },
        ));

        let mut uploads = UploadPipeline::new(
            retrieval.clone(),
            Arc::new(LocalBlobStore::new(paths.blob_dir.clone())),
            default_extractors(),
            settings.rag.max_upload_bytes,
        );
        if settings.rag.summarize_on_upload {
            uploads = uploads.with_summarizer(Summarizer::new(llm.clone(), DEFAULT_CONTEXT_BUDGET));
        }

        let tools = AgentTools {
            web: Some(web_search.clone()),
            documents: Some(retrieval.clone()),
            synthesizer: AnswerSynthesizer::new(llm.clone()),
        };
        let agent = RagAgent::new(tools, &settings.agent, settings.rag.top_k)
            .map_err(|e| InitializationError::Graph(e.into()))?;

        tracing::info!(
            "Services ready (llm={}, search={}, db={})",
            llm.provider_name(),
            search_provider,
            paths.db_path.display()
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            llm,
            retrieval,
            web_search,
            scraper,
            search_provider,
            uploads: Arc::new(uploads),
            agent: Arc::new(agent),
        }))
    }
}
