// Node trait and types
// Base abstraction for graph nodes

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::config::AgentSettings;
use crate::core::errors::ApiError;
use crate::qa::AnswerSynthesizer;
use crate::rag::DocumentRetriever;
use crate::tools::WebSearchTool;

use super::emitter::StepSink;
use super::state::AgentState;

/// Collaborators the loop calls out to. A missing tool is reported as a
/// failed step, never as an error.
#[derive(Clone)]
pub struct AgentTools {
    pub web: Option<Arc<dyn WebSearchTool>>,
    pub documents: Option<Arc<dyn DocumentRetriever>>,
    pub synthesizer: AnswerSynthesizer,
}

/// Tunables read by the nodes.
#[derive(Debug, Clone)]
pub struct AgentPolicy {
    pub recency_keywords: Vec<String>,
    pub min_context_chars: usize,
    pub max_context_chars: usize,
    pub max_consecutive_failures: u32,
    pub web_max_results: usize,
    pub doc_top_k: usize,
}

impl AgentPolicy {
    pub fn from_settings(settings: &AgentSettings, doc_top_k: usize) -> Self {
        Self {
            recency_keywords: settings
                .recency_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            min_context_chars: settings.min_context_chars,
            max_context_chars: settings.max_context_chars,
            max_consecutive_failures: settings.max_consecutive_failures.max(1),
            web_max_results: 5,
            doc_top_k: doc_top_k.max(1),
        }
    }
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default(), 5)
    }
}

/// Context passed to nodes during execution
pub struct NodeContext<'a> {
    pub tools: &'a AgentTools,
    pub policy: &'a AgentPolicy,
    pub sink: &'a dyn StepSink,
}

impl NodeContext<'_> {
    /// Records a step in the trace and forwards it to the sink.
    pub fn step(&self, state: &mut AgentState, step: impl Into<String>) {
        let step = step.into();
        debug!("{}", step);
        self.sink.emit(&step);
        state.steps.push(step);
    }
}

/// Output from a node execution
#[derive(Debug, Clone)]
pub enum NodeOutput {
    /// Continue to the specified next node (None = use default edge)
    Continue(Option<String>),
    /// Branch to one of the specified nodes based on condition
    Branch(String),
    /// Graph execution complete
    Final,
    /// Error occurred
    Error(String),
}

/// Graph execution error
///
/// `execution_trace` lists the node IDs visited before the failure, most
/// recent last.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    pub execution_trace: Vec<String>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.execution_trace = trace;
        self
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "Graph error in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "Graph error in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - all graph nodes implement this
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique identifier for this node
    fn id(&self) -> &'static str;

    /// Human-readable name for display
    fn name(&self) -> &'static str {
        self.id()
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError>;
}
