//! Entry point for answering one question with the reasoning loop.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::builder::{build_agent_graph, step_budget};
use super::emitter::{NoopStepSink, StepSink};
use super::node::{AgentPolicy, AgentTools, GraphError, NodeContext};
use super::runtime::GraphRuntime;
use super::state::AgentState;
use crate::citation::Source;
use crate::core::config::AgentSettings;
use crate::qa::VerificationRecord;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRequest {
    pub query: String,
    /// Restricts document search to these documents and enables it.
    #[serde(default)]
    pub doc_ids: Vec<String>,
    pub max_iter: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub answer: String,
    pub sources: Vec<Source>,
    pub verification: VerificationRecord,
    pub iterations: usize,
    pub steps: Vec<String>,
    pub mode: String,
}

pub struct RagAgent {
    graph: GraphRuntime,
    tools: AgentTools,
    policy: AgentPolicy,
    default_max_iter: usize,
    max_iter_cap: usize,
}

impl RagAgent {
    pub fn new(
        tools: AgentTools,
        settings: &AgentSettings,
        doc_top_k: usize,
    ) -> Result<Self, GraphError> {
        let max_iter_cap = settings.max_iter_cap.max(1);
        let graph = build_agent_graph(step_budget(max_iter_cap, settings.recursion_limit))?;
        Ok(Self {
            graph,
            tools,
            policy: AgentPolicy::from_settings(settings, doc_top_k),
            default_max_iter: settings.max_iter.min(max_iter_cap),
            max_iter_cap,
        })
    }

    /// Requested iterations, or the default, bounded by the configured cap.
    pub fn clamp_iterations(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_iter)
            .min(self.max_iter_cap)
    }

    pub async fn run(
        &self,
        request: AgentRequest,
        sink: Option<&dyn StepSink>,
    ) -> Result<AgentResult, GraphError> {
        let max_iter = self.clamp_iterations(request.max_iter);
        let mut state = AgentState::new(request.query, request.doc_ids, max_iter);

        let sink = sink.unwrap_or(&NoopStepSink);
        let mut ctx = NodeContext {
            tools: &self.tools,
            policy: &self.policy,
            sink,
        };

        self.graph.run(&mut state, &mut ctx).await?;

        info!(
            "Agent finished: mode={}, iterations={}, sources={}, verdict={}",
            state.strategy.mode_label(),
            state.iter,
            state.sources.len(),
            state.verification.verdict.as_str()
        );

        Ok(AgentResult {
            answer: state.final_answer,
            sources: state.sources,
            verification: state.verification,
            iterations: state.iter,
            steps: state.steps,
            mode: state.strategy.mode_label().to_string(),
        })
    }
}
