// Graph Runtime - petgraph based
// Bounded state-machine execution over a directed node graph

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::node::{GraphError, Node, NodeContext, NodeOutput};
use super::state::AgentState;

/// Edge condition for graph routing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeCondition {
    /// Always follow this edge (default edge)
    Always,
    /// Follow this edge when the node branches with this condition
    OnCondition(String),
}

impl EdgeCondition {
    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }

    pub fn matches(&self, condition: Option<&str>) -> bool {
        match (self, condition) {
            (EdgeCondition::Always, None) => true,
            (EdgeCondition::OnCondition(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// petgraph-based StateGraph runtime
pub struct GraphRuntime {
    graph: DiGraph<Box<dyn Node>, EdgeCondition>,
    node_indices: HashMap<String, NodeIndex>,
    entry_node_id: String,
    /// Node executions allowed per run before aborting.
    max_steps: usize,
}

impl GraphRuntime {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            entry_node_id: String::new(),
            max_steps: 50,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeIndex {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        index
    }

    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        to: &str,
        condition: EdgeCondition,
    ) -> Result<(), GraphError> {
        let from_idx = self
            .node_indices
            .get(from)
            .ok_or_else(|| GraphError::new(from, format!("Source node not found: {}", from)))?;
        let to_idx = self
            .node_indices
            .get(to)
            .ok_or_else(|| GraphError::new(to, format!("Target node not found: {}", to)))?;

        self.graph.add_edge(*from_idx, *to_idx, condition);
        Ok(())
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.node_indices.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Execute the graph from the entry node until a node returns `Final`.
    pub async fn run(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        if self.entry_node_id.is_empty() {
            return Err(GraphError::new("runtime", "No entry node set"));
        }

        let mut current_idx = *self.node_indices.get(&self.entry_node_id).ok_or_else(|| {
            GraphError::new(
                "runtime",
                format!("Entry node not found: {}", self.entry_node_id),
            )
        })?;

        let mut trace: Vec<String> = Vec::new();

        loop {
            if trace.len() >= self.max_steps {
                return Err(GraphError::new(
                    "runtime",
                    format!("Maximum steps ({}) exceeded", self.max_steps),
                )
                .with_trace(trace));
            }

            let node = self
                .graph
                .node_weight(current_idx)
                .ok_or_else(|| GraphError::new("runtime", "Node not found in graph"))?;

            let node_id = node.id();
            tracing::debug!("Executing node: {} (step {})", node_id, trace.len());
            trace.push(node_id.to_string());

            let output = match node.execute(state, ctx).await {
                Ok(output) => output,
                Err(err) => return Err(err.with_trace(trace)),
            };

            let next = match output {
                NodeOutput::Final => {
                    tracing::debug!("Graph execution complete at node: {}", node_id);
                    return Ok(());
                }
                NodeOutput::Error(msg) => {
                    return Err(GraphError::new(node_id, msg).with_trace(trace));
                }
                NodeOutput::Continue(explicit_next) => {
                    self.resolve_next_node(current_idx, None, explicit_next.as_deref())
                }
                NodeOutput::Branch(condition) => {
                    self.resolve_next_node(current_idx, Some(condition.as_str()), None)
                }
            };
            current_idx = next.map_err(|err| err.with_trace(trace.clone()))?;
        }
    }

    fn resolve_next_node(
        &self,
        current_idx: NodeIndex,
        condition: Option<&str>,
        explicit: Option<&str>,
    ) -> Result<NodeIndex, GraphError> {
        let current_id = self
            .graph
            .node_weight(current_idx)
            .map(|n| n.id())
            .unwrap_or("unknown");

        if let Some(next_id) = explicit {
            return self.node_indices.get(next_id).copied().ok_or_else(|| {
                GraphError::new(current_id, format!("Explicit target node not found: {}", next_id))
            });
        }

        let edges: Vec<(NodeIndex, &EdgeCondition)> = self
            .graph
            .edges_directed(current_idx, Direction::Outgoing)
            .map(|edge_ref| (edge_ref.target(), edge_ref.weight()))
            .collect();

        if edges.is_empty() {
            return Err(GraphError::new(
                current_id,
                format!("No outgoing edges from node: {}", current_id),
            ));
        }

        if let Some((target_idx, _)) = edges.iter().find(|(_, weight)| weight.matches(condition)) {
            return Ok(*target_idx);
        }

        // An unmatched branch falls back to the default edge
        if let Some((target_idx, _)) = edges
            .iter()
            .find(|(_, weight)| **weight == EdgeCondition::Always)
        {
            tracing::warn!(
                "Condition '{}' not matched for node '{}', using default edge",
                condition.unwrap_or(""),
                current_id
            );
            return Ok(*target_idx);
        }

        Err(GraphError::new(
            current_id,
            format!(
                "No matching edge for condition: {:?}",
                condition.unwrap_or("(none)")
            ),
        ))
    }
}

impl Default for GraphRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing graphs fluently
pub struct GraphBuilder {
    runtime: GraphRuntime,
    pending_edges: Vec<(String, String, EdgeCondition)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            runtime: GraphRuntime::new(),
            pending_edges: Vec::new(),
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.runtime.entry_node_id = node_id.into();
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.max_steps = max_steps;
        self
    }

    pub fn node(mut self, node: Box<dyn Node>) -> Self {
        self.runtime.add_node(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::Always));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.pending_edges
            .push((from.into(), to.into(), EdgeCondition::on(condition)));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime, GraphError> {
        for (from, to, condition) in self.pending_edges {
            self.runtime.add_conditional_edge(&from, &to, condition)?;
        }
        Ok(self.runtime)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::emitter::NoopStepSink;
    use crate::graph::node::{AgentPolicy, AgentTools};
    use crate::llm::service::testing::scripted_service;
    use crate::qa::AnswerSynthesizer;
    use async_trait::async_trait;

    /// Loops forever by branching back to itself.
    struct Spin;

    #[async_trait]
    impl Node for Spin {
        fn id(&self) -> &'static str {
            "spin"
        }

        async fn execute(
            &self,
            state: &mut AgentState,
            _ctx: &mut NodeContext<'_>,
        ) -> Result<NodeOutput, GraphError> {
            state.iter += 1;
            Ok(NodeOutput::Branch("again".to_string()))
        }
    }

    struct Stop;

    #[async_trait]
    impl Node for Stop {
        fn id(&self) -> &'static str {
            "stop"
        }

        async fn execute(
            &self,
            _state: &mut AgentState,
            _ctx: &mut NodeContext<'_>,
        ) -> Result<NodeOutput, GraphError> {
            Ok(NodeOutput::Final)
        }
    }

    fn tools() -> AgentTools {
        let (llm, _) = scripted_service(Vec::new());
        AgentTools {
            web: None,
            documents: None,
            synthesizer: AnswerSynthesizer::new(llm),
        }
    }

    #[test]
    fn test_edge_condition_matching() {
        assert!(EdgeCondition::Always.matches(None));
        assert!(!EdgeCondition::Always.matches(Some("refine")));

        assert!(EdgeCondition::on("refine").matches(Some("refine")));
        assert!(!EdgeCondition::on("refine").matches(Some("finalize")));
        assert!(!EdgeCondition::on("refine").matches(None));
    }

    #[tokio::test]
    async fn step_limit_aborts_with_trace() {
        let graph = GraphBuilder::new()
            .entry("spin")
            .max_steps(4)
            .node(Box::new(Spin))
            .conditional_edge("spin", "spin", "again")
            .build()
            .unwrap();
        assert!(graph.has_cycle());

        let tools = tools();
        let policy = AgentPolicy::default();
        let mut ctx = NodeContext {
            tools: &tools,
            policy: &policy,
            sink: &NoopStepSink,
        };
        let mut state = AgentState::new("q", Vec::new(), 1);

        let err = graph.run(&mut state, &mut ctx).await.unwrap_err();
        assert_eq!(err.node_id, "runtime");
        assert_eq!(err.execution_trace.len(), 4);
        assert_eq!(state.iter, 4);
    }

    #[tokio::test]
    async fn unmatched_branch_uses_default_edge() {
        let graph = GraphBuilder::new()
            .entry("spin")
            .node(Box::new(Spin))
            .node(Box::new(Stop))
            .edge("spin", "stop")
            .build()
            .unwrap();

        let tools = tools();
        let policy = AgentPolicy::default();
        let mut ctx = NodeContext {
            tools: &tools,
            policy: &policy,
            sink: &NoopStepSink,
        };
        let mut state = AgentState::new("q", Vec::new(), 1);

        graph.run(&mut state, &mut ctx).await.unwrap();
        assert_eq!(state.iter, 1);
    }

    #[test]
    fn edges_to_unknown_nodes_are_rejected() {
        let err = GraphBuilder::new()
            .entry("stop")
            .node(Box::new(Stop))
            .edge("stop", "missing")
            .build()
            .err()
            .unwrap();
        assert!(err.message.contains("missing"));
    }
}
