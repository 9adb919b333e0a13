// Graph Builder
// Wires the reasoning loop: think -> act -> observe -> synthesize -> verify,
// then either refine (back to think) or finalize

use super::node::GraphError;
use super::nodes::verify::{FINALIZE, REFINE};
use super::nodes::{
    ActNode, FinalizeNode, ObserveNode, RefineNode, SynthesizeNode, ThinkNode, VerifyNode,
};
use super::runtime::{GraphBuilder, GraphRuntime};

/// Nodes visited by one pass from THINK through REFINE.
pub const NODES_PER_ITERATION: usize = 6;

pub fn build_agent_graph(max_steps: usize) -> Result<GraphRuntime, GraphError> {
    GraphBuilder::new()
        .entry("think")
        .max_steps(max_steps)
        .node(Box::new(ThinkNode))
        .node(Box::new(ActNode))
        .node(Box::new(ObserveNode))
        .node(Box::new(SynthesizeNode))
        .node(Box::new(VerifyNode))
        .node(Box::new(RefineNode))
        .node(Box::new(FinalizeNode))
        .edge("think", "act")
        .edge("act", "observe")
        .edge("observe", "synthesize")
        .edge("synthesize", "verify")
        .conditional_edge("verify", "refine", REFINE)
        .conditional_edge("verify", "finalize", FINALIZE)
        .edge("refine", "think")
        .build()
}

/// Enough steps for `max_iter + 1` passes plus FINALIZE, never below the
/// configured recursion limit.
pub fn step_budget(max_iter: usize, recursion_limit: usize) -> usize {
    recursion_limit.max((max_iter + 1) * NODES_PER_ITERATION + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_contains_every_phase_and_loops() {
        let graph = build_agent_graph(50).unwrap();
        let mut ids = graph.node_ids();
        ids.sort_unstable();
        assert_eq!(
            ids,
            vec!["act", "finalize", "observe", "refine", "synthesize", "think", "verify"]
        );
        assert!(graph.has_cycle());
        assert_eq!(graph.max_steps(), 50);
    }

    #[test]
    fn step_budget_covers_the_iteration_cap() {
        assert_eq!(step_budget(1, 50), 50);
        assert_eq!(step_budget(10, 50), 67);
    }
}
