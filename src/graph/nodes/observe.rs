// Observe Node
// Scores the gathered context and tracks consecutive failures

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;

pub struct ObserveNode;

#[async_trait]
impl Node for ObserveNode {
    fn id(&self) -> &'static str {
        "observe"
    }

    fn name(&self) -> &'static str {
        "Observe"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let length = state.context.trim().chars().count();

        if length == 0 {
            state.consecutive_failures += 1;
            ctx.step(state, "👁️ OBSERVE: ⚠️ No context found");
        } else if length < ctx.policy.min_context_chars {
            state.consecutive_failures += 1;
            ctx.step(state, "👁️ OBSERVE: ⚠️ Insufficient context");
        } else {
            // Only growth over the previous pass counts as progress
            if length > state.last_context_length {
                state.consecutive_failures = 0;
            }
            let step = format!(
                "👁️ OBSERVE: ✅ Valid context ({} web, {} docs)",
                state.web_results.len(),
                state.doc_results.len()
            );
            ctx.step(state, step);
        }

        state.last_context_length = length;
        Ok(NodeOutput::Continue(None))
    }
}
