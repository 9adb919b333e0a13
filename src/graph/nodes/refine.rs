// Refine Node
// Starts another iteration

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;

pub struct RefineNode;

#[async_trait]
impl Node for RefineNode {
    fn id(&self) -> &'static str {
        "refine"
    }

    fn name(&self) -> &'static str {
        "Refine"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        _ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.iter += 1;
        state.clear_iteration();
        Ok(NodeOutput::Continue(None))
    }
}
