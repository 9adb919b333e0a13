// Finalize Node
// Settles the answer returned to the caller

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;
use crate::qa::Verdict;

pub struct FinalizeNode;

#[async_trait]
impl Node for FinalizeNode {
    fn id(&self) -> &'static str {
        "finalize"
    }

    fn name(&self) -> &'static str {
        "Finalize"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let revision = state
            .verification
            .usable_revision()
            .map(str::to_string);

        let step = match revision {
            Some(revised) => {
                state.final_answer = revised;
                "🏁 FINALIZE: Revision applied"
            }
            None if state.verification.verdict == Verdict::Revise => {
                state.final_answer = state.draft_answer.clone();
                "🏁 FINALIZE: Keeping draft (no valid revision)"
            }
            None => {
                state.final_answer = state.draft_answer.clone();
                "🏁 FINALIZE: Draft validated"
            }
        };
        ctx.step(state, step);

        if state.consecutive_failures >= ctx.policy.max_consecutive_failures {
            let step = format!(
                "🏁 FINALIZE: Stopped after {} context failures, answer may be incomplete",
                state.consecutive_failures
            );
            ctx.step(state, step);
        }

        Ok(NodeOutput::Final)
    }
}
