// Verify Node
// Reports the verdict and decides between another pass and finishing

use async_trait::async_trait;

use crate::graph::node::{AgentPolicy, GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;
use crate::qa::Verdict;

pub const REFINE: &str = "refine";
pub const FINALIZE: &str = "finalize";

pub struct VerifyNode;

#[async_trait]
impl Node for VerifyNode {
    fn id(&self) -> &'static str {
        "verify"
    }

    fn name(&self) -> &'static str {
        "Verify"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let step = format!("✔️ VERIFY: verdict = {}", state.verification.verdict.as_str());
        ctx.step(state, step);

        let next = if should_refine(state, ctx.policy) {
            REFINE
        } else {
            FINALIZE
        };
        tracing::debug!(
            "Verify routing to {} (iter {}/{}, failures {})",
            next,
            state.iter,
            state.max_iter,
            state.consecutive_failures
        );
        Ok(NodeOutput::Branch(next.to_string()))
    }
}

/// Another pass only when the verifier asked for one and both the
/// iteration and failure budgets allow it.
pub fn should_refine(state: &AgentState, policy: &AgentPolicy) -> bool {
    state.verification.verdict == Verdict::Revise
        && state.iter < state.max_iter
        && state.consecutive_failures < policy.max_consecutive_failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_requires_revise_and_budget() {
        let policy = AgentPolicy::default();
        let mut state = AgentState::new("q", Vec::new(), 2);
        assert!(!should_refine(&state, &policy));

        state.verification.verdict = Verdict::Revise;
        assert!(should_refine(&state, &policy));

        state.consecutive_failures = policy.max_consecutive_failures;
        assert!(!should_refine(&state, &policy));

        state.consecutive_failures = 0;
        state.iter = 2;
        assert!(!should_refine(&state, &policy));
    }
}
