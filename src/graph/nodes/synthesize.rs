// Synthesize Node
// Drafts and verifies an answer over the current context

use async_trait::async_trait;
use tracing::error;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;
use crate::qa::prompts::GENERATION_FAILED_ANSWER;
use crate::qa::{Verdict, VerificationRecord};

pub struct SynthesizeNode;

#[async_trait]
impl Node for SynthesizeNode {
    fn id(&self) -> &'static str {
        "synthesize"
    }

    fn name(&self) -> &'static str {
        "Synthesize"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let blank = state.context.trim().is_empty();

        let outcome = ctx
            .tools
            .synthesizer
            .answer(&state.query, &state.context, &state.sources)
            .await;

        match outcome {
            Ok(outcome) => {
                state.draft_answer = outcome.draft;
                state.verification = outcome.verification;
                state.final_answer = outcome.final_answer;
                let step = if blank {
                    "🧠 SYNTHESIZE: No context → fallback answer".to_string()
                } else {
                    format!(
                        "🧠 SYNTHESIZE: Response generated from {} sources",
                        state.sources.len()
                    )
                };
                ctx.step(state, step);
            }
            Err(err) => {
                // A failed draft still yields an answer; the loop goes on
                error!("Answer generation failed: {}", err);
                state.draft_answer = GENERATION_FAILED_ANSWER.to_string();
                state.final_answer = GENERATION_FAILED_ANSWER.to_string();
                state.verification = VerificationRecord {
                    verdict: Verdict::Pass,
                    reasons: format!("Generation failed: {}", err.message()),
                    revised_answer: None,
                };
                let step = format!("❌ SYNTHESIZE failed: {}", err.message());
                ctx.step(state, step);
            }
        }

        Ok(NodeOutput::Continue(None))
    }
}
