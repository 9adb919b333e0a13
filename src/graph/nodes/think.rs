// Think Node
// Picks the retrieval strategy and reformulates the query on later passes

use async_trait::async_trait;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{AgentState, Strategy};

/// Feedback longer than this is cut before it is folded into the query.
const FOCUS_CHARS: usize = 120;

pub struct ThinkNode;

#[async_trait]
impl Node for ThinkNode {
    fn id(&self) -> &'static str {
        "think"
    }

    fn name(&self) -> &'static str {
        "Think"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        if state.iter == 0 {
            state.strategy = choose_strategy(state, &ctx.policy.recency_keywords);
            state.working_query = state.query.clone();
            let step = match state.strategy {
                Strategy::Hybrid => "💭 THINK: HYBRID strategy (docs + recent web)",
                Strategy::Documents => "💭 THINK: DOCUMENTS strategy (uploaded files)",
                Strategy::Web => "💭 THINK: WEB strategy (internet search)",
            };
            ctx.step(state, step);
        } else {
            state.working_query = reformulate(&state.query, &state.verification.reasons);
            let step = format!(
                "🔄 RETHINK (iter {}): Query reformulation based on feedback",
                state.iter
            );
            ctx.step(state, step);
        }

        Ok(NodeOutput::Continue(None))
    }
}

/// Attached files select documents, or hybrid when the question asks for
/// something recent. Without files the web is the only source.
pub fn choose_strategy(state: &AgentState, recency_keywords: &[String]) -> Strategy {
    if !state.has_documents() {
        return Strategy::Web;
    }
    let lowered = state.query.to_lowercase();
    if recency_keywords.iter().any(|k| lowered.contains(k.as_str())) {
        Strategy::Hybrid
    } else {
        Strategy::Documents
    }
}

pub fn reformulate(query: &str, reasons: &str) -> String {
    let reasons = reasons.trim();
    if reasons.is_empty() {
        return query.to_string();
    }
    let focus: String = reasons.chars().take(FOCUS_CHARS).collect();
    format!("{query} (focus: {focus})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        vec!["latest".to_string(), "2024".to_string()]
    }

    #[test]
    fn strategy_follows_files_and_recency() {
        let web = AgentState::new("capital of France", Vec::new(), 1);
        assert_eq!(choose_strategy(&web, &keywords()), Strategy::Web);

        let docs = AgentState::new("summarize the report", vec!["d1".to_string()], 1);
        assert_eq!(choose_strategy(&docs, &keywords()), Strategy::Documents);

        let hybrid = AgentState::new("LATEST figures vs the report", vec!["d1".to_string()], 1);
        assert_eq!(choose_strategy(&hybrid, &keywords()), Strategy::Hybrid);
    }

    #[test]
    fn reformulation_appends_truncated_feedback() {
        assert_eq!(reformulate("q", "  "), "q");
        assert_eq!(reformulate("q", "missing dates"), "q (focus: missing dates)");

        let long = "x".repeat(300);
        let reformulated = reformulate("q", &long);
        assert_eq!(reformulated, format!("q (focus: {})", "x".repeat(FOCUS_CHARS)));
    }
}
