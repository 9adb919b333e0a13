// Act Node
// Calls the tools chosen by THINK and merges their output into one context

use async_trait::async_trait;
use tracing::warn;

use crate::core::errors::ApiError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::AgentState;
use crate::rag::Retrieval;
use crate::tools::{web_context, web_sources, WebSearchOptions, WebSearchOutput};

pub const BLOCK_SEPARATOR: &str = "\n\n==========\n\n";
pub const DOCUMENTS_LABEL: &str = "[DOCUMENTS]";
pub const WEB_LABEL: &str = "[WEB SEARCH RESULTS]";

pub struct ActNode;

#[async_trait]
impl Node for ActNode {
    fn id(&self) -> &'static str {
        "act"
    }

    fn name(&self) -> &'static str {
        "Act"
    }

    async fn execute(
        &self,
        state: &mut AgentState,
        ctx: &mut NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.clear_iteration();

        let use_docs = state.strategy.uses_documents();
        let use_web = state.strategy.uses_web();
        if use_docs {
            ctx.step(state, "🔧 ACT: Calling document_search() tool");
        }
        if use_web {
            ctx.step(state, "🔧 ACT: Calling web_search() tool");
        }

        let query = state.working_query.clone();
        let doc_filter = state.doc_ids.clone();
        let tools = ctx.tools;
        let policy = ctx.policy;

        let documents = async {
            if !use_docs {
                return None;
            }
            let result = match &tools.documents {
                Some(retriever) => {
                    let filter = (!doc_filter.is_empty()).then_some(doc_filter.as_slice());
                    retriever.retrieve(&query, policy.doc_top_k, filter).await
                }
                None => Err(ApiError::ServiceUnavailable),
            };
            Some(result)
        };
        let web = async {
            if !use_web {
                return None;
            }
            let result = match &tools.web {
                Some(tool) => {
                    let options = WebSearchOptions::with_max_results(policy.web_max_results);
                    tool.web_search(&query, &options).await
                }
                None => Err(ApiError::ServiceUnavailable),
            };
            Some(result)
        };
        let (documents, web) = tokio::join!(documents, web);

        let mut blocks = Vec::new();
        if let Some(result) = documents {
            match result {
                Ok(retrieval) => {
                    let step = format!("✅ document_search: {} chunks", retrieval.results.len());
                    ctx.step(state, step);
                    merge_documents(state, &mut blocks, retrieval);
                }
                Err(err) => {
                    warn!("document_search failed: {}", err);
                    let step = format!("⚠️ document_search failed: {}", err.message());
                    ctx.step(state, step);
                }
            }
        }
        if let Some(result) = web {
            match result {
                Ok(output) => {
                    let step = format!("✅ web_search: {} results", output.results.len());
                    ctx.step(state, step);
                    merge_web(state, &mut blocks, output);
                }
                Err(err) => {
                    warn!("web_search failed: {}", err);
                    let step = format!("⚠️ web_search failed: {}", err.message());
                    ctx.step(state, step);
                }
            }
        }

        state.context = cap_chars(&blocks.join(BLOCK_SEPARATOR), policy.max_context_chars);
        Ok(NodeOutput::Continue(None))
    }
}

fn merge_documents(state: &mut AgentState, blocks: &mut Vec<String>, retrieval: Retrieval) {
    if !retrieval.context.trim().is_empty() {
        blocks.push(format!("{DOCUMENTS_LABEL}\n{}", retrieval.context));
    }
    state.sources.extend(retrieval.sources);
    state.doc_results = retrieval.results;
}

/// Web citations continue the numbering after the document sources.
fn merge_web(state: &mut AgentState, blocks: &mut Vec<String>, output: WebSearchOutput) {
    let first_index = state.sources.len() + 1;
    let context = web_context(&output.results, first_index);
    if !context.trim().is_empty() {
        blocks.push(format!("{WEB_LABEL}\n{context}"));
    }
    state.sources.extend(web_sources(&output.results, first_index));
    state.web_results = output.results;
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_is_char_safe() {
        assert_eq!(cap_chars("héllo", 2), "hé");
        assert_eq!(cap_chars("abc", 10), "abc");
    }
}
