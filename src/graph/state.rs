// Graph State
// Per-request state threaded through the think/act/observe loop

use serde::{Deserialize, Serialize};

use crate::citation::Source;
use crate::qa::VerificationRecord;
use crate::rag::ChunkSearchResult;
use crate::tools::WebPage;

/// Which tools ACT calls. Chosen once, on the first THINK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Web,
    Documents,
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Web => "web",
            Strategy::Documents => "documents",
            Strategy::Hybrid => "hybrid",
        }
    }

    /// Label reported to clients as the answer's mode.
    pub fn mode_label(&self) -> &'static str {
        match self {
            Strategy::Web => "web",
            Strategy::Documents => "rag",
            Strategy::Hybrid => "hybrid",
        }
    }

    pub fn uses_web(&self) -> bool {
        matches!(self, Strategy::Web | Strategy::Hybrid)
    }

    pub fn uses_documents(&self) -> bool {
        matches!(self, Strategy::Documents | Strategy::Hybrid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub query: String,
    /// Restricts document search. Non-empty means files were attached.
    pub doc_ids: Vec<String>,
    /// Query sent to the tools. Equals `query` until a rethink.
    pub working_query: String,
    pub strategy: Strategy,

    pub web_results: Vec<WebPage>,
    pub doc_results: Vec<ChunkSearchResult>,
    pub sources: Vec<Source>,
    pub context: String,

    pub draft_answer: String,
    pub verification: VerificationRecord,
    pub final_answer: String,

    pub iter: usize,
    pub max_iter: usize,
    pub consecutive_failures: u32,
    /// Trimmed length of the previous iteration's context.
    pub last_context_length: usize,

    pub steps: Vec<String>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, doc_ids: Vec<String>, max_iter: usize) -> Self {
        let query = query.into();
        Self {
            working_query: query.clone(),
            query,
            doc_ids,
            max_iter,
            ..Default::default()
        }
    }

    pub fn has_documents(&self) -> bool {
        !self.doc_ids.is_empty()
    }

    /// Drops everything gathered by the previous iteration.
    pub fn clear_iteration(&mut self) {
        self.web_results.clear();
        self.doc_results.clear();
        self.sources.clear();
        self.context.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_labels() {
        assert_eq!(Strategy::Documents.mode_label(), "rag");
        assert_eq!(Strategy::Hybrid.mode_label(), "hybrid");
        assert!(Strategy::Hybrid.uses_web() && Strategy::Hybrid.uses_documents());
        assert!(!Strategy::Web.uses_documents());
    }

    #[test]
    fn new_state_starts_with_the_original_query() {
        let state = AgentState::new("capital of France", vec!["d1".to_string()], 2);
        assert_eq!(state.working_query, "capital of France");
        assert!(state.has_documents());
        assert_eq!(state.iter, 0);
    }
}
