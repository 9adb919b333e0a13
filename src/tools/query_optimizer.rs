//! Rewrites conversational questions into short keyword queries for search
//! engines.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::llm::LlmService;

static STOPWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(what|is|the|a|an|were)\b").expect("static regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

const MIN_WORDS: usize = 2;
const MAX_WORDS: usize = 15;

fn rewrite_prompt(query: &str) -> String {
    format!(
        "Rewrite the following question as a concise web search query of at most 10 words. \
         Keep names, dates and key terms. Reply with the query only.\n\n\
         Question: {query}\n\
         Search query:"
    )
}

pub struct QueryOptimizer {
    llm: LlmService,
}

impl QueryOptimizer {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// Never fails: falls back to stopword stripping, then to the input.
    pub async fn optimize(&self, query: &str) -> String {
        match self.llm.generate(&rewrite_prompt(query)).await {
            Ok(reply) => {
                if let Some(optimized) = clean_rewrite(&reply) {
                    debug!("Optimized search query: {:?} -> {:?}", query, optimized);
                    return optimized;
                }
                debug!("Rejected query rewrite {:?}", reply);
            }
            Err(err) => warn!("Query optimization failed: {}", err),
        }
        fallback_query(query)
    }
}

/// First line of the reply, unquoted and without any "Query:" style prefix.
/// `None` unless it has between 2 and 15 words.
pub fn clean_rewrite(reply: &str) -> Option<String> {
    let first_line = reply.trim().lines().next()?.trim();
    let after_label = first_line
        .rsplit([':', '→'])
        .next()
        .unwrap_or(first_line);
    let unquoted = after_label.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
    let normalized = WHITESPACE.replace_all(unquoted.trim(), " ").into_owned();

    let words = normalized.split_whitespace().count();
    (MIN_WORDS..=MAX_WORDS)
        .contains(&words)
        .then_some(normalized)
}

pub fn fallback_query(query: &str) -> String {
    let stripped = STOPWORDS.replace_all(query, " ");
    let collapsed = WHITESPACE
        .replace_all(stripped.trim(), " ")
        .trim_end_matches('?')
        .trim()
        .to_string();
    if collapsed.is_empty() {
        query.to_string()
    } else {
        collapsed
    }
}
