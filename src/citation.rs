//! Provenance records attached to answers. Produced per query, never stored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Document {
        /// Citation number as it appears in the context, starting at 1.
        index: usize,
        /// Owning document id.
        id: String,
        filename: String,
        source: String,
        chunk_index: usize,
        score: f32,
    },
    Web {
        index: usize,
        title: String,
        url: String,
        snippet: String,
    },
}

impl Source {
    pub fn index(&self) -> usize {
        match self {
            Source::Document { index, .. } | Source::Web { index, .. } => *index,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Source::Document { .. })
    }

    /// Copy of this source with its citation number replaced.
    pub fn with_index(&self, new_index: usize) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Source::Document { index, .. } | Source::Web { index, .. } => *index = new_index,
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let source = Source::Web {
            index: 2,
            title: "Paris".to_string(),
            url: "https://example.org/paris".to_string(),
            snippet: "Capital of France".to_string(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "web");
        assert_eq!(json["index"], 2);
        assert_eq!(source.with_index(5).index(), 5);
        assert!(!source.is_document());
    }
}
