//! The verifier's verdict and a lenient parser for model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Pass,
    Revise,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Revise => "revise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub verdict: Verdict,
    pub reasons: String,
    pub revised_answer: Option<String>,
}

impl VerificationRecord {
    /// Usable revision: present, non-blank and requested by a `revise` verdict.
    pub fn usable_revision(&self) -> Option<&str> {
        if self.verdict != Verdict::Revise {
            return None;
        }
        self.revised_answer
            .as_deref()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
    }
}

/// Reads the first `{` through the last `}` as JSON. Anything unparseable
/// becomes a plain `pass`.
pub fn parse_verification(text: &str) -> VerificationRecord {
    let trimmed = text.trim();
    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(candidate) else {
        tracing::debug!("Verification output was not JSON, defaulting to pass");
        return VerificationRecord::default();
    };

    let verdict = match fields
        .get("verdict")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("revise") => Verdict::Revise,
        _ => Verdict::Pass,
    };

    let reasons = match fields.get("reasons") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };

    let revised_answer = fields
        .get("revised_answer")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    VerificationRecord {
        verdict,
        reasons,
        revised_answer,
    }
}
