//! Draft-then-verify answering over a fixed context.

use serde::Serialize;
use tracing::{info, warn};

use super::prompts::{draft_prompt, verify_prompt, INSUFFICIENT_CONTEXT_ANSWER};
use super::verification::{parse_verification, Verdict, VerificationRecord};
use crate::citation::Source;
use crate::core::errors::ApiError;
use crate::llm::LlmService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaOutcome {
    pub draft: String,
    pub verification: VerificationRecord,
    /// The revision when the verifier supplied a usable one, else the draft.
    pub final_answer: String,
}

/// Stateless across calls: each answer depends only on its inputs.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: LlmService,
}

impl AnswerSynthesizer {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// Fails only when drafting fails. A broken verifier degrades to `pass`.
    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        sources: &[Source],
    ) -> Result<QaOutcome, ApiError> {
        if context.trim().is_empty() {
            info!("No context for {:?}, answering without generation", question);
            return Ok(QaOutcome {
                draft: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                verification: VerificationRecord {
                    verdict: Verdict::Pass,
                    reasons: "No context was available".to_string(),
                    revised_answer: None,
                },
                final_answer: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
            });
        }

        let draft = self.llm.generate(&draft_prompt(question, context)).await?;
        let draft = match draft.trim() {
            "" => INSUFFICIENT_CONTEXT_ANSWER.to_string(),
            text => text.to_string(),
        };

        let verification = match self
            .llm
            .generate(&verify_prompt(question, context, &draft))
            .await
        {
            Ok(text) => parse_verification(&text),
            Err(err) => {
                warn!("Verification failed, keeping draft: {}", err);
                VerificationRecord {
                    verdict: Verdict::Pass,
                    reasons: format!("Verification unavailable: {}", err.message()),
                    revised_answer: None,
                }
            }
        };

        let final_answer = verification
            .usable_revision()
            .map(str::to_string)
            .unwrap_or_else(|| draft.clone());

        info!(
            "Answer ready ({} chars, {} sources, verdict={})",
            final_answer.chars().count(),
            sources.len(),
            verification.verdict.as_str()
        );

        Ok(QaOutcome {
            draft,
            verification,
            final_answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::service::testing::scripted_service;

    const CONTEXT: &str = "Source [1]: france.txt\nParis is the capital of France.";

    #[tokio::test]
    async fn blank_context_short_circuits_without_llm_calls() {
        let (llm, provider) = scripted_service(vec![]);
        let outcome = AnswerSynthesizer::new(llm)
            .answer("Capital?", "  \n ", &[])
            .await
            .unwrap();

        assert_eq!(outcome.final_answer, INSUFFICIENT_CONTEXT_ANSWER);
        assert_eq!(provider.prompt_count(), 0);
    }

    #[tokio::test]
    async fn pass_verdict_keeps_draft() {
        let (llm, provider) = scripted_service(vec![
            Ok("Paris [1].".to_string()),
            Ok(r#"{"verdict":"pass","reasons":"grounded","revised_answer":null}"#.to_string()),
        ]);
        let outcome = AnswerSynthesizer::new(llm)
            .answer("Capital of France?", CONTEXT, &[])
            .await
            .unwrap();

        assert_eq!(outcome.final_answer, "Paris [1].");
        assert_eq!(outcome.verification.verdict, Verdict::Pass);
        assert_eq!(provider.prompt_count(), 2);
        assert!(provider.prompts.lock().unwrap()[1].contains("Answer Draft:\nParis [1]."));
    }

    #[tokio::test]
    async fn revise_verdict_uses_revision() {
        let (llm, _) = scripted_service(vec![
            Ok("Paris, population 2 million.".to_string()),
            Ok(r#"{"verdict":"revise","reasons":"population unsupported","revised_answer":"Paris [1]."}"#.to_string()),
        ]);
        let outcome = AnswerSynthesizer::new(llm)
            .answer("Capital of France?", CONTEXT, &[])
            .await
            .unwrap();

        assert_eq!(outcome.draft, "Paris, population 2 million.");
        assert_eq!(outcome.final_answer, "Paris [1].");
    }

    #[tokio::test]
    async fn malformed_verifier_reply_keeps_draft() {
        for reply in ["looks fine", r#"{"verdict": "revise", "revised_answer": "Lyon"#] {
            let (llm, _) = scripted_service(vec![
                Ok("Paris [1].".to_string()),
                Ok(reply.to_string()),
            ]);
            let outcome = AnswerSynthesizer::new(llm)
                .answer("Capital of France?", CONTEXT, &[])
                .await
                .unwrap();

            assert_eq!(outcome.verification.verdict, Verdict::Pass);
            assert_eq!(outcome.verification.revised_answer, None);
            assert_eq!(outcome.final_answer, outcome.draft);
            assert_eq!(outcome.final_answer, "Paris [1].");
        }
    }

    #[tokio::test]
    async fn verifier_failure_defaults_to_pass_but_draft_failure_errors() {
        let (llm, _) = scripted_service(vec![Ok("Paris [1].".to_string()), Err("down".to_string())]);
        let outcome = AnswerSynthesizer::new(llm)
            .answer("Capital?", CONTEXT, &[])
            .await
            .unwrap();
        assert_eq!(outcome.verification.verdict, Verdict::Pass);
        assert_eq!(outcome.final_answer, "Paris [1].");

        let (llm, _) = scripted_service(vec![Err("down".to_string())]);
        assert!(AnswerSynthesizer::new(llm)
            .answer("Capital?", CONTEXT, &[])
            .await
            .is_err());
    }
}
