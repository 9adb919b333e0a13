//! Answer synthesis and groundedness verification.

pub mod prompts;
pub mod summarizer;
pub mod synthesizer;
pub mod verification;

pub use summarizer::Summarizer;
pub use synthesizer::{AnswerSynthesizer, QaOutcome};
pub use verification::{parse_verification, Verdict, VerificationRecord};
