//! Prompt templates for drafting, verifying and summarizing.

pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information in the available sources to answer this question.";

pub const GENERATION_FAILED_ANSWER: &str =
    "An error occurred while generating the answer. Please try again.";

pub fn draft_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on the provided context.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         - Answer directly and concisely using ONLY the information in the context\n\
         - If the context does not contain enough information, say so honestly\n\
         - Cite sources inline as [1], [2], ... matching the Source numbers in the context\n\
         - Keep the answer focused on the question\n\n\
         Answer:"
    )
}

pub fn verify_prompt(question: &str, context: &str, draft: &str) -> String {
    format!(
        "You are a meticulous reviewer. Only use the provided context to verify the answer.\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Answer Draft:\n{draft}\n\n\
         Instructions:\n\
         - Check that the answer strictly follows the context, with no outside knowledge.\n\
         - Check that claims are supported and that citations [1], [2], ... are used.\n\
         - If anything is unsupported or missing, propose a revised answer grounded in the context, with inline citations.\n\
         - If the context is insufficient, say so clearly.\n\n\
         Return a compact JSON object with keys: verdict (\"pass\"|\"revise\"), reasons (string), revised_answer (string|null)."
    )
}

pub fn summary_prompt(text: &str) -> String {
    format!("Write a concise summary of the following text:\n\n{text}\n\nCONCISE SUMMARY:")
}

pub fn map_prompt(text: &str) -> String {
    format!("Summarize this text briefly:\n\n{text}\n\nBRIEF SUMMARY:")
}

pub fn combine_prompt(summaries: &[String]) -> String {
    format!(
        "Combine these summaries into one coherent summary:\n\n{}\n\nFINAL SUMMARY:",
        summaries.join("\n\n")
    )
}
