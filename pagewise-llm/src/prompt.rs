//! Fixed prompts for answering questions about a single page.

/// System instruction sent with every question.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate answers based on website content. Use the structured content to provide relevant and specific information.";

/// Wrap rendered page context and the user's question into the user message.
///
/// ```
/// let prompt = pagewise_llm::prompt::build_answer_prompt("Title: T\n\nAdditional Content:\n", "What is this?");
/// assert!(prompt.starts_with("Based on this structured website content:\n\nTitle: T"));
/// assert!(prompt.ends_with("If the answer cannot be found in the content, please say so."));
/// ```
pub fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on this structured website content:\n\n\
         {context}\n\n\
         Please provide a detailed and accurate answer to this question: {question}\n\
         If the answer cannot be found in the content, please say so."
    )
}
