//! Summarization prompts used by the response compressor

/// Instruction to compress one chunk of a response
///
/// # Examples
///
/// ```
/// use metaretrieval::prompts::summary_prompt::chunk_summary_prompt;
///
/// let prompt = chunk_summary_prompt("a long passage", 50);
/// assert!(prompt.contains("approximately 50 tokens"));
/// assert!(prompt.ends_with("a long passage"));
/// ```
pub fn chunk_summary_prompt(chunk: &str, target_tokens: usize) -> String {
    format!(
        "Summarize the following text in approximately {} tokens. \
         Keep the summary coherent and complete, and do not cut sentences off. \
         Output only the summary.\n\n{}",
        target_tokens, chunk
    )
}

/// Instruction to close out an accumulated summary within the remaining
/// allowance
pub fn closing_summary_prompt(summary_so_far: &str, remaining_tokens: usize) -> String {
    format!(
        "Write a coherent closing summary of the following text in approximately {} tokens. \
         It will be appended to the text, so do not repeat it. \
         Output only the closing summary.\n\n{}",
        remaining_tokens, summary_so_far
    )
}
