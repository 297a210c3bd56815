//! Prompt templates
//!
//! This module builds the user-facing question prompts for both prompt
//! modes and, in [`summary_prompt`], the instructions sent while
//! compressing an over-budget response.

pub mod summary_prompt;

/// Suffix asking the model to answer in `language`
///
/// # Examples
///
/// ```
/// use metaretrieval::prompts::answer_in;
///
/// assert_eq!(answer_in("German"), "\n\nPlease answer in German.");
/// ```
pub fn answer_in(language: &str) -> String {
    format!("\n\nPlease answer in {}.", language)
}

/// A directly asked question, as stored and as sent
pub fn direct_question(question: &str, language: &str) -> String {
    format!("{}{}", question, answer_in(language))
}

/// The stored form of a question about an attached file
///
/// The file itself is not persisted with the question.
pub fn file_question_record(question: &str, language: &str) -> String {
    format!(
        "Question about the uploaded file: {}{}",
        question,
        answer_in(language)
    )
}

/// The sent form of a question about an attached file
pub fn file_question_prompt(file_content: &str, question: &str, language: &str) -> String {
    format!(
        "File content: {}\n\nQuestion: {}{}",
        file_content,
        question,
        answer_in(language)
    )
}
