//! Response compression
//!
//! Shrinks an over-budget response to roughly a target token count by
//! summarizing it chunk by chunk through the completion provider. The
//! compressor never fails its caller: if any summarization call fails, the
//! original response is returned untouched.

use crate::prompts::summary_prompt::{chunk_summary_prompt, closing_summary_prompt};
use crate::providers::{ChatMessage, CompletionProvider, CompletionRequest, SamplingParams};
use crate::tokens::count_tokens;
use std::sync::Arc;

/// Separator placed between accumulated summaries
const SUMMARY_SEPARATOR: &str = "\n\n";

/// How a compression run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Content was already within budget (or the budget was unusable)
    Unchanged,
    /// Content was replaced by summaries
    Compressed,
    /// A summarization call failed; content is the original
    Degraded,
}

/// Result of a compression run
#[derive(Debug, Clone, PartialEq)]
pub struct Compression {
    /// Resulting text
    pub content: String,
    /// Token count of `content`
    pub token_count: usize,
    /// Summarization calls that succeeded
    pub calls: usize,
    /// Wall-clock seconds spent in summarization calls
    pub elapsed_secs: f64,
    /// How the run ended
    pub outcome: CompressionOutcome,
}

impl Compression {
    fn untouched(
        content: &str,
        calls: usize,
        elapsed_secs: f64,
        outcome: CompressionOutcome,
    ) -> Self {
        Self {
            content: content.to_string(),
            token_count: count_tokens(content),
            calls,
            elapsed_secs,
            outcome,
        }
    }
}

/// Summarizes over-budget responses through a completion provider
pub struct ResponseCompressor {
    provider: Arc<dyn CompletionProvider>,
    sampling: SamplingParams,
}

impl ResponseCompressor {
    /// Create a compressor that sends summarization requests with
    /// `sampling` (its `max_tokens` is replaced per call)
    pub fn new(provider: Arc<dyn CompletionProvider>, sampling: SamplingParams) -> Self {
        Self { provider, sampling }
    }

    /// Compress `content` to about `target_tokens` tokens using `model`
    ///
    /// Content already within budget is returned unchanged without any
    /// call. Otherwise each chunk is summarized in turn until the
    /// accumulated summaries reach the target; if every chunk has been
    /// summarized and the target is still not reached, one closing summary
    /// call tops the result up.
    pub async fn compress(&self, content: &str, model: &str, target_tokens: usize) -> Compression {
        let total_tokens = count_tokens(content);
        if total_tokens <= target_tokens {
            return Compression::untouched(content, 0, 0.0, CompressionOutcome::Unchanged);
        }
        if target_tokens == 0 {
            tracing::warn!("Compression target of 0 tokens requested, keeping response as is");
            return Compression::untouched(content, 0, 0.0, CompressionOutcome::Unchanged);
        }

        let chunk_tokens = (target_tokens.saturating_mul(2)).min(total_tokens);
        let chunks = chunk_content(content, chunk_tokens);
        tracing::info!(
            "Compressing response: {} tokens -> target {} in {} chunk(s)",
            total_tokens,
            target_tokens,
            chunks.len()
        );

        let mut summaries: Vec<String> = Vec::new();
        let mut accumulated = 0usize;
        let mut calls = 0usize;
        let mut elapsed_secs = 0.0;

        for (index, chunk) in chunks.iter().enumerate() {
            let prompt = chunk_summary_prompt(chunk, target_tokens);
            match self.summarize(model, prompt, target_tokens).await {
                Ok((summary, tokens, elapsed)) => {
                    calls += 1;
                    elapsed_secs += elapsed;
                    accumulated += tokens;
                    summaries.push(summary);
                    tracing::debug!(
                        "Chunk {}/{} summarized to {} tokens ({} accumulated)",
                        index + 1,
                        chunks.len(),
                        tokens,
                        accumulated
                    );
                }
                Err(e) => {
                    tracing::warn!("Compression aborted on chunk {}: {}", index + 1, e);
                    return Compression::untouched(
                        content,
                        calls,
                        elapsed_secs,
                        CompressionOutcome::Degraded,
                    );
                }
            }

            if accumulated >= target_tokens {
                tracing::debug!("Compression target reached after {} chunk(s)", index + 1);
                break;
            }
        }

        if accumulated < target_tokens {
            let remaining = target_tokens - accumulated;
            let prompt = closing_summary_prompt(&summaries.join(SUMMARY_SEPARATOR), remaining);
            match self.summarize(model, prompt, remaining).await {
                Ok((closing, tokens, elapsed)) => {
                    calls += 1;
                    elapsed_secs += elapsed;
                    accumulated += tokens;
                    summaries.push(closing);
                }
                Err(e) => {
                    tracing::warn!("Closing summary failed: {}", e);
                    return Compression::untouched(
                        content,
                        calls,
                        elapsed_secs,
                        CompressionOutcome::Degraded,
                    );
                }
            }
        }

        let compressed = summaries.join(SUMMARY_SEPARATOR);
        tracing::info!(
            "Compressed response to {} tokens in {} call(s)",
            accumulated,
            calls
        );

        Compression {
            token_count: count_tokens(&compressed),
            content: compressed,
            calls,
            elapsed_secs,
            outcome: CompressionOutcome::Compressed,
        }
    }

    /// Issue one summarization call, returning (text, tokens, elapsed)
    async fn summarize(
        &self,
        model: &str,
        prompt: String,
        target_tokens: usize,
    ) -> crate::error::Result<(String, usize, f64)> {
        // Headroom above the target so the model can finish its sentence.
        let sampling = self
            .sampling
            .with_max_tokens(target_tokens.saturating_mul(2).max(1));
        let request = CompletionRequest::new(model, vec![ChatMessage::user(prompt)], sampling);
        let completion = self.provider.complete(&request).await?;
        Ok((
            completion.content,
            completion.response_tokens,
            completion.elapsed_secs,
        ))
    }
}

/// Split `content` into windows of roughly `chunk_tokens` tokens
///
/// The window is measured in characters (`chunk_tokens` times the average
/// characters per token) and each cut is moved forward to the next
/// whitespace, so words are never split. Chunks are trimmed; together they
/// hold every token of `content` in order.
pub fn chunk_content(content: &str, chunk_tokens: usize) -> Vec<String> {
    let total_tokens = count_tokens(content);
    if total_tokens == 0 {
        return Vec::new();
    }

    let total_chars = content.chars().count();
    let chars_per_token = (total_chars + total_tokens - 1) / total_tokens;
    let window = chunk_tokens.max(1).saturating_mul(chars_per_token).max(1);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for ch in content.chars() {
        if current_chars >= window && ch.is_whitespace() {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            current.clear();
            current_chars = 0;
        }
        current.push(ch);
        current_chars += 1;
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }

    chunks
}
