//! Base provider trait and common types for MetaRetrieval
//!
//! This module defines the [`CompletionProvider`] trait the conversation
//! layer talks to, along with the wire message type, sampling parameters,
//! and the normalized completion result.

use crate::error::{MetaRetrievalError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a message sent to the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation
    System,
    /// Text written by the user
    User,
    /// Text produced by the model
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for the completion endpoint
///
/// One `{role, content}` entry of the ordered history sent with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::providers::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Sampling parameters forwarded to the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature, 0.0 to 2.0
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Ceiling on response tokens; also the compression target
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Top-k sampling cutoff
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Nucleus sampling probability mass, in (0.0, 1.0]
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> usize {
    512
}

fn default_top_k() -> u32 {
    40
}

fn default_top_p() -> f64 {
    0.9
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_k: default_top_k(),
            top_p: default_top_p(),
        }
    }
}

impl SamplingParams {
    /// Validate parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when any parameter is out of range
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::providers::SamplingParams;
    ///
    /// assert!(SamplingParams::default().validate().is_ok());
    ///
    /// let params = SamplingParams { max_tokens: 0, ..Default::default() };
    /// assert!(params.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(MetaRetrievalError::InvalidInput(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ))
            .into());
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(MetaRetrievalError::InvalidInput(format!(
                "top_p must be in (0.0, 1.0], got {}",
                self.top_p
            ))
            .into());
        }
        if self.max_tokens == 0 {
            return Err(MetaRetrievalError::InvalidInput(
                "max_tokens must be greater than 0".to_string(),
            )
            .into());
        }
        if self.top_k == 0 {
            return Err(
                MetaRetrievalError::InvalidInput("top_k must be greater than 0".to_string()).into(),
            );
        }
        Ok(())
    }

    /// Copy of these parameters with a different response ceiling
    pub fn with_max_tokens(self, max_tokens: usize) -> Self {
        Self { max_tokens, ..self }
    }
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Ordered message history
    pub messages: Vec<ChatMessage>,
    /// Sampling parameters
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Create a request for `model` over `messages`
    pub fn new(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            sampling,
        }
    }
}

/// Normalized result of a successful completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Wall-clock seconds spent on the request
    pub elapsed_secs: f64,
    /// Token count over all input message contents
    pub prompt_tokens: usize,
    /// Token count of `content`
    pub response_tokens: usize,
    /// `prompt_tokens + response_tokens`
    pub total_tokens: usize,
}

impl Completion {
    /// Build a completion, deriving token counts from the request and content
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::providers::{ChatMessage, Completion};
    ///
    /// let messages = vec![ChatMessage::user("What is rust?")];
    /// let completion = Completion::from_content(&messages, "A systems language.", 0.5);
    /// assert_eq!(completion.prompt_tokens, 3);
    /// assert_eq!(completion.response_tokens, 3);
    /// assert_eq!(completion.total_tokens, 6);
    /// ```
    pub fn from_content(
        messages: &[ChatMessage],
        content: impl Into<String>,
        elapsed_secs: f64,
    ) -> Self {
        let content = content.into();
        let prompt_tokens =
            crate::tokens::count_tokens_in(messages.iter().map(|m| m.content.as_str()));
        let response_tokens = crate::tokens::count_tokens(&content);
        Self {
            content,
            elapsed_secs,
            prompt_tokens,
            response_tokens,
            total_tokens: prompt_tokens + response_tokens,
        }
    }
}

/// Completion endpoint abstraction
///
/// Implementations issue exactly one request per call and never retry.
/// Failures are reported as [`MetaRetrievalError::Transport`],
/// [`MetaRetrievalError::Endpoint`] or
/// [`MetaRetrievalError::MalformedResponse`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Completes the conversation in `request`
    ///
    /// # Errors
    ///
    /// Returns a client error when the call fails or the body is unusable
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
