//! HTTP completion client
//!
//! Implements [`CompletionProvider`] against an OpenAI-style chat completion
//! endpoint: `POST <url>` with a bearer token and a
//! `{model, messages, temperature, max_tokens, top_k, top_p}` body, expecting
//! `{choices: [{message: {content}}]}` back.

use crate::config::EndpointConfig;
use crate::error::{MetaRetrievalError, Result};
use crate::providers::{ChatMessage, Completion, CompletionProvider, CompletionRequest};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Completion client for a single configured endpoint
///
/// Every call is one HTTP request with an explicit timeout. Expiry of the
/// timeout is reported as a transport error like any other connectivity
/// failure. No retries are attempted.
///
/// # Examples
///
/// ```no_run
/// use metaretrieval::providers::{
///     ChatMessage, CompletionProvider, CompletionRequest, HttpCompletionClient, SamplingParams,
/// };
/// use std::time::Duration;
///
/// # async fn example() -> metaretrieval::error::Result<()> {
/// let client = HttpCompletionClient::new(
///     "http://localhost:11434/v1/chat/completions",
///     "secret",
///     Duration::from_secs(60),
/// )?;
/// let request = CompletionRequest::new(
///     "mixtral:latest",
///     vec![ChatMessage::user("What is rust?")],
///     SamplingParams::default(),
/// );
/// let completion = client.complete(&request).await?;
/// println!("{} ({} tokens)", completion.content, completion.response_tokens);
/// # Ok(())
/// # }
/// ```
pub struct HttpCompletionClient {
    client: Client,
    url: String,
    api_key: String,
}

/// Request body sent to the endpoint
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: usize,
    top_k: u32,
    top_p: f64,
}

/// Success body returned by the endpoint
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpCompletionClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when `api_key` is empty, or a provider
    /// error if the HTTP client cannot be built
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let url = url.into();
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MetaRetrievalError::MissingCredentials(
                "API key is missing or empty".to_string(),
            )
            .into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metaretrieval/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                MetaRetrievalError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized completion client: url={}, timeout={:?}",
            url,
            timeout
        );

        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    /// Create a client from the endpoint section of the configuration
    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let api_key = config.api_key.clone().unwrap_or_default();
        Self::new(
            config.url.clone(),
            api_key,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn parse_body(body: &str, elapsed_secs: f64) -> Result<String> {
        let malformed = |message: String| MetaRetrievalError::MalformedResponse {
            message,
            elapsed_secs,
        };

        let parsed: WireResponse = serde_json::from_str(body)
            .map_err(|e| malformed(format!("response is not a completion body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| malformed("choices[0].message.content is missing".to_string()))?;

        if content.is_empty() {
            return Err(malformed("choices[0].message.content is empty".to_string()).into());
        }

        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.sampling.temperature,
            max_tokens: request.sampling.max_tokens,
            top_k: request.sampling.top_k,
            top_p: request.sampling.top_p,
        };

        tracing::debug!(
            "Sending completion request: model={}, {} messages, max_tokens={}",
            request.model,
            request.messages.len(),
            request.sampling.max_tokens
        );

        let started = Instant::now();
        let sent = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                let elapsed_secs = started.elapsed().as_secs_f64();
                let message = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                tracing::error!("Completion {}", message);
                return Err(MetaRetrievalError::Transport {
                    message,
                    elapsed_secs,
                }
                .into());
            }
        };

        let status = response.status();
        let text = response.text().await;
        let elapsed_secs = started.elapsed().as_secs_f64();

        let text = match text {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to read completion response body: {}", e);
                return Err(MetaRetrievalError::Transport {
                    message: format!("failed to read response body: {}", e),
                    elapsed_secs,
                }
                .into());
            }
        };

        if !status.is_success() {
            tracing::error!("Completion endpoint returned error {}", status);
            return Err(MetaRetrievalError::Endpoint {
                status: status.as_u16(),
                body: text,
                elapsed_secs,
            }
            .into());
        }

        let content = Self::parse_body(&text, elapsed_secs).map_err(|e| {
            tracing::error!("Failed to parse completion response: {}", e);
            e
        })?;

        let completion = Completion::from_content(&request.messages, content, elapsed_secs);

        tracing::debug!(
            "Completion response: prompt_tokens={}, response_tokens={}, elapsed={:.2}s",
            completion.prompt_tokens,
            completion.response_tokens,
            completion.elapsed_secs
        );

        Ok(completion)
    }
}
