use crate::error::MetaRetrievalError;
use crate::providers::{ChatMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Written by the owner
    User,
    /// Produced by a model
    Assistant,
}

impl MessageRole {
    /// Column value for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = MetaRetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(MetaRetrievalError::Persistence(format!(
                "unknown message role in store: {}",
                other
            ))),
        }
    }
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message about to be persisted
///
/// Id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// Identity the message belongs to
    pub owner: String,
    /// Who produced the content
    pub role: MessageRole,
    /// Text body
    pub content: String,
    /// Model that produced the content (assistant messages only)
    pub model_name: Option<String>,
    /// Response token count
    pub token_usage: Option<usize>,
    /// Wall-clock seconds spent generating the content
    pub elapsed_time: Option<f64>,
}

impl NewMessage {
    /// A user message with no generation metadata
    pub fn user(owner: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            role: MessageRole::User,
            content: content.into(),
            model_name: None,
            token_usage: None,
            elapsed_time: None,
        }
    }

    /// An assistant message with its generation metadata
    pub fn assistant(
        owner: impl Into<String>,
        content: impl Into<String>,
        model_name: impl Into<String>,
        token_usage: usize,
        elapsed_time: f64,
    ) -> Self {
        Self {
            owner: owner.into(),
            role: MessageRole::Assistant,
            content: content.into(),
            model_name: Some(model_name.into()),
            token_usage: Some(token_usage),
            elapsed_time: Some(elapsed_time),
        }
    }
}

/// A persisted conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique, monotonically increasing identifier
    pub id: i64,
    /// Identity the message belongs to
    pub owner: String,
    /// Who produced the content
    pub role: MessageRole,
    /// Text body
    pub content: String,
    /// Model that produced the content (assistant messages only)
    pub model_name: Option<String>,
    /// Response token count
    pub token_usage: Option<usize>,
    /// Wall-clock seconds spent generating the content
    pub elapsed_time: Option<f64>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// The wire form of this message, for replaying history to a model
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.into(),
            content: self.content.clone(),
        }
    }
}

/// Outcome of a paired deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedTurn {
    /// The message that was asked for
    pub target_id: i64,
    /// The assistant message removed alongside it, if any
    pub paired_assistant_id: Option<i64>,
}

impl DeletedTurn {
    /// Number of rows removed
    pub fn removed(&self) -> usize {
        1 + usize::from(self.paired_assistant_id.is_some())
    }
}
