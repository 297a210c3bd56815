//! Per-session conversation context
//!
//! A [`SessionContext`] carries everything one user's conversation needs
//! between turns: the owner identity, the running message history sent in
//! direct mode, the attached file for file mode, and one-shot notice flags.
//! It is created when a session starts and dropped when it ends; nothing
//! here is shared between sessions.

use crate::error::{MetaRetrievalError, Result};
use crate::providers::ChatMessage;
use std::collections::HashSet;

/// Conversation state for one owner's session
#[derive(Debug, Clone)]
pub struct SessionContext {
    owner: String,
    history: Vec<ChatMessage>,
    attachment: Option<String>,
    shown_notices: HashSet<String>,
}

impl SessionContext {
    /// Start a session for `owner`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the owner identity is blank
    ///
    /// # Examples
    ///
    /// ```
    /// use metaretrieval::conversation::SessionContext;
    ///
    /// let session = SessionContext::new("alice").unwrap();
    /// assert_eq!(session.owner(), "alice");
    /// assert!(session.history().is_empty());
    /// assert!(SessionContext::new("  ").is_err());
    /// ```
    pub fn new(owner: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(MetaRetrievalError::InvalidInput(
                "owner identity cannot be empty".to_string(),
            )
            .into());
        }
        Ok(Self {
            owner,
            history: Vec::new(),
            attachment: None,
            shown_notices: HashSet::new(),
        })
    }

    /// Identity every message of this session is stored under
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Messages exchanged so far in this session, oldest first
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Attach file content for file-mode questions, replacing any previous
    /// attachment
    pub fn attach_file(&mut self, content: impl Into<String>) {
        self.attachment = Some(content.into());
    }

    /// Currently attached file content
    pub fn attachment(&self) -> Option<&str> {
        self.attachment.as_deref()
    }

    /// Drop the attached file
    pub fn clear_attachment(&mut self) {
        self.attachment = None;
    }

    /// Returns true the first time `key` is seen in this session
    pub fn show_once(&mut self, key: &str) -> bool {
        self.shown_notices.insert(key.to_string())
    }
}
