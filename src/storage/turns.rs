//! Turn pairing
//!
//! Pairs are not stored. A user message is paired with the earliest
//! assistant message of the same owner whose timestamp is strictly later,
//! whether or not other user messages sit in between. Deletion in
//! [`super::SqliteConversationStore::delete_pair`] applies the same rule in
//! SQL; anything that displays turns must go through this module so both
//! agree.

use super::types::{MessageRole, StoredMessage};
use serde::Serialize;

/// One user message and the assistant reply paired with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    /// The user message, absent for an assistant message nothing pairs with
    pub user: Option<StoredMessage>,
    /// The paired assistant message, if any
    pub assistant: Option<StoredMessage>,
}

impl Turn {
    /// Id that `delete_pair` should be called with to remove this turn
    pub fn anchor_id(&self) -> Option<i64> {
        self.user
            .as_ref()
            .or(self.assistant.as_ref())
            .map(|m| m.id)
    }
}

/// Find the assistant message paired with `target`
///
/// Only user messages have pairs. `messages` may be in any order.
pub fn find_pair<'a>(
    messages: &'a [StoredMessage],
    target: &StoredMessage,
) -> Option<&'a StoredMessage> {
    if target.role != MessageRole::User {
        return None;
    }
    messages
        .iter()
        .filter(|m| {
            m.owner == target.owner
                && m.role == MessageRole::Assistant
                && m.timestamp > target.timestamp
        })
        .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
}

/// Group an owner's history into turns, most recent first
///
/// Every user message yields a turn. When several user messages precede a
/// single assistant reply, each of them is paired with it, matching what
/// deleting any of them would remove. Assistant messages that no user
/// message pairs with are returned as turns of their own.
pub fn group_turns(messages: &[StoredMessage]) -> Vec<Turn> {
    let mut paired_ids = Vec::new();
    let mut turns: Vec<Turn> = messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|user| {
            let assistant = find_pair(messages, user).cloned();
            if let Some(a) = &assistant {
                paired_ids.push(a.id);
            }
            Turn {
                user: Some(user.clone()),
                assistant,
            }
        })
        .collect();

    turns.extend(
        messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant && !paired_ids.contains(&m.id))
            .map(|lone| Turn {
                user: None,
                assistant: Some(lone.clone()),
            }),
    );

    turns.sort_by(|a, b| {
        let key = |t: &Turn| {
            t.user
                .as_ref()
                .or(t.assistant.as_ref())
                .map(|m| (m.timestamp, m.id))
        };
        key(b).cmp(&key(a))
    });
    turns
}
